//! Devis comparison domain models.
//!
//! `DevisComparison` mirrors the comparison JSON schema the model is
//! instructed to emit. One comparison spans every submitted document in a
//! single model call; `comparaison_detaillee` must carry exactly one entry
//! per input document.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Executive summary: recommended vendor and why.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonSynthese {
    pub prestataire_recommande: String,
    pub justification: String,
    #[serde(default)]
    pub economie_potentielle: Option<String>,
}

/// Per-vendor comparison entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VendorComparison {
    pub prestataire: String,
    pub montant: f64,
    #[serde(default)]
    pub quantite_descriptif: Option<String>,
    /// Computed by the model when a quantity is stated, null otherwise.
    #[serde(default)]
    pub prix_unitaire: Option<f64>,
    #[serde(default)]
    pub delai: Option<String>,
    #[serde(default)]
    pub qualite_materiaux: Option<String>,
    #[serde(default)]
    pub services_inclus: Vec<String>,
    #[serde(default)]
    pub garanties: Vec<String>,
    #[serde(default)]
    pub points_forts: Vec<String>,
    #[serde(default)]
    pub points_faibles: Vec<String>,
    #[serde(default)]
    pub note: Option<f64>,
}

/// One work package of the generated scope-of-work document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PosteTravaux {
    pub designation: String,
    #[serde(default)]
    pub specifications_techniques: Option<String>,
    #[serde(default)]
    pub quantite_estimee: Option<String>,
}

/// Generated scope-of-work (cahier des charges) for the consultation.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CahierDesCharges {
    #[serde(default)]
    pub titre: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub postes_travaux: Vec<PosteTravaux>,
    #[serde(default)]
    pub criteres_evaluation: Vec<String>,
    #[serde(default)]
    pub delai_souhaite: Option<String>,
    #[serde(default)]
    pub budget_fourchette: Option<String>,
}

/// Price spread between the highest and lowest quote.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EcartPrix {
    #[serde(default)]
    pub montant: f64,
    #[serde(default)]
    pub pourcentage: Option<f64>,
}

/// Price/delay spread analysis across vendors.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AnalyseEcarts {
    #[serde(default)]
    pub ecart_prix_max_min: EcartPrix,
    #[serde(default)]
    pub ecart_delais: Option<String>,
    #[serde(default)]
    pub commentaire: Option<String>,
}

/// Full multi-vendor comparison.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DevisComparison {
    pub synthese: ComparisonSynthese,
    pub comparaison_detaillee: Vec<VendorComparison>,
    #[serde(default)]
    pub cahier_des_charges: CahierDesCharges,
    #[serde(default)]
    pub analyse_ecarts: AnalyseEcarts,
    #[serde(default)]
    pub recommandations_negociation: Vec<String>,
}

// =============================================================================
// Request/Response DTOs for API endpoints
// =============================================================================

/// One input document for POST /compare-devis.
#[derive(Debug, Clone, Deserialize)]
pub struct ComparisonDocument {
    pub filename: String,
    pub content: String,
}

/// Request body for POST /compare-devis.
#[derive(Debug, Clone, Deserialize)]
pub struct CompareDevisRequest {
    pub documents: Vec<ComparisonDocument>,
}

/// Response for POST /compare-devis.
#[derive(Debug, Clone, Serialize)]
pub struct CompareDevisResponse {
    pub message: String,
    pub comparison: DevisComparison,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saved_comparison: Option<SavedComparison>,
    pub tokens_used: u32,
    pub files_analyzed: Vec<String>,
}

/// Persisted comparison record.
#[derive(Debug, Clone, Serialize)]
pub struct SavedComparison {
    pub id: Uuid,
    pub document_count: i32,
    pub filenames: Vec<String>,
    pub comparison: serde_json::Value,
    pub tokens_used: i32,
    pub created_at: DateTime<Utc>,
}
