//! Devis analysis domain models.
//!
//! `DevisAnalysis` mirrors the JSON schema the model is instructed to emit,
//! French field names included, so a normalized reply deserializes without
//! any renaming. Fields the source document does not state arrive as null
//! or the literal "non spécifié"; the prompt forbids fabricating them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Fallback overall score when the model emits a non-numeric note.
pub const FALLBACK_SCORE: i32 = 5;

/// One line item of a quote.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DevisLineItem {
    pub designation: String,
    #[serde(default)]
    pub quantite: Option<f64>,
    #[serde(default)]
    pub unite: Option<String>,
    #[serde(default)]
    pub prix_unitaire: Option<f64>,
    #[serde(default)]
    pub total: Option<f64>,
    #[serde(default)]
    pub categorie: Option<String>,
}

/// Structured analysis of a single vendor quote.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DevisAnalysis {
    pub entreprise: String,
    #[serde(default)]
    pub siret: Option<String>,
    #[serde(default)]
    pub adresse: Option<String>,
    #[serde(default)]
    pub contact: Option<String>,
    pub montant_total: f64,
    #[serde(default)]
    pub montant_ht: Option<f64>,
    #[serde(default)]
    pub montant_tva: Option<f64>,
    #[serde(default)]
    pub taux_tva: Option<f64>,
    #[serde(default)]
    pub delai_livraison: Option<String>,
    #[serde(default)]
    pub garantie: Option<String>,
    #[serde(default)]
    pub validite: Option<String>,
    #[serde(default)]
    pub conditions_paiement: Option<String>,
    #[serde(default)]
    pub postes: Vec<DevisLineItem>,
    #[serde(default)]
    pub points_forts: Vec<String>,
    #[serde(default)]
    pub points_faibles: Vec<String>,
    #[serde(default)]
    pub recommandations: Vec<String>,
    #[serde(default)]
    pub points_negociation: Vec<String>,
    /// Rounded to the nearest whole number by the normalizer.
    pub note_globale: i32,
}

// =============================================================================
// Request/Response DTOs for API endpoints
// =============================================================================

/// JSON body variant of POST /analyze-devis. Exactly one of the three
/// sources must be provided.
#[derive(Debug, Clone, Deserialize)]
pub struct AnalyzeDevisRequest {
    #[serde(default, rename = "documentId")]
    pub document_id: Option<Uuid>,
    #[serde(default, rename = "documentUrl")]
    pub document_url: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

/// Response for POST /analyze-devis.
#[derive(Debug, Clone, Serialize)]
pub struct AnalyzeDevisResponse {
    pub message: String,
    pub analysis: DevisAnalysis,
    #[serde(rename = "extractedText", skip_serializing_if = "Option::is_none")]
    pub extracted_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saved_analysis: Option<SavedAnalysis>,
    pub tokens_used: u32,
}

/// Persisted analysis record, as returned by GET /analyze-devis.
#[derive(Debug, Clone, Serialize)]
pub struct SavedAnalysis {
    pub id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    pub analysis: serde_json::Value,
    pub note_globale: i32,
    pub montant_total: f64,
    pub tokens_used: i32,
    pub created_at: DateTime<Utc>,
}

/// Query params for GET /analyze-devis.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ListAnalysesQuery {
    #[serde(default, rename = "documentId")]
    pub document_id: Option<Uuid>,
    #[serde(default)]
    pub limit: Option<u32>,
}

/// Response for GET /analyze-devis.
#[derive(Debug, Clone, Serialize)]
pub struct ListAnalysesResponse {
    pub analyses: Vec<SavedAnalysis>,
    pub total: i64,
}
