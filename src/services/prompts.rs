//! Prompt construction for devis analysis and comparison.
//!
//! The system prompt pins three things the pipeline depends on: the model
//! must never invent facts absent from the source text (missing fields are
//! null or "non spécifié"), the reply must be a single JSON object of the
//! given shape, and scores follow a fixed rubric so they stay comparable
//! across calls.

use crate::error::ApiError;

/// Minimum extracted-text length accepted for analysis. Anything shorter is
/// rejected before a model call is made.
pub const MIN_TEXT_LEN: usize = 30;

/// A system/user prompt pair ready for the gateway.
#[derive(Debug, Clone)]
pub struct PromptPair {
    pub system: String,
    pub user: String,
}

/// Scoring rubric shared by analysis and comparison prompts. The weights sum
/// to the 0-10 scale used by `note_globale` and per-vendor `note`.
const SCORING_RUBRIC: &str = "\
Barème de notation (note sur 10) :\n\
- Prix par rapport au marché : 0 à 4 points\n\
- Qualité des matériaux proposés : 0 à 3 points\n\
- Services inclus et garanties : 0 à 2 points\n\
- Délai d'exécution : 0 à 1 point";

const NO_FABRICATION_RULES: &str = "\
Règles strictes :\n\
1. N'invente JAMAIS une information absente du document. \
Toute donnée non mentionnée doit valoir null ou \"non spécifié\".\n\
2. Réponds UNIQUEMENT avec un objet JSON valide, sans texte avant ni après.\n\
3. Les montants sont des nombres (pas de symbole monétaire, point décimal).\n\
4. Ne modifie pas les montants lus dans le document.";

const ANALYSIS_SCHEMA: &str = r#"{
  "entreprise": "nom de l'entreprise émettrice",
  "siret": "numéro SIRET ou null",
  "adresse": "adresse ou null",
  "contact": "coordonnées (nom, téléphone, email) en une chaîne, ou null",
  "montant_total": 0,
  "montant_ht": 0,
  "montant_tva": 0,
  "taux_tva": 0,
  "delai_livraison": "délai annoncé ou null",
  "garantie": "garanties ou null",
  "validite": "durée de validité du devis ou null",
  "conditions_paiement": "conditions de paiement ou null",
  "postes": [
    {
      "designation": "description du poste",
      "quantite": 0,
      "unite": "unité ou null",
      "prix_unitaire": 0,
      "total": 0,
      "categorie": "catégorie de travaux ou null"
    }
  ],
  "points_forts": ["..."],
  "points_faibles": ["..."],
  "recommandations": ["..."],
  "points_negociation": ["..."],
  "note_globale": 0
}"#;

const COMPARISON_SCHEMA: &str = r#"{
  "synthese": {
    "prestataire_recommande": "nom du prestataire recommandé",
    "justification": "justification du choix",
    "economie_potentielle": "économie réalisable ou null"
  },
  "comparaison_detaillee": [
    {
      "prestataire": "nom",
      "montant": 0,
      "quantite_descriptif": "quantités décrites ou null",
      "prix_unitaire": 0,
      "delai": "délai ou null",
      "qualite_materiaux": "standard | intermédiaire | haut de gamme | null",
      "services_inclus": ["..."],
      "garanties": ["..."],
      "points_forts": ["..."],
      "points_faibles": ["..."],
      "note": 0
    }
  ],
  "cahier_des_charges": {
    "titre": "titre du cahier des charges",
    "description": "description des travaux",
    "postes_travaux": [
      {
        "designation": "poste de travaux",
        "specifications_techniques": "spécifications ou null",
        "quantite_estimee": "quantité estimée ou null"
      }
    ],
    "criteres_evaluation": ["..."],
    "delai_souhaite": "délai souhaité ou null",
    "budget_fourchette": "fourchette budgétaire ou null"
  },
  "analyse_ecarts": {
    "ecart_prix_max_min": { "montant": 0, "pourcentage": 0 },
    "ecart_delais": "analyse des écarts de délais ou null",
    "commentaire": "commentaire ou null"
  },
  "recommandations_negociation": ["..."]
}"#;

fn ensure_min_length(text: &str, label: &str) -> Result<(), ApiError> {
    if text.trim().len() < MIN_TEXT_LEN {
        return Err(ApiError::bad_request(format!(
            "Texte extrait insuffisant pour {} (minimum {} caractères)",
            label, MIN_TEXT_LEN
        )));
    }
    Ok(())
}

/// Build the prompt pair for a single-document analysis.
pub fn build_analysis_prompt(text: &str) -> Result<PromptPair, ApiError> {
    ensure_min_length(text, "l'analyse")?;

    let system = format!(
        "Tu es un expert en analyse de devis pour des syndics de copropriété. \
         Tu analyses le devis fourni et tu en extrais une structure JSON.\n\n\
         {rules}\n\n\
         {rubric}\n\n\
         Schéma JSON attendu :\n{schema}",
        rules = NO_FABRICATION_RULES,
        rubric = SCORING_RUBRIC,
        schema = ANALYSIS_SCHEMA,
    );

    let user = format!(
        "Analyse le devis suivant et réponds avec l'objet JSON demandé.\n\n\
         --- DEVIS ---\n{}\n--- FIN DU DEVIS ---",
        text.trim()
    );

    Ok(PromptPair { system, user })
}

/// Build the prompt pair for a multi-document comparison. Each document is
/// labeled by its filename so the model can attribute vendors.
pub fn build_comparison_prompt(documents: &[(String, String)]) -> Result<PromptPair, ApiError> {
    for (filename, content) in documents {
        ensure_min_length(content, &format!("la comparaison ({})", filename))?;
    }

    let system = format!(
        "Tu es un expert en analyse comparative de devis pour des syndics de \
         copropriété. Tu compares les {count} devis fournis, tu rédiges un \
         cahier des charges à partir des prestations décrites, et tu réponds \
         en JSON.\n\n\
         {rules}\n\n\
         {rubric}\n\n\
         Le tableau comparaison_detaillee doit contenir exactement une entrée \
         par devis fourni, soit {count} entrées.\n\n\
         Schéma JSON attendu :\n{schema}",
        count = documents.len(),
        rules = NO_FABRICATION_RULES,
        rubric = SCORING_RUBRIC,
        schema = COMPARISON_SCHEMA,
    );

    let mut user = String::from("Compare les devis suivants et réponds avec l'objet JSON demandé.\n");
    for (i, (filename, content)) in documents.iter().enumerate() {
        user.push_str(&format!(
            "\n--- DEVIS {n} : {name} ---\n{content}\n--- FIN DU DEVIS {n} ---\n",
            n = i + 1,
            name = filename,
            content = content.trim(),
        ));
    }

    Ok(PromptPair { system, user })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_rejected_before_any_model_call() {
        let err = build_analysis_prompt("trop court").unwrap_err();
        match err {
            ApiError::BadRequest(msg) => assert!(msg.contains("insuffisant")),
            other => panic!("expected BadRequest, got {:?}", other),
        }
    }

    #[test]
    fn analysis_prompt_embeds_document_and_rules() {
        let text = "Devis plomberie: remplacement colonne d'eau, total 12 500 EUR HT";
        let pair = build_analysis_prompt(text).unwrap();
        assert!(pair.system.contains("non spécifié"));
        assert!(pair.system.contains("note_globale"));
        assert!(pair.user.contains(text));
    }

    #[test]
    fn comparison_prompt_labels_each_file() {
        let docs = vec![
            (
                "devis_a.pdf".to_string(),
                "Devis A: réfection toiture, montant total 45 000 EUR".to_string(),
            ),
            (
                "devis_b.pdf".to_string(),
                "Devis B: réfection toiture, montant total 52 000 EUR".to_string(),
            ),
        ];
        let pair = build_comparison_prompt(&docs).unwrap();
        assert!(pair.user.contains("devis_a.pdf"));
        assert!(pair.user.contains("devis_b.pdf"));
        assert!(pair.system.contains("2 entrées"));
    }

    #[test]
    fn comparison_rejects_one_short_document() {
        let docs = vec![
            (
                "ok.pdf".to_string(),
                "Devis complet avec un contenu suffisant pour analyse".to_string(),
            ),
            ("vide.pdf".to_string(), "court".to_string()),
        ];
        let err = build_comparison_prompt(&docs).unwrap_err();
        match err {
            ApiError::BadRequest(msg) => assert!(msg.contains("vide.pdf")),
            other => panic!("expected BadRequest, got {:?}", other),
        }
    }
}
