//! Model-output normalization.
//!
//! The model reliably emits the requested JSON but inconsistently wraps it:
//! markdown fences, a conversational preamble, trailing commentary, or all
//! three. A plain fence split is not enough because legitimate string values
//! can contain brace characters, so the extraction walks the text with a
//! quote- and escape-aware brace counter and keeps exactly the outermost
//! balanced object. Anything that still fails to parse is surfaced as
//! `MalformedOutput` with a bounded preview of the raw reply — no silent
//! partial recovery.

use serde_json::Value;

use crate::domain::analysis::{DevisAnalysis, FALLBACK_SCORE};
use crate::domain::comparison::DevisComparison;
use crate::error::ApiError;

/// Maximum number of characters of raw model output carried in error
/// diagnostics.
const PREVIEW_LEN: usize = 500;

/// Locate the outermost balanced `{...}` object in a raw model reply.
///
/// Handles, in order: leading/trailing whitespace, prose before a fenced
/// block, ```json / ``` fence markers, braces inside quoted strings, escaped
/// quotes inside strings, and trailing text after the closing brace.
pub fn extract_json_object(raw: &str) -> Option<&str> {
    let mut text = raw.trim();

    // Conversational preamble before a fenced block: skip to the fence.
    if !text.starts_with('{') && !text.starts_with("```") {
        if let Some(idx) = text.find("```json").or_else(|| text.find("```")) {
            text = &text[idx..];
        }
    }

    // Strip a leading fence marker. The trailing fence does not need
    // stripping: the brace scan below discards everything after the object.
    if let Some(rest) = text.strip_prefix("```json") {
        text = rest;
    } else if let Some(rest) = text.strip_prefix("```") {
        text = rest;
    }

    scan_balanced_object(text)
}

/// Character-by-character scan for the end of the outermost `{...}` object.
/// Braces inside quoted strings do not affect the depth counter; an escaped
/// quote does not toggle the in-string flag.
fn scan_balanced_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth: i32 = 0;
    let mut in_string = false;
    let mut escaped = false;

    // Structural characters are all ASCII, so a byte walk is safe and every
    // match position is a char boundary.
    for (i, &b) in text.as_bytes().iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
        } else {
            match b {
                b'"' => in_string = true,
                b'{' => depth += 1,
                b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(&text[start..=i]);
                    }
                }
                _ => {}
            }
        }
    }

    None
}

fn preview(raw: &str) -> String {
    raw.chars().take(PREVIEW_LEN).collect()
}

fn malformed(raw: &str) -> ApiError {
    ApiError::MalformedOutput {
        preview: preview(raw),
    }
}

/// Steps 1-5: reduce a raw reply to a parsed JSON value.
pub fn parse_model_json(raw: &str) -> Result<Value, ApiError> {
    let candidate = extract_json_object(raw).ok_or_else(|| malformed(raw))?;
    serde_json::from_str(candidate).map_err(|_| malformed(raw))
}

/// Repair a `contact` field that arrived as an object instead of a string.
/// Known sub-fields are joined with " - "; an object with none of them falls
/// back to its raw JSON text.
fn repair_contact(value: &mut Value) {
    let Some(obj) = value.as_object_mut() else {
        return;
    };

    let repaired = match obj.get("contact") {
        Some(Value::Object(contact_obj)) => {
            let parts: Vec<String> = ["nom", "telephone", "email"]
                .iter()
                .filter_map(|k| contact_obj.get(*k))
                .filter_map(|v| v.as_str())
                .filter(|s| !s.trim().is_empty())
                .map(|s| s.to_string())
                .collect();

            if parts.is_empty() {
                Some(Value::Object(contact_obj.clone()).to_string())
            } else {
                Some(parts.join(" - "))
            }
        }
        _ => None,
    };

    if let Some(repaired) = repaired {
        obj.insert("contact".to_string(), Value::String(repaired));
    }
}

/// Coerce `note_globale` to the nearest whole number. A string that parses
/// as a number is rounded; anything non-numeric becomes the fallback score.
fn coerce_note_globale(value: &mut Value) {
    let Some(obj) = value.as_object_mut() else {
        return;
    };

    let rounded = match obj.get("note_globale") {
        Some(Value::Number(n)) => n
            .as_f64()
            .map(|f| f.round() as i64)
            .unwrap_or(FALLBACK_SCORE as i64),
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map(|f| f.round() as i64)
            .unwrap_or(FALLBACK_SCORE as i64),
        _ => FALLBACK_SCORE as i64,
    };

    obj.insert("note_globale".to_string(), Value::Number(rounded.into()));
}

/// Normalize a raw model reply into a `DevisAnalysis`.
///
/// Returns the typed analysis together with the repaired JSON value that is
/// persisted verbatim.
pub fn normalize_analysis(raw: &str) -> Result<(DevisAnalysis, Value), ApiError> {
    let mut value = parse_model_json(raw)?;

    repair_contact(&mut value);
    coerce_note_globale(&mut value);

    // montant_total is the one field the prompt marks as mandatory; a reply
    // without it is rejected rather than defaulted to zero.
    let has_amount = value
        .get("montant_total")
        .map(|v| v.is_number())
        .unwrap_or(false);
    if !has_amount {
        return Err(malformed(raw));
    }

    let analysis: DevisAnalysis =
        serde_json::from_value(value.clone()).map_err(|_| malformed(raw))?;

    Ok((analysis, value))
}

/// Normalize a raw model reply into a `DevisComparison` over
/// `expected_documents` input files.
///
/// Enforces the vendor-count invariant and recomputes the max-min price
/// spread from the normalized vendor amounts, overwriting whatever the model
/// reported.
pub fn normalize_comparison(
    raw: &str,
    expected_documents: usize,
) -> Result<(DevisComparison, Value), ApiError> {
    let value = parse_model_json(raw)?;

    let mut comparison: DevisComparison =
        serde_json::from_value(value).map_err(|_| malformed(raw))?;

    if comparison.comparaison_detaillee.len() != expected_documents {
        return Err(malformed(raw));
    }

    recompute_price_spread(&mut comparison);

    let value = serde_json::to_value(&comparison)
        .map_err(|e| ApiError::internal(format!("Failed to serialize comparison: {}", e)))?;

    Ok((comparison, value))
}

fn recompute_price_spread(comparison: &mut DevisComparison) {
    let amounts: Vec<f64> = comparison
        .comparaison_detaillee
        .iter()
        .map(|v| v.montant)
        .collect();

    let (Some(max), Some(min)) = (
        amounts.iter().cloned().fold(None::<f64>, |acc, x| {
            Some(acc.map_or(x, |a| a.max(x)))
        }),
        amounts.iter().cloned().fold(None::<f64>, |acc, x| {
            Some(acc.map_or(x, |a| a.min(x)))
        }),
    ) else {
        return;
    };

    let spread = &mut comparison.analyse_ecarts.ecart_prix_max_min;
    spread.montant = max - min;
    spread.pourcentage = if min > 0.0 {
        Some(((max - min) / min * 1000.0).round() / 10.0)
    } else {
        None
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_plain_object() {
        let raw = r#"{"entreprise": "Dupont SARL", "montant_total": 1200}"#;
        assert_eq!(extract_json_object(raw), Some(raw));
    }

    #[test]
    fn strips_json_fences() {
        let raw = "```json\n{\"montant_total\": 1200}\n```";
        assert_eq!(extract_json_object(raw), Some("{\"montant_total\": 1200}"));
    }

    #[test]
    fn skips_preamble_before_fence() {
        let raw = "Voici l'analyse demandée :\n```json\n{\"montant_total\": 1200}\n```\nN'hésitez pas.";
        assert_eq!(extract_json_object(raw), Some("{\"montant_total\": 1200}"));
    }

    #[test]
    fn discards_trailing_commentary_without_fences() {
        let raw = "{\"montant_total\": 1200} et voilà le résultat.";
        assert_eq!(extract_json_object(raw), Some("{\"montant_total\": 1200}"));
    }

    #[test]
    fn braces_inside_strings_do_not_end_the_scan() {
        let raw = r#"{"description": "Poste {A} et {B}", "montant_total": 5}"#;
        assert_eq!(extract_json_object(raw), Some(raw));
    }

    #[test]
    fn escaped_quotes_do_not_flip_string_state() {
        let raw = r#"{"note": "Il a dit \"ok\"", "montant_total": 5}"#;
        assert_eq!(extract_json_object(raw), Some(raw));
    }

    #[test]
    fn escaped_backslash_before_closing_quote() {
        // The backslash is itself escaped, so the quote after it closes the
        // string and the object still terminates correctly.
        let raw = r#"{"path": "C:\\", "montant_total": 5}"#;
        assert_eq!(extract_json_object(raw), Some(raw));
    }

    #[test]
    fn nested_objects_extract_whole() {
        let raw = r#"{"a": {"b": {"c": 1}}, "montant_total": 2}"#;
        assert_eq!(extract_json_object(raw), Some(raw));
    }

    #[test]
    fn fenced_extraction_matches_direct_parse() {
        let object = r#"{"entreprise": "Toiture Plus", "montant_total": 45000.5}"#;
        let fenced = format!("Bonjour ! Voici le résultat.\n```json\n{}\n```", object);
        let direct: Value = serde_json::from_str(object).unwrap();
        let extracted: Value = parse_model_json(&fenced).unwrap();
        assert_eq!(direct, extracted);
    }

    #[test]
    fn unbalanced_output_is_malformed_with_preview() {
        let raw = "Je suis désolé, je ne peux pas analyser ce document.";
        let err = parse_model_json(raw).unwrap_err();
        match err {
            ApiError::MalformedOutput { preview } => {
                assert!(preview.starts_with("Je suis désolé"));
                assert!(preview.chars().count() <= 500);
            }
            other => panic!("expected MalformedOutput, got {:?}", other),
        }
    }

    #[test]
    fn preview_is_bounded_to_500_chars() {
        let raw = "x".repeat(2000);
        let err = parse_model_json(&raw).unwrap_err();
        match err {
            ApiError::MalformedOutput { preview } => assert_eq!(preview.chars().count(), 500),
            other => panic!("expected MalformedOutput, got {:?}", other),
        }
    }

    #[test]
    fn contact_object_is_repaired_to_string() {
        let raw = r#"{
            "entreprise": "Plomberie Martin",
            "contact": {"nom": "X", "telephone": "01 42 00 00 00"},
            "montant_total": 3200,
            "note_globale": 7
        }"#;
        let (analysis, value) = normalize_analysis(raw).unwrap();
        assert_eq!(analysis.contact.as_deref(), Some("X - 01 42 00 00 00"));
        assert_eq!(value["contact"], json!("X - 01 42 00 00 00"));
    }

    #[test]
    fn contact_object_without_known_fields_falls_back_to_raw_json() {
        let raw = r#"{
            "entreprise": "Plomberie Martin",
            "contact": {"fax": "01 42 00 00 01"},
            "montant_total": 3200,
            "note_globale": 7
        }"#;
        let (analysis, _) = normalize_analysis(raw).unwrap();
        assert!(analysis.contact.unwrap().contains("fax"));
    }

    #[test]
    fn contact_string_passes_through() {
        let raw = r#"{
            "entreprise": "Plomberie Martin",
            "contact": "M. Martin - 06 00 00 00 00",
            "montant_total": 3200,
            "note_globale": 7
        }"#;
        let (analysis, _) = normalize_analysis(raw).unwrap();
        assert_eq!(analysis.contact.as_deref(), Some("M. Martin - 06 00 00 00 00"));
    }

    #[test]
    fn string_score_is_rounded_to_nearest_integer() {
        let raw = r#"{"entreprise": "E", "montant_total": 100, "note_globale": "7.6"}"#;
        let (analysis, _) = normalize_analysis(raw).unwrap();
        assert_eq!(analysis.note_globale, 8);
    }

    #[test]
    fn numeric_score_is_rounded() {
        let raw = r#"{"entreprise": "E", "montant_total": 100, "note_globale": 6.4}"#;
        let (analysis, _) = normalize_analysis(raw).unwrap();
        assert_eq!(analysis.note_globale, 6);
    }

    #[test]
    fn non_numeric_score_defaults_instead_of_rejecting() {
        let raw = r#"{"entreprise": "E", "montant_total": 100, "note_globale": "excellent"}"#;
        let (analysis, _) = normalize_analysis(raw).unwrap();
        assert_eq!(analysis.note_globale, FALLBACK_SCORE);
    }

    #[test]
    fn missing_montant_total_is_rejected() {
        let raw = r#"{"entreprise": "E", "note_globale": 7}"#;
        let err = normalize_analysis(raw).unwrap_err();
        assert!(matches!(err, ApiError::MalformedOutput { .. }));
    }

    #[test]
    fn unstated_fields_stay_null() {
        let raw = r#"{
            "entreprise": "Ravalement SAS",
            "siret": null,
            "montant_total": 78000,
            "note_globale": 6
        }"#;
        let (analysis, _) = normalize_analysis(raw).unwrap();
        assert!(analysis.siret.is_none());
        assert!(analysis.delai_livraison.is_none());
        assert!(analysis.postes.is_empty());
    }

    fn comparison_raw(amounts: &[f64]) -> String {
        let vendors: Vec<Value> = amounts
            .iter()
            .enumerate()
            .map(|(i, m)| {
                json!({
                    "prestataire": format!("Entreprise {}", i + 1),
                    "montant": m,
                    "note": 7
                })
            })
            .collect();
        json!({
            "synthese": {
                "prestataire_recommande": "Entreprise 1",
                "justification": "Meilleur rapport qualité-prix"
            },
            "comparaison_detaillee": vendors,
            "analyse_ecarts": {
                "ecart_prix_max_min": { "montant": 0, "pourcentage": 0 }
            }
        })
        .to_string()
    }

    #[test]
    fn comparison_keeps_one_entry_per_document() {
        let raw = comparison_raw(&[40000.0, 45000.0, 52000.0]);
        let (comparison, _) = normalize_comparison(&raw, 3).unwrap();
        assert_eq!(comparison.comparaison_detaillee.len(), 3);
    }

    #[test]
    fn comparison_vendor_count_mismatch_is_rejected() {
        let raw = comparison_raw(&[40000.0, 45000.0]);
        let err = normalize_comparison(&raw, 3).unwrap_err();
        assert!(matches!(err, ApiError::MalformedOutput { .. }));
    }

    #[test]
    fn price_spread_is_recomputed_from_vendor_amounts() {
        let raw = comparison_raw(&[40000.0, 45000.0, 52000.0]);
        let (comparison, value) = normalize_comparison(&raw, 3).unwrap();
        let spread = &comparison.analyse_ecarts.ecart_prix_max_min;
        assert_eq!(spread.montant, 12000.0);
        assert_eq!(spread.pourcentage, Some(30.0));
        assert_eq!(value["analyse_ecarts"]["ecart_prix_max_min"]["montant"], json!(12000.0));
    }

    #[test]
    fn single_vendor_comparison_has_zero_spread() {
        let raw = comparison_raw(&[40000.0]);
        let (comparison, _) = normalize_comparison(&raw, 1).unwrap();
        assert_eq!(comparison.analyse_ecarts.ecart_prix_max_min.montant, 0.0);
    }
}
