//! Devis analysis endpoints.
//!
//! POST /analyze-devis runs the full pipeline for one document: input
//! resolution (multipart upload, stored document, remote URL, or inline
//! text), PDF text extraction, prompt construction, one model call, output
//! normalization, then a non-blocking audit insert. The caller gets their
//! analysis even when the insert fails.

use axum::{
    extract::{FromRequest, Multipart, Query, Request, State},
    http::header::CONTENT_TYPE,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::app::AppState;
use crate::auth::RequireAuth;
use crate::domain::analysis::{
    AnalyzeDevisRequest, AnalyzeDevisResponse, DevisAnalysis, ListAnalysesQuery,
    ListAnalysesResponse, SavedAnalysis,
};
use crate::error::{ApiError, ApiResult};
use crate::routes::resolve_organization;
use crate::services::llm_client::{Completion, ANALYSIS_MAX_TOKENS};
use crate::services::{extractor, normalize, prompts};

// ============================================================================
// Database Row Types
// ============================================================================

#[derive(Debug, sqlx::FromRow)]
struct AnalysisRow {
    id: Uuid,
    document_id: Option<Uuid>,
    filename: Option<String>,
    analysis: serde_json::Value,
    note_globale: i32,
    montant_total: sqlx::types::Decimal,
    tokens_used: i32,
    created_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct DocumentRow {
    id: Uuid,
    filename: String,
    storage_url: String,
    extracted_text: Option<String>,
}

fn decimal_to_f64(d: sqlx::types::Decimal) -> f64 {
    use std::str::FromStr;
    f64::from_str(&d.to_string()).unwrap_or(0.0)
}

fn to_saved(row: AnalysisRow) -> SavedAnalysis {
    SavedAnalysis {
        id: row.id,
        document_id: row.document_id,
        filename: row.filename,
        analysis: row.analysis,
        note_globale: row.note_globale,
        montant_total: decimal_to_f64(row.montant_total),
        tokens_used: row.tokens_used,
        created_at: row.created_at,
    }
}

// ============================================================================
// Input resolution
// ============================================================================

/// Resolved analysis input: the text to analyze plus request metadata.
struct AnalysisInput {
    text: String,
    filename: Option<String>,
    document_id: Option<Uuid>,
    /// Present when the text was produced by PDF extraction in this request.
    extracted_text: Option<String>,
}

async fn read_devis_upload(mut multipart: Multipart) -> Result<(String, Vec<u8>), ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Corps multipart invalide: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field
            .file_name()
            .unwrap_or("devis.pdf")
            .to_string();

        if let Some(content_type) = field.content_type() {
            if !extractor::is_pdf_mime(content_type) {
                return Err(ApiError::bad_request(
                    "Type de fichier invalide (PDF attendu)",
                ));
            }
        }

        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(format!("Lecture du fichier impossible: {}", e)))?
            .to_vec();

        return Ok((filename, bytes));
    }

    Err(ApiError::bad_request("Champ 'file' manquant"))
}

async fn download_bytes(
    state: &AppState,
    url: &str,
    authenticated: bool,
) -> Result<Vec<u8>, ApiError> {
    let mut request = state.http_client.get(url);
    if authenticated {
        request = request.bearer_auth(&state.settings.supabase_service_role_key);
    }

    let response = request
        .send()
        .await
        .map_err(|e| ApiError::bad_request(format!("Téléchargement du document impossible: {}", e)))?;

    if !response.status().is_success() {
        return Err(ApiError::bad_request(format!(
            "Téléchargement du document impossible (HTTP {})",
            response.status()
        )));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| ApiError::bad_request(format!("Lecture du document impossible: {}", e)))?;

    Ok(bytes.to_vec())
}

async fn resolve_json_input(
    state: &AppState,
    organization_id: Uuid,
    body: AnalyzeDevisRequest,
) -> Result<AnalysisInput, ApiError> {
    if let Some(text) = body.text {
        return Ok(AnalysisInput {
            text,
            filename: None,
            document_id: None,
            extracted_text: None,
        });
    }

    if let Some(raw_url) = body.document_url {
        let url = url::Url::parse(&raw_url)
            .map_err(|_| ApiError::bad_request("documentUrl invalide"))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ApiError::bad_request("documentUrl invalide"));
        }

        let bytes = download_bytes(state, url.as_str(), false).await?;
        let text = extractor::extract_text(&bytes)?;
        let filename = url
            .path_segments()
            .and_then(|segments| segments.last())
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string());
        return Ok(AnalysisInput {
            text: text.clone(),
            filename,
            document_id: None,
            extracted_text: Some(text),
        });
    }

    if let Some(document_id) = body.document_id {
        let document = sqlx::query_as::<_, DocumentRow>(
            "SELECT id, filename, storage_url, extracted_text FROM documents \
             WHERE id = $1 AND organization_id = $2",
        )
        .bind(document_id)
        .bind(organization_id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("Document introuvable"))?;

        // Reuse text extracted at upload time when available.
        if let Some(text) = document
            .extracted_text
            .filter(|t| !t.trim().is_empty())
        {
            return Ok(AnalysisInput {
                text,
                filename: Some(document.filename),
                document_id: Some(document.id),
                extracted_text: None,
            });
        }

        let bytes = download_bytes(state, &document.storage_url, true).await?;
        let text = extractor::extract_text(&bytes)?;
        return Ok(AnalysisInput {
            text: text.clone(),
            filename: Some(document.filename),
            document_id: Some(document.id),
            extracted_text: Some(text),
        });
    }

    Err(ApiError::bad_request(
        "documentId, documentUrl ou text requis",
    ))
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /analyze-devis
///
/// Accepts either multipart/form-data with a `file` field or a JSON body
/// `{ documentId | documentUrl | text }`.
pub async fn analyze_devis(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    req: Request,
) -> ApiResult<impl IntoResponse> {
    let organization_id = resolve_organization(&state, &auth).await?;

    let content_type = req
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    let input = if content_type.starts_with("multipart/form-data") {
        let multipart = Multipart::from_request(req, &state)
            .await
            .map_err(|e| ApiError::bad_request(format!("Corps multipart invalide: {}", e)))?;
        let (filename, bytes) = read_devis_upload(multipart).await?;
        let text = extractor::extract_text(&bytes)?;
        AnalysisInput {
            text: text.clone(),
            filename: Some(filename),
            document_id: None,
            extracted_text: Some(text),
        }
    } else {
        let Json(body) = Json::<AnalyzeDevisRequest>::from_request(req, &state)
            .await
            .map_err(|e| ApiError::bad_request(format!("Corps JSON invalide: {}", e)))?;
        resolve_json_input(&state, organization_id, body).await?
    };

    let pair = prompts::build_analysis_prompt(&input.text)?;

    let completion = state
        .llm
        .complete(&pair.system, &pair.user, ANALYSIS_MAX_TOKENS)
        .await?;

    let (analysis, analysis_json) = normalize::normalize_analysis(&completion.content)?;

    // Non-blocking audit write: the analysis is returned even if it fails.
    let saved_analysis = match persist_analysis(
        &state,
        organization_id,
        auth.user_id,
        &input,
        &analysis,
        &analysis_json,
        &completion,
    )
    .await
    {
        Ok(saved) => Some(saved),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to persist devis analysis");
            None
        }
    };

    tracing::info!(
        user_id = %auth.user_id,
        organization_id = %organization_id,
        entreprise = %analysis.entreprise,
        note_globale = analysis.note_globale,
        tokens_used = completion.tokens_used,
        "Devis analyzed"
    );

    Ok(Json(AnalyzeDevisResponse {
        message: "Analyse du devis terminée".to_string(),
        analysis,
        extracted_text: input.extracted_text,
        saved_analysis,
        tokens_used: completion.tokens_used,
    }))
}

#[allow(clippy::too_many_arguments)]
async fn persist_analysis(
    state: &AppState,
    organization_id: Uuid,
    user_id: Uuid,
    input: &AnalysisInput,
    analysis: &DevisAnalysis,
    analysis_json: &serde_json::Value,
    completion: &Completion,
) -> Result<SavedAnalysis, ApiError> {
    let id = Uuid::new_v4();
    let montant_total =
        sqlx::types::Decimal::from_f64_retain(analysis.montant_total).unwrap_or_default();

    let row = sqlx::query_as::<_, AnalysisRow>(
        r#"
        INSERT INTO devis_analyses (
            id, organization_id, user_id, document_id, filename, entreprise,
            montant_total, note_globale, analysis, raw_output, tokens_used
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        RETURNING id, document_id, filename, analysis, note_globale,
                  montant_total, tokens_used, created_at
        "#,
    )
    .bind(id)
    .bind(organization_id)
    .bind(user_id)
    .bind(input.document_id)
    .bind(&input.filename)
    .bind(&analysis.entreprise)
    .bind(montant_total)
    .bind(analysis.note_globale)
    .bind(analysis_json)
    .bind(&completion.content)
    .bind(completion.tokens_used as i32)
    .fetch_one(&state.db)
    .await?;

    Ok(to_saved(row))
}

/// GET /analyze-devis
///
/// List persisted analyses for the caller's organization, newest first.
pub async fn list_analyses(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Query(query): Query<ListAnalysesQuery>,
) -> ApiResult<impl IntoResponse> {
    let organization_id = resolve_organization(&state, &auth).await?;
    let limit = query.limit.unwrap_or(50).min(100) as i64;

    let total: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM devis_analyses \
         WHERE organization_id = $1 AND ($2::uuid IS NULL OR document_id = $2)",
    )
    .bind(organization_id)
    .bind(query.document_id)
    .fetch_one(&state.db)
    .await?;

    let rows = sqlx::query_as::<_, AnalysisRow>(
        r#"
        SELECT id, document_id, filename, analysis, note_globale,
               montant_total, tokens_used, created_at
        FROM devis_analyses
        WHERE organization_id = $1 AND ($2::uuid IS NULL OR document_id = $2)
        ORDER BY created_at DESC
        LIMIT $3
        "#,
    )
    .bind(organization_id)
    .bind(query.document_id)
    .bind(limit)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(ListAnalysesResponse {
        analyses: rows.into_iter().map(to_saved).collect(),
        total,
    }))
}
