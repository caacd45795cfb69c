//! Devis comparison endpoint.
//!
//! POST /compare-devis runs one model call across every submitted document
//! (the documents are concatenated into a single prompt, not analyzed
//! independently), normalizes the reply, enforces the per-vendor invariants,
//! and persists the result without blocking the response.

use axum::{extract::State, response::IntoResponse, Json};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::app::AppState;
use crate::auth::RequireAuth;
use crate::domain::comparison::{CompareDevisRequest, CompareDevisResponse, SavedComparison};
use crate::error::{ApiError, ApiResult};
use crate::routes::resolve_organization;
use crate::services::llm_client::{Completion, COMPARISON_MAX_TOKENS};
use crate::services::{normalize, prompts};

/// Upper bound on documents per comparison.
const MAX_COMPARISON_DOCUMENTS: usize = 5;

#[derive(Debug, sqlx::FromRow)]
struct ComparisonRow {
    id: Uuid,
    document_count: i32,
    filenames: Vec<String>,
    comparison: serde_json::Value,
    tokens_used: i32,
    created_at: DateTime<Utc>,
}

/// POST /compare-devis
pub async fn compare_devis(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Json(request): Json<CompareDevisRequest>,
) -> ApiResult<impl IntoResponse> {
    let organization_id = resolve_organization(&state, &auth).await?;

    if request.documents.is_empty() {
        return Err(ApiError::bad_request("Aucun document fourni"));
    }
    if request.documents.len() > MAX_COMPARISON_DOCUMENTS {
        return Err(ApiError::bad_request(format!(
            "Maximum {} devis par comparaison",
            MAX_COMPARISON_DOCUMENTS
        )));
    }

    let documents: Vec<(String, String)> = request
        .documents
        .into_iter()
        .map(|d| (d.filename, d.content))
        .collect();
    let filenames: Vec<String> = documents.iter().map(|(name, _)| name.clone()).collect();

    let pair = prompts::build_comparison_prompt(&documents)?;

    let completion = state
        .llm
        .complete(&pair.system, &pair.user, COMPARISON_MAX_TOKENS)
        .await?;

    let (comparison, comparison_json) =
        normalize::normalize_comparison(&completion.content, documents.len())?;

    // Non-blocking audit write, same policy as single analyses.
    let saved_comparison = match persist_comparison(
        &state,
        organization_id,
        auth.user_id,
        &filenames,
        &comparison_json,
        &completion,
    )
    .await
    {
        Ok(saved) => Some(saved),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to persist devis comparison");
            None
        }
    };

    tracing::info!(
        user_id = %auth.user_id,
        organization_id = %organization_id,
        document_count = filenames.len(),
        recommended = %comparison.synthese.prestataire_recommande,
        tokens_used = completion.tokens_used,
        "Devis compared"
    );

    Ok(Json(CompareDevisResponse {
        message: "Comparaison des devis terminée".to_string(),
        comparison,
        saved_comparison,
        tokens_used: completion.tokens_used,
        files_analyzed: filenames,
    }))
}

async fn persist_comparison(
    state: &AppState,
    organization_id: Uuid,
    user_id: Uuid,
    filenames: &[String],
    comparison_json: &serde_json::Value,
    completion: &Completion,
) -> Result<SavedComparison, ApiError> {
    let id = Uuid::new_v4();

    let row = sqlx::query_as::<_, ComparisonRow>(
        r#"
        INSERT INTO devis_comparisons (
            id, organization_id, user_id, document_count, filenames,
            comparison, raw_output, tokens_used
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING id, document_count, filenames, comparison, tokens_used, created_at
        "#,
    )
    .bind(id)
    .bind(organization_id)
    .bind(user_id)
    .bind(filenames.len() as i32)
    .bind(filenames)
    .bind(comparison_json)
    .bind(&completion.content)
    .bind(completion.tokens_used as i32)
    .fetch_one(&state.db)
    .await?;

    Ok(SavedComparison {
        id: row.id,
        document_count: row.document_count,
        filenames: row.filenames,
        comparison: row.comparison,
        tokens_used: row.tokens_used,
        created_at: row.created_at,
    })
}
