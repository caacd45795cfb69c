pub mod analyses;
pub mod companies;
pub mod comparisons;
pub mod consultations;
pub mod contracts;
pub mod health;
pub mod me;
pub mod reports;

use axum::{routing::get, routing::patch, routing::post, Router};
use std::sync::Arc;
use uuid::Uuid;

use crate::app::AppState;
use crate::auth::AuthContext;
use crate::error::ApiError;

/// Build the API router with all routes
pub fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        // Public routes
        .route("/health", get(health::health_check))
        // Protected routes
        .route("/me", get(me::get_me))
        // Devis analysis pipeline
        .route("/analyze-devis", post(analyses::analyze_devis))
        .route("/analyze-devis", get(analyses::list_analyses))
        .route("/compare-devis", post(comparisons::compare_devis))
        // Reports
        .route("/reports", get(reports::list_reports))
        .route("/reports", post(reports::create_report))
        // Consultations
        .route("/consultations", get(consultations::list_consultations))
        .route("/consultations", post(consultations::create_consultation))
        .route("/consultations/:consultation_id", get(consultations::get_consultation))
        .route(
            "/consultations/:consultation_id/status",
            patch(consultations::update_consultation_status),
        )
        // Contracts
        .route("/contracts", get(contracts::list_contracts))
        .route("/contracts", post(contracts::create_contract))
        .route("/contracts/:contract_id", get(contracts::get_contract))
        // Companies
        .route("/companies", get(companies::list_companies))
        .route("/companies", post(companies::create_company))
        .route("/companies/:company_id", get(companies::get_company))
}

/// Resolve the caller's organization (tenant key). The JWT usually carries
/// it in app_metadata; older tokens require a profiles lookup.
pub(crate) async fn resolve_organization(
    state: &AppState,
    auth: &AuthContext,
) -> Result<Uuid, ApiError> {
    if let Some(organization_id) = auth.organization_id {
        return Ok(organization_id);
    }

    let organization_id: Option<Uuid> =
        sqlx::query_scalar("SELECT organization_id FROM profiles WHERE id = $1")
            .bind(auth.user_id)
            .fetch_optional(&state.db)
            .await?
            .flatten();

    organization_id
        .ok_or_else(|| ApiError::forbidden("Aucune organisation associée à ce compte"))
}
