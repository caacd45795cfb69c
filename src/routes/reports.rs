//! Report CRUD endpoints, organization-scoped.

use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::api::pagination::{Paginated, PaginationParams};
use crate::api::response::Created;
use crate::app::AppState;
use crate::auth::RequireAuth;
use crate::domain::reports::{CreateReportRequest, ReportResponse};
use crate::error::ApiError;
use crate::routes::resolve_organization;

#[derive(Debug, sqlx::FromRow)]
struct ReportRow {
    id: Uuid,
    title: String,
    report_type: String,
    content: serde_json::Value,
    created_at: DateTime<Utc>,
}

fn to_response(row: ReportRow) -> ReportResponse {
    ReportResponse {
        id: row.id,
        title: row.title,
        report_type: row.report_type,
        content: row.content,
        created_at: row.created_at,
    }
}

/// GET /reports
pub async fn list_reports(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl IntoResponse, ApiError> {
    let organization_id = resolve_organization(&state, &auth).await?;

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM reports WHERE organization_id = $1")
        .bind(organization_id)
        .fetch_one(&state.db)
        .await?;

    let rows = sqlx::query_as::<_, ReportRow>(
        r#"
        SELECT id, title, report_type, content, created_at
        FROM reports
        WHERE organization_id = $1
        ORDER BY created_at DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(organization_id)
    .bind(pagination.limit() as i64)
    .bind(pagination.offset() as i64)
    .fetch_all(&state.db)
    .await?;

    Ok(Paginated::new(
        rows.into_iter().map(to_response).collect(),
        &pagination,
        total as u64,
    ))
}

/// POST /reports
pub async fn create_report(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Json(request): Json<CreateReportRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let organization_id = resolve_organization(&state, &auth).await?;

    if request.title.trim().is_empty() {
        return Err(ApiError::bad_request("Le titre du rapport est requis"));
    }

    let id = Uuid::new_v4();

    let row = sqlx::query_as::<_, ReportRow>(
        r#"
        INSERT INTO reports (id, organization_id, created_by, title, report_type, content)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id, title, report_type, content, created_at
        "#,
    )
    .bind(id)
    .bind(organization_id)
    .bind(auth.user_id)
    .bind(request.title.trim())
    .bind(&request.report_type)
    .bind(&request.content)
    .fetch_one(&state.db)
    .await?;

    tracing::info!(
        user_id = %auth.user_id,
        organization_id = %organization_id,
        report_id = %id,
        "Report created"
    );

    Ok(Created(to_response(row)))
}
