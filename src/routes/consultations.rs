//! Consultation CRUD endpoints, organization-scoped.

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::api::pagination::{Paginated, PaginationParams};
use crate::api::response::{Created, DataResponse};
use crate::app::AppState;
use crate::auth::RequireAuth;
use crate::domain::consultations::{
    ConsultationResponse, ConsultationStatus, CreateConsultationRequest,
    UpdateConsultationStatusRequest,
};
use crate::error::ApiError;
use crate::routes::resolve_organization;

#[derive(Debug, sqlx::FromRow)]
struct ConsultationRow {
    id: Uuid,
    title: String,
    description: Option<String>,
    property_name: Option<String>,
    status: String,
    deadline: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn to_response(row: ConsultationRow) -> ConsultationResponse {
    ConsultationResponse {
        id: row.id,
        title: row.title,
        description: row.description,
        property_name: row.property_name,
        status: ConsultationStatus::from_str(&row.status),
        deadline: row.deadline,
        created_at: row.created_at,
        updated_at: row.updated_at,
    }
}

/// GET /consultations
pub async fn list_consultations(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl IntoResponse, ApiError> {
    let organization_id = resolve_organization(&state, &auth).await?;

    let total: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM consultations WHERE organization_id = $1")
            .bind(organization_id)
            .fetch_one(&state.db)
            .await?;

    let rows = sqlx::query_as::<_, ConsultationRow>(
        r#"
        SELECT id, title, description, property_name, status, deadline,
               created_at, updated_at
        FROM consultations
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

/// GET /consultations/:consultation_id
pub async fn get_consultation(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Path(consultation_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let organization_id = resolve_organization(&state, &auth).await?;

    let row = sqlx::query_as::<_, ConsultationRow>(
        r#"
        SELECT id, title, description, property_name, status, deadline,
               created_at, updated_at
        FROM consultations
        WHERE id = $1 AND organization_id = $2
        "#,
    )
    .bind(consultation_id)
    .bind(organization_id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::not_found("Consultation introuvable"))?;

    Ok(DataResponse::new(to_response(row)))
}

/// POST /consultations
pub async fn create_consultation(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Json(request): Json<CreateConsultationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let organization_id = resolve_organization(&state, &auth).await?;

    if request.title.trim().is_empty() {
        return Err(ApiError::bad_request("Le titre de la consultation est requis"));
    }

    let id = Uuid::new_v4();

    let row = sqlx::query_as::<_, ConsultationRow>(
        r#"
        INSERT INTO consultations (
            id, organization_id, created_by, title, description,
            property_name, status, deadline
        ) VALUES ($1, $2, $3, $4, $5, $6, 'draft', $7)
        RETURNING id, title, description, property_name, status, deadline,
                  created_at, updated_at
        "#,
    )
    .bind(id)
    .bind(organization_id)
    .bind(auth.user_id)
    .bind(request.title.trim())
    .bind(&request.description)
    .bind(&request.property_name)
    .bind(request.deadline)
    .fetch_one(&state.db)
    .await?;

    tracing::info!(
        user_id = %auth.user_id,
        organization_id = %organization_id,
        consultation_id = %id,
        "Consultation created"
    );

    Ok(Created(to_response(row)))
}

/// PATCH /consultations/:consultation_id/status
pub async fn update_consultation_status(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Path(consultation_id): Path<Uuid>,
    Json(request): Json<UpdateConsultationStatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let organization_id = resolve_organization(&state, &auth).await?;

    let row = sqlx::query_as::<_, ConsultationRow>(
        r#"
        UPDATE consultations
        SET status = $3, updated_at = NOW()
        WHERE id = $1 AND organization_id = $2
        RETURNING id, title, description, property_name, status, deadline,
                  created_at, updated_at
        "#,
    )
    .bind(consultation_id)
    .bind(organization_id)
    .bind(request.status.as_str())
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::not_found("Consultation introuvable"))?;

    tracing::info!(
        consultation_id = %consultation_id,
        status = request.status.as_str(),
        "Consultation status updated"
    );

    Ok(DataResponse::new(to_response(row)))
}
