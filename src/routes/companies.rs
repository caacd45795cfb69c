//! Vendor directory endpoints, organization-scoped.

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
use crate::domain::companies::{CompanyResponse, CreateCompanyRequest};
use crate::error::ApiError;
use crate::routes::resolve_organization;

#[derive(Debug, sqlx::FromRow)]
struct CompanyRow {
    id: Uuid,
    name: String,
    siret: Option<String>,
    email: Option<String>,
    phone: Option<String>,
    specialty: Option<String>,
    created_at: DateTime<Utc>,
}

fn to_response(row: CompanyRow) -> CompanyResponse {
    CompanyResponse {
        id: row.id,
        name: row.name,
        siret: row.siret,
        email: row.email,
        phone: row.phone,
        specialty: row.specialty,
        created_at: row.created_at,
    }
}

/// GET /companies
pub async fn list_companies(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl IntoResponse, ApiError> {
    let organization_id = resolve_organization(&state, &auth).await?;

    let total: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM companies WHERE organization_id = $1")
            .bind(organization_id)
            .fetch_one(&state.db)
            .await?;

    let rows = sqlx::query_as::<_, CompanyRow>(
        r#"
        SELECT id, name, siret, email, phone, specialty, created_at
        FROM companies
        WHERE organization_id = $1
        ORDER BY name
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

/// GET /companies/:company_id
pub async fn get_company(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Path(company_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let organization_id = resolve_organization(&state, &auth).await?;

    let row = sqlx::query_as::<_, CompanyRow>(
        r#"
        SELECT id, name, siret, email, phone, specialty, created_at
        FROM companies
        WHERE id = $1 AND organization_id = $2
        "#,
    )
    .bind(company_id)
    .bind(organization_id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::not_found("Entreprise introuvable"))?;

    Ok(DataResponse::new(to_response(row)))
}

/// POST /companies
pub async fn create_company(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Json(request): Json<CreateCompanyRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let organization_id = resolve_organization(&state, &auth).await?;

    if request.name.trim().is_empty() {
        return Err(ApiError::bad_request("Le nom de l'entreprise est requis"));
    }

    let id = Uuid::new_v4();

    let row = sqlx::query_as::<_, CompanyRow>(
        r#"
        INSERT INTO companies (id, organization_id, name, siret, email, phone, specialty)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING id, name, siret, email, phone, specialty, created_at
        "#,
    )
    .bind(id)
    .bind(organization_id)
    .bind(request.name.trim())
    .bind(&request.siret)
    .bind(&request.email)
    .bind(&request.phone)
    .bind(&request.specialty)
    .fetch_one(&state.db)
    .await?;

    tracing::info!(
        user_id = %auth.user_id,
        organization_id = %organization_id,
        company_id = %id,
        "Company created"
    );

    Ok(Created(to_response(row)))
}
