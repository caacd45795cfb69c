//! Supplier contract endpoints, organization-scoped.

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::api::pagination::{Paginated, PaginationParams};
use crate::api::response::{Created, DataResponse};
use crate::app::AppState;
use crate::auth::RequireAuth;
use crate::domain::contracts::{ContractResponse, ContractStatus, CreateContractRequest};
use crate::error::ApiError;
use crate::routes::resolve_organization;

#[derive(Debug, sqlx::FromRow)]
struct ContractRow {
    id: Uuid,
    company_id: Option<Uuid>,
    title: String,
    description: Option<String>,
    contract_type: Option<String>,
    status: String,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    amount: Option<sqlx::types::Decimal>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn decimal_opt_to_f64(d: Option<sqlx::types::Decimal>) -> Option<f64> {
    use std::str::FromStr;
    d.map(|d| f64::from_str(&d.to_string()).unwrap_or(0.0))
}

fn to_response(row: ContractRow) -> ContractResponse {
    ContractResponse {
        id: row.id,
        company_id: row.company_id,
        title: row.title,
        description: row.description,
        contract_type: row.contract_type,
        status: ContractStatus::from_str(&row.status),
        start_date: row.start_date,
        end_date: row.end_date,
        amount: decimal_opt_to_f64(row.amount),
        created_at: row.created_at,
        updated_at: row.updated_at,
    }
}

/// GET /contracts
pub async fn list_contracts(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl IntoResponse, ApiError> {
    let organization_id = resolve_organization(&state, &auth).await?;

    let total: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM contracts WHERE organization_id = $1")
            .bind(organization_id)
            .fetch_one(&state.db)
            .await?;

    let rows = sqlx::query_as::<_, ContractRow>(
        r#"
        SELECT id, company_id, title, description, contract_type, status,
               start_date, end_date, amount, created_at, updated_at
        FROM contracts
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

/// GET /contracts/:contract_id
pub async fn get_contract(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Path(contract_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let organization_id = resolve_organization(&state, &auth).await?;

    let row = sqlx::query_as::<_, ContractRow>(
        r#"
        SELECT id, company_id, title, description, contract_type, status,
               start_date, end_date, amount, created_at, updated_at
        FROM contracts
        WHERE id = $1 AND organization_id = $2
        "#,
    )
    .bind(contract_id)
    .bind(organization_id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::not_found("Contrat introuvable"))?;

    Ok(DataResponse::new(to_response(row)))
}

/// POST /contracts
pub async fn create_contract(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Json(request): Json<CreateContractRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let organization_id = resolve_organization(&state, &auth).await?;

    if request.title.trim().is_empty() {
        return Err(ApiError::bad_request("Le titre du contrat est requis"));
    }

    let id = Uuid::new_v4();
    let amount = request
        .amount
        .and_then(sqlx::types::Decimal::from_f64_retain);

    let row = sqlx::query_as::<_, ContractRow>(
        r#"
        INSERT INTO contracts (
            id, organization_id, created_by, company_id, title, description,
            contract_type, status, start_date, end_date, amount
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, 'pending', $8, $9, $10)
        RETURNING id, company_id, title, description, contract_type, status,
                  start_date, end_date, amount, created_at, updated_at
        "#,
    )
    .bind(id)
    .bind(organization_id)
    .bind(auth.user_id)
    .bind(request.company_id)
    .bind(request.title.trim())
    .bind(&request.description)
    .bind(&request.contract_type)
    .bind(request.start_date)
    .bind(request.end_date)
    .bind(amount)
    .fetch_one(&state.db)
    .await?;

    tracing::info!(
        user_id = %auth.user_id,
        organization_id = %organization_id,
        contract_id = %id,
        "Contract created"
    );

    Ok(Created(to_response(row)))
}
