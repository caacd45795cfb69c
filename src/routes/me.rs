//! Authenticated user profile endpoint.

use axum::{extract::State, response::IntoResponse, Json};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::app::AppState;
use crate::auth::RequireAuth;
use crate::domain::profiles::ProfileResponse;
use crate::error::ApiError;

#[derive(Debug, sqlx::FromRow)]
struct ProfileRow {
    id: Uuid,
    organization_id: Uuid,
    email: Option<String>,
    full_name: Option<String>,
    role: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// GET /me
pub async fn get_me(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    let row = sqlx::query_as::<_, ProfileRow>(
        r#"
        SELECT id, organization_id, email, full_name, role, created_at, updated_at
        FROM profiles
        WHERE id = $1
        "#,
    )
    .bind(auth.user_id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::not_found("Profil introuvable"))?;

    Ok(Json(ProfileResponse {
        id: row.id,
        organization_id: row.organization_id,
        email: row.email.or_else(|| auth.email.clone()),
        full_name: row.full_name,
        role: row.role,
        created_at: row.created_at,
        updated_at: row.updated_at,
    }))
}
