use super::Claims;
use uuid::Uuid;

/// Authenticated user context extracted from JWT.
///
/// Every handler receives this as a request-scoped value; there is no
/// global session state.
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// User ID (from JWT sub claim)
    pub user_id: Uuid,

    /// User email if available
    pub email: Option<String>,

    /// User role if specified
    pub role: Option<String>,

    /// Organization (tenant) id, when the token carries it in app_metadata.
    /// Handlers fall back to a profiles lookup when absent.
    pub organization_id: Option<Uuid>,
}

impl AuthContext {
    pub fn from_claims(claims: &Claims) -> Result<Self, &'static str> {
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| "Invalid user ID in token")?;

        Ok(Self {
            user_id,
            email: claims.email.clone(),
            role: claims.role.clone(),
            organization_id: claims
                .app_metadata
                .as_ref()
                .and_then(|m| m.organization_id),
        })
    }
}
