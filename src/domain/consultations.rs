use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Consultation status
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConsultationStatus {
    Draft,
    Published,
    Closed,
    Awarded,
    Cancelled,
}

impl Default for ConsultationStatus {
    fn default() -> Self {
        Self::Draft
    }
}

impl ConsultationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Published => "published",
            Self::Closed => "closed",
            Self::Awarded => "awarded",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "published" => Self::Published,
            "closed" => Self::Closed,
            "awarded" => Self::Awarded,
            "cancelled" => Self::Cancelled,
            _ => Self::Draft,
        }
    }
}

/// Request DTO for creating a consultation
#[derive(Debug, Clone, Deserialize)]
pub struct CreateConsultationRequest {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub property_name: Option<String>,
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,
}

/// Request DTO for a status transition
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateConsultationStatusRequest {
    pub status: ConsultationStatus,
}

/// Response DTO for consultation
#[derive(Debug, Clone, Serialize)]
pub struct ConsultationResponse {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub property_name: Option<String>,
    pub status: ConsultationStatus,
    pub deadline: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
