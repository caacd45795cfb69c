use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Request DTO for creating a report
#[derive(Debug, Clone, Deserialize)]
pub struct CreateReportRequest {
    pub title: String,
    pub report_type: String,
    pub content: serde_json::Value,
}

/// Response DTO for report
#[derive(Debug, Clone, Serialize)]
pub struct ReportResponse {
    pub id: Uuid,
    pub title: String,
    pub report_type: String,
    pub content: serde_json::Value,
    pub created_at: DateTime<Utc>,
}
