use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::models::TicketStatus;

/// Error body returned by the backend on failure.
///
/// Only `message` is relied upon; everything else is best effort.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ErrorResponse {
    /// Best human readable text in the body, if any.
    pub fn text(&self) -> Option<&str> {
        self.message
            .as_deref()
            .or(self.error.as_deref())
            .map(str::trim)
            .filter(|msg| !msg.is_empty())
    }
}

/// Operations that cross the network boundary.
///
/// Each carries the message shown when the server gives no explanation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum ApiOperation {
    CreateTicket,
    TrackTicket,
    CancelTicket,
    ListTickets,
    UpdateStatus,
    DeleteTicket,
    DailyDashboard,
    MonthlyStats,
    MonthlyRequests,
    AvailableMonths,
    Login,
    Logout,
}

impl ApiOperation {
    pub fn fallback_message(&self) -> &'static str {
        match self {
            Self::CreateTicket => "เกิดข้อผิดพลาดในการแจ้งซ่อม",
            Self::TrackTicket => "ไม่พบคำขอซ่อมนี้",
            Self::CancelTicket => "ไม่สามารถยกเลิกการแจ้งซ่อมได้",
            Self::UpdateStatus => "ไม่สามารถอัพเดทได้",
            Self::DeleteTicket => "ไม่สามารถดำเนินการได้",
            Self::Login => "เข้าสู่ระบบไม่สำเร็จ",
            Self::ListTickets
            | Self::DailyDashboard
            | Self::MonthlyStats
            | Self::MonthlyRequests
            | Self::AvailableMonths
            | Self::Logout => "ไม่สามารถโหลดข้อมูลได้",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid status transition: {current} -> {requested}")]
    InvalidTransition {
        current: TicketStatus,
        requested: TicketStatus,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("External API error ({status}): {message}")]
    ExternalApiError { status: u16, message: String },

    #[error("Data integrity fault: {0}")]
    DataIntegrity(String),

    #[error("Request already in flight: {0}")]
    DuplicateSubmission(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Session store error: {0}")]
    SessionStore(String),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ServiceError::SerializationError(err.to_string())
        } else {
            ServiceError::NetworkError(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        ServiceError::SerializationError(err.to_string())
    }
}

impl ServiceError {
    /// Maps a failed HTTP response to an error.
    ///
    /// This is the single source of truth for status-to-error mapping.
    pub fn from_response(status: StatusCode, body: &str, operation: ApiOperation) -> Self {
        let parsed: ErrorResponse = serde_json::from_str(body).unwrap_or_default();
        let message = parsed
            .text()
            .unwrap_or_else(|| operation.fallback_message())
            .to_string();

        match status {
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                Self::ValidationError(message)
            }
            StatusCode::UNAUTHORIZED => Self::Unauthorized(message),
            StatusCode::FORBIDDEN => Self::Forbidden(message),
            StatusCode::NOT_FOUND => Self::NotFound(message),
            _ => Self::ExternalApiError {
                status: status.as_u16(),
                message,
            },
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Text suitable for showing to the person at the keyboard.
    ///
    /// Internal failures collapse to a generic message so transport details do
    /// not leak into the UI.
    pub fn user_message(&self) -> String {
        match self {
            Self::ValidationError(msg)
            | Self::InvalidInput(msg)
            | Self::NotFound(msg)
            | Self::Unauthorized(msg)
            | Self::Forbidden(msg)
            | Self::DuplicateSubmission(msg) => msg.clone(),
            Self::ExternalApiError { message, .. } => message.clone(),
            Self::InvalidTransition { current, requested } => format!(
                "ไม่สามารถเปลี่ยนสถานะจาก \"{}\" เป็น \"{}\" ได้",
                current.label(),
                requested.label()
            ),
            Self::NetworkError(_) => "ไม่สามารถเชื่อมต่อเซิร์ฟเวอร์ได้".to_string(),
            Self::DataIntegrity(_)
            | Self::SerializationError(_)
            | Self::SessionStore(_)
            | Self::Other(_) => "เกิดข้อผิดพลาดภายในระบบ".to_string(),
        }
    }
}
