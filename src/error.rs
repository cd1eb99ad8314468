use thiserror::Error;

/// Failures raised by the whitelist core and the authorization gate.
#[derive(Debug, Error)]
pub enum GateError {
    #[error("Invalid address spec: {0}")]
    InvalidSpec(String),

    #[error("Whitelist entry not found: {0}")]
    NotFound(String),

    #[error("Whitelist entry already active: {0}")]
    AlreadyActive(String),

    #[error("Whitelist cache refresh failed: {0}")]
    RefreshFailure(String),

    #[error("Unparsable address: {0}")]
    Unparsable(String),

    #[error("API key expiry out of range: {0} days")]
    InvalidExpiry(i64),

    #[error("Credential invalid")]
    CredentialInvalid,

    #[error("Access denied")]
    AccessDenied,

    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Forbidden")]
    Forbidden,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<GateError> for AppError {
    fn from(err: GateError) -> Self {
        match err {
            GateError::InvalidSpec(spec) => AppError::Validation(format!(
                "{} is neither an IP address nor a CIDR network",
                spec
            )),
            GateError::NotFound(spec) => {
                AppError::NotFound(format!("{} does not exist or is already removed", spec))
            }
            GateError::AlreadyActive(spec) => {
                AppError::Conflict(format!("{} is already whitelisted", spec))
            }
            // Never tell the caller which check failed.
            GateError::AccessDenied | GateError::CredentialInvalid => AppError::Forbidden,
            GateError::Storage(e) => AppError::Database(e),
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;
        use axum::Json;
        use serde_json::json;

        let (status, message) = match &self {
            AppError::Forbidden => (StatusCode::FORBIDDEN, self.to_string()),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            AppError::Conflict(_) => (StatusCode::CONFLICT, self.to_string()),
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            AppError::PayloadTooLarge(_) => (StatusCode::PAYLOAD_TOO_LARGE, self.to_string()),
            AppError::Unavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, self.to_string()),
            _ => {
                tracing::error!("Request failed: {}", self);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
