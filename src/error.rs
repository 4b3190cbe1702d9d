use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::fmt;

/// Structured error type shared by commands and HTTP handlers
#[derive(Debug, Clone, Serialize)]
pub struct AppError {
    pub code: ErrorCode,
    #[serde(rename = "error")]
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Error codes for categorizing different error types
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Access errors
    Unauthorized,
    Forbidden,

    // Lookup errors
    NotFound,

    // Validation errors
    InvalidParams,
    Conflict,

    // Service errors
    Database,
    EmailError,
    TemplateError,
    ConfigError,

    // Generic
    Internal,
}

impl ErrorCode {
    pub fn status(self) -> StatusCode {
        match self {
            ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorCode::Forbidden => StatusCode::FORBIDDEN,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::InvalidParams | ErrorCode::Conflict => StatusCode::BAD_REQUEST,
            ErrorCode::Database
            | ErrorCode::EmailError
            | ErrorCode::TemplateError
            | ErrorCode::ConfigError
            | ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if let Some(details) = &self.details {
            write!(f, "{:?}: {} - {}", self.code, self.message, details)
        } else {
            write!(f, "{:?}: {}", self.code, self.message)
        }
    }
}

impl std::error::Error for AppError {}

impl From<AppError> for String {
    fn from(err: AppError) -> String {
        err.to_string()
    }
}

pub type AppResult<T> = Result<T, AppError>;

// Convenience constructors
impl AppError {
    fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn unauthorized() -> Self {
        Self::new(ErrorCode::Unauthorized, "Yetkisiz erişim")
    }

    /// Same message for an unknown email and a wrong password
    pub fn invalid_credentials() -> Self {
        Self::new(ErrorCode::Unauthorized, crate::constants::MSG_INVALID_CREDENTIALS)
    }

    /// Authenticated but not allowed to touch the resource
    pub fn forbidden() -> Self {
        Self::new(ErrorCode::Forbidden, "Bu işlem için yetkiniz yok")
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, msg)
    }

    pub fn record_not_found() -> Self {
        Self::not_found("Kayıt bulunamadı")
    }

    pub fn invalid_params(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidParams, msg)
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::Conflict, msg)
    }

    pub fn database(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::Database, "Veritabanı hatası").with_details(msg)
    }

    pub fn email(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::EmailError, msg)
    }

    pub fn template(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::TemplateError, "Rapor şablonu oluşturulamadı").with_details(msg)
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigError, msg)
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, "Bir hata oluştu. Lütfen tekrar deneyin").with_details(msg)
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn status(&self) -> StatusCode {
        self.code.status()
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("[API] {}", self);
        }
        (status, Json(self)).into_response()
    }
}

// Conversions from common error types
impl From<crate::db::StoreError> for AppError {
    fn from(err: crate::db::StoreError) -> Self {
        use crate::db::StoreError;
        match err {
            StoreError::UniqueViolation(msg) => Self::conflict("Kayıt zaten mevcut").with_details(msg),
            other => Self::database(other.to_string()),
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        crate::db::StoreError::from(err).into()
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::internal(format!("JSON serialization error: {}", err))
    }
}

impl From<tera::Error> for AppError {
    fn from(err: tera::Error) -> Self {
        Self::template(err.to_string())
    }
}
