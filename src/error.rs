//! Typed errors and HTTP mapping.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Raised while building resources or loading an API description. Never per request.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("no adapter found for model '{model}' (engine '{engine}')")]
    NoAdapter { model: String, engine: String },
    #[error("missing reference: {kind} '{id}'")]
    MissingReference { kind: &'static str, id: String },
    #[error("unknown field '{field}' on resource '{resource}'")]
    UnknownField { resource: String, field: String },
    #[error("duplicate resource name: {0}")]
    DuplicateResource(String),
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),
    #[error("config load: {0}")]
    Load(String),
    #[error("validation: {0}")]
    Validation(String),
}

/// Field conversion failures.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FieldError {
    #[error("{0}")]
    InvalidValue(String),
    #[error("related object does not exist")]
    DoesNotExist,
    #[error("field '{0}' does not support hydration")]
    Unsupported(String),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("object does not exist")]
    DoesNotExist,
    #[error("invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
    #[error("missing required field: {0}")]
    MissingRequiredField(String),
    #[error("field '{0}' does not support hydration")]
    Unsupported(String),
    #[error("invalid format: {0}")]
    InvalidFormat(String),
    #[error("object primary key not found")]
    NoPrimaryKey,
    #[error("method not allowed")]
    MethodNotAllowed { allowed: Vec<String> },
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
}

impl AppError {
    /// Attach the field name to a conversion failure.
    pub fn from_field(field: &str, err: FieldError) -> Self {
        match err {
            FieldError::InvalidValue(message) => AppError::InvalidValue {
                field: field.to_string(),
                message,
            },
            FieldError::DoesNotExist => AppError::DoesNotExist,
            FieldError::Unsupported(name) => AppError::Unsupported(name),
        }
    }
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub title: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, title) = match &self {
            AppError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Configuration error"),
            AppError::DoesNotExist => (StatusCode::NOT_FOUND, "Not found"),
            AppError::InvalidValue { .. }
            | AppError::MissingRequiredField(_)
            | AppError::Unsupported(_) => (StatusCode::BAD_REQUEST, "Validation error"),
            AppError::InvalidFormat(_) => (StatusCode::BAD_REQUEST, "Invalid format"),
            AppError::NoPrimaryKey => (StatusCode::BAD_REQUEST, "No PK"),
            AppError::MethodNotAllowed { .. } => (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed"),
            AppError::Db(e) => {
                if let sqlx::Error::RowNotFound = e {
                    (StatusCode::NOT_FOUND, "Not found")
                } else {
                    (StatusCode::INTERNAL_SERVER_ERROR, "Database error")
                }
            }
        };
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = ErrorBody {
            title,
            description: Some(self.to_string()),
        };
        let mut response = (status, Json(body)).into_response();
        if let AppError::MethodNotAllowed { allowed } = &self {
            if let Ok(v) = HeaderValue::from_str(&allowed.join(", ")) {
                response.headers_mut().insert(header::ALLOW, v);
            }
        }
        response
    }
}
