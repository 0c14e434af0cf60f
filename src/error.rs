use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

/// Methods the settings endpoint answers, as advertised in the `Allow` header.
pub(crate) const ALLOWED_METHODS: &str = "GET, POST, DELETE";

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub(crate) struct APIErrorResponse {
    pub(crate) error: String,
}

/// The possible errors returned by the settings API
#[derive(Debug, thiserror::Error)]
pub enum APIError {
    #[error("Service name is required")]
    MissingServiceName,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Service not found")]
    ServiceNotFound,

    #[error("Method {0} not allowed")]
    MethodNotAllowed(Method),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("IO error: {0}")]
    IO(#[from] std::io::Error),

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl From<sea_orm::DbErr> for APIError {
    fn from(e: sea_orm::DbErr) -> Self {
        APIError::StorageUnavailable(e.to_string())
    }
}

impl From<JsonRejection> for APIError {
    fn from(e: JsonRejection) -> Self {
        APIError::InvalidRequest(e.body_text())
    }
}

impl From<QueryRejection> for APIError {
    fn from(e: QueryRejection) -> Self {
        APIError::InvalidRequest(e.body_text())
    }
}

impl APIError {
    pub(crate) fn status_code(&self) -> StatusCode {
        match self {
            APIError::MissingServiceName | APIError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            APIError::ServiceNotFound => StatusCode::NOT_FOUND,
            APIError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            APIError::StorageUnavailable(_) | APIError::IO(_) | APIError::Unexpected(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message safe to hand back to the browser; backend details stay in the logs.
    pub(crate) fn user_message(&self) -> String {
        match self {
            APIError::StorageUnavailable(_) => {
                "Database connection failed. Please check your database configuration.".to_string()
            }
            APIError::IO(_) | APIError::Unexpected(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for APIError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("{}", self);
        } else {
            tracing::debug!("Client error: {}", self);
        }

        let body = Json(APIErrorResponse {
            error: self.user_message(),
        });
        let mut response = (status, body).into_response();
        if let APIError::MethodNotAllowed(_) = self {
            response
                .headers_mut()
                .insert(header::ALLOW, HeaderValue::from_static(ALLOWED_METHODS));
        }
        response
    }
}
