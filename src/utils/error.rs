use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::json;
use std::fmt;

use provedores::ProvedorError;
use whatsapp::WhatsAppError;

#[derive(Debug)]
pub enum AppError {
    ValidationError(String),
    RateLimited { retry_after_secs: u64 },
    /// Envio sem sessão WhatsApp conectada
    NotConnected(String),
    /// Operação incompatível com o estado da sessão
    SessionState(String),
    /// Erro devolvido pelo fornecedor (painel, Evolution API, Z-API)
    UpstreamError(String),
    /// Integração desabilitada na configuração
    ServiceUnavailable(String),
    ConfigError(String),
    JsonError(serde_json::Error),
    HttpError(reqwest::Error),
    InternalError(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            AppError::RateLimited { retry_after_secs } => {
                write!(f, "Rate limit exceeded, retry after {}s", retry_after_secs)
            }
            AppError::NotConnected(msg) => write!(f, "Not connected: {}", msg),
            AppError::SessionState(msg) => write!(f, "Session state error: {}", msg),
            AppError::UpstreamError(msg) => write!(f, "Upstream error: {}", msg),
            AppError::ServiceUnavailable(msg) => write!(f, "Service unavailable: {}", msg),
            AppError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            AppError::JsonError(err) => write!(f, "JSON error: {}", err),
            AppError::HttpError(err) => write!(f, "HTTP error: {}", err),
            AppError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::JsonError(err)
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::HttpError(err)
    }
}

impl From<ProvedorError> for AppError {
    fn from(err: ProvedorError) -> Self {
        match err {
            ProvedorError::InvalidBaseUrl(msg) => AppError::ValidationError(msg),
            ProvedorError::InvalidStrategy(msg) => {
                AppError::ConfigError(format!("invalid test strategy: {}", msg))
            }
            other => AppError::ConfigError(other.to_string()),
        }
    }
}

impl From<WhatsAppError> for AppError {
    fn from(err: WhatsAppError) -> Self {
        match err {
            WhatsAppError::NotConnected => AppError::NotConnected(err.to_string()),
            WhatsAppError::NoSession | WhatsAppError::InvalidState(_) => {
                AppError::SessionState(err.to_string())
            }
            WhatsAppError::InvalidPhone(_) => AppError::ValidationError(err.to_string()),
            WhatsAppError::Provider { .. } | WhatsAppError::Json(_) => {
                AppError::UpstreamError(err.to_string())
            }
            WhatsAppError::Http(e) => AppError::HttpError(e),
            WhatsAppError::ConfigError(msg) => AppError::ConfigError(msg),
            WhatsAppError::Storage(msg) => AppError::InternalError(msg),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let retry_after = match &self {
            AppError::RateLimited { retry_after_secs } => Some(*retry_after_secs),
            _ => None,
        };

        let (status, error_message) = match self {
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
            err @ AppError::RateLimited { .. } => (StatusCode::TOO_MANY_REQUESTS, err.to_string()),
            AppError::NotConnected(msg) => (StatusCode::CONFLICT, msg),
            AppError::SessionState(msg) => (StatusCode::CONFLICT, msg),
            AppError::UpstreamError(msg) => (StatusCode::BAD_GATEWAY, msg),
            AppError::ServiceUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            AppError::ConfigError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            AppError::JsonError(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            AppError::HttpError(err) => (StatusCode::BAD_GATEWAY, err.to_string()),
            AppError::InternalError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = json!({
            "error": error_message,
            "status": status.as_u16()
        });

        let mut response = (status, axum::Json(body)).into_response();
        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (AppError::ValidationError("x".into()), 400),
            (AppError::RateLimited { retry_after_secs: 3 }, 429),
            (AppError::ServiceUnavailable("x".into()), 503),
            (AppError::from(WhatsAppError::NotConnected), 409),
            (
                AppError::from(WhatsAppError::Provider {
                    status: 500,
                    message: "boom".into(),
                }),
                502,
            ),
            (
                AppError::from(ProvedorError::InvalidBaseUrl("".into())),
                400,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(err.into_response().status().as_u16(), expected);
        }
    }

    #[test]
    fn test_rate_limited_sets_retry_after() {
        let response = AppError::RateLimited { retry_after_secs: 7 }.into_response();
        assert_eq!(response.headers()[header::RETRY_AFTER], "7");
    }
}
