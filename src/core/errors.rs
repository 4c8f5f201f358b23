use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExchangeError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Invalid response body: {0}")]
    InvalidResponse(String),

    /// Remote-reported failure. `body` is the parsed error payload, usually `{code, msg}`.
    #[error("API error: HTTP {status} - {message}")]
    ApiError {
        status: u16,
        code: Option<i64>,
        message: String,
        body: Value,
    },

    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    #[error("Unable to make an authenticated call because the API key and secret key were not provided")]
    AuthenticationRequired,

    #[error("Not authorized")]
    NotAuthorized,

    #[error("Account data not initialized")]
    AccountDataNotInitialized,

    #[error("Account data already initialized")]
    AlreadyInitialized,

    #[error("User data stream is not ready")]
    StreamNotReady,

    #[error("The specified symbol does not exist: {0}")]
    UnknownSymbol(String),

    #[error("Configuration error: {0}")]
    ConfigError(#[from] crate::core::config::ConfigError),
}

impl ExchangeError {
    /// Build an `ApiError` from a non-2xx status and the raw response text.
    pub fn from_api_response(status: u16, text: &str) -> Self {
        let body = serde_json::from_str::<Value>(text).unwrap_or_else(|_| Value::String(text.to_string()));
        let code = body.get("code").and_then(Value::as_i64);
        let message = body
            .get("msg")
            .and_then(Value::as_str)
            .map_or_else(|| text.to_string(), str::to_string);

        Self::ApiError {
            status,
            code,
            message,
            body,
        }
    }

    /// Connection, DNS and body-parsing failures. The caller decides whether to retry.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::HttpError(_) | Self::NetworkError(_) | Self::InvalidResponse(_)
        )
    }

    /// Failures detected locally without touching the network.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            Self::AuthenticationRequired
                | Self::NotAuthorized
                | Self::AccountDataNotInitialized
                | Self::AlreadyInitialized
                | Self::StreamNotReady
                | Self::UnknownSymbol(_)
                | Self::ConfigError(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_keeps_exchange_payload() {
        let err = ExchangeError::from_api_response(400, r#"{"code":-1021,"msg":"Timestamp outside recvWindow"}"#);
        match err {
            ExchangeError::ApiError {
                status,
                code,
                message,
                body,
            } => {
                assert_eq!(status, 400);
                assert_eq!(code, Some(-1021));
                assert_eq!(message, "Timestamp outside recvWindow");
                assert_eq!(body["code"], -1021);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_api_error_with_non_json_body() {
        let err = ExchangeError::from_api_response(502, "Bad Gateway");
        match err {
            ExchangeError::ApiError {
                code, message, body, ..
            } => {
                assert_eq!(code, None);
                assert_eq!(message, "Bad Gateway");
                assert_eq!(body, Value::String("Bad Gateway".to_string()));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_error_classification() {
        assert!(ExchangeError::NetworkError("reset".into()).is_transport());
        assert!(ExchangeError::InvalidResponse("eof".into()).is_transport());
        assert!(!ExchangeError::NotAuthorized.is_transport());
        assert!(ExchangeError::StreamNotReady.is_local());
        assert!(!ExchangeError::from_api_response(500, "{}").is_local());
    }
}
