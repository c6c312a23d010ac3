use crate::logging::redact_secrets;
use serde::Serialize;
use std::fmt;

/// Coarse error classification used by the orchestrator to decide on failover
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    AuthenticationFailure,
    RateLimited,
    BadRequest,
    ServiceUnavailable,
    Unknown,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::AuthenticationFailure => "authentication_failure",
            Self::RateLimited => "rate_limited",
            Self::BadRequest => "bad_request",
            Self::ServiceUnavailable => "service_unavailable",
            Self::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// One failed attempt against one provider, kept for the aggregate error
#[derive(Debug, Clone, Serialize)]
pub struct ProviderFailure {
    pub provider: String,
    pub kind: ErrorKind,
    pub message: String,
}

impl fmt::Display for ProviderFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]: {}", self.provider, self.kind, self.message)
    }
}

/// Application error types
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),
    /// Upstream rejected the credentials (401/403)
    #[error("Authentication failed ({provider}): {message}")]
    Authentication { provider: String, message: String },
    /// Upstream throttled the request (429)
    #[error("Rate limited ({provider}): {message}")]
    RateLimited {
        provider: String,
        message: String,
        retry_after_secs: Option<u64>,
    },
    /// Upstream rejected the request shape (400, 404, 413, 422)
    #[error("Bad request ({provider}): {message}")]
    BadRequest { provider: String, message: String },
    /// Upstream 5xx, timeout or unreachable
    #[error("Service unavailable ({provider}): {message}")]
    ServiceUnavailable { provider: String, message: String },
    /// Any other upstream status
    #[error("Upstream error ({provider}, status {status:?}): {message}")]
    Unknown {
        provider: String,
        status: Option<u16>,
        message: String,
    },
    /// HTTP transport error (preserves reqwest::Error for classification)
    #[error("HTTP request error: {0}")]
    HttpRequest(#[from] reqwest::Error),
    /// Response or payload could not be (de)serialized
    #[error("Conversion error: {0}")]
    ConversionError(String),
    /// No initialized provider is available for selection
    #[error("No healthy providers: {0}")]
    NoHealthyProviders(String),
    /// Every candidate provider was tried and failed
    #[error("All providers failed: {}", format_failures(.failures))]
    AllProvidersFailed { failures: Vec<ProviderFailure> },
    /// Request rejected before reaching any provider
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    /// Caller exceeded its request allowance for the current window
    #[error("Rate limit exceeded for user {user}: {limit} requests per {window_secs}s")]
    UserRateLimited {
        user: String,
        limit: u32,
        window_secs: u64,
        retry_after_secs: Option<u64>,
    },
    /// Export format not recognised
    #[error("Unsupported export format: {0}")]
    UnsupportedFormat(String),
    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(String),
}

fn format_failures(failures: &[ProviderFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl AppError {
    /// Classify a non-success upstream status
    pub fn from_status(provider: &str, status: u16, body: &str, retry_after_secs: Option<u64>) -> Self {
        let provider = provider.to_string();
        let message = extract_error_message(body);
        match status {
            401 | 403 => Self::Authentication { provider, message },
            429 => Self::RateLimited {
                provider,
                message,
                retry_after_secs,
            },
            400 | 404 | 413 | 422 => Self::BadRequest { provider, message },
            408 | 500..=599 => Self::ServiceUnavailable { provider, message },
            _ => Self::Unknown {
                provider,
                status: Some(status),
                message,
            },
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Authentication { .. } => ErrorKind::AuthenticationFailure,
            Self::RateLimited { .. } | Self::UserRateLimited { .. } => ErrorKind::RateLimited,
            Self::BadRequest { .. } | Self::ConfigError(_) | Self::InvalidRequest(_) => {
                ErrorKind::BadRequest
            }
            Self::ServiceUnavailable { .. } | Self::NoHealthyProviders(_) => {
                ErrorKind::ServiceUnavailable
            }
            Self::HttpRequest(e) => {
                if e.is_connect() || e.is_timeout() {
                    return ErrorKind::ServiceUnavailable;
                }
                match e.status() {
                    Some(status) if status.is_server_error() => ErrorKind::ServiceUnavailable,
                    Some(status) if status.as_u16() == 429 => ErrorKind::RateLimited,
                    _ => ErrorKind::Unknown,
                }
            }
            Self::Unknown { .. }
            | Self::ConversionError(_)
            | Self::AllProvidersFailed { .. }
            | Self::UnsupportedFormat(_)
            | Self::InternalError(_) => ErrorKind::Unknown,
        }
    }

    /// Authentication and bad-request failures are caller or configuration
    /// defects and are never retried on another provider.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self.kind(),
            ErrorKind::AuthenticationFailure | ErrorKind::BadRequest
        )
    }
}

/// Pull `error.message` out of a vendor JSON error body, else return the raw body.
/// Vendors echo part of a rejected key back, so the result is redacted.
fn extract_error_message(body: &str) -> String {
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message").or(Some(e)))
                .and_then(|m| m.as_str().map(str::to_string))
        })
        .unwrap_or_else(|| {
            if body.is_empty() {
                "Unknown error".to_string()
            } else {
                body.to_string()
            }
        });
    redact_secrets(&message)
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::ConversionError(format!("JSON error: {}", err))
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::InternalError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
