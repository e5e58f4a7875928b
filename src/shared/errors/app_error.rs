use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "message")]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Persistence error: {0}")]
    PersistenceError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl AppError {
    /// Timeouts, throttling and 5xx responses are worth another attempt.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AppError::RateLimited(_) | AppError::Timeout(_) | AppError::UpstreamUnavailable(_)
        )
    }

    /// Errors after which the fetch gateway switches to its secondary strategy.
    pub fn triggers_fallback(&self) -> bool {
        matches!(self, AppError::ParseError(_)) || self.is_transient()
    }

    /// Status code a thin HTTP layer should answer with.
    pub fn http_status(&self) -> u16 {
        match self {
            AppError::ValidationError(_) => 400,
            AppError::NotFound(_) => 404,
            AppError::Conflict(_) => 409,
            AppError::RateLimited(_) => 429,
            AppError::Timeout(_) => 504,
            AppError::UpstreamUnavailable(_) | AppError::ParseError(_) => 502,
            AppError::PersistenceError(_)
            | AppError::SerializationError(_)
            | AppError::InternalError(_) => 500,
        }
    }

    /// Short machine-readable name of the variant.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "not_found",
            AppError::RateLimited(_) => "rate_limited",
            AppError::Timeout(_) => "timeout",
            AppError::UpstreamUnavailable(_) => "upstream_unavailable",
            AppError::ParseError(_) => "parse_error",
            AppError::PersistenceError(_) => "persistence_error",
            AppError::ValidationError(_) => "validation_error",
            AppError::Conflict(_) => "conflict",
            AppError::SerializationError(_) => "serialization_error",
            AppError::InternalError(_) => "internal_error",
        }
    }
}

impl From<diesel::result::Error> for AppError {
    fn from(err: diesel::result::Error) -> Self {
        match err {
            diesel::result::Error::NotFound => {
                AppError::NotFound("Record not found in database".to_string())
            }
            _ => AppError::PersistenceError(err.to_string()),
        }
    }
}

impl From<diesel::r2d2::PoolError> for AppError {
    fn from(err: diesel::r2d2::PoolError) -> Self {
        AppError::PersistenceError(format!("Database pool error: {}", err))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AppError::Timeout(format!("Request timed out: {}", err))
        } else if err.is_connect() {
            AppError::UpstreamUnavailable(format!("Failed to connect to upstream: {}", err))
        } else if let Some(status) = err.status() {
            match status.as_u16() {
                404 => AppError::NotFound("Upstream resource not found".to_string()),
                429 => AppError::RateLimited("Too many requests".to_string()),
                _ => AppError::UpstreamUnavailable(format!("HTTP {}: {}", status, err)),
            }
        } else if err.is_decode() {
            AppError::ParseError(err.to_string())
        } else {
            AppError::UpstreamUnavailable(err.to_string())
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::SerializationError(err.to_string())
    }
}

impl From<chrono::ParseError> for AppError {
    fn from(err: chrono::ParseError) -> Self {
        AppError::ValidationError(format!("Invalid date: {}", err))
    }
}

impl From<std::num::ParseIntError> for AppError {
    fn from(err: std::num::ParseIntError) -> Self {
        AppError::ValidationError(format!("Invalid number: {}", err))
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        AppError::InternalError(format!("Background task failed: {}", err))
    }
}

// Result type alias for convenience
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(AppError::Timeout("t".into()).is_transient());
        assert!(AppError::RateLimited("r".into()).is_transient());
        assert!(AppError::UpstreamUnavailable("u".into()).is_transient());
        assert!(!AppError::NotFound("n".into()).is_transient());
        assert!(!AppError::ParseError("p".into()).is_transient());
    }

    #[test]
    fn test_not_found_never_falls_back() {
        assert!(!AppError::NotFound("gone".into()).triggers_fallback());
        assert!(AppError::ParseError("shape".into()).triggers_fallback());
    }

    #[test]
    fn test_http_status_mapping() {
        assert_eq!(AppError::ValidationError("bad".into()).http_status(), 400);
        assert_eq!(AppError::Conflict("busy".into()).http_status(), 409);
        assert_eq!(AppError::PersistenceError("db".into()).http_status(), 500);
    }

    #[test]
    fn test_serialized_shape() {
        let json = serde_json::to_value(AppError::NotFound("team 1".into())).unwrap();
        assert_eq!(json["type"], "NotFound");
        assert_eq!(json["message"], "team 1");
    }
}
