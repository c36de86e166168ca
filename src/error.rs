//! Error types for query execution and report building.

use thiserror::Error;

/// Errors raised while talking to the broker or shaping its results.
#[derive(Debug, Clone, Error)]
pub enum DashboardError {
    /// The broker could not be reached.
    #[error("Cannot connect to Pinot broker at {url}")]
    Connect { url: String },

    /// The request did not complete in time.
    #[error("Query timed out after {seconds}s")]
    Timeout { seconds: u64 },

    /// The broker answered with a non-success HTTP status.
    #[error("Pinot broker returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The broker accepted the request but reported a query error.
    #[error("Pinot query error {code}: {message}")]
    Broker { code: i64, message: String },

    /// The response body was not a valid broker response.
    #[error("Failed to decode broker response: {0}")]
    Decode(String),

    /// A result table lacked a column the caller depends on.
    #[error("Result table has no column named {0}")]
    MissingColumn(String),

    /// Any other transport failure.
    #[error("Request failed: {0}")]
    Request(String),
}

impl DashboardError {
    /// Short label used in log lines and the JSON error field.
    pub fn kind(&self) -> &'static str {
        match self {
            DashboardError::Connect { .. } => "connect",
            DashboardError::Timeout { .. } => "timeout",
            DashboardError::Http { .. } => "http",
            DashboardError::Broker { .. } => "broker",
            DashboardError::Decode(_) => "decode",
            DashboardError::MissingColumn(_) => "missing_column",
            DashboardError::Request(_) => "request",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = DashboardError::Broker {
            code: 150,
            message: "SQLParsingError".to_string(),
        };
        assert_eq!(err.to_string(), "Pinot query error 150: SQLParsingError");
        assert_eq!(err.kind(), "broker");

        let err = DashboardError::Timeout { seconds: 30 };
        assert!(err.to_string().contains("30s"));
    }
}
