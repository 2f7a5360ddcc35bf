// Error types module

use std::fmt;

/// Centralized error type for the proxy
///
/// Categorizes errors into 3 main types for better debugging,
/// monitoring, and appropriate HTTP status code mapping.
///
/// A non-2xx response from an upstream is not an error from this
/// proxy's point of view (it is passed through verbatim), and a format
/// negotiation miss is a normal fallback path to the origin. Neither
/// appears here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProxyError {
    /// Configuration errors (invalid YAML, missing env vars, bad base URLs).
    /// Fatal and pre-flight: must prevent any network call.
    Config(String),

    /// Upstream transport failures (DNS, connection, timeout).
    /// Mapped to a synthesized 502 response, never retried.
    Upstream(String),

    /// Internal proxy errors (unexpected state, header build failures).
    Internal(String),
}

impl fmt::Display for ProxyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProxyError::Config(msg) => write!(f, "Configuration error: {}", msg),
            ProxyError::Upstream(msg) => write!(f, "Upstream error: {}", msg),
            ProxyError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ProxyError {}
