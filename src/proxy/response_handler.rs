//! Response shaping helpers for the proxy.
//!
//! # Design
//!
//! Functions return data structures and plain values instead of writing
//! to the session directly. The caller applies them to Pingora response
//! headers, which keeps the response policy itself testable.

use crate::error::ProxyError;

/// A redirect to be written downstream. No network call is made on this
/// path; an invalid destination URL is caught earlier by config
/// validation, so building one cannot fail at request time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectResponse {
    pub status: u16,
    pub location: String,
}

/// Build a redirect response, rejecting non-3xx status codes.
pub fn build_redirect(location: String, status: u16) -> Result<RedirectResponse, ProxyError> {
    if !(300..400).contains(&status) {
        return Err(ProxyError::Internal(format!(
            "status {} is not a redirect status",
            status
        )));
    }
    Ok(RedirectResponse { status, location })
}

/// Whether an upstream status gets the cache-header treatment.
/// 2xx-3xx count as success; everything else passes through unmodified.
pub fn is_success(status: u16) -> bool {
    (200..400).contains(&status)
}

/// Client-facing Cache-Control value for successful proxied responses.
/// Overwrites whatever the upstream sent; optimized images are treated
/// as cacheable regardless of origin intent.
pub fn cache_control_value(max_age_seconds: u64) -> String {
    format!("public, max-age={}", max_age_seconds)
}

/// CDN-layer cache hint (RFC 9213 targeted cache control), distinct
/// from the client-facing header and allowed to diverge from it.
pub fn cdn_cache_control_value(ttl_seconds: u64) -> String {
    format!("max-age={}", ttl_seconds)
}

/// Plain-text body for the synthesized 502 on transport failures. The
/// only locally synthesized error response besides the config-error 500.
pub fn upstream_failure_body(message: &str) -> String {
    format!("Proxy error: {}", message)
}
