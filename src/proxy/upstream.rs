//! Upstream request preparation for the proxy.
//!
//! This module rebuilds destination URLs from the configured base
//! domains, derives connection peers from them, and assembles the
//! forwarded header subset for outbound fetches.
//!
//! # Design
//!
//! Functions return data structures instead of modifying request
//! headers directly. This avoids borrow checker issues and keeps
//! request preparation testable. The caller applies the results to the
//! upstream request.

use http::Uri;

use crate::config::RoutingConfig;
use crate::constants::API_KEY_HEADER;
use crate::error::ProxyError;
use crate::format::ImageFormat;
use crate::pipeline::RequestContext;
use crate::router::RoutingDecision;

// ============================================================================
// Peer derivation
// ============================================================================

/// Connection parameters derived from a configured base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamPeerConfig {
    /// Endpoint hostname.
    pub host: String,
    /// Port number.
    pub port: u16,
    /// Whether to use TLS.
    pub use_tls: bool,
}

impl UpstreamPeerConfig {
    /// Parse host, port, and TLS usage out of an absolute base URL.
    ///
    /// Fails with a configuration error for anything that is not a
    /// syntactically valid absolute http(s) URL with a host. This runs
    /// at config validation time, well before any network call.
    pub fn from_base_url(base_url: &str) -> Result<Self, ProxyError> {
        let uri: Uri = base_url.parse().map_err(|e| {
            ProxyError::Config(format!("invalid base URL '{}': {}", base_url, e))
        })?;

        let use_tls = match uri.scheme_str() {
            Some("https") => true,
            Some("http") => false,
            Some(other) => {
                return Err(ProxyError::Config(format!(
                    "base URL '{}' has unsupported scheme '{}'",
                    base_url, other
                )))
            }
            None => {
                return Err(ProxyError::Config(format!(
                    "base URL '{}' is not absolute (missing scheme)",
                    base_url
                )))
            }
        };

        // Filter out empty strings to handle malformed URLs like "http://:9000"
        let host = uri
            .host()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| {
                ProxyError::Config(format!("base URL '{}' has no host", base_url))
            })?
            .to_string();

        let port = uri.port_u16().unwrap_or(if use_tls { 443 } else { 80 });

        Ok(Self {
            host,
            port,
            use_tls,
        })
    }
}

// ============================================================================
// Query handling
// ============================================================================

/// Collapse a raw query string into ordered key/value pairs.
///
/// Multiple values per key collapse to the last one, applied in input
/// iteration order (set semantics, matching standard URL search-param
/// behavior). Keys keep the position of their first occurrence.
/// A percent-escape that does not decode to UTF-8 keeps its raw token;
/// no key or value is ever dropped.
pub fn collapse_query_params(query: &str) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = Vec::new();
    for pair in query.split('&') {
        if pair.is_empty() {
            continue;
        }
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let key = decode_or_raw(key);
        let value = decode_or_raw(value);
        match params.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => params.push((key, value)),
        }
    }
    params
}

fn decode_or_raw(token: &str) -> String {
    match urlencoding::decode(token) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => token.to_string(),
    }
}

/// Serialize collapsed pairs back into a query string.
pub fn serialize_query_params(params: &[(String, String)]) -> String {
    params
        .iter()
        .map(|(key, value)| {
            format!("{}={}", urlencoding::encode(key), urlencoding::encode(value))
        })
        .collect::<Vec<_>>()
        .join("&")
}

// ============================================================================
// URL composition
// ============================================================================

/// Join a base URL and a path with exactly one `/` boundary.
fn join_base_and_path(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    if path.starts_with('/') {
        format!("{}{}", base, path)
    } else {
        format!("{}/{}", base, path)
    }
}

/// Rebuild the origin URL: `target_domain + path` with the original
/// query parameters re-applied. The output query string is derived
/// solely from the caller's set; nothing on the base URL is merged in.
pub fn compose_origin_url(base: &str, path: &str, params: &[(String, String)]) -> String {
    let mut url = join_base_and_path(base, path);
    if !params.is_empty() {
        url.push('?');
        url.push_str(&serialize_query_params(params));
    }
    url
}

/// Build the optimizer URL: the fully qualified origin URL goes into a
/// single percent-encoded path segment, with any extra parameters
/// appended as a literal query suffix (never encoded into the segment).
pub fn compose_optimizer_url(base: &str, origin_url: &str, extra_query: Option<&str>) -> String {
    let mut url = format!(
        "{}/{}",
        base.trim_end_matches('/'),
        urlencoding::encode(origin_url)
    );
    if let Some(query) = extra_query {
        url.push('?');
        url.push_str(query);
    }
    url
}

/// The redirect-mode destination for a routing decision.
///
/// The optimizer segment deliberately encodes `target_domain + path`
/// only - the original query string never reaches the optimizer, while
/// the origin fallback keeps it. Both halves of that asymmetry are
/// load-bearing.
pub fn redirect_location(
    routing: &RoutingConfig,
    decision: &RoutingDecision,
    ctx: &RequestContext,
) -> Result<String, ProxyError> {
    match decision {
        RoutingDecision::RedirectOrigin => Ok(compose_origin_url(
            &routing.target_domain,
            ctx.path(),
            ctx.query_params(),
        )),
        RoutingDecision::RedirectOptimizer(format) => {
            let origin_url = join_base_and_path(&routing.target_domain, ctx.path());
            Ok(compose_optimizer_url(
                &routing.converter_base_url,
                &origin_url,
                Some(&format_query(*format)),
            ))
        }
        other => Err(ProxyError::Internal(format!(
            "decision {} is not a redirect",
            other.label()
        ))),
    }
}

fn format_query(format: ImageFormat) -> String {
    format!("format={}", format.as_str())
}

// ============================================================================
// Outbound fetch preparation
// ============================================================================

/// Everything the dispatcher needs for one outbound fetch: the rewritten
/// request line, the forwarded header subset, and the cache hints for
/// the platform's CDN layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundFetchSpec {
    /// Path-and-query sent to the upstream.
    pub uri: String,
    /// Host header value for the upstream.
    pub host: String,
    /// Forwarded header subset, allow-list only.
    pub headers: Vec<(String, String)>,
    /// TTL hint for the CDN layer, seconds.
    pub cache_ttl: u64,
    /// Cache regardless of the origin's own cache directives.
    pub cache_everything: bool,
}

/// Entity headers that frame a request body. The outbound header strip
/// keeps these so a non-GET pass-through reaches the origin with its
/// body intact.
pub fn is_entity_header(name: &http::header::HeaderName) -> bool {
    *name == http::header::CONTENT_LENGTH
        || *name == http::header::CONTENT_TYPE
        || *name == http::header::CONTENT_ENCODING
        || *name == http::header::TRANSFER_ENCODING
}

/// Prepare the outbound fetch for a proxy-mode decision.
///
/// Forwarding is an explicit allow-list copy: `Accept` and `User-Agent`
/// go out verbatim when present on the inbound request and are omitted
/// entirely when absent - never sent empty. `X-API-Key` is attached only
/// when the destination is the optimizer and a non-empty key is
/// configured.
pub fn prepare_outbound(
    routing: &RoutingConfig,
    decision: &RoutingDecision,
    ctx: &RequestContext,
) -> Result<OutboundFetchSpec, ProxyError> {
    let (base, uri) = match decision {
        RoutingDecision::ProxyOrigin => {
            let mut uri = ctx.path().to_string();
            if ctx.has_query_params() {
                uri.push('?');
                uri.push_str(&serialize_query_params(ctx.query_params()));
            }
            (&routing.target_domain, uri)
        }
        RoutingDecision::ProxyOptimizer => {
            let origin_url = join_base_and_path(&routing.target_domain, ctx.path());
            let uri = format!("/{}", urlencoding::encode(&origin_url));
            (&routing.converter_base_url, uri)
        }
        other => {
            return Err(ProxyError::Internal(format!(
                "decision {} does not fetch upstream",
                other.label()
            )))
        }
    };

    let peer = UpstreamPeerConfig::from_base_url(base)?;

    let mut headers = Vec::new();
    if let Some(accept) = ctx.accept() {
        headers.push(("Accept".to_string(), accept.to_string()));
    }
    if let Some(user_agent) = ctx.user_agent() {
        headers.push(("User-Agent".to_string(), user_agent.to_string()));
    }
    if decision.is_optimizer() && routing.has_api_key() {
        headers.push((API_KEY_HEADER.to_string(), routing.api_key.clone()));
    }

    Ok(OutboundFetchSpec {
        uri,
        host: peer.host,
        headers,
        cache_ttl: routing.cache_max_age_seconds,
        cache_everything: true,
    })
}
