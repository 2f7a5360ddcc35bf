// Request pipeline module - per-request context

use std::time::{Instant, SystemTime, UNIX_EPOCH};

use uuid::Uuid;

use crate::router::RoutingDecision;

/// Request context that holds all information about an HTTP request as
/// it flows through the proxy phases.
///
/// Created at the start of request handling and discarded at its end;
/// nothing here survives across requests.
#[derive(Debug, Clone)]
pub struct RequestContext {
    request_id: String,
    method: String,
    path: String,
    /// Collapsed query pairs: last value wins per key, first-seen order.
    query_params: Vec<(String, String)>,
    accept: Option<String>,
    user_agent: Option<String>,
    timestamp: u64,
    started_at: Instant,
    decision: Option<RoutingDecision>,
    /// Cache hints from the prepared outbound fetch: (TTL seconds,
    /// cache regardless of origin directives). Set only on fetch paths.
    cache_hints: Option<(u64, bool)>,
}

impl RequestContext {
    /// Create a new RequestContext from HTTP request information.
    /// Automatically generates a unique request ID (UUID v4) and
    /// captures the current timestamp.
    pub fn new(method: String, path: String) -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            method,
            path,
            query_params: Vec::new(),
            accept: None,
            user_agent: None,
            timestamp: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
            started_at: Instant::now(),
            decision: None,
            cache_hints: None,
        }
    }

    /// Get the unique request ID
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Get the HTTP method
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Get the request path
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Get the collapsed query parameters
    pub fn query_params(&self) -> &[(String, String)] {
        &self.query_params
    }

    /// Whether the request carried any query parameter
    pub fn has_query_params(&self) -> bool {
        !self.query_params.is_empty()
    }

    /// Get the inbound Accept header, if present
    pub fn accept(&self) -> Option<&str> {
        self.accept.as_deref()
    }

    /// Get the inbound User-Agent header, if present
    pub fn user_agent(&self) -> Option<&str> {
        self.user_agent.as_deref()
    }

    /// Get the Unix timestamp captured at creation
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    /// Elapsed wall-clock time since the context was created, in ms
    pub fn elapsed_ms(&self) -> f64 {
        self.started_at.elapsed().as_secs_f64() * 1000.0
    }

    /// Get the routing decision, once classified
    pub fn decision(&self) -> Option<RoutingDecision> {
        self.decision
    }

    /// Cache hints carried over from the prepared outbound fetch
    pub fn cache_hints(&self) -> Option<(u64, bool)> {
        self.cache_hints
    }

    pub fn set_method(&mut self, method: String) {
        self.method = method;
    }

    pub fn set_path(&mut self, path: String) {
        self.path = path;
    }

    pub fn set_query_params(&mut self, query_params: Vec<(String, String)>) {
        self.query_params = query_params;
    }

    pub fn set_accept(&mut self, accept: Option<String>) {
        self.accept = accept;
    }

    pub fn set_user_agent(&mut self, user_agent: Option<String>) {
        self.user_agent = user_agent;
    }

    pub fn set_decision(&mut self, decision: RoutingDecision) {
        self.decision = Some(decision);
    }

    pub fn set_cache_hints(&mut self, ttl_seconds: u64, cache_everything: bool) {
        self.cache_hints = Some((ttl_seconds, cache_everything));
    }
}
