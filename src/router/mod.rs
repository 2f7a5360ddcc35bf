// Router module - per-request routing decisions

use crate::config::{RoutingConfig, RoutingMode};
use crate::format::{negotiate, ImageFormat};

/// Where a request goes and how it gets there.
///
/// Exactly one variant is active per request. Produced by
/// [`Router::decide`] and consumed by the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingDecision {
    /// Proxy mode: fetch from the origin and stream it back.
    ProxyOrigin,
    /// Proxy mode: fetch through the optimizer and stream it back.
    ProxyOptimizer,
    /// Redirect mode: send the client to the origin.
    RedirectOrigin,
    /// Redirect mode: send the client to the optimizer with an explicit format.
    RedirectOptimizer(ImageFormat),
}

impl RoutingDecision {
    /// Label for metrics and structured logs.
    pub fn label(&self) -> &'static str {
        match self {
            RoutingDecision::ProxyOrigin => "proxy_origin",
            RoutingDecision::ProxyOptimizer => "proxy_optimizer",
            RoutingDecision::RedirectOrigin => "redirect_origin",
            RoutingDecision::RedirectOptimizer(_) => "redirect_optimizer",
        }
    }

    /// True for the two redirect variants.
    pub fn is_redirect(&self) -> bool {
        matches!(
            self,
            RoutingDecision::RedirectOrigin | RoutingDecision::RedirectOptimizer(_)
        )
    }

    /// True when the destination is the optimizer backend.
    pub fn is_optimizer(&self) -> bool {
        matches!(
            self,
            RoutingDecision::ProxyOptimizer | RoutingDecision::RedirectOptimizer(_)
        )
    }
}

/// Request classifier: maps (method, query presence, Accept) to a
/// routing decision under the configured mode.
pub struct Router {
    routing: RoutingConfig,
}

impl Router {
    pub fn new(routing: RoutingConfig) -> Self {
        Router { routing }
    }

    /// Classify a request. Rules apply in order, first match wins:
    ///
    /// 1. proxy mode, non-GET: origin pass-through, never the optimizer.
    /// 2. proxy mode, GET: optimizer, with or without query parameters;
    ///    the optimizer reads the forwarded Accept header itself.
    /// 3. redirect mode, non-GET: origin.
    /// 4. redirect mode, GET with any query parameter: origin. Optimizer
    ///    semantics for arbitrary query strings are undefined, so their
    ///    presence disables optimization entirely.
    /// 5. redirect mode, GET without query parameters: negotiate a
    ///    format; miss falls back to the origin.
    ///
    /// No other request property affects routing; bodies are never
    /// inspected.
    pub fn decide(
        &self,
        method: &str,
        has_query_params: bool,
        accept: Option<&str>,
    ) -> RoutingDecision {
        match self.routing.mode {
            RoutingMode::Proxy => {
                if method != "GET" {
                    RoutingDecision::ProxyOrigin
                } else {
                    RoutingDecision::ProxyOptimizer
                }
            }
            RoutingMode::Redirect => {
                if method != "GET" || has_query_params {
                    return RoutingDecision::RedirectOrigin;
                }
                match negotiate(accept, &self.routing.supported_formats) {
                    Some(format) => RoutingDecision::RedirectOptimizer(format),
                    None => RoutingDecision::RedirectOrigin,
                }
            }
        }
    }

    /// The routing configuration this router classifies against.
    pub fn routing(&self) -> &RoutingConfig {
        &self.routing
    }
}
