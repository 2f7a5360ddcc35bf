// Proxy module - Pingora ProxyHttp implementation
// Implements the HTTP routing and dispatch logic for imgrelay

use async_trait::async_trait;
use pingora_core::upstreams::peer::HttpPeer;
use pingora_core::Result;
use pingora_http::{RequestHeader, ResponseHeader};
use pingora_proxy::{FailToProxy, ProxyHttp, Session};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::Config;
use crate::metrics::Metrics;
use crate::pipeline::RequestContext;
use crate::router::{Router, RoutingDecision};

pub mod response_handler;
pub mod special_endpoints;
pub mod upstream;

use special_endpoints::EndpointResponse;

/// ImgRelayProxy implements the Pingora ProxyHttp trait.
/// Handles request classification, URL rewriting, and dispatch to the
/// origin or the image-optimization backend.
pub struct ImgRelayProxy {
    config: Arc<Config>,
    router: Router,
    metrics: Arc<Metrics>,
    /// Proxy start time (for uptime calculation in /health endpoint)
    start_time: Instant,
}

impl ImgRelayProxy {
    /// Create a new ImgRelayProxy instance from configuration
    pub fn new(config: Config) -> Self {
        let router = Router::new(config.routing.clone());
        let metrics = Arc::new(Metrics::new());

        Self {
            config: Arc::new(config),
            router,
            metrics,
            start_time: Instant::now(),
        }
    }

    /// Get a reference to the metrics instance
    pub fn metrics(&self) -> Arc<Metrics> {
        Arc::clone(&self.metrics)
    }

    /// Extract client IP address from session (X-Forwarded-For aware)
    ///
    /// Checks X-Forwarded-For header first (for proxies/load balancers),
    /// then falls back to direct connection IP from session.
    fn get_client_ip(&self, session: &Session) -> String {
        if let Some(forwarded_for) = session
            .req_header()
            .headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
        {
            // The first IP in "client, proxy1, proxy2" is the original client
            if let Some(client_ip) = forwarded_for.split(',').next() {
                return client_ip.trim().to_string();
            }
        }

        session
            .client_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_else(|| "unknown".to_string())
    }

    /// Write a special endpoint response and end the request.
    async fn write_endpoint_response(
        &self,
        session: &mut Session,
        response: EndpointResponse,
    ) -> Result<()> {
        let mut header = ResponseHeader::build(response.status, None)?;
        header.insert_header("Content-Type", response.content_type)?;
        header.insert_header("Content-Length", response.body.len().to_string())?;
        session
            .write_response_header(Box::new(header), false)
            .await?;
        session
            .write_response_body(Some(response.body.into()), true)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ProxyHttp for ImgRelayProxy {
    type CTX = RequestContext;

    /// Create a new request context for each incoming request
    fn new_ctx(&self) -> Self::CTX {
        RequestContext::new("GET".to_string(), "/".to_string())
    }

    /// Classify the request and short-circuit everything that never
    /// reaches an upstream: special endpoints, configuration errors,
    /// and redirect-mode responses.
    async fn request_filter(&self, session: &mut Session, ctx: &mut Self::CTX) -> Result<bool> {
        self.metrics.increment_request_count();
        self.metrics.increment_active_connections();

        // Snapshot the request into the context
        {
            let req = session.req_header();
            ctx.set_method(req.method.to_string());
            ctx.set_path(req.uri.path().to_string());
            ctx.set_query_params(
                req.uri
                    .query()
                    .map(upstream::collapse_query_params)
                    .unwrap_or_default(),
            );
            ctx.set_accept(
                req.headers
                    .get(http::header::ACCEPT)
                    .and_then(|v| v.to_str().ok())
                    .map(|s| s.to_string()),
            );
            ctx.set_user_agent(
                req.headers
                    .get(http::header::USER_AGENT)
                    .and_then(|v| v.to_str().ok())
                    .map(|s| s.to_string()),
            );
        }

        // Built-in endpoints bypass classification entirely
        match ctx.path() {
            "/health" => {
                let response = special_endpoints::handle_health(self.start_time);
                self.write_endpoint_response(session, response).await?;
                return Ok(true); // Request handled
            }
            "/metrics" => {
                let response = special_endpoints::handle_metrics(&self.metrics);
                self.write_endpoint_response(session, response).await?;
                return Ok(true); // Request handled
            }
            _ => {}
        }

        // Pre-flight configuration check. A misconfigured deployment
        // surfaces as a 500 distinct from the 502 upstream-failure path
        // and must never reach an upstream.
        if let Err(config_error) = self.config.routing.validate() {
            tracing::error!(
                request_id = %ctx.request_id(),
                error = %config_error,
                "Refusing request due to invalid configuration"
            );

            let error_body = serde_json::json!({
                "error": "Configuration Error",
                "message": config_error.to_string(),
                "status": 500
            })
            .to_string();

            let mut header = ResponseHeader::build(500, None)?;
            header.insert_header("Content-Type", "application/json")?;
            header.insert_header("Content-Length", error_body.len().to_string())?;
            session
                .write_response_header(Box::new(header), false)
                .await?;
            session
                .write_response_body(Some(error_body.into()), true)
                .await?;
            return Ok(true); // Short-circuit
        }

        let decision = self
            .router
            .decide(ctx.method(), ctx.has_query_params(), ctx.accept());
        ctx.set_decision(decision);
        self.metrics.increment_decision_count(decision.label());

        tracing::debug!(
            request_id = %ctx.request_id(),
            method = %ctx.method(),
            path = %ctx.path(),
            decision = decision.label(),
            "Request classified"
        );

        if decision.is_redirect() {
            let location = upstream::redirect_location(&self.config.routing, &decision, ctx)
                .map_err(|e| {
                    pingora_core::Error::explain(
                        pingora_core::ErrorType::InternalError,
                        e.to_string(),
                    )
                })?;
            let redirect = response_handler::build_redirect(
                location,
                self.config.routing.redirect_status_code,
            )
            .map_err(|e| {
                pingora_core::Error::explain(pingora_core::ErrorType::InternalError, e.to_string())
            })?;

            let mut header = ResponseHeader::build(redirect.status, None)?;
            header.insert_header("Location", redirect.location)?;
            header.insert_header("Content-Length", "0")?;
            session
                .write_response_header(Box::new(header), true)
                .await?;
            return Ok(true); // Request handled, no upstream fetch
        }

        Ok(false) // Continue to upstream
    }

    /// Determine the upstream peer for a proxy-mode decision
    async fn upstream_peer(
        &self,
        _session: &mut Session,
        ctx: &mut Self::CTX,
    ) -> Result<Box<HttpPeer>> {
        let decision = ctx.decision().ok_or_else(|| {
            pingora_core::Error::explain(
                pingora_core::ErrorType::InternalError,
                "No routing decision in context",
            )
        })?;

        let base_url = match decision {
            RoutingDecision::ProxyOrigin => &self.config.routing.target_domain,
            RoutingDecision::ProxyOptimizer => &self.config.routing.converter_base_url,
            _ => {
                return Err(pingora_core::Error::explain(
                    pingora_core::ErrorType::InternalError,
                    "Redirect decision reached upstream selection",
                ))
            }
        };

        let peer_config = upstream::UpstreamPeerConfig::from_base_url(base_url).map_err(|e| {
            pingora_core::Error::explain(pingora_core::ErrorType::InternalError, e.to_string())
        })?;

        let mut peer = Box::new(HttpPeer::new(
            (peer_config.host.clone(), peer_config.port),
            peer_config.use_tls,
            peer_config.host.clone(),
        ));

        // Rely on the transport's own timeout behavior; an expiry here
        // is just another transport failure mapped to the 502 path.
        let timeout_duration = Duration::from_secs(self.config.routing.timeout);
        peer.options.connection_timeout = Some(timeout_duration);
        peer.options.read_timeout = Some(timeout_duration);
        peer.options.write_timeout = Some(timeout_duration);

        tracing::debug!(
            request_id = %ctx.request_id(),
            decision = decision.label(),
            endpoint = %peer_config.host,
            port = peer_config.port,
            tls = peer_config.use_tls,
            timeout_seconds = self.config.routing.timeout,
            "Configured upstream peer"
        );

        Ok(peer)
    }

    /// Rewrite the outbound request: destination URL plus the explicit
    /// header allow-list (Accept, User-Agent, conditional X-API-Key).
    async fn upstream_request_filter(
        &self,
        _session: &mut Session,
        upstream_request: &mut RequestHeader,
        ctx: &mut Self::CTX,
    ) -> Result<()> {
        let decision = ctx.decision().ok_or_else(|| {
            pingora_core::Error::explain(
                pingora_core::ErrorType::InternalError,
                "No routing decision in context",
            )
        })?;

        let spec = upstream::prepare_outbound(&self.config.routing, &decision, ctx).map_err(
            |e| {
                pingora_core::Error::explain(
                    pingora_core::ErrorType::InternalError,
                    e.to_string(),
                )
            },
        )?;
        ctx.set_cache_hints(spec.cache_ttl, spec.cache_everything);

        // Forwarding is an allow-list copy, not ambient mutation: drop
        // every inbound header, then apply the prepared subset. Entity
        // headers stay so non-GET pass-through keeps its body framing.
        let inbound_names: Vec<http::header::HeaderName> =
            upstream_request.headers.keys().cloned().collect();
        for name in inbound_names {
            if upstream::is_entity_header(&name) {
                continue;
            }
            upstream_request.remove_header(&name);
        }

        let parsed_uri = spec.uri.parse().map_err(|e: http::uri::InvalidUri| {
            pingora_core::Error::explain(
                pingora_core::ErrorType::InternalError,
                format!("Invalid upstream URI: {}", e),
            )
        })?;
        upstream_request.set_uri(parsed_uri);

        upstream_request
            .append_header(
                http::header::HOST,
                http::header::HeaderValue::from_str(&spec.host).map_err(|e| {
                    pingora_core::Error::explain(
                        pingora_core::ErrorType::InternalError,
                        format!("Invalid host header: {}", e),
                    )
                })?,
            )
            .map_err(|e| {
                pingora_core::Error::explain(
                    pingora_core::ErrorType::InternalError,
                    format!("Failed to set Host header: {}", e),
                )
            })?;

        for (name, value) in &spec.headers {
            let header_name =
                http::header::HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                    pingora_core::Error::explain(
                        pingora_core::ErrorType::InternalError,
                        format!("Invalid header name: {}", e),
                    )
                })?;
            let header_value = http::header::HeaderValue::from_str(value).map_err(|e| {
                pingora_core::Error::explain(
                    pingora_core::ErrorType::InternalError,
                    format!("Invalid header value: {}", e),
                )
            })?;
            upstream_request
                .append_header(header_name, header_value)
                .map_err(|e| {
                    pingora_core::Error::explain(
                        pingora_core::ErrorType::InternalError,
                        format!("Failed to append header: {}", e),
                    )
                })?;
        }

        Ok(())
    }

    /// Filter upstream responses to add custom headers (request correlation)
    fn upstream_response_filter(
        &self,
        _session: &mut Session,
        upstream_response: &mut ResponseHeader,
        ctx: &mut Self::CTX,
    ) -> Result<()> {
        upstream_response
            .insert_header("X-Request-ID", ctx.request_id())
            .map_err(|e| {
                tracing::warn!(
                    request_id = %ctx.request_id(),
                    error = ?e,
                    "Failed to add X-Request-ID header"
                );
                e
            })?;

        Ok(())
    }

    /// Apply the cache policy to successful proxied responses.
    ///
    /// 2xx-3xx responses get the client-facing Cache-Control overwritten
    /// with the configured TTL and a CDN-layer hint that caches the
    /// response regardless of the origin's own directives. Everything
    /// else passes through completely unmodified.
    async fn response_filter(
        &self,
        _session: &mut Session,
        upstream_response: &mut ResponseHeader,
        ctx: &mut Self::CTX,
    ) -> Result<()> {
        let status = upstream_response.status.as_u16();
        if response_handler::is_success(status) {
            if let Some((ttl, cache_everything)) = ctx.cache_hints() {
                upstream_response
                    .insert_header("Cache-Control", response_handler::cache_control_value(ttl))?;
                if cache_everything {
                    upstream_response.insert_header(
                        "CDN-Cache-Control",
                        response_handler::cdn_cache_control_value(ttl),
                    )?;
                }
            }
        }

        Ok(())
    }

    /// Map transport-level failures (DNS, connection, timeout) to a
    /// synthesized 502 carrying the failure's message. Never retried.
    async fn fail_to_proxy(
        &self,
        session: &mut Session,
        e: &pingora_core::Error,
        ctx: &mut Self::CTX,
    ) -> FailToProxy
    where
        Self::CTX: Send + Sync,
    {
        self.metrics.increment_upstream_error();

        tracing::error!(
            request_id = %ctx.request_id(),
            method = %ctx.method(),
            path = %ctx.path(),
            error = %e,
            "Upstream fetch failed"
        );

        let body = response_handler::upstream_failure_body(&e.to_string());
        if let Ok(mut header) = ResponseHeader::build(502, None) {
            let _ = header.insert_header("Content-Type", "text/plain; charset=utf-8");
            let _ = header.insert_header("Content-Length", body.len().to_string());
            let _ = session
                .write_response_header(Box::new(header), false)
                .await;
            let _ = session.write_response_body(Some(body.into()), true).await;
        }

        FailToProxy {
            error_code: 502,
            can_reuse_downstream: false,
        }
    }

    /// Log request completion for metrics and debugging
    async fn logging(
        &self,
        session: &mut Session,
        e: Option<&pingora_core::Error>,
        ctx: &mut Self::CTX,
    ) {
        let status_code = if let Some(resp) = session.response_written() {
            resp.status.as_u16()
        } else {
            500 // No response written, treat as internal error
        };

        let duration_ms = ctx.elapsed_ms();

        self.metrics.increment_status_count(status_code);
        self.metrics.increment_method_count(ctx.method());
        self.metrics.record_duration(duration_ms);
        self.metrics.decrement_active_connections();

        let client_ip = self.get_client_ip(session);

        if let Some(error) = e {
            tracing::warn!(
                request_id = %ctx.request_id(),
                client_ip = %client_ip,
                method = %ctx.method(),
                path = %ctx.path(),
                status_code = status_code,
                duration_ms = duration_ms,
                error = %error,
                "Request completed with error"
            );
            return;
        }

        tracing::info!(
            request_id = %ctx.request_id(),
            client_ip = %client_ip,
            method = %ctx.method(),
            path = %ctx.path(),
            status_code = status_code,
            decision = ctx.decision().map(|d| d.label()).unwrap_or("none"),
            duration_ms = duration_ms,
            "Request completed"
        );
    }
}
