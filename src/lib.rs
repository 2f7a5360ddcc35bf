//! # imgrelay
//!
//! Edge image-routing proxy built with Cloudflare's Pingora framework.
//!
//! Sits in front of an image origin and an image-optimization backend
//! and decides, per request, whether to serve the original asset or a
//! format-negotiated optimized variant, either by proxying the bytes
//! itself or by redirecting the client.
//!
//! ## Features
//!
//! - Two routing modes: `proxy` (fetch and relay upstream bytes) and
//!   `redirect` (send the client to the right URL with a 3xx)
//! - Content negotiation against the `Accept` header with a configured
//!   format priority list (AVIF before WebP by default)
//! - Cache policy applied to successful proxied responses, both
//!   client-facing (`Cache-Control`) and CDN-facing (`CDN-Cache-Control`)
//! - YAML configuration with `${ENV_VAR}` substitution
//! - Structured JSON logging and Prometheus metrics
//!
//! ## Architecture
//!
//! Built on Pingora's phase model: classification happens in
//! `request_filter`, upstream selection in `upstream_peer`, outbound
//! rewriting in `upstream_request_filter`, and the cache policy in
//! `response_filter`. The decision logic itself lives in pure modules
//! ([`router`], [`format`], [`proxy::upstream`]) that take data in and
//! return data out, so the interesting behavior is testable without a
//! running server.

pub mod config;
pub mod constants;
pub mod error;
pub mod format;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod proxy;
pub mod router;
