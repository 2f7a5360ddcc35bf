// Constants module - centralized default values for configuration
//
// This module defines all default values used throughout the codebase.
// Using constants instead of magic numbers improves maintainability
// and makes it easier to understand and modify defaults.

// =============================================================================
// Server defaults
// =============================================================================

/// Default listen address
pub const DEFAULT_ADDRESS: &str = "0.0.0.0";

/// Default listen port
pub const DEFAULT_PORT: u16 = 8080;

/// Default number of worker threads
pub const DEFAULT_THREADS: usize = 4;

// =============================================================================
// Routing defaults
// =============================================================================

/// Default client-facing cache lifetime (30 days in seconds)
pub const DEFAULT_CACHE_MAX_AGE_SECS: u64 = 86400 * 30;

/// Default HTTP status code for redirect mode
pub const DEFAULT_REDIRECT_STATUS_CODE: u16 = 302;

/// Status codes acceptable for redirect mode
pub const REDIRECT_STATUS_CODES: [u16; 5] = [301, 302, 303, 307, 308];

/// Default upstream timeout in seconds (connect, read, and write)
pub const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 20;

// =============================================================================
// Outbound headers
// =============================================================================

/// Header used to authenticate against the optimizer backend
pub const API_KEY_HEADER: &str = "X-API-Key";
