// Error type tests through the public API

use imgrelay::error::ProxyError;

#[test]
fn test_error_display_distinguishes_categories() {
    let config = ProxyError::Config("target_domain is empty".to_string());
    let upstream = ProxyError::Upstream("connection refused".to_string());
    let internal = ProxyError::Internal("no decision in context".to_string());

    assert_eq!(
        config.to_string(),
        "Configuration error: target_domain is empty"
    );
    assert_eq!(upstream.to_string(), "Upstream error: connection refused");
    assert_eq!(
        internal.to_string(),
        "Internal error: no decision in context"
    );
}

#[test]
fn test_error_implements_std_error() {
    fn assert_error<E: std::error::Error>(_: &E) {}
    assert_error(&ProxyError::Config("x".to_string()));
}

#[test]
fn test_errors_compare_by_category_and_message() {
    assert_eq!(
        ProxyError::Config("a".to_string()),
        ProxyError::Config("a".to_string())
    );
    assert_ne!(
        ProxyError::Config("a".to_string()),
        ProxyError::Internal("a".to_string())
    );
}
