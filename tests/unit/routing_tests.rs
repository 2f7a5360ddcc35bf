// End-to-end routing classification tests: config in, decision out

use imgrelay::config::Config;
use imgrelay::format::ImageFormat;
use imgrelay::pipeline::RequestContext;
use imgrelay::proxy::upstream::{collapse_query_params, redirect_location};
use imgrelay::router::{Router, RoutingDecision};
use rstest::rstest;

fn router_for(mode: &str) -> Router {
    let yaml = format!(
        r#"
routing:
  mode: {}
  target_domain: "https://images.example.com"
  converter_base_url: "https://optimizer.example.com"
"#,
        mode
    );
    let config = Config::from_yaml_with_env(&yaml).expect("Failed to deserialize YAML");
    Router::new(config.routing)
}

#[rstest]
#[case("GET", false, None, RoutingDecision::ProxyOptimizer)]
#[case("GET", true, None, RoutingDecision::ProxyOptimizer)]
#[case("GET", false, Some("image/avif"), RoutingDecision::ProxyOptimizer)]
#[case("POST", false, Some("image/avif"), RoutingDecision::ProxyOrigin)]
#[case("HEAD", false, None, RoutingDecision::ProxyOrigin)]
#[case("DELETE", true, None, RoutingDecision::ProxyOrigin)]
fn test_proxy_mode_classification(
    #[case] method: &str,
    #[case] has_query: bool,
    #[case] accept: Option<&str>,
    #[case] expected: RoutingDecision,
) {
    let router = router_for("proxy");
    assert_eq!(router.decide(method, has_query, accept), expected);
}

#[rstest]
#[case("POST", false, Some("image/avif"), RoutingDecision::RedirectOrigin)]
#[case("GET", true, Some("image/avif"), RoutingDecision::RedirectOrigin)]
#[case("GET", false, None, RoutingDecision::RedirectOrigin)]
#[case("GET", false, Some("text/html"), RoutingDecision::RedirectOrigin)]
#[case(
    "GET",
    false,
    Some("image/avif,image/webp"),
    RoutingDecision::RedirectOptimizer(ImageFormat::Avif)
)]
#[case(
    "GET",
    false,
    Some("image/webp"),
    RoutingDecision::RedirectOptimizer(ImageFormat::Webp)
)]
fn test_redirect_mode_classification(
    #[case] method: &str,
    #[case] has_query: bool,
    #[case] accept: Option<&str>,
    #[case] expected: RoutingDecision,
) {
    let router = router_for("redirect");
    assert_eq!(router.decide(method, has_query, accept), expected);
}

#[test]
fn test_every_request_gets_exactly_one_decision() {
    // The classification is total: any (method, query, accept) combination
    // maps to a decision in both modes
    for mode in ["proxy", "redirect"] {
        let router = router_for(mode);
        for method in ["GET", "HEAD", "POST", "PUT", "PATCH", "DELETE", "OPTIONS"] {
            for has_query in [false, true] {
                for accept in [None, Some(""), Some("image/avif"), Some("text/html")] {
                    let _ = router.decide(method, has_query, accept);
                }
            }
        }
    }
}

#[test]
fn test_redirect_destination_matches_decision() {
    let router = router_for("redirect");
    let mut ctx = RequestContext::new("GET".to_string(), "/file/c.jpg".to_string());

    // Negotiation hit: optimizer URL with encoded origin and format suffix
    let decision = router.decide("GET", false, Some("image/webp"));
    ctx.set_decision(decision);
    let location = redirect_location(router.routing(), &decision, &ctx).unwrap();
    assert!(location.starts_with("https://optimizer.example.com/"));
    assert!(location.ends_with("?format=webp"));

    // Query parameter present: origin URL with the query preserved
    ctx.set_query_params(collapse_query_params("w=200"));
    let decision = router.decide("GET", ctx.has_query_params(), Some("image/webp"));
    assert_eq!(decision, RoutingDecision::RedirectOrigin);
    let location = redirect_location(router.routing(), &decision, &ctx).unwrap();
    assert_eq!(location, "https://images.example.com/file/c.jpg?w=200");
}

#[test]
fn test_configured_priority_order_is_honored() {
    let yaml = r#"
routing:
  mode: redirect
  target_domain: "https://images.example.com"
  converter_base_url: "https://optimizer.example.com"
  supported_formats: [webp, avif]
"#;
    let config = Config::from_yaml_with_env(yaml).expect("Failed to deserialize YAML");
    let router = Router::new(config.routing);
    // Client advertises both; the list order wins, not the header order
    assert_eq!(
        router.decide("GET", false, Some("image/avif,image/webp")),
        RoutingDecision::RedirectOptimizer(ImageFormat::Webp)
    );
}
