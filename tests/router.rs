//! Router-level tests driven without sockets.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use tower::ServiceExt;

use mobile_view_proxy::config::ProxyConfig;
use mobile_view_proxy::http::HttpServer;

fn server(configure: impl FnOnce(&mut ProxyConfig)) -> HttpServer {
    let mut config = ProxyConfig::default();
    // Nothing listens on port 1.
    config.upstream.address = "127.0.0.1:1".into();
    configure(&mut config);
    HttpServer::new(config)
}

#[tokio::test]
async fn toggle_without_template_proceeds_with_cookies() {
    let server = server(|_| {});
    let req = Request::builder()
        .uri("/wiki/Foo?mobileaction=toggle_view_desktop")
        .header(header::HOST, "example.org")
        .body(Body::empty())
        .unwrap();

    let res = server.router().oneshot(req).await.unwrap();
    // No template: the request is forwarded, and the upstream is down.
    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
    let cookies: Vec<_> = res
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect();
    assert_eq!(cookies.len(), 2);
    assert!(cookies[0].starts_with("stopMobileRedirect=true"));
    assert!(cookies[1].starts_with("mf_useformat="));
}

#[tokio::test]
async fn toggle_to_desktop_redirects_with_template() {
    let server = server(|c| {
        c.mobile.url_template = Some("%h0.m.%h1.%h2".into());
    });
    let req = Request::builder()
        .uri("/wiki/Foo?mobileaction=toggle_view_desktop&oldid=3")
        .header(header::HOST, "en.m.wikipedia.org")
        .header("x-forwarded-proto", "https")
        .body(Body::empty())
        .unwrap();

    let res = server.router().oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::FOUND);
    assert_eq!(res.headers()[header::LOCATION], "https://en.wikipedia.org/wiki/Foo?oldid=3");
    assert!(res.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn incoming_request_id_is_preserved() {
    let server = server(|_| {});
    let req = Request::builder()
        .uri("/")
        .header("x-request-id", "abc-123")
        .body(Body::empty())
        .unwrap();

    let res = server.router().oneshot(req).await.unwrap();
    assert_eq!(res.headers()["x-request-id"], "abc-123");
}

#[tokio::test]
async fn oversized_bodies_are_rejected() {
    let server = server(|c| c.security.max_body_size = 8);
    let req = Request::builder()
        .method("POST")
        .uri("/w/api.php")
        .header(header::CONTENT_LENGTH, "32")
        .body(Body::from(vec![b'x'; 32]))
        .unwrap();

    let res = server.router().oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn state_reload_swaps_snapshot() {
    let server = server(|_| {});
    assert!(server.state().snapshot().config.mobile.enabled);

    let mut config = ProxyConfig::default();
    config.mobile.enabled = false;
    server.state().reload(config);
    let snapshot = server.state().snapshot();
    assert!(!snapshot.config.mobile.enabled);
    assert_eq!(snapshot.site.resolver.tiers(), ["override"]);
}

#[tokio::test]
async fn redirects_answered_by_the_proxy_are_counted() {
    let recorder = metrics_exporter_prometheus::PrometheusBuilder::new().build_recorder();
    let handle = recorder.handle();
    let _guard = metrics::set_default_local_recorder(&recorder);

    let server = server(|c| {
        c.mobile.url_template = Some("%h0.m.%h1.%h2".into());
        c.mobile.site_domain = Some("wikipedia.org".into());
        c.mobile.auto_redirect = true;
    });

    let toggle = Request::builder()
        .uri("/wiki/Foo?mobileaction=toggle_view_desktop")
        .header(header::HOST, "en.m.wikipedia.org")
        .body(Body::empty())
        .unwrap();
    let res = server.router().oneshot(toggle).await.unwrap();
    assert_eq!(res.status(), StatusCode::FOUND);

    let iphone = Request::builder()
        .uri("/wiki/Foo")
        .header(header::HOST, "en.wikipedia.org")
        .header(header::USER_AGENT, "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1")
        .body(Body::empty())
        .unwrap();
    let res = server.router().oneshot(iphone).await.unwrap();
    assert_eq!(res.status(), StatusCode::FOUND);
    assert_eq!(res.headers()[header::LOCATION], "http://en.m.wikipedia.org/wiki/Foo");

    let rendered = handle.render();
    let line = rendered
        .lines()
        .find(|l| l.starts_with("mobile_proxy_requests_total{") && l.contains("status=\"302\""))
        .unwrap_or_else(|| panic!("no 302 request counter in:\n{rendered}"));
    assert!(line.contains("method=\"GET\""));
    assert!(line.ends_with(" 2"), "{line}");
}
