//! Response handling and transformation.
//!
//! # Responsibilities
//! - Map upstream failures to `502 Bad Gateway`
//! - Rewrite local redirects to the mobile host in mobile mode
//! - Declare cache variance, analytics and alternate/canonical links
//! - Inject the configuration blob into mobile HTML pages
//!
//! Bodies stream through untouched unless they are mobile HTML pages, which
//! are buffered up to `upstream.max_html_bytes`.

use axum::{
    body::{Body, Bytes},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
};
use futures_util::{future, stream, StreamExt};
use url::Url;

use crate::http::request::RequestTarget;
use crate::mobile::analytics::X_ANALYTICS;
use crate::mobile::features;
use crate::mobile::toggle::strip_query_param;
use crate::mobile::{MobileContext, MobileSite};
use crate::observability::metrics;

/// Query parameters that only select the view and never belong in a link.
const VIEW_PARAMS: [&str; 2] = ["useformat", "mobileaction"];

/// Errors surfaced to the client as `502 Bad Gateway`.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("invalid upstream address: {0}")]
    InvalidUpstream(String),

    #[error("upstream request failed: {0}")]
    Upstream(#[from] hyper_util::client::legacy::Error),

    #[error("failed to read upstream body: {0}")]
    Body(#[from] axum::Error),
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response()
    }
}

/// Apply every mobile transformation to an upstream response.
pub async fn finalize(
    response: Response,
    ctx: &mut MobileContext,
    site: &MobileSite,
    target: &RequestTarget,
    method: &Method,
    max_html_bytes: usize,
) -> Result<Response, ProxyError> {
    let (mut parts, body) = response.into_parts();

    rewrite_redirect(&mut parts.headers, parts.status, ctx, site, target);
    add_link_headers(&mut parts.headers, parts.status, ctx, site, target);

    if ctx.is_mobile() {
        ctx.add_vary(header::COOKIE);
        if site.config.x_analytics_logging {
            if let Some(value) = ctx.analytics().header_value() {
                parts.headers.insert(X_ANALYTICS, value);
            }
        }
    }
    ctx.vary().apply(&mut parts.headers);

    if !should_inject(&parts.headers, parts.status, ctx, method) {
        return Ok(Response::from_parts(parts, body));
    }

    let declared_len = parts
        .headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    if declared_len.is_some_and(|len| len > max_html_bytes) {
        tracing::debug!(max_html_bytes, "Mobile page too large for config injection");
        return Ok(Response::from_parts(parts, body));
    }

    let bytes = match buffer_html(body, max_html_bytes).await? {
        Buffered::Complete(bytes) => bytes,
        Buffered::Overflow(body) => {
            tracing::debug!(max_html_bytes, "Streamed mobile page exceeded limit, passing through");
            return Ok(Response::from_parts(parts, body));
        }
    };
    let html = match String::from_utf8(bytes.to_vec()) {
        Ok(html) => html,
        Err(_) => return Ok(Response::from_parts(parts, Body::from(bytes))),
    };

    let vars = site.features.config_vars(ctx.is_beta());
    let html = features::inject_config(&html, &vars);
    parts.headers.insert(header::CONTENT_LENGTH, HeaderValue::from(html.len()));
    Ok(Response::from_parts(parts, Body::from(html)))
}

enum Buffered {
    Complete(Bytes),
    /// Limit exceeded; the bytes read so far followed by the rest of the body.
    Overflow(Body),
}

/// Read a body frame by frame, giving up once it grows past `limit`.
async fn buffer_html(body: Body, limit: usize) -> Result<Buffered, axum::Error> {
    let mut rest = body.into_data_stream();
    let mut buf = Vec::new();
    while let Some(chunk) = rest.next().await {
        buf.extend_from_slice(&chunk?);
        if buf.len() > limit {
            let head = stream::once(future::ready(Ok::<_, axum::Error>(Bytes::from(buf))));
            return Ok(Buffered::Overflow(Body::from_stream(head.chain(rest))));
        }
    }
    Ok(Buffered::Complete(Bytes::from(buf)))
}

/// Point local redirects issued in mobile mode at the mobile host.
pub fn rewrite_redirect(
    headers: &mut HeaderMap,
    status: StatusCode,
    ctx: &mut MobileContext,
    site: &MobileSite,
    target: &RequestTarget,
) {
    if !ctx.is_mobile() || !status.is_redirection() || !site.translator.is_enabled() {
        return;
    }
    let Some(location) = headers
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
    else {
        return;
    };
    if !site.translator.is_local_url(&location, target.host.as_deref()) {
        return;
    }

    // The redirect target depends on how the mode was reached.
    ctx.add_vary_str(&site.config.mobile_header);
    for name in &site.config.redirect_vary_headers {
        ctx.add_vary_str(name);
    }

    let absolute = absolutize(&location, &target.url);
    let mobile = site.translator.to_mobile(&absolute);
    if mobile == absolute {
        return;
    }
    if let Ok(value) = HeaderValue::from_str(&mobile) {
        tracing::debug!(from = %location, to = %mobile, "Rewrote redirect to mobile host");
        headers.insert(header::LOCATION, value);
        metrics::record_redirect_rewrite();
    }
}

/// Resolve a relative `Location` against the request URL.
fn absolutize(location: &str, base: &str) -> String {
    let relative = !location.starts_with("//")
        && matches!(Url::parse(location), Err(url::ParseError::RelativeUrlWithoutBase));
    if !relative {
        return location.to_string();
    }
    Url::parse(base)
        .and_then(|base| base.join(location))
        .map(String::from)
        .unwrap_or_else(|_| location.to_string())
}

/// Desktop pages advertise their mobile alternate; mobile pages name the
/// desktop page as canonical.
pub fn add_link_headers(
    headers: &mut HeaderMap,
    status: StatusCode,
    ctx: &MobileContext,
    site: &MobileSite,
    target: &RequestTarget,
) {
    if !site.config.noindex_pages
        || !site.translator.is_enabled()
        || !status.is_success()
        || !is_html(headers)
    {
        return;
    }

    let url = VIEW_PARAMS
        .iter()
        .fold(target.url.clone(), |url, param| strip_query_param(&url, param));

    let link = if ctx.is_mobile() {
        format!("<{}>; rel=\"canonical\"", site.translator.to_desktop(&url))
    } else {
        let mobile = site.translator.to_mobile(&url);
        if mobile == url {
            return;
        }
        format!(
            "<{mobile}>; rel=\"alternate\"; media=\"only screen and (max-width: {})\"",
            site.config.device_width_tablet
        )
    };

    if let Ok(value) = HeaderValue::from_str(&link) {
        headers.append(header::LINK, value);
    }
}

fn should_inject(headers: &HeaderMap, status: StatusCode, ctx: &MobileContext, method: &Method) -> bool {
    ctx.is_mobile()
        && !ctx.is_blacklisted_page()
        && method != Method::HEAD
        && !matches!(status, StatusCode::NO_CONTENT | StatusCode::NOT_MODIFIED)
        && !status.is_redirection()
        && is_html(headers)
        && is_identity_encoded(headers)
}

fn is_html(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.trim_start().to_ascii_lowercase().starts_with("text/html"))
}

fn is_identity_encoded(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .map_or(true, |enc| enc.trim().eq_ignore_ascii_case("identity"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MobileConfig;
    use crate::mobile::resolver::Resolution;
    use crate::mobile::vary::VaryKeys;
    use crate::mobile::{Mode, RequestSignals};

    fn site() -> MobileSite {
        MobileSite::from_config(MobileConfig {
            url_template: Some("%h0.m.%h1.%h2".into()),
            site_domain: Some("wikipedia.org".into()),
            ..Default::default()
        })
    }

    fn ctx(mode: Mode) -> MobileContext {
        let resolution = Resolution {
            mode,
            decided_by: "test",
            consulted: vec!["test"],
            vary: VaryKeys::new(),
        };
        MobileContext::new(RequestSignals::default(), resolution, false)
    }

    fn target(url: &str, host: &str) -> RequestTarget {
        RequestTarget {
            url: url.into(),
            host: Some(host.into()),
        }
    }

    fn html_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/html; charset=UTF-8"));
        headers
    }

    #[test]
    fn local_redirects_go_mobile_in_mobile_mode() {
        let site = site();
        let mut ctx = ctx(Mode::Mobile);
        let mut headers = HeaderMap::new();
        headers.insert(header::LOCATION, HeaderValue::from_static("https://en.wikipedia.org/wiki/Bar"));
        rewrite_redirect(
            &mut headers,
            StatusCode::FOUND,
            &mut ctx,
            &site,
            &target("https://en.m.wikipedia.org/wiki/Foo", "en.m.wikipedia.org"),
        );
        assert_eq!(headers[header::LOCATION], "https://en.m.wikipedia.org/wiki/Bar");
        let vary: Vec<_> = ctx.vary().iter().map(|h| h.as_str().to_string()).collect();
        assert_eq!(vary, ["x-subdomain", "x-cs"]);
    }

    #[test]
    fn relative_redirects_are_expanded_from_desktop_host() {
        let site = site();
        let mut ctx = ctx(Mode::Mobile);
        let mut headers = HeaderMap::new();
        headers.insert(header::LOCATION, HeaderValue::from_static("/wiki/Bar"));
        rewrite_redirect(
            &mut headers,
            StatusCode::MOVED_PERMANENTLY,
            &mut ctx,
            &site,
            &target("http://en.wikipedia.org/wiki/Foo?useformat=mobile", "en.wikipedia.org"),
        );
        assert_eq!(headers[header::LOCATION], "http://en.m.wikipedia.org/wiki/Bar");
    }

    #[test]
    fn relative_redirects_on_mobile_host_are_kept() {
        let site = site();
        let mut ctx = ctx(Mode::Mobile);
        let mut headers = HeaderMap::new();
        headers.insert(header::LOCATION, HeaderValue::from_static("/wiki/Bar"));
        rewrite_redirect(
            &mut headers,
            StatusCode::FOUND,
            &mut ctx,
            &site,
            &target("http://en.m.wikipedia.org/wiki/Foo", "en.m.wikipedia.org"),
        );
        assert_eq!(headers[header::LOCATION], "/wiki/Bar");
    }

    #[test]
    fn foreign_and_desktop_redirects_are_untouched() {
        let site = site();
        let t = target("https://en.m.wikipedia.org/wiki/Foo", "en.m.wikipedia.org");

        let mut ctx_m = ctx(Mode::Mobile);
        let mut headers = HeaderMap::new();
        headers.insert(header::LOCATION, HeaderValue::from_static("https://example.com/x"));
        rewrite_redirect(&mut headers, StatusCode::FOUND, &mut ctx_m, &site, &t);
        assert_eq!(headers[header::LOCATION], "https://example.com/x");
        assert!(ctx_m.vary().is_empty());

        let mut ctx_d = ctx(Mode::Desktop);
        let mut headers = HeaderMap::new();
        headers.insert(header::LOCATION, HeaderValue::from_static("https://en.wikipedia.org/wiki/Bar"));
        rewrite_redirect(&mut headers, StatusCode::FOUND, &mut ctx_d, &site, &t);
        assert_eq!(headers[header::LOCATION], "https://en.wikipedia.org/wiki/Bar");
    }

    #[test]
    fn desktop_pages_advertise_mobile_alternate() {
        let site = site();
        let mut headers = html_headers();
        add_link_headers(
            &mut headers,
            StatusCode::OK,
            &ctx(Mode::Desktop),
            &site,
            &target("https://en.wikipedia.org/wiki/Foo", "en.wikipedia.org"),
        );
        assert_eq!(
            headers[header::LINK],
            "<https://en.m.wikipedia.org/wiki/Foo>; rel=\"alternate\"; media=\"only screen and (max-width: 720px)\""
        );
    }

    #[test]
    fn mobile_pages_name_desktop_canonical() {
        let site = site();
        let mut headers = html_headers();
        add_link_headers(
            &mut headers,
            StatusCode::OK,
            &ctx(Mode::Mobile),
            &site,
            &target("https://en.m.wikipedia.org/wiki/Foo?useformat=mobile", "en.m.wikipedia.org"),
        );
        assert_eq!(headers[header::LINK], "<https://en.wikipedia.org/wiki/Foo>; rel=\"canonical\"");
    }

    #[test]
    fn no_links_without_template_or_for_non_html() {
        let plain = MobileSite::from_config(MobileConfig::default());
        let mut headers = html_headers();
        let t = target("https://en.wikipedia.org/wiki/Foo", "en.wikipedia.org");
        add_link_headers(&mut headers, StatusCode::OK, &ctx(Mode::Desktop), &plain, &t);
        assert!(headers.get(header::LINK).is_none());

        let mut headers = HeaderMap::new();
        add_link_headers(&mut headers, StatusCode::OK, &ctx(Mode::Desktop), &site(), &t);
        assert!(headers.get(header::LINK).is_none());
    }

    #[tokio::test]
    async fn injects_config_into_mobile_html() {
        let site = site();
        let mut ctx = ctx(Mode::Mobile);
        let response = Response::builder()
            .header(header::CONTENT_TYPE, "text/html")
            .header(header::CONTENT_LENGTH, "26")
            .body(Body::from("<head></head><body></body>"))
            .unwrap();
        let t = target("https://en.m.wikipedia.org/wiki/Foo", "en.m.wikipedia.org");

        let out = finalize(response, &mut ctx, &site, &t, &Method::GET, 1024).await.unwrap();
        assert_eq!(out.headers()[header::VARY], "Cookie");
        let len: usize = out.headers()[header::CONTENT_LENGTH].to_str().unwrap().parse().unwrap();
        let body = axum::body::to_bytes(out.into_body(), usize::MAX).await.unwrap();
        assert_eq!(len, body.len());
        let body = String::from_utf8(body.to_vec()).unwrap();
        assert!(body.starts_with("<head><script>window.MF_CONFIG = {"));
        assert!(body.contains("\"wgMFMode\":\"stable\""));
        assert!(body.ends_with("</script></head><body></body>"));
    }

    #[tokio::test]
    async fn desktop_html_is_passed_through() {
        let site = site();
        let mut ctx = ctx(Mode::Desktop);
        let response = Response::builder()
            .header(header::CONTENT_TYPE, "text/html")
            .body(Body::from("<head></head>"))
            .unwrap();
        let t = target("https://en.wikipedia.org/wiki/Foo", "en.wikipedia.org");

        let out = finalize(response, &mut ctx, &site, &t, &Method::GET, 1024).await.unwrap();
        assert!(out.headers().get(header::VARY).is_none());
        let body = axum::body::to_bytes(out.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"<head></head>");
    }

    #[tokio::test]
    async fn oversized_pages_are_not_buffered() {
        let site = site();
        let mut ctx = ctx(Mode::Mobile);
        let response = Response::builder()
            .header(header::CONTENT_TYPE, "text/html")
            .header(header::CONTENT_LENGTH, "13")
            .body(Body::from("<head></head>"))
            .unwrap();
        let t = target("https://en.m.wikipedia.org/wiki/Foo", "en.m.wikipedia.org");

        let out = finalize(response, &mut ctx, &site, &t, &Method::GET, 4).await.unwrap();
        let body = axum::body::to_bytes(out.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"<head></head>");
    }

    #[tokio::test]
    async fn streamed_pages_over_the_limit_pass_through_whole() {
        let site = site();
        let mut ctx = ctx(Mode::Mobile);
        let chunks = vec![
            Ok::<_, std::io::Error>("<html><head><title>Streamed page</title></head>"),
            Ok("<body>chunk two of two</body></html>"),
        ];
        let page: String = chunks.iter().map(|c| *c.as_ref().unwrap()).collect();
        let response = Response::builder()
            .header(header::CONTENT_TYPE, "text/html")
            .body(Body::from_stream(futures_util::stream::iter(chunks)))
            .unwrap();
        let t = target("https://en.m.wikipedia.org/wiki/Foo", "en.m.wikipedia.org");

        let out = finalize(response, &mut ctx, &site, &t, &Method::GET, 32).await.unwrap();
        assert_eq!(out.status(), StatusCode::OK);
        assert!(out.headers().get(header::CONTENT_LENGTH).is_none());
        let body = axum::body::to_bytes(out.into_body(), usize::MAX).await.unwrap();
        assert_eq!(body.len(), page.len());
        assert_eq!(&body[..], page.as_bytes());
    }

    #[tokio::test]
    async fn streamed_pages_within_the_limit_are_injected() {
        let site = site();
        let mut ctx = ctx(Mode::Mobile);
        let chunks = vec![Ok::<_, std::io::Error>("<head></head>"), Ok("<body></body>")];
        let response = Response::builder()
            .header(header::CONTENT_TYPE, "text/html")
            .body(Body::from_stream(futures_util::stream::iter(chunks)))
            .unwrap();
        let t = target("https://en.m.wikipedia.org/wiki/Foo", "en.m.wikipedia.org");

        let out = finalize(response, &mut ctx, &site, &t, &Method::GET, 1024).await.unwrap();
        let body = axum::body::to_bytes(out.into_body(), usize::MAX).await.unwrap();
        let body = String::from_utf8(body.to_vec()).unwrap();
        assert!(body.starts_with("<head><script>window.MF_CONFIG = {"));
        assert!(body.ends_with("</script></head><body></body>"));
    }

    #[tokio::test]
    async fn analytics_are_emitted_for_beta_mobile_users() {
        let site = site();
        let signals = RequestSignals {
            optin_cookie: Some("beta".into()),
            ..Default::default()
        };
        let resolution = Resolution {
            mode: Mode::Mobile,
            decided_by: "test",
            consulted: vec!["test"],
            vary: VaryKeys::new(),
        };
        let mut ctx = MobileContext::new(signals, resolution, false);
        let response = Response::new(Body::empty());
        let t = target("https://en.m.wikipedia.org/wiki/Foo", "en.m.wikipedia.org");

        let out = finalize(response, &mut ctx, &site, &t, &Method::GET, 1024).await.unwrap();
        assert_eq!(out.headers()[X_ANALYTICS], "mf-m=b");
    }
}
