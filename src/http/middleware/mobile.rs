//! Mobile view middleware.
//! Resolves the mode once per request and applies it on both sides of the
//! upstream call. Redirects answered here are counted here; everything
//! else is counted by the proxy handler.

use std::time::Instant;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::http::request::{RequestTarget, X_MOBILE_MODE};
use crate::http::response;
use crate::http::server::AppState;
use crate::mobile::evaluators::UserAgentSniffer;
use crate::mobile::skin::X_MOBILE_SKIN;
use crate::mobile::toggle::{plan_toggle, Toggle};
use crate::mobile::vary::VaryKeys;
use crate::mobile::{MobileContext, MobileSite};
use crate::observability::metrics;

pub async fn mobile_view_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let start = Instant::now();
    let snapshot = state.snapshot();
    let site = &snapshot.site;

    site.mark_mobile_host(&mut req);
    let target = RequestTarget::from_request(&req);
    let method = req.method().clone();

    let toggle = plan_toggle(req.uri(), &target.url, &site.config, &site.translator);
    if let Some(Toggle {
        set_cookies,
        redirect: Some(location),
    }) = &toggle
    {
        let response = redirect(location, set_cookies, None);
        metrics::record_request(method.as_str(), response.status().as_u16(), start);
        return response;
    }

    let mut ctx = site.context_for(&req);
    metrics::record_resolution(ctx.resolution());

    if let Some(location) = auto_redirect_target(site, &ctx, &target) {
        tracing::debug!(location = %location, "Redirecting mobile device to mobile host");
        let response = redirect(&location, &[], Some(ctx.vary()));
        metrics::record_request(method.as_str(), response.status().as_u16(), start);
        return response;
    }

    annotate_upstream(&mut req, &ctx, site);
    req.extensions_mut().insert(ctx.clone());

    let upstream_response = next.run(req).await;
    let mut response = match response::finalize(
        upstream_response,
        &mut ctx,
        site,
        &target,
        &method,
        snapshot.config.upstream.max_html_bytes,
    )
    .await
    {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(error = %e, "Failed to post-process upstream response");
            e.into_response()
        }
    };

    if let Some(toggle) = toggle {
        for cookie in toggle.set_cookies {
            response.headers_mut().append(header::SET_COOKIE, cookie);
        }
    }
    response
}

/// Tell the upstream which view to render.
fn annotate_upstream(req: &mut Request<Body>, ctx: &MobileContext, site: &MobileSite) {
    let headers = req.headers_mut();
    headers.insert(X_MOBILE_MODE, HeaderValue::from_static(ctx.mode().as_str()));

    headers.remove(X_MOBILE_SKIN);
    if ctx.is_mobile() && !ctx.is_blacklisted_page() {
        let skin = site.skins.select(ctx.signals().use_skin.as_deref());
        if let Ok(value) = HeaderValue::from_str(&skin) {
            headers.insert(X_MOBILE_SKIN, value);
        }
    }
}

/// Mobile devices detected by user agent on a desktop host are sent to the
/// mobile host, when enabled.
fn auto_redirect_target(site: &MobileSite, ctx: &MobileContext, target: &RequestTarget) -> Option<String> {
    if !site.config.auto_redirect
        || !ctx.is_mobile()
        || ctx.resolution().decided_by != UserAgentSniffer::NAME
    {
        return None;
    }
    let host = target.host.as_deref()?;
    if !site.translator.is_desktop_host(host) {
        return None;
    }
    let mobile = site.translator.to_mobile(&target.url);
    (mobile != target.url).then_some(mobile)
}

fn redirect(location: &str, set_cookies: &[HeaderValue], vary: Option<&VaryKeys>) -> Response {
    let Ok(location) = HeaderValue::from_str(location) else {
        return (StatusCode::BAD_REQUEST, "Invalid redirect target").into_response();
    };
    let mut response = StatusCode::FOUND.into_response();
    let headers = response.headers_mut();
    headers.insert(header::LOCATION, location);
    for cookie in set_cookies {
        headers.append(header::SET_COOKIE, cookie.clone());
    }
    if let Some(vary) = vary {
        vary.apply(headers);
    }
    response
}
