//! Explicit desktop/mobile view toggling.
//!
//! `mobileaction=toggle_view_mobile` and `mobileaction=toggle_view_desktop`
//! persist the choice in cookies. With a URL template configured the client is
//! redirected to the matching host; without one the request proceeds and the
//! cookies ride on the response.

use axum::http::{HeaderValue, Uri};
use cookie::{time::Duration, Cookie};

use crate::config::MobileConfig;
use crate::mobile::evaluators::FormatSelector;
use crate::mobile::signals::QueryParams;
use crate::mobile::url_template::UrlTranslator;

const MOBILEACTION: &str = "mobileaction";
const TOGGLE_MOBILE: &str = "toggle_view_mobile";
const TOGGLE_DESKTOP: &str = "toggle_view_desktop";

/// What the proxy does for a toggle request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toggle {
    /// `Set-Cookie` values to send.
    pub set_cookies: Vec<HeaderValue>,
    /// Redirect target, when the view lives on another host.
    pub redirect: Option<String>,
}

/// Decide the toggle for a request, if any.
///
/// `request_url` is the absolute URL of the current request.
pub fn plan_toggle(
    uri: &Uri,
    request_url: &str,
    config: &MobileConfig,
    translator: &UrlTranslator,
) -> Option<Toggle> {
    let query = QueryParams::from_uri(uri);

    let target_mobile = match query.get(MOBILEACTION).as_deref() {
        Some(TOGGLE_MOBILE) => true,
        Some(TOGGLE_DESKTOP) => false,
        _ => {
            // useformat=mobile on a single-domain site: remember the choice.
            let wants_mobile = query
                .get("useformat")
                .is_some_and(|v| config.mobile_formats.contains(&v));
            if wants_mobile && !translator.is_enabled() {
                return Some(Toggle {
                    set_cookies: set_cookie(&config.format_cookie, FormatSelector::COOKIE_MOBILE_VALUE, config)
                        .into_iter()
                        .collect(),
                    redirect: None,
                });
            }
            return None;
        }
    };

    let set_cookies: Vec<HeaderValue> = if target_mobile {
        [
            set_cookie(&config.format_cookie, FormatSelector::COOKIE_MOBILE_VALUE, config),
            removal_cookie(&config.stop_redirect_cookie),
        ]
    } else {
        [
            set_cookie(&config.stop_redirect_cookie, "true", config),
            removal_cookie(&config.format_cookie),
        ]
    }
    .into_iter()
    .flatten()
    .collect();

    let redirect = translator.is_enabled().then(|| {
        let cleaned = strip_query_param(request_url, MOBILEACTION);
        if target_mobile {
            translator.to_mobile(&cleaned)
        } else {
            translator.to_desktop(&cleaned)
        }
    });

    tracing::debug!(target_mobile, redirect = ?redirect, "View toggle requested");

    Some(Toggle {
        set_cookies,
        redirect,
    })
}

fn set_cookie(name: &str, value: &str, config: &MobileConfig) -> Option<HeaderValue> {
    let cookie = Cookie::build((name.to_string(), value.to_string()))
        .path("/")
        .max_age(Duration::days(config.cookie_max_age_days))
        .build();
    cookie_header(&cookie)
}

fn removal_cookie(name: &str) -> Option<HeaderValue> {
    let mut cookie = Cookie::build((name.to_string(), String::new()))
        .path("/")
        .build();
    cookie.make_removal();
    cookie_header(&cookie)
}

/// `None` when the cookie does not form a valid header value.
fn cookie_header(cookie: &Cookie<'_>) -> Option<HeaderValue> {
    match HeaderValue::from_str(&cookie.to_string()) {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(cookie = %cookie.name(), "Cookie cannot be sent as a header, skipping");
            None
        }
    }
}

/// Remove every occurrence of `param` from the query string of `url`.
pub fn strip_query_param(url: &str, param: &str) -> String {
    let (before_fragment, fragment) = match url.find('#') {
        Some(i) => url.split_at(i),
        None => (url, ""),
    };
    let Some((base, query)) = before_fragment.split_once('?') else {
        return url.to_string();
    };

    let kept: Vec<&str> = query
        .split('&')
        .filter(|pair| {
            let key = pair.split('=').next().unwrap_or_default();
            !key.is_empty() && key != param
        })
        .collect();

    if kept.is_empty() {
        format!("{base}{fragment}")
    } else {
        format!("{base}?{}{fragment}", kept.join("&"))
    }
}
