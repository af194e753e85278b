//! Request signal extraction.
//!
//! Every signal is materialized once, before resolution, from the request
//! headers, cookies, query string and extensions. Empty values are treated as
//! absent.

use std::collections::HashMap;

use axum::http::{header, Extensions, HeaderMap, Request, Uri};
use cookie::Cookie;

use crate::config::MobileConfig;
use crate::mobile::pages::PathPrefixSet;

/// Request extension forcing the mobile view, inserted by an earlier layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForceMobileView(pub bool);

/// Signals observed on one incoming request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestSignals {
    /// Programmatic override.
    pub force_mobile: bool,
    /// Value of the first present format query parameter.
    pub format_query: Option<String>,
    /// Persisted format choice.
    pub format_cookie: Option<String>,
    /// Value of the custom mobile header.
    pub mobile_header: Option<String>,
    /// Opt-out of mobile redirection.
    pub stop_redirect_cookie: Option<String>,
    pub user_agent: Option<String>,
    /// Beta opt-in cookie.
    pub optin_cookie: Option<String>,
    /// Requested skin (`useskin` query value).
    pub use_skin: Option<String>,
    /// Raw `X-Analytics` request header.
    pub x_analytics: Option<String>,
    /// Request path.
    pub path: String,
}

impl RequestSignals {
    /// Extract signals from a full request.
    pub fn from_request<B>(req: &Request<B>, config: &MobileConfig) -> Self {
        Self::extract(req.headers(), req.uri(), req.extensions(), config)
    }

    fn extract(
        headers: &HeaderMap,
        uri: &Uri,
        extensions: &Extensions,
        config: &MobileConfig,
    ) -> Self {
        let query = QueryParams::from_uri(uri);
        let cookies = parse_cookies(headers);
        let path = uri.path().to_string();

        let forced_by_layer = extensions
            .get::<ForceMobileView>()
            .map(|f| f.0)
            .unwrap_or(false);
        let forced_by_path = PathPrefixSet::new(&config.force_mobile_paths).matches(&path);

        let format_query = config
            .format_params
            .iter()
            .find_map(|param| query.get(param));

        Self {
            force_mobile: forced_by_layer || forced_by_path,
            format_query,
            format_cookie: cookie_value(&cookies, &config.format_cookie),
            mobile_header: header_value(headers, &config.mobile_header),
            stop_redirect_cookie: cookie_value(&cookies, &config.stop_redirect_cookie),
            user_agent: header_value(headers, header::USER_AGENT.as_str()),
            optin_cookie: cookie_value(&cookies, &config.optin_cookie),
            use_skin: query.get("useskin"),
            x_analytics: header_value(headers, "x-analytics"),
            path,
        }
    }
}

/// Decoded query string, first occurrence of each key wins.
#[derive(Debug, Default)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    pub fn from_uri(uri: &Uri) -> Self {
        let pairs = uri
            .query()
            .map(|q| {
                url::form_urlencoded::parse(q.as_bytes())
                    .map(|(k, v)| (k.into_owned(), v.into_owned()))
                    .collect()
            })
            .unwrap_or_default();
        Self { pairs }
    }

    /// Non-empty value of the first occurrence of `key`.
    pub fn get(&self, key: &str) -> Option<String> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
            .filter(|v| !v.is_empty())
    }
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse every `Cookie` header into a name → value map. Malformed pairs are skipped.
pub fn parse_cookies(headers: &HeaderMap) -> HashMap<String, String> {
    let mut cookies = HashMap::new();
    for value in headers.get_all(header::COOKIE) {
        let Ok(raw) = value.to_str() else { continue };
        for cookie in Cookie::split_parse(raw).flatten() {
            cookies
                .entry(cookie.name().to_string())
                .or_insert_with(|| cookie.value().to_string());
        }
    }
    cookies
}

fn cookie_value(cookies: &HashMap<String, String>, name: &str) -> Option<String> {
    cookies.get(name).filter(|v| !v.is_empty()).cloned()
}
