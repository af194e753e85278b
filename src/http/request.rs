//! Request identification and URL reconstruction.
//!
//! # Responsibilities
//! - Generate a unique request ID (UUID v4) as early as possible
//! - Rebuild the absolute URL the client asked for
//! - Prepare the upstream copy of a request (hop-by-hop headers dropped)

use axum::http::{header, uri::Authority, HeaderMap, HeaderName, HeaderValue, Request, Uri};
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

/// Header carrying the request ID.
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Upstream request header announcing the resolved mode.
pub const X_MOBILE_MODE: HeaderName = HeaderName::from_static("x-mobile-mode");

const X_FORWARDED_PROTO: &str = "x-forwarded-proto";

/// Headers that are meaningful only for a single transport hop.
const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// UUID v4 request IDs for `SetRequestIdLayer`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeRequestUuid;

impl MakeRequestId for MakeRequestUuid {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// Request ID as a string, `"unknown"` if missing.
pub fn request_id(headers: &HeaderMap) -> String {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string()
}

/// Host the client addressed, port included.
pub fn request_host(headers: &HeaderMap, uri: &Uri) -> Option<String> {
    headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .filter(|h| !h.is_empty())
        .map(str::to_string)
        .or_else(|| uri.authority().map(Authority::to_string))
}

/// Absolute URL of the request. The scheme comes from `X-Forwarded-Proto`
/// when a TLS terminator sits in front, `http` otherwise.
pub fn request_url(headers: &HeaderMap, uri: &Uri) -> String {
    let scheme = headers
        .get(X_FORWARDED_PROTO)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|s| matches!(*s, "http" | "https"))
        .or_else(|| uri.scheme_str())
        .unwrap_or("http");
    let host = request_host(headers, uri).unwrap_or_else(|| "localhost".to_string());
    let path = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    format!("{scheme}://{host}{path}")
}

/// Where the client sent the request, captured before it is forwarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestTarget {
    /// Absolute request URL.
    pub url: String,
    /// `Host` as sent, port included.
    pub host: Option<String>,
}

impl RequestTarget {
    pub fn from_request<B>(req: &Request<B>) -> Self {
        Self {
            url: request_url(req.headers(), req.uri()),
            host: request_host(req.headers(), req.uri()),
        }
    }
}

/// Remove hop-by-hop headers, including any listed in `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<String> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|v| v.trim().to_ascii_lowercase())
        .filter(|v| !v.is_empty())
        .collect();
    for name in HOP_BY_HOP.iter().copied().chain(listed.iter().map(String::as_str)) {
        headers.remove(name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_ids_are_uuids() {
        let req = Request::new(());
        let id = MakeRequestUuid.make_request_id(&req).unwrap();
        let value = id.header_value().to_str().unwrap();
        assert!(Uuid::parse_str(value).is_ok());
    }

    #[test]
    fn rebuilds_url_from_host_header() {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("en.wikipedia.org"));
        let uri: Uri = "/wiki/Foo?a=b".parse().unwrap();
        assert_eq!(request_url(&headers, &uri), "http://en.wikipedia.org/wiki/Foo?a=b");

        headers.insert("x-forwarded-proto", HeaderValue::from_static("https, http"));
        assert_eq!(request_url(&headers, &uri), "https://en.wikipedia.org/wiki/Foo?a=b");
    }

    #[test]
    fn falls_back_to_uri_authority() {
        let uri: Uri = "http://example.org:8080/x".parse().unwrap();
        assert_eq!(request_host(&HeaderMap::new(), &uri).as_deref(), Some("example.org:8080"));
        assert_eq!(request_url(&HeaderMap::new(), &uri), "http://example.org:8080/x");
    }

    #[test]
    fn strips_hop_by_hop_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive, x-private"));
        headers.insert("keep-alive", HeaderValue::from_static("timeout=5"));
        headers.insert("x-private", HeaderValue::from_static("1"));
        headers.insert(header::COOKIE, HeaderValue::from_static("a=b"));
        strip_hop_by_hop(&mut headers);
        assert_eq!(headers.len(), 1);
        assert!(headers.contains_key(header::COOKIE));
    }
}
