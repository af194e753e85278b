//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the mobile view proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Upstream platform the proxy forwards to.
    pub upstream: UpstreamConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Request limits.
    pub security: SecurityConfig,

    /// Mobile view resolution and response rewriting.
    pub mobile: MobileConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Upstream (web-publishing platform) configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Upstream address (e.g., "127.0.0.1:3000").
    pub address: String,

    /// Maximum buffered size of an HTML body eligible for config injection.
    pub max_html_bytes: usize,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:3000".to_string(),
            max_html_bytes: 8 * 1024 * 1024,
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Request limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum request body size in bytes.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// Mobile view configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MobileConfig {
    /// Enable request-carried signals. When false only the explicit override applies.
    pub enabled: bool,

    /// Enable user-agent sniffing.
    pub autodetect: bool,

    /// Custom header that marks a request as mobile (e.g. set by a front cache).
    pub mobile_header: String,

    /// Required header value. `None` accepts any non-empty value.
    pub mobile_header_value: Option<String>,

    /// Host template such as "%h0.m.%h1.%h2". Unset disables URL translation.
    pub url_template: Option<String>,

    /// Domain considered local for translation and redirect rewriting.
    pub site_domain: Option<String>,

    /// Cookie remembering an explicit format choice.
    pub format_cookie: String,

    /// Cookie that opts a client out of mobile redirection.
    pub stop_redirect_cookie: String,

    /// Cookie marking beta-group membership.
    pub optin_cookie: String,

    /// Query parameters carrying a format selector, checked in order.
    pub format_params: Vec<String>,

    /// Format tokens selecting the mobile view.
    pub mobile_formats: Vec<String>,

    /// Format tokens selecting the desktop view.
    pub desktop_formats: Vec<String>,

    /// Case-insensitive regular expressions matching mobile user agents.
    pub user_agent_patterns: Vec<String>,

    /// Declare `Vary: User-Agent` when the user agent was consulted.
    pub vary_on_user_agent: bool,

    /// Extra vary keys added when a redirect is rewritten to the mobile host.
    pub redirect_vary_headers: Vec<String>,

    /// Skin requested from the upstream in mobile view.
    pub default_skin: String,

    /// Skins a `useskin` query value may select.
    pub known_skins: Vec<String>,

    /// Path prefixes never rendered with the mobile skin.
    pub blacklisted_paths: Vec<String>,

    /// Path prefixes always served in mobile view.
    pub force_mobile_paths: Vec<String>,

    /// Emit alternate/canonical `Link` headers.
    pub noindex_pages: bool,

    /// Tablet breakpoint used in the alternate link media query.
    pub device_width_tablet: String,

    /// Emit the `X-Analytics` response header in mobile view.
    pub x_analytics_logging: bool,

    /// Insert the mobile header when the request host is already in mobile form.
    pub mark_mobile_host: bool,

    /// Redirect detected mobile devices from the desktop host to the mobile host.
    pub auto_redirect: bool,

    /// Lifetime of cookies set by view toggling, in days.
    pub cookie_max_age_days: i64,

    /// Feature flags injected into mobile pages.
    pub features: Vec<FeatureConfig>,
}

/// A feature flag and the modes it is available in.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct FeatureConfig {
    /// Name exposed in the page config blob (e.g. "wgMFLazyLoadImages").
    pub name: String,

    /// Available to stable mobile users.
    #[serde(default)]
    pub stable: bool,

    /// Available to beta-group members.
    #[serde(default = "default_true")]
    pub beta: bool,
}

fn default_true() -> bool {
    true
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

impl Default for MobileConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            autodetect: true,
            mobile_header: "X-Subdomain".to_string(),
            mobile_header_value: None,
            url_template: None,
            site_domain: None,
            format_cookie: "mf_useformat".to_string(),
            stop_redirect_cookie: "stopMobileRedirect".to_string(),
            optin_cookie: "optin".to_string(),
            format_params: strings(&["useformat", "mobileaction"]),
            mobile_formats: strings(&["mobile", "mobile-wap", "toggle_view_mobile"]),
            desktop_formats: strings(&["desktop", "toggle_view_desktop"]),
            user_agent_patterns: strings(&[
                r"iphone|ipod|ipad",
                r"android.*mobile",
                r"windows phone|iemobile",
                r"blackberry|bb10",
                r"opera m(ob|in)i",
                r"kindle|silk/",
                r"webos|palm",
                r"symbian|nokia",
                r"\bmobile\b.*safari",
            ]),
            vary_on_user_agent: true,
            redirect_vary_headers: strings(&["X-CS"]),
            default_skin: "minerva".to_string(),
            known_skins: strings(&["minerva", "vector", "monobook", "timeless"]),
            blacklisted_paths: Vec::new(),
            force_mobile_paths: Vec::new(),
            noindex_pages: true,
            device_width_tablet: "720px".to_string(),
            x_analytics_logging: true,
            mark_mobile_host: true,
            auto_redirect: false,
            cookie_max_age_days: 30,
            features: vec![
                FeatureConfig {
                    name: "wgMFLazyLoadImages".to_string(),
                    stable: true,
                    beta: true,
                },
                FeatureConfig {
                    name: "wgMFLazyLoadReferences".to_string(),
                    stable: false,
                    beta: true,
                },
                FeatureConfig {
                    name: "wgMFEnableFontChanger".to_string(),
                    stable: false,
                    beta: true,
                },
            ],
        }
    }
}
