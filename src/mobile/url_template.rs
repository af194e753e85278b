//! Mobile URL templates and desktop ↔ mobile URL translation.
//!
//! A template such as `%h0.m.%h1.%h2` describes the mobile host in terms of
//! the dot-separated labels of the desktop host: `%hN` is the N-th desktop
//! label, anything else is a literal label inserted to form the mobile host.
//!
//! ```text
//! en.wikipedia.org  ──to_mobile──▶  en.m.wikipedia.org
//!                   ◀─to_desktop──
//! ```
//!
//! Only the host substring of a URL is replaced; every other byte is kept, so
//! translation round-trips exactly. URLs that are relative, malformed, outside
//! the configured domain or not in the template's shape are returned unchanged.

use thiserror::Error;
use url::{Host, Url};

use crate::config::MobileConfig;

/// Why a template string could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("template is empty")]
    Empty,

    #[error("template contains an empty host label")]
    EmptyLabel,

    #[error("only host templates are supported, found path in {0:?}")]
    PathUnsupported(String),

    #[error("unsupported placeholder {0:?}")]
    UnknownPlaceholder(String),

    #[error("placeholder %h{0} used more than once")]
    DuplicateLabel(usize),

    #[error("placeholders must cover %h0..%h{0} without gaps")]
    LabelGap(usize),

    #[error("template uses no host label placeholders")]
    NoPlaceholders,

    #[error("template inserts no mobile label")]
    NoLiteral,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    /// N-th label of the desktop host.
    Label(usize),
    /// Label inserted verbatim (stored lowercase).
    Literal(String),
}

/// Parsed host template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlTemplate {
    segments: Vec<Segment>,
    label_count: usize,
}

impl UrlTemplate {
    pub fn parse(template: &str) -> Result<Self, TemplateError> {
        let template = template.trim();
        if template.is_empty() {
            return Err(TemplateError::Empty);
        }
        if template.contains('/') {
            return Err(TemplateError::PathUnsupported(template.to_string()));
        }

        let mut segments = Vec::new();
        for part in template.split('.') {
            if part.is_empty() {
                return Err(TemplateError::EmptyLabel);
            }
            segments.push(parse_segment(part)?);
        }

        let mut indices: Vec<usize> = segments
            .iter()
            .filter_map(|s| match s {
                Segment::Label(i) => Some(*i),
                Segment::Literal(_) => None,
            })
            .collect();
        if indices.is_empty() {
            return Err(TemplateError::NoPlaceholders);
        }
        if indices.len() == segments.len() {
            return Err(TemplateError::NoLiteral);
        }

        indices.sort_unstable();
        for (expected, window) in indices.windows(2).enumerate() {
            if window[0] == window[1] {
                return Err(TemplateError::DuplicateLabel(window[0]));
            }
            if window[0] != expected {
                return Err(TemplateError::LabelGap(indices.len() - 1));
            }
        }
        let label_count = indices.len();
        if indices[0] != 0 || indices[label_count - 1] != label_count - 1 {
            return Err(TemplateError::LabelGap(label_count - 1));
        }

        Ok(Self {
            segments,
            label_count,
        })
    }

    /// Map a desktop host to its mobile form.
    pub fn mobile_host(&self, desktop_host: &str) -> Option<String> {
        let labels: Vec<&str> = desktop_host.split('.').collect();
        if labels.len() != self.label_count || labels.iter().any(|l| l.is_empty()) {
            return None;
        }

        let mobile: Vec<&str> = self
            .segments
            .iter()
            .map(|segment| match segment {
                Segment::Label(i) => labels[*i],
                Segment::Literal(literal) => literal.as_str(),
            })
            .collect();
        Some(mobile.join("."))
    }

    /// Map a mobile host back to its desktop form.
    pub fn desktop_host(&self, mobile_host: &str) -> Option<String> {
        let labels: Vec<&str> = mobile_host.split('.').collect();
        if labels.len() != self.segments.len() {
            return None;
        }

        let mut desktop = vec![""; self.label_count];
        for (label, segment) in labels.iter().zip(&self.segments) {
            match segment {
                Segment::Label(i) if !label.is_empty() => desktop[*i] = label,
                Segment::Literal(literal) if label.eq_ignore_ascii_case(literal) => {}
                _ => return None,
            }
        }
        Some(desktop.join("."))
    }
}

fn parse_segment(part: &str) -> Result<Segment, TemplateError> {
    if let Some(rest) = part.strip_prefix("%h") {
        if !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()) {
            return rest
                .parse()
                .map(Segment::Label)
                .map_err(|_| TemplateError::UnknownPlaceholder(part.to_string()));
        }
        return Err(TemplateError::UnknownPlaceholder(part.to_string()));
    }
    if part.contains('%') {
        return Err(TemplateError::UnknownPlaceholder(part.to_string()));
    }
    Ok(Segment::Literal(part.to_ascii_lowercase()))
}

/// Byte range of the host inside a URL string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct HostSpan {
    start: usize,
    end: usize,
}

/// Locate the domain host of an absolute or protocol-relative URL.
fn host_span(url: &str) -> Option<HostSpan> {
    let authority_start = if url.starts_with("//") {
        Url::parse(&format!("http:{url}")).ok()?;
        2
    } else {
        let parsed = Url::parse(url).ok()?;
        if parsed.cannot_be_a_base() {
            return None;
        }
        url.find("://")? + 3
    };

    let rest = &url[authority_start..];
    let authority_len = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    let authority = &rest[..authority_len];

    let host_offset = authority.rfind('@').map(|i| i + 1).unwrap_or(0);
    let host_and_port = &authority[host_offset..];
    if host_and_port.starts_with('[') {
        return None;
    }
    let host_len = host_and_port.find(':').unwrap_or(host_and_port.len());
    let host = &host_and_port[..host_len];

    match Host::parse(host) {
        Ok(Host::Domain(_)) => Some(HostSpan {
            start: authority_start + host_offset,
            end: authority_start + host_offset + host_len,
        }),
        _ => None,
    }
}

/// Strip a `:port` suffix from a Host header value.
pub fn strip_port(host: &str) -> &str {
    match host.rfind(':') {
        Some(i) if !host.ends_with(']') => &host[..i],
        _ => host,
    }
}

/// Translates URLs between desktop and mobile hosts.
#[derive(Debug, Clone, Default)]
pub struct UrlTranslator {
    template: Option<UrlTemplate>,
    site_domain: Option<String>,
}

impl UrlTranslator {
    pub fn new(template: Option<UrlTemplate>, site_domain: Option<String>) -> Self {
        Self {
            template,
            site_domain: site_domain
                .map(|d| d.trim_matches('.').to_ascii_lowercase())
                .filter(|d| !d.is_empty()),
        }
    }

    /// Build from configuration. A malformed template disables translation.
    pub fn from_config(config: &MobileConfig) -> Self {
        let template = config.url_template.as_deref().and_then(|raw| {
            UrlTemplate::parse(raw)
                .map_err(|e| {
                    tracing::warn!(template = %raw, error = %e, "Malformed mobile URL template, URL translation disabled");
                })
                .ok()
        });
        Self::new(template, config.site_domain.clone())
    }

    pub fn is_enabled(&self) -> bool {
        self.template.is_some()
    }

    fn in_domain(&self, desktop_host: &str) -> bool {
        match &self.site_domain {
            None => true,
            Some(domain) => {
                let host = desktop_host.to_ascii_lowercase();
                host == *domain || host.ends_with(&format!(".{domain}"))
            }
        }
    }

    /// Desktop → mobile. Returns the input unchanged when not applicable.
    pub fn to_mobile(&self, url: &str) -> String {
        self.rewrite_host(url, |template, host| {
            template
                .mobile_host(host)
                .filter(|_| self.in_domain(host))
        })
    }

    /// Mobile → desktop. Returns the input unchanged when not applicable.
    pub fn to_desktop(&self, url: &str) -> String {
        self.rewrite_host(url, |template, host| {
            template
                .desktop_host(host)
                .filter(|desktop| self.in_domain(desktop))
        })
    }

    fn rewrite_host<F>(&self, url: &str, map: F) -> String
    where
        F: Fn(&UrlTemplate, &str) -> Option<String>,
    {
        let Some(template) = &self.template else {
            return url.to_string();
        };
        let Some(span) = host_span(url) else {
            return url.to_string();
        };
        match map(template, &url[span.start..span.end]) {
            Some(host) => format!("{}{}{}", &url[..span.start], host, &url[span.end..]),
            None => url.to_string(),
        }
    }

    /// True if `host` (without port) is a mobile host of the configured domain.
    pub fn is_mobile_host(&self, host: &str) -> bool {
        let host = strip_port(host);
        match &self.template {
            Some(template) => template
                .desktop_host(host)
                .is_some_and(|desktop| self.in_domain(&desktop)),
            None => false,
        }
    }

    /// True if `host` (without port) is a desktop host that has a mobile form.
    pub fn is_desktop_host(&self, host: &str) -> bool {
        let host = strip_port(host);
        match &self.template {
            Some(template) => template.mobile_host(host).is_some() && self.in_domain(host),
            None => false,
        }
    }

    /// Whether `url` points at this site: relative, the request's own host
    /// (in either form), or inside the configured domain.
    pub fn is_local_url(&self, url: &str, request_host: Option<&str>) -> bool {
        let Some(span) = host_span(url) else {
            return !url.starts_with("//")
                && matches!(Url::parse(url), Err(url::ParseError::RelativeUrlWithoutBase));
        };
        let host = url[span.start..span.end].to_ascii_lowercase();

        if let Some(request_host) = request_host.map(strip_port) {
            let request_host = request_host.to_ascii_lowercase();
            if host == request_host || self.to_desktop_host(&host) == self.to_desktop_host(&request_host) {
                return true;
            }
        }

        match &self.site_domain {
            Some(_) => self.in_domain(&self.to_desktop_host(&host)),
            None => false,
        }
    }

    fn to_desktop_host(&self, host: &str) -> String {
        self.template
            .as_ref()
            .and_then(|t| t.desktop_host(host))
            .unwrap_or_else(|| host.to_string())
    }

    /// Add the mobile variant of every URL whose translation differs, so both
    /// variants get purged from caches.
    pub fn purge_urls(&self, urls: &[String]) -> Vec<String> {
        let mut out = urls.to_vec();
        for url in urls {
            let mobile = self.to_mobile(url);
            if mobile != *url && !out.contains(&mobile) {
                out.push(mobile);
            }
        }
        out
    }
}
