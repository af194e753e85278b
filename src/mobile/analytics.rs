//! `X-Analytics` log items.
//!
//! The header carries `key=value` pairs separated by `;`. Items arriving on
//! the request are kept and echoed on mobile responses together with the
//! items the proxy adds itself.

use axum::http::{HeaderName, HeaderValue};

pub const X_ANALYTICS: HeaderName = HeaderName::from_static("x-analytics");

/// Ordered analytics items; later writes to a key replace earlier ones.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnalyticsLog {
    items: Vec<(String, String)>,
}

impl AnalyticsLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a raw `X-Analytics` header. Items without `=` or with an empty key are skipped.
    pub fn from_header(raw: &str) -> Self {
        let mut log = Self::new();
        for item in raw.split(';') {
            if let Some((key, value)) = item.split_once('=') {
                log.add(key.trim(), value.trim());
            }
        }
        log
    }

    pub fn add(&mut self, key: &str, value: &str) {
        if key.is_empty() {
            return;
        }
        match self.items.iter_mut().find(|(k, _)| k == key) {
            Some(item) => item.1 = value.to_string(),
            None => self.items.push((key.to_string(), value.to_string())),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Serialized header value, `None` when there is nothing to log.
    pub fn header_value(&self) -> Option<HeaderValue> {
        if self.items.is_empty() {
            return None;
        }
        let joined = self
            .items
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(";");
        HeaderValue::from_str(&joined).ok()
    }
}
