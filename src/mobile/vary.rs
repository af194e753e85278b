//! Cache-variance keys.
//!
//! Shared caches must key responses on every header that influenced the
//! view mode, otherwise a mobile response could be served to a desktop
//! client (or vice versa).

use axum::http::{header, HeaderMap, HeaderName, HeaderValue};

/// An ordered set of header names to declare in `Vary`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VaryKeys {
    keys: Vec<HeaderName>,
}

impl VaryKeys {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a key unless already present.
    pub fn insert(&mut self, key: HeaderName) {
        if !self.keys.contains(&key) {
            self.keys.push(key);
        }
    }

    /// Add a key given by name. Invalid header names are ignored.
    pub fn insert_str(&mut self, key: &str) {
        match HeaderName::try_from(key) {
            Ok(name) => self.insert(name),
            Err(_) => tracing::warn!(header = %key, "Ignoring invalid vary header name"),
        }
    }

    pub fn contains(&self, key: &HeaderName) -> bool {
        self.keys.contains(key)
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &HeaderName> {
        self.keys.iter()
    }

    /// Merge into the response's `Vary` header, keeping existing entries and
    /// skipping duplicates (case-insensitive). A `*` entry is left alone.
    pub fn apply(&self, headers: &mut HeaderMap) {
        if self.keys.is_empty() {
            return;
        }

        let mut entries: Vec<String> = headers
            .get_all(header::VARY)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(','))
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .collect();

        if entries.iter().any(|e| e == "*") {
            return;
        }

        for key in &self.keys {
            if !entries.iter().any(|e| e.eq_ignore_ascii_case(key.as_str())) {
                entries.push(canonical_case(key.as_str()));
            }
        }

        if let Ok(value) = HeaderValue::from_str(&entries.join(", ")) {
            headers.insert(header::VARY, value);
        }
    }
}

/// "x-subdomain" → "X-Subdomain".
fn canonical_case(name: &str) -> String {
    name.split('-')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}
