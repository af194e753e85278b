//! Skin selection for the mobile view.

use axum::http::HeaderName;

use crate::config::MobileConfig;

/// Upstream request header naming the skin to render with.
pub const X_MOBILE_SKIN: HeaderName = HeaderName::from_static("x-mobile-skin");

/// Picks the skin the upstream should render a mobile page with.
#[derive(Debug, Clone)]
pub struct SkinSelector {
    default_skin: String,
    known_skins: Vec<String>,
}

impl SkinSelector {
    pub fn from_config(config: &MobileConfig) -> Self {
        Self {
            default_skin: config.default_skin.clone(),
            known_skins: config.known_skins.clone(),
        }
    }

    /// A `useskin` value is honoured only if it already is a known skin key;
    /// anything else falls back to the default mobile skin.
    pub fn select(&self, requested: Option<&str>) -> String {
        requested
            .filter(|skin| self.known_skins.iter().any(|k| k == skin))
            .unwrap_or(self.default_skin.as_str())
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selection() {
        let selector = SkinSelector::from_config(&MobileConfig::default());
        assert_eq!(selector.select(None), "minerva");
        assert_eq!(selector.select(Some("vector")), "vector");
        assert_eq!(selector.select(Some("Vector")), "minerva");
        assert_eq!(selector.select(Some("gibberish")), "minerva");
    }
}
