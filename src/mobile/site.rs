//! Compiled mobile site configuration.

use axum::http::{header, HeaderValue, Request};

use crate::config::MobileConfig;
use crate::mobile::context::MobileContext;
use crate::mobile::features::FeaturesManager;
use crate::mobile::pages::PathPrefixSet;
use crate::mobile::resolver::MobileViewResolver;
use crate::mobile::signals::RequestSignals;
use crate::mobile::skin::SkinSelector;
use crate::mobile::url_template::UrlTranslator;

/// Marker value written into the mobile header for requests on a mobile host.
pub const MOBILE_HOST_MARKER: &str = "M";

/// Everything needed to handle the mobile side of a request, built once per
/// configuration and shared read-only across requests.
#[derive(Debug)]
pub struct MobileSite {
    pub config: MobileConfig,
    pub resolver: MobileViewResolver,
    pub translator: UrlTranslator,
    pub skins: SkinSelector,
    pub features: FeaturesManager,
    blacklist: PathPrefixSet,
}

impl MobileSite {
    pub fn from_config(config: MobileConfig) -> Self {
        Self {
            resolver: MobileViewResolver::from_config(&config),
            translator: UrlTranslator::from_config(&config),
            skins: SkinSelector::from_config(&config),
            features: FeaturesManager::new(config.features.clone()),
            blacklist: PathPrefixSet::new(&config.blacklisted_paths),
            config,
        }
    }

    /// Mark requests arriving on a mobile host with the mobile header, the
    /// way a front cache would, unless the header is already present.
    pub fn mark_mobile_host<B>(&self, req: &mut Request<B>) {
        if !self.config.mark_mobile_host {
            return;
        }
        let on_mobile_host = req
            .headers()
            .get(header::HOST)
            .and_then(|h| h.to_str().ok())
            .is_some_and(|host| self.translator.is_mobile_host(host));
        if !on_mobile_host {
            return;
        }
        let Ok(name) = header::HeaderName::try_from(self.config.mobile_header.as_str()) else {
            return;
        };
        if req.headers().contains_key(&name) {
            return;
        }
        let marker = self
            .config
            .mobile_header_value
            .as_deref()
            .unwrap_or(MOBILE_HOST_MARKER);
        if let Ok(value) = HeaderValue::from_str(marker) {
            req.headers_mut().insert(name, value);
        }
    }

    /// Extract signals and resolve the mode once.
    pub fn context_for<B>(&self, req: &Request<B>) -> MobileContext {
        let signals = RequestSignals::from_request(req, &self.config);
        let resolution = self.resolver.resolve(&signals);
        let blacklisted = self.blacklist.matches(&signals.path);
        MobileContext::new(signals, resolution, blacklisted)
    }
}
