//! Per-request mobile context.
//!
//! The mode is resolved exactly once, when the context is built at the start
//! of request handling. Everything downstream reads it from here, so every
//! stage of one request observes the same answer.

use axum::http::HeaderName;

use crate::mobile::analytics::AnalyticsLog;
use crate::mobile::mode::Mode;
use crate::mobile::resolver::Resolution;
use crate::mobile::signals::RequestSignals;
use crate::mobile::vary::VaryKeys;

/// Optin cookie value marking beta-group membership.
pub const BETA_OPTIN_VALUE: &str = "beta";

/// Analytics key recording the mobile mode of beta users.
pub const MODE_ANALYTICS_KEY: &str = "mf-m";

/// Resolved mobile state of one request.
#[derive(Debug, Clone)]
pub struct MobileContext {
    signals: RequestSignals,
    resolution: Resolution,
    blacklisted: bool,
    analytics: AnalyticsLog,
    vary: VaryKeys,
}

impl MobileContext {
    /// Wrap a finished resolution.
    pub fn new(signals: RequestSignals, resolution: Resolution, blacklisted: bool) -> Self {
        let mut analytics = signals
            .x_analytics
            .as_deref()
            .map(AnalyticsLog::from_header)
            .unwrap_or_default();
        if resolution.mode.is_mobile() && is_beta(&signals) {
            analytics.add(MODE_ANALYTICS_KEY, "b");
        }

        Self {
            vary: resolution.vary.clone(),
            signals,
            resolution,
            blacklisted,
            analytics,
        }
    }

    pub fn mode(&self) -> Mode {
        self.resolution.mode
    }

    pub fn is_mobile(&self) -> bool {
        self.resolution.mode.is_mobile()
    }

    pub fn resolution(&self) -> &Resolution {
        &self.resolution
    }

    pub fn signals(&self) -> &RequestSignals {
        &self.signals
    }

    /// Beta-group member (opted in via cookie).
    pub fn is_beta(&self) -> bool {
        is_beta(&self.signals)
    }

    /// Page excluded from mobile rendering even in mobile mode.
    pub fn is_blacklisted_page(&self) -> bool {
        self.blacklisted
    }

    pub fn analytics(&self) -> &AnalyticsLog {
        &self.analytics
    }

    pub fn vary(&self) -> &VaryKeys {
        &self.vary
    }

    pub fn add_vary(&mut self, key: HeaderName) {
        self.vary.insert(key);
    }

    pub fn add_vary_str(&mut self, key: &str) {
        self.vary.insert_str(key);
    }
}

fn is_beta(signals: &RequestSignals) -> bool {
    signals.optin_cookie.as_deref() == Some(BETA_OPTIN_VALUE)
}
