//! Named signal evaluators.
//!
//! Each evaluator inspects one signal and either decides the mode or has no
//! opinion. The resolver folds them in order, so their position in the chain
//! is the precedence.

use std::fmt::Debug;

use axum::http::{header, HeaderName};

use crate::config::MobileConfig;
use crate::mobile::mode::Mode;
use crate::mobile::signals::RequestSignals;
use crate::mobile::user_agent::UserAgentClassifier;
use crate::mobile::vary::VaryKeys;

/// One tier of the precedence chain.
pub trait SignalEvaluator: Send + Sync + Debug {
    /// Name used in logs and metrics.
    fn name(&self) -> &'static str;

    /// A definite mode, or `None` for "no opinion".
    fn evaluate(&self, signals: &RequestSignals) -> Option<Mode>;

    /// Headers to declare in `Vary` once this tier has been consulted.
    fn vary_keys(&self, _signals: &RequestSignals, _keys: &mut VaryKeys) {}
}

/// Programmatic force flag.
#[derive(Debug, Default)]
pub struct ExplicitOverride;

impl SignalEvaluator for ExplicitOverride {
    fn name(&self) -> &'static str {
        "override"
    }

    fn evaluate(&self, signals: &RequestSignals) -> Option<Mode> {
        signals.force_mobile.then_some(Mode::Mobile)
    }
}

/// `useformat`/`mobileaction` query value, or its cookie twin when no query
/// value was supplied.
#[derive(Debug)]
pub struct FormatSelector {
    mobile_tokens: Vec<String>,
    desktop_tokens: Vec<String>,
}

impl FormatSelector {
    /// Cookie value written when a user explicitly opts into the mobile view.
    pub const COOKIE_MOBILE_VALUE: &'static str = "true";

    pub fn new(mobile_tokens: Vec<String>, desktop_tokens: Vec<String>) -> Self {
        Self {
            mobile_tokens,
            desktop_tokens,
        }
    }

    pub fn from_config(config: &MobileConfig) -> Self {
        Self::new(config.mobile_formats.clone(), config.desktop_formats.clone())
    }

    fn classify(&self, token: &str) -> Option<Mode> {
        if self.mobile_tokens.iter().any(|t| t == token) {
            Some(Mode::Mobile)
        } else if self.desktop_tokens.iter().any(|t| t == token) {
            Some(Mode::Desktop)
        } else {
            None
        }
    }
}

impl SignalEvaluator for FormatSelector {
    fn name(&self) -> &'static str {
        "format"
    }

    fn evaluate(&self, signals: &RequestSignals) -> Option<Mode> {
        match (&signals.format_query, &signals.format_cookie) {
            (Some(query), _) => self.classify(query),
            (None, Some(cookie)) if cookie == Self::COOKIE_MOBILE_VALUE => Some(Mode::Mobile),
            (None, Some(cookie)) => self.classify(cookie),
            (None, None) => None,
        }
    }

    fn vary_keys(&self, signals: &RequestSignals, keys: &mut VaryKeys) {
        if signals.format_query.is_none() {
            keys.insert(header::COOKIE);
        }
    }
}

/// Custom header set by a front cache for mobile hosts.
#[derive(Debug)]
pub struct MobileHeader {
    name: HeaderName,
    expected: Option<String>,
}

impl MobileHeader {
    pub fn new(name: HeaderName, expected: Option<String>) -> Self {
        Self { name, expected }
    }
}

impl SignalEvaluator for MobileHeader {
    fn name(&self) -> &'static str {
        "header"
    }

    fn evaluate(&self, signals: &RequestSignals) -> Option<Mode> {
        let value = signals.mobile_header.as_deref()?;
        match &self.expected {
            Some(expected) if !value.eq_ignore_ascii_case(expected) => None,
            _ => Some(Mode::Mobile),
        }
    }

    fn vary_keys(&self, _signals: &RequestSignals, keys: &mut VaryKeys) {
        keys.insert(self.name.clone());
    }
}

/// Opt-out cookie; outranks device detection only.
#[derive(Debug, Default)]
pub struct StopRedirectCookie;

/// Cookie truthiness: present, non-empty, not "0" and not "false".
pub fn is_truthy(value: &str) -> bool {
    !(value.is_empty() || value == "0" || value.eq_ignore_ascii_case("false"))
}

impl SignalEvaluator for StopRedirectCookie {
    fn name(&self) -> &'static str {
        "stop_redirect"
    }

    fn evaluate(&self, signals: &RequestSignals) -> Option<Mode> {
        signals
            .stop_redirect_cookie
            .as_deref()
            .filter(|v| is_truthy(v))
            .map(|_| Mode::Desktop)
    }

    fn vary_keys(&self, _signals: &RequestSignals, keys: &mut VaryKeys) {
        keys.insert(header::COOKIE);
    }
}

/// User-agent sniffing.
#[derive(Debug)]
pub struct UserAgentSniffer {
    classifier: UserAgentClassifier,
    vary_on_user_agent: bool,
}

impl UserAgentSniffer {
    pub const NAME: &'static str = "user_agent";

    pub fn new(classifier: UserAgentClassifier, vary_on_user_agent: bool) -> Self {
        Self {
            classifier,
            vary_on_user_agent,
        }
    }
}

impl SignalEvaluator for UserAgentSniffer {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn evaluate(&self, signals: &RequestSignals) -> Option<Mode> {
        signals
            .user_agent
            .as_deref()
            .filter(|ua| self.classifier.is_mobile(ua))
            .map(|_| Mode::Mobile)
    }

    fn vary_keys(&self, _signals: &RequestSignals, keys: &mut VaryKeys) {
        if self.vary_on_user_agent {
            keys.insert(header::USER_AGENT);
        }
    }
}
