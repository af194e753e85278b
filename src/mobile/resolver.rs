//! Mobile view resolution.
//!
//! # Precedence
//! ```text
//! override → format (query, then cookie) → header → stop-redirect cookie
//!          → user agent → default (desktop)
//! ```
//!
//! # Design Decisions
//! - The chain is data: an ordered list of named evaluators
//! - A single fold stops at the first definite answer
//! - Resolution never fails; it always ends with a definite mode
//! - Every consulted tier contributes its vary keys

use axum::http::HeaderName;

use crate::config::MobileConfig;
use crate::mobile::evaluators::{
    ExplicitOverride, FormatSelector, MobileHeader, SignalEvaluator, StopRedirectCookie,
    UserAgentSniffer,
};
use crate::mobile::mode::Mode;
use crate::mobile::signals::RequestSignals;
use crate::mobile::user_agent::UserAgentClassifier;
use crate::mobile::vary::VaryKeys;

/// Name reported when no evaluator decided.
pub const DEFAULT_DECIDER: &str = "default";

/// Outcome of resolving one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub mode: Mode,
    /// Evaluator that decided, or [`DEFAULT_DECIDER`].
    pub decided_by: &'static str,
    /// Evaluators consulted, in order, including the deciding one.
    pub consulted: Vec<&'static str>,
    /// Vary keys contributed by the consulted evaluators.
    pub vary: VaryKeys,
}

/// Ordered precedence chain.
#[derive(Debug)]
pub struct MobileViewResolver {
    chain: Vec<Box<dyn SignalEvaluator>>,
}

impl MobileViewResolver {
    /// Build a resolver from an explicit chain.
    pub fn new(chain: Vec<Box<dyn SignalEvaluator>>) -> Self {
        Self { chain }
    }

    /// Build the standard chain from configuration.
    ///
    /// A disabled configuration keeps only the explicit override. Invalid
    /// user-agent patterns or header names disable the corresponding tier.
    pub fn from_config(config: &MobileConfig) -> Self {
        let mut chain: Vec<Box<dyn SignalEvaluator>> = vec![Box::new(ExplicitOverride)];
        if !config.enabled {
            return Self::new(chain);
        }

        chain.push(Box::new(FormatSelector::from_config(config)));

        match HeaderName::try_from(config.mobile_header.as_str()) {
            Ok(name) => chain.push(Box::new(MobileHeader::new(
                name,
                config.mobile_header_value.clone(),
            ))),
            Err(_) => tracing::warn!(
                header = %config.mobile_header,
                "Invalid mobile header name, header detection disabled"
            ),
        }

        chain.push(Box::new(StopRedirectCookie));

        if config.autodetect {
            let classifier = UserAgentClassifier::new(&config.user_agent_patterns)
                .unwrap_or_else(|e| {
                    tracing::warn!(error = %e, "Invalid user agent patterns, device detection disabled");
                    UserAgentClassifier::empty()
                });
            // With a separate mobile host, devices are told apart by host and
            // the shared cache must not split on User-Agent.
            let vary_on_user_agent = config.vary_on_user_agent && config.url_template.is_none();
            chain.push(Box::new(UserAgentSniffer::new(classifier, vary_on_user_agent)));
        }

        Self::new(chain)
    }

    /// Names of the evaluators in precedence order.
    pub fn tiers(&self) -> Vec<&'static str> {
        self.chain.iter().map(|e| e.name()).collect()
    }

    /// Resolve the mode for one request.
    pub fn resolve(&self, signals: &RequestSignals) -> Resolution {
        let mut consulted = Vec::new();
        let mut vary = VaryKeys::new();

        let decision = self.chain.iter().find_map(|evaluator| {
            consulted.push(evaluator.name());
            evaluator.vary_keys(signals, &mut vary);
            evaluator
                .evaluate(signals)
                .map(|mode| (mode, evaluator.name()))
        });

        let (mode, decided_by) = decision.unwrap_or((Mode::Desktop, DEFAULT_DECIDER));

        tracing::debug!(
            mode = %mode,
            decided_by = decided_by,
            consulted = ?consulted,
            "Mobile view resolved"
        );

        Resolution {
            mode,
            decided_by,
            consulted,
            vary,
        }
    }
}
