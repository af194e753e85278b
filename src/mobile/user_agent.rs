//! User-agent classification.

use regex::{RegexSet, RegexSetBuilder};

/// Classifies user agents as mobile by matching known device and browser signatures.
#[derive(Debug, Clone)]
pub struct UserAgentClassifier {
    patterns: RegexSet,
}

impl UserAgentClassifier {
    /// Compile the patterns case-insensitively.
    pub fn new(patterns: &[String]) -> Result<Self, regex::Error> {
        let patterns = RegexSetBuilder::new(patterns)
            .case_insensitive(true)
            .build()?;
        Ok(Self { patterns })
    }

    /// A classifier that never matches.
    pub fn empty() -> Self {
        Self {
            patterns: RegexSet::empty(),
        }
    }

    pub fn is_mobile(&self, user_agent: &str) -> bool {
        self.patterns.is_match(user_agent)
    }
}
