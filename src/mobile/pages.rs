//! Path matching for page lists (blacklisted pages, forced mobile paths).
//!
//! # Design Decisions
//! - Path matching is case-sensitive
//! - Empty list = never matches
//! - No regex to guarantee O(n) matching

/// A list of path prefixes.
#[derive(Debug, Clone, Default)]
pub struct PathPrefixSet {
    prefixes: Vec<String>,
}

impl PathPrefixSet {
    pub fn new(prefixes: &[String]) -> Self {
        Self {
            prefixes: prefixes
                .iter()
                .filter(|p| !p.is_empty())
                .cloned()
                .collect(),
        }
    }

    /// Returns true if `path` starts with any prefix.
    pub fn matches(&self, path: &str) -> bool {
        self.prefixes.iter().any(|p| path.starts_with(p.as_str()))
    }
}
