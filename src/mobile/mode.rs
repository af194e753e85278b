//! The two-valued view mode.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Whether a request is served the mobile rendering path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Mobile,
    #[default]
    Desktop,
}

impl Mode {
    pub fn is_mobile(self) -> bool {
        self == Mode::Mobile
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Mobile => "mobile",
            Mode::Desktop => "desktop",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
