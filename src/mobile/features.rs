//! Feature flags and the page configuration blob.
//!
//! Mobile pages receive a `window.MF_CONFIG` object describing the mode
//! (`stable` or `beta`) and which configured features are available to the
//! current user.

use serde_json::{Map, Value};

use crate::config::FeatureConfig;

/// Global the injected script assigns.
pub const CONFIG_GLOBAL: &str = "window.MF_CONFIG";

/// Looks up feature availability per mode.
#[derive(Debug, Clone, Default)]
pub struct FeaturesManager {
    features: Vec<FeatureConfig>,
}

impl FeaturesManager {
    pub fn new(features: Vec<FeatureConfig>) -> Self {
        Self { features }
    }

    /// Configuration variables for a mobile page.
    pub fn config_vars(&self, beta: bool) -> Map<String, Value> {
        let mut vars = Map::new();
        vars.insert(
            "wgMFMode".to_string(),
            Value::from(if beta { "beta" } else { "stable" }),
        );
        for feature in &self.features {
            vars.insert(
                feature.name.clone(),
                Value::Bool(if beta { feature.beta } else { feature.stable }),
            );
        }
        vars
    }
}

/// Render the inline script. `</` is escaped so the JSON cannot close the tag.
pub fn config_script(vars: &Map<String, Value>) -> String {
    let json = Value::Object(vars.clone()).to_string().replace("</", "<\\/");
    format!("<script>{CONFIG_GLOBAL} = {json};</script>")
}

/// Insert the script before `</head>`, or prepend it when the page has no head.
pub fn inject_config(html: &str, vars: &Map<String, Value>) -> String {
    let script = config_script(vars);
    match find_ascii_case_insensitive(html, "</head>") {
        Some(at) => format!("{}{}{}", &html[..at], script, &html[at..]),
        None => format!("{script}{html}"),
    }
}

fn find_ascii_case_insensitive(haystack: &str, needle: &str) -> Option<usize> {
    let needle = needle.as_bytes();
    haystack
        .as_bytes()
        .windows(needle.len())
        .position(|window| window.eq_ignore_ascii_case(needle))
}
