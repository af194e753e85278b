//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses, header names and cookie names
//! - Check that user-agent patterns and the URL template compile
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use regex::RegexBuilder;
use thiserror::Error;

use crate::config::schema::ProxyConfig;
use crate::mobile::url_template::UrlTemplate;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid socket address for {field}: {value}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{0} must not be empty")]
    Empty(&'static str),

    #[error("user agent pattern {pattern:?} does not compile: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("url template {template:?} is malformed: {reason}")]
    InvalidTemplate { template: String, reason: String },

    #[error("{field} is not a valid cookie name: {value:?}")]
    InvalidCookieName { field: &'static str, value: String },

    #[error("timeouts.request_secs must be greater than zero")]
    ZeroTimeout,
}

/// Validate a configuration, collecting every error found.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_address(&mut errors, "listener.bind_address", &config.listener.bind_address);
    check_address(&mut errors, "upstream.address", &config.upstream.address);
    if config.observability.metrics_enabled {
        check_address(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroTimeout);
    }

    let mobile = &config.mobile;
    if mobile.mobile_header.trim().is_empty() {
        errors.push(ValidationError::Empty("mobile.mobile_header"));
    }
    check_cookie_name(&mut errors, "mobile.format_cookie", &mobile.format_cookie);
    check_cookie_name(&mut errors, "mobile.stop_redirect_cookie", &mobile.stop_redirect_cookie);
    check_cookie_name(&mut errors, "mobile.optin_cookie", &mobile.optin_cookie);
    if mobile.default_skin.trim().is_empty() {
        errors.push(ValidationError::Empty("mobile.default_skin"));
    }

    for pattern in &mobile.user_agent_patterns {
        if let Err(e) = RegexBuilder::new(pattern).case_insensitive(true).build() {
            errors.push(ValidationError::InvalidPattern {
                pattern: pattern.clone(),
                reason: e.to_string(),
            });
        }
    }

    if let Some(template) = &mobile.url_template {
        if let Err(e) = UrlTemplate::parse(template) {
            errors.push(ValidationError::InvalidTemplate {
                template: template.clone(),
                reason: e.to_string(),
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_address(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
}

/// Cookie names are RFC 7230 tokens: no separators, whitespace or controls.
fn check_cookie_name(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    const SEPARATORS: &[u8] = b"()<>@,;:\\\"/[]?={} \t";
    let is_token = !value.is_empty()
        && value
            .bytes()
            .all(|b| b.is_ascii_graphic() && !SEPARATORS.contains(&b));
    if !is_token {
        errors.push(ValidationError::InvalidCookieName {
            field,
            value: value.to_string(),
        });
    }
}
