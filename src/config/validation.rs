//! Configuration validation.
//!
//! Serde handles syntax; this module checks value ranges and formats.
//! Every problem is reported, not just the first one.

use std::net::SocketAddr;

use crate::config::schema::ApiConfig;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("limiter.rps must be a positive finite number, got {0}")]
    InvalidRate(f64),

    #[error("limiter.burst must be at least 1")]
    ZeroBurst,

    #[error("invalid trusted origin {origin:?}: {reason}")]
    InvalidOrigin { origin: String, reason: &'static str },

    #[error("invalid {field} {value:?}: not a socket address")]
    InvalidAddress { field: &'static str, value: String },
}

/// Validate a parsed configuration.
pub fn validate_config(config: &ApiConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.limiter.enabled {
        let rps = config.limiter.rps;
        if !rps.is_finite() || rps <= 0.0 {
            errors.push(ValidationError::InvalidRate(rps));
        }
        if config.limiter.burst == 0 {
            errors.push(ValidationError::ZeroBurst);
        }
    }

    for origin in &config.cors.trusted_origins {
        if let Some(reason) = origin_problem(origin) {
            errors.push(ValidationError::InvalidOrigin {
                origin: origin.clone(),
                reason,
            });
        }
    }

    check_address(&mut errors, "listener.bind_address", &config.listener.bind_address);
    if config.observability.metrics_enabled {
        check_address(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

// Browsers send the Origin header as scheme://host[:port] with no path, so
// anything else can never match.
fn origin_problem(origin: &str) -> Option<&'static str> {
    let rest = match origin
        .strip_prefix("https://")
        .or_else(|| origin.strip_prefix("http://"))
    {
        Some(rest) => rest,
        None => return Some("missing http:// or https:// scheme"),
    };

    if rest.is_empty() {
        Some("missing host")
    } else if rest.ends_with('/') {
        Some("trailing slash")
    } else if rest.contains('/') {
        Some("contains a path")
    } else {
        None
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&ApiConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = ApiConfig::default();
        config.limiter.rps = 0.0;
        config.limiter.burst = 0;
        config.cors.trusted_origins.insert("example.com".into());
        config.cors.trusted_origins.insert("https://example.com/".into());
        config.listener.bind_address = "not-an-address".into();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 5);
        assert!(errors.contains(&ValidationError::InvalidRate(0.0)));
        assert!(errors.contains(&ValidationError::ZeroBurst));
    }

    #[test]
    fn test_disabled_limiter_skips_rate_checks() {
        let mut config = ApiConfig::default();
        config.limiter.enabled = false;
        config.limiter.rps = f64::NAN;
        config.limiter.burst = 0;

        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_origin_shapes() {
        assert_eq!(origin_problem("https://example.com"), None);
        assert_eq!(origin_problem("http://localhost:9000"), None);
        assert_eq!(origin_problem("https://"), Some("missing host"));
        assert_eq!(origin_problem("https://a.com/x"), Some("contains a path"));
    }
}
