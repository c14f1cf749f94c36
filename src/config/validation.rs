use crate::config::types::{Config, CrawlConfig, HttpConfig, OutputConfig, PortalConfig};
use crate::terms::parse_term_code;
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_portal_config(&config.portal)?;
    validate_http_config(&config.http)?;
    validate_crawl_config(&config.crawl)?;
    validate_output_config(&config.output)?;

    if config.programs.values().any(|stem| stem.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "program output stems cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_portal_config(config: &PortalConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base-url: {}", e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "base-url must use http or https, got '{}'",
            config.base_url
        )));
    }

    if config.list_marker.is_empty() {
        return Err(ConfigError::Validation(
            "list-marker cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_http_config(config: &HttpConfig) -> Result<(), ConfigError> {
    if config.max_in_flight < 1 {
        return Err(ConfigError::Validation(format!(
            "max-in-flight must be >= 1, got {}",
            config.max_in_flight
        )));
    }

    if !(config.timeout_secs.is_finite() && config.timeout_secs > 0.0) {
        return Err(ConfigError::Validation(format!(
            "timeout-secs must be positive, got {}",
            config.timeout_secs
        )));
    }

    for (name, value) in [
        ("backoff-secs", config.backoff_secs),
        ("sleep-secs", config.sleep_secs),
    ] {
        if !(value.is_finite() && value >= 0.0) {
            return Err(ConfigError::Validation(format!(
                "{} must be >= 0, got {}",
                name, value
            )));
        }
    }

    Ok(())
}

fn validate_crawl_config(config: &CrawlConfig) -> Result<(), ConfigError> {
    if config.workers < 1 {
        return Err(ConfigError::Validation(format!(
            "workers must be >= 1, got {}",
            config.workers
        )));
    }

    for term in config.terms.iter().chain(config.through_term.iter()) {
        if parse_term_code(term).is_none() {
            return Err(ConfigError::Validation(format!(
                "invalid term code '{}' (expected YYYY01, YYYY02 or YYYY03)",
                term
            )));
        }
    }

    if config.forward_scan_steps == 0 || config.minor_forward_scan_steps == 0 {
        return Err(ConfigError::Validation(
            "forward scan steps must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.courses_dir.is_empty() {
        return Err(ConfigError::Validation(
            "courses-dir cannot be empty".to_string(),
        ));
    }

    Ok(())
}
