use crate::config::types::Config;
use crate::ConfigError;
use scraper::Selector;

/// Validates a parsed configuration
///
/// Checks that limits are non-zero where zero would deadlock the engine,
/// that percentages are in range, and that configured wait-profile selectors
/// actually parse.
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.crawler.max_depth == 0 {
        return Err(ConfigError::Validation(
            "crawler.max-depth must be at least 1".to_string(),
        ));
    }

    if config.crawler.max_urls_per_level == 0 {
        return Err(ConfigError::Validation(
            "crawler.max-urls-per-level must be at least 1".to_string(),
        ));
    }

    if config.crawler.batch_size == 0 {
        return Err(ConfigError::Validation(
            "crawler.batch-size must be at least 1".to_string(),
        ));
    }

    if config.crawler.max_attempts == 0 {
        return Err(ConfigError::Validation(
            "crawler.max-attempts must be at least 1".to_string(),
        ));
    }

    if config.budget.max_operations == 0 {
        return Err(ConfigError::Validation(
            "budget.max-operations must be at least 1".to_string(),
        ));
    }

    if config.budget.max_pages_per_operation == 0 {
        return Err(ConfigError::Validation(
            "budget.max-pages-per-operation must be at least 1".to_string(),
        ));
    }

    if config.budget.memory_threshold_percent == 0 || config.budget.memory_threshold_percent > 100 {
        return Err(ConfigError::Validation(format!(
            "budget.memory-threshold-percent must be in 1..=100, got {}",
            config.budget.memory_threshold_percent
        )));
    }

    if config.budget.cpu_threshold_percent == 0 || config.budget.cpu_threshold_percent > 100 {
        return Err(ConfigError::Validation(format!(
            "budget.cpu-threshold-percent must be in 1..=100, got {}",
            config.budget.cpu_threshold_percent
        )));
    }

    if config.budget.sample_interval_ms == 0 {
        return Err(ConfigError::Validation(
            "budget.sample-interval-ms must be at least 1".to_string(),
        ));
    }

    for profile in &config.wait_profiles {
        if profile.pattern.is_empty() {
            return Err(ConfigError::Validation(
                "wait-profile.pattern must not be empty".to_string(),
            ));
        }
        if Selector::parse(&profile.selector).is_err() {
            return Err(ConfigError::Validation(format!(
                "wait-profile selector does not parse: {}",
                profile.selector
            )));
        }
        if profile.timeout_ms == 0 {
            return Err(ConfigError::Validation(format!(
                "wait-profile timeout-ms must be at least 1 for pattern {}",
                profile.pattern
            )));
        }
    }

    Ok(())
}
