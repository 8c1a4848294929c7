use crate::config::types::CrawlConfig;
use crate::ConfigError;

/// Validates the assembled configuration
pub fn validate(config: &CrawlConfig) -> Result<(), ConfigError> {
    validate_email(&config.email)?;

    if config.max_workers < 1 || config.max_workers > 10_000 {
        return Err(ConfigError::Validation(format!(
            "max_workers must be between 1 and 10000, got {}",
            config.max_workers
        )));
    }

    if config.min_crawl_delay.is_zero() {
        return Err(ConfigError::Validation(
            "min_crawl_delay_seconds must be at least 1".to_string(),
        ));
    }

    if config.tuning.seen_capacity == 0 {
        return Err(ConfigError::Validation(
            "seen-capacity must be positive".to_string(),
        ));
    }

    if !(config.tuning.seen_fpr > 0.0 && config.tuning.seen_fpr < 1.0) {
        return Err(ConfigError::Validation(format!(
            "seen-fpr must be in (0, 1), got {}",
            config.tuning.seen_fpr
        )));
    }

    Ok(())
}

/// Basic email sanity check: one @, non-empty local part and domain
fn validate_email(email: &str) -> Result<(), ConfigError> {
    let parts: Vec<&str> = email.split('@').collect();

    if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() || !parts[1].contains('.') {
        return Err(ConfigError::Validation(format!(
            "'{}' does not look like an email address",
            email
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::Tuning;
    use std::path::PathBuf;
    use std::time::Duration;

    fn valid_config() -> CrawlConfig {
        CrawlConfig {
            seed_file: PathBuf::from("seeds.txt"),
            email: "ops@example.com".to_string(),
            exclude_file: None,
            data_dir: PathBuf::from("./data"),
            max_workers: 128,
            min_crawl_delay: Duration::from_secs(70),
            resume: false,
            seeded_urls_only: false,
            max_pages: None,
            max_duration: None,
            tuning: Tuning::default(),
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(validate(&valid_config()).is_ok());
    }

    #[test]
    fn test_bad_email_rejected() {
        for email in ["", "no-at-sign", "@example.com", "x@", "x@nodot"] {
            let mut config = valid_config();
            config.email = email.to_string();
            assert!(validate(&config).is_err(), "accepted '{}'", email);
        }
    }

    #[test]
    fn test_zero_workers_rejected() {
        let mut config = valid_config();
        config.max_workers = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_zero_delay_rejected() {
        let mut config = valid_config();
        config.min_crawl_delay = Duration::ZERO;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_bad_fpr_rejected() {
        let mut config = valid_config();
        config.tuning.seen_fpr = 1.5;
        assert!(validate(&config).is_err());

        config.tuning.seen_fpr = 0.0;
        assert!(validate(&config).is_err());
    }
}
