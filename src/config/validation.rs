use crate::config::types::{AnalysisConfig, Config, CrawlConfig, OutputConfig, UserAgentConfig};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawl_config(&config.crawl)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_analysis_config(&config.analysis)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates crawl configuration
fn validate_crawl_config(config: &CrawlConfig) -> Result<(), ConfigError> {
    validate_http_url("start_url", &config.start_url)?;
    for seed in &config.seeds {
        validate_http_url("seed", seed)?;
    }

    if config.max_pages < 1 {
        return Err(ConfigError::Validation(
            "max_pages must be >= 1".to_string(),
        ));
    }

    if config.batch_size < 1 || config.batch_size > 100 {
        return Err(ConfigError::Validation(format!(
            "batch_size must be between 1 and 100, got {}",
            config.batch_size
        )));
    }

    if config.concurrency < 1 || config.concurrency > 32 {
        return Err(ConfigError::Validation(format!(
            "concurrency must be between 1 and 32, got {}",
            config.concurrency
        )));
    }

    if config.request_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "request_timeout_secs must be >= 1".to_string(),
        ));
    }

    if config.lease_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "lease_timeout_secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates that a URL parses, uses http(s), and has a host
fn validate_http_url(field: &str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", field, value, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "{} '{}' must use http or https",
            field, value
        )));
    }

    if url.host_str().is_none() {
        return Err(ConfigError::InvalidUrl(format!(
            "{} '{}' has no host",
            field, value
        )));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

/// Validates the relevance thresholds
fn validate_analysis_config(config: &AnalysisConfig) -> Result<(), ConfigError> {
    for (name, value) in [
        ("similarity_threshold", config.similarity_threshold),
        ("paragraph_threshold", config.paragraph_threshold),
    ] {
        if !(value > 0.0 && value <= 1.0) {
            return Err(ConfigError::Validation(format!(
                "{} must be in (0, 1], got {}",
                name, value
            )));
        }
    }

    if config.min_paragraph_chars < 1 {
        return Err(ConfigError::Validation(
            "min_paragraph_chars must be >= 1".to_string(),
        ));
    }

    if config.max_opportunities < 1 {
        return Err(ConfigError::Validation(
            "max_opportunities must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    let Some((local, domain)) = email.split_once('@') else {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    };

    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !domain.contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::for_start_url("https://example.com/");
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_start_url_must_be_http() {
        let config = Config::for_start_url("ftp://example.com/");
        assert!(matches!(
            validate(&config).unwrap_err(),
            ConfigError::InvalidUrl(_)
        ));

        let config = Config::for_start_url("not a url");
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_batch_size_bounds() {
        let mut config = Config::for_start_url("https://example.com/");
        config.crawl.batch_size = 0;
        assert!(validate(&config).is_err());

        config.crawl.batch_size = 101;
        assert!(validate(&config).is_err());

        config.crawl.batch_size = 15;
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_thresholds_must_be_unit_interval() {
        let mut config = Config::for_start_url("https://example.com/");
        config.analysis.similarity_threshold = 0.0;
        assert!(validate(&config).is_err());

        config.analysis.similarity_threshold = 1.2;
        assert!(validate(&config).is_err());

        config.analysis.similarity_threshold = 0.25;
        config.analysis.paragraph_threshold = f64::NAN;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_crawler_name_characters() {
        let mut config = Config::for_start_url("https://example.com/");
        config.user_agent.crawler_name = "Bad Name!".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("user@example.com").is_ok());
        assert!(validate_email("admin@sub.example.com").is_ok());

        assert!(validate_email("").is_err());
        assert!(validate_email("invalid").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("user@").is_err());
        assert!(validate_email("user@domain").is_err());
        assert!(validate_email("a@b@c.com").is_err());
    }
}
