use crate::config::types::{Config, CrawlerConfig, OutputConfig, UserAgentConfig};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates crawler configuration
///
/// Delays and the retry budget are unsigned, so `>= 0` holds by construction.
pub fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.fetch_workers < 1 {
        return Err(ConfigError::Validation(format!(
            "fetch_workers must be >= 1, got {}",
            config.fetch_workers
        )));
    }

    if config.parse_workers < 1 {
        return Err(ConfigError::Validation(format!(
            "parse_workers must be >= 1, got {}",
            config.parse_workers
        )));
    }

    if config.fetch_timeout_ms < 1 {
        return Err(ConfigError::Validation(
            "fetch_timeout_ms must be > 0".to_string(),
        ));
    }

    if config.queue_capacity < 1 {
        return Err(ConfigError::Validation(format!(
            "queue_capacity must be >= 1, got {}",
            config.queue_capacity
        )));
    }

    if config.handoff_capacity < 1 {
        return Err(ConfigError::Validation(format!(
            "handoff_capacity must be >= 1, got {}",
            config.handoff_capacity
        )));
    }

    for seed in &config.seeds {
        validate_seed(seed)?;
    }

    Ok(())
}

/// Returns a warning when the pipeline can stall under backpressure
///
/// Parse workers block on a full work queue, and fetch workers block on a
/// full handoff. Once `handoff_capacity + parse_workers <= fetch_workers`,
/// every fetch worker can hold a page nobody is left to receive, and no one
/// takes from the queue again. The configuration stays valid; it is only risky.
pub fn pipeline_sizing_warning(config: &CrawlerConfig) -> Option<String> {
    let slack = config.handoff_capacity + config.parse_workers;
    if slack > config.fetch_workers {
        return None;
    }
    Some(format!(
        "handoff_capacity ({}) + parse_workers ({}) should exceed fetch_workers ({}); \
         the crawl may stall while the work queue is full",
        config.handoff_capacity, config.parse_workers, config.fetch_workers
    ))
}

/// Validates a single seed URL: it must parse and use HTTP(S)
pub fn validate_seed(seed: &str) -> Result<(), ConfigError> {
    let url = Url::parse(seed)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid seed URL '{}': {}", seed, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::Validation(format!(
            "Seed URL '{}' must use HTTP or HTTPS",
            seed
        )));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    // Validate crawler name: non-empty, alphanumeric + hyphens only
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
    if email.is_empty() {
        return Err(ConfigError::Validation(
            "contact_email cannot be empty".to_string(),
        ));
    }

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

    fn crawler_config() -> CrawlerConfig {
        CrawlerConfig {
            seeds: vec!["https://example.com/".to_string()],
            fetch_workers: 4,
            parse_workers: 2,
            crawl_delay_ms: 1000,
            max_fetch_retries: 2,
            fetch_timeout_ms: 5000,
            retry_delay_ms: 100,
            queue_capacity: 100,
            handoff_capacity: 16,
            pre_fetch_delay_ms: 0,
        }
    }

    #[test]
    fn test_valid_crawler_config() {
        assert!(validate_crawler_config(&crawler_config()).is_ok());
    }

    #[test]
    fn test_zero_workers_rejected() {
        let mut config = crawler_config();
        config.fetch_workers = 0;
        assert!(matches!(
            validate_crawler_config(&config),
            Err(ConfigError::Validation(_))
        ));

        let mut config = crawler_config();
        config.parse_workers = 0;
        assert!(validate_crawler_config(&config).is_err());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut config = crawler_config();
        config.fetch_timeout_ms = 0;
        assert!(validate_crawler_config(&config).is_err());
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let mut config = crawler_config();
        config.queue_capacity = 0;
        assert!(validate_crawler_config(&config).is_err());

        let mut config = crawler_config();
        config.handoff_capacity = 0;
        assert!(validate_crawler_config(&config).is_err());
    }

    #[test]
    fn test_zero_delays_allowed() {
        let mut config = crawler_config();
        config.crawl_delay_ms = 0;
        config.retry_delay_ms = 0;
        config.max_fetch_retries = 0;
        assert!(validate_crawler_config(&config).is_ok());
    }

    #[test]
    fn test_validate_seed() {
        assert!(validate_seed("https://example.com/").is_ok());
        assert!(validate_seed("http://a.test/").is_ok());
        assert!(matches!(
            validate_seed("not a url"),
            Err(ConfigError::InvalidUrl(_))
        ));
        assert!(matches!(
            validate_seed("ftp://example.com/"),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_pipeline_sizing_with_slack() {
        assert!(pipeline_sizing_warning(&crawler_config()).is_none());
    }

    #[test]
    fn test_pipeline_sizing_without_slack() {
        let mut config = crawler_config();
        config.fetch_workers = 32;
        config.handoff_capacity = 16;
        config.parse_workers = 2;
        let warning = pipeline_sizing_warning(&config).unwrap();
        assert!(warning.contains("fetch_workers (32)"));

        // Equal is not enough: every handoff slot and parse worker can be occupied.
        config.fetch_workers = 18;
        assert!(pipeline_sizing_warning(&config).is_some());
        config.fetch_workers = 17;
        assert!(pipeline_sizing_warning(&config).is_none());
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
        assert!(validate_email("a@b@example.com").is_err());
    }
}
