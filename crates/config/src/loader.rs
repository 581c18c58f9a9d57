use std::path::Path;

use anyhow::Context;

use crate::Config;

pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Config> {
    let path = path.as_ref();

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read configuration from {}", path.display()))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse configuration from {}", path.display()))?;

    if !config.server.rate_limits.enabled {
        log::warn!("Rate limiting is disabled - all requests will pass through unthrottled");
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use crate::Config;

    #[test]
    fn full_config_roundtrip() {
        let toml = indoc! {r#"
            [server]
            listen_address = "127.0.0.1:8000"

            [server.health]
            enabled = true
            path = "/health"

            [server.rate_limits]
            enabled = true

            [server.rate_limits.quota]
            max_attempts = 120
            window = "30s"

            [server.rate_limits.storage]
            type = "redis"
            url = "redis://localhost:6379/0"
            key_prefix = "rate_limit:"
        "#};

        let config: Config = toml::from_str(toml).unwrap();

        assert_eq!(config.server.rate_limits.quota.max_attempts, 120);
        assert_eq!(config.server.rate_limits.quota.window.as_secs(), 30);
        assert!(config.server.rate_limits.enabled);
        assert!(config.server.health.enabled);
    }

    #[test]
    fn empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();

        assert!(config.server.listen_address.is_none());
        assert!(config.server.rate_limits.enabled);
        assert_eq!(config.server.rate_limits.quota.max_attempts, 60);
        assert_eq!(config.server.rate_limits.quota.window.as_secs(), 60);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let toml = indoc! {r#"
            [server]
            listen_adress = "127.0.0.1:8000"
        "#};

        let result: Result<Config, _> = toml::from_str(toml);
        assert!(result.is_err());
    }
}
