mod instances;
mod schema;

pub use instances::*;
pub use schema::*;

use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    Ok(config)
}

/// Read and parse the instance list file
pub fn load_instances<P: AsRef<Path>>(path: P) -> Result<Vec<Instance>, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    Ok(parse_instances(&content))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_config_matches_defaults() {
        let config: Config = toml::from_str(include_str!("../../config/athena-monitor.toml")).unwrap();
        let defaults = Config::default();

        assert_eq!(config.monitor.title, defaults.monitor.title);
        assert_eq!(config.monitor.concurrency, defaults.monitor.concurrency);
        assert_eq!(config.process.signature, defaults.process.signature);
        assert_eq!(config.admin.query, defaults.admin.query);
        assert_eq!(config.resources.max_vsz_kib, defaults.resources.max_vsz_kib);
        assert_eq!(config.resources.max_rss_kib, defaults.resources.max_rss_kib);
        assert_eq!(config.error_log.path, defaults.error_log.path);
    }

    #[test]
    fn test_partial_config() {
        let config: Config = toml::from_str("[monitor]\nconcurrency = 8\n").unwrap();
        assert_eq!(config.monitor.concurrency, 8);
        assert_eq!(config.monitor.probe_timeout_ms, 3000);
        assert_eq!(config.admin.user, "admin");
    }

    #[test]
    fn test_load_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("instances");
        std::fs::write(&path, "sql_s3=4040,4041\n# comment\nbroken\n").unwrap();

        let instances = load_instances(&path).unwrap();
        assert_eq!(instances, vec![Instance::new("sql_s3", 4040, 4041)]);

        assert!(matches!(
            load_instances(dir.path().join("missing")),
            Err(ConfigError::IoError(_))
        ));
    }
}
