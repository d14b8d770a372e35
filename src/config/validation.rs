use super::models::{AppEnv, Config};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("max_file_size must be positive")]
    InvalidMaxFileSize,

    #[error("worker.concurrency must be at least 1")]
    InvalidWorkerConcurrency,

    #[error("rate_limit.max must be at least 1 when rate limiting is enabled")]
    InvalidRateLimitMax,

    #[error("rate_limit.window_secs must be positive")]
    InvalidRateLimitWindow,

    #[error("retention.file_retention_hours must be positive")]
    InvalidFileRetentionHours,

    #[error("MOCK_BUILD is only permitted when APP_ENV is 'dev' or 'test'")]
    MockBuildOutsideTestProfile,

    #[error("failed to resolve storage directory '{path}': {source}")]
    DirectoryResolution {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Validate the entire configuration, then canonicalize the builds/uploads
/// roots to absolute paths (Open Question resolution #3 in DESIGN.md).
pub fn validate(config: &mut Config) -> Result<(), ValidationError> {
    validate_storage(config)?;
    validate_worker(config)?;
    validate_rate_limit(config)?;
    validate_retention(config)?;
    validate_build_profile(config)?;
    resolve_absolute_paths(config)?;
    Ok(())
}

fn validate_storage(config: &Config) -> Result<(), ValidationError> {
    if config.storage.max_file_size.as_u64() == 0 {
        return Err(ValidationError::InvalidMaxFileSize);
    }
    Ok(())
}

fn validate_worker(config: &Config) -> Result<(), ValidationError> {
    if config.worker.concurrency == 0 {
        return Err(ValidationError::InvalidWorkerConcurrency);
    }
    Ok(())
}

fn validate_rate_limit(config: &Config) -> Result<(), ValidationError> {
    if config.rate_limit.enabled && config.rate_limit.max == 0 {
        return Err(ValidationError::InvalidRateLimitMax);
    }
    if config.rate_limit.window_secs == 0 {
        return Err(ValidationError::InvalidRateLimitWindow);
    }
    Ok(())
}

fn validate_retention(config: &Config) -> Result<(), ValidationError> {
    if config.retention.file_retention_hours == 0 {
        return Err(ValidationError::InvalidFileRetentionHours);
    }
    Ok(())
}

fn validate_build_profile(config: &Config) -> Result<(), ValidationError> {
    if config.build.mock_build && config.build.app_env == AppEnv::Prod {
        return Err(ValidationError::MockBuildOutsideTestProfile);
    }
    Ok(())
}

fn resolve_absolute_paths(config: &mut Config) -> Result<(), ValidationError> {
    config.storage.builds_dir = canonicalize_creating(&config.storage.builds_dir)?;
    config.storage.uploads_dir = canonicalize_creating(&config.storage.uploads_dir)?;
    Ok(())
}

fn canonicalize_creating(path: &std::path::Path) -> Result<std::path::PathBuf, ValidationError> {
    std::fs::create_dir_all(path).map_err(|source| ValidationError::DirectoryResolution {
        path: path.display().to_string(),
        source,
    })?;
    std::fs::canonicalize(path).map_err(|source| ValidationError::DirectoryResolution {
        path: path.display().to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_config(temp: &TempDir) -> Config {
        let mut config = Config {
            server: Default::default(),
            storage: Default::default(),
            rate_limit: Default::default(),
            worker: Default::default(),
            retention: Default::default(),
            build: Default::default(),
        };
        config.storage.builds_dir = temp.path().join("builds");
        config.storage.uploads_dir = temp.path().join("uploads");
        config
    }

    #[test]
    fn test_valid_config() {
        let temp = TempDir::new().unwrap();
        let mut config = test_config(&temp);
        assert!(validate(&mut config).is_ok());
        assert!(config.storage.builds_dir.is_absolute());
        assert!(config.storage.uploads_dir.is_absolute());
    }

    #[test]
    fn test_zero_worker_concurrency() {
        let temp = TempDir::new().unwrap();
        let mut config = test_config(&temp);
        config.worker.concurrency = 0;
        assert!(matches!(
            validate(&mut config),
            Err(ValidationError::InvalidWorkerConcurrency)
        ));
    }

    #[test]
    fn test_zero_rate_limit_max_when_enabled() {
        let temp = TempDir::new().unwrap();
        let mut config = test_config(&temp);
        config.rate_limit.enabled = true;
        config.rate_limit.max = 0;
        assert!(matches!(
            validate(&mut config),
            Err(ValidationError::InvalidRateLimitMax)
        ));
    }

    #[test]
    fn test_mock_build_rejected_in_prod() {
        let temp = TempDir::new().unwrap();
        let mut config = test_config(&temp);
        config.build.mock_build = true;
        config.build.app_env = AppEnv::Prod;
        assert!(matches!(
            validate(&mut config),
            Err(ValidationError::MockBuildOutsideTestProfile)
        ));
    }

    #[test]
    fn test_mock_build_allowed_in_test_profile() {
        let temp = TempDir::new().unwrap();
        let mut config = test_config(&temp);
        config.build.mock_build = true;
        config.build.app_env = AppEnv::Test;
        assert!(validate(&mut config).is_ok());
    }

    #[test]
    fn test_zero_file_retention_hours() {
        let temp = TempDir::new().unwrap();
        let mut config = test_config(&temp);
        config.retention.file_retention_hours = 0;
        assert!(matches!(
            validate(&mut config),
            Err(ValidationError::InvalidFileRetentionHours)
        ));
    }
}
