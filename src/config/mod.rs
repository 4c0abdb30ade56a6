use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use thiserror::Error;

/// Secret used when running locally without JWT_SECRET. Rejected outside development.
const DEVELOPMENT_JWT_SECRET: &str = "datashare-development-secret";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub database: DatabaseConfig,
    pub api: ApiConfig,
    pub security: SecurityConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub connection_timeout: u64,
    pub run_migrations: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub port: u16,
    pub max_upload_bytes: usize,
    pub recent_files_limit: i64,
    pub max_feed_limit: i64,
    pub enable_request_logging: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    #[serde(skip_serializing)]
    pub jwt_secret: String,
    pub session_ttl_minutes: i64,
    pub reset_ttl_minutes: i64,
    pub enable_cors: bool,
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub dataset_dir: PathBuf,
    pub picture_dir: PathBuf,
    pub max_picture_bytes: usize,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("JWT_SECRET must be set outside development")]
    MissingSecret,

    #[error("DATABASE_URL must be set")]
    MissingDatabaseUrl,

    #[error("{0} must be greater than zero")]
    NonPositive(&'static str),
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Database overrides
        if let Ok(v) = env::var("DATABASE_URL") {
            self.database.url = v;
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }
        if let Ok(v) = env::var("DATABASE_RUN_MIGRATIONS") {
            self.database.run_migrations = v.parse().unwrap_or(self.database.run_migrations);
        }

        // API overrides
        if let Some(port) = env::var("DATASHARE_API_PORT")
            .ok()
            .or_else(|| env::var("PORT").ok())
            .and_then(|s| s.parse::<u16>().ok())
        {
            self.api.port = port;
        }
        if let Ok(v) = env::var("API_MAX_UPLOAD_BYTES") {
            self.api.max_upload_bytes = v.parse().unwrap_or(self.api.max_upload_bytes);
        }
        if let Ok(v) = env::var("API_RECENT_FILES_LIMIT") {
            self.api.recent_files_limit = v.parse().unwrap_or(self.api.recent_files_limit);
        }
        if let Ok(v) = env::var("API_MAX_FEED_LIMIT") {
            self.api.max_feed_limit = v.parse().unwrap_or(self.api.max_feed_limit);
        }
        if let Ok(v) = env::var("API_ENABLE_REQUEST_LOGGING") {
            self.api.enable_request_logging = v.parse().unwrap_or(self.api.enable_request_logging);
        }

        // Security overrides
        if let Ok(v) = env::var("JWT_SECRET") {
            self.security.jwt_secret = v;
        }
        if let Ok(v) = env::var("SECURITY_SESSION_TTL_MINUTES") {
            self.security.session_ttl_minutes = v.parse().unwrap_or(self.security.session_ttl_minutes);
        }
        if let Ok(v) = env::var("SECURITY_RESET_TTL_MINUTES") {
            self.security.reset_ttl_minutes = v.parse().unwrap_or(self.security.reset_ttl_minutes);
        }
        if let Ok(v) = env::var("SECURITY_ENABLE_CORS") {
            self.security.enable_cors = v.parse().unwrap_or(self.security.enable_cors);
        }
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v.split(',').map(|s| s.trim().to_string()).collect();
        }

        // Storage overrides
        if let Ok(v) = env::var("STORAGE_DATASET_DIR") {
            self.storage.dataset_dir = PathBuf::from(v);
        }
        if let Ok(v) = env::var("STORAGE_PICTURE_DIR") {
            self.storage.picture_dir = PathBuf::from(v);
        }
        if let Ok(v) = env::var("STORAGE_MAX_PICTURE_BYTES") {
            self.storage.max_picture_bytes = v.parse().unwrap_or(self.storage.max_picture_bytes);
        }

        self
    }

    /// Checks settings that have no safe default for the selected environment
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.url.trim().is_empty() {
            return Err(ConfigError::MissingDatabaseUrl);
        }
        if self.environment != Environment::Development
            && (self.security.jwt_secret.is_empty() || self.security.jwt_secret == DEVELOPMENT_JWT_SECRET)
        {
            return Err(ConfigError::MissingSecret);
        }
        if self.security.session_ttl_minutes <= 0 {
            return Err(ConfigError::NonPositive("SECURITY_SESSION_TTL_MINUTES"));
        }
        if self.security.reset_ttl_minutes <= 0 {
            return Err(ConfigError::NonPositive("SECURITY_RESET_TTL_MINUTES"));
        }
        if self.api.recent_files_limit <= 0 {
            return Err(ConfigError::NonPositive("API_RECENT_FILES_LIMIT"));
        }
        if self.api.max_feed_limit <= 0 {
            return Err(ConfigError::NonPositive("API_MAX_FEED_LIMIT"));
        }
        Ok(())
    }

    pub fn uses_development_secret(&self) -> bool {
        self.security.jwt_secret == DEVELOPMENT_JWT_SECRET
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            database: DatabaseConfig {
                url: String::new(),
                max_connections: 10,
                connection_timeout: 30,
                run_migrations: true,
            },
            api: ApiConfig {
                port: 5000,
                max_upload_bytes: 100 * 1024 * 1024, // 100MB
                recent_files_limit: 5,
                max_feed_limit: 200,
                enable_request_logging: true,
            },
            security: SecurityConfig {
                jwt_secret: DEVELOPMENT_JWT_SECRET.to_string(),
                session_ttl_minutes: 60,
                reset_ttl_minutes: 15,
                enable_cors: true,
                cors_origins: vec!["http://localhost:3000".to_string(), "http://localhost:5173".to_string()],
            },
            storage: StorageConfig {
                dataset_dir: PathBuf::from("uploads"),
                picture_dir: PathBuf::from("profile_pictures"),
                max_picture_bytes: 5 * 1024 * 1024, // 5MB
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            database: DatabaseConfig {
                url: String::new(),
                max_connections: 20,
                connection_timeout: 10,
                run_migrations: true,
            },
            api: ApiConfig {
                port: 5000,
                max_upload_bytes: 100 * 1024 * 1024,
                recent_files_limit: 5,
                max_feed_limit: 100,
                enable_request_logging: true,
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                session_ttl_minutes: 60,
                reset_ttl_minutes: 15,
                enable_cors: true,
                cors_origins: vec!["https://staging.example.com".to_string()],
            },
            storage: StorageConfig {
                dataset_dir: PathBuf::from("uploads"),
                picture_dir: PathBuf::from("profile_pictures"),
                max_picture_bytes: 5 * 1024 * 1024,
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            database: DatabaseConfig {
                url: String::new(),
                max_connections: 50,
                connection_timeout: 5,
                run_migrations: false,
            },
            api: ApiConfig {
                port: 5000,
                max_upload_bytes: 500 * 1024 * 1024,
                recent_files_limit: 5,
                max_feed_limit: 100,
                enable_request_logging: false,
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                session_ttl_minutes: 60,
                reset_ttl_minutes: 15,
                enable_cors: true,
                cors_origins: vec!["https://app.example.com".to_string()],
            },
            storage: StorageConfig {
                dataset_dir: PathBuf::from("uploads"),
                picture_dir: PathBuf::from("profile_pictures"),
                max_picture_bytes: 5 * 1024 * 1024,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_database(mut config: AppConfig) -> AppConfig {
        config.database.url = "postgres://localhost/datashare".to_string();
        config
    }

    #[test]
    fn test_default_development_config() {
        let config = with_database(AppConfig::development());
        assert_eq!(config.security.session_ttl_minutes, 60);
        assert_eq!(config.security.reset_ttl_minutes, 15);
        assert_eq!(config.api.recent_files_limit, 5);
        assert_eq!(config.storage.max_picture_bytes, 5 * 1024 * 1024);
        assert!(config.uses_development_secret());
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn test_production_requires_secret() {
        let mut config = with_database(AppConfig::production());
        assert_eq!(config.validate(), Err(ConfigError::MissingSecret));

        config.security.jwt_secret = DEVELOPMENT_JWT_SECRET.to_string();
        assert_eq!(config.validate(), Err(ConfigError::MissingSecret));

        config.security.jwt_secret = "a-real-secret".to_string();
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn test_rejects_missing_database_and_zero_ttl() {
        let config = AppConfig::development();
        assert_eq!(config.validate(), Err(ConfigError::MissingDatabaseUrl));

        let mut config = with_database(AppConfig::development());
        config.security.reset_ttl_minutes = 0;
        assert_eq!(
            config.validate(),
            Err(ConfigError::NonPositive("SECURITY_RESET_TTL_MINUTES"))
        );
    }
}
