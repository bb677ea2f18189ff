use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Test,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub jwt_secret: String,
    pub bcrypt_cost: u32,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("test") => Environment::Test,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Test => Self::test(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        if let Ok(v) = env::var("PORT") {
            self.server.port = v.parse().unwrap_or(self.server.port);
        }
        if let Ok(v) = env::var("DATABASE_URL") {
            self.database.url = v;
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("SECRET_KEY") {
            self.security.jwt_secret = v;
        }
        if let Ok(v) = env::var("BCRYPT_COST") {
            self.security.bcrypt_cost = v.parse().unwrap_or(self.security.bcrypt_cost);
        }
        self
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig { port: 3001 },
            database: DatabaseConfig {
                url: "postgres://localhost/jobly".to_string(),
                max_connections: 10,
            },
            security: SecurityConfig {
                jwt_secret: "secret-dev".to_string(),
                bcrypt_cost: 12,
            },
        }
    }

    fn test() -> Self {
        Self {
            environment: Environment::Test,
            server: ServerConfig { port: 3001 },
            database: DatabaseConfig {
                url: "postgres://localhost/jobly_test".to_string(),
                max_connections: 2,
            },
            security: SecurityConfig {
                jwt_secret: "secret-test".to_string(),
                // Hashing strength isn't under test; keep the factor low so
                // test suites stay fast.
                bcrypt_cost: 4,
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            server: ServerConfig { port: 3001 },
            database: DatabaseConfig {
                url: "postgres://localhost/jobly".to_string(),
                max_connections: 20,
            },
            security: SecurityConfig {
                // Must be overridden via SECRET_KEY in production
                jwt_secret: String::new(),
                bcrypt_cost: 12,
            },
        }
    }
}

pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

/// Process-wide configuration. The JWT secret is read here once at startup
/// and injected into `TokenService`; request handling never consults this
/// singleton for identity decisions.
pub fn config() -> &'static AppConfig {
    &CONFIG
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn development_defaults() {
        let config = AppConfig::development();
        assert_eq!(config.server.port, 3001);
        assert_eq!(config.security.jwt_secret, "secret-dev");
        assert_eq!(config.security.bcrypt_cost, 12);
    }

    #[test]
    fn test_profile_uses_cheap_hashing() {
        let config = AppConfig::test();
        assert!(config.security.bcrypt_cost < AppConfig::development().security.bcrypt_cost);
        assert!(config.database.url.ends_with("jobly_test"));
    }
}
