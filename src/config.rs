//! Process configuration read from the environment.
//!
//! | Variable | Default |
//! |---|---|
//! | `FUNDWISE_HOST` | `0.0.0.0` |
//! | `PORT` | `3001` |
//! | `FUNDWISE_DB_PATH` | `fundwise.sqlite` |
//! | `FUNDWISE_CORS` | `true` |
//! | `FUNDWISE_DEFAULT_ADMIN_USER` | `admin` |
//! | `FUNDWISE_DEFAULT_ADMIN_PASSWORD` | `admin123` |
//! | `FUNDWISE_DEFAULT_COLLECTION_KEY` | `collect123` |
//! | `FUNDWISE_MAX_RECEIPT_BYTES` | 5 MiB |
//! | `OPENAI_API_KEY` | unset, analysis disabled |
//! | `FUNDWISE_AI_MODEL` | `gpt-4o-mini` |
//! | `FUNDWISE_AI_BASE_URL` | `https://api.openai.com/v1` |

use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub enable_cors: bool,
    pub bootstrap: BootstrapCredentials,
    pub max_receipt_bytes: usize,
    pub analysis: AnalysisConfig,
}

/// Seeded on first run only. Real deployments rotate both.
#[derive(Debug, Clone)]
pub struct BootstrapCredentials {
    pub admin_username: String,
    pub admin_password: String,
    pub collection_key: String,
}

#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
}

impl Default for BootstrapCredentials {
    fn default() -> Self {
        Self {
            admin_username: "admin".to_string(),
            admin_password: "admin123".to_string(),
            collection_key: "collect123".to_string(),
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            db_path: PathBuf::from("fundwise.sqlite"),
            enable_cors: true,
            bootstrap: BootstrapCredentials::default(),
            max_receipt_bytes: 5 * 1024 * 1024,
            analysis: AnalysisConfig::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let bootstrap = BootstrapCredentials {
            admin_username: env_string("FUNDWISE_DEFAULT_ADMIN_USER")
                .unwrap_or(defaults.bootstrap.admin_username),
            admin_password: env_string("FUNDWISE_DEFAULT_ADMIN_PASSWORD")
                .unwrap_or(defaults.bootstrap.admin_password),
            collection_key: env_string("FUNDWISE_DEFAULT_COLLECTION_KEY")
                .unwrap_or(defaults.bootstrap.collection_key),
        };

        let analysis = AnalysisConfig {
            api_key: env_string("OPENAI_API_KEY"),
            model: env_string("FUNDWISE_AI_MODEL").unwrap_or(defaults.analysis.model),
            base_url: env_string("FUNDWISE_AI_BASE_URL").unwrap_or(defaults.analysis.base_url),
        };

        Self {
            host: env_string("FUNDWISE_HOST").unwrap_or(defaults.host),
            port: env_string("PORT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.port),
            db_path: env_string("FUNDWISE_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.db_path),
            enable_cors: env_string("FUNDWISE_CORS")
                .map(|v| parse_flag(&v))
                .unwrap_or(defaults.enable_cors),
            bootstrap,
            max_receipt_bytes: env_string("FUNDWISE_MAX_RECEIPT_BYTES")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_receipt_bytes),
            analysis,
        }
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_flag(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.port, 3001);
        assert_eq!(config.bootstrap.admin_username, "admin");
        assert!(config.analysis.api_key.is_none());
    }

    #[test]
    fn flag_parsing() {
        assert!(parse_flag("TRUE"));
        assert!(parse_flag("1"));
        assert!(!parse_flag("off"));
        assert!(!parse_flag("nope"));
    }
}
