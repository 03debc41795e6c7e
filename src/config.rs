use anyhow::Result;
use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub llm: LlmConfig,
    pub analysis: AnalysisConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
}

/// Limits shared by every analysis flavor. The original flows had drifted
/// apart (10K/12K/15K/20K truncation, 30s/35s/45s/60s timeouts); one set
/// is used everywhere now.
#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisConfig {
    /// Hard cap on inline text/code payloads, in characters.
    pub text_limit: usize,
    /// Wall-clock bound on the remote AI call. Single attempt, no retry.
    pub remote_timeout_secs: u64,
    /// Job store size that triggers a reap.
    pub high_water_mark: usize,
    /// Job store size a reap trims down to.
    pub low_water_mark: usize,
    /// Monthly credits granted to new / free accounts.
    pub free_monthly_credits: i64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            server: ServerConfig {
                port: env::var("PORT")
                    .unwrap_or_else(|_| "3000".to_string())
                    .parse()?,
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "sqlite:docudecipher.db".to_string()),
                max_connections: env::var("DB_MAX_CONNECTIONS")
                    .unwrap_or_else(|_| "5".to_string())
                    .parse()?,
            },
            llm: LlmConfig {
                api_key: env::var("DEEPSEEK_API_KEY").unwrap_or_default(),
                base_url: env::var("DEEPSEEK_BASE_URL")
                    .unwrap_or_else(|_| "https://api.deepseek.com".to_string()),
                model: env::var("DEEPSEEK_MODEL").unwrap_or_else(|_| "deepseek-chat".to_string()),
            },
            analysis: AnalysisConfig {
                text_limit: env::var("ANALYSIS_TEXT_LIMIT")
                    .unwrap_or_else(|_| "12000".to_string())
                    .parse()?,
                remote_timeout_secs: env::var("ANALYSIS_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "45".to_string())
                    .parse()?,
                high_water_mark: env::var("JOB_HIGH_WATER_MARK")
                    .unwrap_or_else(|_| "100".to_string())
                    .parse()?,
                low_water_mark: env::var("JOB_LOW_WATER_MARK")
                    .unwrap_or_else(|_| "50".to_string())
                    .parse()?,
                free_monthly_credits: env::var("FREE_MONTHLY_CREDITS")
                    .unwrap_or_else(|_| "5".to_string())
                    .parse()?,
            },
        })
    }

    /// True when a real API key is configured. A missing key or the
    /// placeholder left in a template .env selects the mock analyzer.
    pub fn has_live_api_key(&self) -> bool {
        !self.llm.api_key.is_empty() && !self.llm.api_key.starts_with("your-")
    }
}

#[cfg(test)]
impl Config {
    /// Defaults for unit tests across the crate. No env access.
    pub fn test_defaults() -> Self {
        Config {
            server: ServerConfig {
                port: 3000,
                host: "127.0.0.1".to_string(),
            },
            database: DatabaseConfig {
                url: "sqlite::memory:".to_string(),
                max_connections: 1,
            },
            llm: LlmConfig {
                api_key: String::new(),
                base_url: "https://api.deepseek.com".to_string(),
                model: "deepseek-chat".to_string(),
            },
            analysis: AnalysisConfig {
                text_limit: 12000,
                remote_timeout_secs: 45,
                high_water_mark: 100,
                low_water_mark: 50,
                free_monthly_credits: 5,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_live_api_key_detection() {
        let mut config = Config::test_defaults();
        assert!(!config.has_live_api_key());

        config.llm.api_key = "your-api-key-here".to_string();
        assert!(!config.has_live_api_key());

        config.llm.api_key = "sk-abc123".to_string();
        assert!(config.has_live_api_key());
    }
}
