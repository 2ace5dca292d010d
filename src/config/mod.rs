// src/config/mod.rs
// All tunables come from the environment; .env is loaded first if present.

use once_cell::sync::Lazy;
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct LeyiaConfig {
    // ── OpenAI Assistant Configuration
    pub assistant_id: String,
    pub openai_api_key: String,
    pub openai_base_url: String,

    // ── Search Tool Configuration
    pub tavily_api_key: String,
    pub search_timeout: u64,

    // ── Database Configuration
    pub database_url: String,

    // ── OCR Configuration
    pub ocr_dpi: u32,
    pub ocr_languages: String,

    // ── Timeouts (in seconds)
    pub run_timeout: u64,
    pub tool_timeout: u64,
    pub thinking_timeout: u64,

    // ── Janitor Configuration
    pub liveness_interval: u64,
    pub age_sweep_interval: u64,
    pub max_file_age: u64,

    // ── Logging Configuration
    pub log_level: String,
}

fn env_var_or<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    match std::env::var(key) {
        Ok(val) => {
            let clean_val = val.split('#').next().unwrap_or("").trim();
            match clean_val.parse::<T>() {
                Ok(parsed) => parsed,
                Err(_) => {
                    eprintln!("Config: {} = '{}' (parse failed, using default)", key, val);
                    default
                }
            }
        }
        Err(_) => default,
    }
}

impl LeyiaConfig {
    pub fn from_env() -> Self {
        if dotenvy::dotenv().is_err() {
            eprintln!("Warning: .env file not found. Using environment variables and defaults.");
        }

        Self {
            assistant_id: env_var_or("ASSISTANT_ID_CONSTITUCIONAL", String::new()),
            openai_api_key: env_var_or("OPENAI_API_KEY", String::new()),
            openai_base_url: env_var_or(
                "OPENAI_BASE_URL",
                "https://api.openai.com/v1".to_string(),
            ),
            tavily_api_key: env_var_or("TAVILY_API_KEY", String::new()),
            search_timeout: env_var_or("LEYIA_SEARCH_TIMEOUT", 30),
            database_url: env_var_or("DATABASE_URL", "sqlite:./leyia.db".to_string()),
            ocr_dpi: env_var_or("LEYIA_OCR_DPI", 200),
            ocr_languages: env_var_or("LEYIA_OCR_LANGUAGES", "spa+eng".to_string()),
            run_timeout: env_var_or("LEYIA_RUN_TIMEOUT", 300),
            tool_timeout: env_var_or("LEYIA_TOOL_TIMEOUT", 120),
            thinking_timeout: env_var_or("LEYIA_THINKING_TIMEOUT", 600),
            liveness_interval: env_var_or("LEYIA_LIVENESS_INTERVAL", 300),
            age_sweep_interval: env_var_or("LEYIA_AGE_SWEEP_INTERVAL", 3600),
            max_file_age: env_var_or("LEYIA_MAX_FILE_AGE", 7200),
            log_level: env_var_or("LEYIA_LOG_LEVEL", "info".to_string()),
        }
    }

    /// Both credentials are required for any remote-dependent operation.
    pub fn has_credentials(&self) -> bool {
        !self.assistant_id.is_empty() && !self.openai_api_key.is_empty()
    }
}

// Global config instance - loaded once at startup
pub static CONFIG: Lazy<LeyiaConfig> = Lazy::new(LeyiaConfig::from_env);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = LeyiaConfig::from_env();

        assert!(config.openai_base_url.contains("api.openai.com"));
        assert_eq!(config.ocr_languages, "spa+eng");
        assert_eq!(config.run_timeout, 300);
        assert_eq!(config.tool_timeout, 120);
        assert_eq!(config.max_file_age, 7200);
    }

    #[test]
    fn test_credentials_gate() {
        let mut config = LeyiaConfig::from_env();
        config.assistant_id = String::new();
        config.openai_api_key = "sk-test".to_string();
        assert!(!config.has_credentials());

        config.assistant_id = "asst_123".to_string();
        assert!(config.has_credentials());
    }
}
