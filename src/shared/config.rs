use crate::shared::errors::{AppError, AppResult};
use std::env;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36";

/// Runtime settings, read once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub api_base_url: String,
    pub web_base_url: String,
    pub image_base_url: String,
    pub user_agent: String,
    pub referer: String,
    pub request_timeout: Duration,
    pub requests_per_second: u32,

    pub max_retries: u32,
    pub retry_base_delay: Duration,
    pub retry_multiplier: f64,

    pub success_jitter_min: Duration,
    pub success_jitter_max: Duration,
    pub item_delay_min: Duration,
    pub item_delay_max: Duration,
    pub stage_delay: Duration,
    pub batch_delay: Duration,
    pub day_delay: Duration,
    pub block_delay: Duration,
    pub league_delay: Duration,

    pub page_wait: Duration,

    pub database_url: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.sofascore.com/api/v1".to_string(),
            web_base_url: "https://www.sofascore.com".to_string(),
            image_base_url: "https://api.sofascore.app/api/v1".to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            referer: "https://www.sofascore.com/".to_string(),
            request_timeout: Duration::from_secs(15),
            requests_per_second: 2,
            max_retries: 3,
            retry_base_delay: Duration::from_millis(1000),
            retry_multiplier: 1.5,
            success_jitter_min: Duration::from_millis(1000),
            success_jitter_max: Duration::from_millis(3000),
            item_delay_min: Duration::from_millis(1000),
            item_delay_max: Duration::from_millis(3000),
            stage_delay: Duration::from_millis(4000),
            batch_delay: Duration::from_millis(3000),
            day_delay: Duration::from_millis(2000),
            block_delay: Duration::from_millis(5000),
            league_delay: Duration::from_millis(5000),
            page_wait: Duration::from_secs(30),
            database_url: None,
        }
    }
}

impl AppConfig {
    /// Load `.env` (if any) and overlay environment variables on the defaults.
    pub fn from_env() -> AppResult<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let text = |key: &str, default: String| lookup(key).unwrap_or(default);
        let millis = |key: &str, default: Duration| -> AppResult<Duration> {
            parse_var::<u64>(&lookup, key)
                .map(|value| value.map(Duration::from_millis).unwrap_or(default))
        };
        let secs = |key: &str, default: Duration| -> AppResult<Duration> {
            parse_var::<u64>(&lookup, key)
                .map(|value| value.map(Duration::from_secs).unwrap_or(default))
        };

        let config = Self {
            api_base_url: text("SOFA_API_BASE_URL", defaults.api_base_url),
            web_base_url: text("SOFA_WEB_BASE_URL", defaults.web_base_url),
            image_base_url: text("SOFA_IMAGE_BASE_URL", defaults.image_base_url),
            user_agent: text("SOFA_USER_AGENT", defaults.user_agent),
            referer: text("SOFA_REFERER", defaults.referer),
            request_timeout: secs("SOFA_REQUEST_TIMEOUT_SECS", defaults.request_timeout)?,
            requests_per_second: parse_var(&lookup, "SOFA_REQUESTS_PER_SECOND")?
                .unwrap_or(defaults.requests_per_second),
            max_retries: parse_var(&lookup, "SOFA_MAX_RETRIES")?.unwrap_or(defaults.max_retries),
            retry_base_delay: millis("SOFA_RETRY_BASE_DELAY_MS", defaults.retry_base_delay)?,
            retry_multiplier: parse_var(&lookup, "SOFA_RETRY_MULTIPLIER")?
                .unwrap_or(defaults.retry_multiplier),
            success_jitter_min: millis("SOFA_SUCCESS_JITTER_MIN_MS", defaults.success_jitter_min)?,
            success_jitter_max: millis("SOFA_SUCCESS_JITTER_MAX_MS", defaults.success_jitter_max)?,
            item_delay_min: millis("SOFA_ITEM_DELAY_MIN_MS", defaults.item_delay_min)?,
            item_delay_max: millis("SOFA_ITEM_DELAY_MAX_MS", defaults.item_delay_max)?,
            stage_delay: millis("SOFA_STAGE_DELAY_MS", defaults.stage_delay)?,
            batch_delay: millis("SOFA_BATCH_DELAY_MS", defaults.batch_delay)?,
            day_delay: millis("SOFA_DAY_DELAY_MS", defaults.day_delay)?,
            block_delay: millis("SOFA_BLOCK_DELAY_MS", defaults.block_delay)?,
            league_delay: millis("SOFA_LEAGUE_DELAY_MS", defaults.league_delay)?,
            page_wait: secs("SOFA_PAGE_WAIT_SECS", defaults.page_wait)?,
            database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> AppResult<()> {
        if self.requests_per_second == 0 {
            return Err(AppError::ValidationError(
                "SOFA_REQUESTS_PER_SECOND must be at least 1".to_string(),
            ));
        }
        if self.retry_multiplier < 1.0 {
            return Err(AppError::ValidationError(
                "SOFA_RETRY_MULTIPLIER must be >= 1.0".to_string(),
            ));
        }
        for (key, url) in [
            ("SOFA_API_BASE_URL", &self.api_base_url),
            ("SOFA_WEB_BASE_URL", &self.web_base_url),
            ("SOFA_IMAGE_BASE_URL", &self.image_base_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(AppError::ValidationError(format!(
                    "{} must be an http(s) URL, got '{}'",
                    key, url
                )));
            }
        }
        Ok(())
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> AppResult<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|e| {
            AppError::ValidationError(format!("{} has invalid value '{}': {}", key, raw, e))
        }),
    }
}
