use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::battle::ExhaustionPolicy;

pub const DEFAULT_API_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_QUESTIONS_PATH: &str = "questions.json";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("GROQ_API_URL is not a valid URL: {0}")]
    ApiUrl(#[from] url::ParseError),
    #[error("AI_TIMEOUT_SECS must be a whole number of seconds, got {0:?}")]
    Timeout(String),
    #[error("QUESTION_POOL_POLICY must be `reshuffle` or `fail`, got {0:?}")]
    PoolPolicy(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    /// No key means the remote generator is skipped and every run uses the
    /// static table.
    pub groq_api_key: Option<String>,
    pub groq_api_url: Url,
    pub request_timeout: Duration,
    pub questions_path: PathBuf,
    pub pool_policy: ExhaustionPolicy,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let groq_api_key = lookup("GROQ_API_KEY").filter(|key| !key.trim().is_empty());

        let groq_api_url = Url::parse(
            &lookup("GROQ_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
        )?;

        let request_timeout = match lookup("AI_TIMEOUT_SECS") {
            Some(raw) => Duration::from_secs(
                raw.trim()
                    .parse()
                    .map_err(|_| ConfigError::Timeout(raw.clone()))?,
            ),
            None => Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        };

        let questions_path = lookup("QUESTIONS_PATH")
            .unwrap_or_else(|| DEFAULT_QUESTIONS_PATH.to_string())
            .into();

        let pool_policy = match lookup("QUESTION_POOL_POLICY") {
            None => ExhaustionPolicy::default(),
            Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "reshuffle" => ExhaustionPolicy::Reshuffle,
                "fail" => ExhaustionPolicy::Fail,
                _ => return Err(ConfigError::PoolPolicy(raw)),
            },
        };

        Ok(Self {
            groq_api_key,
            groq_api_url,
            request_timeout,
            questions_path,
            pool_policy,
        })
    }
}
