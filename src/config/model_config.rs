use std::env;
use std::str::FromStr;

/// Decision-model provider settings.
#[derive(Debug, Clone)]
pub struct ModelEnvConfig {
    /// "deepseek" or "qwen"; both speak the same chat-completions shape.
    pub provider: String,
    pub model_name: String,
    pub api_key: String,
    pub base_url: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
    /// conservative | balanced | aggressive system-prompt variant.
    pub prompt_style: String,
    /// When true, news headlines are digested by a small model call.
    pub news_digest_enabled: bool,
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl ModelEnvConfig {
    pub fn from_env() -> Self {
        Self {
            provider: env_or("MODEL_PROVIDER", "deepseek"),
            model_name: env_or("MODEL_NAME", "deepseek-chat"),
            api_key: env_or("MODEL_API_KEY", ""),
            base_url: env::var("MODEL_BASE_URL").ok(),
            temperature: env_parse("MODEL_TEMPERATURE", 0.3),
            max_tokens: env_parse("MODEL_MAX_TOKENS", 4096),
            timeout_secs: env_parse("MODEL_TIMEOUT_SECS", 90),
            prompt_style: env_or("PROMPT_STYLE", "balanced"),
            news_digest_enabled: env_parse("NEWS_DIGEST_ENABLED", false),
        }
    }
}
