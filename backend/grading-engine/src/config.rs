use serde::Deserialize;
use std::env;
use std::time::Duration;

const DEFAULT_PROVIDER_ENDPOINT: &str =
    "https://llm.api.cloud.yandex.net/foundationModels/v1/completion";

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderSettings {
    pub enabled: bool,
    pub endpoint: String,
    pub api_key: String,
    pub folder_id: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    pub timeout_ms: u64,
    pub retry_attempts: u32,
}

impl ProviderSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// A provider is only usable with credentials.
    pub fn is_usable(&self) -> bool {
        self.enabled && !self.api_key.trim().is_empty() && !self.folder_id.trim().is_empty()
    }
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: DEFAULT_PROVIDER_ENDPOINT.to_string(),
            api_key: String::new(),
            folder_id: String::new(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_ms: 8_000,
            retry_attempts: 1,
        }
    }
}

fn default_model() -> String {
    "yandexgpt".to_string()
}

fn default_temperature() -> f32 {
    0.3
}

fn default_max_tokens() -> u32 {
    500
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheSettings {
    /// Redis backend when set, in-process cache otherwise.
    pub redis_uri: Option<String>,
    pub ttl_seconds: u64,
    pub capacity: u64,
}

impl CacheSettings {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            redis_uri: None,
            ttl_seconds: 3_600,
            capacity: 10_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub provider: ProviderSettings,
    pub cache: CacheSettings,
    /// Optional JSON file overriding the built-in rule tables.
    pub rules_path: Option<String>,
    /// Provider text shorter than this is treated as a failed call.
    pub feedback_min_chars: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider: ProviderSettings::default(),
            cache: CacheSettings::default(),
            rules_path: None,
            feedback_min_chars: 10,
        }
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        // Local .env is optional; real deployments set the environment directly
        dotenvy::dotenv().ok();

        // Determine environment (defaults to dev)
        let env = env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string());

        // Build configuration from config/*.toml + ENV overrides
        let settings = config::Config::builder()
            .add_source(config::File::with_name(&format!("config/{}", env)).required(false))
            // Override with environment variables (prefix: APP_)
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        let defaults = Config::default();

        let provider = ProviderSettings {
            enabled: settings
                .get_bool("provider.enabled")
                .ok()
                .or_else(|| env::var("LLM_ENABLED").ok().map(|v| parse_bool(&v)))
                .unwrap_or(defaults.provider.enabled),
            endpoint: settings
                .get_string("provider.endpoint")
                .or_else(|_| env::var("LLM_ENDPOINT"))
                .unwrap_or(defaults.provider.endpoint),
            api_key: settings
                .get_string("provider.api_key")
                .or_else(|_| env::var("YANDEXGPT_API_KEY"))
                .unwrap_or_default(),
            folder_id: settings
                .get_string("provider.folder_id")
                .or_else(|_| env::var("YANDEXGPT_FOLDER_ID"))
                .unwrap_or_default(),
            model: settings
                .get_string("provider.model")
                .unwrap_or(defaults.provider.model),
            temperature: settings
                .get_float("provider.temperature")
                .map(|t| t as f32)
                .unwrap_or(defaults.provider.temperature),
            max_tokens: settings
                .get_int("provider.max_tokens")
                .ok()
                .and_then(|v| u32::try_from(v).ok())
                .unwrap_or(defaults.provider.max_tokens),
            timeout_ms: settings
                .get_int("provider.timeout_ms")
                .ok()
                .and_then(|v| u64::try_from(v).ok())
                .unwrap_or(defaults.provider.timeout_ms),
            retry_attempts: settings
                .get_int("provider.retry_attempts")
                .ok()
                .and_then(|v| u32::try_from(v).ok())
                .unwrap_or(defaults.provider.retry_attempts),
        };

        if provider.enabled && !provider.is_usable() {
            tracing::warn!(
                "Text-generation provider enabled without api_key/folder_id; template feedback only"
            );
        }

        let cache = CacheSettings {
            redis_uri: settings
                .get_string("cache.redis_uri")
                .or_else(|_| env::var("REDIS_URI"))
                .ok()
                .filter(|uri| !uri.trim().is_empty()),
            ttl_seconds: settings
                .get_int("cache.ttl_seconds")
                .ok()
                .and_then(|v| u64::try_from(v).ok())
                .unwrap_or(defaults.cache.ttl_seconds),
            capacity: settings
                .get_int("cache.capacity")
                .ok()
                .and_then(|v| u64::try_from(v).ok())
                .unwrap_or(defaults.cache.capacity),
        };

        let rules_path = settings
            .get_string("grading.rules_path")
            .or_else(|_| env::var("GRADING_RULES_PATH"))
            .ok()
            .filter(|path| !path.trim().is_empty());

        let feedback_min_chars = settings
            .get_int("feedback.min_chars")
            .ok()
            .and_then(|v| usize::try_from(v).ok())
            .unwrap_or(defaults.feedback_min_chars);

        Ok(Config {
            provider,
            cache,
            rules_path,
            feedback_min_chars,
        })
    }
}
