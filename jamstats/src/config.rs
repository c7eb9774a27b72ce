use serde::Deserialize;
use std::env;
use std::time::Duration;

fn parse_env_or<T: std::str::FromStr>(var: &str, default: T) -> T
where
    T::Err: std::fmt::Display,
{
    match env::var(var) {
        Ok(val) => match val.parse() {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!("Invalid value '{}' for {}: {}. Using default.", val, var, e);
                default
            }
        },
        Err(_) => default,
    }
}

fn parse_env_opt<T: std::str::FromStr>(var: &str) -> Option<T>
where
    T::Err: std::fmt::Display,
{
    match env::var(var) {
        Ok(val) => match val.parse() {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                tracing::warn!("Invalid value '{}' for {}: {}. Ignoring.", val, var, e);
                None
            }
        },
        Err(_) => None,
    }
}

/// First retry waits this long; each further retry doubles it.
pub const RETRY_BASE_DELAY_MS: u64 = 100;
/// Floor for a derived per-attempt timeout.
pub const MIN_ATTEMPT_TIMEOUT_MS: u64 = 500;

/// Pause before retry number `attempt` (1-based).
pub fn retry_delay(attempt: u32) -> Duration {
    Duration::from_millis(RETRY_BASE_DELAY_MS << attempt.saturating_sub(1).min(10))
}

/// Split a per-call budget across the first attempt and every retry, after
/// setting aside the backoff sleeps, so a timed-out attempt still leaves
/// room to retry inside the budget.
pub fn attempt_timeout_ms(call_budget_secs: u64, max_retries: u32) -> u64 {
    let backoff: u64 = (1..=max_retries)
        .map(|n| retry_delay(n).as_millis() as u64)
        .sum();
    let available = call_budget_secs.saturating_mul(1000).saturating_sub(backoff);
    (available / (u64::from(max_retries) + 1)).max(MIN_ATTEMPT_TIMEOUT_MS)
}

/// Log line encoding, from `LOG_FORMAT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "text" | "pretty" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown log format: {s}")),
        }
    }
}

impl LogFormat {
    pub fn from_env() -> Self {
        parse_env_or("LOG_FORMAT", Self::Text)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub llm: Option<LlmConfig>,
    pub sources: SourcesConfig,
    pub pipeline: PipelineConfig,
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Bearer keys for the admin routes. Empty locks them.
    pub api_keys: Vec<String>,
}

/// Query-understanding service (OpenAI-compatible chat model)
#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    pub model: String,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourcesConfig {
    pub phishnet: SourceApiConfig,
    pub phishin: SourceApiConfig,
    /// Per-call budget applied by the aggregator, retries included.
    pub call_timeout_secs: u64,
    /// Refresh the catalog's song and venue lists from the setlist source at startup.
    pub refresh_catalog: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceApiConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    /// HTTP timeout for a single attempt.
    pub attempt_timeout_ms: u64,
    pub max_retries: u32,
}

impl SourceApiConfig {
    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.attempt_timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    pub resolver_timeout_secs: u64,
    pub confidence_threshold: f32,
    pub similarity_floor: f64,
    /// Turns summarized for the resolver.
    pub context_turns: usize,
    /// Turns retained per session.
    pub context_window: usize,
    /// Sessions retained before the least recently used is forgotten.
    pub max_sessions: usize,
    /// Dropped-row fraction above which a join is flagged `low_confidence_join`.
    pub join_drop_threshold: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    pub static_capacity: usize,
    pub historical_capacity: usize,
    pub recency_capacity: usize,
    pub static_ttl_secs: u64,
    pub historical_ttl_secs: u64,
    pub recency_ttl_secs: u64,
}

impl CacheConfig {
    pub fn static_ttl(&self) -> Duration {
        Duration::from_secs(self.static_ttl_secs)
    }

    pub fn historical_ttl(&self) -> Duration {
        Duration::from_secs(self.historical_ttl_secs)
    }

    pub fn recency_ttl(&self) -> Duration {
        Duration::from_secs(self.recency_ttl_secs)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            resolver_timeout_secs: 20,
            confidence_threshold: 0.6,
            similarity_floor: 0.82,
            context_turns: 3,
            context_window: 10,
            max_sessions: 1000,
            join_drop_threshold: 0.5,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            static_capacity: 512,
            historical_capacity: 2048,
            recency_capacity: 256,
            static_ttl_secs: 7 * 24 * 3600,
            historical_ttl_secs: 24 * 3600,
            recency_ttl_secs: 300,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let source_timeout = parse_env_or("SOURCE_TIMEOUT_SECS", 15);
        let source_retries = parse_env_or("SOURCE_MAX_RETRIES", 1);
        let attempt_timeout = parse_env_opt("SOURCE_ATTEMPT_TIMEOUT_MS")
            .unwrap_or_else(|| attempt_timeout_ms(source_timeout, source_retries));
        let pipeline_defaults = PipelineConfig::default();
        let cache_defaults = CacheConfig::default();

        Self {
            server: ServerConfig {
                host: env::var("JAMSTATS_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: parse_env_or("JAMSTATS_PORT", 3100),
                api_keys: env::var("JAMSTATS_API_KEYS")
                    .map(|keys| {
                        keys.split(',')
                            .map(|s| s.trim().to_string())
                            .filter(|s| !s.is_empty())
                            .collect()
                    })
                    .unwrap_or_default(),
            },
            llm: env::var("LLM_MODEL").ok().map(|model| LlmConfig {
                model,
                api_key: env::var("LLM_API_KEY").ok(),
                base_url: env::var("LLM_BASE_URL").ok(),
                timeout_secs: parse_env_or("LLM_TIMEOUT", 30),
                max_retries: parse_env_or("LLM_MAX_RETRIES", 1),
            }),
            sources: SourcesConfig {
                phishnet: SourceApiConfig {
                    base_url: env::var("PHISHNET_BASE_URL")
                        .unwrap_or_else(|_| "https://api.phish.net/v5".to_string()),
                    api_key: env::var("PHISHNET_API_KEY").ok(),
                    attempt_timeout_ms: attempt_timeout,
                    max_retries: source_retries,
                },
                phishin: SourceApiConfig {
                    base_url: env::var("PHISHIN_BASE_URL")
                        .unwrap_or_else(|_| "https://phish.in/api/v2".to_string()),
                    api_key: None,
                    attempt_timeout_ms: attempt_timeout,
                    max_retries: source_retries,
                },
                call_timeout_secs: source_timeout,
                refresh_catalog: parse_env_or("REFRESH_CATALOG", true),
            },
            pipeline: PipelineConfig {
                resolver_timeout_secs: parse_env_or(
                    "RESOLVER_TIMEOUT_SECS",
                    pipeline_defaults.resolver_timeout_secs,
                ),
                confidence_threshold: parse_env_or(
                    "RESOLVER_CONFIDENCE_THRESHOLD",
                    pipeline_defaults.confidence_threshold,
                ),
                similarity_floor: parse_env_or(
                    "RESOLVER_SIMILARITY_FLOOR",
                    pipeline_defaults.similarity_floor,
                ),
                context_turns: parse_env_or(
                    "RESOLVER_CONTEXT_TURNS",
                    pipeline_defaults.context_turns,
                ),
                context_window: parse_env_or("CONTEXT_WINDOW", pipeline_defaults.context_window),
                max_sessions: parse_env_or(
                    "CONTEXT_MAX_SESSIONS",
                    pipeline_defaults.max_sessions,
                ),
                join_drop_threshold: parse_env_or(
                    "JOIN_DROP_THRESHOLD",
                    pipeline_defaults.join_drop_threshold,
                ),
            },
            cache: CacheConfig {
                static_capacity: parse_env_or(
                    "CACHE_CAPACITY_STATIC",
                    cache_defaults.static_capacity,
                ),
                historical_capacity: parse_env_or(
                    "CACHE_CAPACITY_HISTORICAL",
                    cache_defaults.historical_capacity,
                ),
                recency_capacity: parse_env_or(
                    "CACHE_CAPACITY_RECENCY",
                    cache_defaults.recency_capacity,
                ),
                static_ttl_secs: parse_env_or(
                    "CACHE_TTL_STATIC_SECS",
                    cache_defaults.static_ttl_secs,
                ),
                historical_ttl_secs: parse_env_or(
                    "CACHE_TTL_HISTORICAL_SECS",
                    cache_defaults.historical_ttl_secs,
                ),
                recency_ttl_secs: parse_env_or(
                    "CACHE_TTL_RECENCY_SECS",
                    cache_defaults.recency_ttl_secs,
                ),
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let mut config = Self::default();
        // CACHE_TTL_SECS overrides every TTL class at once.
        if let Some(ttl) = parse_env_opt::<u64>("CACHE_TTL_SECS") {
            config.cache.static_ttl_secs = ttl;
            config.cache.historical_ttl_secs = ttl;
            config.cache.recency_ttl_secs = ttl;
        }
        config
    }
}

/// Known LLM providers that use OpenAI-compatible APIs
pub const KNOWN_LLM_PROVIDERS: &[&str] = &["openai", "openrouter", "ollama", "lmstudio"];

/// Parse an LLM model name into (provider, model) tuple.
pub fn parse_llm_provider_model(model: &str) -> (&str, &str) {
    if let Some((prefix, rest)) = model.split_once('/') {
        let prefix_lower = prefix.to_lowercase();
        if KNOWN_LLM_PROVIDERS.contains(&prefix_lower.as_str()) {
            return (prefix, rest);
        }
    }
    // Default to treating the whole string as a local model
    ("local", model)
}
