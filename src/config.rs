use std::path::PathBuf;
use std::time::Duration;

/// Application-level constants
pub const APP_NAME: &str = "CBI";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_MODEL: &str = "qwen2.5:7b";

/// Default tracing filter when RUST_LOG is unset.
pub fn default_log_filter() -> &'static str {
    "info,cbi_lib=debug,reqwest=warn,hyper=warn"
}

/// Application data directory: the platform data dir, or the working
/// directory when none can be determined.
pub fn app_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("cbi")
}

pub fn default_database_path() -> PathBuf {
    app_data_dir().join("cbi.db")
}

/// Process settings read from the environment.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub database_path: PathBuf,
    pub ollama_url: String,
    pub dialogue_model: String,
    pub classification_model: String,
    /// Salt mixed into reporter identifier hashes.
    pub reporter_salt: String,
    /// Optional JSON file with surveillance overrides.
    pub surveillance_config: Option<PathBuf>,
    /// Upper bound on processing one inbound message end to end.
    pub worker_ceiling: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            ollama_url: DEFAULT_OLLAMA_URL.to_string(),
            dialogue_model: DEFAULT_MODEL.to_string(),
            classification_model: DEFAULT_MODEL.to_string(),
            reporter_salt: String::new(),
            surveillance_config: None,
            worker_ceiling: Duration::from_secs(180),
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from any key lookup; unset or blank keys keep defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Settings::default();

        let dialogue_model = get("CBI_DIALOGUE_MODEL").unwrap_or(defaults.dialogue_model);
        Self {
            database_path: get("CBI_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.database_path),
            ollama_url: get("CBI_OLLAMA_URL").unwrap_or(defaults.ollama_url),
            classification_model: get("CBI_CLASSIFICATION_MODEL")
                .unwrap_or_else(|| dialogue_model.clone()),
            dialogue_model,
            reporter_salt: get("CBI_REPORTER_SALT").unwrap_or(defaults.reporter_salt),
            surveillance_config: get("CBI_CONFIG").map(PathBuf::from),
            worker_ceiling: get("CBI_WORKER_CEILING_SECS")
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.worker_ceiling),
        }
    }
}
