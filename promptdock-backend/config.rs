use std::path::PathBuf;

pub const DEFAULT_ACTIVATION_URL: &str = "https://activecode.vercel.app/api/codes/validate";

/// Application configuration loaded from environment variables.
pub struct Config {
    pub port: u16,
    pub sentry_dsn: Option<String>,
    pub environment: String,
    /// Directory holding the key-value documents (`prompts-storage.json`, `activation.json`).
    pub data_dir: PathBuf,
    /// Overrides the seed compiled into the binary.
    pub seed_path: Option<PathBuf>,
    /// Category that receives prompts orphaned by a category deletion.
    pub fallback_category: Option<String>,
    pub activation_url: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_raw_values(RawValues {
            port: std::env::var("PORT").ok().as_deref(),
            sentry_dsn: std::env::var("SENTRY_DSN").ok().as_deref(),
            environment: std::env::var("ENVIRONMENT").ok().as_deref(),
            data_dir: std::env::var("PROMPTDOCK_DATA_DIR").ok().as_deref(),
            seed_path: std::env::var("PROMPTDOCK_SEED_PATH").ok().as_deref(),
            fallback_category: std::env::var("PROMPTDOCK_FALLBACK_CATEGORY").ok().as_deref(),
            activation_url: std::env::var("PROMPTDOCK_ACTIVATION_URL").ok().as_deref(),
        })
    }

    /// Build a Config from raw string values (as they would come from env vars).
    /// Used directly in tests to avoid mutating process-global environment.
    pub fn from_raw_values(raw: RawValues<'_>) -> Self {
        let port = raw.port.and_then(|v| v.parse().ok()).unwrap_or(8082);

        let sentry_dsn = non_empty(raw.sentry_dsn);

        let environment = non_empty(raw.environment).unwrap_or_else(|| "local".to_string());

        let data_dir = non_empty(raw.data_dir)
            .map(PathBuf::from)
            .unwrap_or_else(default_data_dir);

        let activation_url = non_empty(raw.activation_url)
            .unwrap_or_else(|| DEFAULT_ACTIVATION_URL.to_string());

        Config {
            port,
            sentry_dsn,
            environment,
            data_dir,
            seed_path: non_empty(raw.seed_path).map(PathBuf::from),
            fallback_category: non_empty(raw.fallback_category),
            activation_url,
        }
    }
}

/// Unparsed environment values, one per `Config` field.
#[derive(Default)]
pub struct RawValues<'a> {
    pub port: Option<&'a str>,
    pub sentry_dsn: Option<&'a str>,
    pub environment: Option<&'a str>,
    pub data_dir: Option<&'a str>,
    pub seed_path: Option<&'a str>,
    pub fallback_category: Option<&'a str>,
    pub activation_url: Option<&'a str>,
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".promptdock")
}
