//! Environment-driven configuration structures shared by all binaries.

use std::{env, fs, time::Duration};

use thiserror::Error;

use crate::model::ClientConfig;

pub const DEFAULT_API_BASE_URL: &str = "https://api.monobank.ua/";
pub const DEFAULT_BALANCE_REFRESH_MINUTES: u64 = 60;
pub const MIN_BALANCE_REFRESH_MINUTES: u64 = 2;
pub const DEFAULT_CURRENCY_REFRESH_MINUTES: u64 = 10;
pub const MIN_CURRENCY_REFRESH_MINUTES: u64 = 10;
/// Upper bound for both refresh intervals (one year).
pub const MAX_REFRESH_MINUTES: u64 = 525_600;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Gauge names, each overridable through `METRICS_*_NAME`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricNames {
    pub balance: String,
    pub credit_limit: String,
    pub jar_balance: String,
    pub currencies_buy: String,
    pub currencies_sell: String,
    pub currencies_cross: String,
}

impl Default for MetricNames {
    fn default() -> Self {
        Self {
            balance: "monobank_balance".to_string(),
            credit_limit: "monobank_credit_limit".to_string(),
            jar_balance: "monobank_jar_balance".to_string(),
            currencies_buy: "monobank_currencies_buy".to_string(),
            currencies_sell: "monobank_currencies_sell".to_string(),
            currencies_cross: "monobank_currencies_cross".to_string(),
        }
    }
}

impl MetricNames {
    fn load_from_env() -> Self {
        let defaults = Self::default();
        Self {
            balance: get_optional_var("METRICS_BALANCE_NAME").unwrap_or(defaults.balance),
            credit_limit: get_optional_var("METRICS_CREDIT_LIMIT_NAME")
                .unwrap_or(defaults.credit_limit),
            jar_balance: get_optional_var("METRICS_JAR_BALANCE_NAME")
                .unwrap_or(defaults.jar_balance),
            currencies_buy: get_optional_var("METRICS_CURRENCIES_BUY_NAME")
                .unwrap_or(defaults.currencies_buy),
            currencies_sell: get_optional_var("METRICS_CURRENCIES_SELL_NAME")
                .unwrap_or(defaults.currencies_sell),
            currencies_cross: get_optional_var("METRICS_CURRENCIES_CROSS_NAME")
                .unwrap_or(defaults.currencies_cross),
        }
    }
}

/// Polling/exporting configuration shared by the API and monitor binaries.
#[derive(Debug, Clone, PartialEq)]
pub struct ExporterConfig {
    api_base_url: String,
    webhook_url: Option<String>,
    clients: Vec<ClientConfig>,
    balance_refresh_minutes: u64,
    currency_refresh_minutes: u64,
    request_timeout: Duration,
    metric_names: MetricNames,
}

impl ExporterConfig {
    /// Loads configuration by hydrating `.env` (if present) and reading the
    /// process variables. Malformed entries surface as `ConfigError`.
    pub fn load_from_env() -> Result<Self, ConfigError> {
        hydrate_env_file()?;

        let balance_refresh_minutes = get_refresh_minutes_var("MONOBANK_BALANCE_REFRESH_MINUTES")?
            .unwrap_or(DEFAULT_BALANCE_REFRESH_MINUTES);
        let currency_refresh_minutes =
            get_refresh_minutes_var("MONOBANK_CURRENCY_REFRESH_MINUTES")?
                .unwrap_or(DEFAULT_CURRENCY_REFRESH_MINUTES);
        let request_timeout_secs = get_number_var("MONOBANK_REQUEST_TIMEOUT_SECS")?
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);

        Ok(Self {
            api_base_url: get_optional_var("MONOBANK_API_BASE_URL")
                .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
            webhook_url: get_optional_var("MONOBANK_WEBHOOK_URL"),
            clients: load_clients()?,
            balance_refresh_minutes: balance_refresh_minutes.max(MIN_BALANCE_REFRESH_MINUTES),
            currency_refresh_minutes: currency_refresh_minutes.max(MIN_CURRENCY_REFRESH_MINUTES),
            request_timeout: Duration::from_secs(request_timeout_secs.max(1)),
            metric_names: MetricNames::load_from_env(),
        })
    }

    pub fn new(api_base_url: impl Into<String>, clients: Vec<ClientConfig>) -> Self {
        Self {
            api_base_url: api_base_url.into(),
            webhook_url: None,
            clients,
            balance_refresh_minutes: DEFAULT_BALANCE_REFRESH_MINUTES,
            currency_refresh_minutes: DEFAULT_CURRENCY_REFRESH_MINUTES,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            metric_names: MetricNames::default(),
        }
    }

    pub fn with_webhook_url(mut self, url: impl Into<String>) -> Self {
        self.webhook_url = Some(url.into());
        self
    }

    /// Intervals are floor-clamped the same way as when loaded from the
    /// environment.
    /// Values are clamped to the supported floor and `MAX_REFRESH_MINUTES`.
    pub fn with_refresh_minutes(mut self, balance: u64, currency: u64) -> Self {
        self.balance_refresh_minutes =
            balance.clamp(MIN_BALANCE_REFRESH_MINUTES, MAX_REFRESH_MINUTES);
        self.currency_refresh_minutes =
            currency.clamp(MIN_CURRENCY_REFRESH_MINUTES, MAX_REFRESH_MINUTES);
        self
    }

    pub fn api_base_url(&self) -> &str {
        &self.api_base_url
    }

    pub fn webhook_url(&self) -> Option<&str> {
        self.webhook_url.as_deref()
    }

    pub fn clients(&self) -> &[ClientConfig] {
        &self.clients
    }

    pub fn balance_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.balance_refresh_minutes * 60)
    }

    pub fn currency_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.currency_refresh_minutes * 60)
    }

    /// Cached snapshots outlive one balance tick by a minute.
    pub fn snapshot_ttl(&self) -> Duration {
        Duration::from_secs((self.balance_refresh_minutes + 1) * 60)
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    pub fn metric_names(&self) -> &MetricNames {
        &self.metric_names
    }
}

/// Credentials guarding `/metrics`. Auth is enabled only when both halves
/// are configured.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct BasicAuthCredentials {
    username: Option<String>,
    password: Option<String>,
}

impl BasicAuthCredentials {
    pub fn new(username: Option<String>, password: Option<String>) -> Self {
        let keep = |value: Option<String>| value.filter(|v| !v.trim().is_empty());
        Self {
            username: keep(username),
            password: keep(password),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.username.is_some() && self.password.is_some()
    }

    pub fn matches(&self, username: &str, password: &str) -> bool {
        match (&self.username, &self.password) {
            (Some(expected_user), Some(expected_password)) => {
                expected_user == username && expected_password == password
            }
            _ => false,
        }
    }
}

impl std::fmt::Debug for BasicAuthCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicAuthCredentials")
            .field("username", &self.username)
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

/// HTTP surface configuration for the API binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    api_bind_address: String,
    basic_auth: BasicAuthCredentials,
}

impl ApiConfig {
    /// Loads only the environment variables required by the API binary.
    pub fn load_from_env() -> Result<Self, ConfigError> {
        hydrate_env_file()?;

        Ok(Self {
            api_bind_address: get_required_var("API_BIND_ADDRESS")?,
            basic_auth: BasicAuthCredentials::new(
                get_optional_var("BASIC_AUTH_USERNAME"),
                get_optional_var("BASIC_AUTH_PASSWORD"),
            ),
        })
    }

    pub fn api_bind_address(&self) -> &str {
        &self.api_bind_address
    }

    pub fn basic_auth(&self) -> &BasicAuthCredentials {
        &self.basic_auth
    }
}

fn load_clients() -> Result<Vec<ClientConfig>, ConfigError> {
    if let Some(path) = get_optional_var("MONOBANK_CLIENTS_FILE") {
        let raw = fs::read_to_string(&path)
            .map_err(|source| ConfigError::ClientsFile { path, source })?;
        return parse_clients(&raw);
    }

    match get_optional_var("MONOBANK_CLIENTS") {
        Some(raw) => parse_clients(&raw),
        None => Ok(Vec::new()),
    }
}

fn parse_clients(raw: &str) -> Result<Vec<ClientConfig>, ConfigError> {
    serde_json::from_str(raw).map_err(|source| ConfigError::InvalidClients { source })
}

fn get_required_var(key: &'static str) -> Result<String, ConfigError> {
    match env::var(key) {
        Ok(value) => {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                Err(ConfigError::MissingVar { key })
            } else {
                Ok(trimmed.to_string())
            }
        }
        Err(_) => Err(ConfigError::MissingVar { key }),
    }
}

fn get_optional_var(key: &'static str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn get_number_var(key: &'static str) -> Result<Option<u64>, ConfigError> {
    get_optional_var(key)
        .map(|value| {
            value
                .parse()
                .map_err(|source| ConfigError::InvalidNumber { key, source })
        })
        .transpose()
}

fn get_refresh_minutes_var(key: &'static str) -> Result<Option<u64>, ConfigError> {
    match get_number_var(key)? {
        Some(value) if value > MAX_REFRESH_MINUTES => Err(ConfigError::OutOfRange {
            key,
            value,
            max: MAX_REFRESH_MINUTES,
        }),
        other => Ok(other),
    }
}

pub fn hydrate_env_file() -> Result<(), ConfigError> {
    if env::var_os("MONOBANK_EXPORTER_SKIP_DOTENV").is_some() {
        return Ok(());
    }
    match dotenvy::dotenv() {
        Ok(_) => {}
        Err(dotenvy::Error::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => return Err(ConfigError::Dotenv { source: err }),
    }

    Ok(())
}

/// Errors emitted when `.env` hydration or environment parsing fails.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable `{key}`")]
    MissingVar { key: &'static str },
    #[error("invalid integer in `{key}`: {source}")]
    InvalidNumber {
        key: &'static str,
        #[source]
        source: std::num::ParseIntError,
    },
    #[error("`{key}` is {value}, above the maximum of {max}")]
    OutOfRange {
        key: &'static str,
        value: u64,
        max: u64,
    },
    #[error("invalid client list: {source}")]
    InvalidClients {
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to read client list from `{path}`: {source}")]
    ClientsFile {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to load .env file: {source}")]
    Dotenv {
        #[from]
        source: dotenvy::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_GUARD: Mutex<()> = Mutex::new(());

    const VARS: &[&str] = &[
        "API_BIND_ADDRESS",
        "BASIC_AUTH_USERNAME",
        "BASIC_AUTH_PASSWORD",
        "MONOBANK_API_BASE_URL",
        "MONOBANK_WEBHOOK_URL",
        "MONOBANK_CLIENTS",
        "MONOBANK_CLIENTS_FILE",
        "MONOBANK_BALANCE_REFRESH_MINUTES",
        "MONOBANK_CURRENCY_REFRESH_MINUTES",
        "MONOBANK_REQUEST_TIMEOUT_SECS",
        "METRICS_BALANCE_NAME",
        "METRICS_CURRENCIES_CROSS_NAME",
    ];

    fn reset_env() {
        env::set_var("MONOBANK_EXPORTER_SKIP_DOTENV", "1");
        for key in VARS {
            env::remove_var(key);
        }
    }

    #[test]
    fn exporter_config_uses_defaults() {
        let _guard = ENV_GUARD.lock().unwrap();
        reset_env();

        let config = ExporterConfig::load_from_env().expect("config loads");
        assert_eq!(config.api_base_url(), DEFAULT_API_BASE_URL);
        assert_eq!(config.webhook_url(), None);
        assert!(config.clients().is_empty());
        assert_eq!(config.balance_refresh_interval(), Duration::from_secs(3600));
        assert_eq!(config.currency_refresh_interval(), Duration::from_secs(600));
        assert_eq!(config.snapshot_ttl(), Duration::from_secs(61 * 60));
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.metric_names(), &MetricNames::default());
    }

    #[test]
    fn refresh_intervals_are_floor_clamped() {
        let _guard = ENV_GUARD.lock().unwrap();
        reset_env();
        env::set_var("MONOBANK_BALANCE_REFRESH_MINUTES", "1");
        env::set_var("MONOBANK_CURRENCY_REFRESH_MINUTES", "3");

        let config = ExporterConfig::load_from_env().expect("config loads");
        assert_eq!(config.balance_refresh_interval(), Duration::from_secs(120));
        assert_eq!(config.currency_refresh_interval(), Duration::from_secs(600));
        assert_eq!(config.snapshot_ttl(), Duration::from_secs(180));

        reset_env();
    }

    #[test]
    fn invalid_interval_is_reported() {
        let _guard = ENV_GUARD.lock().unwrap();
        reset_env();
        env::set_var("MONOBANK_BALANCE_REFRESH_MINUTES", "soon");

        let err = ExporterConfig::load_from_env().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidNumber {
                key: "MONOBANK_BALANCE_REFRESH_MINUTES",
                ..
            }
        ));

        reset_env();
    }

    #[test]
    fn oversized_interval_is_rejected() {
        let _guard = ENV_GUARD.lock().unwrap();
        reset_env();
        env::set_var("MONOBANK_BALANCE_REFRESH_MINUTES", "18446744073709551615");

        let err = ExporterConfig::load_from_env().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::OutOfRange {
                key: "MONOBANK_BALANCE_REFRESH_MINUTES",
                max: MAX_REFRESH_MINUTES,
                ..
            }
        ));

        reset_env();
        env::set_var(
            "MONOBANK_CURRENCY_REFRESH_MINUTES",
            MAX_REFRESH_MINUTES.to_string(),
        );
        let config = ExporterConfig::load_from_env().expect("config loads");
        assert_eq!(
            config.currency_refresh_interval(),
            Duration::from_secs(MAX_REFRESH_MINUTES * 60)
        );

        reset_env();
    }

    #[test]
    fn builder_clamps_refresh_minutes() {
        let config = ExporterConfig::new(DEFAULT_API_BASE_URL, Vec::new())
            .with_refresh_minutes(u64::MAX, 0);
        assert_eq!(
            config.balance_refresh_interval(),
            Duration::from_secs(MAX_REFRESH_MINUTES * 60)
        );
        assert_eq!(
            config.snapshot_ttl(),
            Duration::from_secs((MAX_REFRESH_MINUTES + 1) * 60)
        );
        assert_eq!(config.currency_refresh_interval(), Duration::from_secs(600));
    }

    #[test]
    fn reads_clients_and_overrides() {
        let _guard = ENV_GUARD.lock().unwrap();
        reset_env();
        env::set_var(
            "MONOBANK_CLIENTS",
            r#"[{"token":"t1","name":"Alice"},{"token":"t2","webHookUrl":"https://b.example.com/webhook"}]"#,
        );
        env::set_var("MONOBANK_WEBHOOK_URL", " https://exporter.example.com/webhook ");
        env::set_var("METRICS_BALANCE_NAME", "bank_balance");

        let config = ExporterConfig::load_from_env().expect("config loads");
        assert_eq!(config.clients().len(), 2);
        assert_eq!(config.clients()[0].display_name(), Some("Alice"));
        assert_eq!(
            config.webhook_url(),
            Some("https://exporter.example.com/webhook")
        );
        assert_eq!(config.metric_names().balance, "bank_balance");
        assert_eq!(config.metric_names().credit_limit, "monobank_credit_limit");

        reset_env();
    }

    #[test]
    fn malformed_clients_are_rejected() {
        let _guard = ENV_GUARD.lock().unwrap();
        reset_env();
        env::set_var("MONOBANK_CLIENTS", "{not json");

        let err = ExporterConfig::load_from_env().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidClients { .. }));

        reset_env();
    }

    #[test]
    fn clients_file_takes_precedence() {
        let _guard = ENV_GUARD.lock().unwrap();
        reset_env();
        let path = env::temp_dir().join(format!(
            "monobank-exporter-clients-{}.json",
            std::process::id()
        ));
        fs::write(&path, r#"[{"token":"from-file"}]"#).expect("write clients file");
        env::set_var("MONOBANK_CLIENTS_FILE", path.to_str().unwrap());
        env::set_var("MONOBANK_CLIENTS", r#"[{"token":"a"},{"token":"b"}]"#);

        let config = ExporterConfig::load_from_env().expect("config loads");
        assert_eq!(config.clients().len(), 1);
        assert_eq!(config.clients()[0].token, "from-file");

        fs::remove_file(&path).ok();
        reset_env();
    }

    #[test]
    fn api_config_requires_bind_address() {
        let _guard = ENV_GUARD.lock().unwrap();
        reset_env();
        env::set_var("API_BIND_ADDRESS", "   ");

        let err = ApiConfig::load_from_env().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::MissingVar {
                key: "API_BIND_ADDRESS"
            }
        ));

        reset_env();
    }

    #[test]
    fn basic_auth_needs_both_halves() {
        let _guard = ENV_GUARD.lock().unwrap();
        reset_env();
        env::set_var("API_BIND_ADDRESS", " 127.0.0.1:8080 ");
        env::set_var("BASIC_AUTH_USERNAME", "prometheus");

        let config = ApiConfig::load_from_env().expect("config loads");
        assert_eq!(config.api_bind_address(), "127.0.0.1:8080");
        assert!(!config.basic_auth().is_enabled());

        env::set_var("BASIC_AUTH_PASSWORD", "scrape");
        let config = ApiConfig::load_from_env().expect("config loads");
        assert!(config.basic_auth().is_enabled());
        assert!(config.basic_auth().matches("prometheus", "scrape"));
        assert!(!config.basic_auth().matches("prometheus", "wrong"));

        reset_env();
    }

    #[test]
    fn credentials_debug_hides_password() {
        let creds = BasicAuthCredentials::new(Some("user".into()), Some("hunter2".into()));
        assert!(!format!("{creds:?}").contains("hunter2"));
    }
}
