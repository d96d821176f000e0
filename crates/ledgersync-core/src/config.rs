//! Configuration module for Ledgersync.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, environment overrides, validation, defaults, and a builder
//! pattern for programmatic use.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for Ledgersync.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub xero: XeroConfig,
    pub auth: AuthConfig,
    pub sync: SyncConfig,
    pub retry: RetryConfig,
    pub enrichment: EnrichmentConfig,
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

/// Xero application credentials and endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct XeroConfig {
    /// OAuth client ID. `None` until configured (or set via environment).
    pub client_id: Option<String>,
    /// OAuth client secret.
    pub client_secret: Option<String>,
    /// Accounting API base URL.
    pub api_base_url: String,
    pub authorize_url: String,
    pub token_url: String,
    /// Endpoint listing the tenants a token can access.
    pub connections_url: String,
    pub scopes: Vec<String>,
    /// Local port for the login callback server.
    pub redirect_port: u16,
}

/// Token lifecycle settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Owner of the stored connection and cursors.
    pub user_id: String,
    /// Refresh the access token when it expires within this many seconds.
    pub refresh_margin_secs: u64,
    /// Lifetime assumed for a freshly issued refresh token.
    pub refresh_token_lifetime_days: u32,
}

/// Chunked sync settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Records requested per page.
    pub page_size: u32,
    pub max_customer_pages: u32,
    pub max_invoice_pages: u32,
    pub max_bank_transaction_pages: u32,
    /// Courtesy delay between pages of one entity, in milliseconds.
    pub page_delay_ms: u64,
    /// `where` filter sent with invoice requests.
    pub invoice_where: String,
    /// `order` clause sent with invoice requests.
    pub invoice_order: String,
    /// `where` filter sent with bank-transaction requests.
    pub bank_transaction_where: String,
}

/// Back-off applied to rate-limited (HTTP 429) requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
}

/// LLM enrichment settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    /// Base URL of an OpenAI-compatible API.
    pub api_base_url: String,
    pub model: String,
    /// API key. Usually supplied via `OPENAI_API_KEY`.
    pub api_key: Option<String>,
    /// Invoices selected per batch.
    pub batch_size: u32,
    /// Invoices sent to the model per call.
    pub sub_batch_size: u32,
    /// Model calls in flight at once.
    pub concurrency: u32,
    /// Pause between groups of concurrent calls, in milliseconds.
    pub group_delay_ms: u64,
    pub temperature: f32,
    pub max_tokens: u32,
    /// USD per 1K prompt tokens.
    pub input_cost_per_1k: f64,
    /// USD per 1K completion tokens.
    pub output_cost_per_1k: f64,
    /// Descriptions shorter than this count as missing.
    pub min_description_length: u32,
    /// Records whose text matches none of these terms skip the model.
    pub prefilter_vocabulary: Vec<String>,
    /// HTTP timeout for model calls, in seconds.
    pub timeout_secs: u64,
}

/// Persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite database file, or `:memory:` for a throwaway database.
    pub path: PathBuf,
    /// Pool size for file databases; in-memory databases use one.
    pub max_connections: u32,
    /// How long a writer waits on a locked database, in milliseconds.
    pub busy_timeout_ms: u64,
}

impl DatabaseConfig {
    /// Whether `path` names an in-memory database rather than a file.
    pub fn is_in_memory(&self) -> bool {
        self.path.as_os_str() == ":memory:"
    }
}

/// `ledgersyncd` HTTP surface settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
    /// Emit JSON log lines instead of human-readable ones.
    pub json: bool,
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

/// Environment variable overriding `xero.client_id`.
pub const ENV_CLIENT_ID: &str = "LEDGERSYNC_XERO_CLIENT_ID";
/// Environment variable overriding `xero.client_secret`.
pub const ENV_CLIENT_SECRET: &str = "LEDGERSYNC_XERO_CLIENT_SECRET";
/// Environment variable overriding `enrichment.api_key`.
pub const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/ledgersync/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("ledgersync")
            .join("config.yaml")
    }

    /// Overlay secrets from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Overlay secrets from `lookup`; empty values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(id) = get(ENV_CLIENT_ID) {
            self.xero.client_id = Some(id);
        }
        if let Some(secret) = get(ENV_CLIENT_SECRET) {
            self.xero.client_secret = Some(secret);
        }
        if let Some(key) = get(ENV_OPENAI_API_KEY) {
            self.enrichment.api_key = Some(key);
        }
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

/// Terms that mark an invoice as worth sending to the model.
pub const DEFAULT_PREFILTER_VOCABULARY: &[&str] = &[
    "electric",
    "wiring",
    "rewire",
    "switchboard",
    "circuit",
    "breaker",
    "rcd",
    "socket",
    "outlet",
    "power point",
    "light",
    "downlight",
    "led",
    "fault",
    "install",
    "repair",
    "service",
    "maintenance",
    "heat pump",
    "hvac",
    "air con",
    "aircon",
    "air conditioning",
    "ventilation",
    "duct",
    "heating",
    "cooling",
    "thermostat",
    "compressor",
    "refrigerant",
    "extractor",
    "fan",
    "solar",
    "inverter",
    "ev charger",
    "smoke alarm",
    "test and tag",
    "labour",
    "call out",
    "callout",
];

impl Default for XeroConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            api_base_url: "https://api.xero.com/api.xro/2.0".to_string(),
            authorize_url: "https://login.xero.com/identity/connect/authorize".to_string(),
            token_url: "https://identity.xero.com/connect/token".to_string(),
            connections_url: "https://api.xero.com/connections".to_string(),
            scopes: vec![
                "offline_access".to_string(),
                "accounting.contacts.read".to_string(),
                "accounting.transactions.read".to_string(),
            ],
            redirect_port: 8765,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            user_id: "default".to_string(),
            refresh_margin_secs: 300,
            refresh_token_lifetime_days: 60,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            page_size: 1000,
            max_customer_pages: 5,
            max_invoice_pages: 5,
            max_bank_transaction_pages: 5,
            page_delay_ms: 50,
            invoice_where: r#"Status!="DELETED""#.to_string(),
            invoice_order: "UpdatedDateUTC ASC".to_string(),
            bank_transaction_where:
                r#"(Type=="RECEIVE" OR Type=="SPEND") AND Contact.ContactID!=Guid.Empty"#
                    .to_string(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay_ms: 3_000,
            max_delay_ms: 60_000,
        }
    }
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key: None,
            batch_size: 50,
            sub_batch_size: 10,
            concurrency: 5,
            group_delay_ms: 300,
            temperature: 0.2,
            max_tokens: 2000,
            input_cost_per_1k: 0.00015,
            output_cost_per_1k: 0.0006,
            min_description_length: 20,
            prefilter_vocabulary: DEFAULT_PREFILTER_VOCABULARY
                .iter()
                .map(|s| s.to_string())
                .collect(),
            timeout_secs: 60,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("~/.local/share"))
                .join("ledgersync")
                .join("ledgersync.db"),
            max_connections: 5,
            busy_timeout_ms: 5_000,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8787".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"sync.page_size"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Upstream maximum page size.
pub const MAX_PAGE_SIZE: u32 = 1000;

fn greater_than_zero(errors: &mut Vec<ValidationError>, field: &str, value: u64) {
    if value == 0 {
        errors.push(ValidationError {
            field: field.into(),
            message: "must be greater than 0".into(),
        });
    }
}

fn valid_url(errors: &mut Vec<ValidationError>, field: &str, value: &str) {
    if url::Url::parse(value).is_err() {
        errors.push(ValidationError {
            field: field.into(),
            message: format!("not a valid URL: '{value}'"),
        });
    }
}

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid. Missing secrets are
    /// not errors here; the commands that need them report their absence.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- xero ---
        valid_url(&mut errors, "xero.api_base_url", &self.xero.api_base_url);
        valid_url(&mut errors, "xero.authorize_url", &self.xero.authorize_url);
        valid_url(&mut errors, "xero.token_url", &self.xero.token_url);
        valid_url(&mut errors, "xero.connections_url", &self.xero.connections_url);
        if !self.xero.scopes.iter().any(|s| s == "offline_access") {
            errors.push(ValidationError {
                field: "xero.scopes".into(),
                message: "must include 'offline_access' to obtain refresh tokens".into(),
            });
        }
        greater_than_zero(
            &mut errors,
            "xero.redirect_port",
            u64::from(self.xero.redirect_port),
        );

        // --- auth ---
        if self.auth.user_id.trim().is_empty() {
            errors.push(ValidationError {
                field: "auth.user_id".into(),
                message: "must not be empty".into(),
            });
        }
        greater_than_zero(
            &mut errors,
            "auth.refresh_token_lifetime_days",
            u64::from(self.auth.refresh_token_lifetime_days),
        );

        // --- sync ---
        if self.sync.page_size == 0 || self.sync.page_size > MAX_PAGE_SIZE {
            errors.push(ValidationError {
                field: "sync.page_size".into(),
                message: format!("must be in range 1..={MAX_PAGE_SIZE}"),
            });
        }

        // --- retry ---
        greater_than_zero(
            &mut errors,
            "retry.max_attempts",
            u64::from(self.retry.max_attempts),
        );
        if self.retry.initial_delay_ms > self.retry.max_delay_ms {
            errors.push(ValidationError {
                field: "retry.initial_delay_ms".into(),
                message: format!(
                    "initial_delay_ms ({}) must not exceed max_delay_ms ({})",
                    self.retry.initial_delay_ms, self.retry.max_delay_ms
                ),
            });
        }

        // --- enrichment ---
        valid_url(
            &mut errors,
            "enrichment.api_base_url",
            &self.enrichment.api_base_url,
        );
        if self.enrichment.model.trim().is_empty() {
            errors.push(ValidationError {
                field: "enrichment.model".into(),
                message: "must not be empty".into(),
            });
        }
        greater_than_zero(
            &mut errors,
            "enrichment.batch_size",
            u64::from(self.enrichment.batch_size),
        );
        if self.enrichment.sub_batch_size == 0 || self.enrichment.sub_batch_size > 50 {
            errors.push(ValidationError {
                field: "enrichment.sub_batch_size".into(),
                message: "must be in range 1..=50".into(),
            });
        }
        if self.enrichment.concurrency == 0 || self.enrichment.concurrency > 16 {
            errors.push(ValidationError {
                field: "enrichment.concurrency".into(),
                message: "must be in range 1..=16".into(),
            });
        }
        if !(0.0..=2.0).contains(&self.enrichment.temperature) {
            errors.push(ValidationError {
                field: "enrichment.temperature".into(),
                message: "must be in range 0.0..=2.0".into(),
            });
        }
        greater_than_zero(
            &mut errors,
            "enrichment.max_tokens",
            u64::from(self.enrichment.max_tokens),
        );
        if self.enrichment.input_cost_per_1k < 0.0 || self.enrichment.output_cost_per_1k < 0.0 {
            errors.push(ValidationError {
                field: "enrichment.input_cost_per_1k".into(),
                message: "cost rates must not be negative".into(),
            });
        }
        greater_than_zero(
            &mut errors,
            "enrichment.timeout_secs",
            self.enrichment.timeout_secs,
        );

        // --- database ---
        if self.database.path.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "database.path".into(),
                message: "must not be empty".into(),
            });
        }
        greater_than_zero(
            &mut errors,
            "database.max_connections",
            u64::from(self.database.max_connections),
        );

        // --- server ---
        if self
            .server
            .bind_address
            .parse::<std::net::SocketAddr>()
            .is_err()
        {
            errors.push(ValidationError {
                field: "server.bind_address".into(),
                message: format!(
                    "not a valid socket address: '{}'",
                    self.server.bind_address
                ),
            });
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust,no_run
/// use ledgersync_core::config::ConfigBuilder;
///
/// let config = ConfigBuilder::new()
///     .xero_client_id("ABC123")
///     .sync_page_size(500)
///     .logging_level("debug")
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- xero ---

    pub fn xero_client_id(mut self, id: impl Into<String>) -> Self {
        self.config.xero.client_id = Some(id.into());
        self
    }

    pub fn xero_client_secret(mut self, secret: impl Into<String>) -> Self {
        self.config.xero.client_secret = Some(secret.into());
        self
    }

    pub fn xero_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.xero.api_base_url = url.into();
        self
    }

    pub fn xero_token_url(mut self, url: impl Into<String>) -> Self {
        self.config.xero.token_url = url.into();
        self
    }

    // --- auth ---

    pub fn auth_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.config.auth.user_id = user_id.into();
        self
    }

    pub fn auth_refresh_margin_secs(mut self, secs: u64) -> Self {
        self.config.auth.refresh_margin_secs = secs;
        self
    }

    // --- sync ---

    pub fn sync_page_size(mut self, n: u32) -> Self {
        self.config.sync.page_size = n;
        self
    }

    /// Set the same page bound for every entity kind.
    pub fn sync_max_pages(mut self, n: u32) -> Self {
        self.config.sync.max_customer_pages = n;
        self.config.sync.max_invoice_pages = n;
        self.config.sync.max_bank_transaction_pages = n;
        self
    }

    pub fn sync_page_delay_ms(mut self, ms: u64) -> Self {
        self.config.sync.page_delay_ms = ms;
        self
    }

    // --- retry ---

    pub fn retry_max_attempts(mut self, n: u32) -> Self {
        self.config.retry.max_attempts = n;
        self
    }

    pub fn retry_initial_delay_ms(mut self, ms: u64) -> Self {
        self.config.retry.initial_delay_ms = ms;
        self
    }

    pub fn retry_max_delay_ms(mut self, ms: u64) -> Self {
        self.config.retry.max_delay_ms = ms;
        self
    }

    // --- enrichment ---

    pub fn enrichment_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.enrichment.api_base_url = url.into();
        self
    }

    pub fn enrichment_api_key(mut self, key: impl Into<String>) -> Self {
        self.config.enrichment.api_key = Some(key.into());
        self
    }

    pub fn enrichment_sub_batch_size(mut self, n: u32) -> Self {
        self.config.enrichment.sub_batch_size = n;
        self
    }

    pub fn enrichment_concurrency(mut self, n: u32) -> Self {
        self.config.enrichment.concurrency = n;
        self
    }

    pub fn enrichment_group_delay_ms(mut self, ms: u64) -> Self {
        self.config.enrichment.group_delay_ms = ms;
        self
    }

    // --- database ---

    pub fn database_path(mut self, path: PathBuf) -> Self {
        self.config.database.path = path;
        self
    }

    // --- server ---

    pub fn server_bind_address(mut self, addr: impl Into<String>) -> Self {
        self.config.server.bind_address = addr.into();
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn logging_json(mut self, json: bool) -> Self {
        self.config.logging.json = json;
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
