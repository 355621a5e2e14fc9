//! Layered configuration for the explainer.
//!
//! Priority, lowest first: built-in defaults, a YAML file (`--config`,
//! `ELI5_CONFIG_FILE`, or `./eli5.yaml` when present), `ELI5_`-prefixed
//! environment variables (`ELI5_API__URL`, `ELI5_STREAM__IDLE_TIMEOUT_SECS`,
//! ...), and finally explicit command-line flags.

use std::path::Path;
use std::time::Duration;

use clap::Parser;
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;

use crate::llm::DEFAULT_MODEL;
use crate::session::SessionConfig;

/// Default endpoint for local development.
pub const DEFAULT_API_URL: &str = "http://localhost:8000/api/chat";

/// Config file picked up from the working directory when none is given.
const CWD_CONFIG_FILE: &str = "eli5.yaml";

#[derive(Parser, Debug)]
#[command(name = "eli5", author, version, about = "Stream an explanation of any topic", long_about = None)]
pub struct Cli {
    /// Topic to explain
    pub topic: Vec<String>,

    /// Explanation depth, 1 (ELI5) to 5 (expert)
    #[arg(short = 'l', long, default_value_t = 1, value_parser = clap::value_parser!(u8).range(1..=5))]
    pub complexity: u8,

    /// Config file path
    #[arg(short, long, env = "ELI5_CONFIG_FILE")]
    pub config: Option<String>,

    /// Explanation endpoint URL
    #[arg(long, env = "ELI5_API_URL")]
    pub api_url: Option<String>,

    /// API key forwarded to the endpoint
    #[arg(long, env = "ELI5_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Model identifier
    #[arg(long, env = "ELI5_MODEL")]
    pub model: Option<String>,

    /// Seconds to wait for headers or the next chunk (0 disables)
    #[arg(long, env = "ELI5_IDLE_TIMEOUT")]
    pub idle_timeout: Option<u64>,

    /// Fail when the response ends mid-character instead of dropping the tail
    #[arg(long, env = "ELI5_STRICT_DECODING")]
    pub strict_decoding: Option<bool>,

    /// Print plain text instead of HTML
    #[arg(long)]
    pub plain: bool,

    /// Emit logs as JSON
    #[arg(long, env = "ELI5_LOG_JSON")]
    pub log_json: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub stream: StreamConfig,
    pub app: AppInfo,
}

#[derive(Deserialize, Clone)]
pub struct ApiConfig {
    pub url: String,
    #[serde(default)]
    pub key: Option<String>,
    pub model: String,
}

impl std::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("url", &self.url)
            .field("key", &self.key.as_deref().map(crate::llm::mask_key))
            .field("model", &self.model)
            .finish()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct StreamConfig {
    pub idle_timeout_secs: u64,
    pub strict_decoding: bool,
}

impl StreamConfig {
    /// The idle timeout, or `None` when disabled with `0`.
    #[must_use]
    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_secs > 0).then(|| Duration::from_secs(self.idle_timeout_secs))
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppInfo {
    pub environment: String,
    pub version: String,
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from_args(std::env::args())
    }

    pub fn load_from_args<I, T>(args: I) -> Result<Self, config::ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let cli =
            Cli::try_parse_from(args).map_err(|e| config::ConfigError::Message(e.to_string()))?;
        Self::from_cli(&cli)
    }

    pub fn from_cli(cli: &Cli) -> Result<Self, config::ConfigError> {
        let mut builder = Config::builder()
            .set_default("api.url", DEFAULT_API_URL)?
            .set_default("api.model", DEFAULT_MODEL)?
            .set_default("stream.idle_timeout_secs", 120)?
            .set_default("stream.strict_decoding", false)?
            .set_default("app.environment", "development")?
            .set_default("app.version", env!("CARGO_PKG_VERSION"))?;

        if let Some(path) = &cli.config {
            builder = builder.add_source(File::new(path, FileFormat::Yaml));
        } else if Path::new(CWD_CONFIG_FILE).exists() {
            builder = builder.add_source(File::new(CWD_CONFIG_FILE, FileFormat::Yaml));
        }

        // E.g. ELI5_API__URL=https://example.com/api/chat
        builder = builder.add_source(
            Environment::with_prefix("ELI5")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        if let Some(url) = &cli.api_url {
            builder = builder.set_override("api.url", url.as_str())?;
        }
        if let Some(key) = &cli.api_key {
            builder = builder.set_override("api.key", key.as_str())?;
        }
        if let Some(model) = &cli.model {
            builder = builder.set_override("api.model", model.as_str())?;
        }
        if let Some(secs) = cli.idle_timeout {
            builder = builder.set_override("stream.idle_timeout_secs", secs)?;
        }
        if let Some(strict) = cli.strict_decoding {
            builder = builder.set_override("stream.strict_decoding", strict)?;
        }

        let cfg: Self = builder.build()?.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Endpoint and credential as seen by the session.
    #[must_use]
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig::new(self.api.url.clone(), self.api.key.clone())
    }

    fn validate(&self) -> Result<(), config::ConfigError> {
        let url = url::Url::parse(&self.api.url)
            .map_err(|e| config::ConfigError::Message(format!("api.url is invalid: {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(config::ConfigError::Message(format!(
                "api.url must use http or https, got {}",
                url.scheme()
            )));
        }
        if self.api.model.trim().is_empty() {
            return Err(config::ConfigError::Message(
                "api.model cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}
