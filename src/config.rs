use std::fmt;
use std::path::PathBuf;
use serde::{Deserialize, Serialize};
use directories::ProjectDirs;
use clap::Parser;
use std::fs;
use thiserror::Error;
use tracing::{info, warn};

/// Default limit for a single artifact file, Cordra struggles with anything larger
pub const DEFAULT_FILE_MAX_SIZE: u64 = 100 * 1024 * 1024;

/// Errors raised while assembling the configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required setting `{0}`")]
    Missing(&'static str),
    #[error("Failed to read config file: {0}")]
    Read(#[from] std::io::Error),
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Configuration for the connector
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the Argo Workflows server
    pub argo_base_url: String,
    /// Bearer token for the Argo server
    pub argo_token: String,
    /// Namespace checked by the health check
    pub argo_namespace: String,
    /// Base URL of the Cordra instance
    pub cordra_base_url: String,
    /// Cordra user name
    pub cordra_user: String,
    /// Cordra password
    pub cordra_password: String,
    /// Whether TLS certificates of Argo and Cordra are verified
    pub verify_cert: bool,
    /// Artifact files larger than this many bytes are skipped
    pub file_max_size: u64,
    /// Address the HTTP server binds to
    pub bind_address: String,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("argo_base_url", &self.argo_base_url)
            .field("argo_token", &"<redacted>")
            .field("argo_namespace", &self.argo_namespace)
            .field("cordra_base_url", &self.cordra_base_url)
            .field("cordra_user", &self.cordra_user)
            .field("cordra_password", &"<redacted>")
            .field("verify_cert", &self.verify_cert)
            .field("file_max_size", &self.file_max_size)
            .field("bind_address", &self.bind_address)
            .finish()
    }
}

/// Update structure for Config with all fields optional
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ConfigUpdate {
    #[serde(default)]
    pub argo_base_url: Option<String>,
    #[serde(default)]
    pub argo_token: Option<String>,
    #[serde(default)]
    pub argo_namespace: Option<String>,
    #[serde(default)]
    pub cordra_base_url: Option<String>,
    #[serde(default)]
    pub cordra_user: Option<String>,
    #[serde(default)]
    pub cordra_password: Option<String>,
    #[serde(default)]
    pub verify_cert: Option<bool>,
    #[serde(default)]
    pub file_max_size: Option<u64>,
    #[serde(default)]
    pub bind_address: Option<String>,
}

/// Command line arguments shared by the server and the CLI
#[derive(Parser, Debug, Clone, Default)]
pub struct CliArgs {
    /// Base URL of the Argo Workflows server
    #[clap(long, env = "ARGO_BASE_URL", global = true)]
    pub argo_base_url: Option<String>,

    /// Bearer token for the Argo server
    #[clap(long, env = "ARGO_TOKEN", hide_env_values = true, global = true)]
    pub argo_token: Option<String>,

    /// Namespace used for the Argo health check
    #[clap(long, env = "ARGO_NAMESPACE", global = true)]
    pub argo_namespace: Option<String>,

    /// Base URL of the Cordra instance
    #[clap(long, env = "CORDRA_BASE_URL", global = true)]
    pub cordra_base_url: Option<String>,

    /// Cordra user
    #[clap(long, env = "CORDRA_USER", global = true)]
    pub cordra_user: Option<String>,

    /// Cordra password
    #[clap(long, env = "CORDRA_PASSWORD", hide_env_values = true, global = true)]
    pub cordra_password: Option<String>,

    /// Verify TLS certificates of Argo and Cordra
    #[clap(long, env = "VERIFY_CERT", global = true)]
    pub verify_cert: Option<bool>,

    /// Skip artifact files larger than this many bytes
    #[clap(long, env = "FILE_MAX_SIZE", global = true)]
    pub file_max_size: Option<u64>,

    /// Address to listen on
    #[clap(long, env = "BIND_ADDRESS", global = true)]
    pub bind_address: Option<String>,

    /// Directory for rolling log files
    ///
    /// Like the other logging flags this is read before the config file, so
    /// it is only taken from the command line and the environment.
    #[clap(long, env = "LOG_DIR", global = true)]
    pub log_dir: Option<PathBuf>,

    /// Path to a TOML config file
    #[clap(long, env = "CONFIG_FILE", global = true)]
    pub config_file: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset
    #[clap(long, env = "LOG_LEVEL", default_value = "info", global = true)]
    pub log_level: String,

    /// Emit logs as JSON lines
    #[clap(long, env = "LOG_JSON", default_value_t = false, global = true)]
    pub log_json: bool,
}

impl ConfigUpdate {
    /// Layers `update` on top of `self`, values present in `update` win
    pub fn merge(self, update: ConfigUpdate) -> Self {
        Self {
            argo_base_url: update.argo_base_url.or(self.argo_base_url),
            argo_token: update.argo_token.or(self.argo_token),
            argo_namespace: update.argo_namespace.or(self.argo_namespace),
            cordra_base_url: update.cordra_base_url.or(self.cordra_base_url),
            cordra_user: update.cordra_user.or(self.cordra_user),
            cordra_password: update.cordra_password.or(self.cordra_password),
            verify_cert: update.verify_cert.or(self.verify_cert),
            file_max_size: update.file_max_size.or(self.file_max_size),
            bind_address: update.bind_address.or(self.bind_address),
        }
    }
}

impl TryFrom<ConfigUpdate> for Config {
    type Error = ConfigError;

    fn try_from(update: ConfigUpdate) -> Result<Self, Self::Error> {
        let defaults = base_config();
        Ok(Config {
            argo_base_url: trim_base_url(update.argo_base_url.ok_or(ConfigError::Missing("argo_base_url"))?),
            argo_token: update.argo_token.ok_or(ConfigError::Missing("argo_token"))?,
            argo_namespace: update.argo_namespace.or(defaults.argo_namespace).unwrap_or_default(),
            cordra_base_url: trim_base_url(update.cordra_base_url.ok_or(ConfigError::Missing("cordra_base_url"))?),
            cordra_user: update.cordra_user.ok_or(ConfigError::Missing("cordra_user"))?,
            cordra_password: update.cordra_password.ok_or(ConfigError::Missing("cordra_password"))?,
            verify_cert: update.verify_cert.or(defaults.verify_cert).unwrap_or_default(),
            file_max_size: update.file_max_size.or(defaults.file_max_size).unwrap_or(DEFAULT_FILE_MAX_SIZE),
            bind_address: update.bind_address.or(defaults.bind_address).unwrap_or_default(),
        })
    }
}

fn trim_base_url(url: String) -> String {
    url.trim_end_matches('/').to_string()
}

/// Returns the base (default) configuration
///
/// Connection settings have no sensible default and stay unset.
pub fn base_config() -> ConfigUpdate {
    ConfigUpdate {
        argo_namespace: Some("argo".to_string()),
        verify_cert: Some(false),
        file_max_size: Some(DEFAULT_FILE_MAX_SIZE),
        bind_address: Some("0.0.0.0:8000".to_string()),
        ..ConfigUpdate::default()
    }
}

/// Returns the directory the connector reads `config.toml` from, if it exists
pub fn get_config_dir_path() -> Option<PathBuf> {
    match ProjectDirs::from("eu", "biodt", "argo-connector") {
        Some(proj_dirs) => {
            let path = proj_dirs.config_dir().to_path_buf();
            if path.exists() {
                Some(path)
            } else {
                info!("Config path not found at {:?}, using defaults", path);
                None
            }
        }
        None => {
            warn!("Could not determine XDG config directory, skipping config file");
            None
        }
    }
}

/// Loads configuration from a TOML file
///
/// A missing file is not an error and yields an empty update.
pub fn config_from_file(config_path: Option<PathBuf>) -> Result<ConfigUpdate, ConfigError> {
    let Some(config_path) = config_path else {
        return Ok(ConfigUpdate::default());
    };

    if !config_path.exists() {
        info!("Config file not found at {:?}, using defaults", config_path);
        return Ok(ConfigUpdate::default());
    }

    let content = fs::read_to_string(&config_path)?;
    let update = toml::from_str::<ConfigUpdate>(&content)?;
    info!("Loaded configuration from {:?}", config_path);
    Ok(update)
}

/// Loads configuration from command line arguments and environment variables
pub fn config_from_args(args: &CliArgs) -> ConfigUpdate {
    ConfigUpdate {
        argo_base_url: args.argo_base_url.clone(),
        argo_token: args.argo_token.clone(),
        argo_namespace: args.argo_namespace.clone(),
        cordra_base_url: args.cordra_base_url.clone(),
        cordra_user: args.cordra_user.clone(),
        cordra_password: args.cordra_password.clone(),
        verify_cert: args.verify_cert,
        file_max_size: args.file_max_size,
        bind_address: args.bind_address.clone(),
    }
}

/// Gets the complete configuration by combining defaults with
/// values from the config file, environment variables, and command line arguments
/// in order of increasing precedence
pub fn get_config(args: &CliArgs) -> Result<Config, ConfigError> {
    let config_path = args
        .config_file
        .clone()
        .or_else(|| get_config_dir_path().map(|dir| dir.join("config.toml")));

    let config = Config::try_from(
        base_config()
            .merge(config_from_file(config_path)?)
            .merge(config_from_args(args)),
    )?;

    info!(
        "Final configuration: argo={}, cordra={} (user {}), bind={}, verify_cert={}, file_max_size={}",
        config.argo_base_url,
        config.cordra_base_url,
        config.cordra_user,
        config.bind_address,
        config.verify_cert,
        config.file_max_size
    );

    Ok(config)
}
