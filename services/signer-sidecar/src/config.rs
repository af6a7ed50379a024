//! Layered configuration with validation.
//!
//! Sources, lowest precedence first: built-in defaults, an optional JSON
//! config file, environment variables, command-line flags.

use crate::session::{BootstrapParams, CredentialSource};
use clap::Parser;
use config::{Environment, File, FileFormat};
use cubesigner_client::ClientConfig;
use secrecy::SecretString;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A source could not be read or a value has the wrong type
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    /// Invalid URL format
    #[error("Invalid URL for {field}: {reason}")]
    InvalidUrl {
        /// Offending setting
        field: String,
        /// Parse failure
        reason: String,
    },

    /// Invalid listen address
    #[error("Invalid listen address {addr}: {reason}")]
    InvalidAddress {
        /// Host and port as configured
        addr: String,
        /// Parse failure
        reason: String,
    },

    /// Invalid port number
    #[error("Invalid port: must be between 1 and 65535")]
    InvalidPort,

    /// Missing required field
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    /// Configured credential file does not exist
    #[error("Token file not found: {}", .0.display())]
    TokenFileNotFound(PathBuf),
}

/// Command-line flags.
#[derive(Debug, Clone, Default, Parser)]
#[command(name = "cube-signer-sidecar", version, about = "BLS signer backed by CubeSigner")]
pub struct Args {
    /// JSON config file
    #[arg(long, env = "CONFIG_FILE")]
    pub config_file: Option<PathBuf>,

    /// Session credential file, rewritten after every refresh
    #[arg(long)]
    pub token_file_path: Option<PathBuf>,

    /// Key to sign with
    #[arg(long)]
    pub key_id: Option<String>,

    /// Remote signer API base URL
    #[arg(long)]
    pub signer_endpoint: Option<String>,

    /// Listen host
    #[arg(long)]
    pub host: Option<String>,

    /// Listen port
    #[arg(long)]
    pub port: Option<u16>,

    /// User session token for bootstrapping a role session
    #[arg(long)]
    pub user_token: Option<String>,

    /// Organization of the signing role
    #[arg(long)]
    pub org_id: Option<String>,

    /// Signing role
    #[arg(long)]
    pub role_id: Option<String>,

    /// Purpose recorded on bootstrapped sessions
    #[arg(long)]
    pub token_purpose: Option<String>,

    /// Log level filter
    #[arg(long)]
    pub log_level: Option<String>,

    /// Emit JSON logs
    #[arg(long)]
    pub log_json: bool,
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    token_file_path: Option<String>,
    key_id: Option<String>,
    signer_endpoint: Option<String>,
    host: String,
    port: u16,
    user_token: Option<String>,
    org_id: Option<String>,
    role_id: Option<String>,
    token_purpose: String,
    request_timeout_secs: u64,
    shutdown_timeout_secs: u64,
    log_level: String,
    log_json: bool,
}

/// Sidecar configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Session credential file; bootstrap mode when absent
    pub token_file_path: Option<PathBuf>,
    /// Key to sign with
    pub key_id: String,
    /// Remote signer API base URL
    pub signer_endpoint: Url,
    /// Listen host
    pub host: String,
    /// Listen port (1-65535)
    pub port: u16,
    /// User session token for bootstrapping
    pub user_token: Option<SecretString>,
    /// Organization of the signing role
    pub org_id: Option<String>,
    /// Signing role
    pub role_id: Option<String>,
    /// Purpose recorded on bootstrapped sessions
    pub token_purpose: String,
    /// Remote request timeout in seconds
    pub request_timeout_secs: u64,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_secs: u64,
    /// Log level filter
    pub log_level: String,
    /// Emit JSON logs
    pub log_json: bool,
}

impl Config {
    /// Load configuration from the process environment and `args`.
    ///
    /// # Errors
    ///
    /// Unreadable sources or invalid values.
    pub fn load(args: Args) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::load_from(args, None)
    }

    /// Load configuration, reading environment variables from `env` instead
    /// of the process environment when given.
    ///
    /// # Errors
    ///
    /// Unreadable sources or invalid values.
    pub fn load_from(
        args: Args,
        env: Option<config::Map<String, String>>,
    ) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder()
            .set_default("host", "0.0.0.0")?
            .set_default("port", 50051)?
            .set_default("token_purpose", "cube-signer-sidecar")?
            .set_default("request_timeout_secs", 30)?
            .set_default("shutdown_timeout_secs", 10)?
            .set_default("log_level", "info")?
            .set_default("log_json", false)?;

        if let Some(path) = args.config_file.as_deref() {
            builder = builder.add_source(File::from(path).format(FileFormat::Json).required(true));
        }

        let raw: RawConfig = builder
            .add_source(Environment::default().try_parsing(true).source(env))
            .set_override_option(
                "token_file_path",
                args.token_file_path.map(|p| p.to_string_lossy().into_owned()),
            )?
            .set_override_option("key_id", args.key_id)?
            .set_override_option("signer_endpoint", args.signer_endpoint)?
            .set_override_option("host", args.host)?
            .set_override_option("port", args.port.map(i64::from))?
            .set_override_option("user_token", args.user_token)?
            .set_override_option("org_id", args.org_id)?
            .set_override_option("role_id", args.role_id)?
            .set_override_option("token_purpose", args.token_purpose)?
            .set_override_option("log_level", args.log_level)?
            .set_override_option("log_json", args.log_json.then_some(true))?
            .build()?
            .try_deserialize()?;

        let config = Self::from_raw(raw)?;
        config.validate()?;
        Ok(config)
    }

    fn from_raw(raw: RawConfig) -> Result<Self, ConfigError> {
        let key_id = non_empty(raw.key_id)
            .ok_or_else(|| ConfigError::MissingRequired("key_id".to_string()))?;
        let endpoint = non_empty(raw.signer_endpoint)
            .ok_or_else(|| ConfigError::MissingRequired("signer_endpoint".to_string()))?;
        let signer_endpoint = Url::parse(&endpoint).map_err(|e| ConfigError::InvalidUrl {
            field: "signer_endpoint".to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            token_file_path: non_empty(raw.token_file_path).map(PathBuf::from),
            key_id,
            signer_endpoint,
            host: raw.host,
            port: raw.port,
            user_token: non_empty(raw.user_token).map(SecretString::from),
            org_id: non_empty(raw.org_id),
            role_id: non_empty(raw.role_id),
            token_purpose: raw.token_purpose,
            request_timeout_secs: raw.request_timeout_secs,
            shutdown_timeout_secs: raw.shutdown_timeout_secs,
            log_level: raw.log_level,
            log_json: raw.log_json,
        })
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// The first invalid or missing setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::InvalidPort);
        }
        if self.key_id.is_empty() {
            return Err(ConfigError::MissingRequired("key_id".to_string()));
        }
        if self.signer_endpoint.cannot_be_a_base() {
            return Err(ConfigError::InvalidUrl {
                field: "signer_endpoint".to_string(),
                reason: "not an absolute URL".to_string(),
            });
        }

        match &self.token_file_path {
            Some(path) if !path.exists() => Err(ConfigError::TokenFileNotFound(path.clone())),
            Some(_) => Ok(()),
            None => {
                let missing: Vec<&str> = [
                    ("user_token", self.user_token.is_none()),
                    ("org_id", self.org_id.is_none()),
                    ("role_id", self.role_id.is_none()),
                ]
                .into_iter()
                .filter_map(|(name, absent)| absent.then_some(name))
                .collect();

                if missing.is_empty() {
                    Ok(())
                } else {
                    Err(ConfigError::MissingRequired(format!(
                        "{} (required without token_file_path)",
                        missing.join(", ")
                    )))
                }
            }
        }
    }

    /// gRPC listen address.
    ///
    /// # Errors
    ///
    /// `InvalidAddress` if host and port do not form a socket address.
    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        let addr = format!("{}:{}", self.host, self.port);
        addr.parse().map_err(|e: std::net::AddrParseError| ConfigError::InvalidAddress {
            reason: e.to_string(),
            addr,
        })
    }

    /// Where the initial session credential comes from.
    ///
    /// # Errors
    ///
    /// `MissingRequired` if neither a token file nor complete bootstrap
    /// credentials are configured.
    pub fn credential_source(&self) -> Result<CredentialSource, ConfigError> {
        if let Some(path) = &self.token_file_path {
            return Ok(CredentialSource::File(path.clone()));
        }

        match (&self.user_token, &self.org_id, &self.role_id) {
            (Some(user_token), Some(org_id), Some(role_id)) => {
                Ok(CredentialSource::Bootstrap(BootstrapParams {
                    org_id: org_id.clone(),
                    role_id: role_id.clone(),
                    user_token: user_token.clone(),
                    purpose: self.token_purpose.clone(),
                }))
            }
            _ => Err(ConfigError::MissingRequired(
                "token_file_path or user_token, org_id and role_id".to_string(),
            )),
        }
    }

    /// Remote signer client settings.
    #[must_use]
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::new(self.signer_endpoint.as_str()).with_timeout(self.request_timeout())
    }

    /// Remote request timeout.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Graceful shutdown timeout.
    #[must_use]
    pub const fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
