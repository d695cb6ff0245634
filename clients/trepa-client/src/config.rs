//! Client configuration
//!
//! Everything the deriver and assembler treat as fixed constants (program id,
//! mint, token program, protocol version) is loaded here once and injected
//! at construction.

use serde::{Deserialize, Serialize};
use solana_sdk::{commitment_config::CommitmentConfig, pubkey, pubkey::Pubkey};
use std::{env, fs, path::Path, str::FromStr, time::Duration};

use crate::pda::ProtocolVersion;

/// Deployed pool program
pub const DEFAULT_PROGRAM_ID: Pubkey = pubkey!("8PYDEgUSwdpbvWUtER6mAeCveCFFCTR123RoZ6YrvdKA");
pub const DEFAULT_RPC_URL: &str = "http://localhost:8899";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    pub rpc: RpcSettings,
    pub program: ProgramSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcSettings {
    pub url: String,
    #[serde(default = "default_commitment")]
    pub commitment: String,
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
}

/// Immutable program constants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramSettings {
    #[serde(with = "pubkey_string")]
    pub program_id: Pubkey,
    #[serde(with = "pubkey_string", default = "spl_token::native_mint::id")]
    pub wsol_mint: Pubkey,
    #[serde(with = "pubkey_string", default = "spl_token::id")]
    pub token_program: Pubkey,
    /// Fallback when no config record has been loaded
    #[serde(with = "optional_pubkey_string", default)]
    pub treasury: Option<Pubkey>,
    #[serde(default)]
    pub protocol_version: ProtocolVersion,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingSettings {
    pub level: String,
}

fn default_commitment() -> String {
    "confirmed".to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Default for ProgramSettings {
    fn default() -> Self {
        Self {
            program_id: DEFAULT_PROGRAM_ID,
            wsol_mint: spl_token::native_mint::id(),
            token_program: spl_token::id(),
            treasury: None,
            protocol_version: ProtocolVersion::default(),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            rpc: RpcSettings {
                url: DEFAULT_RPC_URL.to_string(),
                commitment: default_commitment(),
                request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            },
            program: ProgramSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

fn parse_pubkey(name: &str, value: &str) -> Result<Pubkey, ConfigError> {
    Pubkey::from_str(value.trim()).map_err(|e| ConfigError::InvalidPubkey {
        name: name.to_string(),
        reason: e.to_string(),
    })
}

fn env_pubkey(name: &str, default: Pubkey) -> Result<Pubkey, ConfigError> {
    match env::var(name) {
        Ok(value) => parse_pubkey(name, &value),
        Err(_) => Ok(default),
    }
}

impl ClientConfig {
    /// Load `.env` if present, then read the environment
    pub fn load() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        let config = Self::from_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(ClientConfig {
            rpc: RpcSettings {
                url: env::var("SOLANA_RPC_URL").unwrap_or_else(|_| DEFAULT_RPC_URL.to_string()),
                commitment: env::var("SOLANA_COMMITMENT").unwrap_or_else(|_| default_commitment()),
                request_timeout_secs: env::var("RPC_TIMEOUT_SECS")
                    .unwrap_or_else(|_| DEFAULT_TIMEOUT_SECS.to_string())
                    .parse()
                    .map_err(|_| {
                        ConfigError::InvalidConfig(
                            "RPC_TIMEOUT_SECS must be an integer".to_string(),
                        )
                    })?,
            },

            program: ProgramSettings {
                program_id: env_pubkey("PROGRAM_ID", DEFAULT_PROGRAM_ID)?,
                wsol_mint: env_pubkey("WSOL_MINT", spl_token::native_mint::id())?,
                token_program: env_pubkey("TOKEN_PROGRAM_ID", spl_token::id())?,
                treasury: env::var("TREASURY")
                    .ok()
                    .map(|value| parse_pubkey("TREASURY", &value))
                    .transpose()?,
                protocol_version: match env::var("PROTOCOL_VERSION") {
                    Ok(value) => value.parse().map_err(ConfigError::InvalidConfig)?,
                    Err(_) => ProtocolVersion::default(),
                },
            },

            logging: LoggingSettings {
                level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            },
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: ClientConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
            path: path.as_ref().display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml_str(&content)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rpc.url.is_empty() {
            return Err(ConfigError::MissingRequired("rpc.url".to_string()));
        }

        if self.rpc.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidConfig(
                "request_timeout_secs must be greater than 0".to_string(),
            ));
        }

        self.commitment_config()?;

        if self.program.program_id == Pubkey::default() {
            return Err(ConfigError::MissingRequired("program_id".to_string()));
        }

        Ok(())
    }

    pub fn commitment_config(&self) -> Result<CommitmentConfig, ConfigError> {
        CommitmentConfig::from_str(&self.rpc.commitment).map_err(|_| {
            ConfigError::InvalidConfig(format!("unknown commitment '{}'", self.rpc.commitment))
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc.request_timeout_secs)
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("Invalid pubkey for {name}: {reason}")]
    InvalidPubkey { name: String, reason: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to read {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Base58 string form for pubkeys in config files
pub(crate) mod pubkey_string {
    use serde::{de, Deserialize, Deserializer, Serializer};
    use solana_sdk::pubkey::Pubkey;
    use std::str::FromStr;

    pub fn serialize<S: Serializer>(key: &Pubkey, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&key.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Pubkey, D::Error> {
        let s = String::deserialize(deserializer)?;
        Pubkey::from_str(&s).map_err(de::Error::custom)
    }
}

mod optional_pubkey_string {
    use serde::{de, Deserialize, Deserializer, Serializer};
    use solana_sdk::pubkey::Pubkey;
    use std::str::FromStr;

    pub fn serialize<S: Serializer>(key: &Option<Pubkey>, serializer: S) -> Result<S::Ok, S::Error> {
        match key {
            Some(key) => serializer.serialize_some(&key.to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Pubkey>, D::Error> {
        Option::<String>::deserialize(deserializer)?
            .map(|s| Pubkey::from_str(&s).map_err(de::Error::custom))
            .transpose()
    }
}
