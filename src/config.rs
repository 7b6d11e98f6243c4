//! Configuration management for the wallet session service
//!
//! Loads configuration from TOML files with environment variable substitution.

use anyhow::{Context, Result};
use chrono::format::{Item, StrftimeItems};
use chrono::FixedOffset;
use ethers::types::Address;
use serde::Deserialize;
use std::env;
use std::path::PathBuf;

use crate::history::TimestampFormat;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub session: SessionConfig,
    pub wallet: WalletConfig,
    pub contract: ContractConfig,
    pub api: ApiConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// JSON file backing the local store; in-memory when absent
    pub storage_path: Option<String>,
    pub timestamp_format: String,
    pub utc_offset_minutes: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WalletConfig {
    /// JSON-RPC endpoint of the wallet provider. Empty or missing means no wallet.
    pub rpc_url: Option<String>,
    pub poll_interval_ms: u64,
    pub confirmations: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContractConfig {
    pub address: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Settings {
    /// Load settings from configuration files
    pub fn load() -> Result<Self> {
        let config_path = env::var("WALLET_SESSION_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config/default.toml"));

        let config_str = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        Self::parse(&config_str)
    }

    /// Parse and validate settings from TOML text
    pub fn parse(config_str: &str) -> Result<Self> {
        // Substitute environment variables
        let config_str = substitute_env_vars(config_str);

        let settings: Settings =
            toml::from_str(&config_str).with_context(|| "Failed to parse configuration")?;

        settings.validate()?;

        Ok(settings)
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        self.contract_address()?;

        if StrftimeItems::new(&self.session.timestamp_format).any(|item| item == Item::Error) {
            anyhow::bail!(
                "Invalid timestamp format: {:?}",
                self.session.timestamp_format
            );
        }

        self.utc_offset()?;

        if self.wallet.confirmations == 0 {
            anyhow::bail!("wallet.confirmations must be at least 1");
        }

        if self.wallet_url().is_none() {
            tracing::warn!("No wallet RPC URL configured - wallet operations will be unavailable");
        }

        Ok(())
    }

    /// Wallet RPC URL, treating an empty value as absent
    pub fn wallet_url(&self) -> Option<&str> {
        self.wallet
            .rpc_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }

    /// Parsed address of the Transactions contract
    pub fn contract_address(&self) -> Result<Address> {
        self.contract
            .address
            .trim()
            .parse()
            .with_context(|| format!("Invalid contract address: {:?}", self.contract.address))
    }

    fn utc_offset(&self) -> Result<FixedOffset> {
        FixedOffset::east_opt(self.session.utc_offset_minutes * 60).with_context(|| {
            format!(
                "UTC offset out of range: {} minutes",
                self.session.utc_offset_minutes
            )
        })
    }

    /// Timestamp rendering settings for transaction records
    pub fn timestamp_format(&self) -> Result<TimestampFormat> {
        Ok(TimestampFormat::new(
            self.session.timestamp_format.clone(),
            self.utc_offset()?,
        ))
    }
}

/// Substitute environment variables in the format ${VAR_NAME}
fn substitute_env_vars(input: &str) -> String {
    let mut result = input.to_string();
    let re = regex::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").unwrap();

    for cap in re.captures_iter(input) {
        let var_name = &cap[1];
        let var_value = env::var(var_name).unwrap_or_default();
        result = result.replace(&cap[0], &var_value);
    }

    result
}
