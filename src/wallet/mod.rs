//! Wallet provider capability
//!
//! This module provides:
//! - The `Wallet` trait: account discovery, authorization and value transfers
//! - `Eip1193Wallet`, speaking the wallet JSON-RPC methods over HTTP
//! - `WalletHandle`, the injected wallet plus the contract reached through it

pub mod provider;

pub use provider::Eip1193Wallet;

use crate::config::Settings;
use crate::contract::{ContractLedger, TransferLedger};
use crate::error::{SessionError, SessionResult};

use async_trait::async_trait;
use ethers::providers::{Http, Provider};
use ethers::types::{Address, H256, U256};
#[cfg(test)]
use mockall::automock;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Gas limit of a plain value transfer (0x5208)
pub const VALUE_TRANSFER_GAS: u64 = 21_000;

/// `eth_sendTransaction` parameters for a plain value transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValueTransfer {
    pub from: Address,
    /// Recipient as entered; the wallet validates it
    pub to: String,
    pub gas: U256,
    /// Amount in wei, serialized as a hex quantity
    pub value: U256,
}

impl ValueTransfer {
    pub fn new(from: Address, to: impl Into<String>, value: U256) -> Self {
        Self {
            from,
            to: to.into(),
            gas: U256::from(VALUE_TRANSFER_GAS),
            value,
        }
    }
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait Wallet: Send + Sync {
    /// Accounts already authorized for this origin (`eth_accounts`, no prompt)
    async fn list_accounts(&self) -> SessionResult<Vec<Address>>;

    /// Ask the user to authorize accounts (`eth_requestAccounts`)
    async fn request_accounts(&self) -> SessionResult<Vec<Address>>;

    /// Submit a value transfer (`eth_sendTransaction`)
    async fn send_value_transfer(&self, request: ValueTransfer) -> SessionResult<H256>;
}

/// An injected wallet together with the contract reached through it
#[derive(Clone)]
pub struct WalletHandle {
    pub wallet: Arc<dyn Wallet>,
    pub ledger: Arc<dyn TransferLedger>,
}

impl WalletHandle {
    pub fn new(wallet: Arc<dyn Wallet>, ledger: Arc<dyn TransferLedger>) -> Self {
        Self { wallet, ledger }
    }

    /// Build the handle from configuration. `None` when no wallet is configured.
    pub fn from_settings(settings: &Settings) -> SessionResult<Option<Self>> {
        let url = match settings.wallet_url() {
            Some(url) => url,
            None => return Ok(None),
        };

        let contract_address = settings
            .contract_address()
            .map_err(|e| SessionError::Config(e.to_string()))?;
        let poll_interval = Duration::from_millis(settings.wallet.poll_interval_ms);

        let provider = Provider::<Http>::try_from(url)
            .map_err(|e| SessionError::Config(format!("Invalid wallet URL {}: {}", url, e)))?
            .interval(poll_interval);
        let provider = Arc::new(provider);

        let wallet = Eip1193Wallet::new(provider.clone());
        let ledger = ContractLedger::new(
            contract_address,
            provider,
            settings.wallet.confirmations,
            poll_interval,
        );

        info!(
            "Wallet provider at {} using contract {:?}",
            url,
            ledger.address()
        );

        Ok(Some(Self::new(Arc::new(wallet), Arc::new(ledger))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_transfer_wire_format() {
        let from = Address::repeat_byte(0xaa);
        let request = ValueTransfer::new(from, "0xabc", U256::exp10(16));

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["gas"], "0x5208");
        assert_eq!(json["value"], "0x2386f26fc10000");
        assert_eq!(json["to"], "0xabc");
        assert_eq!(
            json["from"],
            "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"
        );
    }
}
