//! Wallet speaking EIP-1193 JSON-RPC methods over an HTTP provider

use super::{ValueTransfer, Wallet};
use crate::error::{SessionError, SessionResult};
use crate::metrics;

use async_trait::async_trait;
use ethers::providers::{Http, Provider};
use ethers::types::{Address, H256};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;
use std::sync::Arc;
use tracing::debug;

/// Wallet provider reachable over JSON-RPC (browser bridge, Hardhat, Anvil)
pub struct Eip1193Wallet {
    provider: Arc<Provider<Http>>,
}

impl Eip1193Wallet {
    pub fn new(provider: Arc<Provider<Http>>) -> Self {
        Self { provider }
    }

    /// Forward a `request({method, params})` call to the provider
    async fn request<T, R>(&self, method: &'static str, params: T) -> SessionResult<R>
    where
        T: Debug + Serialize + Send + Sync,
        R: Serialize + DeserializeOwned + Debug + Send,
    {
        debug!("Wallet request {}", method);
        metrics::record_wallet_request(method);

        self.provider
            .request(method, params)
            .await
            .map_err(SessionError::from_provider)
    }
}

#[async_trait]
impl Wallet for Eip1193Wallet {
    async fn list_accounts(&self) -> SessionResult<Vec<Address>> {
        self.request("eth_accounts", ()).await
    }

    async fn request_accounts(&self) -> SessionResult<Vec<Address>> {
        self.request("eth_requestAccounts", ()).await
    }

    async fn send_value_transfer(&self, request: ValueTransfer) -> SessionResult<H256> {
        self.request("eth_sendTransaction", [request]).await
    }
}
