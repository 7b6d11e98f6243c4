//! Transactions contract boundary
//!
//! The session only needs four things from the contract: record a transfer,
//! wait for that record to be confirmed, read the sender's transfer count and
//! read every recorded transfer. `TransferLedger` captures exactly that so the
//! session can be driven by a mock in tests.

pub mod ledger;

pub use ledger::ContractLedger;

use crate::error::SessionResult;

use async_trait::async_trait;
use ethers::types::{Address, H256, U256};
#[cfg(test)]
use mockall::automock;

/// Raw transfer record as stored by the contract
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTransfer {
    pub sender: Address,
    pub receiver: Address,
    pub amount: U256,
    pub message: String,
    /// Epoch seconds of the block that recorded the transfer
    pub timestamp: U256,
    pub keyword: String,
}

/// Parameters of an `addToBlockchain` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    /// Recipient as entered; the contract binding validates it
    pub receiver: String,
    pub amount: U256,
    pub message: String,
    pub keyword: String,
}

/// A mined record-keeping transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation {
    pub tx_hash: H256,
    pub block_number: Option<u64>,
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait TransferLedger: Send + Sync {
    /// Submit `addToBlockchain` from `from`, returning the transaction hash
    async fn add_to_blockchain(&self, from: Address, entry: LedgerEntry) -> SessionResult<H256>;

    /// Block until the given transaction is mined
    async fn wait_for_confirmation(&self, tx_hash: H256) -> SessionResult<Confirmation>;

    async fn get_transaction_count(&self, account: Address) -> SessionResult<U256>;

    async fn get_all_transactions(&self) -> SessionResult<Vec<RawTransfer>>;
}
