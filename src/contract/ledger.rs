//! `TransferLedger` backed by the deployed Transactions contract

use super::{Confirmation, LedgerEntry, RawTransfer, TransferLedger};
use crate::error::{SessionError, SessionResult};
use crate::metrics;

use async_trait::async_trait;
use ethers::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

abigen!(TransactionsContract, "abi/Transactions.json");

/// Contract client that sends state-changing calls through the wallet provider
pub struct ContractLedger {
    contract: TransactionsContract<Provider<Http>>,
    provider: Arc<Provider<Http>>,
    /// Confirmations to wait for before a record counts as settled
    confirmations: usize,
    poll_interval: Duration,
}

impl ContractLedger {
    pub fn new(
        address: Address,
        provider: Arc<Provider<Http>>,
        confirmations: usize,
        poll_interval: Duration,
    ) -> Self {
        let contract = TransactionsContract::new(address, provider.clone());

        Self {
            contract,
            provider,
            confirmations,
            poll_interval,
        }
    }

    /// Contract address
    pub fn address(&self) -> Address {
        self.contract.address()
    }
}

#[async_trait]
impl TransferLedger for ContractLedger {
    async fn add_to_blockchain(&self, from: Address, entry: LedgerEntry) -> SessionResult<H256> {
        let receiver: Address = entry.receiver.trim().parse().map_err(|e| {
            SessionError::InvalidDraft(format!("invalid recipient {:?}: {}", entry.receiver, e))
        })?;

        let call = self
            .contract
            .add_to_blockchain(receiver, entry.amount, entry.message, entry.keyword)
            .from(from);

        metrics::record_wallet_request("eth_sendTransaction");
        let tx_hash = {
            let pending = call.send().await.map_err(SessionError::from_contract)?;
            pending.tx_hash()
        };

        info!("addToBlockchain submitted: {:?}", tx_hash);
        Ok(tx_hash)
    }

    async fn wait_for_confirmation(&self, tx_hash: H256) -> SessionResult<Confirmation> {
        debug!(
            "Waiting for {} confirmation(s) of {:?}",
            self.confirmations, tx_hash
        );

        let receipt = PendingTransaction::new(tx_hash, self.provider.as_ref())
            .interval(self.poll_interval)
            .confirmations(self.confirmations)
            .await
            .map_err(SessionError::from_provider)?;

        match receipt {
            Some(receipt) if receipt.status == Some(1.into()) => Ok(Confirmation {
                tx_hash,
                block_number: receipt.block_number.map(|b| b.as_u64()),
            }),
            Some(receipt) => {
                warn!(
                    "Transaction {:?} reverted in block {:?}",
                    tx_hash, receipt.block_number
                );
                Err(SessionError::ContractRevert {
                    source: format!("transaction {:?} reverted", tx_hash).into(),
                })
            }
            None => Err(SessionError::Network {
                source: format!("transaction {:?} dropped from mempool", tx_hash).into(),
            }),
        }
    }

    async fn get_transaction_count(&self, account: Address) -> SessionResult<U256> {
        self.contract
            .get_transaction_count(account)
            .from(account)
            .call()
            .await
            .map_err(SessionError::from_contract)
    }

    async fn get_all_transactions(&self) -> SessionResult<Vec<RawTransfer>> {
        let transfers = self
            .contract
            .get_all_transactions()
            .call()
            .await
            .map_err(SessionError::from_contract)?;

        debug!("Contract returned {} transfers", transfers.len());

        Ok(transfers
            .into_iter()
            .map(|t| RawTransfer {
                sender: t.sender,
                receiver: t.receiver,
                amount: t.amount,
                message: t.message,
                timestamp: t.timestamp,
                keyword: t.keyword,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unreachable_ledger() -> ContractLedger {
        let provider = Provider::<Http>::try_from("http://127.0.0.1:1").unwrap();
        ContractLedger::new(
            Address::repeat_byte(0x11),
            Arc::new(provider),
            1,
            Duration::from_millis(10),
        )
    }

    fn sends() -> f64 {
        metrics::WALLET_REQUESTS
            .with_label_values(&["eth_sendTransaction"])
            .get()
    }

    #[tokio::test]
    async fn test_failed_send_is_counted() {
        let before = sends();
        let entry = LedgerEntry {
            receiver: format!("{:?}", Address::repeat_byte(0xbb)),
            amount: U256::exp10(16),
            message: "hi".to_string(),
            keyword: String::new(),
        };

        let result = unreachable_ledger()
            .add_to_blockchain(Address::repeat_byte(0xaa), entry)
            .await;

        assert!(result.is_err());
        assert!(sends() >= before + 1.0);
    }

    #[tokio::test]
    async fn test_invalid_receiver_rejected_before_send() {
        let entry = LedgerEntry {
            receiver: "0xabc".to_string(),
            amount: U256::one(),
            message: String::new(),
            keyword: String::new(),
        };

        let result = unreachable_ledger()
            .add_to_blockchain(Address::repeat_byte(0xaa), entry)
            .await;

        assert!(matches!(result, Err(SessionError::InvalidDraft(_))));
    }
}
