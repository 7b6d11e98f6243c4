//! Session manager: wallet account, draft, submission and history

use super::draft::{Draft, DraftField};
use crate::contract::LedgerEntry;
use crate::error::{SessionError, SessionResult};
use crate::history::{parse_amount, shorten_address, TimestampFormat, TransactionRecord};
use crate::metrics;
use crate::storage::{LocalStore, TRANSACTION_COUNT_KEY};
use crate::wallet::{ValueTransfer, WalletHandle};

use ethers::types::{Address, H256, U256};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{watch, RwLock};
use tracing::{debug, error, info, warn};

/// Notice shown when no wallet provider is available
pub const INSTALL_WALLET_NOTICE: &str = "Please install MetaMask";

#[derive(Debug, Default)]
struct SessionState {
    current_account: Option<Address>,
    draft: Draft,
    transactions: Vec<TransactionRecord>,
    /// Last known transaction count, as persisted
    cached_count: Option<String>,
    notice: Option<String>,
}

/// Everything the presentation layer renders
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub current_account: Option<Address>,
    pub account_label: Option<String>,
    pub is_loading: bool,
    pub transaction_count: Option<String>,
    pub form_data: Draft,
    pub transactions: Vec<TransactionRecord>,
    pub notice: Option<String>,
}

/// Outcome of a confirmed submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub transfer_hash: H256,
    pub record_hash: H256,
    pub block_number: Option<u64>,
    pub transaction_count: U256,
}

/// The single wallet/transaction session
pub struct TransactionSession {
    /// Injected wallet; `None` when no provider is installed
    handle: Option<WalletHandle>,
    store: Arc<dyn LocalStore>,
    timestamps: TimestampFormat,
    state: RwLock<SessionState>,
    /// Submissions awaiting confirmation; loading while non-zero
    pending: watch::Sender<usize>,
}

/// One submission awaiting confirmation, released on drop
struct PendingConfirmation<'a> {
    pending: &'a watch::Sender<usize>,
}

impl<'a> PendingConfirmation<'a> {
    fn begin(pending: &'a watch::Sender<usize>) -> Self {
        pending.send_modify(|count| *count += 1);
        metrics::record_pending(*pending.borrow());
        Self { pending }
    }
}

impl Drop for PendingConfirmation<'_> {
    fn drop(&mut self) {
        self.pending
            .send_modify(|count| *count = count.saturating_sub(1));
        metrics::record_pending(*self.pending.borrow());
    }
}

impl TransactionSession {
    /// Create a session, restoring the cached transaction count if present
    pub async fn new(
        handle: Option<WalletHandle>,
        store: Arc<dyn LocalStore>,
        timestamps: TimestampFormat,
    ) -> Self {
        let cached_count = match store.get(TRANSACTION_COUNT_KEY).await {
            Ok(value) => value,
            Err(e) => {
                warn!("Failed to read cached transaction count: {}", e);
                None
            }
        };

        let (pending, _) = watch::channel(0);

        Self {
            handle,
            store,
            timestamps,
            state: RwLock::new(SessionState {
                cached_count,
                ..SessionState::default()
            }),
            pending,
        }
    }

    /// Adopt an already-authorized account without prompting, then load history
    pub async fn check_existing_authorization(&self) -> SessionResult<Option<Address>> {
        let result = self.try_check_existing_authorization().await;
        log_failure("check_existing_authorization", result)
    }

    async fn try_check_existing_authorization(&self) -> SessionResult<Option<Address>> {
        let handle = self.detect_wallet().await?;
        let accounts = handle.wallet.list_accounts().await?;

        match accounts.first().copied() {
            Some(account) => {
                self.adopt_account(account).await;
                self.refresh_with(handle).await?;
                Ok(Some(account))
            }
            None => {
                info!("No accounts found");
                Ok(None)
            }
        }
    }

    /// Ask the wallet to authorize an account
    pub async fn connect(&self) -> SessionResult<Option<Address>> {
        let result = self.try_connect().await;
        log_failure("connect", result)
    }

    async fn try_connect(&self) -> SessionResult<Option<Address>> {
        let handle = self.detect_wallet().await?;
        let accounts = handle.wallet.request_accounts().await?;

        match accounts.first().copied() {
            Some(account) => {
                self.adopt_account(account).await;
                Ok(Some(account))
            }
            None => {
                warn!("Wallet authorized no accounts");
                Ok(None)
            }
        }
    }

    /// Send the drafted transfer and record it on the contract
    pub async fn submit_transaction(&self) -> SessionResult<Submission> {
        let result = self.try_submit_transaction().await;
        log_failure("submit_transaction", result)
    }

    async fn try_submit_transaction(&self) -> SessionResult<Submission> {
        let handle = self.detect_wallet().await?;
        let from = self.require_account().await?;
        let draft = self.state.read().await.draft.clone();
        let amount = parse_amount(&draft.amount)?;
        let receiver = draft.address_to.trim().to_string();

        let transfer_hash = handle
            .wallet
            .send_value_transfer(ValueTransfer::new(from, receiver.clone(), amount))
            .await?;
        info!(
            "Value transfer {:?} sent from {} to {}",
            transfer_hash,
            shorten_address(&from),
            receiver
        );

        let entry = LedgerEntry {
            receiver,
            amount,
            message: draft.message,
            keyword: draft.keyword,
        };
        let record_hash = handle.ledger.add_to_blockchain(from, entry).await?;

        let started = Instant::now();
        let confirmation = {
            let _pending = PendingConfirmation::begin(&self.pending);
            handle.ledger.wait_for_confirmation(record_hash).await?
        };

        metrics::record_confirmation_latency(started.elapsed().as_secs_f64());
        metrics::record_submission();
        info!(
            "Record {:?} confirmed in block {:?}",
            confirmation.tx_hash, confirmation.block_number
        );

        let transaction_count = self.sync_count_with(handle, from).await?;
        self.refresh_with(handle).await?;

        Ok(Submission {
            transfer_hash,
            record_hash,
            block_number: confirmation.block_number,
            transaction_count,
        })
    }

    /// Reload the full transfer history from the contract
    pub async fn refresh_history(&self) -> SessionResult<Vec<TransactionRecord>> {
        let result = self.try_refresh_history().await;
        log_failure("refresh_history", result)
    }

    async fn try_refresh_history(&self) -> SessionResult<Vec<TransactionRecord>> {
        let handle = self.detect_wallet().await?;
        self.require_account().await?;
        self.refresh_with(handle).await
    }

    /// Read the authoritative transaction count and cache it locally
    pub async fn sync_cached_count(&self) -> SessionResult<U256> {
        let result = self.try_sync_cached_count().await;
        log_failure("sync_cached_count", result)
    }

    async fn try_sync_cached_count(&self) -> SessionResult<U256> {
        let handle = self.detect_wallet().await?;
        let account = self.require_account().await?;
        self.sync_count_with(handle, account).await
    }

    pub async fn draft(&self) -> Draft {
        self.state.read().await.draft.clone()
    }

    pub async fn set_draft(&self, draft: Draft) {
        self.state.write().await.draft = draft;
    }

    /// Update one draft field, as a form input change would
    pub async fn handle_change(&self, field: DraftField, value: String) -> Draft {
        let mut state = self.state.write().await;
        state.draft.set(field, value);
        debug!("Draft field {} updated", field);
        state.draft.clone()
    }

    pub async fn transactions(&self) -> Vec<TransactionRecord> {
        self.state.read().await.transactions.clone()
    }

    pub async fn current_account(&self) -> Option<Address> {
        self.state.read().await.current_account
    }

    pub fn is_loading(&self) -> bool {
        *self.pending.borrow() > 0
    }

    /// Watch the number of submissions awaiting confirmation
    pub fn pending_updates(&self) -> watch::Receiver<usize> {
        self.pending.subscribe()
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let state = self.state.read().await;

        SessionSnapshot {
            current_account: state.current_account,
            account_label: state.current_account.as_ref().map(shorten_address),
            is_loading: self.is_loading(),
            transaction_count: state.cached_count.clone(),
            form_data: state.draft.clone(),
            transactions: state.transactions.clone(),
            notice: state.notice.clone(),
        }
    }

    async fn detect_wallet(&self) -> SessionResult<&WalletHandle> {
        match &self.handle {
            Some(handle) => Ok(handle),
            None => {
                warn!("{}", INSTALL_WALLET_NOTICE);
                self.state.write().await.notice = Some(INSTALL_WALLET_NOTICE.to_string());
                Err(SessionError::WalletUnavailable)
            }
        }
    }

    async fn require_account(&self) -> SessionResult<Address> {
        self.state
            .read()
            .await
            .current_account
            .ok_or(SessionError::NotConnected)
    }

    async fn adopt_account(&self, account: Address) {
        self.state.write().await.current_account = Some(account);
        info!("Using account {}", shorten_address(&account));
    }

    async fn sync_count_with(&self, handle: &WalletHandle, account: Address) -> SessionResult<U256> {
        let count = handle.ledger.get_transaction_count(account).await?;
        let value = count.to_string();

        // Best-effort: the cache is advisory
        if let Err(e) = self.store.set(TRANSACTION_COUNT_KEY, &value).await {
            warn!("Failed to cache transaction count: {}", e);
        }

        self.state.write().await.cached_count = Some(value);
        debug!("Transaction count for {}: {}", shorten_address(&account), count);
        Ok(count)
    }

    async fn refresh_with(&self, handle: &WalletHandle) -> SessionResult<Vec<TransactionRecord>> {
        let records: Vec<TransactionRecord> = handle
            .ledger
            .get_all_transactions()
            .await?
            .into_iter()
            .map(|raw| TransactionRecord::from_raw(raw, &self.timestamps))
            .collect();

        metrics::record_history_size(records.len());
        self.state.write().await.transactions = records.clone();

        debug!("Loaded {} transactions", records.len());
        Ok(records)
    }
}

fn log_failure<T>(operation: &'static str, result: SessionResult<T>) -> SessionResult<T> {
    if let Err(e) = &result {
        error!("{} failed: {}", operation, e);
        metrics::record_failure(operation, e.kind());
    }
    result
}
