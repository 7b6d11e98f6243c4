//! Error types for the wallet session

use ethers::contract::ContractError;
use ethers::providers::{Http, Provider, ProviderError, RpcError};
use thiserror::Error;

/// Boxed underlying cause carried by error variants
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// EIP-1193 "user rejected the request"
const USER_REJECTED_CODE: i64 = 4001;
/// Geth-style "execution reverted"
const EXECUTION_REVERTED_CODE: i64 = 3;

/// Main error type for session operations
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("No wallet provider found. Please install MetaMask")]
    WalletUnavailable,

    #[error("Request rejected by user: {source}")]
    UserRejected { source: BoxError },

    #[error("Network failure: {source}")]
    Network { source: BoxError },

    #[error("Contract reverted: {source}")]
    ContractRevert { source: BoxError },

    #[error("No authorized wallet account")]
    NotConnected,

    #[error("Invalid draft: {0}")]
    InvalidDraft(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// How a JSON-RPC error response should be surfaced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RpcFailure {
    UserRejected,
    Revert,
    Other,
}

/// Classify a JSON-RPC error by code and message
pub fn classify_rpc(code: i64, message: &str) -> RpcFailure {
    let message = message.to_lowercase();

    if code == USER_REJECTED_CODE
        || message.contains("user denied")
        || message.contains("user rejected")
    {
        RpcFailure::UserRejected
    } else if code == EXECUTION_REVERTED_CODE || message.contains("revert") {
        RpcFailure::Revert
    } else {
        RpcFailure::Other
    }
}

impl SessionError {
    /// Map a provider error onto the session taxonomy
    pub fn from_provider(err: ProviderError) -> Self {
        let failure = err
            .as_error_response()
            .map(|resp| classify_rpc(resp.code, &resp.message))
            .unwrap_or(RpcFailure::Other);

        Self::from_failure(failure, Box::new(err))
    }

    /// Map a contract call error onto the session taxonomy
    pub fn from_contract(err: ContractError<Provider<Http>>) -> Self {
        let failure = match &err {
            ContractError::Revert(_) => RpcFailure::Revert,
            ContractError::MiddlewareError { e } | ContractError::ProviderError { e } => e
                .as_error_response()
                .map(|resp| classify_rpc(resp.code, &resp.message))
                .unwrap_or(RpcFailure::Other),
            // ABI and decoding failures mean the contract answered with something unexpected
            _ => RpcFailure::Revert,
        };

        Self::from_failure(failure, Box::new(err))
    }

    fn from_failure(failure: RpcFailure, source: BoxError) -> Self {
        match failure {
            RpcFailure::UserRejected => SessionError::UserRejected { source },
            RpcFailure::Revert => SessionError::ContractRevert { source },
            RpcFailure::Other => SessionError::Network { source },
        }
    }

    /// Short label for logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            SessionError::WalletUnavailable => "wallet_unavailable",
            SessionError::UserRejected { .. } => "user_rejected",
            SessionError::Network { .. } => "network",
            SessionError::ContractRevert { .. } => "contract_revert",
            SessionError::NotConnected => "not_connected",
            SessionError::InvalidDraft(_) => "invalid_draft",
            SessionError::Storage(_) => "storage",
            SessionError::Config(_) => "config",
        }
    }
}

/// Result type for session operations
pub type SessionResult<T> = Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_user_rejection() {
        assert_eq!(classify_rpc(4001, "whatever"), RpcFailure::UserRejected);
        assert_eq!(
            classify_rpc(-32603, "MetaMask Tx Signature: User denied transaction signature."),
            RpcFailure::UserRejected
        );
    }

    #[test]
    fn test_classify_revert() {
        assert_eq!(classify_rpc(3, "execution reverted"), RpcFailure::Revert);
        assert_eq!(
            classify_rpc(-32000, "VM Exception while processing transaction: revert"),
            RpcFailure::Revert
        );
    }

    #[test]
    fn test_classify_other() {
        assert_eq!(classify_rpc(-32000, "insufficient funds for gas"), RpcFailure::Other);
        assert_eq!(classify_rpc(-32601, "method not found"), RpcFailure::Other);
    }

    #[test]
    fn test_variants_keep_their_cause() {
        let err = SessionError::from_failure(RpcFailure::Other, "connection refused".into());
        assert_eq!(err.kind(), "network");
        assert!(std::error::Error::source(&err).is_some());
        assert_eq!(err.to_string(), "Network failure: connection refused");
    }
}
