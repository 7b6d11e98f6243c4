//! Transfer history normalization
//!
//! Converts raw records returned by the Transactions contract into the shape
//! rendered by the UI: ether amounts instead of wei, formatted timestamps and
//! an optional keyword.

use crate::contract::RawTransfer;
use crate::error::{SessionError, SessionResult};

use chrono::{DateTime, FixedOffset, Offset, Utc};
use ethers::types::{Address, U256};
use ethers::utils::{format_ether, parse_ether, to_checksum};
use serde::Serialize;

/// A transfer as recorded by the contract, normalized for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    pub address_from: Address,
    pub address_to: Address,
    pub message: String,
    pub keyword: Option<String>,
    /// Ether value, e.g. "0.01"
    pub amount: String,
    pub amount_wei: U256,
    pub timestamp: String,
}

impl TransactionRecord {
    pub fn from_raw(raw: RawTransfer, timestamps: &TimestampFormat) -> Self {
        let keyword = if raw.keyword.is_empty() {
            None
        } else {
            Some(raw.keyword)
        };

        Self {
            address_from: raw.sender,
            address_to: raw.receiver,
            message: raw.message,
            keyword,
            amount: format_amount(raw.amount),
            amount_wei: raw.amount,
            timestamp: timestamps.format_u256(raw.timestamp),
        }
    }
}

/// Render a wei amount as an ether string without trailing zeros
pub fn format_amount(wei: U256) -> String {
    let formatted = format_ether(wei);

    if formatted.contains('.') {
        formatted
            .trim_end_matches('0')
            .trim_end_matches('.')
            .to_string()
    } else {
        formatted
    }
}

/// Parse a user-entered ether amount into wei
pub fn parse_amount(amount: &str) -> SessionResult<U256> {
    let amount = amount.trim();
    if amount.is_empty() {
        return Err(SessionError::InvalidDraft("amount is empty".to_string()));
    }

    parse_ether(amount)
        .map_err(|e| SessionError::InvalidDraft(format!("invalid amount {:?}: {}", amount, e)))
}

/// Timestamp rendering: a strftime pattern applied at a fixed UTC offset
#[derive(Debug, Clone)]
pub struct TimestampFormat {
    pattern: String,
    offset: FixedOffset,
}

impl TimestampFormat {
    pub fn new(pattern: impl Into<String>, offset: FixedOffset) -> Self {
        Self {
            pattern: pattern.into(),
            offset,
        }
    }

    /// Format epoch seconds. Out-of-range values fall back to the raw number.
    pub fn format(&self, epoch_secs: i64) -> String {
        match DateTime::<Utc>::from_timestamp(epoch_secs, 0) {
            Some(at) => at
                .with_timezone(&self.offset)
                .format(&self.pattern)
                .to_string(),
            None => epoch_secs.to_string(),
        }
    }

    fn format_u256(&self, epoch_secs: U256) -> String {
        if epoch_secs > U256::from(i64::MAX as u64) {
            return epoch_secs.to_string();
        }
        self.format(epoch_secs.as_u64() as i64)
    }
}

impl Default for TimestampFormat {
    /// en-US style, e.g. "1/1/2022, 12:00:00 AM", in UTC
    fn default() -> Self {
        Self::new("%-m/%-d/%Y, %-I:%M:%S %p", Utc.fix())
    }
}

/// Abbreviate an address as 0x1234...abcd
pub fn shorten_address(address: &Address) -> String {
    let full = to_checksum(address, None);
    format!("{}...{}", &full[..6], &full[full.len() - 4..])
}
