//! Wallet/transaction session
//!
//! Holds the authorized account, the transaction draft, the loading flag and
//! the transfer history fetched from the contract.

mod draft;
mod manager;

pub use draft::{Draft, DraftField};
pub use manager::{SessionSnapshot, Submission, TransactionSession};
