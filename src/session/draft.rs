//! Transaction draft entered by the user

use crate::error::SessionError;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Not-yet-submitted transfer parameters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Draft {
    pub address_to: String,
    /// Decimal ether amount, e.g. "0.01"
    pub amount: String,
    pub keyword: String,
    pub message: String,
}

/// A single editable draft field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftField {
    AddressTo,
    Amount,
    Keyword,
    Message,
}

impl Draft {
    /// Replace one field, leaving the others untouched
    pub fn set(&mut self, field: DraftField, value: String) {
        match field {
            DraftField::AddressTo => self.address_to = value,
            DraftField::Amount => self.amount = value,
            DraftField::Keyword => self.keyword = value,
            DraftField::Message => self.message = value,
        }
    }
}

impl FromStr for DraftField {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "addressTo" | "address_to" => Ok(DraftField::AddressTo),
            "amount" => Ok(DraftField::Amount),
            "keyword" => Ok(DraftField::Keyword),
            "message" => Ok(DraftField::Message),
            other => Err(SessionError::InvalidDraft(format!("unknown field {:?}", other))),
        }
    }
}

impl fmt::Display for DraftField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DraftField::AddressTo => "addressTo",
            DraftField::Amount => "amount",
            DraftField::Keyword => "keyword",
            DraftField::Message => "message",
        };
        f.write_str(name)
    }
}
