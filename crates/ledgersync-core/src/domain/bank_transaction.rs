//! Bank transaction records

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::newtypes::ExternalId;

/// Money in or money out
///
/// Only plain receive/spend transactions are imported. Overpayments,
/// prepayments and transfers are filtered at fetch time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionDirection {
    Receive,
    Spend,
}

impl TransactionDirection {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            TransactionDirection::Receive => "receive",
            TransactionDirection::Spend => "spend",
        }
    }

    /// Parse the upstream `Type` field; `None` for every other type
    #[must_use]
    pub fn from_wire(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "RECEIVE" => Some(TransactionDirection::Receive),
            "SPEND" => Some(TransactionDirection::Spend),
            _ => None,
        }
    }
}

impl Display for TransactionDirection {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionDirection {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "receive" => Ok(TransactionDirection::Receive),
            "spend" => Ok(TransactionDirection::Spend),
            other => Err(DomainError::UnknownVariant {
                kind: "transaction direction",
                value: other.to_string(),
            }),
        }
    }
}

/// A bank transaction linked to a counterparty
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankTransaction {
    pub external_id: ExternalId,
    pub customer_id: Option<ExternalId>,
    pub direction: TransactionDirection,
    pub subtotal: f64,
    pub total_tax: f64,
    pub total: f64,
    pub is_reconciled: bool,
    pub reference: Option<String>,
    /// First line-item description, if any
    pub particulars: Option<String>,
    pub currency_code: Option<String>,
    pub transaction_date: Option<NaiveDate>,
}
