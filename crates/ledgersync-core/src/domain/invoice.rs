//! Invoice records
//!
//! Synced fields are owned by the upsert writer. The derived
//! `work_description` and `service_keywords` columns are owned by the
//! enrichment pipeline and are never touched by a sync upsert.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::newtypes::ExternalId;

/// Receivable (sales) or payable (bill)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceType {
    Receivable,
    Payable,
}

impl InvoiceType {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            InvoiceType::Receivable => "receivable",
            InvoiceType::Payable => "payable",
        }
    }

    /// Parse the upstream wire value (`ACCREC`, `ACCPAY`)
    pub fn from_wire(value: &str) -> Result<Self, DomainError> {
        match value.trim().to_ascii_uppercase().as_str() {
            "ACCREC" => Ok(InvoiceType::Receivable),
            "ACCPAY" => Ok(InvoiceType::Payable),
            _ => Err(DomainError::UnknownVariant {
                kind: "invoice type",
                value: value.to_string(),
            }),
        }
    }
}

impl Display for InvoiceType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InvoiceType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "receivable" => Ok(InvoiceType::Receivable),
            "payable" => Ok(InvoiceType::Payable),
            other => Err(DomainError::UnknownVariant {
                kind: "invoice type",
                value: other.to_string(),
            }),
        }
    }
}

/// Upstream invoice status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Draft,
    Submitted,
    Authorised,
    Paid,
    Voided,
    Deleted,
}

impl InvoiceStatus {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Submitted => "submitted",
            InvoiceStatus::Authorised => "authorised",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Voided => "voided",
            InvoiceStatus::Deleted => "deleted",
        }
    }

    /// Parse the upstream wire value (`DRAFT`, `SUBMITTED`, `AUTHORISED`, ...)
    pub fn from_wire(value: &str) -> Result<Self, DomainError> {
        value.trim().to_ascii_lowercase().parse()
    }
}

impl Display for InvoiceStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InvoiceStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(InvoiceStatus::Draft),
            "submitted" => Ok(InvoiceStatus::Submitted),
            "authorised" => Ok(InvoiceStatus::Authorised),
            "paid" => Ok(InvoiceStatus::Paid),
            "voided" => Ok(InvoiceStatus::Voided),
            "deleted" => Ok(InvoiceStatus::Deleted),
            other => Err(DomainError::UnknownVariant {
                kind: "invoice status",
                value: other.to_string(),
            }),
        }
    }
}

/// One invoice line
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub description: Option<String>,
    pub quantity: f64,
    pub unit_amount: f64,
    pub line_amount: f64,
    pub account_code: Option<String>,
}

/// An invoice as written by the sync upsert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub external_id: ExternalId,
    pub invoice_number: Option<String>,
    pub reference: Option<String>,
    /// Counterparty; `None` when the contact is not a tracked customer
    pub customer_id: Option<ExternalId>,
    pub invoice_type: InvoiceType,
    pub status: InvoiceStatus,
    pub currency_code: Option<String>,
    pub subtotal: f64,
    pub total_tax: f64,
    pub total: f64,
    pub total_discount: f64,
    pub amount_due: f64,
    pub amount_paid: f64,
    pub amount_credited: f64,
    pub issue_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub line_items: Vec<LineItem>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invoice_type_wire() {
        assert_eq!(
            InvoiceType::from_wire("ACCREC").unwrap(),
            InvoiceType::Receivable
        );
        assert_eq!(
            InvoiceType::from_wire("ACCPAY").unwrap(),
            InvoiceType::Payable
        );
        assert!(InvoiceType::from_wire("ACCRECCREDIT").is_err());
    }

    #[test]
    fn test_invoice_status_wire() {
        assert_eq!(
            InvoiceStatus::from_wire("AUTHORISED").unwrap(),
            InvoiceStatus::Authorised
        );
        assert_eq!(
            InvoiceStatus::from_wire(" paid ").unwrap(),
            InvoiceStatus::Paid
        );
        let err = InvoiceStatus::from_wire("PENDING").unwrap_err();
        assert!(err.to_string().contains("invoice status"));
    }

    #[test]
    fn test_status_storage_roundtrip() {
        for status in [
            InvoiceStatus::Draft,
            InvoiceStatus::Submitted,
            InvoiceStatus::Authorised,
            InvoiceStatus::Paid,
            InvoiceStatus::Voided,
            InvoiceStatus::Deleted,
        ] {
            assert_eq!(status.as_str().parse::<InvoiceStatus>().unwrap(), status);
        }
    }
}
