//! Customer (contact) records
//!
//! A [`Customer`] mirrors one upstream contact. Rows are created and
//! updated by sync upserts keyed on [`Customer::external_id`] and are
//! never deleted by the pipeline.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::newtypes::ExternalId;

/// Lifecycle status of a contact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactStatus {
    Active,
    Archived,
}

impl ContactStatus {
    /// Storage name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ContactStatus::Active => "active",
            ContactStatus::Archived => "archived",
        }
    }

    /// Parse the upstream wire value (`ACTIVE`, `ARCHIVED`, `GDPRREQUEST`)
    ///
    /// GDPR-request contacts are anonymised upstream and treated as archived.
    pub fn from_wire(value: &str) -> Result<Self, DomainError> {
        match value.trim().to_ascii_uppercase().as_str() {
            "ACTIVE" => Ok(ContactStatus::Active),
            "ARCHIVED" | "GDPRREQUEST" => Ok(ContactStatus::Archived),
            _ => Err(DomainError::UnknownVariant {
                kind: "contact status",
                value: value.to_string(),
            }),
        }
    }
}

impl Display for ContactStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContactStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(ContactStatus::Active),
            "archived" => Ok(ContactStatus::Archived),
            other => Err(DomainError::UnknownVariant {
                kind: "contact status",
                value: other.to_string(),
            }),
        }
    }
}

/// A structured phone number
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhoneNumber {
    /// Upstream phone type (`DEFAULT`, `MOBILE`, `DDI`, `FAX`), if known
    pub kind: Option<String>,
    pub number: String,
    pub area_code: Option<String>,
    pub country_code: Option<String>,
}

impl PhoneNumber {
    /// Number with country and area codes prepended when present
    #[must_use]
    pub fn display(&self) -> String {
        [
            self.country_code.as_deref(),
            self.area_code.as_deref(),
            Some(self.number.as_str()),
        ]
        .into_iter()
        .flatten()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
    }
}

/// A structured postal or street address
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    /// Upstream address type (`POBOX`, `STREET`), if known
    pub kind: Option<String>,
    pub lines: Vec<String>,
    pub city: Option<String>,
    pub region: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
}

impl Address {
    /// True when no component carries any text
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.lines.iter().all(|l| l.trim().is_empty())
            && [
                &self.city,
                &self.region,
                &self.postal_code,
                &self.country,
            ]
            .iter()
            .all(|part| part.as_deref().map_or(true, |s| s.trim().is_empty()))
    }
}

/// Reference to an upstream tracking category option
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingCategoryRef {
    pub category: String,
    pub option: Option<String>,
}

/// A customer as persisted by the record store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub external_id: ExternalId,
    pub name: String,
    pub email: Option<String>,
    pub phones: Vec<PhoneNumber>,
    pub addresses: Vec<Address>,
    pub status: ContactStatus,
    pub is_supplier: bool,
    pub is_customer: bool,
    pub tracking_categories: Vec<TrackingCategoryRef>,
}
