//! Domain newtypes with validation
//!
//! This module provides strongly-typed wrappers for domain identifiers and values.
//! Each newtype ensures data validity at construction time.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::DomainError;

// ============================================================================
// ExternalId
// ============================================================================

/// Identifier assigned by the upstream accounting system
///
/// Stable across syncs and used as the idempotency key for upserts
/// (contact ID, invoice ID, bank-transaction ID). Xero issues GUIDs, but
/// the value is treated as an opaque non-empty string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ExternalId(String);

impl ExternalId {
    /// Create a new ExternalId
    ///
    /// Surrounding whitespace is trimmed.
    ///
    /// # Errors
    /// Returns error if the ID is empty or contains whitespace/control characters
    pub fn new(id: impl Into<String>) -> Result<Self, DomainError> {
        let id = id.into();
        let trimmed = id.trim();

        if trimmed.is_empty() {
            return Err(DomainError::InvalidExternalId(
                "External ID cannot be empty".to_string(),
            ));
        }

        if trimmed.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(DomainError::InvalidExternalId(format!(
                "External ID contains invalid characters: {trimmed}"
            )));
        }

        Ok(Self(trimmed.to_string()))
    }

    /// Xero uses the all-zero GUID to mean "no contact"
    #[must_use]
    pub fn is_empty_guid(&self) -> bool {
        self.0 == "00000000-0000-0000-0000-000000000000"
    }

    /// Get the inner string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ExternalId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ExternalId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for ExternalId {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<ExternalId> for String {
    fn from(id: ExternalId) -> Self {
        id.0
    }
}

// ============================================================================
// UserId
// ============================================================================

/// Owner of an OAuth connection and of the stored sync cursors
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

impl UserId {
    /// Create a new UserId
    ///
    /// # Errors
    /// Returns error if the ID is empty or longer than 128 characters
    pub fn new(id: impl Into<String>) -> Result<Self, DomainError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(DomainError::InvalidUserId(
                "User ID cannot be empty".to_string(),
            ));
        }
        if id.len() > 128 {
            return Err(DomainError::InvalidUserId(format!(
                "User ID too long ({} chars, max 128)",
                id.len()
            )));
        }
        Ok(Self(id))
    }

    /// Get the inner string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for UserId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for UserId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for UserId {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<UserId> for String {
    fn from(id: UserId) -> Self {
        id.0
    }
}

// ============================================================================
// RunId
// ============================================================================

/// Identifier of one sync-driver run, used to correlate log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(Uuid);

impl RunId {
    /// Create a new random RunId
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for RunId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// EntityKind
// ============================================================================

/// The upstream entity types that are synchronized
///
/// [`EntityKind::ALL`] is also the processing order of one chunk
/// invocation: customers are written before the invoices and bank
/// transactions that reference them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Customers,
    Invoices,
    BankTransactions,
}

impl EntityKind {
    /// All entity kinds in processing order
    pub const ALL: [EntityKind; 3] = [
        EntityKind::Customers,
        EntityKind::Invoices,
        EntityKind::BankTransactions,
    ];

    /// Stable storage/wire name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Customers => "customers",
            EntityKind::Invoices => "invoices",
            EntityKind::BankTransactions => "bank_transactions",
        }
    }

    /// Human-readable label used in progress messages
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            EntityKind::Customers => "customers",
            EntityKind::Invoices => "invoices",
            EntityKind::BankTransactions => "bank transactions",
        }
    }
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customers" => Ok(EntityKind::Customers),
            "invoices" => Ok(EntityKind::Invoices),
            "bank_transactions" => Ok(EntityKind::BankTransactions),
            other => Err(DomainError::UnknownEntityKind(other.to_string())),
        }
    }
}
