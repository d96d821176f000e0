//! Per-entity page requests and response envelopes
//!
//! Each entity kind maps to one Xero collection endpoint. A page request
//! always carries `page` and `pageSize`; invoices and bank transactions
//! additionally carry their configured `where`/`order` filters.

use ledgersync_core::config::SyncConfig;
use ledgersync_core::domain::EntityKind;
use serde_json::Value;

use crate::XeroError;

/// Collection path relative to the accounting API base URL
pub fn endpoint(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Customers => "/Contacts",
        EntityKind::Invoices => "/Invoices",
        EntityKind::BankTransactions => "/BankTransactions",
    }
}

/// Top-level key wrapping the records in a collection response
pub fn envelope_key(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Customers => "Contacts",
        EntityKind::Invoices => "Invoices",
        EntityKind::BankTransactions => "BankTransactions",
    }
}

/// Filters attached to page requests
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageFilters {
    pub invoice_where: Option<String>,
    pub invoice_order: Option<String>,
    pub bank_transaction_where: Option<String>,
}

impl From<&SyncConfig> for PageFilters {
    fn from(config: &SyncConfig) -> Self {
        fn non_blank(s: &str) -> Option<String> {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Self {
            invoice_where: non_blank(&config.invoice_where),
            invoice_order: non_blank(&config.invoice_order),
            bank_transaction_where: non_blank(&config.bank_transaction_where),
        }
    }
}

impl PageFilters {
    /// Query parameters for one page of `kind`
    pub fn query(&self, kind: EntityKind, page: u32, page_size: u32) -> Vec<(&'static str, String)> {
        let mut query = vec![("page", page.to_string()), ("pageSize", page_size.to_string())];
        match kind {
            EntityKind::Customers => {}
            EntityKind::Invoices => {
                if let Some(w) = &self.invoice_where {
                    query.push(("where", w.clone()));
                }
                if let Some(o) = &self.invoice_order {
                    query.push(("order", o.clone()));
                }
            }
            EntityKind::BankTransactions => {
                if let Some(w) = &self.bank_transaction_where {
                    query.push(("where", w.clone()));
                }
            }
        }
        query
    }
}

/// Extracts the record array from a collection response
///
/// A missing or `null` envelope is an empty page; anything else that is
/// not an array is a malformed response.
pub fn records_from_envelope(kind: EntityKind, body: Value) -> Result<Vec<Value>, XeroError> {
    let key = envelope_key(kind);
    let Value::Object(mut map) = body else {
        return Err(XeroError::InvalidResponse(format!(
            "{key}: expected a JSON object"
        )));
    };
    match map.remove(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(records)) => Ok(records),
        Some(_) => Err(XeroError::InvalidResponse(format!(
            "{key}: expected an array"
        ))),
    }
}
