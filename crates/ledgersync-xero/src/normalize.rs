//! Mapping of Xero payloads into domain records
//!
//! Each raw record is decoded into its [`crate::wire`] type, which absorbs
//! the payload's loose typing (absent or `null` fields, several date
//! encodings, string amounts, phone/address collections of any shape).
//! This module then applies the domain rules so the rest of the pipeline
//! only sees domain types.
//!
//! Rules:
//! - Missing optional values default to `None`, an empty list or `false`.
//! - A record without its id, with an unknown status or type, or that is
//!   not an object is skipped with a warning; it never aborts the page.
//! - Bank transactions other than `RECEIVE`/`SPEND`, or without a real
//!   counterparty, are filtered out.

use ledgersync_core::domain::{
    Address, BankTransaction, ContactStatus, Customer, DomainError, EntityKind, ExternalId,
    Invoice, InvoiceStatus, InvoiceType, LineItem, PhoneNumber, TrackingCategoryRef,
    TransactionDirection,
};
use ledgersync_core::ports::RecordBatch;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use crate::wire::{
    AddressEntry, PhoneEntry, XeroBankTransaction, XeroContact, XeroContactRef, XeroInvoice,
    XeroLineItem, XeroTrackingCategory,
};

/// Why a single record was skipped
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("record has no {0}")]
    MissingId(&'static str),

    #[error(transparent)]
    Invalid(#[from] DomainError),

    #[error("malformed record: {0}")]
    Malformed(String),
}

fn decode<'a, T: Deserialize<'a>>(record: &'a Value) -> Result<T, NormalizeError> {
    if !record.is_object() {
        return Err(NormalizeError::Malformed("not a JSON object".to_string()));
    }
    T::deserialize(record).map_err(|e| NormalizeError::Malformed(e.to_string()))
}

fn external_id(raw: Option<String>, key: &'static str) -> Result<ExternalId, NormalizeError> {
    let raw = raw.ok_or(NormalizeError::MissingId(key))?;
    Ok(ExternalId::new(raw)?)
}

/// Counterparty contact id; `None` when absent or the empty GUID
fn contact_ref(contact: Option<XeroContactRef>) -> Option<ExternalId> {
    contact
        .and_then(|c| c.contact_id)
        .and_then(|id| ExternalId::new(id).ok())
        .filter(|id| !id.is_empty_guid())
}

// ============================================================================
// Nested values
// ============================================================================

impl PhoneEntry {
    fn into_phone(self) -> Option<PhoneNumber> {
        match self {
            PhoneEntry::Number(number) => {
                let number = number.trim();
                (!number.is_empty()).then(|| PhoneNumber {
                    number: number.to_string(),
                    ..PhoneNumber::default()
                })
            }
            PhoneEntry::Detailed(phone) => Some(PhoneNumber {
                number: phone.phone_number?,
                kind: phone.phone_type,
                area_code: phone.phone_area_code,
                country_code: phone.phone_country_code,
            }),
            PhoneEntry::Other(_) => None,
        }
    }
}

impl AddressEntry {
    fn into_address(self) -> Option<Address> {
        let address = match self {
            AddressEntry::Line(line) => Address {
                lines: vec![line.trim().to_string()],
                ..Address::default()
            },
            AddressEntry::Detailed(a) => Address {
                kind: a.address_type,
                lines: [a.address_line1, a.address_line2, a.address_line3, a.address_line4]
                    .into_iter()
                    .flatten()
                    .collect(),
                city: a.city,
                region: a.region,
                postal_code: a.postal_code,
                country: a.country,
            },
            AddressEntry::Other(_) => return None,
        };
        (!address.is_blank()).then_some(address)
    }
}

impl From<XeroLineItem> for LineItem {
    fn from(li: XeroLineItem) -> Self {
        LineItem {
            description: li.description,
            quantity: li.quantity,
            unit_amount: li.unit_amount,
            line_amount: li.line_amount,
            account_code: li.account_code,
        }
    }
}

fn tracking_category(t: XeroTrackingCategory) -> Option<TrackingCategoryRef> {
    Some(TrackingCategoryRef {
        category: t.tracking_category_name?,
        option: t.tracking_option_name,
    })
}

// ============================================================================
// Records
// ============================================================================

/// Maps a Xero contact to a [`Customer`]
pub fn normalize_customer(record: &Value) -> Result<Customer, NormalizeError> {
    let contact: XeroContact = decode(record)?;
    let status = match contact.contact_status.as_deref() {
        Some(s) => ContactStatus::from_wire(s)?,
        None => ContactStatus::Active,
    };

    Ok(Customer {
        external_id: external_id(contact.contact_id, "ContactID")?,
        name: contact.name.unwrap_or_default(),
        email: contact.email_address,
        phones: contact.phones.filter_map(PhoneEntry::into_phone).into_vec(),
        addresses: contact
            .addresses
            .filter_map(AddressEntry::into_address)
            .into_vec(),
        status,
        is_supplier: contact.is_supplier,
        is_customer: contact.is_customer,
        tracking_categories: contact
            .sales_tracking_categories
            .into_iter()
            .chain(contact.purchases_tracking_categories)
            .filter_map(tracking_category)
            .collect(),
    })
}

/// Maps a Xero invoice to an [`Invoice`]
pub fn normalize_invoice(record: &Value) -> Result<Invoice, NormalizeError> {
    let invoice: XeroInvoice = decode(record)?;
    let external_id = external_id(invoice.invoice_id, "InvoiceID")?;
    let invoice_type =
        InvoiceType::from_wire(invoice.invoice_type.as_deref().unwrap_or_default())?;
    let status = InvoiceStatus::from_wire(invoice.status.as_deref().unwrap_or_default())?;

    Ok(Invoice {
        external_id,
        invoice_number: invoice.invoice_number,
        reference: invoice.reference,
        customer_id: contact_ref(invoice.contact),
        invoice_type,
        status,
        currency_code: invoice.currency_code,
        subtotal: invoice.sub_total,
        total_tax: invoice.total_tax,
        total: invoice.total,
        total_discount: invoice.total_discount,
        amount_due: invoice.amount_due,
        amount_paid: invoice.amount_paid,
        amount_credited: invoice.amount_credited,
        issue_date: invoice.date_string.or(invoice.date),
        due_date: invoice.due_date_string.or(invoice.due_date),
        line_items: invoice.line_items.into_iter().map(LineItem::from).collect(),
    })
}

/// Maps a Xero bank transaction, or `Ok(None)` when it is filtered out
///
/// Only `RECEIVE`/`SPEND` transactions with a real counterparty are kept.
pub fn normalize_bank_transaction(
    record: &Value,
) -> Result<Option<BankTransaction>, NormalizeError> {
    let txn: XeroBankTransaction = decode(record)?;
    let external_id = external_id(txn.bank_transaction_id, "BankTransactionID")?;
    let Some(direction) = txn
        .transaction_type
        .as_deref()
        .and_then(TransactionDirection::from_wire)
    else {
        return Ok(None);
    };
    let Some(customer_id) = contact_ref(txn.contact) else {
        return Ok(None);
    };

    let particulars = txn.line_items.into_iter().find_map(|li| li.description);

    Ok(Some(BankTransaction {
        external_id,
        customer_id: Some(customer_id),
        direction,
        subtotal: txn.sub_total,
        total_tax: txn.total_tax,
        total: txn.total,
        is_reconciled: txn.is_reconciled,
        reference: txn.reference,
        particulars,
        currency_code: txn.currency_code,
        transaction_date: txn.date_string.or(txn.date),
    }))
}

/// Normalizes a raw page, skipping records that fail with a warning
pub fn normalize_page(kind: EntityKind, records: &[Value]) -> RecordBatch {
    fn collect<T>(
        kind: EntityKind,
        records: &[Value],
        f: impl Fn(&Value) -> Result<Option<T>, NormalizeError>,
    ) -> Vec<T> {
        records
            .iter()
            .enumerate()
            .filter_map(|(index, record)| match f(record) {
                Ok(item) => item,
                Err(e) => {
                    warn!(entity = %kind, index, error = %e, "Skipping record");
                    None
                }
            })
            .collect()
    }

    match kind {
        EntityKind::Customers => RecordBatch::Customers(collect(kind, records, |r| {
            normalize_customer(r).map(Some)
        })),
        EntityKind::Invoices => RecordBatch::Invoices(collect(kind, records, |r| {
            normalize_invoice(r).map(Some)
        })),
        EntityKind::BankTransactions => RecordBatch::BankTransactions(collect(
            kind,
            records,
            normalize_bank_transaction,
        )),
    }
}
