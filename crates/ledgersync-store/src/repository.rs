//! SQLite implementation of IRecordStore
//!
//! This module provides the concrete SQLite-based implementation of the
//! record store port defined in ledgersync-core. It handles domain type
//! serialization and SQL query construction.
//!
//! ## Type Mapping
//!
//! | Domain Type                          | SQL Type | Strategy                                |
//! |--------------------------------------|----------|-----------------------------------------|
//! | ExternalId, UserId                   | TEXT     | `.as_str()` / `::new()`                 |
//! | EntityKind and status enums          | TEXT     | `.as_str()` / `FromStr`                 |
//! | DateTime<Utc>                        | TEXT     | `to_rfc3339()` / `parse_from_rfc3339()` |
//! | NaiveDate                            | TEXT     | `YYYY-MM-DD`                            |
//! | PhoneNumber[], Address[], LineItem[] | TEXT     | serde_json array                        |
//! | service_keywords                     | TEXT     | serde_json array, `NULL` when never set |
//!
//! ## Upserts
//!
//! Batches are written with multi-row `INSERT ... ON CONFLICT(xero_id) DO
//! UPDATE` statements inside one transaction, so a failed batch leaves no
//! partial rows. Invoice and bank-transaction rows resolve their customer
//! through a sub-select: a counterparty that has not been synced yet is
//! stored as `NULL` instead of violating the foreign key.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection, SqlitePool};
use tracing::{debug, info};

use ledgersync_core::domain::{
    Address, BankTransaction, ContactStatus, Customer, EntityKind, Enrichment, ExternalId,
    Invoice, InvoiceStatus, InvoiceType, LineItem, OAuthConnection, PendingInvoice, PhoneNumber,
    SyncCursor, TrackingCategoryRef, TransactionDirection, UserId,
};
use ledgersync_core::ports::{IRecordStore, RecordBatch, RecordCounts};

use crate::StoreError;

/// Rows per multi-row INSERT, well below SQLite's bind-parameter limit
const MAX_ROWS_PER_STATEMENT: usize = 500;

/// SQLite-based implementation of the record store port
pub struct SqliteRecordStore {
    pool: SqlitePool,
}

impl SqliteRecordStore {
    /// Creates a new store instance with the given connection pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// An invoice row with its derived enrichment columns
#[derive(Debug, Clone, PartialEq)]
pub struct StoredInvoice {
    pub row_id: i64,
    pub invoice: Invoice,
    pub work_description: Option<String>,
    pub service_keywords: Option<Vec<String>>,
}

// ============================================================================
// Helper functions for type conversion
// ============================================================================

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::SerializationError(format!("Invalid datetime '{s}': {e}")))
}

fn parse_optional_date(s: Option<String>) -> Result<Option<NaiveDate>, StoreError> {
    s.map(|s| {
        NaiveDate::parse_from_str(&s, "%Y-%m-%d")
            .map_err(|e| StoreError::SerializationError(format!("Invalid date '{s}': {e}")))
    })
    .transpose()
}

fn date_text(date: Option<NaiveDate>) -> Option<String> {
    date.map(|d| d.format("%Y-%m-%d").to_string())
}

fn external_id(s: String) -> Result<ExternalId, StoreError> {
    ExternalId::new(s).map_err(|e| StoreError::SerializationError(e.to_string()))
}

fn optional_external_id(s: Option<String>) -> Result<Option<ExternalId>, StoreError> {
    s.map(external_id).transpose()
}

/// Keywords column: `NULL` or a JSON array; anything unreadable counts as unset
fn parse_keywords(s: Option<String>) -> Option<Vec<String>> {
    s.and_then(|s| serde_json::from_str(&s).ok())
}

fn customer_from_row(row: &SqliteRow) -> Result<Customer, StoreError> {
    let status: String = row.get("status");
    let phones: String = row.get("phones");
    let addresses: String = row.get("addresses");
    let tracking: String = row.get("tracking_categories");

    Ok(Customer {
        external_id: external_id(row.get("xero_id"))?,
        name: row.get("name"),
        email: row.get("email"),
        phones: serde_json::from_str::<Vec<PhoneNumber>>(&phones)?,
        addresses: serde_json::from_str::<Vec<Address>>(&addresses)?,
        status: ContactStatus::from_str(&status)
            .map_err(|e| StoreError::SerializationError(e.to_string()))?,
        is_supplier: row.get("is_supplier"),
        is_customer: row.get("is_customer"),
        tracking_categories: serde_json::from_str::<Vec<TrackingCategoryRef>>(&tracking)?,
    })
}

fn invoice_from_row(row: &SqliteRow) -> Result<StoredInvoice, StoreError> {
    let invoice_type: String = row.get("invoice_type");
    let status: String = row.get("status");
    let line_items: String = row.get("line_items");

    let invoice = Invoice {
        external_id: external_id(row.get("xero_id"))?,
        invoice_number: row.get("invoice_number"),
        reference: row.get("reference"),
        customer_id: optional_external_id(row.get("customer_xero_id"))?,
        invoice_type: InvoiceType::from_str(&invoice_type)
            .map_err(|e| StoreError::SerializationError(e.to_string()))?,
        status: InvoiceStatus::from_str(&status)
            .map_err(|e| StoreError::SerializationError(e.to_string()))?,
        currency_code: row.get("currency_code"),
        subtotal: row.get("subtotal"),
        total_tax: row.get("total_tax"),
        total: row.get("total"),
        total_discount: row.get("total_discount"),
        amount_due: row.get("amount_due"),
        amount_paid: row.get("amount_paid"),
        amount_credited: row.get("amount_credited"),
        issue_date: parse_optional_date(row.get("issue_date"))?,
        due_date: parse_optional_date(row.get("due_date"))?,
        line_items: serde_json::from_str::<Vec<LineItem>>(&line_items)?,
    };

    Ok(StoredInvoice {
        row_id: row.get("id"),
        invoice,
        work_description: row.get("work_description"),
        service_keywords: parse_keywords(row.get("service_keywords")),
    })
}

fn bank_transaction_from_row(row: &SqliteRow) -> Result<BankTransaction, StoreError> {
    let direction: String = row.get("direction");
    Ok(BankTransaction {
        external_id: external_id(row.get("xero_id"))?,
        customer_id: optional_external_id(row.get("customer_xero_id"))?,
        direction: TransactionDirection::from_str(&direction)
            .map_err(|e| StoreError::SerializationError(e.to_string()))?,
        subtotal: row.get("subtotal"),
        total_tax: row.get("total_tax"),
        total: row.get("total"),
        is_reconciled: row.get("is_reconciled"),
        reference: row.get("reference"),
        particulars: row.get("particulars"),
        currency_code: row.get("currency_code"),
        transaction_date: parse_optional_date(row.get("transaction_date"))?,
    })
}

fn pending_from_row(row: &SqliteRow) -> Result<PendingInvoice, StoreError> {
    let line_items: String = row.get("line_items");
    Ok(PendingInvoice {
        row_id: row.get("id"),
        external_id: external_id(row.get("xero_id"))?,
        invoice_number: row.get("invoice_number"),
        reference: row.get("reference"),
        line_items: serde_json::from_str(&line_items).unwrap_or_default(),
        work_description: row.get("work_description"),
        service_keywords: parse_keywords(row.get("service_keywords")),
    })
}

fn connection_from_row(row: &SqliteRow) -> Result<OAuthConnection, StoreError> {
    let user_id: String = row.get("user_id");
    let access_expires_at: String = row.get("access_expires_at");
    let refresh_expires_at: String = row.get("refresh_expires_at");
    let updated_at: String = row.get("updated_at");

    Ok(OAuthConnection {
        user_id: UserId::new(user_id)
            .map_err(|e| StoreError::SerializationError(e.to_string()))?,
        tenant_id: row.get("tenant_id"),
        access_token: row.get("access_token"),
        refresh_token: row.get("refresh_token"),
        access_expires_at: parse_datetime(&access_expires_at)?,
        refresh_expires_at: parse_datetime(&refresh_expires_at)?,
        updated_at: parse_datetime(&updated_at)?,
    })
}

fn cursor_from_row(row: &SqliteRow) -> Result<SyncCursor, StoreError> {
    let entity: String = row.get("entity");
    let next_page: Option<i64> = row.get("next_page");
    let written: i64 = row.get("written");
    let updated_at: String = row.get("updated_at");

    Ok(SyncCursor {
        entity: EntityKind::from_str(&entity)
            .map_err(|e| StoreError::SerializationError(e.to_string()))?,
        next_page: next_page
            .map(u32::try_from)
            .transpose()
            .map_err(|e| StoreError::SerializationError(format!("Invalid next_page: {e}")))?,
        has_more: row.get("has_more"),
        written: written.max(0) as u64,
        updated_at: parse_datetime(&updated_at)?,
    })
}

// ============================================================================
// Batched upserts
// ============================================================================

async fn upsert_customers(
    conn: &mut SqliteConnection,
    customers: &[Customer],
    synced_at: &str,
) -> Result<u64, StoreError> {
    let mut written = 0u64;
    for chunk in customers.chunks(MAX_ROWS_PER_STATEMENT) {
        let rows = chunk
            .iter()
            .map(|c| {
                Ok((
                    c,
                    serde_json::to_string(&c.phones)?,
                    serde_json::to_string(&c.addresses)?,
                    serde_json::to_string(&c.tracking_categories)?,
                ))
            })
            .collect::<Result<Vec<_>, StoreError>>()?;

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            "INSERT INTO customers (xero_id, name, email, phones, addresses, status, \
             is_supplier, is_customer, tracking_categories, synced_at) ",
        );
        qb.push_values(rows, |mut b, (c, phones, addresses, tracking)| {
            b.push_bind(c.external_id.as_str())
                .push_bind(c.name.as_str())
                .push_bind(c.email.as_deref())
                .push_bind(phones)
                .push_bind(addresses)
                .push_bind(c.status.as_str())
                .push_bind(c.is_supplier)
                .push_bind(c.is_customer)
                .push_bind(tracking)
                .push_bind(synced_at);
        });
        qb.push(
            " ON CONFLICT(xero_id) DO UPDATE SET \
             name = excluded.name, \
             email = excluded.email, \
             phones = excluded.phones, \
             addresses = excluded.addresses, \
             status = excluded.status, \
             is_supplier = excluded.is_supplier, \
             is_customer = excluded.is_customer, \
             tracking_categories = excluded.tracking_categories, \
             synced_at = excluded.synced_at",
        );
        qb.build().execute(&mut *conn).await?;
        written += chunk.len() as u64;
    }
    Ok(written)
}

async fn upsert_invoices(
    conn: &mut SqliteConnection,
    invoices: &[Invoice],
    synced_at: &str,
) -> Result<u64, StoreError> {
    let mut written = 0u64;
    for chunk in invoices.chunks(MAX_ROWS_PER_STATEMENT) {
        let rows = chunk
            .iter()
            .map(|inv| Ok((inv, serde_json::to_string(&inv.line_items)?)))
            .collect::<Result<Vec<_>, StoreError>>()?;

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            "INSERT INTO invoices (xero_id, invoice_number, reference, customer_xero_id, \
             invoice_type, status, currency_code, subtotal, total_tax, total, total_discount, \
             amount_due, amount_paid, amount_credited, issue_date, due_date, line_items, \
             synced_at) ",
        );
        qb.push_values(rows, |mut b, (inv, line_items)| {
            b.push_bind(inv.external_id.as_str())
                .push_bind(inv.invoice_number.as_deref())
                .push_bind(inv.reference.as_deref());
            b.push("(SELECT xero_id FROM customers WHERE xero_id = ")
                .push_bind_unseparated(inv.customer_id.as_ref().map(ExternalId::as_str))
                .push_unseparated(")");
            b.push_bind(inv.invoice_type.as_str())
                .push_bind(inv.status.as_str())
                .push_bind(inv.currency_code.as_deref())
                .push_bind(inv.subtotal)
                .push_bind(inv.total_tax)
                .push_bind(inv.total)
                .push_bind(inv.total_discount)
                .push_bind(inv.amount_due)
                .push_bind(inv.amount_paid)
                .push_bind(inv.amount_credited)
                .push_bind(date_text(inv.issue_date))
                .push_bind(date_text(inv.due_date))
                .push_bind(line_items)
                .push_bind(synced_at);
        });
        // work_description and service_keywords are owned by enrichment.
        qb.push(
            " ON CONFLICT(xero_id) DO UPDATE SET \
             invoice_number = excluded.invoice_number, \
             reference = excluded.reference, \
             customer_xero_id = excluded.customer_xero_id, \
             invoice_type = excluded.invoice_type, \
             status = excluded.status, \
             currency_code = excluded.currency_code, \
             subtotal = excluded.subtotal, \
             total_tax = excluded.total_tax, \
             total = excluded.total, \
             total_discount = excluded.total_discount, \
             amount_due = excluded.amount_due, \
             amount_paid = excluded.amount_paid, \
             amount_credited = excluded.amount_credited, \
             issue_date = excluded.issue_date, \
             due_date = excluded.due_date, \
             line_items = excluded.line_items, \
             synced_at = excluded.synced_at",
        );
        qb.build().execute(&mut *conn).await?;
        written += chunk.len() as u64;
    }
    Ok(written)
}

async fn upsert_bank_transactions(
    conn: &mut SqliteConnection,
    transactions: &[BankTransaction],
    synced_at: &str,
) -> Result<u64, StoreError> {
    let mut written = 0u64;
    for chunk in transactions.chunks(MAX_ROWS_PER_STATEMENT) {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            "INSERT INTO bank_transactions (xero_id, customer_xero_id, direction, subtotal, \
             total_tax, total, is_reconciled, reference, particulars, currency_code, \
             transaction_date, synced_at) ",
        );
        qb.push_values(chunk, |mut b, bt| {
            b.push_bind(bt.external_id.as_str());
            b.push("(SELECT xero_id FROM customers WHERE xero_id = ")
                .push_bind_unseparated(bt.customer_id.as_ref().map(ExternalId::as_str))
                .push_unseparated(")");
            b.push_bind(bt.direction.as_str())
                .push_bind(bt.subtotal)
                .push_bind(bt.total_tax)
                .push_bind(bt.total)
                .push_bind(bt.is_reconciled)
                .push_bind(bt.reference.as_deref())
                .push_bind(bt.particulars.as_deref())
                .push_bind(bt.currency_code.as_deref())
                .push_bind(date_text(bt.transaction_date))
                .push_bind(synced_at);
        });
        qb.push(
            " ON CONFLICT(xero_id) DO UPDATE SET \
             customer_xero_id = excluded.customer_xero_id, \
             direction = excluded.direction, \
             subtotal = excluded.subtotal, \
             total_tax = excluded.total_tax, \
             total = excluded.total, \
             is_reconciled = excluded.is_reconciled, \
             reference = excluded.reference, \
             particulars = excluded.particulars, \
             currency_code = excluded.currency_code, \
             transaction_date = excluded.transaction_date, \
             synced_at = excluded.synced_at",
        );
        qb.build().execute(&mut *conn).await?;
        written += chunk.len() as u64;
    }
    Ok(written)
}

/// Shared WHERE clause for enrichment selection
///
/// `?` placeholders: minimum description length.
const PENDING_PREDICATE: &str = "(work_description IS NULL \
     OR length(trim(work_description)) < ? \
     OR service_keywords IS NULL \
     OR json_array_length(service_keywords) = 0)";

// ============================================================================
// Read helpers (not part of the port)
// ============================================================================

impl SqliteRecordStore {
    pub async fn get_customer(&self, id: &ExternalId) -> anyhow::Result<Option<Customer>> {
        let row = sqlx::query("SELECT * FROM customers WHERE xero_id = ?")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(customer_from_row).transpose()?)
    }

    pub async fn get_invoice(&self, id: &ExternalId) -> anyhow::Result<Option<StoredInvoice>> {
        let row = sqlx::query("SELECT * FROM invoices WHERE xero_id = ?")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(invoice_from_row).transpose()?)
    }

    pub async fn get_bank_transaction(
        &self,
        id: &ExternalId,
    ) -> anyhow::Result<Option<BankTransaction>> {
        let row = sqlx::query("SELECT * FROM bank_transactions WHERE xero_id = ?")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(bank_transaction_from_row).transpose()?)
    }
}

// ============================================================================
// IRecordStore implementation
// ============================================================================

#[async_trait::async_trait]
impl IRecordStore for SqliteRecordStore {
    // --- Synced records ---

    async fn upsert_batch(&self, batch: &RecordBatch) -> anyhow::Result<u64> {
        if batch.is_empty() {
            return Ok(0);
        }
        let synced_at = Utc::now().to_rfc3339();

        let mut tx = self.pool.begin().await?;
        let written = match batch {
            RecordBatch::Customers(customers) => {
                upsert_customers(&mut tx, customers, &synced_at).await?
            }
            RecordBatch::Invoices(invoices) => upsert_invoices(&mut tx, invoices, &synced_at).await?,
            RecordBatch::BankTransactions(transactions) => {
                upsert_bank_transactions(&mut tx, transactions, &synced_at).await?
            }
        };
        tx.commit().await?;

        debug!(entity = %batch.kind(), written, "Upserted batch");
        Ok(written)
    }

    async fn counts(&self) -> anyhow::Result<RecordCounts> {
        let row = sqlx::query(
            "SELECT \
             (SELECT COUNT(*) FROM customers) AS customers, \
             (SELECT COUNT(*) FROM invoices) AS invoices, \
             (SELECT COUNT(*) FROM bank_transactions) AS bank_transactions",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(RecordCounts {
            customers: row.get::<i64, _>("customers") as u64,
            invoices: row.get::<i64, _>("invoices") as u64,
            bank_transactions: row.get::<i64, _>("bank_transactions") as u64,
        })
    }

    async fn clear_synced_data(&self) -> anyhow::Result<RecordCounts> {
        let mut tx = self.pool.begin().await?;
        // Children first so no SET NULL cascade work is needed.
        let bank_transactions = sqlx::query("DELETE FROM bank_transactions")
            .execute(&mut *tx)
            .await?
            .rows_affected();
        let invoices = sqlx::query("DELETE FROM invoices")
            .execute(&mut *tx)
            .await?
            .rows_affected();
        let customers = sqlx::query("DELETE FROM customers")
            .execute(&mut *tx)
            .await?
            .rows_affected();
        tx.commit().await?;

        let cleared = RecordCounts {
            customers,
            invoices,
            bank_transactions,
        };
        info!(
            customers,
            invoices, bank_transactions, "Cleared synced data"
        );
        Ok(cleared)
    }

    // --- OAuth connection ---

    async fn get_connection(&self, user: &UserId) -> anyhow::Result<Option<OAuthConnection>> {
        let row = sqlx::query("SELECT * FROM oauth_connections WHERE user_id = ?")
            .bind(user.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(connection_from_row).transpose()?)
    }

    async fn save_connection(&self, connection: &OAuthConnection) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO oauth_connections (user_id, tenant_id, access_token, refresh_token, \
             access_expires_at, refresh_expires_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(user_id) DO UPDATE SET \
             tenant_id = excluded.tenant_id, \
             access_token = excluded.access_token, \
             refresh_token = excluded.refresh_token, \
             access_expires_at = excluded.access_expires_at, \
             refresh_expires_at = excluded.refresh_expires_at, \
             updated_at = excluded.updated_at",
        )
        .bind(connection.user_id.as_str())
        .bind(&connection.tenant_id)
        .bind(&connection.access_token)
        .bind(&connection.refresh_token)
        .bind(connection.access_expires_at.to_rfc3339())
        .bind(connection.refresh_expires_at.to_rfc3339())
        .bind(connection.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        debug!(user_id = %connection.user_id, tenant_id = %connection.tenant_id, "Saved connection");
        Ok(())
    }

    async fn delete_connection(&self, user: &UserId) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM oauth_connections WHERE user_id = ?")
            .bind(user.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // --- Sync cursors ---

    async fn load_cursor(
        &self,
        user: &UserId,
        entity: EntityKind,
    ) -> anyhow::Result<Option<SyncCursor>> {
        let row = sqlx::query("SELECT * FROM sync_cursors WHERE user_id = ? AND entity = ?")
            .bind(user.as_str())
            .bind(entity.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(cursor_from_row).transpose()?)
    }

    async fn load_cursors(&self, user: &UserId) -> anyhow::Result<Vec<SyncCursor>> {
        let rows = sqlx::query("SELECT * FROM sync_cursors WHERE user_id = ?")
            .bind(user.as_str())
            .fetch_all(&self.pool)
            .await?;
        let mut cursors = rows
            .iter()
            .map(cursor_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        cursors.sort_by_key(|c| c.entity);
        Ok(cursors)
    }

    async fn save_cursor(&self, user: &UserId, cursor: &SyncCursor) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO sync_cursors (user_id, entity, next_page, has_more, written, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?) \
             ON CONFLICT(user_id, entity) DO UPDATE SET \
             next_page = excluded.next_page, \
             has_more = excluded.has_more, \
             written = excluded.written, \
             updated_at = excluded.updated_at",
        )
        .bind(user.as_str())
        .bind(cursor.entity.as_str())
        .bind(cursor.next_page.map(i64::from))
        .bind(cursor.has_more)
        .bind(i64::try_from(cursor.written).unwrap_or(i64::MAX))
        .bind(cursor.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn clear_cursors(&self, user: &UserId) -> anyhow::Result<u64> {
        let result = sqlx::query("DELETE FROM sync_cursors WHERE user_id = ?")
            .bind(user.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    // --- Enrichment ---

    async fn select_pending_enrichment(
        &self,
        after_id: i64,
        limit: u32,
        min_description_length: u32,
    ) -> anyhow::Result<Vec<PendingInvoice>> {
        let sql = format!(
            "SELECT id, xero_id, invoice_number, reference, line_items, work_description, \
             service_keywords FROM invoices \
             WHERE id > ? AND {PENDING_PREDICATE} \
             ORDER BY id LIMIT ?"
        );
        let rows = sqlx::query(&sql)
            .bind(after_id)
            .bind(i64::from(min_description_length))
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .iter()
            .map(pending_from_row)
            .collect::<Result<Vec<_>, _>>()?)
    }

    async fn count_pending_enrichment(&self, min_description_length: u32) -> anyhow::Result<u64> {
        let sql = format!("SELECT COUNT(*) FROM invoices WHERE {PENDING_PREDICATE}");
        let count: i64 = sqlx::query_scalar(&sql)
            .bind(i64::from(min_description_length))
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    async fn apply_enrichment(&self, updates: &[(i64, Enrichment)]) -> anyhow::Result<u64> {
        if updates.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut updated = 0u64;
        for (row_id, enrichment) in updates {
            let keywords = serde_json::to_string(&enrichment.service_keywords)?;
            updated += sqlx::query(
                "UPDATE invoices SET work_description = ?, service_keywords = ? WHERE id = ?",
            )
            .bind(enrichment.work_description.as_deref())
            .bind(keywords)
            .bind(row_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        }
        tx.commit().await?;

        debug!(requested = updates.len(), updated, "Applied enrichment");
        Ok(updated)
    }
}
