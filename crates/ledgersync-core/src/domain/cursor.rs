//! Per-entity sync cursor
//!
//! A [`SyncCursor`] records where paging for one entity kind stopped, so
//! a later invocation (or a different client) can pick up from there.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::newtypes::EntityKind;

/// Resumable paging position for one entity kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncCursor {
    pub entity: EntityKind,
    /// Next page to fetch; `None` once paging is exhausted
    pub next_page: Option<u32>,
    pub has_more: bool,
    /// Records written since the cursor was last reset
    pub written: u64,
    pub updated_at: DateTime<Utc>,
}

impl SyncCursor {
    /// A cursor positioned before the first page
    pub fn start(entity: EntityKind) -> Self {
        Self {
            entity,
            next_page: Some(1),
            has_more: true,
            written: 0,
            updated_at: Utc::now(),
        }
    }

    /// Page a new invocation should start from
    ///
    /// An exhausted cursor restarts from page 1 so a fresh sync picks up
    /// records created since the last full pass.
    #[must_use]
    pub fn resume_page(&self) -> u32 {
        match self.next_page {
            Some(page) if self.has_more => page.max(1),
            _ => 1,
        }
    }

    /// Record that `page` was written with `count` records
    ///
    /// # Errors
    /// `ValidationFailed` when `page` is the last representable page
    pub fn advance(&mut self, page: u32, count: u64) -> Result<(), DomainError> {
        let Some(next) = page.checked_add(1) else {
            return Err(DomainError::ValidationFailed(format!(
                "page {page} has no successor"
            )));
        };
        self.next_page = Some(next);
        self.has_more = true;
        self.written += count;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Mark paging as exhausted
    pub fn finish(&mut self) {
        self.next_page = None;
        self.has_more = false;
        self.updated_at = Utc::now();
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        !self.has_more
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_cursor() {
        let cursor = SyncCursor::start(EntityKind::Invoices);
        assert_eq!(cursor.resume_page(), 1);
        assert!(!cursor.is_finished());
        assert_eq!(cursor.written, 0);
    }

    #[test]
    fn test_advance_then_finish() {
        let mut cursor = SyncCursor::start(EntityKind::Customers);
        cursor.advance(1, 1000).unwrap();
        cursor.advance(2, 1000).unwrap();
        assert_eq!(cursor.resume_page(), 3);
        assert_eq!(cursor.written, 2000);

        cursor.finish();
        assert!(cursor.is_finished());
        assert_eq!(cursor.next_page, None);
        assert_eq!(cursor.resume_page(), 1);
    }

    #[test]
    fn test_advance_past_last_page_is_rejected() {
        let mut cursor = SyncCursor::start(EntityKind::Invoices);
        cursor.advance(3, 10).unwrap();
        assert!(cursor.advance(u32::MAX, 10).is_err());
        // Unchanged by the failed advance
        assert_eq!(cursor.next_page, Some(4));
        assert_eq!(cursor.written, 10);
    }
}
