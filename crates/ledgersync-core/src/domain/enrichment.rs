//! Derived invoice metadata
//!
//! The enrichment pipeline reads [`PendingInvoice`] rows and writes an
//! [`Enrichment`] back over them. Writes replace both derived columns.
//! Which rows are pending is decided by the store's selection query.

use serde::{Deserialize, Serialize};

use super::invoice::LineItem;
use super::newtypes::ExternalId;

/// An invoice selected for enrichment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingInvoice {
    /// Local row id; the keyset pagination key
    pub row_id: i64,
    pub external_id: ExternalId,
    pub invoice_number: Option<String>,
    pub reference: Option<String>,
    pub line_items: Vec<LineItem>,
    pub work_description: Option<String>,
    pub service_keywords: Option<Vec<String>>,
}

impl PendingInvoice {
    /// Text the pre-filter and the model look at
    pub fn content(&self) -> String {
        let mut parts: Vec<&str> = self
            .line_items
            .iter()
            .filter_map(|li| li.description.as_deref())
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .collect();
        if let Some(reference) = self.reference.as_deref().map(str::trim) {
            if !reference.is_empty() {
                parts.push(reference);
            }
        }
        parts.join("\n")
    }
}

/// Values written back by the pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrichment {
    pub work_description: Option<String>,
    pub service_keywords: Vec<String>,
}

impl Enrichment {
    /// Normalise raw model output
    ///
    /// Descriptions are trimmed (blank becomes `None`). Keywords are
    /// trimmed, lower-cased and de-duplicated keeping first occurrence.
    pub fn new<I, S>(work_description: Option<String>, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let work_description = work_description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());

        let mut service_keywords: Vec<String> = Vec::new();
        for keyword in keywords {
            let keyword = keyword.as_ref().trim().to_lowercase();
            if !keyword.is_empty() && !service_keywords.contains(&keyword) {
                service_keywords.push(keyword);
            }
        }

        Self {
            work_description,
            service_keywords,
        }
    }

    /// Result for records the pre-filter rules out
    pub fn no_keywords() -> Self {
        Self {
            work_description: None,
            service_keywords: Vec::new(),
        }
    }
}
