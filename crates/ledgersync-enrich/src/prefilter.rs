//! Keyword pre-filter
//!
//! Invoices whose text contains none of the vocabulary terms are written
//! back with an empty keyword list without calling the model. Matching is
//! a case-insensitive substring test.

/// Vocabulary match over invoice text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prefilter {
    terms: Vec<String>,
}

impl Prefilter {
    /// Builds a filter from `terms`; blank terms are dropped
    pub fn new<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let terms = terms
            .into_iter()
            .map(|t| t.as_ref().trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        Self { terms }
    }

    /// An empty vocabulary disables the filter
    pub fn is_enabled(&self) -> bool {
        !self.terms.is_empty()
    }

    /// Whether `text` is worth sending to the model
    pub fn matches(&self, text: &str) -> bool {
        if !self.is_enabled() {
            return true;
        }
        let text = text.to_lowercase();
        self.terms.iter().any(|term| text.contains(term.as_str()))
    }
}
