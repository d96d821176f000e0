//! Canonical container for fields whose upstream shape varies
//!
//! Upstream payloads deliver some collections (phones, addresses) as a
//! missing value, a single object, a bare string, or an array, depending
//! on the record. [`Shape`] deserializes from any of those (`null` or a
//! missing field with `#[serde(default)]` is `None`, an array is `List`,
//! anything else is `Single`), and everything downstream works on
//! [`Shape::into_vec`].

use serde::{Deserialize, Serialize};

/// Zero, one, or many values of `T`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Shape<T> {
    None,
    Single(T),
    List(Vec<T>),
}

impl<T> Shape<T> {
    /// Build from a list, collapsing empty and single-element lists
    pub fn from_vec(mut items: Vec<T>) -> Self {
        match items.len() {
            0 => Shape::None,
            1 => items.pop().map_or(Shape::None, Shape::Single),
            _ => Shape::List(items),
        }
    }

    /// Number of contained values
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Shape::None => 0,
            Shape::Single(_) => 1,
            Shape::List(items) => items.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flatten into a list
    pub fn into_vec(self) -> Vec<T> {
        match self {
            Shape::None => Vec::new(),
            Shape::Single(item) => vec![item],
            Shape::List(items) => items,
        }
    }

    /// Apply `f` to every value, dropping those that map to `None`
    pub fn filter_map<U, F>(self, f: F) -> Shape<U>
    where
        F: FnMut(T) -> Option<U>,
    {
        Shape::from_vec(self.into_vec().into_iter().filter_map(f).collect())
    }
}

impl<T> Default for Shape<T> {
    fn default() -> Self {
        Shape::None
    }
}

impl<T> From<Option<T>> for Shape<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Shape::None, Shape::Single)
    }
}
