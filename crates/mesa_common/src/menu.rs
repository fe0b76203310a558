//! Catalog types: products and deals share one record shape.

use serde::{Deserialize, Serialize};

/// A menu product (or deal). The name is the comparison key for order
/// resolution and is matched case-insensitively.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub price: f64,
    pub category: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image: String,
}

impl Product {
    /// Case-insensitive name equality, the catalog's comparison key.
    pub fn name_matches(&self, other: &str) -> bool {
        self.name.eq_ignore_ascii_case(other)
    }
}
