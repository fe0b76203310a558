//! Order types: in-flight summaries, persisted orders, and the
//! caller-supplied cross-turn context.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::MesaError;

/// Table identifier. Not necessarily numeric: callers send both bare
/// numbers and strings, so this normalizes either form to a string key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableNumber(pub String);

impl TableNumber {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TableNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TableNumber {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<u32> for TableNumber {
    fn from(n: u32) -> Self {
        Self(n.to_string())
    }
}

impl<'de> Deserialize<'de> for TableNumber {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Num(i64),
            Str(String),
        }
        Ok(match Raw::deserialize(deserializer)? {
            Raw::Num(n) => TableNumber(n.to_string()),
            Raw::Str(s) => TableNumber(s),
        })
    }
}

/// One resolved line of an order. The unit price is captured at resolution
/// time and is not live-linked to the catalog. Category, description and
/// image are denormalized snapshots filled in when the line is validated
/// against the catalog for persistence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderLineItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,
    pub name: String,
    pub quantity: u32,
    pub price: f64,
    pub subtotal: f64,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image: String,
}

/// The in-flight, cross-turn order representation. Produced by the
/// add-to-order handler, handed back by the caller as context on the next
/// turn, consumed by the confirm-order handler. Never persisted directly.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct OrderSummary {
    #[serde(default)]
    pub table_number: Option<TableNumber>,
    #[serde(default)]
    pub items: Vec<OrderLineItem>,
    #[serde(default)]
    pub total: f64,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub redirect: bool,
    #[serde(default)]
    pub redirect_url: Option<String>,
}

impl OrderSummary {
    /// A summary is confirmable when it names a table and carries at least
    /// one line item.
    pub fn is_confirmable(&self) -> bool {
        self.table_number.is_some() && !self.items.is_empty()
    }
}

/// A confirmed order as written to the order store. Written exactly once
/// per confirmation event and immutable thereafter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PersistedOrder {
    pub table_number: TableNumber,
    pub items: Vec<OrderLineItem>,
    pub total_amount: f64,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl PersistedOrder {
    /// Build from a confirmable summary, taking its fields verbatim.
    pub fn from_summary(summary: &OrderSummary) -> Result<Self, MesaError> {
        let table_number = summary
            .table_number
            .clone()
            .ok_or_else(|| MesaError::Validation("order summary has no table number".into()))?;
        if summary.items.is_empty() {
            return Err(MesaError::Validation("order summary has no items".into()));
        }
        Ok(Self {
            table_number,
            items: summary.items.clone(),
            total_amount: summary.total,
            timestamp: Utc::now(),
        })
    }
}

/// Caller-supplied context threaded through one dispatch call. Scoped to a
/// single request; the dispatcher forwards it to the selected handler
/// without mutating it.
#[derive(Debug, Clone, Default)]
pub struct DispatchContext {
    summary: Option<OrderSummary>,
}

impl DispatchContext {
    pub fn new(summary: Option<OrderSummary>) -> Self {
        Self { summary }
    }

    /// Parse the serialized order summary a caller sent along, if any.
    pub fn from_form_field(raw: Option<&str>) -> Result<Self, MesaError> {
        match raw {
            None => Ok(Self::default()),
            Some(s) if s.trim().is_empty() => Ok(Self::default()),
            Some(s) => {
                let summary: OrderSummary = serde_json::from_str(s)
                    .map_err(|e| MesaError::Validation(format!("bad order_summary: {e}")))?;
                Ok(Self::new(Some(summary)))
            }
        }
    }

    pub fn summary(&self) -> Option<&OrderSummary> {
        self.summary.as_ref()
    }

    /// The summary, but only when it can actually be confirmed.
    pub fn confirmable_summary(&self) -> Option<&OrderSummary> {
        self.summary.as_ref().filter(|s| s.is_confirmable())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_number_accepts_string_and_number() {
        let s: TableNumber = serde_json::from_str("\"5\"").unwrap();
        let n: TableNumber = serde_json::from_str("5").unwrap();
        assert_eq!(s, n);
        assert_eq!(s.as_str(), "5");
    }

    #[test]
    fn context_from_empty_field_is_empty() {
        let ctx = DispatchContext::from_form_field(None).unwrap();
        assert!(ctx.summary().is_none());
        let ctx = DispatchContext::from_form_field(Some("  ")).unwrap();
        assert!(ctx.summary().is_none());
    }

    #[test]
    fn context_requires_valid_json() {
        assert!(DispatchContext::from_form_field(Some("{not json")).is_err());
    }

    #[test]
    fn confirmable_needs_table_and_items() {
        let mut summary = OrderSummary {
            table_number: Some("5".into()),
            ..Default::default()
        };
        assert!(!summary.is_confirmable());
        summary.items.push(OrderLineItem {
            product_id: None,
            name: "Pizza".into(),
            quantity: 2,
            price: 10.0,
            subtotal: 20.0,
            category: String::new(),
            description: String::new(),
            image: String::new(),
        });
        assert!(summary.is_confirmable());

        let persisted = PersistedOrder::from_summary(&summary).unwrap();
        assert_eq!(persisted.table_number.as_str(), "5");
        assert_eq!(persisted.items.len(), 1);
    }
}
