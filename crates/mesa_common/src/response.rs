//! The canonical agent response shape.
//!
//! Every conversational request, whatever path it took through the
//! dispatcher, is answered with this one contract.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::order::{OrderLineItem, OrderSummary, PersistedOrder, TableNumber};

/// Fields the normalizer copies out of handler output. Anything else a
/// handler (or the model) emits is dropped.
pub const RECOGNIZED_FIELDS: [&str; 7] = [
    "message",
    "redirect",
    "redirect_url",
    "table_number",
    "items",
    "total",
    "success",
];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentResponse {
    pub message: String,
    pub redirect: bool,
    pub redirect_url: Option<String>,
    pub table_number: Option<TableNumber>,
    pub items: Vec<OrderLineItem>,
    pub total: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,
}

impl Default for AgentResponse {
    fn default() -> Self {
        Self {
            message: String::new(),
            redirect: false,
            redirect_url: None,
            table_number: None,
            items: Vec::new(),
            total: 0.0,
            success: None,
            audio_url: None,
        }
    }
}

impl AgentResponse {
    /// Copy the recognized field set out of a structured value, leaving
    /// every absent (or unparseable) field at its current value.
    pub fn apply_fields(&mut self, value: &Value) {
        let Some(map) = value.as_object() else {
            return;
        };
        if let Some(m) = map.get("message").and_then(Value::as_str) {
            self.message = m.to_string();
        }
        if let Some(r) = map.get("redirect").and_then(Value::as_bool) {
            self.redirect = r;
        }
        if let Some(u) = map.get("redirect_url").and_then(Value::as_str) {
            if !u.is_empty() {
                self.redirect_url = Some(u.to_string());
            }
        }
        if let Some(t) = map.get("table_number") {
            if let Ok(table) = serde_json::from_value::<TableNumber>(t.clone()) {
                self.table_number = Some(table);
            }
        }
        if let Some(items) = map.get("items") {
            if let Ok(items) = serde_json::from_value::<Vec<OrderLineItem>>(items.clone()) {
                self.items = items;
            }
        }
        if let Some(total) = map.get("total").and_then(Value::as_f64) {
            self.total = total;
        }
        if let Some(success) = map.get("success").and_then(Value::as_bool) {
            self.success = Some(success);
        }
    }

    /// Lift an in-flight order summary into the wire shape.
    pub fn from_summary(summary: OrderSummary) -> Self {
        Self {
            message: summary.message,
            redirect: summary.redirect,
            redirect_url: summary.redirect_url,
            table_number: summary.table_number,
            items: summary.items,
            total: summary.total,
            success: None,
            audio_url: None,
        }
    }

    /// Overwrite the order-bearing fields from a freshly persisted order.
    pub fn overwrite_from_order(&mut self, order: &PersistedOrder, message: &str, view: &str) {
        self.message = message.to_string();
        self.redirect = true;
        self.redirect_url = Some(view.to_string());
        self.table_number = Some(order.table_number.clone());
        self.items = order.items.clone();
        self.total = order.total_amount;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn subset_copy_leaves_defaults() {
        let mut resp = AgentResponse::default();
        resp.apply_fields(&json!({"message": "hello", "redirect": true}));
        assert_eq!(resp.message, "hello");
        assert!(resp.redirect);
        assert_eq!(resp.redirect_url, None);
        assert_eq!(resp.table_number, None);
        assert!(resp.items.is_empty());
        assert_eq!(resp.total, 0.0);
        assert_eq!(resp.success, None);
    }

    #[test]
    fn unrecognized_fields_dropped() {
        let mut resp = AgentResponse::default();
        resp.apply_fields(&json!({"message": "ok", "internal_debug": 42}));
        assert_eq!(
            serde_json::to_value(&resp).unwrap().get("internal_debug"),
            None
        );
    }

    #[test]
    fn numeric_table_number_accepted() {
        let mut resp = AgentResponse::default();
        resp.apply_fields(&json!({"table_number": 7, "total": 12.5}));
        assert_eq!(resp.table_number, Some("7".into()));
        assert_eq!(resp.total, 12.5);
    }

    #[test]
    fn non_object_value_is_ignored() {
        let mut resp = AgentResponse::default();
        resp.apply_fields(&json!("just a string"));
        assert_eq!(resp, AgentResponse::default());
    }
}
