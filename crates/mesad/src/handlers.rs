//! The four intent handlers.
//!
//! Each returns a tagged output the normalizer can pattern-match instead
//! of probing shapes: a structured response or plain text.

use mesa_common::error::MesaError;
use mesa_common::order::{DispatchContext, OrderLineItem, PersistedOrder};
use mesa_common::{AgentResponse, ORDER_SUMMARY_VIEW};
use mesa_common::MENU_VIEW;
use tracing::{error, info};

use crate::accumulator;
use crate::db::{Catalog, OrderStore};
use crate::nlu::{NluBackend, OrderSlots};

/// Handler output at the dispatcher boundary. Text covers both fixed
/// replies and free-form model output that reached the caller unchanged.
#[derive(Debug, Clone, PartialEq)]
pub enum HandlerOutput {
    Structured(AgentResponse),
    Text(String),
}

pub const WELCOME_MESSAGE: &str = "Hello! Welcome to Buddies party. Have a great day and a \
                                   great meal with your buddies. What would you like to order?";

pub const SHOW_MENU_MESSAGE: &str = "Ok, I am showing you the menu.";

pub const CONFIRM_CLARIFICATION: &str =
    "Please specify both table number and items to confirm your order.";

pub const CONFIRM_FAILED_MESSAGE: &str = "Failed to confirm order. Please try again.";

pub const NO_MATCH_MESSAGE: &str = "Sorry, I didn't catch that. You can ask for the menu, say \
                                    'table 2 order 1 pizza' to order, or say 'confirm order'.";

/// Fixed welcome, no redirect.
pub fn greeting() -> HandlerOutput {
    HandlerOutput::Text(WELCOME_MESSAGE.to_string())
}

/// Menu-redirect signal. No catalog access here; the client fetches the
/// menu itself after following the redirect.
pub fn show_menu() -> HandlerOutput {
    HandlerOutput::Structured(AgentResponse {
        message: SHOW_MENU_MESSAGE.to_string(),
        redirect: true,
        redirect_url: Some(MENU_VIEW.to_string()),
        ..Default::default()
    })
}

/// Clarification prompt for utterances no handler can be justified for.
pub fn no_match() -> HandlerOutput {
    HandlerOutput::Text(NO_MATCH_MESSAGE.to_string())
}

/// Parse table and items from the utterance, resolve each against the
/// catalog and return the accumulated summary verbatim.
pub async fn add_to_order(
    nlu: &dyn NluBackend,
    catalog: &dyn Catalog,
    utterance: &str,
) -> Result<HandlerOutput, MesaError> {
    let Some(OrderSlots { table, items }) = nlu.extract_order_slots(utterance).await? else {
        return Ok(HandlerOutput::Structured(AgentResponse {
            message: "Please tell me your table number and what you would like to order, \
                      for example 'table 2 order 1 pizza'."
                .to_string(),
            ..Default::default()
        }));
    };

    let summary = accumulator::add_items(catalog, &table, &items).await?;
    Ok(HandlerOutput::Structured(AgentResponse::from_summary(summary)))
}

/// Finalize an order. With a usable caller-supplied summary the context
/// is persisted verbatim; otherwise slots come from the utterance and
/// every item is re-resolved by exact name, no fuzzy fallback.
pub async fn confirm_order(
    nlu: &dyn NluBackend,
    catalog: &dyn Catalog,
    orders: &dyn OrderStore,
    utterance: &str,
    context: &DispatchContext,
) -> Result<HandlerOutput, MesaError> {
    if let Some(summary) = context.confirmable_summary() {
        let order = PersistedOrder::from_summary(summary)?;
        return Ok(persist_and_report(orders, order).await);
    }

    let Some(OrderSlots { table, items }) = nlu.extract_order_slots(utterance).await? else {
        return Ok(HandlerOutput::Structured(AgentResponse {
            message: CONFIRM_CLARIFICATION.to_string(),
            ..Default::default()
        }));
    };

    match validate_items(catalog, &items).await? {
        Validated::Missing(name) => Ok(HandlerOutput::Structured(AgentResponse {
            message: format!("Item '{name}' not found in menu."),
            ..Default::default()
        })),
        Validated::Lines(lines) => {
            let total = lines.iter().map(|l| l.subtotal).sum();
            let order = PersistedOrder {
                table_number: table,
                items: lines,
                total_amount: total,
                timestamp: chrono::Utc::now(),
            };
            Ok(persist_and_report(orders, order).await)
        }
    }
}

enum Validated {
    Lines(Vec<OrderLineItem>),
    Missing(String),
}

/// Exact case-insensitive re-resolution for the no-context confirmation
/// path. The first miss rejects the confirmation.
async fn validate_items(
    catalog: &dyn Catalog,
    items: &[(String, u32)],
) -> Result<Validated, MesaError> {
    let mut lines = Vec::new();
    for (name, quantity) in items {
        if *quantity == 0 {
            return Ok(Validated::Missing(name.clone()));
        }
        let Some(product) = catalog.find_by_exact_name(name).await? else {
            return Ok(Validated::Missing(name.clone()));
        };
        let subtotal = product.price * *quantity as f64;
        lines.push(OrderLineItem {
            product_id: Some(product.id),
            name: product.name,
            quantity: *quantity,
            price: product.price,
            subtotal,
            category: product.category,
            description: product.description,
            image: product.image,
        });
    }
    Ok(Validated::Lines(lines))
}

/// One atomic write; persistence failures become the fixed retry message
/// instead of propagating.
async fn persist_and_report(orders: &dyn OrderStore, order: PersistedOrder) -> HandlerOutput {
    match orders.save_order(&order).await {
        Ok(()) => {
            info!("Order confirmed for table {}", order.table_number);
            let mut response = AgentResponse::default();
            response.overwrite_from_order(
                &order,
                &format!(
                    "Order confirmed & saved for Table {}! Total bill Rs {}",
                    order.table_number, order.total_amount
                ),
                ORDER_SUMMARY_VIEW,
            );
            response.success = Some(true);
            HandlerOutput::Structured(response)
        }
        Err(e) => {
            error!("Order save failed: {e}");
            HandlerOutput::Structured(AgentResponse {
                message: CONFIRM_FAILED_MESSAGE.to_string(),
                ..Default::default()
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nlu::RegexNlu;
    use async_trait::async_trait;
    use mesa_common::order::OrderSummary;
    use mesa_common::Product;
    use std::sync::Mutex;

    struct FixedCatalog(Vec<Product>);

    #[async_trait]
    impl Catalog for FixedCatalog {
        async fn all_products(&self) -> Result<Vec<Product>, MesaError> {
            Ok(self.0.clone())
        }

        async fn find_by_exact_name(&self, name: &str) -> Result<Option<Product>, MesaError> {
            Ok(self.0.iter().find(|p| p.name_matches(name)).cloned())
        }
    }

    #[derive(Default)]
    struct RecordingStore {
        saved: Mutex<Vec<PersistedOrder>>,
        fail: bool,
    }

    #[async_trait]
    impl OrderStore for RecordingStore {
        async fn save_order(&self, order: &PersistedOrder) -> Result<(), MesaError> {
            if self.fail {
                return Err(MesaError::Upstream("database down".into()));
            }
            self.saved.lock().unwrap().push(order.clone());
            Ok(())
        }
    }

    fn catalog() -> FixedCatalog {
        FixedCatalog(vec![
            Product {
                id: "pizza".into(),
                name: "Pizza".into(),
                price: 10.0,
                category: "Mains".into(),
                description: "Wood-fired".into(),
                image: "/media/pizza.jpg".into(),
            },
            Product {
                id: "burger".into(),
                name: "Burger".into(),
                price: 8.0,
                category: "Mains".into(),
                description: String::new(),
                image: String::new(),
            },
        ])
    }

    fn context_with(table: &str, name: &str, qty: u32, price: f64) -> DispatchContext {
        DispatchContext::new(Some(OrderSummary {
            table_number: Some(table.into()),
            items: vec![OrderLineItem {
                product_id: None,
                name: name.into(),
                quantity: qty,
                price,
                subtotal: price * qty as f64,
                category: String::new(),
                description: String::new(),
                image: String::new(),
            }],
            total: price * qty as f64,
            ..Default::default()
        }))
    }

    #[tokio::test]
    async fn add_to_order_returns_summary() {
        let store = RecordingStore::default();
        let out = add_to_order(&RegexNlu, &catalog(), "table 2 order 1 pizza 2 burger")
            .await
            .unwrap();
        let HandlerOutput::Structured(resp) = out else {
            panic!("expected structured output");
        };
        assert_eq!(resp.table_number, Some("2".into()));
        assert_eq!(resp.total, 26.0);
        assert_eq!(resp.items.len(), 2);
        assert!(resp.redirect);
        assert!(store.saved.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn confirm_with_context_persists_verbatim() {
        let store = RecordingStore::default();
        let ctx = context_with("5", "Pizza", 2, 10.0);
        let out = confirm_order(&RegexNlu, &catalog(), &store, "confirm order", &ctx)
            .await
            .unwrap();

        let saved = store.saved.lock().unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].table_number.as_str(), "5");
        assert_eq!(saved[0].total_amount, 20.0);
        assert_eq!(saved[0].items[0].quantity, 2);

        let HandlerOutput::Structured(resp) = out else {
            panic!("expected structured output");
        };
        assert_eq!(resp.table_number, Some("5".into()));
        assert_eq!(resp.success, Some(true));
    }

    #[tokio::test]
    async fn confirm_without_slots_clarifies_and_persists_nothing() {
        let store = RecordingStore::default();
        let ctx = DispatchContext::default();
        let out = confirm_order(&RegexNlu, &catalog(), &store, "confirm order", &ctx)
            .await
            .unwrap();
        let HandlerOutput::Structured(resp) = out else {
            panic!("expected structured output");
        };
        assert_eq!(resp.message, CONFIRM_CLARIFICATION);
        assert!(store.saved.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn confirm_from_utterance_is_exact_match_only() {
        let store = RecordingStore::default();
        let ctx = DispatchContext::default();
        // "pizzaa" would fuzzy-resolve on the add path; confirmation rejects it
        let out = confirm_order(
            &RegexNlu,
            &catalog(),
            &store,
            "confirm order table 5 order 1 pizzaa",
            &ctx,
        )
        .await
        .unwrap();
        let HandlerOutput::Structured(resp) = out else {
            panic!("expected structured output");
        };
        assert!(resp.message.contains("'pizzaa' not found"));
        assert!(store.saved.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn confirm_from_utterance_persists_with_snapshot() {
        let store = RecordingStore::default();
        let ctx = DispatchContext::default();
        let out = confirm_order(
            &RegexNlu,
            &catalog(),
            &store,
            "confirm order table 7 order 2 pizza",
            &ctx,
        )
        .await
        .unwrap();

        let saved = store.saved.lock().unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].items[0].category, "Mains");
        assert_eq!(saved[0].items[0].description, "Wood-fired");
        assert_eq!(saved[0].total_amount, 20.0);

        let HandlerOutput::Structured(resp) = out else {
            panic!("expected structured output");
        };
        assert_eq!(resp.total, 20.0);
    }

    #[tokio::test]
    async fn persistence_failure_becomes_retry_message() {
        let store = RecordingStore {
            fail: true,
            ..Default::default()
        };
        let ctx = context_with("5", "Pizza", 1, 10.0);
        let out = confirm_order(&RegexNlu, &catalog(), &store, "confirm order", &ctx)
            .await
            .unwrap();
        let HandlerOutput::Structured(resp) = out else {
            panic!("expected structured output");
        };
        assert_eq!(resp.message, CONFIRM_FAILED_MESSAGE);
    }
}
