//! Response normalization - the last stop before the wire.
//!
//! Reconciles whatever came back from the dispatch (structured response,
//! plain text, or text wrapping a fenced JSON block) into the canonical
//! shape, infers redirects the handler forgot, re-runs confirmation from
//! context as a safety net, and voices the final message.

use mesa_common::order::{DispatchContext, PersistedOrder};
use mesa_common::{AgentResponse, MENU_VIEW, ORDER_SUMMARY_VIEW};
use tracing::{error, warn};

use crate::db::OrderStore;
use crate::handlers::{HandlerOutput, CONFIRM_CLARIFICATION, CONFIRM_FAILED_MESSAGE};
use crate::speech::SpeechService;

pub const CONFIRM_SAVED_MESSAGE: &str = "Order confirmed and saved successfully!";

/// Strip a ```json fence (or a bare fence) wrapping the whole string.
fn strip_fence(text: &str) -> &str {
    let trimmed = text.trim();
    for prefix in ["```json", "```"] {
        if let Some(inner) = trimmed.strip_prefix(prefix) {
            if let Some(inner) = inner.strip_suffix("```") {
                return inner.trim();
            }
        }
    }
    trimmed
}

/// Steps 1-5: everything except speech synthesis. Pure for fixed inputs
/// except the safety-net persistence.
async fn canonicalize(
    raw: &HandlerOutput,
    utterance: &str,
    context: &DispatchContext,
    orders: &dyn OrderStore,
) -> AgentResponse {
    let mut response = AgentResponse::default();

    match raw {
        HandlerOutput::Structured(structured) => {
            // The discriminant guarantees the recognized field set
            response.message = structured.message.clone();
            response.redirect = structured.redirect;
            response.redirect_url = structured.redirect_url.clone();
            response.table_number = structured.table_number.clone();
            response.items = structured.items.clone();
            response.total = structured.total;
            response.success = structured.success;
        }
        HandlerOutput::Text(text) => {
            match serde_json::from_str::<serde_json::Value>(strip_fence(text)) {
                Ok(value) if value.is_object() => response.apply_fields(&value),
                // Recovered locally: unparseable output is just a message
                _ => response.message = text.clone(),
            }
        }
    }

    // Redirect inference over the original utterance, a safety net for
    // handlers that answered in free text
    let question = utterance.to_lowercase();
    if !response.redirect {
        if question.contains("menu") {
            response.redirect = true;
            response.redirect_url = Some(MENU_VIEW.to_string());
        } else if question.contains("order") {
            response.redirect = true;
            response.redirect_url = Some(ORDER_SUMMARY_VIEW.to_string());
        }
    }

    // Re-confirmation safety net: a "confirm order" utterance with a
    // usable context must persist even if the dispatch path went astray.
    // A handler that already saved reports success, so this only fires
    // when that did not happen.
    if question.contains("confirm order") && response.success != Some(true) {
        match context.confirmable_summary() {
            Some(summary) => match PersistedOrder::from_summary(summary) {
                Ok(order) => match orders.save_order(&order).await {
                    Ok(()) => {
                        response.overwrite_from_order(
                            &order,
                            CONFIRM_SAVED_MESSAGE,
                            ORDER_SUMMARY_VIEW,
                        );
                    }
                    Err(e) => {
                        error!("Safety-net order save failed: {e}");
                        response.message = CONFIRM_FAILED_MESSAGE.to_string();
                    }
                },
                Err(e) => {
                    warn!("Context summary not persistable: {e}");
                    response.message = CONFIRM_CLARIFICATION.to_string();
                }
            },
            None => response.message = CONFIRM_CLARIFICATION.to_string(),
        }
    }

    response
}

/// Full normalization including speech synthesis of the final message.
/// Synthesis failures degrade to a voiceless response rather than failing
/// a request that already has its answer.
pub async fn normalize(
    raw: &HandlerOutput,
    utterance: &str,
    context: &DispatchContext,
    orders: &dyn OrderStore,
    speech: Option<&dyn SpeechService>,
) -> AgentResponse {
    let mut response = canonicalize(raw, utterance, context, orders).await;

    if !response.message.is_empty() {
        if let Some(speech) = speech {
            match speech.synthesize(&response.message).await {
                Ok(file) => response.audio_url = Some(format!("/agent-audio?file={file}")),
                Err(e) => warn!("Speech synthesis failed: {e}"),
            }
        }
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mesa_common::error::MesaError;
    use mesa_common::order::{OrderLineItem, OrderSummary};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingStore {
        saved: Mutex<Vec<PersistedOrder>>,
    }

    #[async_trait]
    impl OrderStore for RecordingStore {
        async fn save_order(&self, order: &PersistedOrder) -> Result<(), MesaError> {
            self.saved.lock().unwrap().push(order.clone());
            Ok(())
        }
    }

    fn summary_context() -> DispatchContext {
        DispatchContext::new(Some(OrderSummary {
            table_number: Some("5".into()),
            items: vec![OrderLineItem {
                product_id: None,
                name: "Pizza".into(),
                quantity: 2,
                price: 10.0,
                subtotal: 20.0,
                category: String::new(),
                description: String::new(),
                image: String::new(),
            }],
            total: 20.0,
            ..Default::default()
        }))
    }

    #[tokio::test]
    async fn plain_text_becomes_the_message() {
        let store = RecordingStore::default();
        let raw = HandlerOutput::Text("Hello there".into());
        let resp = normalize(&raw, "hello", &DispatchContext::default(), &store, None).await;
        assert_eq!(resp.message, "Hello there");
        assert!(!resp.redirect);
        assert_eq!(resp.total, 0.0);
    }

    #[tokio::test]
    async fn fenced_json_text_is_unwrapped() {
        let store = RecordingStore::default();
        let raw = HandlerOutput::Text(
            "```json\n{\"message\": \"done\", \"total\": 12.0}\n```".into(),
        );
        let resp = normalize(&raw, "hello", &DispatchContext::default(), &store, None).await;
        assert_eq!(resp.message, "done");
        assert_eq!(resp.total, 12.0);
    }

    #[tokio::test]
    async fn unparseable_json_stays_verbatim() {
        let store = RecordingStore::default();
        let raw = HandlerOutput::Text("```json\n{broken\n```".into());
        let resp = normalize(&raw, "hello", &DispatchContext::default(), &store, None).await;
        assert_eq!(resp.message, "```json\n{broken\n```");
    }

    #[tokio::test]
    async fn menu_utterance_forces_redirect() {
        let store = RecordingStore::default();
        let raw = HandlerOutput::Text("Here are some dishes you might like".into());
        let resp = normalize(
            &raw,
            "mujhe menu dikhao",
            &DispatchContext::default(),
            &store,
            None,
        )
        .await;
        assert!(resp.redirect);
        assert_eq!(resp.redirect_url.as_deref(), Some(MENU_VIEW));
    }

    #[tokio::test]
    async fn order_utterance_redirects_to_summary() {
        let store = RecordingStore::default();
        let raw = HandlerOutput::Text("Sure".into());
        let resp = normalize(
            &raw,
            "mera order kahan hai",
            &DispatchContext::default(),
            &store,
            None,
        )
        .await;
        assert_eq!(resp.redirect_url.as_deref(), Some(ORDER_SUMMARY_VIEW));
    }

    #[tokio::test]
    async fn handler_redirect_is_not_overridden() {
        let store = RecordingStore::default();
        let raw = HandlerOutput::Structured(AgentResponse {
            message: "Ok".into(),
            redirect: true,
            redirect_url: Some("/somewhere".into()),
            ..Default::default()
        });
        let resp = normalize(&raw, "show menu", &DispatchContext::default(), &store, None).await;
        assert_eq!(resp.redirect_url.as_deref(), Some("/somewhere"));
    }

    #[tokio::test]
    async fn confirm_safety_net_persists_from_context() {
        let store = RecordingStore::default();
        // Handler output that plainly failed to do the confirmation
        let raw = HandlerOutput::Text("I am not sure what you mean".into());
        let resp = normalize(&raw, "confirm order", &summary_context(), &store, None).await;

        let saved = store.saved.lock().unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].total_amount, 20.0);
        assert_eq!(resp.message, CONFIRM_SAVED_MESSAGE);
        assert_eq!(resp.table_number, Some("5".into()));
        assert_eq!(resp.total, 20.0);
        assert!(resp.redirect);
    }

    #[tokio::test]
    async fn confirm_safety_net_skips_when_handler_succeeded() {
        let store = RecordingStore::default();
        let raw = HandlerOutput::Structured(AgentResponse {
            message: "Order confirmed & saved for Table 5! Total bill Rs 20".into(),
            success: Some(true),
            ..Default::default()
        });
        let resp = normalize(&raw, "confirm order", &summary_context(), &store, None).await;
        assert!(store.saved.lock().unwrap().is_empty());
        assert!(resp.message.contains("Order confirmed & saved"));
    }

    #[tokio::test]
    async fn confirm_without_usable_context_clarifies() {
        let store = RecordingStore::default();
        let raw = HandlerOutput::Text("hmm".into());
        let resp = normalize(&raw, "confirm order", &DispatchContext::default(), &store, None)
            .await;
        assert_eq!(resp.message, CONFIRM_CLARIFICATION);
        assert!(store.saved.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn normalization_is_idempotent() {
        let store = RecordingStore::default();
        let raw = HandlerOutput::Text("Here is your answer".into());
        let ctx = DispatchContext::default();
        let first = normalize(&raw, "show me menu", &ctx, &store, None).await;
        let second = normalize(&raw, "show me menu", &ctx, &store, None).await;
        assert_eq!(first, second);
    }
}
