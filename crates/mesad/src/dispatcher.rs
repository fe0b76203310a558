//! Intent dispatch - one entry point that classifies an utterance and
//! hands it to the matching handler.
//!
//! Deterministic keyword routing runs first and wins for the known
//! intents; the NLU backend is consulted only when no rule fires. Each
//! request starts fresh here - nothing persists between turns except the
//! caller-supplied context, which is forwarded to the handler untouched.

use mesa_common::error::MesaError;
use mesa_common::order::DispatchContext;
use regex::Regex;
use std::sync::OnceLock;
use tracing::info;

use crate::db::{Catalog, OrderStore};
use crate::handlers::{self, HandlerOutput};
use crate::nlu::NluBackend;

/// The four terminal handoffs plus the explicit no-match outcome the
/// normalizer renders as a clarification prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Greeting,
    ShowMenu,
    AddToOrder,
    ConfirmOrder,
    NoMatch,
}

impl Intent {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "greeting" => Some(Self::Greeting),
            "show_menu" => Some(Self::ShowMenu),
            "add_to_order" => Some(Self::AddToOrder),
            "confirm_order" => Some(Self::ConfirmOrder),
            "none" => Some(Self::NoMatch),
            _ => None,
        }
    }
}

const GREETING_WORDS: [&str; 6] = ["hello", "hi", "hey", "salam", "salaam", "assalamualaikum"];

const CONFIRM_PHRASES: [&str; 8] = [
    "confirm order",
    "confirm my order",
    "finalize order",
    "place order",
    "place my order",
    "submit order",
    "done with order",
    "complete my order",
];

fn compound_order_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"table\s*(?:no\.?|number)?\s*#?\d+.*\border\b").unwrap())
}

/// Priority keyword classification, first match wins. Returns NoMatch
/// when no rule can justify a handler.
pub fn classify_intent(utterance: &str) -> Intent {
    let q = utterance.to_lowercase();

    if q.split(|c: char| !c.is_alphanumeric())
        .any(|word| GREETING_WORDS.contains(&word))
    {
        return Intent::Greeting;
    }

    if q.contains("menu") || q.contains("show me food") {
        return Intent::ShowMenu;
    }

    if compound_order_regex().is_match(&q) {
        return Intent::AddToOrder;
    }

    if CONFIRM_PHRASES.iter().any(|p| q.contains(p)) {
        return Intent::ConfirmOrder;
    }

    Intent::NoMatch
}

/// Classify and run the matching handler. The context is forwarded to the
/// selected handler as-is; the dispatcher never mutates it.
pub async fn dispatch(
    nlu: &dyn NluBackend,
    catalog: &dyn Catalog,
    orders: &dyn OrderStore,
    utterance: &str,
    context: &DispatchContext,
) -> Result<HandlerOutput, MesaError> {
    let mut intent = classify_intent(utterance);
    if intent == Intent::NoMatch {
        intent = nlu.classify(utterance).await?;
    }
    info!("Dispatching '{utterance}' as {intent:?}");

    match intent {
        Intent::Greeting => Ok(handlers::greeting()),
        Intent::ShowMenu => Ok(handlers::show_menu()),
        Intent::AddToOrder => handlers::add_to_order(nlu, catalog, utterance).await,
        Intent::ConfirmOrder => {
            handlers::confirm_order(nlu, catalog, orders, utterance, context).await
        }
        Intent::NoMatch => Ok(handlers::no_match()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn greetings_route_first() {
        assert_eq!(classify_intent("hello"), Intent::Greeting);
        assert_eq!(classify_intent("Salam, kya haal hai"), Intent::Greeting);
        // "hi" must match as a word, not inside other words
        assert_eq!(classify_intent("chicken karahi menu"), Intent::ShowMenu);
    }

    #[test]
    fn menu_keywords_route_to_show_menu() {
        assert_eq!(classify_intent("show me menu"), Intent::ShowMenu);
        assert_eq!(classify_intent("mujhe menu dikhao"), Intent::ShowMenu);
        assert_eq!(classify_intent("show me foods please"), Intent::ShowMenu);
    }

    #[test]
    fn compound_order_routes_to_add() {
        assert_eq!(
            classify_intent("table 2 order 1 pizza 2 burger"),
            Intent::AddToOrder
        );
        assert_eq!(
            classify_intent("Table no. 12 order chinese rice"),
            Intent::AddToOrder
        );
    }

    #[test]
    fn confirmation_phrases_route_to_confirm() {
        assert_eq!(classify_intent("confirm order"), Intent::ConfirmOrder);
        assert_eq!(classify_intent("ok confirm order"), Intent::ConfirmOrder);
        assert_eq!(classify_intent("please place my order"), Intent::ConfirmOrder);
        assert_eq!(classify_intent("finalize order now"), Intent::ConfirmOrder);
    }

    #[test]
    fn bare_order_without_table_is_no_match() {
        // "order" alone cannot justify the add handler
        assert_eq!(classify_intent("what about my order"), Intent::NoMatch);
        assert_eq!(classify_intent("the weather is nice"), Intent::NoMatch);
    }
}
