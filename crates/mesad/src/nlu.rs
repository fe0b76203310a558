//! The NLU seam: intent classification and order-slot extraction behind a
//! narrow trait, so the deterministic pipeline stays testable without a
//! live model.
//!
//! Two backends: a regex grammar for the `table <N> order <qty> <item>...`
//! shape, and an Ollama-backed extractor that only runs when the grammar
//! comes up empty. Malformed model output falls back to the deterministic
//! answer, never to an error.

use async_trait::async_trait;
use mesa_common::error::MesaError;
use mesa_common::order::TableNumber;
use regex::Regex;
use std::sync::OnceLock;
use tracing::{debug, warn};

use crate::dispatcher::{classify_intent, Intent};
use crate::llm::OllamaClient;

/// Slots a conversational order utterance must yield: a table and a
/// non-empty (name, quantity) list.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderSlots {
    pub table: TableNumber,
    pub items: Vec<(String, u32)>,
}

#[async_trait]
pub trait NluBackend: Send + Sync {
    /// Classify an utterance into an intent.
    async fn classify(&self, utterance: &str) -> Result<Intent, MesaError>;

    /// Pull a table number and item list out of free text, if possible.
    async fn extract_order_slots(&self, utterance: &str)
        -> Result<Option<OrderSlots>, MesaError>;
}

// ---------------------------------------------------------------------------
// Deterministic backend
// ---------------------------------------------------------------------------

fn table_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"table\s*(?:no\.?|number)?\s*#?(\d+)").unwrap())
}

fn order_tail_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\border\b[:\s]+(.+)$").unwrap())
}

const FILLER_WORDS: [&str; 7] = ["x", "of", "a", "an", "the", "some", "please"];

/// Parse the item tail: quantities start a new item, bare names default to
/// quantity 1, "and"/commas separate items.
fn parse_item_tail(tail: &str) -> Vec<(String, u32)> {
    let mut items = Vec::new();
    let mut quantity: Option<u32> = None;
    let mut name_words: Vec<&str> = Vec::new();

    let mut flush = |quantity: &mut Option<u32>, name_words: &mut Vec<&str>| {
        if !name_words.is_empty() {
            items.push((name_words.join(" "), quantity.unwrap_or(1)));
        }
        *quantity = None;
        name_words.clear();
    };

    for raw in tail.split_whitespace() {
        let token = raw.trim_matches(|c: char| c.is_ascii_punctuation());
        if token.is_empty() {
            if raw.contains(',') {
                flush(&mut quantity, &mut name_words);
            }
            continue;
        }
        if let Ok(n) = token.parse::<u32>() {
            flush(&mut quantity, &mut name_words);
            quantity = Some(n);
        } else if token.eq_ignore_ascii_case("and") || token.eq_ignore_ascii_case("plus") {
            flush(&mut quantity, &mut name_words);
        } else if FILLER_WORDS.iter().any(|w| token.eq_ignore_ascii_case(w)) {
            // "2 x burger", "order a pizza please"
        } else {
            name_words.push(token);
            if raw.ends_with(',') {
                flush(&mut quantity, &mut name_words);
            }
        }
    }
    flush(&mut quantity, &mut name_words);
    items
}

/// Deterministic slot extraction over the compound order grammar.
pub fn extract_slots(utterance: &str) -> Option<OrderSlots> {
    let lower = utterance.to_lowercase();
    let table_match = table_regex().captures(&lower)?;
    let table = table_match.get(1)?.as_str().to_string();
    // The item list follows the "order" that comes after the table
    // mention ("table 2 order 1 pizza"); confirmation phrasings put the
    // items right after the table instead ("confirm order table 2, 1
    // pizza"), so the remainder is the fallback tail.
    let after_table = &lower[table_match.get(0)?.end()..];
    let tail = match order_tail_regex().captures(after_table) {
        Some(caps) => caps.get(1)?.as_str(),
        None => after_table,
    };
    let items = parse_item_tail(tail);
    if items.is_empty() {
        return None;
    }
    Some(OrderSlots {
        table: TableNumber(table),
        items,
    })
}

/// Keyword/regex-only backend. What the daemon runs when the model is
/// disabled, and what every test runs against.
#[derive(Debug, Default)]
pub struct RegexNlu;

#[async_trait]
impl NluBackend for RegexNlu {
    async fn classify(&self, utterance: &str) -> Result<Intent, MesaError> {
        Ok(classify_intent(utterance))
    }

    async fn extract_order_slots(
        &self,
        utterance: &str,
    ) -> Result<Option<OrderSlots>, MesaError> {
        Ok(extract_slots(utterance))
    }
}

// ---------------------------------------------------------------------------
// Ollama backend
// ---------------------------------------------------------------------------

/// Model-assisted backend. Deterministic rules run first and win; the
/// model is only consulted for utterances they cannot read.
pub struct OllamaNlu {
    client: OllamaClient,
}

impl OllamaNlu {
    pub fn new(client: OllamaClient) -> Self {
        Self { client }
    }

    async fn model_slots(&self, utterance: &str) -> Result<Option<OrderSlots>, MesaError> {
        let prompt = format!(
            "Extract the table number and ordered items from this restaurant \
             utterance. Respond with JSON only, shaped as \
             {{\"table_number\": \"<number or null>\", \
             \"items\": [{{\"name\": \"<item>\", \"quantity\": <n>}}]}}.\n\
             Utterance: {utterance}"
        );
        let raw = self.client.generate(&prompt).await?;
        match parse_model_slots(&raw) {
            Ok(slots) => Ok(slots),
            Err(e) => {
                // Recovered locally: bad model output is not the caller's problem
                warn!("Slot extraction output unusable: {e}");
                Ok(None)
            }
        }
    }
}

fn parse_model_slots(raw: &str) -> Result<Option<OrderSlots>, MesaError> {
    #[derive(serde::Deserialize)]
    struct RawItem {
        name: String,
        #[serde(default)]
        quantity: Option<u32>,
    }
    #[derive(serde::Deserialize)]
    struct RawSlots {
        #[serde(default)]
        table_number: Option<TableNumber>,
        #[serde(default)]
        items: Vec<RawItem>,
    }

    let parsed: RawSlots = serde_json::from_str(raw.trim())
        .map_err(|e| MesaError::MalformedOutput(e.to_string()))?;
    let Some(table) = parsed.table_number else {
        return Ok(None);
    };
    let items: Vec<(String, u32)> = parsed
        .items
        .into_iter()
        .filter(|i| !i.name.trim().is_empty())
        .map(|i| (i.name.trim().to_string(), i.quantity.unwrap_or(1)))
        .collect();
    if items.is_empty() {
        return Ok(None);
    }
    Ok(Some(OrderSlots { table, items }))
}

#[async_trait]
impl NluBackend for OllamaNlu {
    async fn classify(&self, utterance: &str) -> Result<Intent, MesaError> {
        let deterministic = classify_intent(utterance);
        if deterministic != Intent::NoMatch {
            return Ok(deterministic);
        }
        let prompt = format!(
            "Classify this restaurant utterance. Respond with JSON only: \
             {{\"intent\": \"greeting\" | \"show_menu\" | \"add_to_order\" | \
             \"confirm_order\" | \"none\"}}.\nUtterance: {utterance}"
        );
        let raw = self.client.generate(&prompt).await?;
        let intent = serde_json::from_str::<serde_json::Value>(raw.trim())
            .ok()
            .and_then(|v| {
                v.get("intent")
                    .and_then(|i| i.as_str())
                    .and_then(Intent::from_tag)
            })
            .unwrap_or(Intent::NoMatch);
        debug!("Model classified '{utterance}' as {intent:?}");
        Ok(intent)
    }

    async fn extract_order_slots(
        &self,
        utterance: &str,
    ) -> Result<Option<OrderSlots>, MesaError> {
        if let Some(slots) = extract_slots(utterance) {
            return Ok(Some(slots));
        }
        self.model_slots(utterance).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compound_order_parses() {
        let slots = extract_slots("table 2 order 1 pizza 2 burger").unwrap();
        assert_eq!(slots.table.as_str(), "2");
        assert_eq!(
            slots.items,
            vec![("pizza".to_string(), 1), ("burger".to_string(), 2)]
        );
    }

    #[test]
    fn multiword_items_and_separators() {
        let slots = extract_slots("table 12 order 1 chinese rice and 2 hot soup").unwrap();
        assert_eq!(slots.table.as_str(), "12");
        assert_eq!(
            slots.items,
            vec![("chinese rice".to_string(), 1), ("hot soup".to_string(), 2)]
        );
    }

    #[test]
    fn bare_item_defaults_to_one() {
        let slots = extract_slots("table 4 order pizza").unwrap();
        assert_eq!(slots.items, vec![("pizza".to_string(), 1)]);
    }

    #[test]
    fn comma_separated_items() {
        let slots = extract_slots("table 3 order pizza, burger").unwrap();
        assert_eq!(
            slots.items,
            vec![("pizza".to_string(), 1), ("burger".to_string(), 1)]
        );
    }

    #[test]
    fn missing_table_yields_none() {
        assert!(extract_slots("order 2 pizza").is_none());
        assert!(extract_slots("table 2 please").is_none());
    }

    #[test]
    fn model_slot_output_parses() {
        let raw = r#"{"table_number": 5, "items": [{"name": "Pizza", "quantity": 2}]}"#;
        let slots = parse_model_slots(raw).unwrap().unwrap();
        assert_eq!(slots.table.as_str(), "5");
        assert_eq!(slots.items, vec![("Pizza".to_string(), 2)]);
    }

    #[test]
    fn malformed_model_output_is_an_error_not_a_panic() {
        assert!(matches!(
            parse_model_slots("not json"),
            Err(MesaError::MalformedOutput(_))
        ));
    }

    #[test]
    fn model_output_without_table_is_unusable() {
        let raw = r#"{"items": [{"name": "Pizza"}]}"#;
        assert_eq!(parse_model_slots(raw).unwrap(), None);
    }
}
