//! Mesa daemon - restaurant ordering backend.
//!
//! Serves the menu/deals catalog, persists confirmed orders, and routes
//! conversational requests through an intent dispatcher to one of four
//! handlers, normalizing whatever comes back into one wire contract.

pub mod accumulator;
pub mod config;
pub mod db;
pub mod dispatcher;
pub mod handlers;
pub mod llm;
pub mod matcher;
pub mod media;
pub mod nlu;
pub mod normalizer;
pub mod routes;
pub mod server;
pub mod speech;
