//! Shared types for the mesa restaurant backend.
//!
//! Used by both the daemon (mesad) and the CLI client (mesactl).

pub mod error;
pub mod menu;
pub mod order;
pub mod response;

pub use error::MesaError;
pub use menu::Product;
pub use order::{DispatchContext, OrderLineItem, OrderSummary, PersistedOrder};
pub use response::AgentResponse;

/// Default port the daemon listens on.
pub const DEFAULT_PORT: u16 = 7860;

/// Client-side route the frontend shows the menu on.
pub const MENU_VIEW: &str = "/menu";

/// Client-side route the frontend shows the running order on.
pub const ORDER_SUMMARY_VIEW: &str = "/order_summary";
