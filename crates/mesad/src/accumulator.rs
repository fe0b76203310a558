//! Order accumulation: validate (name, quantity) pairs against the
//! catalog and fold them into one running order summary.
//!
//! Partial success is the normal case. Unresolved items are reported
//! inline in the summary message and never contribute to the total.

use mesa_common::error::MesaError;
use mesa_common::order::{OrderLineItem, OrderSummary, TableNumber};
use mesa_common::{Product, ORDER_SUMMARY_VIEW};

use crate::db::Catalog;
use crate::matcher;

/// Outcome of resolving a single (name, quantity) pair.
#[derive(Debug, Clone, PartialEq)]
pub enum LineResult {
    Resolved { item: OrderLineItem, message: String },
    NotFound { name: String, message: String },
}

fn line_from_product(product: &Product, quantity: u32) -> OrderLineItem {
    let subtotal = product.price * quantity as f64;
    OrderLineItem {
        product_id: Some(product.id.clone()),
        name: product.name.clone(),
        quantity,
        price: product.price,
        subtotal,
        category: product.category.clone(),
        description: product.description.clone(),
        image: product.image.clone(),
    }
}

fn resolve_line(table: &TableNumber, name: &str, quantity: u32, catalog: &[Product]) -> LineResult {
    match matcher::resolve(name, catalog) {
        Some(product) => {
            let item = line_from_product(product, quantity);
            let message = format!(
                "{} x {} (Rs {} each) added to Table {}'s order. Total Rs {}.",
                quantity, item.name, item.price, table, item.subtotal
            );
            LineResult::Resolved { item, message }
        }
        None => LineResult::NotFound {
            name: name.to_string(),
            message: format!("Sorry, {name} is not available in our menu."),
        },
    }
}

/// Resolve one item against the catalog. Non-positive quantities are
/// rejected at this boundary rather than producing a zero-priced line.
pub async fn add_item(
    catalog: &dyn Catalog,
    table: &TableNumber,
    name: &str,
    quantity: u32,
) -> Result<LineResult, MesaError> {
    if quantity == 0 {
        return Err(MesaError::Validation(format!(
            "quantity for {name} must be at least 1"
        )));
    }
    let products = catalog.all_products().await?;
    Ok(resolve_line(table, name, quantity, &products))
}

/// Resolve a batch of (name, quantity) pairs into one order summary.
/// Each pair is resolved independently; a miss never aborts the rest.
pub async fn add_items(
    catalog: &dyn Catalog,
    table: &TableNumber,
    pairs: &[(String, u32)],
) -> Result<OrderSummary, MesaError> {
    let products = catalog.all_products().await?;

    let mut summary = OrderSummary {
        table_number: Some(table.clone()),
        redirect: true,
        redirect_url: Some(ORDER_SUMMARY_VIEW.to_string()),
        ..Default::default()
    };
    let mut messages = Vec::new();

    for (name, quantity) in pairs {
        if *quantity == 0 {
            messages.push(format!("Quantity for {name} must be at least 1."));
            continue;
        }
        match resolve_line(table, name, *quantity, &products) {
            LineResult::Resolved { item, message } => {
                summary.total += item.subtotal;
                summary.items.push(item);
                messages.push(message);
            }
            LineResult::NotFound { message, .. } => messages.push(message),
        }
    }

    summary.message = messages.join(" ");
    Ok(summary)
}
