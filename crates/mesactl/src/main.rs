//! Mesa Control - CLI client for the mesa daemon.
//!
//! Talks to mesad over HTTP. The `ask` command keeps the running order
//! summary in a local context file so multi-turn ordering works from the
//! shell: add items with one invocation, `ask "confirm order"` with the
//! next.

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use mesa_common::{AgentResponse, OrderSummary};
use owo_colors::OwoColorize;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mesactl")]
#[command(about = "Mesa - restaurant ordering assistant", long_about = None)]
#[command(version)]
struct Cli {
    /// Daemon base URL
    #[arg(long, default_value = "http://127.0.0.1:7860")]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show daemon health
    Health,

    /// List the menu, grouped by category
    Menu,

    /// List current deals
    Deals,

    /// List confirmed orders
    Orders,

    /// Send an utterance to the assistant
    Ask {
        /// What to say, e.g. "table 2 order 1 pizza"
        utterance: String,

        /// Context file holding the running order summary
        #[arg(long, default_value = "/tmp/mesa-order.json")]
        context: PathBuf,

        /// Do not carry the returned summary into the context file
        #[arg(long)]
        no_save: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    match cli.command {
        Commands::Health => {
            let health: serde_json::Value = client
                .get(format!("{}/v1/health", cli.server))
                .send()
                .await
                .context("Is mesad running?")?
                .json()
                .await?;
            println!("{}", serde_json::to_string_pretty(&health)?);
        }
        Commands::Menu => print_catalog(&client, &cli.server, "products").await?,
        Commands::Deals => print_catalog(&client, &cli.server, "deals").await?,
        Commands::Orders => {
            let orders: serde_json::Value = client
                .get(format!("{}/orders", cli.server))
                .send()
                .await?
                .json()
                .await?;
            println!("{}", serde_json::to_string_pretty(&orders)?);
        }
        Commands::Ask {
            utterance,
            context,
            no_save,
        } => ask(&client, &cli.server, &utterance, &context, no_save).await?,
    }
    Ok(())
}

async fn print_catalog(client: &reqwest::Client, server: &str, path: &str) -> Result<()> {
    let catalog: serde_json::Value = client
        .get(format!("{server}/{path}"))
        .send()
        .await
        .context("Is mesad running?")?
        .json()
        .await?;
    let Some(categories) = catalog.as_object() else {
        return Err(anyhow!("unexpected catalog shape"));
    };
    for (category, items) in categories {
        println!("{}", category.bold());
        for item in items.as_array().into_iter().flatten() {
            let name = item.get("name").and_then(|n| n.as_str()).unwrap_or("?");
            let price = item.get("price").and_then(|p| p.as_f64()).unwrap_or(0.0);
            println!("  {name}  {}", format!("Rs {price}").green());
        }
    }
    Ok(())
}

async fn ask(
    client: &reqwest::Client,
    server: &str,
    utterance: &str,
    context_path: &PathBuf,
    no_save: bool,
) -> Result<()> {
    let mut form = reqwest::multipart::Form::new().text("question", utterance.to_string());
    if let Ok(saved) = std::fs::read_to_string(context_path) {
        form = form.text("order_summary", saved);
    }

    let response = client
        .post(format!("{server}/agent"))
        .multipart(form)
        .send()
        .await
        .context("Is mesad running?")?;
    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(anyhow!("{status}: {body}"));
    }
    let agent: AgentResponse = response.json().await?;

    println!("{}", agent.message.bold());
    if let Some(table) = &agent.table_number {
        println!("Table {table}");
    }
    for item in &agent.items {
        println!(
            "  {} x {}  {}",
            item.quantity,
            item.name,
            format!("Rs {}", item.subtotal).green()
        );
    }
    if agent.total > 0.0 {
        println!("Total: {}", format!("Rs {}", agent.total).green().bold());
    }
    if agent.redirect {
        if let Some(url) = &agent.redirect_url {
            println!("{} {url}", "Go to:".dimmed());
        }
    }

    // Carry the summary forward so the next turn can confirm it
    if !no_save {
        if agent.success == Some(true) {
            let _ = std::fs::remove_file(context_path);
        } else if !agent.items.is_empty() {
            let summary = OrderSummary {
                table_number: agent.table_number.clone(),
                items: agent.items.clone(),
                total: agent.total,
                ..Default::default()
            };
            std::fs::write(context_path, serde_json::to_string(&summary)?)
                .with_context(|| format!("write {}", context_path.display()))?;
        }
    }
    Ok(())
}
