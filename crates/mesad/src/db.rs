//! SQLite-backed catalog and order stores.
//!
//! One connection behind a mutex, WAL mode for concurrent readers. The
//! original deployment kept these collections in a document store; here
//! order line items live in a JSON column and everything else is columns.

use async_trait::async_trait;
use mesa_common::error::MesaError;
use mesa_common::order::{PersistedOrder, TableNumber};
use mesa_common::Product;
use rusqlite::{params, Connection};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

/// Catalog lookup surface the conversational core consumes.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Every product, flattened across categories, in insertion order.
    async fn all_products(&self) -> Result<Vec<Product>, MesaError>;

    /// Exact case-insensitive name lookup. No fuzzy fallback here.
    async fn find_by_exact_name(&self, name: &str) -> Result<Option<Product>, MesaError>;
}

/// Order persistence surface the conversational core consumes.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Write one confirmed order. A single atomic insert; either the full
    /// order lands or nothing does.
    async fn save_order(&self, order: &PersistedOrder) -> Result<(), MesaError>;
}

/// Which catalog collection a record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogKind {
    Product,
    Deal,
}

impl CatalogKind {
    fn table(self) -> &'static str {
        match self {
            CatalogKind::Product => "products",
            CatalogKind::Deal => "deals",
        }
    }
}

pub struct MenuDb {
    conn: Arc<Mutex<Connection>>,
    path: PathBuf,
}

impl MenuDb {
    /// Open or create the database, applying the schema.
    pub async fn open(path: &Path) -> Result<Self, MesaError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        info!("Opening menu database at {}", path.display());

        let db_path = path.to_path_buf();
        let conn = tokio::task::spawn_blocking(move || -> Result<Connection, MesaError> {
            let conn = Connection::open(&db_path)
                .map_err(|e| MesaError::Upstream(format!("open database: {e}")))?;
            conn.pragma_update(None, "journal_mode", "WAL")
                .map_err(|e| MesaError::Upstream(format!("enable WAL: {e}")))?;
            conn.pragma_update(None, "synchronous", "NORMAL")
                .map_err(|e| MesaError::Upstream(format!("set synchronous: {e}")))?;
            Ok(conn)
        })
        .await
        .map_err(|e| MesaError::Upstream(format!("database task: {e}")))??;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
            path: path.to_path_buf(),
        };
        db.init_schema().await?;
        Ok(db)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn init_schema(&self) -> Result<(), MesaError> {
        let conn = self.conn.lock().await;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS products (
                 id          TEXT PRIMARY KEY,
                 name        TEXT NOT NULL,
                 price       REAL NOT NULL,
                 category    TEXT NOT NULL,
                 description TEXT NOT NULL DEFAULT '',
                 image       TEXT NOT NULL DEFAULT ''
             );
             CREATE TABLE IF NOT EXISTS deals (
                 id          TEXT PRIMARY KEY,
                 name        TEXT NOT NULL,
                 price       REAL NOT NULL,
                 category    TEXT NOT NULL,
                 description TEXT NOT NULL DEFAULT '',
                 image       TEXT NOT NULL DEFAULT ''
             );
             CREATE TABLE IF NOT EXISTS orders (
                 id           TEXT PRIMARY KEY,
                 table_number TEXT NOT NULL,
                 items        TEXT NOT NULL,
                 total_amount REAL NOT NULL,
                 timestamp    TEXT NOT NULL
             );",
        )
        .map_err(|e| MesaError::Upstream(format!("init schema: {e}")))?;
        Ok(())
    }

    /// Insert a new catalog record, returning its generated id.
    pub async fn add_item(
        &self,
        kind: CatalogKind,
        name: &str,
        price: f64,
        category: &str,
        description: &str,
        image: &str,
    ) -> Result<String, MesaError> {
        let id = Uuid::new_v4().to_string();
        let conn = self.conn.lock().await;
        conn.execute(
            &format!(
                "INSERT INTO {} (id, name, price, category, description, image)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                kind.table()
            ),
            params![id, name, price, category, description, image],
        )
        .map_err(|e| MesaError::Upstream(format!("insert {}: {e}", kind.table())))?;
        Ok(id)
    }

    /// All records of one kind, grouped by category. BTreeMap keeps the
    /// category ordering stable for clients.
    pub async fn list_by_category(
        &self,
        kind: CatalogKind,
    ) -> Result<BTreeMap<String, Vec<Product>>, MesaError> {
        let items = self.list_flat(kind).await?;
        let mut grouped: BTreeMap<String, Vec<Product>> = BTreeMap::new();
        for item in items {
            let category = if item.category.is_empty() {
                "Uncategorized".to_string()
            } else {
                item.category.clone()
            };
            grouped.entry(category).or_default().push(item);
        }
        Ok(grouped)
    }

    async fn list_flat(&self, kind: CatalogKind) -> Result<Vec<Product>, MesaError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT id, name, price, category, description, image
                 FROM {} ORDER BY rowid",
                kind.table()
            ))
            .map_err(|e| MesaError::Upstream(format!("prepare list: {e}")))?;
        let rows = stmt
            .query_map([], row_to_product)
            .map_err(|e| MesaError::Upstream(format!("list {}: {e}", kind.table())))?;
        let mut items = Vec::new();
        for row in rows {
            items.push(row.map_err(|e| MesaError::Upstream(format!("read row: {e}")))?);
        }
        Ok(items)
    }

    /// Direct single-record lookup; distinct not-found status per the
    /// error contract.
    pub async fn get_item(&self, kind: CatalogKind, id: &str) -> Result<Product, MesaError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT id, name, price, category, description, image
                 FROM {} WHERE id = ?1",
                kind.table()
            ))
            .map_err(|e| MesaError::Upstream(format!("prepare get: {e}")))?;
        let mut rows = stmt
            .query_map(params![id], row_to_product)
            .map_err(|e| MesaError::Upstream(format!("get item: {e}")))?;
        match rows.next() {
            Some(row) => row.map_err(|e| MesaError::Upstream(format!("read row: {e}"))),
            None => Err(MesaError::NotFound(format!("item {id}"))),
        }
    }

    /// All persisted orders, newest first.
    pub async fn list_orders(&self) -> Result<Vec<PersistedOrder>, MesaError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(
                "SELECT table_number, items, total_amount, timestamp
                 FROM orders ORDER BY timestamp DESC",
            )
            .map_err(|e| MesaError::Upstream(format!("prepare orders: {e}")))?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, f64>(2)?,
                    row.get::<_, chrono::DateTime<chrono::Utc>>(3)?,
                ))
            })
            .map_err(|e| MesaError::Upstream(format!("list orders: {e}")))?;

        let mut orders = Vec::new();
        for row in rows {
            let (table, items_json, total, timestamp) =
                row.map_err(|e| MesaError::Upstream(format!("read order: {e}")))?;
            orders.push(PersistedOrder {
                table_number: TableNumber(table),
                items: serde_json::from_str(&items_json)?,
                total_amount: total,
                timestamp,
            });
        }
        Ok(orders)
    }
}

fn row_to_product(row: &rusqlite::Row<'_>) -> rusqlite::Result<Product> {
    Ok(Product {
        id: row.get(0)?,
        name: row.get(1)?,
        price: row.get(2)?,
        category: row.get(3)?,
        description: row.get(4)?,
        image: row.get(5)?,
    })
}

#[async_trait]
impl Catalog for MenuDb {
    async fn all_products(&self) -> Result<Vec<Product>, MesaError> {
        self.list_flat(CatalogKind::Product).await
    }

    async fn find_by_exact_name(&self, name: &str) -> Result<Option<Product>, MesaError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(
                "SELECT id, name, price, category, description, image
                 FROM products WHERE name = ?1 COLLATE NOCASE
                 ORDER BY rowid LIMIT 1",
            )
            .map_err(|e| MesaError::Upstream(format!("prepare name lookup: {e}")))?;
        let mut rows = stmt
            .query_map(params![name], row_to_product)
            .map_err(|e| MesaError::Upstream(format!("name lookup: {e}")))?;
        match rows.next() {
            Some(row) => Ok(Some(
                row.map_err(|e| MesaError::Upstream(format!("read row: {e}")))?,
            )),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl OrderStore for MenuDb {
    async fn save_order(&self, order: &PersistedOrder) -> Result<(), MesaError> {
        let items_json = serde_json::to_string(&order.items)?;
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO orders (id, table_number, items, total_amount, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                Uuid::new_v4().to_string(),
                order.table_number.as_str(),
                items_json,
                order.total_amount,
                order.timestamp,
            ],
        )
        .map_err(|e| MesaError::Upstream(format!("save order: {e}")))?;
        info!(
            "Order saved for table {} ({} items, total {})",
            order.table_number,
            order.items.len(),
            order.total_amount
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mesa_common::order::OrderLineItem;

    async fn open_temp() -> (tempfile::TempDir, MenuDb) {
        let dir = tempfile::tempdir().unwrap();
        let db = MenuDb::open(&dir.path().join("menu.db")).await.unwrap();
        (dir, db)
    }

    #[tokio::test]
    async fn add_and_group_products() {
        let (_dir, db) = open_temp().await;
        db.add_item(CatalogKind::Product, "Pizza", 10.0, "Mains", "", "")
            .await
            .unwrap();
        db.add_item(CatalogKind::Product, "Soup", 4.0, "Starters", "", "")
            .await
            .unwrap();

        let grouped = db.list_by_category(CatalogKind::Product).await.unwrap();
        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped["Mains"][0].name, "Pizza");

        let all = db.all_products().await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn exact_name_lookup_is_case_insensitive() {
        let (_dir, db) = open_temp().await;
        db.add_item(CatalogKind::Product, "Chicken Karahi", 15.0, "Mains", "", "")
            .await
            .unwrap();

        let found = db.find_by_exact_name("chicken karahi").await.unwrap();
        assert_eq!(found.unwrap().price, 15.0);
        assert!(db.find_by_exact_name("karahi").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn missing_item_reports_not_found() {
        let (_dir, db) = open_temp().await;
        let err = db.get_item(CatalogKind::Product, "nope").await.unwrap_err();
        assert!(matches!(err, MesaError::NotFound(_)));
    }

    #[tokio::test]
    async fn save_and_list_orders() {
        let (_dir, db) = open_temp().await;
        let order = PersistedOrder {
            table_number: TableNumber("5".into()),
            items: vec![OrderLineItem {
                product_id: None,
                name: "Pizza".into(),
                quantity: 2,
                price: 10.0,
                subtotal: 20.0,
                category: "Mains".into(),
                description: String::new(),
                image: String::new(),
            }],
            total_amount: 20.0,
            timestamp: chrono::Utc::now(),
        };
        db.save_order(&order).await.unwrap();

        let orders = db.list_orders().await.unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].table_number.as_str(), "5");
        assert_eq!(orders[0].total_amount, 20.0);
        assert_eq!(orders[0].items[0].quantity, 2);
    }
}
