//! Item storage repository.

use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use super::ideas;
use super::model::{Item, ItemId, ItemUpdate, NewItem};
use super::validation::{validate_new_item, validate_update};
use crate::{Error, Result};

/// Number of items [`ItemStore::fetch_recent_items`] returns by default.
pub const DEFAULT_RECENT_LIMIT: i64 = 4;

/// Schema migrations, applied in order and tracked with `PRAGMA user_version`.
const MIGRATIONS: &[&str] = &[r"
    CREATE TABLE IF NOT EXISTS items (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        bin_category TEXT NOT NULL,
        description_title TEXT NOT NULL,
        description TEXT NOT NULL,
        ideas TEXT NOT NULL,
        image_uri TEXT,
        created_date TEXT NOT NULL,
        created_time TEXT NOT NULL
    )
    "];

const SELECT_COLUMNS: &str = "SELECT id, bin_category, description_title, description, ideas, \
                              image_uri, created_date, created_time FROM items";

/// Repository for recyclable item storage and retrieval.
#[derive(Debug, Clone)]
pub struct ItemStore {
    pool: SqlitePool,
}

impl ItemStore {
    /// Create a new store with the given database path.
    ///
    /// Creates the database and tables if they don't exist. Existing items
    /// are kept.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation fails.
    pub async fn new(database_path: &str) -> Result<Self> {
        let store = Self::connect(database_path).await?;
        store.initialize().await?;
        Ok(store)
    }

    /// Create a store that discards any existing items before use.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation fails.
    pub async fn open_with_reset(database_path: &str) -> Result<Self> {
        let store = Self::connect(database_path).await?;
        store.reset().await?;
        store.initialize().await?;
        Ok(store)
    }

    /// Create an in-memory store for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation fails.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(Error::storage("open"))?;

        let store = Self { pool };
        store.initialize().await?;
        Ok(store)
    }

    async fn connect(database_path: &str) -> Result<Self> {
        let url = format!("sqlite:{database_path}?mode=rwc");
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await
            .map_err(Error::storage("open"))?;

        sqlx::query("PRAGMA journal_mode = WAL")
            .execute(&pool)
            .await
            .map_err(Error::storage("open"))?;

        debug!("Opened item database at {database_path}");
        Ok(Self { pool })
    }

    /// Apply pending schema migrations.
    async fn initialize(&self) -> Result<()> {
        let version: i64 = sqlx::query_scalar("PRAGMA user_version")
            .fetch_one(&self.pool)
            .await
            .map_err(Error::storage("initialize"))?;
        let applied = usize::try_from(version).unwrap_or(0);

        for (index, migration) in MIGRATIONS.iter().enumerate().skip(applied) {
            let mut tx = self
                .pool
                .begin()
                .await
                .map_err(Error::storage("initialize"))?;

            sqlx::query(migration)
                .execute(&mut *tx)
                .await
                .map_err(Error::storage("initialize"))?;

            // PRAGMA values cannot be bound as parameters.
            let pragma = format!("PRAGMA user_version = {}", index + 1);
            sqlx::query(&pragma)
                .execute(&mut *tx)
                .await
                .map_err(Error::storage("initialize"))?;

            tx.commit().await.map_err(Error::storage("initialize"))?;
            info!("Applied item schema migration {}", index + 1);
        }

        Ok(())
    }

    /// Drop the items table and schema version.
    async fn reset(&self) -> Result<()> {
        warn!("Resetting item database, all stored items are discarded");
        sqlx::query("DROP TABLE IF EXISTS items")
            .execute(&self.pool)
            .await
            .map_err(Error::storage("reset"))?;
        sqlx::query("PRAGMA user_version = 0")
            .execute(&self.pool)
            .await
            .map_err(Error::storage("reset"))?;
        Ok(())
    }

    /// Close all connections.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Insert a new item and return its id.
    ///
    /// # Errors
    ///
    /// Returns `Error::Validation` if required fields are missing, or
    /// `Error::Storage` if the insert fails.
    pub async fn add_item(&self, item: &NewItem) -> Result<ItemId> {
        validate_new_item(item).map_err(Error::Validation)?;

        let result = sqlx::query(
            r"
            INSERT INTO items (bin_category, description_title, description, ideas,
                               image_uri, created_date, created_time)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(&item.bin_category)
        .bind(&item.description_title)
        .bind(&item.description)
        .bind(ideas::encode(&item.ideas))
        .bind(&item.image_uri)
        .bind(&item.created_date)
        .bind(&item.created_time)
        .execute(&self.pool)
        .await
        .map_err(Error::storage("add_item"))?;

        let id = ItemId::new(result.last_insert_rowid());
        debug!("Added item {id} in {}", item.bin_category);
        Ok(id)
    }

    /// Get an item by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn fetch_item_by_id(&self, id: ItemId) -> Result<Option<Item>> {
        let row = sqlx::query(&format!("{SELECT_COLUMNS} WHERE id = ?"))
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::storage("fetch_item_by_id"))?;

        Ok(row.as_ref().map(row_to_item))
    }

    /// Get all items, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn fetch_items(&self) -> Result<Vec<Item>> {
        let rows = sqlx::query(&format!("{SELECT_COLUMNS} ORDER BY id ASC"))
            .fetch_all(&self.pool)
            .await
            .map_err(Error::storage("fetch_items"))?;

        Ok(rows.iter().map(row_to_item).collect())
    }

    /// Get items in a bin category, ordered by title.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn fetch_items_by_category(&self, category: &str) -> Result<Vec<Item>> {
        let rows = sqlx::query(&format!(
            "{SELECT_COLUMNS} WHERE bin_category = ? ORDER BY description_title ASC"
        ))
        .bind(category)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::storage("fetch_items_by_category"))?;

        Ok(rows.iter().map(row_to_item).collect())
    }

    /// Get the most recently inserted items, newest first.
    ///
    /// `None` uses [`DEFAULT_RECENT_LIMIT`]. A limit of zero or less returns
    /// no items.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn fetch_recent_items(&self, limit: Option<i64>) -> Result<Vec<Item>> {
        let limit = limit.unwrap_or(DEFAULT_RECENT_LIMIT);
        if limit <= 0 {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(&format!("{SELECT_COLUMNS} ORDER BY id DESC LIMIT ?"))
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::storage("fetch_recent_items"))?;

        Ok(rows.iter().map(row_to_item).collect())
    }

    /// Replace the mutable fields of an item.
    ///
    /// Returns the number of rows changed; zero means no such item.
    ///
    /// # Errors
    ///
    /// Returns `Error::Validation` if required fields are missing, or
    /// `Error::Storage` if the update fails.
    pub async fn update_item(&self, id: ItemId, update: &ItemUpdate) -> Result<u64> {
        validate_update(update).map_err(Error::Validation)?;

        let result = sqlx::query(
            r"
            UPDATE items SET
                bin_category = ?,
                description_title = ?,
                description = ?,
                ideas = ?,
                image_uri = ?
            WHERE id = ?
            ",
        )
        .bind(&update.bin_category)
        .bind(&update.description_title)
        .bind(&update.description)
        .bind(ideas::encode(&update.ideas))
        .bind(&update.image_uri)
        .bind(id.0)
        .execute(&self.pool)
        .await
        .map_err(Error::storage("update_item"))?;

        debug!("Updated item {id}: {} row(s)", result.rows_affected());
        Ok(result.rows_affected())
    }

    /// Delete an item.
    ///
    /// Returns the number of rows removed; zero means no such item.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn delete_item(&self, id: ItemId) -> Result<u64> {
        let result = sqlx::query("DELETE FROM items WHERE id = ?")
            .bind(id.0)
            .execute(&self.pool)
            .await
            .map_err(Error::storage("delete_item"))?;

        debug!("Deleted item {id}: {} row(s)", result.rows_affected());
        Ok(result.rows_affected())
    }
}

fn row_to_item(row: &SqliteRow) -> Item {
    let encoded: String = row.get("ideas");
    Item {
        id: ItemId::new(row.get("id")),
        bin_category: row.get("bin_category"),
        description_title: row.get("description_title"),
        description: row.get("description"),
        ideas: ideas::decode(&encoded).collect(),
        image_uri: row.get("image_uri"),
        created_date: row.get("created_date"),
        created_time: row.get("created_time"),
    }
}

/// Item store opened lazily on first use and shared afterwards.
#[derive(Debug)]
pub struct SharedItemStore {
    database_path: String,
    reset_on_open: bool,
    store: OnceCell<ItemStore>,
}

impl SharedItemStore {
    /// Creates an unopened handle for the database at `database_path`.
    #[must_use]
    pub fn new(database_path: impl Into<String>, reset_on_open: bool) -> Self {
        Self {
            database_path: database_path.into(),
            reset_on_open,
            store: OnceCell::new(),
        }
    }

    /// Returns the store, opening it on the first call.
    ///
    /// Concurrent first calls open the database once.
    ///
    /// # Errors
    ///
    /// Returns an error if opening the database fails. A failed open is
    /// retried by the next call.
    pub async fn get(&self) -> Result<&ItemStore> {
        self.store
            .get_or_try_init(|| async {
                if self.reset_on_open {
                    ItemStore::open_with_reset(&self.database_path).await
                } else {
                    ItemStore::new(&self.database_path).await
                }
            })
            .await
    }

    /// Returns true once the database has been opened.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.store.initialized()
    }
}
