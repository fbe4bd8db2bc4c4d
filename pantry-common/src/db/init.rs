//! Database initialization
//!
//! Opens (or creates) the SQLite catalog and applies the schema idempotently.
//! Safe to call on every startup.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// How long a connection waits on a locked database before failing
pub const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Open the catalog database, creating file, parent folder and tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Pragmas on the options apply to every pooled connection, not just the
    // first one handed out
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_catalog_schema(&pool).await?;

    Ok(pool)
}

/// Create all catalog tables and indexes (idempotent)
pub async fn create_catalog_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(pool)
        .await?;

    create_items_table(pool).await?;
    create_item_nutrients_table(pool).await?;
    create_recipes_table(pool).await?;
    create_recipe_nutrients_table(pool).await?;
    create_recipe_instructions_table(pool).await?;
    create_recipe_items_table(pool).await?;

    info!("Catalog schema ready");
    Ok(())
}

async fn create_items_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS items (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            image TEXT NOT NULL DEFAULT '',
            external_id INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Several local names can resolve to the same provider ingredient, so the
    // item lookup index is not unique. Older catalogs carried a unique one.
    sqlx::query("DROP INDEX IF EXISTS idx_items_external_id")
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_items_external
        ON items(external_id) WHERE external_id > 0
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_item_nutrients_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS item_nutrients (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            item_id INTEGER NOT NULL REFERENCES items(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            amount REAL NOT NULL DEFAULT 0,
            unit TEXT NOT NULL DEFAULT '',
            percent_of_daily_needs REAL NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_item_nutrients_item ON item_nutrients(item_id)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_recipes_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS recipes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            summary TEXT NOT NULL DEFAULT '',
            external_id INTEGER NOT NULL DEFAULT 0,
            servings REAL NOT NULL DEFAULT 0,
            ready_time INTEGER NOT NULL DEFAULT 0,
            cooking_time INTEGER NOT NULL DEFAULT 0,
            prep_time INTEGER NOT NULL DEFAULT 0,
            image TEXT NOT NULL DEFAULT '',
            kcal REAL NOT NULL DEFAULT 0,
            vegan INTEGER NOT NULL DEFAULT 0,
            vegetarian INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_recipes_external_id
        ON recipes(external_id) WHERE external_id > 0
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_recipe_nutrients_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS recipe_nutrients (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            recipe_id INTEGER NOT NULL REFERENCES recipes(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            amount REAL NOT NULL DEFAULT 0,
            unit TEXT NOT NULL DEFAULT '',
            percent_of_daily_needs REAL NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_recipe_instructions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS recipe_instructions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            recipe_id INTEGER NOT NULL REFERENCES recipes(id) ON DELETE CASCADE,
            number INTEGER NOT NULL,
            step TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_recipe_items_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS recipe_items (
            recipe_id INTEGER NOT NULL REFERENCES recipes(id) ON DELETE CASCADE,
            item_id INTEGER NOT NULL REFERENCES items(id) ON DELETE CASCADE,
            amount REAL NOT NULL DEFAULT 0,
            unit TEXT NOT NULL DEFAULT '',
            PRIMARY KEY (recipe_id, item_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_recipe_items_item ON recipe_items(item_id)")
        .execute(pool)
        .await?;

    Ok(())
}
