//! Database Test Utilities

use pantry_common::db::create_catalog_schema;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

/// In-memory catalog with the full schema
///
/// Single connection: every pooled connection to `sqlite::memory:` would
/// otherwise open its own empty database.
pub async fn test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    create_catalog_schema(&pool).await.unwrap();
    pool
}

/// Insert a locally created (not yet enriched) item
pub async fn insert_item(pool: &SqlitePool, name: &str) -> i64 {
    sqlx::query_scalar("INSERT INTO items (name) VALUES (?) RETURNING id")
        .bind(name)
        .fetch_one(pool)
        .await
        .unwrap()
}

/// Insert a local recipe linked to the given items
pub async fn link_recipe(pool: &SqlitePool, title: &str, item_ids: &[i64]) -> i64 {
    let recipe_id: i64 = sqlx::query_scalar("INSERT INTO recipes (title) VALUES (?) RETURNING id")
        .bind(title)
        .fetch_one(pool)
        .await
        .unwrap();

    for item_id in item_ids {
        sqlx::query("INSERT INTO recipe_items (recipe_id, item_id, amount, unit) VALUES (?, ?, 1, 'pc')")
            .bind(recipe_id)
            .bind(*item_id)
            .execute(pool)
            .await
            .unwrap();
    }
    recipe_id
}

pub async fn count_rows(pool: &SqlitePool, table: &str) -> i64 {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
        .fetch_one(pool)
        .await
        .unwrap()
}
