//! Item persistence

use pantry_common::db::{Item, Nutrient};
use pantry_common::{Error, Result};
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection, SqlitePool};

/// Overwrite applied to an item by the enrichment worker
#[derive(Debug, Clone, PartialEq)]
pub struct ItemEnrichment {
    pub name: String,
    pub image: String,
    pub external_id: i64,
    pub nutrients: Vec<Nutrient>,
}

/// Outcome of inserting an externally sourced item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemInsert {
    Created(i64),
    Existing(i64),
}

impl ItemInsert {
    pub fn id(self) -> i64 {
        match self {
            ItemInsert::Created(id) | ItemInsert::Existing(id) => id,
        }
    }
}

/// Load an item with its nutrients
pub async fn load_item(pool: &SqlitePool, item_id: i64) -> Result<Option<Item>> {
    let row = sqlx::query("SELECT id, name, image, external_id FROM items WHERE id = ?")
        .bind(item_id)
        .fetch_optional(pool)
        .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let nutrients = load_item_nutrients(pool, item_id).await?;
    Ok(Some(Item {
        id: row.get("id"),
        name: row.get("name"),
        image: row.get("image"),
        external_id: row.get("external_id"),
        nutrients,
    }))
}

pub async fn load_item_nutrients(pool: &SqlitePool, item_id: i64) -> Result<Vec<Nutrient>> {
    let rows = sqlx::query(
        r#"
        SELECT name, amount, unit, percent_of_daily_needs
        FROM item_nutrients
        WHERE item_id = ?
        ORDER BY id
        "#,
    )
    .bind(item_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| Nutrient {
            name: row.get("name"),
            amount: row.get("amount"),
            unit: row.get("unit"),
            percent_of_daily_needs: row.get("percent_of_daily_needs"),
        })
        .collect())
}

/// Names for the given ids, in id order; unknown ids are skipped
pub async fn item_names(pool: &SqlitePool, item_ids: &[i64]) -> Result<Vec<String>> {
    if item_ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut query: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT name FROM items WHERE id IN (");
    let mut separated = query.separated(", ");
    for id in item_ids {
        separated.push_bind(*id);
    }
    separated.push_unseparated(") ORDER BY id");

    let rows = query.build().fetch_all(pool).await?;
    Ok(rows.into_iter().map(|row| row.get("name")).collect())
}

/// Oldest item matched to `external_id`, if any
pub async fn find_item_id_by_external_id(
    conn: &mut SqliteConnection,
    external_id: i64,
) -> Result<Option<i64>> {
    let id = sqlx::query_scalar(
        "SELECT id FROM items WHERE external_id = ? AND external_id > 0 ORDER BY id LIMIT 1",
    )
    .bind(external_id)
    .fetch_optional(conn)
    .await?;
    Ok(id)
}

/// Insert an item keyed by its external id unless one already exists
///
/// Callers run this inside a write transaction (`BEGIN IMMEDIATE`), which
/// serializes concurrent ingestions so the lookup and the insert cannot race.
pub async fn insert_item_if_absent(
    conn: &mut SqliteConnection,
    name: &str,
    external_id: i64,
) -> Result<ItemInsert> {
    if let Some(id) = find_item_id_by_external_id(conn, external_id).await? {
        return Ok(ItemInsert::Existing(id));
    }

    let id: i64 = sqlx::query_scalar("INSERT INTO items (name, external_id) VALUES (?, ?) RETURNING id")
        .bind(name)
        .bind(external_id)
        .fetch_one(&mut *conn)
        .await?;

    Ok(ItemInsert::Created(id))
}

/// Overwrite name, image, external id and nutrients of an item in one transaction
///
/// Another item may already carry the same external id; both keep it.
pub async fn apply_enrichment(
    pool: &SqlitePool,
    item_id: i64,
    enrichment: &ItemEnrichment,
) -> Result<()> {
    let mut tx = pool.begin().await?;

    let updated = sqlx::query("UPDATE items SET name = ?, image = ?, external_id = ? WHERE id = ?")
        .bind(&enrichment.name)
        .bind(&enrichment.image)
        .bind(enrichment.external_id)
        .bind(item_id)
        .execute(&mut *tx)
        .await?;

    if updated.rows_affected() == 0 {
        return Err(Error::NotFound(format!("item {}", item_id)));
    }

    sqlx::query("DELETE FROM item_nutrients WHERE item_id = ?")
        .bind(item_id)
        .execute(&mut *tx)
        .await?;

    for nutrient in &enrichment.nutrients {
        sqlx::query(
            r#"
            INSERT INTO item_nutrients (item_id, name, amount, unit, percent_of_daily_needs)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(item_id)
        .bind(&nutrient.name)
        .bind(nutrient.amount)
        .bind(&nutrient.unit)
        .bind(nutrient.percent_of_daily_needs)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}
