//! Recipe persistence and filtered search

use pantry_common::db::{DietCount, Item, Nutrient, Recipe, RecipeInstruction, RecipeItem};
use pantry_common::{Error, Result};
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection, SqlitePool};
use std::collections::HashMap;

/// Dietary flags stored on the recipe row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DietFlag {
    Vegan,
    Vegetarian,
}

impl DietFlag {
    /// Only diets with a dedicated column filter locally
    pub fn parse(diet: &str) -> Option<Self> {
        match diet.trim().to_ascii_lowercase().as_str() {
            "vegan" => Some(DietFlag::Vegan),
            "vegetarian" => Some(DietFlag::Vegetarian),
            _ => None,
        }
    }

    fn column(self) -> &'static str {
        match self {
            DietFlag::Vegan => "vegan",
            DietFlag::Vegetarian => "vegetarian",
        }
    }
}

/// Recipe search filters
///
/// Every id in `ingredient_ids` must be linked to a returned recipe; recipes
/// may carry further ingredients.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecipeQuery {
    pub title: Option<String>,
    pub diet: Option<String>,
    ingredient_ids: Vec<i64>,
}

impl RecipeQuery {
    pub fn new(title: Option<String>, diet: Option<String>, ingredient_ids: Vec<i64>) -> Self {
        let mut ids = ingredient_ids;
        ids.sort_unstable();
        ids.dedup();
        Self {
            title: title.filter(|t| !t.trim().is_empty()),
            diet: diet.filter(|d| !d.trim().is_empty()),
            ingredient_ids: ids,
        }
    }

    /// Distinct requested ingredient ids, ascending
    pub fn ingredient_ids(&self) -> &[i64] {
        &self.ingredient_ids
    }

    fn push_predicate(&self, query: &mut QueryBuilder<'_, Sqlite>) {
        query.push(" WHERE 1 = 1");

        if let Some(title) = &self.title {
            query
                .push(" AND LOWER(title) LIKE ")
                .push_bind(format!("%{}%", title.to_lowercase()));
        }

        if let Some(flag) = self.diet.as_deref().and_then(DietFlag::parse) {
            query.push(format!(" AND {} = 1", flag.column()));
        }

        if !self.ingredient_ids.is_empty() {
            query.push(" AND id IN (SELECT recipe_id FROM recipe_items WHERE item_id IN (");
            {
                let mut separated = query.separated(", ");
                for id in &self.ingredient_ids {
                    separated.push_bind(*id);
                }
            }
            query
                .push(") GROUP BY recipe_id HAVING COUNT(DISTINCT item_id) = ")
                .push_bind(self.ingredient_ids.len() as i64)
                .push(")");
        }
    }
}

/// Ingredient link of a recipe about to be inserted
#[derive(Debug, Clone, PartialEq)]
pub struct NewRecipeItem {
    pub item_id: i64,
    pub amount: f64,
    pub unit: String,
}

/// Recipe aggregate about to be inserted
#[derive(Debug, Clone, PartialEq)]
pub struct NewRecipe {
    pub title: String,
    pub summary: String,
    pub external_id: i64,
    pub servings: f64,
    pub ready_time: i64,
    pub cooking_time: i64,
    pub prep_time: i64,
    pub image: String,
    pub kcal: f64,
    pub vegan: bool,
    pub vegetarian: bool,
    pub ingredients: Vec<NewRecipeItem>,
    pub nutrients: Vec<Nutrient>,
    pub instructions: Vec<RecipeInstruction>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipeInsert {
    Created(i64),
    Existing(i64),
}

impl RecipeInsert {
    pub fn id(self) -> i64 {
        match self {
            RecipeInsert::Created(id) | RecipeInsert::Existing(id) => id,
        }
    }
}

/// Ids of recipes matching the query, ascending
pub async fn search_recipe_ids(pool: &SqlitePool, query: &RecipeQuery) -> Result<Vec<i64>> {
    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT id FROM recipes");
    query.push_predicate(&mut builder);
    builder.push(" ORDER BY id");

    let rows = builder.build().fetch_all(pool).await?;
    Ok(rows.into_iter().map(|row| row.get("id")).collect())
}

/// Matching recipes grouped by dietary flags
pub async fn diet_counts(pool: &SqlitePool, query: &RecipeQuery) -> Result<Vec<DietCount>> {
    let mut builder: QueryBuilder<Sqlite> =
        QueryBuilder::new("SELECT vegan, vegetarian, COUNT(*) AS count FROM recipes");
    query.push_predicate(&mut builder);
    builder.push(" GROUP BY vegan, vegetarian ORDER BY vegan, vegetarian");

    let rows = builder.build().fetch_all(pool).await?;
    Ok(rows
        .into_iter()
        .map(|row| DietCount {
            vegan: row.get("vegan"),
            vegetarian: row.get("vegetarian"),
            count: row.get("count"),
        })
        .collect())
}

pub async fn find_recipe_id_by_external_id(
    conn: &mut SqliteConnection,
    external_id: i64,
) -> Result<Option<i64>> {
    let id = sqlx::query_scalar("SELECT id FROM recipes WHERE external_id = ? AND external_id > 0")
        .bind(external_id)
        .fetch_optional(conn)
        .await?;
    Ok(id)
}

/// Insert a recipe with its links, nutrients and instructions
///
/// Runs on the caller's connection so it can share the caller's transaction.
/// If a recipe with the same external id already exists nothing is written.
pub async fn insert_recipe(conn: &mut SqliteConnection, recipe: &NewRecipe) -> Result<RecipeInsert> {
    let inserted: Option<i64> = sqlx::query_scalar(
        r#"
        INSERT INTO recipes (
            title, summary, external_id, servings, ready_time, cooking_time,
            prep_time, image, kcal, vegan, vegetarian
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(external_id) WHERE external_id > 0 DO NOTHING
        RETURNING id
        "#,
    )
    .bind(&recipe.title)
    .bind(&recipe.summary)
    .bind(recipe.external_id)
    .bind(recipe.servings)
    .bind(recipe.ready_time)
    .bind(recipe.cooking_time)
    .bind(recipe.prep_time)
    .bind(&recipe.image)
    .bind(recipe.kcal)
    .bind(recipe.vegan)
    .bind(recipe.vegetarian)
    .fetch_optional(&mut *conn)
    .await?;

    let Some(recipe_id) = inserted else {
        return find_recipe_id_by_external_id(conn, recipe.external_id)
            .await?
            .map(RecipeInsert::Existing)
            .ok_or_else(|| {
                Error::Internal(format!("recipe with external id {} vanished", recipe.external_id))
            });
    };

    for link in &recipe.ingredients {
        // Upstream occasionally lists the same ingredient twice
        sqlx::query(
            r#"
            INSERT INTO recipe_items (recipe_id, item_id, amount, unit)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(recipe_id, item_id) DO NOTHING
            "#,
        )
        .bind(recipe_id)
        .bind(link.item_id)
        .bind(link.amount)
        .bind(&link.unit)
        .execute(&mut *conn)
        .await?;
    }

    for nutrient in &recipe.nutrients {
        sqlx::query(
            r#"
            INSERT INTO recipe_nutrients (recipe_id, name, amount, unit, percent_of_daily_needs)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(recipe_id)
        .bind(&nutrient.name)
        .bind(nutrient.amount)
        .bind(&nutrient.unit)
        .bind(nutrient.percent_of_daily_needs)
        .execute(&mut *conn)
        .await?;
    }

    for instruction in &recipe.instructions {
        sqlx::query("INSERT INTO recipe_instructions (recipe_id, number, step) VALUES (?, ?, ?)")
            .bind(recipe_id)
            .bind(instruction.number)
            .bind(&instruction.step)
            .execute(&mut *conn)
            .await?;
    }

    Ok(RecipeInsert::Created(recipe_id))
}

/// Load the full recipe aggregate
pub async fn load_recipe(pool: &SqlitePool, recipe_id: i64) -> Result<Option<Recipe>> {
    let row = sqlx::query(
        r#"
        SELECT id, title, summary, external_id, servings, ready_time, cooking_time,
               prep_time, image, kcal, vegan, vegetarian
        FROM recipes
        WHERE id = ?
        "#,
    )
    .bind(recipe_id)
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let ingredients = load_recipe_items(pool, recipe_id).await?;
    let nutrients = load_recipe_nutrients(pool, recipe_id).await?;

    let instructions = sqlx::query(
        "SELECT number, step FROM recipe_instructions WHERE recipe_id = ? ORDER BY number, id",
    )
    .bind(recipe_id)
    .fetch_all(pool)
    .await?
    .into_iter()
    .map(|r| RecipeInstruction {
        number: r.get("number"),
        step: r.get("step"),
    })
    .collect();

    Ok(Some(Recipe {
        id: row.get("id"),
        title: row.get("title"),
        summary: row.get("summary"),
        external_id: row.get("external_id"),
        servings: row.get("servings"),
        ready_time: row.get("ready_time"),
        cooking_time: row.get("cooking_time"),
        prep_time: row.get("prep_time"),
        image: row.get("image"),
        kcal: row.get("kcal"),
        vegan: row.get("vegan"),
        vegetarian: row.get("vegetarian"),
        ingredients,
        nutrients,
        instructions,
    }))
}

/// Load every recipe in `ids`, keeping the given order
pub async fn load_recipes(pool: &SqlitePool, ids: &[i64]) -> Result<Vec<Recipe>> {
    let mut recipes = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(recipe) = load_recipe(pool, *id).await? {
            recipes.push(recipe);
        }
    }
    Ok(recipes)
}

async fn load_recipe_nutrients(pool: &SqlitePool, recipe_id: i64) -> Result<Vec<Nutrient>> {
    let rows = sqlx::query(
        r#"
        SELECT name, amount, unit, percent_of_daily_needs
        FROM recipe_nutrients
        WHERE recipe_id = ?
        ORDER BY id
        "#,
    )
    .bind(recipe_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|row| nutrient_from_row(&row)).collect())
}

async fn load_recipe_items(pool: &SqlitePool, recipe_id: i64) -> Result<Vec<RecipeItem>> {
    let nutrient_rows = sqlx::query(
        r#"
        SELECT n.item_id, n.name, n.amount, n.unit, n.percent_of_daily_needs
        FROM item_nutrients n
        JOIN recipe_items ri ON ri.item_id = n.item_id
        WHERE ri.recipe_id = ?
        ORDER BY n.id
        "#,
    )
    .bind(recipe_id)
    .fetch_all(pool)
    .await?;

    let mut nutrients_by_item: HashMap<i64, Vec<Nutrient>> = HashMap::new();
    for row in &nutrient_rows {
        nutrients_by_item
            .entry(row.get("item_id"))
            .or_default()
            .push(nutrient_from_row(row));
    }

    let rows = sqlx::query(
        r#"
        SELECT i.id, i.name, i.image, i.external_id, ri.amount, ri.unit
        FROM recipe_items ri
        JOIN items i ON i.id = ri.item_id
        WHERE ri.recipe_id = ?
        ORDER BY i.id
        "#,
    )
    .bind(recipe_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| {
            let item_id: i64 = row.get("id");
            RecipeItem {
                item: Item {
                    id: item_id,
                    name: row.get("name"),
                    image: row.get("image"),
                    external_id: row.get("external_id"),
                    nutrients: nutrients_by_item.remove(&item_id).unwrap_or_default(),
                },
                amount: row.get("amount"),
                unit: row.get("unit"),
            }
        })
        .collect())
}

fn nutrient_from_row(row: &sqlx::sqlite::SqliteRow) -> Nutrient {
    Nutrient {
        name: row.get("name"),
        amount: row.get("amount"),
        unit: row.get("unit"),
        percent_of_daily_needs: row.get("percent_of_daily_needs"),
    }
}
