//! Recipe ingestion integration tests

mod helpers;

use helpers::*;
use pantry_catalog::db::RecipeQuery;
use pantry_catalog::queue::{EnrichmentQueue, MemoryEnrichmentQueue, Priority};
use pantry_catalog::services::provider::{
    InstructionGroup, InstructionStep, ProviderError, ProviderIngredient, ProviderNutrient,
    ProviderRecipe, RecipeNutrition,
};
use pantry_catalog::services::{IngestError, RecipeIngestor};
use pantry_common::db::init_database;
use sqlx::SqlitePool;
use std::sync::Arc;
use tempfile::TempDir;

fn ingredient(id: i64, name: &str) -> ProviderIngredient {
    ProviderIngredient {
        id,
        name: name.to_string(),
        amount: 2.0,
        unit: "cups".to_string(),
    }
}

fn garlic_pasta() -> ProviderRecipe {
    ProviderRecipe {
        id: 716429,
        title: "Pasta with Garlic, Scallions, Cauliflower".to_string(),
        image: Some("https://img.example/716429.jpg".to_string()),
        ready_in_minutes: Some(45),
        preparation_minutes: None,
        cooking_minutes: None,
        servings: Some(2.0),
        summary: Some("A weeknight pasta".to_string()),
        vegan: false,
        vegetarian: true,
        nutrition: RecipeNutrition {
            nutrients: vec![ProviderNutrient {
                name: "Calories".to_string(),
                amount: 584.0,
                unit: "kcal".to_string(),
                percent_of_daily_needs: 29.2,
            }],
            ingredients: vec![ingredient(20081, "flour"), ingredient(11215, "garlic")],
        },
        analyzed_instructions: vec![InstructionGroup {
            steps: vec![
                InstructionStep {
                    number: 1,
                    step: "Boil the pasta".to_string(),
                },
                InstructionStep {
                    number: 2,
                    step: "Toss with garlic".to_string(),
                },
            ],
        }],
    }
}

struct Fixture {
    pool: SqlitePool,
    queue: Arc<MemoryEnrichmentQueue>,
    provider: Arc<FakeRecipeProvider>,
    ingestor: RecipeIngestor,
}

async fn fixture(provider: FakeRecipeProvider) -> Fixture {
    let pool = test_pool().await;
    let queue = Arc::new(MemoryEnrichmentQueue::default());
    let provider = Arc::new(provider);
    let ingestor = RecipeIngestor::new(pool.clone(), provider.clone(), queue.clone());
    Fixture {
        pool,
        queue,
        provider,
        ingestor,
    }
}

fn by_title(title: &str) -> RecipeQuery {
    RecipeQuery::new(Some(title.to_string()), None, vec![])
}

#[tokio::test]
async fn test_local_miss_ingests_and_enqueues_new_items() {
    let fx = fixture(FakeRecipeProvider::returning(vec![garlic_pasta()])).await;

    let result = fx.ingestor.search(&by_title("garlic")).await.unwrap();

    assert!(result.ingested);
    assert_eq!(result.count, 1);
    assert!(result.diet_counts.is_empty(), "breakdown is computed before ingestion");

    let recipe = &result.recipes[0];
    assert_eq!(recipe.external_id, 716429);
    assert_eq!(recipe.kcal, 584.0);
    assert_eq!(recipe.instructions.len(), 2);
    assert_eq!(recipe.ingredients.len(), 2);
    assert!(recipe.ingredients.iter().all(|ri| ri.item.nutrients.is_empty()));

    let queued = fx.queue.next_batch(10).await.unwrap();
    assert_eq!(queued.len(), 2);
    assert!(queued.iter().all(|q| q.priority == Priority::Default));
    let mut names: Vec<_> = queued.iter().map(|q| q.name.as_str()).collect();
    names.sort();
    assert_eq!(names, vec!["flour", "garlic"]);
}

#[tokio::test]
async fn test_second_search_hits_local_catalog() {
    let fx = fixture(FakeRecipeProvider::returning(vec![garlic_pasta()])).await;

    fx.ingestor.search(&by_title("garlic")).await.unwrap();
    let second = fx.ingestor.search(&by_title("garlic")).await.unwrap();

    assert!(!second.ingested);
    assert_eq!(second.recipes.len(), 1);
    assert_eq!(second.count, 1);
    assert_eq!(fx.provider.requests().len(), 1);
    assert_eq!(count_rows(&fx.pool, "recipes").await, 1);
}

#[tokio::test]
async fn test_repeated_ingestion_does_not_duplicate_recipe() {
    // The vegan filter never matches the stored recipe, so both searches go
    // upstream and receive the same external recipe
    let fx = fixture(FakeRecipeProvider::returning(vec![garlic_pasta()])).await;
    let query = RecipeQuery::new(Some("garlic".to_string()), Some("vegan".to_string()), vec![]);

    let first = fx.ingestor.search(&query).await.unwrap();
    let second = fx.ingestor.search(&query).await.unwrap();

    assert!(first.ingested && second.ingested);
    assert_eq!(first.recipes[0].id, second.recipes[0].id);
    assert_eq!(count_rows(&fx.pool, "recipes").await, 1);
    assert_eq!(count_rows(&fx.pool, "items").await, 2);
    assert_eq!(count_rows(&fx.pool, "recipe_instructions").await, 2);
    assert_eq!(fx.queue.len().await.unwrap(), 2);
}

#[tokio::test]
async fn test_known_external_item_is_reused_without_enqueue() {
    let fx = fixture(FakeRecipeProvider::returning(vec![garlic_pasta()])).await;
    let garlic_id: i64 =
        sqlx::query_scalar("INSERT INTO items (name, external_id) VALUES ('garlic', 11215) RETURNING id")
            .fetch_one(&fx.pool)
            .await
            .unwrap();

    let result = fx.ingestor.search(&by_title("garlic")).await.unwrap();

    assert_eq!(count_rows(&fx.pool, "items").await, 2);
    let queued = fx.queue.next_batch(10).await.unwrap();
    assert_eq!(queued.len(), 1);
    assert_eq!(queued[0].name, "flour");
    assert!(result.recipes[0]
        .ingredients
        .iter()
        .any(|ri| ri.item.id == garlic_id));
}

#[tokio::test]
async fn test_superset_recipe_matches_required_ingredients() {
    let fx = fixture(FakeRecipeProvider::returning(vec![])).await;
    let basil = insert_item(&fx.pool, "basil").await;
    let tomato = insert_item(&fx.pool, "tomato").await;
    let garlic = insert_item(&fx.pool, "garlic").await;
    link_recipe(&fx.pool, "Caprese", &[basil, tomato]).await;
    link_recipe(&fx.pool, "Bruschetta", &[basil, tomato, garlic]).await;
    link_recipe(&fx.pool, "Garlic Bread", &[garlic]).await;

    let query = RecipeQuery::new(None, None, vec![basil, tomato]);
    let result = fx.ingestor.search(&query).await.unwrap();

    assert!(!result.ingested);
    let mut titles: Vec<_> = result.recipes.iter().map(|r| r.title.as_str()).collect();
    titles.sort();
    assert_eq!(titles, vec!["Bruschetta", "Caprese"]);
    assert_eq!(result.count, 2);
    assert!(fx.provider.requests().is_empty());
}

#[tokio::test]
async fn test_upstream_request_carries_resolved_names() {
    let fx = fixture(FakeRecipeProvider::returning(vec![])).await;
    let basil = insert_item(&fx.pool, "basil").await;

    let query = RecipeQuery::new(
        Some("pesto".to_string()),
        Some("vegetarian".to_string()),
        vec![basil, 9999],
    );
    let result = fx.ingestor.search(&query).await.unwrap();

    assert!(result.ingested);
    assert_eq!(result.count, 0);

    let requests = fx.provider.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].ingredient_names, vec!["basil".to_string()]);
    assert_eq!(requests[0].title.as_deref(), Some("pesto"));
    assert_eq!(requests[0].diet.as_deref(), Some("vegetarian"));
    assert_eq!(requests[0].number, 2);
}

#[tokio::test]
async fn test_upstream_failure_surfaces_without_writes() {
    let fx = fixture(FakeRecipeProvider::failing(500)).await;

    let err = fx.ingestor.search(&by_title("garlic")).await.unwrap_err();

    assert!(matches!(err, IngestError::Upstream(ProviderError::Api(500, _))));
    assert_eq!(count_rows(&fx.pool, "recipes").await, 0);
    assert_eq!(fx.queue.len().await.unwrap(), 0);
}

#[tokio::test]
async fn test_duplicate_ingredient_lines_link_once() {
    let mut recipe = garlic_pasta();
    recipe.nutrition.ingredients.push(ingredient(11215, "garlic"));
    let fx = fixture(FakeRecipeProvider::returning(vec![recipe])).await;

    let result = fx.ingestor.search(&by_title("garlic")).await.unwrap();

    assert_eq!(result.recipes[0].ingredients.len(), 2);
    assert_eq!(fx.queue.len().await.unwrap(), 2);
}

#[tokio::test]
async fn test_queue_failure_still_returns_committed_recipe() {
    let pool = test_pool().await;
    let queue = Arc::new(FailingEnqueueQueue::default());
    let provider = Arc::new(FakeRecipeProvider::returning(vec![garlic_pasta()]));
    let ingestor = RecipeIngestor::new(pool.clone(), provider, queue.clone());

    let result = ingestor.search(&by_title("garlic")).await.unwrap();

    assert!(result.ingested);
    assert_eq!(result.recipes.len(), 1);
    assert_eq!(count_rows(&pool, "items").await, 2);
    assert_eq!(queue.len().await.unwrap(), 0);
}

/// Distinct external recipe sharing the garlic ingredient with every other
fn shared_garlic_recipe(n: i64) -> ProviderRecipe {
    let mut recipe = garlic_pasta();
    recipe.id = 100_000 + n;
    recipe.title = format!("batch {} dish", n);
    recipe.nutrition.ingredients = vec![
        ingredient(11215, "garlic"),
        ingredient(30_000 + n, &format!("spice {}", n)),
    ];
    recipe
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_ingestion_on_file_database() {
    let temp_dir = TempDir::new().unwrap();
    let pool = init_database(&temp_dir.path().join("pantry.db")).await.unwrap();
    let queue = Arc::new(MemoryEnrichmentQueue::default());

    const ROUNDS: i64 = 5;
    const PER_ROUND: i64 = 8;

    for round in 0..ROUNDS {
        let mut handles = Vec::new();
        for slot in 0..PER_ROUND {
            let n = round * PER_ROUND + slot;
            let provider = Arc::new(FakeRecipeProvider::returning(vec![shared_garlic_recipe(n)]));
            let ingestor = RecipeIngestor::new(pool.clone(), provider, queue.clone());
            handles.push(tokio::spawn(async move {
                let query = by_title(&format!("batch {} dish", n));
                ingestor.search(&query).await
            }));
        }

        for handle in handles {
            let result = handle.await.unwrap().unwrap();
            assert!(result.ingested);
            assert_eq!(result.recipes.len(), 1);
        }
    }

    let total = ROUNDS * PER_ROUND;
    assert_eq!(count_rows(&pool, "recipes").await, total);
    let garlic_rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM items WHERE external_id = 11215")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(garlic_rows, 1);
    assert_eq!(count_rows(&pool, "items").await, total + 1);
    assert_eq!(queue.len().await.unwrap(), (total + 1) as u64);
}
