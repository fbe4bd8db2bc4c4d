//! Spoonacular API client
//!
//! Implements both provider traits against the public Spoonacular endpoints:
//! ingredient search + information for nutrition lookups, and `complexSearch`
//! for recipe discovery. Every request waits on a token-bucket limiter first.

use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::num::NonZeroU32;
use std::time::Duration;

use super::provider::{
    IngredientInformation, NutritionProvider, ProviderError, ProviderRecipe, RecipeProvider,
    RecipeSearchRequest,
};

const USER_AGENT: &str = concat!("pantry-catalog/", env!("CARGO_PKG_VERSION"));

/// Requests issued per ingredient lookup (search, then information)
pub const REQUESTS_PER_LOOKUP: u32 = 2;

#[derive(Debug, Deserialize)]
struct IngredientSearchHit {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct IngredientSearchResponse {
    #[serde(default)]
    results: Vec<IngredientSearchHit>,
}

#[derive(Debug, Deserialize)]
struct ComplexSearchResponse {
    #[serde(default)]
    results: Vec<ProviderRecipe>,
}

/// Connection settings for [`SpoonacularClient`]
#[derive(Debug, Clone)]
pub struct SpoonacularSettings {
    pub base_url: String,
    pub api_key: String,
    pub requests_per_second: u32,
    pub timeout: Duration,
}

pub struct SpoonacularClient {
    client: Client,
    base_url: String,
    api_key: String,
    rate_limiter: RateLimiter<
        governor::state::direct::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
}

impl SpoonacularClient {
    pub fn new(settings: SpoonacularSettings) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(settings.timeout)
            .build()
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        // A zero rate would never grant a permit
        let per_second = NonZeroU32::new(settings.requests_per_second).unwrap_or(NonZeroU32::MIN);
        let rate_limiter = RateLimiter::direct(Quota::per_second(per_second));

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key: settings.api_key,
            rate_limiter,
        })
    }

    async fn get_json<T>(&self, path: &str, query: &[(&str, String)]) -> Result<T, ProviderError>
    where
        T: serde::de::DeserializeOwned,
    {
        self.rate_limiter.until_ready().await;

        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(url = %url, "Querying Spoonacular API");

        let response = self
            .client
            .get(&url)
            .query(&[("apiKey", self.api_key.as_str())])
            .query(query)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::PAYMENT_REQUIRED {
            return Err(ProviderError::RateLimited(status.as_u16()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api(status.as_u16(), body));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))
    }
}

#[async_trait]
impl NutritionProvider for SpoonacularClient {
    async fn lookup_ingredient(&self, name: &str) -> Result<IngredientInformation, ProviderError> {
        let search: IngredientSearchResponse = self
            .get_json(
                "/food/ingredients/search",
                &[("query", name.to_string()), ("number", "1".to_string())],
            )
            .await?;

        let hit = search
            .results
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::NoMatch(name.to_string()))?;

        let info: IngredientInformation = self
            .get_json(
                &format!("/food/ingredients/{}/information", hit.id),
                &[("amount", "1".to_string())],
            )
            .await?;

        tracing::debug!(
            query = %name,
            external_id = info.id,
            nutrients = info.nutrition.nutrients.len(),
            "Ingredient nutrition retrieved"
        );
        Ok(info)
    }
}

#[async_trait]
impl RecipeProvider for SpoonacularClient {
    async fn complex_search(
        &self,
        request: &RecipeSearchRequest,
    ) -> Result<Vec<ProviderRecipe>, ProviderError> {
        let mut query = vec![
            ("addRecipeInstructions", "true".to_string()),
            ("addRecipeNutrition", "true".to_string()),
            ("number", request.number.to_string()),
        ];
        if !request.ingredient_names.is_empty() {
            query.push(("includeIngredients", request.ingredient_names.join(",")));
        }
        if let Some(diet) = &request.diet {
            query.push(("diet", diet.clone()));
        }
        if let Some(title) = &request.title {
            query.push(("titleMatch", title.clone()));
        }

        let response: ComplexSearchResponse =
            self.get_json("/recipes/complexSearch", &query).await?;

        tracing::debug!(results = response.results.len(), "Recipe complex search returned");
        Ok(response.results)
    }
}
