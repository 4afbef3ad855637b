//! Food analysis: prompt assembly plus a cached completion call.
//!
//! The cache key covers the analysis template and the food data only. The
//! user's profile goes into the prompt but not the key, so the first analysis
//! of a product is reused for every later user who submits the same product.

pub mod prompt;

use std::sync::Arc;

use serde_json::Value;
use tracing::info;

use crate::cache::ResponseCache;
use crate::error::{CleanBitesError, Result};
use crate::providers::CompletionClient;
use crate::store::{FoodDetails, UserRecord};

pub use prompt::{compose_analysis_prompt, PromptTemplates};

/// Runs food analyses through the response cache.
pub struct Analyzer {
    cache: Arc<ResponseCache>,
    client: Arc<dyn CompletionClient>,
    template: String,
}

impl Analyzer {
    pub fn new(
        cache: Arc<ResponseCache>,
        client: Arc<dyn CompletionClient>,
        template: impl Into<String>,
    ) -> Self {
        Self {
            cache,
            client,
            template: template.into(),
        }
    }

    /// Analyse `food` for `user`, returning the model's JSON verdict.
    pub async fn analyze(&self, food: &FoodDetails, user: &UserRecord) -> Result<Value> {
        let food_text = food.to_prompt_text()?;
        let user_text = serde_json::to_string_pretty(user).map_err(|e| {
            CleanBitesError::Validation(format!("user record not serializable: {e}"))
        })?;
        let prompt = compose_analysis_prompt(&self.template, &food_text, &user_text);

        info!(
            product = %food.product_name,
            user_id = user.user_id().unwrap_or("-"),
            "Running food analysis"
        );

        let client = Arc::clone(&self.client);
        self.cache
            .get_or_compute(&self.template, &food_text, || async move {
                client.complete(&prompt).await
            })
            .await
    }
}
