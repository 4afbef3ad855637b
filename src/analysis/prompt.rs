//! Prompt templates and prompt assembly.

use std::path::Path;

use crate::config::PromptConfig;
use crate::error::{CleanBitesError, Result};

/// Built-in analysis instructions. The JSON shape matches what the frontend
/// renders.
pub const DEFAULT_ANALYSIS_PROMPT: &str = r#"You are a nutrition analyst. Using the food product details and the user's profile below, assess the product for this user.

Respond with a single JSON object and nothing else, using exactly these keys:
- "processed": one of "Unprocessed", "Minimally processed", "Processed", "Ultra-processed"
- "harmfulIngredients": array of strings naming ingredients of concern, each with a short reason
- "suitableDiets": array of diet names this product fits
- "notSuitableDiets": array of diet names this product does not fit
- "macroNutrientsScore": object mapping macronutrient name to a score from 0 to 10
- "microNutrientsScore": object mapping micronutrient name to a score from 0 to 10
- "userRisk": one of "Low", "Moderate", "High"
- "userRiskReason": short explanation referencing the user's profile
- "actionableSteps": array of short, concrete suggestions for the user

If information is missing, make the most conservative reasonable assumption and say so in "userRiskReason"."#;

/// Built-in label extraction instructions.
pub const DEFAULT_EXTRACTION_PROMPT: &str = r#"Read the food label in this image.

Respond with a single JSON object and nothing else, using these keys:
- "productName": the product name, or "" if not visible
- "ingredients": the full ingredient and allergen text as printed
- "nutritionInfo": the nutrition facts as printed, one nutrient per line"#;

/// The two templates the service sends to the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplates {
    pub analysis: String,
    pub extraction: String,
}

impl Default for PromptTemplates {
    fn default() -> Self {
        Self {
            analysis: DEFAULT_ANALYSIS_PROMPT.to_string(),
            extraction: DEFAULT_EXTRACTION_PROMPT.to_string(),
        }
    }
}

impl PromptTemplates {
    /// Load templates from the configured files, using the built-in text for
    /// any file not configured.
    pub fn load(config: &PromptConfig) -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            analysis: read_or(config.analysis_path.as_deref(), defaults.analysis)?,
            extraction: read_or(config.extraction_path.as_deref(), defaults.extraction)?,
        })
    }
}

fn read_or(path: Option<&Path>, fallback: String) -> Result<String> {
    let Some(path) = path else {
        return Ok(fallback);
    };
    let text = std::fs::read_to_string(path).map_err(|e| {
        CleanBitesError::Config(format!("Failed to read prompt {}: {e}", path.display()))
    })?;
    let text = text.trim();
    if text.is_empty() {
        return Err(CleanBitesError::Config(format!(
            "Prompt file {} is empty",
            path.display()
        )));
    }
    Ok(text.to_string())
}

/// Assemble the full analysis prompt.
pub fn compose_analysis_prompt(template: &str, food_text: &str, user_text: &str) -> String {
    format!("{template}\n\nFood Search Details:\n{food_text}\n\nUser Details:\n{user_text}")
}
