//! External AI services: text completion and label-image text extraction.

pub mod gemini;

use async_trait::async_trait;

use crate::error::Result;

pub use gemini::{GeminiAuth, GeminiExtractor, GeminiProvider};

/// A service that turns a fully assembled prompt into generated text.
///
/// The text is expected, not guaranteed, to be JSON; callers validate it.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// A service that reads the text printed on a food label image.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract_text(&self, image: &[u8], mime_type: &str) -> Result<String>;
}

/// Strip a surrounding Markdown code fence (```` ```json ... ``` ````), which
/// models often add around JSON answers.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(body) = rest.strip_suffix("```") else {
        return trimmed;
    };
    // Drop the info string (e.g. `json`) on the opening line.
    match body.find('\n') {
        Some(nl) => body[nl + 1..].trim(),
        None => body.trim(),
    }
}
