//! Hosted model providers.
//!
//! - **OpenAI-compatible**: chat completions for reply drafting
//! - **Gemini**: `generateContent` for summaries, action items and rewrites
//! - **Hugging Face**: zero-shot and sentiment classification
//!
//! # Example
//!
//! ```rust,no_run
//! use mailroom::providers::ai::{CompletionRequest, LlmProvider, OpenAiCompatibleProvider};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let openai = OpenAiCompatibleProvider::openai("sk-...", "gpt-4o-mini");
//! let response = openai.complete(&CompletionRequest::prompt("Draft a reply")).await?;
//! println!("{}", response.text);
//! # Ok(())
//! # }
//! ```

mod gemini;
mod huggingface;
mod openai;
mod traits;

pub use gemini::GeminiProvider;
pub use huggingface::{HuggingFaceClassifier, DEFAULT_SENTIMENT_MODEL, DEFAULT_ZERO_SHOT_MODEL};
pub use openai::{OpenAiCompatibleProvider, OPENAI_BASE_URL};
#[cfg(test)]
pub use traits::MockTextClassifier;
pub use traits::{
    CompletionRequest, CompletionResponse, FinishReason, LabelScore, LlmError, LlmProvider,
    LlmResult, Message, Role, TextClassifier, TokenUsage,
};
