//! Writing assistant backed by hosted chat models.
//!
//! Replies are drafted with an OpenAI-compatible model. Summaries, action
//! items and rewrites use Gemini. Every operation answers with text: a missing
//! provider or a failed call yields a fixed message instead of an error.

use std::sync::Arc;

use tracing::{error, warn};

use super::error::{ensure_max_len, ServiceResult};
use crate::providers::ai::{CompletionRequest, LlmProvider};

/// Longest prompt or text accepted.
pub const MAX_PROMPT_CHARS: usize = 8000;

/// Longest tone accepted by [`AssistantService::rewrite`].
pub const MAX_TONE_CHARS: usize = 50;

pub const OPENAI_NOT_CONFIGURED: &str =
    "OPENAI_API_KEY is not set. Please configure it in your environment.";
pub const REPLY_FAILED: &str = "Error generating reply right now. Please try again later.";
pub const GEMINI_NOT_CONFIGURED: &str =
    "Gemini API is not configured. Please set GOOGLE_API_KEY.";
pub const SUMMARY_FAILED: &str = "Error generating summary. Please try again later.";
pub const ACTIONS_FAILED: &str = "Error extracting action items. Please try again later.";
pub const REWRITE_FAILED: &str = "Error rewriting text. Please try again later.";

/// Service for assistant text generation.
#[derive(Clone, Default)]
pub struct AssistantService {
    reply_model: Option<Arc<dyn LlmProvider>>,
    gemini: Option<Arc<dyn LlmProvider>>,
}

impl std::fmt::Debug for AssistantService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssistantService")
            .field("reply_model", &self.reply_model.as_ref().map(|m| m.model().to_string()))
            .field("gemini", &self.gemini.as_ref().map(|m| m.model().to_string()))
            .finish()
    }
}

impl AssistantService {
    pub fn new(
        reply_model: Option<Arc<dyn LlmProvider>>,
        gemini: Option<Arc<dyn LlmProvider>>,
    ) -> Self {
        if reply_model.is_none() {
            warn!("OPENAI_API_KEY is not set; GPT replies will be disabled");
        }
        if gemini.is_none() {
            warn!("GOOGLE_API_KEY is not set; Gemini features will be disabled");
        }
        Self {
            reply_model,
            gemini,
        }
    }

    /// Drafts a reply to `prompt`.
    pub async fn reply(&self, prompt: &str) -> ServiceResult<String> {
        ensure_max_len("prompt", prompt, MAX_PROMPT_CHARS)?;
        let Some(model) = &self.reply_model else {
            return Ok(OPENAI_NOT_CONFIGURED.to_string());
        };
        Ok(complete_or(model.as_ref(), prompt.to_string(), REPLY_FAILED).await)
    }

    /// Summarizes an email.
    pub async fn summarize(&self, text: &str) -> ServiceResult<String> {
        ensure_max_len("prompt", text, MAX_PROMPT_CHARS)?;
        let prompt = format!("Summarize the following email concisely:\n\n{text}");
        Ok(self.gemini_or(prompt, SUMMARY_FAILED).await)
    }

    /// Lists the action items in an email.
    pub async fn extract_actions(&self, text: &str) -> ServiceResult<String> {
        ensure_max_len("prompt", text, MAX_PROMPT_CHARS)?;
        let prompt = format!("Extract all action items and tasks from this email:\n\n{text}");
        Ok(self.gemini_or(prompt, ACTIONS_FAILED).await)
    }

    /// Rewrites a draft in the given tone.
    pub async fn rewrite(&self, text: &str, tone: &str) -> ServiceResult<String> {
        ensure_max_len("text", text, MAX_PROMPT_CHARS)?;
        ensure_max_len("tone", tone, MAX_TONE_CHARS)?;
        let prompt = format!("Rewrite the following text in a {tone} tone:\n\n{text}");
        Ok(self.gemini_or(prompt, REWRITE_FAILED).await)
    }

    async fn gemini_or(&self, prompt: String, fallback: &str) -> String {
        match &self.gemini {
            Some(model) => complete_or(model.as_ref(), prompt, fallback).await,
            None => GEMINI_NOT_CONFIGURED.to_string(),
        }
    }
}

async fn complete_or(model: &dyn LlmProvider, prompt: String, fallback: &str) -> String {
    match model.complete(&CompletionRequest::prompt(prompt)).await {
        Ok(response) => response.text,
        Err(e) => {
            error!(provider = model.name(), error = %e, "Assistant completion failed");
            fallback.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::ai::{
        CompletionResponse, FinishReason, LlmError, LlmResult, TokenUsage,
    };
    use crate::services::ServiceError;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    /// Echoes the last user message, or fails when `fail` is set.
    struct EchoModel {
        fail: bool,
    }

    #[async_trait]
    impl LlmProvider for EchoModel {
        fn name(&self) -> &str {
            "echo"
        }

        fn model(&self) -> &str {
            "echo-1"
        }

        async fn complete(&self, request: &CompletionRequest) -> LlmResult<CompletionResponse> {
            if self.fail {
                return Err(LlmError::Unavailable("down".to_string()));
            }
            let last = request.messages.last().map(|m| m.content.clone());
            Ok(CompletionResponse {
                text: format!("echo:{}", last.unwrap_or_default()),
                tokens_used: TokenUsage::default(),
                finish_reason: FinishReason::Stop,
            })
        }
    }

    fn echo(fail: bool) -> Option<Arc<dyn LlmProvider>> {
        Some(Arc::new(EchoModel { fail }))
    }

    #[tokio::test]
    async fn unconfigured_messages() {
        let svc = AssistantService::default();
        assert_eq!(svc.reply("hi").await.unwrap(), OPENAI_NOT_CONFIGURED);
        assert_eq!(svc.summarize("hi").await.unwrap(), GEMINI_NOT_CONFIGURED);
        assert_eq!(svc.rewrite("hi", "Friendly").await.unwrap(), GEMINI_NOT_CONFIGURED);
    }

    #[tokio::test]
    async fn reply_passes_prompt_through() {
        let svc = AssistantService::new(echo(false), None);
        assert_eq!(svc.reply("hello").await.unwrap(), "echo:hello");
    }

    #[tokio::test]
    async fn gemini_prompts_are_wrapped() {
        let svc = AssistantService::new(None, echo(false));
        assert_eq!(
            svc.summarize("Body").await.unwrap(),
            "echo:Summarize the following email concisely:\n\nBody"
        );
        assert_eq!(
            svc.extract_actions("Body").await.unwrap(),
            "echo:Extract all action items and tasks from this email:\n\nBody"
        );
        assert_eq!(
            svc.rewrite("Body", "Concise").await.unwrap(),
            "echo:Rewrite the following text in a Concise tone:\n\nBody"
        );
    }

    #[tokio::test]
    async fn failures_use_fixed_messages() {
        let svc = AssistantService::new(echo(true), echo(true));
        assert_eq!(svc.reply("x").await.unwrap(), REPLY_FAILED);
        assert_eq!(svc.summarize("x").await.unwrap(), SUMMARY_FAILED);
        assert_eq!(svc.extract_actions("x").await.unwrap(), ACTIONS_FAILED);
        assert_eq!(svc.rewrite("x", "Warm").await.unwrap(), REWRITE_FAILED);
    }

    #[tokio::test]
    async fn oversized_input_is_rejected() {
        let svc = AssistantService::default();
        let long = "x".repeat(MAX_PROMPT_CHARS + 1);
        assert!(matches!(svc.reply(&long).await, Err(ServiceError::Validation(_))));
        assert!(matches!(
            svc.rewrite("ok", &"t".repeat(51)).await,
            Err(ServiceError::Validation(_))
        ));
    }
}
