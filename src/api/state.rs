//! Shared application state handed to every handler.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use super::middleware::KeyedRateLimiter;
use crate::config::Settings;
use crate::providers::ai::{
    GeminiProvider, HuggingFaceClassifier, LlmProvider, OpenAiCompatibleProvider, TextClassifier,
};
use crate::providers::email::{self, GmailProvider, MailSource, SampleSource};
use crate::services::{
    AccountService, AccountSourceFactory, AssistantService, CategoryService, ClassifierService,
    EmailService, GmailSourceFactory, IngestService, Metrics, Scheduler, TemplateService,
    ThreadService,
};
use crate::storage::Database;

/// Opens the live mailbox used by the Gmail routes.
#[async_trait]
pub trait LiveMailbox: Send + Sync {
    async fn connect(&self) -> email::Result<Arc<dyn MailSource>>;
}

/// Live mailbox authorized by a token file.
#[derive(Debug, Clone)]
pub struct TokenFileMailbox {
    token_path: PathBuf,
    timeout: Duration,
}

impl TokenFileMailbox {
    pub fn new(token_path: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            token_path: token_path.into(),
            timeout,
        }
    }
}

#[async_trait]
impl LiveMailbox for TokenFileMailbox {
    async fn connect(&self) -> email::Result<Arc<dyn MailSource>> {
        let provider = GmailProvider::from_token_file(&self.token_path)
            .await?
            .with_timeout(self.timeout);
        Ok(Arc::new(provider))
    }
}

/// Services, settings and runtime helpers shared by the router.
pub struct AppState {
    pub settings: Settings,
    pub accounts: AccountService,
    pub categories: CategoryService,
    pub templates: TemplateService,
    pub emails: EmailService,
    pub threads: ThreadService,
    pub classifier: ClassifierService,
    pub ingest: IngestService,
    pub assistant: AssistantService,
    pub scheduler: Scheduler,
    pub metrics: Metrics,
    pub rate_limiter: KeyedRateLimiter,
    pub mailbox: Arc<dyn LiveMailbox>,
    pub samples: SampleSource,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("settings", &self.settings)
            .field("classifier", &self.classifier)
            .field("assistant", &self.assistant)
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Builds the state with hosted providers configured from `settings`.
    pub fn new(db: Database, settings: Settings) -> Self {
        let timeout = settings.ai.request_timeout();
        let model = ml_classifier(&settings);
        let assistant = AssistantService::new(reply_model(&settings), gemini_model(&settings));
        let mailbox: Arc<dyn LiveMailbox> =
            Arc::new(TokenFileMailbox::new(&settings.gmail.token_path, timeout));
        let sources: Arc<dyn AccountSourceFactory> = Arc::new(GmailSourceFactory::new(timeout));

        StateBuilder {
            db,
            settings,
            model,
            assistant,
            mailbox,
            sources,
        }
        .build()
    }

    /// Builds the state with explicit collaborators and no hosted models.
    pub fn with_parts(
        db: Database,
        settings: Settings,
        mailbox: Arc<dyn LiveMailbox>,
        sources: Arc<dyn AccountSourceFactory>,
        assistant: AssistantService,
    ) -> Self {
        StateBuilder {
            db,
            settings,
            model: None,
            assistant,
            mailbox,
            sources,
        }
        .build()
    }
}

struct StateBuilder {
    db: Database,
    settings: Settings,
    model: Option<Arc<dyn TextClassifier>>,
    assistant: AssistantService,
    mailbox: Arc<dyn LiveMailbox>,
    sources: Arc<dyn AccountSourceFactory>,
}

impl StateBuilder {
    fn build(self) -> AppState {
        let db = self.db;
        let accounts = AccountService::new(db.clone());
        let categories = CategoryService::new(db.clone());
        let emails = EmailService::new(db.clone());
        let threads = ThreadService::new(db.clone());

        let mut classifier = ClassifierService::new(categories.clone());
        if let Some(model) = self.model {
            classifier = classifier.with_model(model);
        }

        let ingest = IngestService::new(
            classifier.clone(),
            categories.clone(),
            emails.clone(),
            threads.clone(),
        );
        let scheduler = Scheduler::new(
            accounts.clone(),
            ingest.clone(),
            self.sources,
            self.settings.gmail.max_results,
        );
        let samples = match &self.settings.gmail.sample_path {
            Some(path) => SampleSource::from_path(path),
            None => SampleSource::bundled(),
        };

        AppState {
            rate_limiter: KeyedRateLimiter::per_minute(self.settings.server.rate_limit_per_minute),
            templates: TemplateService::new(db),
            settings: self.settings,
            accounts,
            categories,
            emails,
            threads,
            classifier,
            ingest,
            assistant: self.assistant,
            scheduler,
            metrics: Metrics::new(),
            mailbox: self.mailbox,
            samples,
        }
    }
}

fn ml_classifier(settings: &Settings) -> Option<Arc<dyn TextClassifier>> {
    if !settings.ai.ml_classifier_enabled() {
        return None;
    }
    let token = settings.ai.huggingface_api_key.as_deref()?;
    info!(
        zero_shot = %settings.ai.zero_shot_model,
        sentiment = %settings.ai.sentiment_model,
        "Hosted classifier enabled"
    );
    Some(Arc::new(
        HuggingFaceClassifier::new(token)
            .with_models(&settings.ai.zero_shot_model, &settings.ai.sentiment_model)
            .with_timeout(settings.ai.request_timeout()),
    ))
}

fn reply_model(settings: &Settings) -> Option<Arc<dyn LlmProvider>> {
    let key = settings.ai.openai_api_key.clone()?;
    let provider = match &settings.ai.openai_base_url {
        Some(base) => {
            OpenAiCompatibleProvider::custom(base, Some(key), &settings.ai.openai_model)
        }
        None => OpenAiCompatibleProvider::openai(key, &settings.ai.openai_model),
    };
    Some(Arc::new(provider.with_timeout(settings.ai.request_timeout())))
}

fn gemini_model(settings: &Settings) -> Option<Arc<dyn LlmProvider>> {
    let key = settings.ai.google_api_key.as_deref()?;
    Some(Arc::new(
        GeminiProvider::new(key, &settings.ai.gemini_model)
            .with_timeout(settings.ai.request_timeout()),
    ))
}
