//! Classification of emails into category, sentiment and urgency.
//!
//! Keyword rules always run. When a hosted [`TextClassifier`] is configured,
//! its zero-shot label replaces the rule category and its sentiment label is
//! used. Model failures fall back to the rule result.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use lru::LruCache;
use serde::Serialize;
use tracing::{debug, warn};

use super::category_service::CategoryService;
use super::error::ServiceResult;
use crate::domain::{truncate_chars, AccountId, Sentiment, Urgency, UNLABELED};
use crate::providers::ai::TextClassifier;

/// Ordered keyword rules. The first category with a matching keyword wins.
pub const CATEGORY_KEYWORDS: [(&str, &[&str]); 6] = [
    (
        "Billing",
        &["invoice", "payment", "receipt", "bill", "subscription", "charge"],
    ),
    (
        "Account Info",
        &["username", "password", "login", "account", "verify", "security"],
    ),
    (
        "Work Update",
        &["meeting", "project", "deadline", "update", "standup", "report"],
    ),
    (
        "Promotion",
        &["sale", "offer", "discount", "promotion", "deal", "limited time"],
    ),
    (
        "Spam",
        &["lottery", "winner", "prize", "crypto", "inheritance", "urgent transfer"],
    ),
    (
        "Personal",
        &["family", "friend", "party", "dinner", "weekend", "love"],
    ),
];

pub const URGENCY_KEYWORDS: [&str; 7] = [
    "asap",
    "urgent",
    "deadline",
    "immediately",
    "critical",
    "overdue",
    "action required",
];

/// Characters of text sent to the hosted models.
pub const MODEL_INPUT_CHARS: usize = 1024;

const CACHE_CAPACITY: usize = 256;

/// Result of classifying one email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Analysis {
    pub category: String,
    pub sentiment: Sentiment,
    pub urgency: Urgency,
}

/// Returns the first rule category matching `text`, or `Unlabeled`.
pub fn categorize_by_rules(text: &str) -> &'static str {
    let lowered = text.to_lowercase();
    CATEGORY_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| lowered.contains(k)))
        .map(|(category, _)| *category)
        .unwrap_or(UNLABELED)
}

/// Returns `High` when any urgency keyword appears in `text`.
pub fn detect_urgency(text: &str) -> Urgency {
    let lowered = text.to_lowercase();
    if URGENCY_KEYWORDS.iter().any(|k| lowered.contains(k)) {
        Urgency::High
    } else {
        Urgency::Normal
    }
}

/// Service that classifies emails and keeps a small result cache.
#[derive(Clone)]
pub struct ClassifierService {
    categories: CategoryService,
    model: Option<Arc<dyn TextClassifier>>,
    cache: Arc<Mutex<LruCache<(String, String), Analysis>>>,
}

impl std::fmt::Debug for ClassifierService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassifierService")
            .field("model", &self.model.is_some())
            .finish_non_exhaustive()
    }
}

impl ClassifierService {
    /// Creates a rule-only classifier.
    pub fn new(categories: CategoryService) -> Self {
        let capacity = NonZeroUsize::new(CACHE_CAPACITY).unwrap_or(NonZeroUsize::MIN);
        Self {
            categories,
            model: None,
            cache: Arc::new(Mutex::new(LruCache::new(capacity))),
        }
    }

    /// Adds a hosted model used ahead of the keyword rules.
    pub fn with_model(mut self, model: Arc<dyn TextClassifier>) -> Self {
        self.model = Some(model);
        self
    }

    /// Classifies an email without touching the category store.
    pub async fn classify(&self, subject: &str, body: &str) -> Analysis {
        let key = (subject.to_string(), body.to_string());
        if let Some(hit) = self.cache_get(&key) {
            return hit;
        }

        let text = format!("{subject} {body}");
        let text = text.trim();

        let mut analysis = Analysis {
            category: categorize_by_rules(text).to_string(),
            sentiment: Sentiment::Neutral,
            urgency: detect_urgency(text),
        };

        if let Some(model) = &self.model {
            let input = truncate_chars(text, MODEL_INPUT_CHARS);
            self.apply_model(model.as_ref(), &input, &mut analysis).await;
        }

        if let Ok(mut cache) = self.cache.lock() {
            cache.put(key, analysis.clone());
        }
        analysis
    }

    /// Classifies an email and, when `auto_create` is set, makes sure its
    /// category exists for the account.
    pub async fn analyze(
        &self,
        subject: &str,
        body: &str,
        account_id: Option<AccountId>,
        auto_create: bool,
    ) -> ServiceResult<Analysis> {
        let mut analysis = self.classify(subject, body).await;
        if auto_create {
            analysis.category = self
                .categories
                .auto_create_if_needed(&analysis.category, account_id)
                .await?;
        }
        Ok(analysis)
    }

    fn cache_get(&self, key: &(String, String)) -> Option<Analysis> {
        self.cache.lock().ok()?.get(key).cloned()
    }

    async fn apply_model(&self, model: &dyn TextClassifier, input: &str, analysis: &mut Analysis) {
        let labels: Vec<String> = CATEGORY_KEYWORDS
            .iter()
            .map(|(category, _)| category.to_string())
            .collect();

        match model.zero_shot(input, &labels).await {
            Ok(ranked) => {
                if let Some(top) = ranked.into_iter().next() {
                    debug!(label = %top.label, score = top.score, "Zero-shot category");
                    analysis.category = top.label;
                }
            }
            Err(e) => warn!(error = %e, "Zero-shot classification failed, using keyword rules"),
        }

        match model.sentiment(input).await {
            Ok(top) => analysis.sentiment = Sentiment::from_label(&top.label),
            Err(e) => warn!(error = %e, "Sentiment analysis failed, keeping neutral"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::ai::{LabelScore, LlmError, MockTextClassifier};
    use crate::storage::Database;
    use pretty_assertions::assert_eq;

    async fn service() -> ClassifierService {
        let db = Database::open_in_memory().await.unwrap();
        ClassifierService::new(CategoryService::new(db))
    }

    #[test]
    fn rules_follow_declared_order() {
        // "account" (Account Info) and "invoice" (Billing): Billing is checked first.
        assert_eq!(categorize_by_rules("Account invoice"), "Billing");
        assert_eq!(categorize_by_rules("Team STANDUP moved"), "Work Update");
        assert_eq!(categorize_by_rules("Limited time only"), "Promotion");
        assert_eq!(categorize_by_rules("hello there"), UNLABELED);
    }

    #[test]
    fn urgency_keywords() {
        assert_eq!(detect_urgency("Please reply ASAP"), Urgency::High);
        assert_eq!(detect_urgency("Action Required: confirm"), Urgency::High);
        assert_eq!(detect_urgency("Lunch?"), Urgency::Normal);
    }

    #[tokio::test]
    async fn rule_only_classification() {
        let svc = service().await;
        let analysis = svc.classify("Invoice due", "Your payment is pending").await;
        assert_eq!(
            analysis,
            Analysis {
                category: "Billing".to_string(),
                sentiment: Sentiment::Neutral,
                urgency: Urgency::Normal,
            }
        );
    }

    #[tokio::test]
    async fn model_overrides_category_and_sentiment() {
        let mut model = MockTextClassifier::new();
        model
            .expect_zero_shot()
            .withf(|text, labels| text.len() <= MODEL_INPUT_CHARS && labels.len() == 6)
            .times(1)
            .returning(|_, _| {
                Ok(vec![
                    LabelScore {
                        label: "Personal".to_string(),
                        score: 0.9,
                    },
                    LabelScore {
                        label: "Billing".to_string(),
                        score: 0.1,
                    },
                ])
            });
        model.expect_sentiment().times(1).returning(|_| {
            Ok(LabelScore {
                label: "POSITIVE".to_string(),
                score: 0.99,
            })
        });

        let svc = service().await.with_model(Arc::new(model));
        let body = "x".repeat(5000);
        let analysis = svc.classify("Invoice", &body).await;
        assert_eq!(analysis.category, "Personal");
        assert_eq!(analysis.sentiment, Sentiment::Positive);

        // Cached: the mock would panic on a second call.
        let again = svc.classify("Invoice", &body).await;
        assert_eq!(again, analysis);
    }

    #[tokio::test]
    async fn model_failure_keeps_rule_result() {
        let mut model = MockTextClassifier::new();
        model
            .expect_zero_shot()
            .returning(|_, _| Err(LlmError::Unavailable("loading".to_string())));
        model
            .expect_sentiment()
            .returning(|_| Err(LlmError::Unavailable("loading".to_string())));

        let svc = service().await.with_model(Arc::new(model));
        let analysis = svc.classify("Meeting moved", "see you at the standup").await;
        assert_eq!(analysis.category, "Work Update");
        assert_eq!(analysis.sentiment, Sentiment::Neutral);
    }

    #[tokio::test]
    async fn analyze_auto_creates_category() {
        let db = Database::open_in_memory().await.unwrap();
        let categories = CategoryService::new(db);
        let svc = ClassifierService::new(categories.clone());

        let analysis = svc
            .analyze("Dinner", "with family", None, true)
            .await
            .unwrap();
        assert_eq!(analysis.category, "Personal");
        assert!(categories
            .find_by_name("Personal", None)
            .await
            .unwrap()
            .is_some());

        let unlabeled = svc.analyze("Hi", "there", None, true).await.unwrap();
        assert_eq!(unlabeled.category, UNLABELED);
        assert!(categories
            .find_by_name(UNLABELED, None)
            .await
            .unwrap()
            .is_none());
    }
}
