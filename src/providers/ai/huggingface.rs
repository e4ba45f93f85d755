//! Hugging Face Inference API text classifier.
//!
//! Zero-shot and sentiment pipelines are called over HTTP, so no model
//! weights are loaded in-process.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};

use super::traits::{LabelScore, LlmError, LlmResult, TextClassifier};

const HF_INFERENCE_URL: &str = "https://api-inference.huggingface.co/models";

/// Default zero-shot model.
pub const DEFAULT_ZERO_SHOT_MODEL: &str = "facebook/bart-large-mnli";

/// Default sentiment model.
pub const DEFAULT_SENTIMENT_MODEL: &str = "distilbert-base-uncased-finetuned-sst-2-english";

#[derive(Debug, Serialize)]
struct ZeroShotRequest<'a> {
    inputs: &'a str,
    parameters: ZeroShotParameters<'a>,
}

#[derive(Debug, Serialize)]
struct ZeroShotParameters<'a> {
    candidate_labels: &'a [String],
}

#[derive(Debug, Serialize)]
struct SentimentRequest<'a> {
    inputs: &'a str,
}

#[derive(Debug, Deserialize)]
struct ZeroShotOutput {
    labels: Vec<String>,
    scores: Vec<f32>,
}

/// Zero-shot output is an object for one input, but some deployments wrap it.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ZeroShotResponse {
    Single(ZeroShotOutput),
    Batch(Vec<ZeroShotOutput>),
}

/// Sentiment output is `[[{label, score}, ...]]` or a flat list.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SentimentResponse {
    Nested(Vec<Vec<LabelScore>>),
    Flat(Vec<LabelScore>),
}

#[derive(Debug, Deserialize)]
struct HfError {
    error: String,
}

/// Classifier backed by the hosted Hugging Face Inference API.
pub struct HuggingFaceClassifier {
    client: reqwest::Client,
    base_url: String,
    api_token: String,
    zero_shot_model: String,
    sentiment_model: String,
}

impl HuggingFaceClassifier {
    /// Creates a classifier using the default models.
    pub fn new(api_token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: HF_INFERENCE_URL.to_string(),
            api_token: api_token.into(),
            zero_shot_model: DEFAULT_ZERO_SHOT_MODEL.to_string(),
            sentiment_model: DEFAULT_SENTIMENT_MODEL.to_string(),
        }
    }

    pub fn with_models(
        mut self,
        zero_shot_model: impl Into<String>,
        sentiment_model: impl Into<String>,
    ) -> Self {
        self.zero_shot_model = zero_shot_model.into();
        self.sentiment_model = sentiment_model.into();
        self
    }

    /// Applies a whole-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        if let Ok(client) = reqwest::Client::builder().timeout(timeout).build() {
            self.client = client;
        }
        self
    }

    fn build_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Ok(value) = HeaderValue::from_str(&format!("Bearer {}", self.api_token)) {
            headers.insert(AUTHORIZATION, value);
        }
        headers
    }

    async fn post<B: Serialize + ?Sized>(
        &self,
        model: &str,
        body: &B,
    ) -> LlmResult<reqwest::Response> {
        let url = format!("{}/{}", self.base_url, model);
        let response = self
            .client
            .post(&url)
            .headers(self.build_headers())
            .json(body)
            .send()
            .await?;

        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status().as_u16();
        let message = response
            .json::<HfError>()
            .await
            .map(|e| e.error)
            .unwrap_or_else(|_| format!("HTTP {}", status));

        Err(match status {
            401 | 403 => LlmError::AuthenticationError(message),
            429 => LlmError::RateLimited {
                retry_after_secs: None,
            },
            // Model still loading on the hosted side.
            503 => LlmError::Unavailable(message),
            _ => LlmError::ApiError { status, message },
        })
    }

    fn rank_zero_shot(response: ZeroShotResponse) -> LlmResult<Vec<LabelScore>> {
        let output = match response {
            ZeroShotResponse::Single(output) => output,
            ZeroShotResponse::Batch(outputs) => outputs.into_iter().next().ok_or_else(|| {
                LlmError::InvalidResponse("Empty zero-shot response".to_string())
            })?,
        };

        let mut ranked: Vec<LabelScore> = output
            .labels
            .into_iter()
            .zip(output.scores)
            .map(|(label, score)| LabelScore { label, score })
            .collect();
        ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
        Ok(ranked)
    }

    fn top_sentiment(response: SentimentResponse) -> LlmResult<LabelScore> {
        let scores = match response {
            SentimentResponse::Nested(mut outer) => {
                if outer.is_empty() {
                    Vec::new()
                } else {
                    outer.swap_remove(0)
                }
            }
            SentimentResponse::Flat(scores) => scores,
        };

        scores
            .into_iter()
            .max_by(|a, b| a.score.total_cmp(&b.score))
            .ok_or_else(|| LlmError::InvalidResponse("Empty sentiment response".to_string()))
    }
}

#[async_trait]
impl TextClassifier for HuggingFaceClassifier {
    async fn zero_shot(&self, text: &str, labels: &[String]) -> LlmResult<Vec<LabelScore>> {
        let body = ZeroShotRequest {
            inputs: text,
            parameters: ZeroShotParameters {
                candidate_labels: labels,
            },
        };
        let response: ZeroShotResponse = self
            .post(&self.zero_shot_model, &body)
            .await?
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(format!("Failed to parse response: {}", e)))?;
        Self::rank_zero_shot(response)
    }

    async fn sentiment(&self, text: &str) -> LlmResult<LabelScore> {
        let response: SentimentResponse = self
            .post(&self.sentiment_model, &SentimentRequest { inputs: text })
            .await?
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(format!("Failed to parse response: {}", e)))?;
        Self::top_sentiment(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_shot_request_shape() {
        let labels = vec!["Billing".to_string(), "Spam".to_string()];
        let body = ZeroShotRequest {
            inputs: "Your invoice",
            parameters: ZeroShotParameters {
                candidate_labels: &labels,
            },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["inputs"], "Your invoice");
        assert_eq!(json["parameters"]["candidate_labels"][1], "Spam");
    }

    #[test]
    fn test_zero_shot_ranked_best_first() {
        let json = r#"{"sequence": "x", "labels": ["Spam", "Billing"], "scores": [0.2, 0.8]}"#;
        let response: ZeroShotResponse = serde_json::from_str(json).unwrap();
        let ranked = HuggingFaceClassifier::rank_zero_shot(response).unwrap();
        assert_eq!(ranked[0].label, "Billing");
        assert_eq!(ranked[1].label, "Spam");
    }

    #[test]
    fn test_zero_shot_batch_form() {
        let json = r#"[{"labels": ["Personal"], "scores": [0.9]}]"#;
        let response: ZeroShotResponse = serde_json::from_str(json).unwrap();
        let ranked = HuggingFaceClassifier::rank_zero_shot(response).unwrap();
        assert_eq!(ranked.len(), 1);
    }

    #[test]
    fn test_sentiment_nested_top_label() {
        let json = r#"[[{"label": "NEGATIVE", "score": 0.1}, {"label": "POSITIVE", "score": 0.9}]]"#;
        let response: SentimentResponse = serde_json::from_str(json).unwrap();
        let top = HuggingFaceClassifier::top_sentiment(response).unwrap();
        assert_eq!(top.label, "POSITIVE");
    }

    #[test]
    fn test_sentiment_empty_is_invalid() {
        let response: SentimentResponse = serde_json::from_str("[[]]").unwrap();
        assert!(matches!(
            HuggingFaceClassifier::top_sentiment(response),
            Err(LlmError::InvalidResponse(_))
        ));
    }
}
