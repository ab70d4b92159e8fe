//! Core `SoundClassifier` trait and `ApiClassifier` implementation.
//!
//! `ApiClassifier` posts a single-channel waveform to an external
//! classification service and parses the ranked `(label, score)` list it
//! returns.  All connection details come from [`ClassifierConfig`]; the
//! model itself lives in the service.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ClassifierConfig;

// ---------------------------------------------------------------------------
// ClassifyError
// ---------------------------------------------------------------------------

/// Errors that can occur while classifying one waveform.
#[derive(Debug, Error)]
pub enum ClassifyError {
    /// HTTP transport or connection error.
    #[error("classification request failed: {0}")]
    Request(String),

    /// The request did not complete within the configured timeout.
    #[error("classification request timed out")]
    Timeout,

    /// The response body was not the expected JSON shape.
    #[error("failed to parse classification response: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for ClassifyError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ClassifyError::Timeout
        } else {
            ClassifyError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// Prediction
// ---------------------------------------------------------------------------

/// One ranked classifier output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub label: String,
    /// Confidence in `[0, 1]`.
    #[serde(alias = "score")]
    pub confidence: f32,
}

impl Prediction {
    pub fn new(label: impl Into<String>, confidence: f32) -> Self {
        Self {
            label: label.into(),
            confidence,
        }
    }
}

// ---------------------------------------------------------------------------
// SoundClassifier trait
// ---------------------------------------------------------------------------

/// Async trait for waveform classifiers.
///
/// `waveform` is single-channel `f32` PCM at the pipeline's target rate.
/// Implementors must be `Send + Sync` so they can be shared behind an
/// `Arc<dyn SoundClassifier>` and called concurrently.
#[async_trait]
pub trait SoundClassifier: Send + Sync {
    async fn classify(&self, waveform: &[f32], top_k: usize)
        -> Result<Vec<Prediction>, ClassifyError>;
}

// ---------------------------------------------------------------------------
// ApiClassifier
// ---------------------------------------------------------------------------

/// Calls an audio-classification service at `{base_url}/classify`.
///
/// Request body:
///
/// ```json
/// { "model": "...", "sample_rate": 16000, "top_k": 3, "waveform": [0.0, ...] }
/// ```
///
/// Response body: `[{ "label": "Speech", "score": 0.91 }, ...]`, or the same
/// array wrapped as `{ "predictions": [...] }`.
pub struct ApiClassifier {
    client: reqwest::Client,
    config: ClassifierConfig,
    sample_rate: u32,
}

impl ApiClassifier {
    /// Build an `ApiClassifier` from application config.
    ///
    /// `sample_rate` is the rate of every waveform passed to `classify`.
    pub fn from_config(config: &ClassifierConfig, sample_rate: u32) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            config: config.clone(),
            sample_rate,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/classify", self.config.base_url.trim_end_matches('/'))
    }
}

/// Accepts either a bare prediction array or `{ "predictions": [...] }`.
fn parse_predictions(json: serde_json::Value) -> Result<Vec<Prediction>, ClassifyError> {
    let list = match json {
        serde_json::Value::Object(mut obj) => obj
            .remove("predictions")
            .ok_or_else(|| ClassifyError::Parse("missing `predictions` field".into()))?,
        other => other,
    };
    serde_json::from_value(list).map_err(|e| ClassifyError::Parse(e.to_string()))
}

#[async_trait]
impl SoundClassifier for ApiClassifier {
    async fn classify(
        &self,
        waveform: &[f32],
        top_k: usize,
    ) -> Result<Vec<Prediction>, ClassifyError> {
        let body = serde_json::json!({
            "model":       self.config.model,
            "sample_rate": self.sample_rate,
            "top_k":       top_k,
            "waveform":    waveform,
        });

        let response = self
            .client
            .post(self.endpoint())
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ClassifyError::Parse(e.to_string()))?;

        parse_predictions(json)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_config_builds_without_panic() {
        let _classifier = ApiClassifier::from_config(&ClassifierConfig::default(), 16_000);
    }

    #[test]
    fn endpoint_tolerates_trailing_slash() {
        let config = ClassifierConfig {
            base_url: "http://127.0.0.1:9000/".into(),
            ..ClassifierConfig::default()
        };
        let classifier = ApiClassifier::from_config(&config, 16_000);
        assert_eq!(classifier.endpoint(), "http://127.0.0.1:9000/classify");
    }

    #[test]
    fn parses_bare_array_with_score_field() {
        let json = serde_json::json!([
            { "label": "Speech", "score": 0.9 },
            { "label": "Music", "score": 0.1 }
        ]);
        let predictions = parse_predictions(json).unwrap();
        assert_eq!(predictions.len(), 2);
        assert_eq!(predictions[0], Prediction::new("Speech", 0.9));
    }

    #[test]
    fn parses_wrapped_predictions() {
        let json = serde_json::json!({
            "predictions": [{ "label": "Dog", "confidence": 0.4 }]
        });
        let predictions = parse_predictions(json).unwrap();
        assert_eq!(predictions, vec![Prediction::new("Dog", 0.4)]);
    }

    #[test]
    fn rejects_unexpected_shape() {
        let json = serde_json::json!({ "error": "model not loaded" });
        assert!(matches!(parse_predictions(json), Err(ClassifyError::Parse(_))));
    }

    #[test]
    fn classifier_is_object_safe() {
        let classifier: Box<dyn SoundClassifier> = Box::new(ApiClassifier::from_config(
            &ClassifierConfig::default(),
            16_000,
        ));
        drop(classifier);
    }
}
