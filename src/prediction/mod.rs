mod gemini;

pub use gemini::{GeminiPredictor, PREDICTION_PROMPT, VALIDATION_PROMPT};

use crate::blob::ImageBlob;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Typical adult range used by the result screen, in g/dL.
pub const LOW_HB_THRESHOLD: f64 = 12.0;
pub const HIGH_HB_THRESHOLD: f64 = 17.5;

/// Bounds of the gauge drawn on the result screen, in g/dL.
pub const GAUGE_MIN_HB: f64 = 8.0;
pub const GAUGE_MAX_HB: f64 = 20.0;

#[derive(Error, Debug)]
pub enum PredictionError {
    #[error("Request to the model failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Model API returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("Model returned no text")]
    EmptyResponse,
    #[error("Invalid JSON structure from model: {0}")]
    MalformedResponse(String),
    #[error("Prediction service misconfigured: {0}")]
    Configuration(String),
}

/// Hemoglobin estimate returned by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionResult {
    pub hb_value: f64,
    pub confidence: f64,
    pub analysis: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HbStatus {
    Low,
    Normal,
    High,
}

impl PredictionResult {
    pub fn status(&self) -> HbStatus {
        if self.hb_value < LOW_HB_THRESHOLD {
            HbStatus::Low
        } else if self.hb_value > HIGH_HB_THRESHOLD {
            HbStatus::High
        } else {
            HbStatus::Normal
        }
    }

    /// Position of the value on the gauge, 0 at the left end and 1 at the right.
    pub fn gauge_fraction(&self) -> f64 {
        ((self.hb_value - GAUGE_MIN_HB) / (GAUGE_MAX_HB - GAUGE_MIN_HB)).clamp(0.0, 1.0)
    }

    pub fn confidence_percent(&self) -> u8 {
        (self.confidence * 100.0).round().clamp(0.0, 100.0) as u8
    }
}

/// The two calls the workflow makes against a hosted vision model.
///
/// Implementations must fail closed on `validate`: when the model cannot be
/// reached or its reply cannot be read, the image is reported as not valid
/// (`Ok(false)`) rather than as an error. `Err` from `validate` is reserved
/// for failures that happen before a request is sent.
///
/// `predict` never returns a partially populated result. A reply with a
/// missing or mistyped field is a [`PredictionError::MalformedResponse`].
#[async_trait]
pub trait HbPredictor: Send + Sync {
    async fn validate(&self, image: &ImageBlob) -> Result<bool, PredictionError>;

    async fn predict(&self, image: &ImageBlob) -> Result<PredictionResult, PredictionError>;
}

/// `true` when a yes/no answer from the model reads as yes.
pub fn is_affirmative(answer: &str) -> bool {
    answer.trim().to_lowercase().contains("yes")
}

/// Parses the schema-constrained JSON reply of a prediction call.
pub fn parse_prediction(text: &str) -> Result<PredictionResult, PredictionError> {
    let result: PredictionResult = serde_json::from_str(text.trim())
        .map_err(|e| PredictionError::MalformedResponse(e.to_string()))?;

    if result.analysis.trim().is_empty() {
        return Err(PredictionError::MalformedResponse(
            "analysis is empty".to_string(),
        ));
    }

    Ok(result)
}
