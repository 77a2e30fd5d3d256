//! Server-side state machine for one analysis session.
//!
//! ```text
//! Idle --select--> Idle(image) --begin--> Validating --yes--> Analyzing --ok--> Result
//!                                             |                  |
//!                                             +--no/err--> Failed <--err--+
//! Failed --begin--> Validating
//! any --reset--> Idle
//! ```
//!
//! The controller lock is never held across a call to the predictor. Each
//! submission carries the epoch it was admitted under; `reset` and
//! `select_image` advance the epoch so that a late answer from the model is
//! dropped instead of being applied to a newer state.

use crate::blob::{ImageBlob, ImageMime};
use crate::prediction::{HbPredictor, HbStatus, PredictionResult};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::instrument;

pub const INVALID_IMAGE_MESSAGE: &str =
    "Invalid image. Please upload a clear, close-up image of a human nailbed.";
pub const PREDICTION_ERROR_MESSAGE: &str =
    "An error occurred during prediction. Please try again.";

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("Please upload an image first.")]
    NoImage,
    #[error("An analysis is already in progress.")]
    Busy,
    #[error("Reset or upload a new image before analyzing again.")]
    NotReady,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowPhase {
    Idle,
    Validating,
    Analyzing,
    Result(PredictionResult),
    Failed(String),
}

impl WorkflowPhase {
    pub fn name(&self) -> &'static str {
        match self {
            WorkflowPhase::Idle => "idle",
            WorkflowPhase::Validating => "validating",
            WorkflowPhase::Analyzing => "analyzing",
            WorkflowPhase::Result(_) => "result",
            WorkflowPhase::Failed(_) => "failed",
        }
    }

    pub fn is_busy(&self) -> bool {
        matches!(self, WorkflowPhase::Validating | WorkflowPhase::Analyzing)
    }

    /// Loader text shown while a call is in flight.
    pub fn status_message(&self) -> Option<&'static str> {
        match self {
            WorkflowPhase::Validating => Some("Validating image..."),
            WorkflowPhase::Analyzing => Some("Analyzing nailbed characteristics..."),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultView {
    #[serde(flatten)]
    pub prediction: PredictionResult,
    pub status: HbStatus,
    pub gauge_fraction: f64,
    pub confidence_percent: u8,
}

impl From<&PredictionResult> for ResultView {
    fn from(prediction: &PredictionResult) -> Self {
        Self {
            status: prediction.status(),
            gauge_fraction: prediction.gauge_fraction(),
            confidence_percent: prediction.confidence_percent(),
            prediction: prediction.clone(),
        }
    }
}

/// What the page needs to draw the current screen.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseSnapshot {
    pub phase: &'static str,
    pub has_image: bool,
    pub image_type: Option<ImageMime>,
    pub message: Option<&'static str>,
    pub result: Option<ResultView>,
    pub error: Option<String>,
}

/// Ticket for an admitted submission, consumed by [`WorkflowController::run`].
#[derive(Debug)]
pub struct Submission {
    epoch: u64,
    image: ImageBlob,
}

#[derive(Debug)]
struct Inner {
    phase: WorkflowPhase,
    image: Option<ImageBlob>,
    epoch: u64,
}

pub struct WorkflowController {
    predictor: Arc<dyn HbPredictor>,
    inner: Mutex<Inner>,
}

impl std::fmt::Debug for WorkflowController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowController")
            .field("inner", &self.inner)
            .finish_non_exhaustive()
    }
}

impl WorkflowController {
    pub fn new(predictor: Arc<dyn HbPredictor>) -> Self {
        Self {
            predictor,
            inner: Mutex::new(Inner {
                phase: WorkflowPhase::Idle,
                image: None,
                epoch: 0,
            }),
        }
    }

    pub fn phase(&self) -> WorkflowPhase {
        self.inner.lock().phase.clone()
    }

    pub fn has_image(&self) -> bool {
        self.inner.lock().image.is_some()
    }

    pub fn snapshot(&self) -> PhaseSnapshot {
        let inner = self.inner.lock();
        let (result, error) = match &inner.phase {
            WorkflowPhase::Result(prediction) => (Some(ResultView::from(prediction)), None),
            WorkflowPhase::Failed(message) => (None, Some(message.clone())),
            _ => (None, None),
        };

        PhaseSnapshot {
            phase: inner.phase.name(),
            has_image: inner.image.is_some(),
            image_type: inner.image.as_ref().map(ImageBlob::mime),
            message: inner.phase.status_message(),
            result,
            error,
        }
    }

    /// Stores a new image, dropping any previous image, result or error.
    pub fn select_image(&self, image: ImageBlob) -> Result<(), WorkflowError> {
        let mut inner = self.inner.lock();
        if inner.phase.is_busy() {
            return Err(WorkflowError::Busy);
        }

        tracing::debug!(mime = %image.mime(), bytes = image.len(), "Image selected");
        inner.epoch += 1;
        inner.image = Some(image);
        inner.phase = WorkflowPhase::Idle;
        Ok(())
    }

    /// Returns to `Idle` with nothing held. Any call still in flight keeps
    /// running but its answer will be discarded.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        if inner.phase.is_busy() {
            tracing::info!(phase = inner.phase.name(), "Reset while a call is in flight");
        }
        inner.epoch += 1;
        inner.image = None;
        inner.phase = WorkflowPhase::Idle;
    }

    /// Admits a submission. `Idle` or `Failed` with an image present is
    /// accepted, so a failed cycle can be retried with the same image.
    pub fn begin(&self) -> Result<Submission, WorkflowError> {
        let mut inner = self.inner.lock();
        match inner.phase {
            WorkflowPhase::Idle | WorkflowPhase::Failed(_) => {}
            WorkflowPhase::Validating | WorkflowPhase::Analyzing => {
                return Err(WorkflowError::Busy)
            }
            WorkflowPhase::Result(_) => return Err(WorkflowError::NotReady),
        }

        let image = inner.image.clone().ok_or(WorkflowError::NoImage)?;
        inner.phase = WorkflowPhase::Validating;

        Ok(Submission {
            epoch: inner.epoch,
            image,
        })
    }

    /// Drives an admitted submission through validation and estimation.
    #[instrument(skip(self, submission), fields(epoch = submission.epoch))]
    pub async fn run(&self, submission: Submission) {
        let Submission { epoch, image } = submission;

        let next = match self.predictor.validate(&image).await {
            Ok(true) => WorkflowPhase::Analyzing,
            Ok(false) => WorkflowPhase::Failed(INVALID_IMAGE_MESSAGE.to_string()),
            Err(e) => {
                tracing::error!("Image validation failed: {}", e);
                WorkflowPhase::Failed(PREDICTION_ERROR_MESSAGE.to_string())
            }
        };
        let proceed = next == WorkflowPhase::Analyzing;

        if !self.transition(epoch, next) || !proceed {
            return;
        }

        let outcome = match self.predictor.predict(&image).await {
            Ok(prediction) => WorkflowPhase::Result(prediction),
            Err(e) => {
                tracing::error!("Hb prediction failed: {}", e);
                WorkflowPhase::Failed(PREDICTION_ERROR_MESSAGE.to_string())
            }
        };

        self.transition(epoch, outcome);
    }

    /// `begin` followed by `run`.
    pub async fn submit(&self) -> Result<(), WorkflowError> {
        let submission = self.begin()?;
        self.run(submission).await;
        Ok(())
    }

    fn transition(&self, epoch: u64, phase: WorkflowPhase) -> bool {
        let mut inner = self.inner.lock();
        if inner.epoch != epoch {
            tracing::info!(
                stale_epoch = epoch,
                current_epoch = inner.epoch,
                discarded = phase.name(),
                "Discarding stale answer"
            );
            return false;
        }

        tracing::debug!(from = inner.phase.name(), to = phase.name(), "Phase change");
        inner.phase = phase;
        true
    }
}
