use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ServiceError, ServiceResult};

/// Labels in model-output order: index `i` of the output vector is `BUILTIN_LABELS[i]`.
pub const BUILTIN_LABELS: [&str; 4] = [
    "glioma_tumor",
    "meningioma_tumor",
    "no_tumor",
    "pituitary_tumor",
];

/// Ordered, non-empty, duplicate-free label list loaded next to the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassLabels {
    labels: Vec<String>,
}

impl Default for ClassLabels {
    fn default() -> Self {
        Self {
            labels: BUILTIN_LABELS.iter().map(|l| l.to_string()).collect(),
        }
    }
}

impl ClassLabels {
    pub fn new<I, S>(labels: I) -> ServiceResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let labels: Vec<String> = labels.into_iter().map(Into::into).collect();
        if labels.is_empty() {
            return Err(ServiceError::ModelLoadError("label list is empty".into()));
        }

        let mut seen = HashSet::new();
        for label in &labels {
            if !seen.insert(label.as_str()) {
                return Err(ServiceError::ModelLoadError(format!(
                    "duplicate label {label:?}"
                )));
            }
        }

        Ok(Self { labels })
    }

    /// One label per line; surrounding whitespace and blank lines are dropped.
    pub fn parse(text: &str) -> ServiceResult<Self> {
        Self::new(text.lines().map(str::trim).filter(|l| !l.is_empty()))
    }

    pub fn from_file(path: &Path) -> ServiceResult<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            ServiceError::ModelLoadError(format!("cannot read labels {}: {e}", path.display()))
        })?;
        Self::parse(&text)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.labels
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub class: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub predictions: Vec<Prediction>,
    pub top_class: String,
    pub top_confidence: f64,
}

#[derive(Debug, Serialize)]
pub struct LabelsResponse<'a> {
    pub labels: &'a [String],
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Rounds to 3 decimals, halves away from zero. Tiny negatives come out as `0.0`, never `-0.0`.
pub fn round_confidence(score: f32) -> f64 {
    (f64::from(score) * 1000.0).round() / 1000.0 + 0.0
}

/// Pairs scores with labels by position, rounds them and orders them best first.
///
/// The sort is stable, so equal rounded confidences keep label order.
pub fn rank(labels: &ClassLabels, scores: &[f32]) -> ServiceResult<PredictionResponse> {
    if scores.len() != labels.len() {
        return Err(ServiceError::OutputWidthMismatch {
            expected: labels.len(),
            actual: scores.len(),
        });
    }

    let mut predictions: Vec<Prediction> = labels
        .as_slice()
        .iter()
        .zip(scores)
        .map(|(label, &score)| Prediction {
            class: label.clone(),
            confidence: round_confidence(score),
        })
        .collect();

    predictions.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let top = predictions
        .first()
        .cloned()
        .ok_or(ServiceError::OutputWidthMismatch {
            expected: labels.len(),
            actual: 0,
        })?;

    Ok(PredictionResponse {
        predictions,
        top_class: top.class,
        top_confidence: top.confidence,
    })
}
