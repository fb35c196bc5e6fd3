use std::path::Path;

use log::info;
use ndarray::Array4;
use tract_onnx::prelude::*;

use crate::config::Config;
use crate::error::{ServiceError, ServiceResult};
use crate::models::{rank, ClassLabels, PredictionResponse};
use crate::preprocess::INPUT_SHAPE;

type OnnxPlan = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// A forward pass over a `[1, 224, 224, 3]` tensor returning one score per class.
pub trait Classifier: Send + Sync {
    fn classify(&self, input: Array4<f32>) -> ServiceResult<Vec<f32>>;
}

/// ONNX model optimised and run on CPU by tract.
pub struct OnnxClassifier {
    plan: OnnxPlan,
    output_width: Option<usize>,
}

impl OnnxClassifier {
    pub fn load(path: &Path) -> ServiceResult<Self> {
        if !path.is_file() {
            return Err(ServiceError::ModelLoadError(format!(
                "model artifact not found at {}",
                path.display()
            )));
        }

        let load_err = |e| load_error(path, e);

        let model = tract_onnx::onnx()
            .model_for_path(path)
            .map_err(load_err)?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(f32::datum_type(), tvec!(1, 224, 224, 3)),
            )
            .map_err(load_err)?
            .into_optimized()
            .map_err(load_err)?;

        // Only known up front when every output dimension is concrete.
        let output_width = model
            .output_fact(0)
            .map_err(load_err)?
            .shape
            .as_concrete()
            .and_then(|dims| dims.last().copied());

        let plan = model.into_runnable().map_err(load_err)?;

        Ok(Self { plan, output_width })
    }

    pub fn output_width(&self) -> Option<usize> {
        self.output_width
    }
}

impl Classifier for OnnxClassifier {
    fn classify(&self, input: Array4<f32>) -> ServiceResult<Vec<f32>> {
        let tensor: Tensor = input.into_tensor();
        let outputs = self
            .plan
            .run(tvec!(tensor.into()))
            .map_err(|e| ServiceError::Inference(format!("{e:#}")))?;

        let output = outputs
            .first()
            .ok_or_else(|| ServiceError::Inference("model returned no outputs".into()))?;
        let scores = output
            .to_array_view::<f32>()
            .map_err(|e| ServiceError::Inference(format!("{e:#}")))?;

        Ok(scores.iter().copied().collect())
    }
}

fn load_error(path: &Path, err: TractError) -> ServiceError {
    ServiceError::ModelLoadError(format!("{}: {err:#}", path.display()))
}

/// A statically known output width must match the label count; unknown widths
/// are left to the per-call check in `ModelHost::classify`.
pub fn check_output_width(width: Option<usize>, labels: &ClassLabels) -> ServiceResult<()> {
    match width {
        Some(width) if width != labels.len() => Err(ServiceError::ModelLoadError(format!(
            "model outputs {width} classes but {} labels are configured",
            labels.len()
        ))),
        _ => Ok(()),
    }
}

/// The one model instance every request shares. Immutable once built.
pub struct ModelHost {
    classifier: Box<dyn Classifier>,
    labels: ClassLabels,
}

impl ModelHost {
    pub fn new(classifier: impl Classifier + 'static, labels: ClassLabels) -> Self {
        Self {
            classifier: Box::new(classifier),
            labels,
        }
    }

    /// Loads labels and the ONNX artifact named by `config`.
    pub fn initialize(config: &Config) -> ServiceResult<Self> {
        let labels = match &config.labels_path {
            Some(path) => ClassLabels::from_file(path)?,
            None => ClassLabels::default(),
        };

        let classifier = OnnxClassifier::load(&config.model_path)?;
        check_output_width(classifier.output_width(), &labels)?;

        info!(
            "loaded model {} with labels {:?}",
            config.model_path.display(),
            labels.as_slice()
        );

        Ok(Self::new(classifier, labels))
    }

    pub fn labels(&self) -> &ClassLabels {
        &self.labels
    }

    pub fn classify(&self, input: Array4<f32>) -> ServiceResult<Vec<f32>> {
        if input.shape() != &INPUT_SHAPE[..] {
            return Err(ServiceError::InvalidInputShape {
                expected: INPUT_SHAPE.to_vec(),
                actual: input.shape().to_vec(),
            });
        }

        let scores = self.classifier.classify(input)?;
        if scores.len() != self.labels.len() {
            return Err(ServiceError::OutputWidthMismatch {
                expected: self.labels.len(),
                actual: scores.len(),
            });
        }
        Ok(scores)
    }

    pub fn predict(&self, input: Array4<f32>) -> ServiceResult<PredictionResponse> {
        let scores = self.classify(input)?;
        rank(&self.labels, &scores)
    }
}
