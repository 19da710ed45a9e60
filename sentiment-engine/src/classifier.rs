use crate::artifacts::ClassifierSpec;
use candle_core::{Device, Tensor};
use candle_nn::{Linear, Module};
use sentimind_core::{ClassificationError, ModelLoadError, SentimentLabel};
use tracing::debug;

/// Maps a feature vector onto one sentiment label.
pub trait Classifier: Send + Sync {
    fn predict(&self, features: &[f32]) -> Result<SentimentLabel, ClassificationError>;
}

fn inference_error(e: candle_core::Error) -> ClassificationError {
    ClassificationError::InferenceFailed {
        reason: e.to_string(),
    }
}

/// Optional standard scaling followed by a linear decision function.
#[derive(Debug)]
pub struct LinearPipelineClassifier {
    labels: Vec<SentimentLabel>,
    scaler: Option<(Tensor, Tensor)>,
    linear: Linear,
    input_dim: usize,
    binary: bool,
    device: Device,
}

impl LinearPipelineClassifier {
    pub fn from_spec(spec: &ClassifierSpec) -> Result<Self, ModelLoadError> {
        let invalid = |details: String| ModelLoadError::InvalidArtifact {
            path: crate::artifacts::CLASSIFIER_FILE.to_string(),
            details,
        };

        let labels = spec
            .labels
            .iter()
            .map(|name| {
                SentimentLabel::from_class_name(name)
                    .ok_or_else(|| ModelLoadError::UnknownLabel { label: name.clone() })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let input_dim = spec.input_dim();
        if input_dim == 0 {
            return Err(invalid("classifier has no weights".to_string()));
        }
        if let Some(row) = spec.weights.iter().find(|row| row.len() != input_dim) {
            return Err(ModelLoadError::DimensionMismatch {
                expected: input_dim,
                actual: row.len(),
            });
        }

        let rows = spec.weights.len();
        let binary = labels.len() == 2 && rows == 1;
        if !binary && rows != labels.len() {
            return Err(invalid(format!(
                "{} weight rows for {} labels",
                rows,
                labels.len()
            )));
        }
        if spec.bias.len() != rows {
            return Err(invalid(format!(
                "{} bias terms for {} weight rows",
                spec.bias.len(),
                rows
            )));
        }

        let device = Device::Cpu;
        let to_load_error = |e: candle_core::Error| invalid(e.to_string());

        let flat: Vec<f32> = spec.weights.iter().flatten().copied().collect();
        let weight = Tensor::from_vec(flat, (rows, input_dim), &device).map_err(to_load_error)?;
        let bias = Tensor::from_vec(spec.bias.clone(), rows, &device).map_err(to_load_error)?;

        let scaler = match &spec.scaler {
            Some(scaler) => {
                if scaler.mean.len() != input_dim || scaler.scale.len() != input_dim {
                    return Err(invalid(format!(
                        "scaler has {} means and {} scales for {} features",
                        scaler.mean.len(),
                        scaler.scale.len(),
                        input_dim
                    )));
                }
                // Constant features were fitted with a zero scale; leave them unscaled
                let scale: Vec<f32> = scaler
                    .scale
                    .iter()
                    .map(|s| if *s == 0.0 { 1.0 } else { *s })
                    .collect();
                let mean = Tensor::from_vec(scaler.mean.clone(), input_dim, &device)
                    .map_err(to_load_error)?;
                let scale = Tensor::from_vec(scale, input_dim, &device).map_err(to_load_error)?;
                Some((mean, scale))
            }
            None => None,
        };

        debug!(
            "Linear classifier ready: {} features, labels {:?}",
            input_dim, labels
        );
        Ok(Self {
            labels,
            scaler,
            linear: Linear::new(weight, Some(bias)),
            input_dim,
            binary,
            device,
        })
    }

    pub fn labels(&self) -> &[SentimentLabel] {
        &self.labels
    }

    pub fn input_dim(&self) -> usize {
        self.input_dim
    }

    fn decision_scores(&self, features: &[f32]) -> Result<Vec<f32>, ClassificationError> {
        let input = Tensor::from_slice(features, (1, self.input_dim), &self.device)
            .map_err(inference_error)?;
        let input = match &self.scaler {
            Some((mean, scale)) => input
                .broadcast_sub(mean)
                .and_then(|x| x.broadcast_div(scale))
                .map_err(inference_error)?,
            None => input,
        };
        self.linear
            .forward(&input)
            .and_then(|scores| scores.squeeze(0))
            .and_then(|scores| scores.to_vec1::<f32>())
            .map_err(inference_error)
    }
}

impl Classifier for LinearPipelineClassifier {
    fn predict(&self, features: &[f32]) -> Result<SentimentLabel, ClassificationError> {
        if features.len() != self.input_dim {
            return Err(ClassificationError::DimensionMismatch {
                expected: self.input_dim,
                actual: features.len(),
            });
        }

        let scores = self.decision_scores(features)?;
        if scores.iter().any(|s| !s.is_finite()) {
            return Err(ClassificationError::InferenceFailed {
                reason: format!("non-finite decision scores {:?}", scores),
            });
        }

        let index = if self.binary {
            usize::from(scores[0] > 0.0)
        } else {
            scores
                .iter()
                .enumerate()
                .fold((0usize, f32::NEG_INFINITY), |best, (i, s)| {
                    if *s > best.1 {
                        (i, *s)
                    } else {
                        best
                    }
                })
                .0
        };

        self.labels
            .get(index)
            .cloned()
            .ok_or(ClassificationError::LabelOutOfRange {
                index,
                classes: self.labels.len(),
            })
    }
}
