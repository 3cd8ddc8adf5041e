use serde::Deserialize;
use std::sync::Arc;

use crate::normalizer::{InputSpec, NormalizedTensor};

#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("Model handle is not loaded")]
    ModelUnset,
    #[error("Tensor shape {actual:?} does not match model input {expected:?}")]
    ShapeMismatch {
        expected: [usize; 4],
        actual: [usize; 4],
    },
    #[error("Model returned {got} outputs, expected {expected}")]
    OutputArity { expected: usize, got: usize },
    #[error("Model runtime error: {0}")]
    Runtime(String),
}

/// A loaded, read-only model. Implementations must be safe to call from
/// several request handlers at once.
pub trait Predictor: Send + Sync {
    fn predict(&self, tensor: &NormalizedTensor) -> Result<Vec<f64>, InferenceError>;
}

/// Maps raw model output onto the classifier's closed label set.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LabelPolicy {
    /// Argmax over the output vector, first index wins on ties.
    MultiClass { labels: Vec<String> },
    /// `positive` when the first output is strictly greater than `threshold`.
    Binary {
        positive: String,
        negative: String,
        #[serde(default = "default_threshold")]
        threshold: f64,
    },
}

fn default_threshold() -> f64 {
    0.5
}

impl LabelPolicy {
    pub fn ecg() -> Self {
        LabelPolicy::MultiClass {
            labels: vec![
                "Myocardial Infarction".into(),
                "History of MI".into(),
                "Abnormal Heartbeat".into(),
                "Normal Person".into(),
            ],
        }
    }

    pub fn xray() -> Self {
        LabelPolicy::Binary {
            positive: "Pneumonia".into(),
            negative: "Normal".into(),
            threshold: default_threshold(),
        }
    }

    pub fn label(&self, output: &[f64]) -> Result<ClassificationResult, InferenceError> {
        if let Some(bad) = output.iter().find(|score| !score.is_finite()) {
            return Err(InferenceError::Runtime(format!("model produced non-finite score {}", bad)));
        }
        match self {
            LabelPolicy::MultiClass { labels } => {
                if output.len() != labels.len() {
                    return Err(InferenceError::OutputArity {
                        expected: labels.len(),
                        got: output.len(),
                    });
                }
                let mut best = 0;
                for (index, score) in output.iter().enumerate().skip(1) {
                    if *score > output[best] {
                        best = index;
                    }
                }
                Ok(ClassificationResult {
                    label: labels[best].clone(),
                    confidence: output[best],
                })
            }
            LabelPolicy::Binary {
                positive,
                negative,
                threshold,
            } => {
                let score = *output.first().ok_or(InferenceError::OutputArity {
                    expected: 1,
                    got: 0,
                })?;
                let label = if score > *threshold { positive } else { negative };
                Ok(ClassificationResult {
                    label: label.clone(),
                    confidence: score,
                })
            }
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        match self {
            LabelPolicy::MultiClass { labels } if labels.is_empty() => {
                Err("multi_class policy needs at least one label".into())
            }
            LabelPolicy::Binary { threshold, .. } if !threshold.is_finite() => {
                Err(format!("binary threshold {} is not finite", threshold))
            }
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationResult {
    pub label: String,
    /// Score that produced the label; unused by current policies beyond
    /// argmax/threshold.
    pub confidence: f64,
}

/// Wraps a shared model handle together with the input contract and label
/// policy it was trained for.
#[derive(Clone)]
pub struct ClassifierAdapter {
    predictor: Option<Arc<dyn Predictor>>,
    input: InputSpec,
    policy: LabelPolicy,
}

impl ClassifierAdapter {
    pub fn new(predictor: Arc<dyn Predictor>, input: InputSpec, policy: LabelPolicy) -> Self {
        Self {
            predictor: Some(predictor),
            input,
            policy,
        }
    }

    /// Adapter for a service that was not loaded in this process.
    pub fn unloaded(input: InputSpec, policy: LabelPolicy) -> Self {
        Self {
            predictor: None,
            input,
            policy,
        }
    }

    pub fn input(&self) -> &InputSpec {
        &self.input
    }

    pub fn is_loaded(&self) -> bool {
        self.predictor.is_some()
    }

    pub fn classify(&self, tensor: &NormalizedTensor) -> Result<ClassificationResult, InferenceError> {
        let predictor = self.predictor.as_ref().ok_or(InferenceError::ModelUnset)?;

        let expected = self.input.tensor_shape();
        let actual = tensor.shape();
        if expected != actual {
            return Err(InferenceError::ShapeMismatch { expected, actual });
        }

        let output = predictor.predict(tensor)?;
        self.policy.label(&output)
    }
}
