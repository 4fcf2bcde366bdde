//! Classifier architectures over windowed feature vectors.
//!
//! Models take `[batch, 1, width]` inputs and return `[batch, num_classes]`
//! logits. The architecture is a tagged choice made at configuration time
//! ([`ModelKind`]); training code is generic over [`Classifier`].

pub mod mlp;
pub mod vgg;

use crate::error::TrainingError;
use burn::module::Module;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use serde::{Deserialize, Serialize};

pub use mlp::{Mlp, MlpConfig};
pub use vgg::{Vgg1d, Vgg1dConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    Vgg,
    Mlp,
}

impl std::fmt::Display for ModelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Vgg => f.write_str("vgg"),
            Self::Mlp => f.write_str("mlp"),
        }
    }
}

impl std::str::FromStr for ModelKind {
    type Err = TrainingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "vgg" => Ok(Self::Vgg),
            "mlp" => Ok(Self::Mlp),
            other => Err(TrainingError::InvalidConfig(format!("unknown model '{other}' (expected vgg or mlp)"))),
        }
    }
}

/// One node of a model's layer chain, used for graph dumps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerNode {
    pub name: String,
    pub detail: String,
}

impl LayerNode {
    pub(crate) fn new(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self { name: name.into(), detail: detail.into() }
    }
}

pub trait Classifier<B: Backend>: Module<B> {
    /// Logits for a `[batch, 1, width]` input.
    fn forward(&self, input: Tensor<B, 3>) -> Tensor<B, 2>;

    /// Layers from input to logits, in evaluation order.
    fn graph(&self) -> Vec<LayerNode>;
}

/// Identifies the shape of a model so snapshots can be checked before loading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSignature {
    pub kind: ModelKind,
    pub input_width: usize,
    pub num_classes: usize,
    pub num_params: usize,
}

impl ModelSignature {
    #[must_use]
    pub fn of<B: Backend, M: Module<B>>(kind: ModelKind, input_width: usize, num_classes: usize, model: &M) -> Self {
        Self { kind, input_width, num_classes, num_params: model.num_params() }
    }
}
