//! Training loop, loss selection and per-epoch metrics.

pub mod trainer;

pub use trainer::{fit, TrainingRun};

use serde::{Deserialize, Serialize};

use crate::dataset::AugmentationConfig;
use crate::error::{Error, Result};

/// Default batch size
pub const DEFAULT_BATCH_SIZE: usize = 32;

/// Default learning rate (Adam)
pub const DEFAULT_LEARNING_RATE: f64 = 0.001;

/// Default fraction of the dataset held out for validation
pub const DEFAULT_VALIDATION_FRACTION: f64 = 0.2;

/// Loss formulation, decided once from the class count at training start
/// and persisted with the model's hyperparameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LossKind {
    /// Two-class problems: binary cross-entropy over the two softmax outputs
    Binary,
    /// Three or more classes: categorical cross-entropy
    Categorical,
}

impl LossKind {
    pub fn for_classes(num_classes: usize) -> Self {
        if num_classes == 2 {
            LossKind::Binary
        } else {
            LossKind::Categorical
        }
    }
}

impl std::fmt::Display for LossKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LossKind::Binary => write!(f, "binary cross-entropy"),
            LossKind::Categorical => write!(f, "categorical cross-entropy"),
        }
    }
}

/// Immutable training configuration, passed in at call time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Number of training epochs
    pub epochs: usize,
    /// Batch size
    pub batch_size: usize,
    /// Adam learning rate
    pub learning_rate: f64,
    /// Fraction of the shuffled dataset held out for validation
    pub validation_fraction: f64,
    /// Augmentation parameters; `None` disables augmentation entirely
    pub augmentation: Option<AugmentationConfig>,
    /// Seed for shuffling, splitting and augmentation sampling
    pub seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: 25,
            batch_size: DEFAULT_BATCH_SIZE,
            learning_rate: DEFAULT_LEARNING_RATE,
            validation_fraction: DEFAULT_VALIDATION_FRACTION,
            augmentation: None,
            seed: 42,
        }
    }
}

impl TrainingConfig {
    /// Validate the configuration before any computation starts.
    pub fn validate(&self) -> Result<()> {
        if self.epochs == 0 {
            return Err(Error::Config("epoch count must be at least 1".to_string()));
        }
        if self.batch_size == 0 {
            return Err(Error::Config("batch size must be at least 1".to_string()));
        }
        if !(self.validation_fraction > 0.0 && self.validation_fraction < 1.0) {
            return Err(Error::Config(format!(
                "validation fraction must be in (0, 1), got {}",
                self.validation_fraction
            )));
        }
        if !(self.learning_rate > 0.0) {
            return Err(Error::Config(format!(
                "learning rate must be positive, got {}",
                self.learning_rate
            )));
        }
        Ok(())
    }
}

/// The four per-epoch metric series recorded by the trainer.
///
/// This is the contract surface for downstream reporting: one entry per
/// epoch in each series, in epoch order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrainingHistory {
    pub train_loss: Vec<f64>,
    pub train_accuracy: Vec<f64>,
    pub val_loss: Vec<f64>,
    pub val_accuracy: Vec<f64>,
}

impl TrainingHistory {
    pub fn record_epoch(
        &mut self,
        train_loss: f64,
        train_accuracy: f64,
        val_loss: f64,
        val_accuracy: f64,
    ) {
        self.train_loss.push(train_loss);
        self.train_accuracy.push(train_accuracy);
        self.val_loss.push(val_loss);
        self.val_accuracy.push(val_accuracy);
    }

    pub fn epochs(&self) -> usize {
        self.train_loss.len()
    }
}
