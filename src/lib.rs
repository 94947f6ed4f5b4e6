//! # lenet-classify
//!
//! A LeNet5-style image classifier built with the Burn framework. Training
//! consumes a directory of class-labeled images (`set-3-cat/...`), produces
//! a persisted artifact pair (weights+hyperparameters and label vocabulary),
//! and inference loads that pair to rank candidate classes for new images
//! with the exact preprocessing used at training time.
//!
//! ## Modules
//!
//! - `dataset`: loading, preprocessing, batching, augmentation
//! - `model`: the LeNet CNN built with Burn
//! - `training`: loss selection, the epoch loop, per-epoch metrics
//! - `artifact`: persistence of the trained artifact pair
//! - `inference`: ranked prediction over loaded artifacts
//! - `utils`: logging and training-curve charts
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use lenet_classify::backend::{default_device, TrainingBackend};
//! use lenet_classify::dataset::{ImageShape, LabeledDataset, Preprocessor};
//! use lenet_classify::training::{fit, TrainingConfig};
//!
//! let preprocessor = Preprocessor::new(ImageShape::new(28, 3)?);
//! let dataset = LabeledDataset::load("data/animals", &preprocessor)?;
//! let run = fit::<TrainingBackend>(&dataset, &TrainingConfig::default(), &default_device())?;
//! lenet_classify::artifact::save(&run.artifact, dataset.vocabulary(), "out/animals")?;
//! ```

pub mod artifact;
pub mod backend;
pub mod dataset;
pub mod error;
pub mod inference;
pub mod model;
pub mod training;
pub mod utils;

// Re-export commonly used items for convenience
pub use artifact::{Hyperparams, ModelArtifact, LABELS_SUFFIX, MODEL_SUFFIX};
pub use dataset::{
    AugmentationConfig, AugmentationStream, DatasetStats, ImageItem, ImageShape, LabelVocabulary,
    LabeledDataset, Preprocessor,
};
pub use error::{Error, Result};
pub use inference::{Classifier, Prediction, RankedClass};
pub use model::{LeNet, LeNetConfig};
pub use training::{fit, LossKind, TrainingConfig, TrainingHistory, TrainingRun};
pub use utils::{init_logging, LogConfig};

/// Default square input side length (the classic LeNet5 input)
pub const DEFAULT_IMAGE_SIZE: usize = 28;

/// Default channel depth (RGB)
pub const DEFAULT_CHANNELS: usize = 3;

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
