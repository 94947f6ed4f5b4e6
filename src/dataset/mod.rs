//! Dataset handling: loading, preprocessing, batching and augmentation.

pub mod augmentation;
pub mod burn_dataset;
pub mod loader;
pub mod preprocess;

pub use augmentation::{AugmentationConfig, AugmentationStream};
pub use burn_dataset::{ImageBatch, ImageBatcher, ImageItem, InMemoryDataset};
pub use loader::{DatasetStats, LabelVocabulary, LabeledDataset, LABEL_DELIMITER};
pub use preprocess::{ImageShape, Preprocessor};
