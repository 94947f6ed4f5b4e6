//! Inference over persisted artifacts.

pub mod predictor;

pub use predictor::{Classifier, Prediction, RankedClass};
