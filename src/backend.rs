//! Backend selection - CPU ndarray backend
//!
//! Training and inference both run on the `NdArray` backend. The model is
//! small enough that CPU execution covers the training sizes this crate
//! targets, and it keeps the artifact portable across machines.

use burn::backend::Autodiff;

pub type DefaultBackend = burn::backend::NdArray<f32>;

/// The autodiff backend used for training
pub type TrainingBackend = Autodiff<DefaultBackend>;

/// Get the default device
pub fn default_device() -> <DefaultBackend as burn::tensor::backend::Backend>::Device {
    Default::default()
}

/// Get a human-readable name for the current backend
pub fn backend_name() -> &'static str {
    "NdArray (CPU)"
}
