//! Inference: load a persisted artifact pair and rank classes for images.

use std::path::Path;

use burn::tensor::{backend::Backend, Tensor};
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::artifact::{self, Hyperparams, ModelArtifact};
use crate::dataset::{LabelVocabulary, Preprocessor};
use crate::error::{Error, Result};
use crate::model::LeNet;

/// One ranked class in a prediction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedClass {
    /// Numeric class index
    pub class_index: usize,
    /// Human-readable label from the persisted vocabulary
    pub label: String,
    /// Confidence as a percentage
    pub confidence: f32,
}

/// Classes ranked by descending confidence for one image.
///
/// Confidences are softmax outputs scaled to percentages: non-negative and
/// summing to (approximately) 100. Ties are broken by ascending class index
/// so the ordering is deterministic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    ranking: Vec<RankedClass>,
}

impl Prediction {
    fn from_probabilities(probabilities: &[f32], vocabulary: &LabelVocabulary) -> Self {
        let mut indices: Vec<usize> = (0..probabilities.len()).collect();
        indices.sort_by(|&a, &b| {
            probabilities[b]
                .total_cmp(&probabilities[a])
                .then(a.cmp(&b))
        });

        let ranking = indices
            .into_iter()
            .map(|index| RankedClass {
                class_index: index,
                label: vocabulary
                    .name(index)
                    .unwrap_or("<unknown>")
                    .to_string(),
                confidence: probabilities[index] * 100.0,
            })
            .collect();

        Self { ranking }
    }

    /// The most confident class.
    pub fn top(&self) -> &RankedClass {
        &self.ranking[0]
    }

    /// All classes, most confident first.
    pub fn ranking(&self) -> &[RankedClass] {
        &self.ranking
    }

    /// Render as `"<label>: <pp.pp>%"` lines, most confident first.
    pub fn display_lines(&self) -> Vec<String> {
        self.ranking
            .iter()
            .map(|r| format!("{}: {:.2}%", r.label, r.confidence))
            .collect()
    }
}

/// Inference engine over one loaded artifact pair.
///
/// Preprocessing uses the exact image shape recorded in the artifact's
/// hyperparameters. The engine never mutates its loaded state; `classify`
/// may be called any number of times.
pub struct Classifier<B: Backend> {
    model: LeNet<B>,
    hyper: Hyperparams,
    vocabulary: LabelVocabulary,
    preprocessor: Preprocessor,
    device: B::Device,
}

impl<B: Backend> Classifier<B> {
    /// Load the artifact pair persisted under `base`.
    pub fn load(base: impl AsRef<Path>, device: &B::Device) -> Result<Self> {
        let (ModelArtifact { model, hyper }, vocabulary) = artifact::load::<B>(&base, device)?;
        let preprocessor = Preprocessor::new(hyper.shape()?);

        Ok(Self {
            model,
            hyper,
            vocabulary,
            preprocessor,
            device: device.clone(),
        })
    }

    /// Build a classifier from in-memory parts (a just-trained artifact).
    pub fn from_artifact(
        artifact: ModelArtifact<B>,
        vocabulary: LabelVocabulary,
        device: &B::Device,
    ) -> Result<Self> {
        let preprocessor = Preprocessor::new(artifact.hyper.shape()?);
        Ok(Self {
            model: artifact.model,
            hyper: artifact.hyper,
            vocabulary,
            preprocessor,
            device: device.clone(),
        })
    }

    pub fn hyperparams(&self) -> &Hyperparams {
        &self.hyper
    }

    pub fn vocabulary(&self) -> &LabelVocabulary {
        &self.vocabulary
    }

    /// Classify one decoded image, returning ranked classes.
    pub fn classify(&self, image: &DynamicImage) -> Result<Prediction> {
        let data = self.preprocessor.preprocess(image);
        let shape = self.preprocessor.shape();

        // The preprocessor is built from the artifact's own hyperparameters,
        // so this can only fire if the two fall out of sync
        let expected = shape.element_count();
        if data.len() != expected {
            return Err(Error::ShapeMismatch {
                expected,
                actual: data.len(),
            });
        }

        let input = Tensor::<B, 1>::from_floats(data.as_slice(), &self.device).reshape([
            1,
            shape.channels,
            shape.size,
            shape.size,
        ]);

        let probabilities = self
            .model
            .forward_softmax(input)
            .into_data()
            .to_vec::<f32>()
            .map_err(|e| Error::Format(format!("failed to read model output: {e:?}")))?;

        debug!("classified image into {} classes", probabilities.len());
        Ok(Prediction::from_probabilities(
            &probabilities,
            &self.vocabulary,
        ))
    }

    /// Decode an image file and classify it.
    pub fn classify_file(&self, path: impl AsRef<Path>) -> Result<Prediction> {
        let path = path.as_ref();
        let image =
            image::open(path).map_err(|e| Error::Image(format!("{}: {e}", path.display())))?;
        self.classify(&image)
    }
}
