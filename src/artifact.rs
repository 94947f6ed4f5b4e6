//! Trained-model persistence.
//!
//! A trained model is persisted as a pair of files sharing one base name:
//!
//! - `<base>.model.tar.gz` - architecture and weights: a gzipped tar holding
//!   `hyperparams.json` and `model.bin` (the Burn weight record)
//! - `<base>.labels.json` - the label vocabulary, as a JSON string array in
//!   vocabulary order
//!
//! The two files are only meaningful together; loading fails when either
//! half is missing. The writes are sequential, not atomic as a unit: a crash
//! between them leaves a pair that `load` rejects.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use burn::module::Module;
use burn::record::{BinBytesRecorder, FullPrecisionSettings, Recorder};
use burn::tensor::backend::Backend;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use tar::{Archive, Builder};
use tracing::info;

use crate::dataset::{ImageShape, LabelVocabulary};
use crate::error::{Error, Result};
use crate::model::{LeNet, LeNetConfig};
use crate::training::LossKind;

/// Suffix of the architecture-and-weights file.
pub const MODEL_SUFFIX: &str = ".model.tar.gz";

/// Suffix of the label vocabulary file.
pub const LABELS_SUFFIX: &str = ".labels.json";

const HYPERPARAMS_ENTRY: &str = "hyperparams.json";
const WEIGHTS_ENTRY: &str = "model.bin";

/// Fixed hyperparameters persisted with the weights.
///
/// Inference reconstructs the preprocessing transform and the architecture
/// from these values; nothing is re-derived from constants or from the
/// dataset at inference time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hyperparams {
    /// Square input side length used at training time
    pub image_size: usize,
    /// Channel depth used at training time
    pub channels: usize,
    /// Number of output classes
    pub num_classes: usize,
    /// Loss formulation selected at training start
    pub loss: LossKind,
    /// Training completion time (RFC 3339)
    pub trained_at: String,
}

impl Hyperparams {
    pub fn shape(&self) -> Result<ImageShape> {
        ImageShape::new(self.image_size, self.channels)
    }

    pub fn model_config(&self) -> LeNetConfig {
        LeNetConfig::new(self.num_classes)
            .with_input_size(self.image_size)
            .with_in_channels(self.channels)
    }
}

/// A trained model together with its fixed hyperparameters.
#[derive(Debug)]
pub struct ModelArtifact<B: Backend> {
    pub model: LeNet<B>,
    pub hyper: Hyperparams,
}

/// Path of the architecture-and-weights file for a base name.
pub fn model_path(base: impl AsRef<Path>) -> PathBuf {
    append_suffix(base.as_ref(), MODEL_SUFFIX)
}

/// Path of the vocabulary file for a base name.
pub fn labels_path(base: impl AsRef<Path>) -> PathBuf {
    append_suffix(base.as_ref(), LABELS_SUFFIX)
}

fn append_suffix(base: &Path, suffix: &str) -> PathBuf {
    let mut name = base.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

/// Write the artifact pair under `base`.
pub fn save<B: Backend>(
    artifact: &ModelArtifact<B>,
    vocabulary: &LabelVocabulary,
    base: impl AsRef<Path>,
) -> Result<()> {
    if vocabulary.len() != artifact.hyper.num_classes {
        return Err(Error::Config(format!(
            "vocabulary has {} labels but the model was trained for {} classes",
            vocabulary.len(),
            artifact.hyper.num_classes
        )));
    }

    let model_file = model_path(&base);
    let labels_file = labels_path(&base);
    if let Some(parent) = model_file.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let recorder = BinBytesRecorder::<FullPrecisionSettings>::default();
    let weights = recorder
        .record(artifact.model.clone().into_record(), ())
        .map_err(|e| Error::Format(format!("failed to record model weights: {e:?}")))?;
    let hyper_json = serde_json::to_string_pretty(&artifact.hyper)?;

    let encoder = GzEncoder::new(File::create(&model_file)?, Compression::default());
    let mut builder = Builder::new(encoder);
    append_entry(&mut builder, HYPERPARAMS_ENTRY, hyper_json.as_bytes())?;
    append_entry(&mut builder, WEIGHTS_ENTRY, &weights)?;
    let encoder = builder.into_inner()?;
    encoder.finish()?;

    let labels_json = serde_json::to_string_pretty(vocabulary)?;
    std::fs::write(&labels_file, labels_json)?;

    info!("saved artifact pair {:?} / {:?}", model_file, labels_file);
    Ok(())
}

fn append_entry<W: std::io::Write>(
    builder: &mut Builder<W>,
    name: &str,
    data: &[u8],
) -> Result<()> {
    let mut header = tar::Header::new_gnu();
    header.set_path(name)?;
    header.set_size(data.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder.append(&header, data)?;
    Ok(())
}

/// Load the artifact pair under `base`.
///
/// A missing file is a [`Error::PairMismatch`]; unreadable or inconsistent
/// content is a [`Error::Format`].
pub fn load<B: Backend>(
    base: impl AsRef<Path>,
    device: &B::Device,
) -> Result<(ModelArtifact<B>, LabelVocabulary)> {
    let model_file = model_path(&base);
    let labels_file = labels_path(&base);

    if !model_file.is_file() {
        return Err(Error::PairMismatch(model_file));
    }
    if !labels_file.is_file() {
        return Err(Error::PairMismatch(labels_file));
    }

    let (hyper, weights) = read_container(&model_file)?;

    let vocabulary: LabelVocabulary = serde_json::from_str(&std::fs::read_to_string(&labels_file)?)?;
    if vocabulary.len() < 2 {
        return Err(Error::Format(format!(
            "vocabulary {labels_file:?} has {} labels, need at least 2",
            vocabulary.len()
        )));
    }
    if vocabulary.len() != hyper.num_classes {
        return Err(Error::Format(format!(
            "vocabulary has {} labels but the model expects {} classes",
            vocabulary.len(),
            hyper.num_classes
        )));
    }

    let config = hyper.model_config();
    config
        .validate()
        .map_err(|e| Error::Format(format!("invalid persisted hyperparameters: {e}")))?;

    let model = LeNet::new(&config, device)?;
    let recorder = BinBytesRecorder::<FullPrecisionSettings>::default();
    let record = recorder
        .load(weights, device)
        .map_err(|e| Error::Format(format!("failed to decode model weights: {e:?}")))?;
    let model = model.load_record(record);

    info!("loaded artifact pair from base {:?}", base.as_ref());
    Ok((ModelArtifact { model, hyper }, vocabulary))
}

fn read_container(path: &Path) -> Result<(Hyperparams, Vec<u8>)> {
    let format_err =
        |what: &str, e: std::io::Error| Error::Format(format!("{}: {what}: {e}", path.display()));

    let file = File::open(path)?;
    let mut archive = Archive::new(GzDecoder::new(file));

    let mut hyper: Option<Hyperparams> = None;
    let mut weights: Option<Vec<u8>> = None;

    for entry in archive
        .entries()
        .map_err(|e| format_err("unreadable archive", e))?
    {
        let mut entry = entry.map_err(|e| format_err("corrupt archive entry", e))?;
        let name = entry
            .path()
            .map_err(|e| format_err("corrupt entry path", e))?
            .to_string_lossy()
            .into_owned();

        match name.as_str() {
            HYPERPARAMS_ENTRY => {
                let mut json = String::new();
                entry
                    .read_to_string(&mut json)
                    .map_err(|e| format_err("unreadable hyperparameters", e))?;
                hyper = Some(serde_json::from_str(&json)?);
            }
            WEIGHTS_ENTRY => {
                let mut buffer = Vec::new();
                entry
                    .read_to_end(&mut buffer)
                    .map_err(|e| format_err("unreadable weights", e))?;
                weights = Some(buffer);
            }
            _ => {}
        }
    }

    match (hyper, weights) {
        (Some(hyper), Some(weights)) => Ok((hyper, weights)),
        (None, _) => Err(Error::Format(format!(
            "{}: missing {HYPERPARAMS_ENTRY} entry",
            path.display()
        ))),
        (_, None) => Err(Error::Format(format!(
            "{}: missing {WEIGHTS_ENTRY} entry",
            path.display()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{default_device, DefaultBackend};

    fn temp_base(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("lenet-classify-artifact-{tag}-{}", std::process::id()))
    }

    fn cleanup(base: &Path) {
        let _ = std::fs::remove_file(model_path(base));
        let _ = std::fs::remove_file(labels_path(base));
    }

    fn test_artifact(num_classes: usize) -> ModelArtifact<DefaultBackend> {
        let device = default_device();
        let config = LeNetConfig::new(num_classes).with_input_size(16).with_in_channels(1);
        ModelArtifact {
            model: LeNet::new(&config, &device).unwrap(),
            hyper: Hyperparams {
                image_size: 16,
                channels: 1,
                num_classes,
                loss: LossKind::for_classes(num_classes),
                trained_at: "2026-01-01T00:00:00Z".to_string(),
            },
        }
    }

    #[test]
    fn test_save_load_round_trip() {
        let base = temp_base("roundtrip");
        let artifact = test_artifact(2);
        let vocabulary = LabelVocabulary::from_labels(["cat", "dog"]);

        save(&artifact, &vocabulary, &base).unwrap();
        let device = default_device();
        let (loaded, loaded_vocab) = load::<DefaultBackend>(&base, &device).unwrap();

        assert_eq!(loaded.hyper.num_classes, 2);
        assert_eq!(loaded.hyper.image_size, 16);
        assert_eq!(loaded.hyper.loss, LossKind::Binary);
        assert_eq!(loaded_vocab, vocabulary);
        cleanup(&base);
    }

    #[test]
    fn test_missing_labels_file_is_pair_mismatch() {
        let base = temp_base("missing-labels");
        let artifact = test_artifact(2);
        let vocabulary = LabelVocabulary::from_labels(["cat", "dog"]);

        save(&artifact, &vocabulary, &base).unwrap();
        std::fs::remove_file(labels_path(&base)).unwrap();

        let device = default_device();
        let result = load::<DefaultBackend>(&base, &device);
        assert!(matches!(result, Err(Error::PairMismatch(_))));
        cleanup(&base);
    }

    #[test]
    fn test_missing_model_file_is_pair_mismatch() {
        let base = temp_base("missing-model");
        let artifact = test_artifact(2);
        let vocabulary = LabelVocabulary::from_labels(["cat", "dog"]);

        save(&artifact, &vocabulary, &base).unwrap();
        std::fs::remove_file(model_path(&base)).unwrap();

        let device = default_device();
        let result = load::<DefaultBackend>(&base, &device);
        assert!(matches!(result, Err(Error::PairMismatch(_))));
        cleanup(&base);
    }

    #[test]
    fn test_corrupt_model_file_is_format_error() {
        let base = temp_base("corrupt");
        let artifact = test_artifact(2);
        let vocabulary = LabelVocabulary::from_labels(["cat", "dog"]);

        save(&artifact, &vocabulary, &base).unwrap();
        std::fs::write(model_path(&base), b"not a tar.gz archive").unwrap();

        let device = default_device();
        let result = load::<DefaultBackend>(&base, &device);
        assert!(matches!(result, Err(Error::Format(_))));
        cleanup(&base);
    }

    #[test]
    fn test_vocabulary_model_disagreement_is_format_error() {
        let base = temp_base("disagreement");
        let artifact = test_artifact(3);
        let vocabulary = LabelVocabulary::from_labels(["a", "b", "c"]);
        save(&artifact, &vocabulary, &base).unwrap();

        let two_labels = LabelVocabulary::from_labels(["a", "b"]);
        std::fs::write(
            labels_path(&base),
            serde_json::to_string(&two_labels).unwrap(),
        )
        .unwrap();

        let device = default_device();
        let result = load::<DefaultBackend>(&base, &device);
        assert!(matches!(result, Err(Error::Format(_))));
        cleanup(&base);
    }
}
