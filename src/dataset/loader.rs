//! Labeled dataset loader.
//!
//! Walks a root directory containing one subdirectory per class. A class
//! directory name is delimiter-segmented: the second segment is the numeric
//! label and the third the human-readable label (`set-3-cat` -> numeric 3,
//! text "cat"). Every image file below a class directory becomes one sample,
//! decoded and preprocessed eagerly so the whole corpus is in memory before
//! training starts.

use std::collections::BTreeSet;
use std::path::Path;

use image::DynamicImage;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use walkdir::WalkDir;

use super::burn_dataset::ImageItem;
use super::preprocess::{ImageShape, Preprocessor};
use crate::error::{Error, Result};

/// Segment delimiter in class directory names.
pub const LABEL_DELIMITER: char = '-';

/// Accepted image file extensions.
const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "bmp"];

/// Ordered mapping between text labels and numeric class indices.
///
/// The ordering is the sorted set of distinct text labels seen at load time
/// and is persisted next to the model; inference looks labels up in the
/// persisted copy rather than re-deriving them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelVocabulary(Vec<String>);

impl LabelVocabulary {
    /// Build a vocabulary from text labels: distinct values, sorted.
    pub fn from_labels<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let set: BTreeSet<String> = labels.into_iter().map(Into::into).collect();
        Self(set.into_iter().collect())
    }

    pub fn from_ordered(labels: Vec<String>) -> Self {
        Self(labels)
    }

    pub fn name(&self, index: usize) -> Option<&str> {
        self.0.get(index).map(String::as_str)
    }

    pub fn index(&self, name: &str) -> Option<usize> {
        self.0.iter().position(|n| n == name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

/// Decode a class directory name into (numeric label, text label).
pub fn parse_class_dir(name: &str) -> Result<(usize, String)> {
    let parts: Vec<&str> = name.split(LABEL_DELIMITER).collect();
    if parts.len() < 3 {
        return Err(Error::Naming(format!(
            "class directory {name:?} has {} {LABEL_DELIMITER:?}-delimited segments, need at least 3 (e.g. \"set-3-cat\")",
            parts.len()
        )));
    }

    let numeric: usize = parts[1].parse().map_err(|_| {
        Error::Naming(format!(
            "class directory {name:?}: segment {:?} is not a numeric label",
            parts[1]
        ))
    })?;

    let text = parts[2];
    if text.is_empty() {
        return Err(Error::Naming(format!(
            "class directory {name:?}: empty text label segment"
        )));
    }

    Ok((numeric, text.to_string()))
}

/// Check each class against the vocabulary-defined label space.
///
/// The numeric label space must be exactly `[0, |vocabulary|)` and each
/// numeric label must agree with its text label's position in the sorted
/// vocabulary; anything else would train a model whose predictions map to
/// the wrong names.
fn validate_classes(classes: &[(usize, String)], vocabulary: &LabelVocabulary) -> Result<()> {
    for (numeric, text) in classes {
        match vocabulary.index(text) {
            Some(expected) if expected == *numeric => {}
            Some(expected) => {
                return Err(Error::Naming(format!(
                    "class {text:?} carries numeric label {numeric} but sorts to index {expected} in the label vocabulary"
                )));
            }
            None => {
                return Err(Error::Naming(format!(
                    "class {text:?} missing from the label vocabulary"
                )));
            }
        }
    }
    Ok(())
}

/// An eagerly loaded, preprocessed image corpus with its label vocabulary.
#[derive(Debug, Clone)]
pub struct LabeledDataset {
    items: Vec<ImageItem>,
    vocabulary: LabelVocabulary,
    shape: ImageShape,
}

impl LabeledDataset {
    /// Assemble a dataset from already-preprocessed items.
    ///
    /// Every item's label must fall inside the vocabulary's index space and
    /// every image must match `shape`.
    pub fn from_parts(
        items: Vec<ImageItem>,
        vocabulary: LabelVocabulary,
        shape: ImageShape,
    ) -> Result<Self> {
        for item in &items {
            if item.label >= vocabulary.len() {
                return Err(Error::Config(format!(
                    "sample {:?} carries label {} outside the vocabulary space [0, {})",
                    item.path,
                    item.label,
                    vocabulary.len()
                )));
            }
            if item.image.len() != shape.element_count() {
                return Err(Error::ShapeMismatch {
                    expected: shape.element_count(),
                    actual: item.image.len(),
                });
            }
        }

        Ok(Self {
            items,
            vocabulary,
            shape,
        })
    }

    /// Load every image below `root` through `preprocessor`.
    ///
    /// A file that fails to open or decode aborts the whole load; a dataset
    /// with a silently dropped sample is worse than a failed load.
    pub fn load<P: AsRef<Path>>(root: P, preprocessor: &Preprocessor) -> Result<Self> {
        let root = root.as_ref();
        info!("loading labeled dataset from {:?}", root);

        if !root.is_dir() {
            return Err(Error::Config(format!(
                "dataset root {root:?} is not a directory"
            )));
        }

        let mut classes: Vec<(usize, String, std::path::PathBuf)> = Vec::new();
        for entry in std::fs::read_dir(root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let dir_name = entry.file_name().to_string_lossy().to_string();
            let (numeric, text) = parse_class_dir(&dir_name)?;
            classes.push((numeric, text, entry.path()));
        }
        classes.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

        let vocabulary =
            LabelVocabulary::from_labels(classes.iter().map(|(_, text, _)| text.clone()));
        let class_pairs: Vec<(usize, String)> = classes
            .iter()
            .map(|(numeric, text, _)| (*numeric, text.clone()))
            .collect();
        validate_classes(&class_pairs, &vocabulary)?;

        let mut items = Vec::new();
        for (numeric, text, dir) in &classes {
            let mut class_count = 0usize;
            for entry in WalkDir::new(dir)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
            {
                let path = entry.path();
                let is_image = path
                    .extension()
                    .map(|ext| {
                        let ext = ext.to_string_lossy().to_lowercase();
                        IMAGE_EXTENSIONS.contains(&ext.as_str())
                    })
                    .unwrap_or(false);
                if !is_image {
                    continue;
                }

                let decoded: DynamicImage = image::open(path)
                    .map_err(|e| Error::Image(format!("{}: {e}", path.display())))?;

                items.push(ImageItem {
                    image: preprocessor.preprocess(&decoded),
                    label: *numeric,
                    path: path.to_string_lossy().to_string(),
                });
                class_count += 1;
            }
            debug!("class {text:?} (label {numeric}): {class_count} samples");
        }

        info!(
            "loaded {} samples across {} classes",
            items.len(),
            vocabulary.len()
        );

        Ok(Self {
            items,
            vocabulary,
            shape: preprocessor.shape(),
        })
    }

    pub fn items(&self) -> &[ImageItem] {
        &self.items
    }

    pub fn vocabulary(&self) -> &LabelVocabulary {
        &self.vocabulary
    }

    pub fn shape(&self) -> ImageShape {
        self.shape
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn num_classes(&self) -> usize {
        self.vocabulary.len()
    }

    pub fn stats(&self) -> DatasetStats {
        let mut class_counts = vec![0usize; self.num_classes()];
        for item in &self.items {
            class_counts[item.label] += 1;
        }

        DatasetStats {
            total_samples: self.items.len(),
            num_classes: self.num_classes(),
            class_counts,
            class_names: self.vocabulary.iter().map(String::from).collect(),
        }
    }
}

/// Per-class sample counts for console reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetStats {
    pub total_samples: usize,
    pub num_classes: usize,
    pub class_counts: Vec<usize>,
    pub class_names: Vec<String>,
}

impl DatasetStats {
    /// Print statistics to console
    pub fn print(&self) {
        println!("Dataset statistics:");
        println!("  Total samples: {}", self.total_samples);
        println!("  Number of classes: {}", self.num_classes);
        println!();

        for (idx, name) in self.class_names.iter().enumerate() {
            let count = self.class_counts[idx];
            let bar_len = if self.total_samples > 0 {
                (count as f32 / self.total_samples as f32 * 40.0) as usize
            } else {
                0
            };
            let bar: String = "#".repeat(bar_len);
            println!("  {idx:3}. {name:24} {count:5} {bar}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_class_dir() {
        assert_eq!(parse_class_dir("set-3-cat").unwrap(), (3, "cat".to_string()));
        // Segments beyond the third are ignored
        assert_eq!(
            parse_class_dir("train-0-dog-extra").unwrap(),
            (0, "dog".to_string())
        );
    }

    #[test]
    fn test_parse_class_dir_rejects_short_names() {
        assert!(matches!(parse_class_dir("cats"), Err(Error::Naming(_))));
        assert!(matches!(parse_class_dir("set-3"), Err(Error::Naming(_))));
    }

    #[test]
    fn test_parse_class_dir_rejects_non_numeric_label() {
        assert!(matches!(
            parse_class_dir("set-three-cat"),
            Err(Error::Naming(_))
        ));
    }

    #[test]
    fn test_vocabulary_is_sorted_and_distinct() {
        let a = LabelVocabulary::from_labels(["dog", "cat", "bird", "cat"]);
        let b = LabelVocabulary::from_labels(["cat", "bird", "dog"]);

        assert_eq!(a, b);
        assert_eq!(a.len(), 3);
        assert_eq!(a.name(0), Some("bird"));
        assert_eq!(a.index("dog"), Some(2));
    }

    #[test]
    fn test_validate_classes_accepts_sorted_order() {
        let vocab = LabelVocabulary::from_labels(["cat", "dog"]);
        let classes = vec![(0, "cat".to_string()), (1, "dog".to_string())];
        assert!(validate_classes(&classes, &vocab).is_ok());
    }

    #[test]
    fn test_validate_classes_rejects_order_mismatch() {
        let vocab = LabelVocabulary::from_labels(["cat", "dog"]);
        let classes = vec![(0, "dog".to_string()), (1, "cat".to_string())];
        assert!(matches!(
            validate_classes(&classes, &vocab),
            Err(Error::Naming(_))
        ));
    }
}
