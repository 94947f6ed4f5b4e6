//! Training loop built on Burn's autodiff, Adam optimizer and a custom
//! epoch/batch loop.
//!
//! Both training modes hold out a validation partition from the shuffled
//! dataset before any optimization. Without augmentation, epochs iterate
//! reshuffled mini-batches of the real training items; with augmentation,
//! batches are drawn from the unbounded [`AugmentationStream`] instead while
//! validation keeps using the real held-out items.

use burn::{
    data::{dataloader::batcher::Batcher, dataset::Dataset},
    module::AutodiffModule,
    nn::loss::CrossEntropyLossConfig,
    optim::{AdamConfig, GradientsParams, Optimizer},
    tensor::{
        activation::softmax,
        backend::{AutodiffBackend, Backend},
        ElementConversion, Int, Tensor,
    },
};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};

use super::{LossKind, TrainingConfig, TrainingHistory};
use crate::artifact::{Hyperparams, ModelArtifact};
use crate::dataset::{
    burn_dataset::one_hot_targets, AugmentationStream, ImageBatcher, ImageItem, InMemoryDataset,
    LabeledDataset,
};
use crate::error::{Error, Result};
use crate::model::{LeNet, LeNetConfig};

/// Result of one training run: the fitted artifact and the metric series.
#[derive(Debug)]
pub struct TrainingRun<B: Backend> {
    pub artifact: ModelArtifact<B>,
    pub history: TrainingHistory,
}

/// Train a classifier over `dataset` with the given configuration.
///
/// All configuration and dataset problems are reported before any tensor
/// computation starts; a failed run writes nothing.
pub fn fit<B: AutodiffBackend>(
    dataset: &LabeledDataset,
    config: &TrainingConfig,
    device: &B::Device,
) -> Result<TrainingRun<B::InnerBackend>> {
    config.validate()?;

    let num_classes = dataset.num_classes();
    if num_classes < 2 {
        return Err(Error::Config(format!(
            "dataset has {num_classes} distinct classes, need at least 2"
        )));
    }

    let shape = dataset.shape();
    let loss_kind = LossKind::for_classes(num_classes);

    // Shuffle once, then carve off the validation partition
    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    let mut shuffled: Vec<ImageItem> = dataset.items().to_vec();
    shuffled.shuffle(&mut rng);

    let val_count = ((shuffled.len() as f64) * config.validation_fraction).round() as usize;
    let val_count = val_count.max(1);
    if shuffled.len() <= val_count {
        return Err(Error::Config(format!(
            "dataset of {} samples is too small to hold out {} for validation",
            shuffled.len(),
            val_count
        )));
    }
    let (val_items, train_items) = shuffled.split_at(val_count);
    let train_dataset = InMemoryDataset::new(train_items.to_vec());
    let val_dataset = InMemoryDataset::new(val_items.to_vec());

    info!(
        "training on {} samples, validating on {} ({} classes, {loss_kind})",
        train_dataset.len(),
        val_dataset.len(),
        num_classes
    );

    let model_config = LeNetConfig::new(num_classes)
        .with_input_size(shape.size)
        .with_in_channels(shape.channels);
    let mut model = LeNet::<B>::new(&model_config, device)?;
    let mut optimizer = AdamConfig::new().init();

    let batcher = ImageBatcher::<B>::new(device.clone(), shape);
    let val_device = <B::InnerBackend as Backend>::Device::default();
    let val_batcher = ImageBatcher::<B::InnerBackend>::new(val_device.clone(), shape);

    let mut stream = match config.augmentation {
        Some(augmentation) => Some(AugmentationStream::new(
            train_dataset.items(),
            shape,
            augmentation,
            config.seed.wrapping_add(1),
        )?),
        None => None,
    };

    let steps_per_epoch = train_dataset.len().div_ceil(config.batch_size);
    let mut epoch_rng = ChaCha8Rng::seed_from_u64(config.seed.wrapping_add(2));
    let mut history = TrainingHistory::default();

    for epoch in 0..config.epochs {
        let mut order: Vec<usize> = (0..train_dataset.len()).collect();
        order.shuffle(&mut epoch_rng);

        let mut epoch_loss = 0.0f64;
        let mut correct = 0usize;
        let mut seen = 0usize;

        for step in 0..steps_per_epoch {
            let items: Vec<ImageItem> = match stream.as_mut() {
                Some(stream) => stream.next_batch(config.batch_size),
                None => {
                    let start = step * config.batch_size;
                    let end = (start + config.batch_size).min(order.len());
                    order[start..end]
                        .iter()
                        .filter_map(|&i| train_dataset.get(i))
                        .collect()
                }
            };
            if items.is_empty() {
                continue;
            }

            let batch = batcher.batch(items.clone(), device);
            let logits = model.forward(batch.images);
            let loss = compute_loss(loss_kind, logits.clone(), &batch.targets, &items, num_classes);

            let loss_value: f64 = loss.clone().into_scalar().elem();
            epoch_loss += loss_value;
            correct += count_correct(&logits, &batch.targets);
            seen += items.len();

            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &model);
            model = optimizer.step(config.learning_rate, model, grads);

            debug!(
                "epoch {}/{} step {}/{}: loss {:.4}",
                epoch + 1,
                config.epochs,
                step + 1,
                steps_per_epoch,
                loss_value
            );
        }

        let train_loss = epoch_loss / steps_per_epoch.max(1) as f64;
        let train_accuracy = 100.0 * correct as f64 / seen.max(1) as f64;

        let (val_loss, val_accuracy) = evaluate(
            &model.clone().valid(),
            &val_dataset,
            &val_batcher,
            &val_device,
            loss_kind,
            num_classes,
            config.batch_size,
        );

        info!(
            "epoch {}/{}: loss {:.4} acc {:.2}% | val loss {:.4} val acc {:.2}%",
            epoch + 1,
            config.epochs,
            train_loss,
            train_accuracy,
            val_loss,
            val_accuracy
        );

        history.record_epoch(train_loss, train_accuracy, val_loss, val_accuracy);
    }

    let hyper = Hyperparams {
        image_size: shape.size,
        channels: shape.channels,
        num_classes,
        loss: loss_kind,
        trained_at: chrono::Utc::now().to_rfc3339(),
    };

    Ok(TrainingRun {
        artifact: ModelArtifact {
            model: model.clone().valid(),
            hyper,
        },
        history,
    })
}

/// Compute the configured loss over one batch of logits.
fn compute_loss<B: Backend>(
    kind: LossKind,
    logits: Tensor<B, 2>,
    targets: &Tensor<B, 1, Int>,
    items: &[ImageItem],
    num_classes: usize,
) -> Tensor<B, 1> {
    match kind {
        LossKind::Categorical => CrossEntropyLossConfig::new()
            .init(&logits.device())
            .forward(logits, targets.clone()),
        LossKind::Binary => {
            // binary cross-entropy over the two softmax outputs and their
            // complements, averaged over batch and outputs
            let probs = softmax(logits, 1).clamp(1e-7, 1.0 - 1e-7);
            let onehot = one_hot_targets::<B>(items, num_classes, &probs.device());
            let positive = onehot.clone() * probs.clone().log();
            let negative = (onehot.ones_like() - onehot) * (probs.ones_like() - probs).log();
            (positive + negative).mean().neg()
        }
    }
}

/// Count predictions matching the targets in one batch.
fn count_correct<B: Backend>(logits: &Tensor<B, 2>, targets: &Tensor<B, 1, Int>) -> usize {
    let [batch_size, _] = logits.dims();
    let predicted = logits.clone().argmax(1).reshape([batch_size]);
    let correct: i64 = predicted
        .equal(targets.clone())
        .int()
        .sum()
        .into_scalar()
        .elem();
    correct as usize
}

/// Compute (average loss, accuracy %) over the held-out partition.
fn evaluate<B: Backend>(
    model: &LeNet<B>,
    dataset: &InMemoryDataset,
    batcher: &ImageBatcher<B>,
    device: &B::Device,
    kind: LossKind,
    num_classes: usize,
    batch_size: usize,
) -> (f64, f64) {
    let mut loss_sum = 0.0f64;
    let mut batches = 0usize;
    let mut correct = 0usize;
    let mut seen = 0usize;

    for start in (0..dataset.len()).step_by(batch_size) {
        let end = (start + batch_size).min(dataset.len());
        let items: Vec<ImageItem> = (start..end).filter_map(|i| dataset.get(i)).collect();
        if items.is_empty() {
            continue;
        }

        let batch = batcher.batch(items.clone(), device);
        let logits = model.forward(batch.images);
        let loss = compute_loss(kind, logits.clone(), &batch.targets, &items, num_classes);

        loss_sum += loss.into_scalar().elem::<f64>();
        batches += 1;
        correct += count_correct(&logits, &batch.targets);
        seen += items.len();
    }

    if seen == 0 {
        return (0.0, 0.0);
    }
    (
        loss_sum / batches as f64,
        100.0 * correct as f64 / seen as f64,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{default_device, TrainingBackend};
    use crate::dataset::{AugmentationConfig, ImageShape, LabelVocabulary};

    fn solid_dataset(per_class: usize, num_classes: usize) -> LabeledDataset {
        let shape = ImageShape::new(16, 1).unwrap();
        let mut items = Vec::new();
        for class in 0..num_classes {
            let value = (class as f32 + 0.5) / num_classes as f32;
            for i in 0..per_class {
                items.push(ImageItem {
                    image: vec![value; shape.element_count()],
                    label: class,
                    path: format!("class{class}-{i}.png"),
                });
            }
        }
        let vocabulary =
            LabelVocabulary::from_ordered((0..num_classes).map(|c| format!("c{c}")).collect());
        LabeledDataset::from_parts(items, vocabulary, shape).unwrap()
    }

    fn quick_config() -> TrainingConfig {
        TrainingConfig {
            epochs: 2,
            batch_size: 4,
            ..Default::default()
        }
    }

    #[test]
    fn test_fit_records_one_entry_per_epoch() {
        let dataset = solid_dataset(6, 2);
        let device = default_device();

        let run = fit::<TrainingBackend>(&dataset, &quick_config(), &device).unwrap();
        assert_eq!(run.history.epochs(), 2);
        assert!(run.history.train_loss.iter().all(|l| l.is_finite()));
        assert!(run.history.val_loss.iter().all(|l| l.is_finite()));
        assert_eq!(run.artifact.hyper.num_classes, 2);
        assert_eq!(run.artifact.hyper.loss, LossKind::Binary);
    }

    #[test]
    fn test_fit_selects_categorical_loss_for_three_classes() {
        let dataset = solid_dataset(4, 3);
        let device = default_device();

        let run = fit::<TrainingBackend>(&dataset, &quick_config(), &device).unwrap();
        assert_eq!(run.artifact.hyper.loss, LossKind::Categorical);
    }

    #[test]
    fn test_fit_with_augmentation_stream() {
        let dataset = solid_dataset(6, 2);
        let device = default_device();
        let config = TrainingConfig {
            epochs: 1,
            batch_size: 4,
            augmentation: Some(AugmentationConfig::default()),
            ..Default::default()
        };

        let run = fit::<TrainingBackend>(&dataset, &config, &device).unwrap();
        assert_eq!(run.history.epochs(), 1);
        assert!(run.history.train_loss[0].is_finite());
    }

    #[test]
    fn test_fit_rejects_single_class_dataset() {
        let dataset = solid_dataset(8, 1);
        let device = default_device();

        let result = fit::<TrainingBackend>(&dataset, &quick_config(), &device);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_fit_rejects_zero_epochs() {
        let dataset = solid_dataset(6, 2);
        let device = default_device();
        let config = TrainingConfig {
            epochs: 0,
            ..Default::default()
        };

        let result = fit::<TrainingBackend>(&dataset, &config, &device);
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
