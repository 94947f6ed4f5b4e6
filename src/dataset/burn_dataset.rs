//! Burn dataset and batching integration.
//!
//! Wraps the eagerly loaded image tensors in Burn's `Dataset` trait and
//! provides the batcher that assembles `[N, C, H, W]` float tensors and
//! integer targets on a device.

use burn::data::dataloader::batcher::Batcher;
use burn::data::dataset::Dataset;
use burn::prelude::*;
use serde::{Deserialize, Serialize};

use super::preprocess::ImageShape;

/// One preprocessed image, ready for batching.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ImageItem {
    /// Flattened CHW float data, values in `[0, 1]`
    pub image: Vec<f32>,
    /// Numeric class label
    pub label: usize,
    /// Source path (for diagnostics)
    pub path: String,
}

/// In-memory dataset over preprocessed items.
#[derive(Debug, Clone)]
pub struct InMemoryDataset {
    items: Vec<ImageItem>,
}

impl InMemoryDataset {
    pub fn new(items: Vec<ImageItem>) -> Self {
        Self { items }
    }

    pub fn items(&self) -> &[ImageItem] {
        &self.items
    }
}

impl Dataset<ImageItem> for InMemoryDataset {
    fn get(&self, index: usize) -> Option<ImageItem> {
        self.items.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.items.len()
    }
}

/// A batch of images ready for the model.
#[derive(Clone, Debug)]
pub struct ImageBatch<B: Backend> {
    /// Images with shape `[batch_size, channels, size, size]`
    pub images: Tensor<B, 4>,
    /// Labels with shape `[batch_size]`
    pub targets: Tensor<B, 1, Int>,
}

/// Batcher assembling [`ImageBatch`]es on a device.
#[derive(Clone, Debug)]
pub struct ImageBatcher<B: Backend> {
    device: B::Device,
    shape: ImageShape,
}

impl<B: Backend> ImageBatcher<B> {
    pub fn new(device: B::Device, shape: ImageShape) -> Self {
        Self { device, shape }
    }
}

impl<B: Backend> Batcher<B, ImageItem, ImageBatch<B>> for ImageBatcher<B> {
    fn batch(&self, items: Vec<ImageItem>, _device: &B::Device) -> ImageBatch<B> {
        let batch_size = items.len();
        let ImageShape { size, channels } = self.shape;

        let mut pixels = Vec::with_capacity(batch_size * channels * size * size);
        let mut labels = Vec::with_capacity(batch_size);
        for item in &items {
            pixels.extend_from_slice(&item.image);
            labels.push(item.label as i64);
        }

        let images = Tensor::<B, 1>::from_floats(pixels.as_slice(), &self.device)
            .reshape([batch_size, channels, size, size]);
        let targets = Tensor::<B, 1, Int>::from_ints(labels.as_slice(), &self.device);

        ImageBatch { images, targets }
    }
}

/// Build a one-hot float target tensor `[batch_size, num_classes]`.
///
/// Used by the binary cross-entropy path, which needs per-class targets
/// rather than index targets.
pub fn one_hot_targets<B: Backend>(
    items: &[ImageItem],
    num_classes: usize,
    device: &B::Device,
) -> Tensor<B, 2> {
    let mut data = vec![0.0f32; items.len() * num_classes];
    for (row, item) in items.iter().enumerate() {
        data[row * num_classes + item.label] = 1.0;
    }
    Tensor::<B, 1>::from_floats(data.as_slice(), device).reshape([items.len(), num_classes])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{default_device, DefaultBackend};

    fn item(label: usize, value: f32, shape: ImageShape) -> ImageItem {
        ImageItem {
            image: vec![value; shape.element_count()],
            label,
            path: format!("test-{label}.png"),
        }
    }

    #[test]
    fn test_dataset_indexing() {
        let shape = ImageShape::new(8, 3).unwrap();
        let dataset = InMemoryDataset::new(vec![item(0, 0.1, shape), item(1, 0.9, shape)]);

        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.get(1).unwrap().label, 1);
        assert!(dataset.get(2).is_none());
    }

    #[test]
    fn test_batch_shapes() {
        let shape = ImageShape::new(8, 3).unwrap();
        let device = default_device();
        let batcher = ImageBatcher::<DefaultBackend>::new(device.clone(), shape);

        let batch = batcher.batch(vec![item(0, 0.5, shape), item(1, 0.5, shape)], &device);
        assert_eq!(batch.images.dims(), [2, 3, 8, 8]);
        assert_eq!(batch.targets.dims(), [2]);
    }

    #[test]
    fn test_one_hot_targets() {
        let shape = ImageShape::new(4, 1).unwrap();
        let device = default_device();
        let items = vec![item(1, 0.0, shape), item(0, 0.0, shape)];

        let onehot = one_hot_targets::<DefaultBackend>(&items, 2, &device);
        assert_eq!(onehot.dims(), [2, 2]);
        let values = onehot.into_data().to_vec::<f32>().unwrap();
        assert_eq!(values, vec![0.0, 1.0, 1.0, 0.0]);
    }
}
