//! Training-time data augmentation.
//!
//! [`AugmentationStream`] is a lazy, unbounded iterator of synthesized
//! training variants: it cycles the real samples (reshuffling each pass) and
//! applies a randomized affine warp (rotation, horizontal/vertical shift,
//! zoom) to every item it yields. The training loop draws a fixed number of
//! batches per epoch from it; the stream itself never ends and is never
//! materialized. Validation data never goes through this path.

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use super::burn_dataset::ImageItem;
use super::preprocess::ImageShape;
use crate::error::{Error, Result};

/// Parameters of the randomized geometric transforms.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AugmentationConfig {
    /// Maximum rotation in degrees, sampled from `[-x, x]`
    pub rotation_degrees: f32,
    /// Maximum horizontal/vertical shift as a fraction of the image side
    pub shift_fraction: f32,
    /// Maximum zoom deviation; the factor is sampled from `[1-x, 1+x]`
    pub zoom_fraction: f32,
}

impl Default for AugmentationConfig {
    fn default() -> Self {
        Self {
            rotation_degrees: 30.0,
            shift_fraction: 0.1,
            zoom_fraction: 0.2,
        }
    }
}

/// Infinite, restartable stream of augmented samples.
///
/// Restartable: two streams built over the same items with the same seed
/// yield the same sequence.
pub struct AugmentationStream<'a> {
    items: &'a [ImageItem],
    shape: ImageShape,
    config: AugmentationConfig,
    order: Vec<usize>,
    cursor: usize,
    rng: ChaCha8Rng,
}

impl<'a> AugmentationStream<'a> {
    pub fn new(
        items: &'a [ImageItem],
        shape: ImageShape,
        config: AugmentationConfig,
        seed: u64,
    ) -> Result<Self> {
        if items.is_empty() {
            return Err(Error::Config(
                "augmentation stream needs at least one sample".to_string(),
            ));
        }

        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut order: Vec<usize> = (0..items.len()).collect();
        order.shuffle(&mut rng);

        Ok(Self {
            items,
            shape,
            config,
            order,
            cursor: 0,
            rng,
        })
    }

    /// Draw the next `batch_size` synthesized samples.
    pub fn next_batch(&mut self, batch_size: usize) -> Vec<ImageItem> {
        (0..batch_size).filter_map(|_| self.next()).collect()
    }

    fn synthesize(&mut self, item: &ImageItem) -> ImageItem {
        let angle = self
            .rng
            .gen_range(-self.config.rotation_degrees..=self.config.rotation_degrees)
            .to_radians();
        let max_shift = self.config.shift_fraction * self.shape.size as f32;
        let shift_x = self.rng.gen_range(-max_shift..=max_shift);
        let shift_y = self.rng.gen_range(-max_shift..=max_shift);
        let zoom = self
            .rng
            .gen_range(1.0 - self.config.zoom_fraction..=1.0 + self.config.zoom_fraction);

        ImageItem {
            image: warp_affine(&item.image, self.shape, angle, shift_x, shift_y, zoom),
            label: item.label,
            path: item.path.clone(),
        }
    }
}

impl Iterator for AugmentationStream<'_> {
    type Item = ImageItem;

    fn next(&mut self) -> Option<ImageItem> {
        if self.cursor >= self.order.len() {
            self.order.shuffle(&mut self.rng);
            self.cursor = 0;
        }
        let index = self.order[self.cursor];
        self.cursor += 1;

        let item = self.items[index].clone();
        Some(self.synthesize(&item))
    }
}

/// Apply an inverse-mapped affine transform (rotation about the center,
/// translation, uniform zoom) to flattened CHW image data.
///
/// Each output pixel is bilinearly sampled from the source; coordinates
/// outside the source are clamped to the nearest edge pixel, so output
/// values stay within the range of the input values.
fn warp_affine(
    src: &[f32],
    shape: ImageShape,
    angle: f32,
    shift_x: f32,
    shift_y: f32,
    zoom: f32,
) -> Vec<f32> {
    let size = shape.size;
    let plane = size * size;
    let center = (size as f32 - 1.0) / 2.0;
    let (sin, cos) = angle.sin_cos();
    let inv_zoom = 1.0 / zoom;

    let mut dst = vec![0.0f32; src.len()];

    for y in 0..size {
        for x in 0..size {
            // Inverse map: undo shift, undo zoom, undo rotation
            let ux = (x as f32 - center - shift_x) * inv_zoom;
            let uy = (y as f32 - center - shift_y) * inv_zoom;
            let sx = (cos * ux + sin * uy + center).clamp(0.0, (size - 1) as f32);
            let sy = (-sin * ux + cos * uy + center).clamp(0.0, (size - 1) as f32);

            let x0 = sx.floor() as usize;
            let y0 = sy.floor() as usize;
            let x1 = (x0 + 1).min(size - 1);
            let y1 = (y0 + 1).min(size - 1);
            let fx = sx - x0 as f32;
            let fy = sy - y0 as f32;

            for c in 0..shape.channels {
                let base = c * plane;
                let top = src[base + y0 * size + x0] * (1.0 - fx) + src[base + y0 * size + x1] * fx;
                let bottom =
                    src[base + y1 * size + x0] * (1.0 - fx) + src[base + y1 * size + x1] * fx;
                dst[base + y * size + x] = top * (1.0 - fy) + bottom * fy;
            }
        }
    }

    dst
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items(shape: ImageShape, n: usize) -> Vec<ImageItem> {
        (0..n)
            .map(|i| ImageItem {
                image: vec![i as f32 / n as f32; shape.element_count()],
                label: i % 2,
                path: format!("sample-{i}.png"),
            })
            .collect()
    }

    #[test]
    fn test_identity_warp_preserves_pixels() {
        let shape = ImageShape::new(8, 1).unwrap();
        let src: Vec<f32> = (0..shape.element_count()).map(|i| i as f32 / 64.0).collect();

        let out = warp_affine(&src, shape, 0.0, 0.0, 0.0, 1.0);
        for (a, b) in src.iter().zip(out.iter()) {
            assert!((a - b).abs() < 1e-5);
        }
    }

    #[test]
    fn test_warp_stays_in_value_range() {
        let shape = ImageShape::new(12, 3).unwrap();
        let src = vec![0.7f32; shape.element_count()];

        let out = warp_affine(&src, shape, 0.5, 2.0, -1.5, 0.85);
        assert!(out.iter().all(|&v| (0.0..=1.0).contains(&v)));
    }

    #[test]
    fn test_stream_is_unbounded() {
        let shape = ImageShape::new(4, 1).unwrap();
        let pool = items(shape, 3);
        let mut stream =
            AugmentationStream::new(&pool, shape, AugmentationConfig::default(), 7).unwrap();

        // Draw well past the pool size; the stream keeps producing
        let drawn: Vec<_> = stream.by_ref().take(20).collect();
        assert_eq!(drawn.len(), 20);
        assert_eq!(stream.next_batch(5).len(), 5);
    }

    #[test]
    fn test_stream_is_restartable() {
        let shape = ImageShape::new(4, 1).unwrap();
        let pool = items(shape, 4);
        let config = AugmentationConfig::default();

        let first: Vec<_> = AugmentationStream::new(&pool, shape, config, 99)
            .unwrap()
            .take(10)
            .map(|item| item.image)
            .collect();
        let second: Vec<_> = AugmentationStream::new(&pool, shape, config, 99)
            .unwrap()
            .take(10)
            .map(|item| item.image)
            .collect();

        assert_eq!(first, second);
    }

    #[test]
    fn test_stream_rejects_empty_pool() {
        let shape = ImageShape::new(4, 1).unwrap();
        assert!(AugmentationStream::new(&[], shape, AugmentationConfig::default(), 1).is_err());
    }
}
