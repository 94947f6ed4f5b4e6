//! Image preprocessing shared by training and inference.
//!
//! The model's numeric behavior is defined only for inputs produced by this
//! exact transform, so both the dataset loader and the inference engine go
//! through [`Preprocessor`] with the same [`ImageShape`].

use image::{imageops::FilterType, DynamicImage};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Target tensor shape for one image: a square side length and channel depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageShape {
    /// Side length of the square input (width and height)
    pub size: usize,
    /// Channel depth: 3 for RGB, 1 for grayscale
    pub channels: usize,
}

impl ImageShape {
    pub fn new(size: usize, channels: usize) -> Result<Self> {
        if size == 0 {
            return Err(Error::Config("image size must be nonzero".to_string()));
        }
        if channels != 1 && channels != 3 {
            return Err(Error::Config(format!(
                "channel depth must be 1 (grayscale) or 3 (RGB), got {channels}"
            )));
        }
        Ok(Self { size, channels })
    }

    /// Number of f32 values in one preprocessed image (C * H * W).
    pub fn element_count(&self) -> usize {
        self.channels * self.size * self.size
    }
}

/// Deterministic image -> tensor-data transform.
///
/// Resizes to `size` x `size` with triangle (bilinear) filtering, converts to
/// the configured channel depth and scales every channel value to `[0, 1]`.
/// Output layout is CHW, matching the tensor shape the model consumes.
#[derive(Debug, Clone, Copy)]
pub struct Preprocessor {
    shape: ImageShape,
}

impl Preprocessor {
    pub fn new(shape: ImageShape) -> Self {
        Self { shape }
    }

    pub fn shape(&self) -> ImageShape {
        self.shape
    }

    /// Preprocess a decoded image into flattened CHW float data.
    pub fn preprocess(&self, image: &DynamicImage) -> Vec<f32> {
        let size = self.shape.size;
        let resized = image.resize_exact(size as u32, size as u32, FilterType::Triangle);

        let mut data = vec![0.0f32; self.shape.element_count()];

        match self.shape.channels {
            1 => {
                let gray = resized.to_luma8();
                for y in 0..size {
                    for x in 0..size {
                        let pixel = gray.get_pixel(x as u32, y as u32);
                        data[y * size + x] = pixel[0] as f32 / 255.0;
                    }
                }
            }
            _ => {
                let rgb = resized.to_rgb8();
                for y in 0..size {
                    for x in 0..size {
                        let pixel = rgb.get_pixel(x as u32, y as u32);
                        for c in 0..3 {
                            data[c * size * size + y * size + x] = pixel[c] as f32 / 255.0;
                        }
                    }
                }
            }
        }

        data
    }
}
