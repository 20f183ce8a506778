//! Image preprocessing
//!
//! Every image is resized to a fixed square shape regardless of its aspect
//! ratio and converted to a channel-first `f32` array scaled to `[0, 1]`.
//! The resize filter is fixed, so the same file always yields the same array.

use image::imageops::FilterType;
use image::{DynamicImage, ImageReader};
use std::path::Path;

use super::error::{PipelineError, PipelineResult};

/// Channel-first (CHW) pixel array
#[derive(Debug, Clone, PartialEq)]
pub struct ImageArray {
    data: Vec<f32>,
    shape: [usize; 3],
}

impl ImageArray {
    /// Wrap raw CHW data; `data.len()` must equal the shape's volume
    pub fn new(data: Vec<f32>, shape: [usize; 3]) -> Option<Self> {
        (data.len() == shape.iter().product::<usize>()).then_some(Self { data, shape })
    }

    /// `[channels, height, width]`
    pub fn shape(&self) -> [usize; 3] {
        self.shape
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }
}

/// Deterministic resize + normalize
#[derive(Debug, Clone, Copy)]
pub struct Preprocessor {
    size: u32,
    channels: usize,
    filter: FilterType,
}

impl Preprocessor {
    /// `channels` is 3 for RGB or 1 for grayscale
    pub fn new(size: u32, channels: usize) -> Self {
        Self {
            size,
            channels,
            filter: FilterType::Triangle,
        }
    }

    /// Output shape `[channels, size, size]`
    pub fn shape(&self) -> [usize; 3] {
        [self.channels, self.size as usize, self.size as usize]
    }

    /// Resize and normalize an already decoded image
    pub fn process(&self, image: &DynamicImage) -> ImageArray {
        let resized = image.resize_exact(self.size, self.size, self.filter);
        let side = self.size as usize;
        let plane = side * side;
        let mut data = vec![0.0f32; self.channels * plane];

        if self.channels == 1 {
            let gray = resized.to_luma8();
            for (i, pixel) in gray.pixels().enumerate() {
                data[i] = pixel[0] as f32 / 255.0;
            }
        } else {
            let rgb = resized.to_rgb8();
            for (i, pixel) in rgb.pixels().enumerate() {
                for c in 0..3 {
                    data[c * plane + i] = pixel[c] as f32 / 255.0;
                }
            }
        }

        ImageArray {
            data,
            shape: self.shape(),
        }
    }

    /// Decode `path` and preprocess it
    ///
    /// The format is sniffed from content, so a mislabeled extension still
    /// decodes. Any failure names the offending file.
    pub fn load(&self, path: &Path) -> PipelineResult<ImageArray> {
        let image = ImageReader::open(path)
            .map_err(|e| PipelineError::preprocess(path, e))?
            .with_guessed_format()
            .map_err(|e| PipelineError::preprocess(path, e))?
            .decode()
            .map_err(|e| PipelineError::preprocess(path, e))?;
        Ok(self.process(&image))
    }
}
