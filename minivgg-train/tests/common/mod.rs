//! Shared fixtures for minivgg-train integration tests

#![allow(dead_code)]

use image::{Rgb, RgbImage};
use minivgg_common::config::TrainingSettings;
use minivgg_train::pipeline::TrainingPipeline;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Settings small enough for a training run to take well under a second
pub fn tiny_settings() -> TrainingSettings {
    TrainingSettings {
        image_size: 8,
        epochs: 1,
        batch_size: 16,
        base_filters: 2,
        dense_units: 8,
        ..TrainingSettings::default()
    }
}

/// Write `count` PNGs per label under `root/<label>/`
///
/// Each class gets its own dominant color channel so the classes are
/// separable, with per-image variation in brightness and size.
pub fn write_dataset(root: &Path, classes: &[(&str, usize)]) {
    for (class_index, (label, count)) in classes.iter().enumerate() {
        let dir = root.join(label);
        std::fs::create_dir_all(&dir).unwrap();
        for i in 0..*count {
            let level = 120 + (i * 7 % 120) as u8;
            let mut color = [20u8, 20, 20];
            color[class_index % 3] = level;
            let image = RgbImage::from_pixel(10 + (i % 5) as u32, 12, Rgb(color));
            image.save(dir.join(format!("{i:04}.png"))).unwrap();
        }
    }
}

/// Temporary dataset plus output directory
pub struct Fixture {
    pub temp_dir: TempDir,
    pub dataset: PathBuf,
    pub output_dir: PathBuf,
}

impl Fixture {
    pub fn new(classes: &[(&str, usize)]) -> Self {
        let temp_dir = TempDir::new().unwrap();
        let dataset = temp_dir.path().join("dataset");
        let output_dir = temp_dir.path().join("models");
        write_dataset(&dataset, classes);
        Self {
            temp_dir,
            dataset,
            output_dir,
        }
    }

    pub fn pipeline(&self) -> TrainingPipeline {
        self.pipeline_with(tiny_settings())
    }

    pub fn pipeline_with(&self, settings: TrainingSettings) -> TrainingPipeline {
        TrainingPipeline::new(&self.output_dir, settings).unwrap()
    }
}
