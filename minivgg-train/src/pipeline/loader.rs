//! Image corpus loader
//!
//! Expected dataset layout:
//! ```text
//! dataset/
//! ├── cat/
//! │   ├── 0001.jpg
//! │   └── 0002.png
//! └── dog/
//!     └── ...
//! ```
//! Every image is labeled with the name of its immediate parent directory.
//! Images may be nested deeper; only the nearest directory counts.
//!
//! Loading runs in two phases so each can be reported separately:
//! 1. `discover` walks the tree and collects candidate image paths
//! 2. `materialize` decodes and preprocesses every discovered image

use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

use super::error::{PipelineError, PipelineResult};
use super::preprocess::{ImageArray, Preprocessor};

/// File extensions recognized as images (matched case-insensitively)
pub const IMAGE_EXTENSIONS: [&str; 9] = [
    "jpg", "jpeg", "png", "bmp", "tif", "tiff", "gif", "webp", "ppm",
];

/// One preprocessed image and its directory-derived label
#[derive(Debug, Clone)]
pub struct LabeledImage {
    pub pixels: ImageArray,
    pub label: String,
    pub path: PathBuf,
}

/// Recursive image discovery under a dataset root
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageCorpusLoader;

impl ImageCorpusLoader {
    pub fn new() -> Self {
        Self
    }

    /// Collect image paths below `root`, sorted for a stable order
    pub fn discover(&self, root: &Path) -> PipelineResult<Vec<PathBuf>> {
        if !root.exists() {
            return Err(PipelineError::Dataset(format!(
                "Dataset path does not exist: {}",
                root.display()
            )));
        }
        if !root.is_dir() {
            return Err(PipelineError::Dataset(format!(
                "Dataset path is not a directory: {}",
                root.display()
            )));
        }

        let mut entries = std::fs::read_dir(root).map_err(|e| {
            PipelineError::Dataset(format!("Cannot read dataset {}: {}", root.display(), e))
        })?;
        if entries.next().is_none() {
            return Err(PipelineError::Dataset(format!(
                "Dataset directory is empty: {}",
                root.display()
            )));
        }

        let walker = WalkDir::new(root)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e));

        let mut images = Vec::new();
        for entry in walker {
            match entry {
                Ok(entry) => {
                    if entry.file_type().is_file() && has_image_extension(entry.path()) {
                        images.push(entry.into_path());
                    }
                }
                Err(e) => {
                    // Keep going; unreadable subtrees just contribute no images
                    warn!("Error accessing dataset entry: {}", e);
                }
            }
        }

        if images.is_empty() {
            return Err(PipelineError::Dataset(format!(
                "No recognized image files under {}",
                root.display()
            )));
        }

        debug!(count = images.len(), root = %root.display(), "Discovered dataset images");
        Ok(images)
    }

    /// Decode and preprocess every discovered image
    pub fn materialize(
        &self,
        paths: &[PathBuf],
        preprocessor: &Preprocessor,
    ) -> PipelineResult<Vec<LabeledImage>> {
        paths
            .iter()
            .map(|path| {
                let label = label_for(path)?;
                let pixels = preprocessor.load(path)?;
                Ok(LabeledImage {
                    pixels,
                    label,
                    path: path.clone(),
                })
            })
            .collect()
    }

    /// `discover` followed by `materialize`
    pub fn load(&self, root: &Path, preprocessor: &Preprocessor) -> PipelineResult<Vec<LabeledImage>> {
        let paths = self.discover(root)?;
        self.materialize(&paths, preprocessor)
    }
}

/// Name of the directory immediately containing `path`
pub fn label_for(path: &Path) -> PipelineResult<String> {
    path.parent()
        .and_then(Path::file_name)
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| {
            PipelineError::Dataset(format!(
                "Cannot derive a label for {}: no parent directory",
                path.display()
            ))
        })
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            IMAGE_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use std::fs;
    use tempfile::TempDir;

    fn write_png(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        RgbImage::from_pixel(5, 5, Rgb([10, 20, 30])).save(path).unwrap();
    }

    #[test]
    fn labels_come_from_parent_directory() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        write_png(&root.join("cat/a.png"));
        write_png(&root.join("cat/b.PNG"));
        write_png(&root.join("dog/nested/c.png"));

        let images = ImageCorpusLoader::new()
            .load(root, &Preprocessor::new(4, 3))
            .unwrap();
        let labels: Vec<_> = images.iter().map(|i| i.label.as_str()).collect();
        assert_eq!(labels, vec!["cat", "cat", "nested"]);
        assert!(images.iter().all(|i| i.pixels.shape() == [3, 4, 4]));
    }

    #[test]
    fn non_images_and_hidden_entries_are_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        write_png(&root.join("cat/a.png"));
        write_png(&root.join("cat/.hidden.png"));
        write_png(&root.join(".cache/dog/b.png"));
        fs::write(root.join("cat/notes.txt"), "not an image").unwrap();

        let paths = ImageCorpusLoader::new().discover(root).unwrap();
        assert_eq!(paths, vec![root.join("cat/a.png")]);
    }

    #[test]
    fn discovery_order_is_sorted() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        for name in ["dog/2.png", "cat/9.png", "dog/1.png", "cat/10.png"] {
            write_png(&root.join(name));
        }

        let paths = ImageCorpusLoader::new().discover(root).unwrap();
        let relative: Vec<_> = paths
            .iter()
            .map(|p| p.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/"))
            .collect();
        assert_eq!(relative, vec!["cat/10.png", "cat/9.png", "dog/1.png", "dog/2.png"]);
    }

    #[test]
    fn missing_root_is_a_dataset_error() {
        let temp_dir = TempDir::new().unwrap();
        let err = ImageCorpusLoader::new()
            .discover(&temp_dir.path().join("nope"))
            .unwrap_err();
        assert!(matches!(err, PipelineError::Dataset(_)));
    }

    #[test]
    fn file_root_is_a_dataset_error() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("file.png");
        write_png(&file);
        assert!(matches!(
            ImageCorpusLoader::new().discover(&file),
            Err(PipelineError::Dataset(_))
        ));
    }

    #[test]
    fn empty_root_is_a_dataset_error() {
        let temp_dir = TempDir::new().unwrap();
        let err = ImageCorpusLoader::new().discover(temp_dir.path()).unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn root_without_images_is_a_dataset_error() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir_all(temp_dir.path().join("cat")).unwrap();
        fs::write(temp_dir.path().join("cat/readme.md"), "# cats").unwrap();

        let err = ImageCorpusLoader::new().discover(temp_dir.path()).unwrap_err();
        assert!(err.to_string().contains("No recognized image files"));
    }

    #[test]
    fn corrupt_image_fails_materialization() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        write_png(&root.join("cat/good.png"));
        fs::write(root.join("cat/bad.png"), b"garbage").unwrap();

        let err = ImageCorpusLoader::new()
            .load(root, &Preprocessor::new(4, 3))
            .unwrap_err();
        assert_eq!(err.kind(), "PreprocessError");
        assert!(err.to_string().contains("bad.png"));
    }
}
