//! # Batch Pre-Warming Module
//!
//! Questo modulo pre-genera tutte le varianti per una directory di sorgenti.
//!
//! ## Responsabilità:
//! - Discovery ricorsiva delle immagini supportate con `walkdir`
//! - Processing parallelo su worker pool limitato da semaforo
//! - Progress bar e statistiche aggregate per l'intera run
//!
//! ## Flusso:
//! 1. Trova le immagini sotto la directory (le cartelle `srcset/` già
//!    generate vengono saltate)
//! 2. Costruisce una richiesta per file alla larghezza configurata massima:
//!    l'optimizer espande comunque al set completo di larghezze
//! 3. Esegue con concorrenza controllata; errori per singoli file non
//!    bloccano la run
//!
//! ## Esempio:
//! ```bash
//! optimize-image --warm public/media
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::Semaphore;
use tracing::{error, info};
use walkdir::WalkDir;

use crate::config::Config;
use crate::optimizer::{ImageOptimizer, OptimizeRequest};
use crate::progress::{ProgressManager, WarmStats};
use crate::variant::SUPPORTED_EXTENSIONS;

/// Pre-generates every configured variant for a directory of images
pub struct Warmer {
    config: Config,
    optimizer: Arc<ImageOptimizer>,
}

impl Warmer {
    pub fn new(config: Config) -> Self {
        Self {
            optimizer: Arc::new(ImageOptimizer::new(config.clone())),
            config,
        }
    }

    /// Warm every supported image under `media_dir`
    pub async fn run(&self, media_dir: &Path) -> Result<WarmStats> {
        info!("Pre-warming image variants in: {}", media_dir.display());

        let files = find_image_files(media_dir, &self.config.export_folder);
        info!("Found {} images to warm", files.len());

        if files.is_empty() {
            return Ok(WarmStats::new());
        }

        let progress = ProgressManager::new(files.len() as u64);
        let mut stats = WarmStats::new();

        let semaphore = Arc::new(Semaphore::new(self.config.workers));
        let mut tasks = Vec::new();

        for file_path in files {
            let permit = semaphore.clone().acquire_owned().await?;
            let optimizer = self.optimizer.clone();
            let request = self.request_for(&file_path)?;
            let progress_clone = progress.clone();

            let task = tokio::spawn(async move {
                let _permit = permit; // keep permit alive

                let result = optimizer.optimize(&request).await;

                let name = request
                    .local_source_path
                    .file_name()
                    .unwrap_or_default()
                    .to_string_lossy()
                    .into_owned();
                let message = match &result {
                    Ok(0) => format!("⏩ {}: up to date", name),
                    Ok(generated) => format!("✅ {}: {} variants", name, generated),
                    Err(_) => format!("❌ {}: error", name),
                };
                progress_clone.update(&message);

                result
            });

            tasks.push(task);
        }

        for task in tasks {
            match task.await? {
                Ok(0) => stats.add_skipped(),
                Ok(generated) => stats.add_warmed(generated),
                Err(e) => {
                    stats.add_error();
                    error!("Failed to warm image: {}", e);
                }
            }
        }

        progress.finish(&stats.format_summary());

        Ok(stats)
    }

    /// Build the optimization request for one discovered file.
    ///
    /// The requested width is the largest configured width; the optimizer
    /// expands to the full width set either way.
    fn request_for(&self, file_path: &Path) -> Result<OptimizeRequest> {
        let stem = file_path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| anyhow::anyhow!("Invalid file name: {}", file_path.display()))?;

        let source_extension = file_path
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_lowercase())
            .unwrap_or_default();

        let extension = if self.config.use_webp
            && matches!(source_extension.as_str(), "jpg" | "jpeg" | "png" | "gif")
        {
            "webp".to_string()
        } else {
            source_extension
        };

        let width = self
            .config
            .image_sizes
            .iter()
            .chain(self.config.device_sizes.iter())
            .copied()
            .max()
            .unwrap_or(1920);

        let variant_name = if extension == "svg" {
            format!("{}.svg", stem)
        } else {
            format!("{}-opt-{}.{}", stem, width, extension)
        };

        let dest = file_path
            .parent()
            .unwrap_or_else(|| Path::new(""))
            .join(&self.config.export_folder)
            .join(variant_name);

        Ok(OptimizeRequest {
            source_url: file_path.to_string_lossy().into_owned(),
            local_source_path: file_path.to_path_buf(),
            local_optimized_path: dest,
            width,
            quality: self.config.quality,
            extension,
        })
    }
}

/// Find all supported images under a directory, skipping generated variants
fn find_image_files(media_dir: &Path, export_folder: &str) -> Vec<PathBuf> {
    WalkDir::new(media_dir)
        .into_iter()
        .filter_entry(|e| e.file_name().to_str() != Some(export_folder))
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            e.path()
                .extension()
                .and_then(|s| s.to_str())
                .map(|ext| SUPPORTED_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
                .unwrap_or(false)
        })
        .map(|e| e.into_path())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_config() -> Config {
        Config {
            image_sizes: vec![8],
            device_sizes: vec![16],
            workers: 2,
            ..Default::default()
        }
    }

    fn write_png(path: &Path, width: u32, height: u32) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        image::RgbImage::from_pixel(width, height, image::Rgb([200, 100, 50]))
            .save(path)
            .unwrap();
    }

    #[test]
    fn test_find_image_files_skips_generated_variants() {
        let temp_dir = TempDir::new().unwrap();
        write_png(&temp_dir.path().join("a.png"), 32, 32);
        write_png(&temp_dir.path().join("nested/b.png"), 32, 32);
        write_png(&temp_dir.path().join("srcset/a-opt-8.png"), 8, 8);
        std::fs::write(temp_dir.path().join("notes.txt"), "not an image").unwrap();

        let mut files = find_image_files(temp_dir.path(), "srcset");
        files.sort();

        assert_eq!(
            files,
            vec![
                temp_dir.path().join("a.png"),
                temp_dir.path().join("nested/b.png"),
            ]
        );
    }

    #[test]
    fn test_request_for_substitutes_webp() {
        let warmer = Warmer::new(test_config());
        let request = warmer.request_for(Path::new("media/photo.JPG")).unwrap();

        assert_eq!(request.extension, "webp");
        assert_eq!(request.width, 16);
        assert_eq!(
            request.local_optimized_path,
            PathBuf::from("media/srcset/photo-opt-16.webp")
        );
    }

    #[tokio::test]
    async fn test_warm_run_generates_variants() {
        let temp_dir = TempDir::new().unwrap();
        write_png(&temp_dir.path().join("a.png"), 100, 50);
        write_png(&temp_dir.path().join("nested/b.png"), 100, 50);

        let warmer = Warmer::new(Config {
            use_webp: false,
            ..test_config()
        });
        let stats = warmer.run(temp_dir.path()).await.unwrap();

        assert_eq!(stats.files_processed, 2);
        assert_eq!(stats.files_warmed, 2);
        assert_eq!(stats.errors, 0);
        // widths 8 and 16 per file
        assert_eq!(stats.variants_generated, 4);

        assert!(temp_dir.path().join("srcset/a-opt-8.png").exists());
        assert!(temp_dir.path().join("srcset/a-opt-16.png").exists());
        assert!(temp_dir.path().join("nested/srcset/b-opt-16.png").exists());

        // a second run finds everything up to date
        let warmer = Warmer::new(Config {
            use_webp: false,
            ..test_config()
        });
        let stats = warmer.run(temp_dir.path()).await.unwrap();
        assert_eq!(stats.files_warmed, 0);
        assert_eq!(stats.files_skipped, 2);
    }
}
