//! # Loader Resolver Module
//!
//! Questo modulo calcola l'URL che il runtime richiederà per un'immagine e,
//! durante la generazione statica, innesca l'ottimizzazione della variante.
//!
//! ## Responsabilità:
//! - Genera l'URL della variante (`<stem>-opt-<width>.<ext>` sotto `srcset/`)
//! - Sostituisce l'estensione con WebP per i formati raster quando configurato
//! - In modalità passthrough ritorna la sorgente con la width come query param
//! - Invoca il binario `optimize-image` come subprocess; i fallimenti vengono
//!   loggati e mai propagati, l'URL calcolato viene ritornato comunque
//!
//! ## Regole di naming:
//! - Le sorgenti remote vengono prima mappate sul nome file di cache
//! - Gli SVG mantengono lo stem invariato (mai ridimensionati per larghezza)
//! - Un prefisso di directory `media/` viene rimosso dall'URL generato
//! - Il risultato è sempre radicato su `/<static_dist_dir>/`

use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, warn};

use crate::config::Config;
use crate::reference::{split_file_path, ImageReference};

/// Extensions rewritten to WebP in generated URLs when `use_webp` is on
const WEBP_SUBSTITUTED: &[&str] = &["jpg", "jpeg", "png", "gif"];

/// Computes variant URLs and triggers optimization during static generation
pub struct OptimizedLoader {
    config: Config,
}

impl OptimizedLoader {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Resolve the URL the runtime should fetch for `source` at `width`.
    ///
    /// In passthrough mode no file is ever touched. Otherwise the optimizer
    /// binary runs synchronously so the variant exists once the exported page
    /// is served; its failure is logged and swallowed.
    pub fn resolve(&self, source: &str, width: u32) -> String {
        if self.config.passthrough {
            return passthrough_url(source, width);
        }

        let url = self.variant_url(source, width);
        let reference = ImageReference::parse(source);
        let source_path = reference.local_source_path(&self.config);
        let (variant_path, extension) = self.local_variant_info(&url);

        self.run_optimizer(source, &source_path, &variant_path, width, &extension);

        url
    }

    /// Pure URL computation, no side effects
    pub fn variant_url(&self, source: &str, width: u32) -> String {
        let reference = ImageReference::parse(source);
        let naming_source = if reference.is_remote() {
            reference.cache_file_name()
        } else {
            source.to_string()
        };
        let parts = split_file_path(&naming_source);

        let mut extension = parts.extension.clone();
        if self.config.use_webp && WEBP_SUBSTITUTED.contains(&extension.as_str()) {
            extension = "webp".to_string();
        }

        let mut dir = parts.dir;
        if !dir.ends_with('/') {
            dir.push('/');
        }

        // already-exported sources contribute no directory of their own
        let mut image_path = if source.contains(&self.config.static_dist_dir) {
            String::new()
        } else {
            dir
        };
        if let Some(stripped) = image_path.strip_prefix("media/") {
            image_path = stripped.to_string();
        }

        let file_name = if reference.is_svg() {
            parts.stem
        } else {
            format!("{}-opt-{}", parts.stem, width)
        };

        let mut url = format!(
            "{}{}/{}.{}",
            image_path, self.config.export_folder, file_name, extension
        );
        if !url.starts_with('/') {
            url.insert(0, '/');
        }

        format!("/{}{}", self.config.static_dist_dir, url)
    }

    /// Map a generated URL back to its on-disk variant path and extension
    fn local_variant_info(&self, url: &str) -> (PathBuf, String) {
        let parts = split_file_path(url);
        let directory = parts
            .dir
            .get(self.config.static_dist_dir.len() + 1..)
            .unwrap_or("/");

        let path = PathBuf::from(format!(
            "{}{}{}.{}",
            self.config.build_dir.display(),
            directory,
            parts.stem,
            parts.extension
        ));

        (path, parts.extension)
    }

    fn run_optimizer(
        &self,
        source: &str,
        source_path: &Path,
        variant_path: &Path,
        width: u32,
        extension: &str,
    ) {
        debug!(
            "Spawning {} for {} at width {}",
            self.config.optimizer_bin, source, width
        );

        let result = Command::new(&self.config.optimizer_bin)
            .arg(source)
            .arg(source_path)
            .arg(variant_path)
            .arg(width.to_string())
            .arg(self.config.quality.to_string())
            .arg(extension)
            .status();

        match result {
            Ok(status) if !status.success() => {
                warn!(
                    "Optimizer exited with {} for {}, serving computed URL anyway",
                    status, source
                );
            }
            Err(e) => {
                warn!(
                    "Failed to spawn {} for {}: {}, serving computed URL anyway",
                    self.config.optimizer_bin, source, e
                );
            }
            _ => {}
        }
    }
}

/// Development / disabled-optimization URL: untouched source, width appended
/// to satisfy the host framework's loader validation
fn passthrough_url(source: &str, width: u32) -> String {
    let reference = ImageReference::parse(source);
    if reference.is_remote() || source.starts_with('/') {
        format!("{}?w={}", source, width)
    } else {
        format!("/{}?w={}", source, width)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loader(passthrough: bool) -> OptimizedLoader {
        OptimizedLoader::new(Config {
            passthrough,
            ..Default::default()
        })
    }

    #[test]
    fn test_variant_url_remote_source() {
        let url = loader(false).variant_url("https://example.com/a.png", 400);
        assert_eq!(url, "/static/media/srcset/example.com_a-opt-400.webp");
    }

    #[test]
    fn test_variant_url_strips_media_prefix() {
        let url = loader(false).variant_url("media/house.jpg", 640);
        assert_eq!(url, "/static/media/srcset/house-opt-640.webp");
    }

    #[test]
    fn test_variant_url_keeps_extension_without_webp() {
        let loader = OptimizedLoader::new(Config {
            use_webp: false,
            ..Default::default()
        });
        let url = loader.variant_url("media/house.jpg", 640);
        assert_eq!(url, "/static/media/srcset/house-opt-640.jpg");
    }

    #[test]
    fn test_variant_url_svg_keeps_stem() {
        let url = loader(false).variant_url("media/icon.svg", 400);
        assert_eq!(url, "/static/media/srcset/icon.svg");

        // width never shows up for svg
        let other = loader(false).variant_url("media/icon.svg", 1920);
        assert_eq!(url, other);
    }

    #[test]
    fn test_variant_url_exported_source() {
        let url = loader(false).variant_url("/static/media/gallery/pic.png", 800);
        assert_eq!(url, "/static/media/srcset/pic-opt-800.webp");
    }

    #[test]
    fn test_local_variant_info() {
        let (path, extension) =
            loader(false).local_variant_info("/static/media/srcset/a-opt-400.webp");
        assert_eq!(
            path,
            PathBuf::from("build/static/media/srcset/a-opt-400.webp")
        );
        assert_eq!(extension, "webp");
    }

    #[test]
    fn test_passthrough_urls() {
        let loader = loader(true);
        assert_eq!(
            loader.resolve("media/house.jpg", 640),
            "/media/house.jpg?w=640"
        );
        assert_eq!(
            loader.resolve("/static/media/a.png", 16),
            "/static/media/a.png?w=16"
        );
        assert_eq!(
            loader.resolve("https://example.com/a.png", 400),
            "https://example.com/a.png?w=400"
        );
    }
}
