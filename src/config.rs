//! # Configuration Management Module
//!
//! Questo modulo gestisce tutta la configurazione della pipeline.
//!
//! ## Responsabilità:
//! - Definisce la struct `Config` con tutti i parametri di ottimizzazione
//! - Fornisce validazione robusta dei parametri di input
//! - Supporta caricamento/salvataggio configurazione da/verso file JSON
//! - Fornisce valori di default sensati per tutti i parametri
//!
//! ## Parametri di configurazione:
//! - `image_sizes`: Larghezze per immagini piccole (layout fixed/intrinsic)
//! - `device_sizes`: Larghezze per breakpoint dispositivo (layout fill/responsive)
//! - `quality`: Qualità di re-encoding (1-100, default: 75)
//! - `use_webp`: Ri-encoda jpg/jpeg/png/gif come WebP (default: true)
//! - `avif_quality_offset`: Riduzione qualità per l'encoder AVIF (default: 15)
//! - `build_dir`: Directory di cache/output dei media (default: "build/static/media")
//! - `static_dist_dir`: Prefisso URL dei media statici (default: "static/media")
//! - `export_folder`: Sottocartella delle varianti (default: "srcset")
//! - `public_dir`: Radice degli asset locali (default: "public")
//! - `optimizer_bin`: Binario invocato dal loader (default: "optimize-image")
//! - `lock_timeout_secs`: Budget di attesa sugli exclusivity ticket (default: 150)
//! - `workers`: Worker paralleli in modalità warm (default: 4)
//! - `passthrough`: Modalità development/fallback senza resize (default: false)
//!
//! ## Esempio:
//! ```rust,ignore
//! let config = Config {
//!     quality: 80,
//!     use_webp: false,
//!     ..Default::default()
//! };
//! config.validate()?;
//! ```

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the image optimization pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Widths generated for small images (fixed and intrinsic layouts)
    pub image_sizes: Vec<u32>,
    /// Widths matching device breakpoints (fill and responsive layouts)
    pub device_sizes: Vec<u32>,
    /// Re-encoding quality (1-100)
    pub quality: u8,
    /// Re-encode jpg/jpeg/png/gif as WebP
    pub use_webp: bool,
    /// Quality reduction applied to the AVIF encoder relative to `quality`
    pub avif_quality_offset: u8,
    /// Local media cache and variant output directory
    pub build_dir: PathBuf,
    /// URL prefix under which exported media is served
    pub static_dist_dir: String,
    /// Subfolder holding generated variants
    pub export_folder: String,
    /// Root directory for local (non-exported) assets
    pub public_dir: PathBuf,
    /// Optimizer binary the loader invokes as a subprocess
    pub optimizer_bin: String,
    /// Seconds to wait on an in-flight ticket before giving up
    pub lock_timeout_secs: u64,
    /// Number of parallel workers in warm mode
    pub workers: usize,
    /// Pass sources through untouched (development / optimization disabled)
    pub passthrough: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            // smaller than the smallest device size
            image_sizes: vec![16, 32, 48, 64, 96, 128, 256],
            // same as the site's breakpoints
            device_sizes: vec![380, 460, 640, 800, 980, 1140, 1280, 1500, 1920],
            quality: 75,
            use_webp: true,
            avif_quality_offset: 15,
            build_dir: PathBuf::from("build/static/media"),
            static_dist_dir: "static/media".to_string(),
            export_folder: "srcset".to_string(),
            public_dir: PathBuf::from("public"),
            optimizer_bin: "optimize-image".to_string(),
            lock_timeout_secs: 150,
            workers: 4,
            passthrough: false,
        }
    }
}

impl Config {
    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.quality == 0 || self.quality > 100 {
            return Err(anyhow::anyhow!("Quality must be between 1 and 100"));
        }

        if self.image_sizes.is_empty() && self.device_sizes.is_empty() {
            return Err(anyhow::anyhow!(
                "At least one image size or device size must be configured"
            ));
        }

        if self.workers == 0 {
            return Err(anyhow::anyhow!("Number of workers must be greater than 0"));
        }

        if self.lock_timeout_secs == 0 {
            return Err(anyhow::anyhow!("Lock timeout must be greater than 0"));
        }

        if self.static_dist_dir.starts_with('/') || self.static_dist_dir.ends_with('/') {
            return Err(anyhow::anyhow!(
                "Static dist dir must not have leading or trailing slashes: {}",
                self.static_dist_dir
            ));
        }

        Ok(())
    }

    /// Load configuration from file
    pub async fn from_file(path: &PathBuf) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path).await?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save_to_file(&self, path: &PathBuf) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }

    /// All configured widths plus the requested one, deduplicated, ascending
    pub fn target_widths(&self, requested: u32) -> Vec<u32> {
        let mut widths: Vec<u32> = self
            .image_sizes
            .iter()
            .chain(self.device_sizes.iter())
            .copied()
            .chain(std::iter::once(requested))
            .collect();
        widths.sort_unstable();
        widths.dedup();
        widths
    }
}
