//! # Main Optimizer Orchestrator Module
//!
//! Questo è il modulo che orchestra l'ottimizzazione di una singola immagine.
//!
//! ## Responsabilità:
//! - Possiede il contesto dell'intera pipeline: configurazione, existence
//!   cache, tabella degli exclusivity ticket e client HTTP (nessuno stato
//!   ambientale di processo)
//! - Garantisce la disponibilità della sorgente una sola volta
//! - Calcola il set di larghezze target (union deduplicata di image sizes,
//!   device sizes e larghezza richiesta)
//! - Esegue tutti i resize job concorrentemente, senza garanzie di ordine
//!
//! ## Flusso di esecuzione per richiesta:
//! 1. **ensure source**: download o copia locale, se assente
//! 2. **width set**: union deduplicata delle larghezze configurate
//! 3. **variant paths**: sostituzione del segmento `-opt-<width>` (gli SVG
//!    collassano su un unico path)
//! 4. **concurrent jobs**: `try_join_all` sui resize, ognuno idempotente e
//!    protetto dal proprio ticket
//!
//! ## Error handling:
//! Un download o resize fallito propaga come errore fatale per questa
//! invocazione; il chiamante (la pipeline di generazione statica) rilancia
//! la build per riprovare.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::cache::ExistenceCache;
use crate::config::Config;
use crate::download::SourceFetcher;
use crate::error::OptimizeError;
use crate::exclusive::ExclusiveInit;
use crate::variant::VariantWriter;

/// One image-optimization invocation, mirroring the subprocess arguments
#[derive(Debug, Clone)]
pub struct OptimizeRequest {
    /// Original source: local relative path or remote absolute URL
    pub source_url: String,
    /// Where the source lives (or is downloaded to) locally
    pub local_source_path: PathBuf,
    /// Variant path for the requested width; other widths derive from it
    pub local_optimized_path: PathBuf,
    /// Specifically requested render width
    pub width: u32,
    /// Re-encoding quality (1-100)
    pub quality: u8,
    /// Target extension, lowercased
    pub extension: String,
}

/// Orchestrates source availability and concurrent variant generation
pub struct ImageOptimizer {
    config: Config,
    fetcher: SourceFetcher,
    variants: VariantWriter,
}

impl ImageOptimizer {
    pub fn new(config: Config) -> Self {
        let cache = Arc::new(ExistenceCache::new());
        let exclusive = Arc::new(ExclusiveInit::new(Duration::from_secs(
            config.lock_timeout_secs,
        )));

        Self {
            fetcher: SourceFetcher::new(cache.clone(), exclusive.clone()),
            variants: VariantWriter::new(cache, exclusive, config.avif_quality_offset),
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Fetch a remote SVG source as an inline base64 data URI
    pub async fn svg_data_uri(&self, source_url: &str) -> Result<String, OptimizeError> {
        self.fetcher.fetch_svg_data_uri(source_url).await
    }

    /// Ensure every configured variant of the requested source exists.
    ///
    /// Returns the number of variants actually generated by this call;
    /// 0 means everything was already in place.
    pub async fn optimize(&self, request: &OptimizeRequest) -> Result<usize, OptimizeError> {
        debug!(
            "Optimizing {} ({} at width {}, quality {}, extension {})",
            request.source_url,
            request.local_source_path.display(),
            request.width,
            request.quality,
            request.extension
        );

        self.fetcher
            .ensure_source(&request.source_url, &request.local_source_path)
            .await?;

        // svg variants collapse to a single destination path
        let mut jobs: Vec<(u32, PathBuf)> = Vec::new();
        for width in self.config.target_widths(request.width) {
            let dest = with_width(&request.local_optimized_path, width);
            if !jobs.iter().any(|(_, existing)| existing == &dest) {
                jobs.push((width, dest));
            }
        }

        let results = futures::future::try_join_all(jobs.iter().map(|(width, dest)| {
            self.variants.resize_variant(
                &request.local_source_path,
                dest,
                *width,
                request.quality,
                &request.extension,
            )
        }))
        .await?;

        Ok(results.into_iter().filter(|written| *written).count())
    }
}

/// Rewrite the `-opt-<width>` segment of a variant path for another width.
///
/// Paths without the segment (svg variants) are returned unchanged.
pub fn with_width(path: &Path, width: u32) -> PathBuf {
    let text = path.to_string_lossy();
    let Some(marker) = text.rfind("-opt-") else {
        return path.to_path_buf();
    };

    let digits_start = marker + "-opt-".len();
    let rest = &text[digits_start..];
    let digits = rest.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 || !rest[digits..].starts_with('.') {
        return path.to_path_buf();
    }

    PathBuf::from(format!(
        "{}{}{}",
        &text[..digits_start],
        width,
        &rest[digits..]
    ))
}
