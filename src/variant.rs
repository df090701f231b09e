//! # Variant Writing Module
//!
//! Questo modulo produce le varianti ridimensionate/ri-encodate di una
//! sorgente immagine.
//!
//! ## Responsabilità:
//! - No-op quando la variante esiste già (via existence cache)
//! - Estensioni non supportate: copia verbatim della sorgente
//! - SVG: minificazione lossless (parse `usvg` + ri-serializzazione), mai
//!   ridimensionati per larghezza pixel
//! - Raster: decodifica, auto-orient da EXIF, solo downscale (mai upscale),
//!   encoding nel formato richiesto alla qualità richiesta
//! - Ogni scrittura passa da file temporaneo + rename atomico: nessun lettore
//!   osserva mai una variante parziale
//! - Al massimo un resize in-flight per coppia (ticket `resize <src> to <dst>`)
//!
//! ## Formati di output:
//! - `jpeg`/`jpg`: qualità richiesta
//! - `png`: encoding lossless, il parametro qualità non si applica
//! - `avif`: qualità ridotta dell'offset configurato, floor a 0; senza la
//!   feature `avif` viene scritto WebP e il mismatch di estensione loggato
//! - `webp` e default: encoding lossy alla qualità richiesta
//!
//! Il lavoro CPU-bound di decode/encode gira su `spawn_blocking`.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use tempfile::NamedTempFile;
use tracing::debug;
#[cfg(not(feature = "avif"))]
use tracing::warn;

use crate::cache::ExistenceCache;
use crate::error::OptimizeError;
use crate::exclusive::ExclusiveInit;

/// Extensions the pipeline knows how to re-encode
pub const SUPPORTED_EXTENSIONS: &[&str] = &["avif", "webp", "png", "jpeg", "jpg", "svg"];

/// EXIF orientation of a raster source
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Orientation {
    #[default]
    Normal,
    FlipHorizontal,
    Rotate180,
    FlipVertical,
    Transpose,
    Rotate90,
    Transverse,
    Rotate270,
}

impl From<u32> for Orientation {
    fn from(value: u32) -> Self {
        match value {
            2 => Self::FlipHorizontal,
            3 => Self::Rotate180,
            4 => Self::FlipVertical,
            5 => Self::Transpose,
            6 => Self::Rotate90,
            7 => Self::Transverse,
            8 => Self::Rotate270,
            _ => Self::Normal,
        }
    }
}

impl Orientation {
    pub fn from_path(path: &Path) -> Option<Self> {
        let file = std::fs::File::open(path).ok()?;
        let mut reader = std::io::BufReader::new(file);
        let exif = exif::Reader::new().read_from_container(&mut reader).ok()?;
        let value = exif
            .get_field(exif::Tag::Orientation, exif::In::PRIMARY)?
            .value
            .get_uint(0)?;
        Some(Self::from(value))
    }

    /// Rotate/flip the decoded image so it displays upright
    #[must_use]
    pub fn apply(self, img: DynamicImage) -> DynamicImage {
        match self {
            Self::Normal => img,
            Self::FlipHorizontal => img.fliph(),
            Self::Rotate180 => img.rotate180(),
            Self::FlipVertical => img.flipv(),
            Self::Transpose => img.fliph().rotate270(),
            Self::Rotate90 => img.rotate90(),
            Self::Transverse => img.fliph().rotate90(),
            Self::Rotate270 => img.rotate270(),
        }
    }
}

/// Quality handed to the AVIF encoder: requested quality minus the configured
/// offset, floored at zero
pub fn effective_avif_quality(quality: u8, offset: u8) -> u8 {
    quality.saturating_sub(offset)
}

/// Lossless SVG minification: parse to the simplified usvg tree and
/// re-serialize without indentation, dropping comments and editor metadata
pub fn minify_svg(data: &str) -> Result<String, OptimizeError> {
    let options = usvg::Options::default();
    let tree =
        usvg::Tree::from_str(data, &options).map_err(|e| OptimizeError::Svg(e.to_string()))?;

    let write_options = usvg::WriteOptions {
        indent: xmlwriter::Indent::None,
        attributes_indent: xmlwriter::Indent::None,
        preserve_text: true,
        ..Default::default()
    };
    Ok(tree.to_string(&write_options))
}

/// Writes resized/re-encoded variants idempotently and exclusively
pub struct VariantWriter {
    cache: Arc<ExistenceCache>,
    exclusive: Arc<ExclusiveInit>,
    avif_quality_offset: u8,
}

impl VariantWriter {
    pub fn new(
        cache: Arc<ExistenceCache>,
        exclusive: Arc<ExclusiveInit>,
        avif_quality_offset: u8,
    ) -> Self {
        Self {
            cache,
            exclusive,
            avif_quality_offset,
        }
    }

    /// Ensure the variant of `source` exists at `dest`.
    ///
    /// Returns `Ok(true)` when this call wrote the file, `Ok(false)` when it
    /// already existed.
    pub async fn resize_variant(
        &self,
        source: &Path,
        dest: &Path,
        width: u32,
        quality: u8,
        extension: &str,
    ) -> Result<bool, OptimizeError> {
        if self.cache.exists(dest) {
            return Ok(false);
        }

        let key = format!("resize {} to {}", source.display(), dest.display());
        self.exclusive
            .run(&key, || self.write_variant(source, dest, width, quality, extension))
            .await
    }

    async fn write_variant(
        &self,
        source: &Path,
        dest: &Path,
        width: u32,
        quality: u8,
        extension: &str,
    ) -> Result<(), OptimizeError> {
        // re-check under the ticket: a racing caller may have finished first
        if self.cache.exists(dest) {
            return Ok(());
        }

        self.cache.ensure_parent_dir(dest)?;
        let parent = dest.parent().unwrap_or_else(|| Path::new("."));
        let mut tmp = NamedTempFile::new_in(parent)?;

        if !SUPPORTED_EXTENSIONS.contains(&extension) {
            debug!(
                "Copying {} {} to {}",
                extension,
                source.display(),
                dest.display()
            );
            std::fs::copy(source, tmp.path())?;
        } else if extension == "svg" {
            debug!("Optimizing svg {} to {}", source.display(), dest.display());
            let data = tokio::fs::read_to_string(source).await?;
            let minified = minify_svg(&data)?;
            tmp.as_file_mut().write_all(minified.as_bytes())?;
            tmp.as_file_mut().flush()?;
        } else {
            debug!(
                "Resizing {} to {} at width {}",
                source.display(),
                dest.display(),
                width
            );
            let task_source = source.to_path_buf();
            let task_extension = extension.to_string();
            let offset = self.avif_quality_offset;
            let encoded = tokio::task::spawn_blocking(move || {
                encode_raster(&task_source, width, quality, &task_extension, offset)
            })
            .await
            .map_err(|e| OptimizeError::Encode(format!("resize task panicked: {e}")))??;

            tmp.as_file_mut().write_all(&encoded)?;
            tmp.as_file_mut().flush()?;
        }

        tmp.persist(dest).map_err(|e| OptimizeError::Io(e.error))?;
        self.cache.mark_created(dest);
        Ok(())
    }
}

/// Decode, orient, conditionally downscale and re-encode a raster source
fn encode_raster(
    source: &Path,
    width: u32,
    quality: u8,
    extension: &str,
    avif_quality_offset: u8,
) -> Result<Vec<u8>, OptimizeError> {
    let decoded = image::io::Reader::open(source)?
        .with_guessed_format()?
        .decode()?;
    let oriented = Orientation::from_path(source)
        .unwrap_or_default()
        .apply(decoded);

    // only ever downscale
    let img = if oriented.width() > width {
        oriented.resize(width, u32::MAX, FilterType::Lanczos3)
    } else {
        oriented
    };

    let mut out = Vec::new();
    match extension {
        "avif" => {
            #[cfg(feature = "avif")]
            {
                use image::codecs::avif::AvifEncoder;
                use image::ImageEncoder;

                let rgba = img.to_rgba8();
                let encoder = AvifEncoder::new_with_speed_quality(
                    &mut out,
                    6,
                    effective_avif_quality(quality, avif_quality_offset),
                );
                encoder.write_image(
                    rgba.as_raw(),
                    rgba.width(),
                    rgba.height(),
                    image::ColorType::Rgba8,
                )?;
            }
            #[cfg(not(feature = "avif"))]
            {
                let _ = avif_quality_offset;
                // destination keeps its avif-derived name; flag the mismatch
                warn!(
                    "AVIF encoder not compiled in, writing WebP data for {}",
                    source.display()
                );
                encode_webp(&img, quality, &mut out);
            }
        }
        "png" => {
            use image::codecs::png::PngEncoder;
            use image::ImageEncoder;

            // lossless; the quality knob does not apply to png
            let rgba = img.to_rgba8();
            let encoder = PngEncoder::new(&mut out);
            encoder.write_image(
                rgba.as_raw(),
                rgba.width(),
                rgba.height(),
                image::ColorType::Rgba8,
            )?;
        }
        "jpeg" | "jpg" => {
            use image::codecs::jpeg::JpegEncoder;
            use image::ImageEncoder;

            let rgb = img.to_rgb8();
            let encoder = JpegEncoder::new_with_quality(&mut out, quality);
            encoder.write_image(
                rgb.as_raw(),
                rgb.width(),
                rgb.height(),
                image::ColorType::Rgb8,
            )?;
        }
        // webp, and the universal default for anything unrecognized
        _ => encode_webp(&img, quality, &mut out),
    }

    Ok(out)
}

fn encode_webp(img: &DynamicImage, quality: u8, out: &mut Vec<u8>) {
    let rgba = img.to_rgba8();
    let encoded =
        webp::Encoder::from_rgba(rgba.as_raw(), rgba.width(), rgba.height()).encode(quality as f32);
    out.extend_from_slice(&encoded);
}
