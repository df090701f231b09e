//! # Error Types Module
//!
//! Questo modulo definisce tutti i tipi di errore custom dell'applicazione.
//!
//! ## Responsabilità:
//! - Definisce `OptimizeError` enum per categorizzare tutti gli errori possibili
//! - Fornisce messaggi di errore descrittivi e strutturati
//! - Integra con `thiserror` per automatic error conversion
//! - Supporta error chaining per mantenere il contesto degli errori
//!
//! ## Categorie di errori:
//! - `Io`: Errori di I/O (file non trovati, permessi, etc.)
//! - `Image`: Errori di decodifica immagini (formati corrotti, etc.)
//! - `Download`: Risposta HTTP non-2xx durante il fetch di una sorgente remota
//! - `Http`: Errori di trasporto HTTP (rete, TLS, redirect)
//! - `MissingSource`: Sorgente locale referenziata ma assente
//! - `LockTimeout`: Attesa su un exclusivity ticket oltre il budget
//! - `Encode`: Errori di ri-encoding (WebP/AVIF)
//! - `Svg`: Errori di parsing/minificazione SVG
//! - `InvalidPath`: Path non rappresentabile o malformato
//! - `Validation`: Errori di validazione input
//!
//! ## Esempio:
//! ```rust,ignore
//! if !status.is_success() {
//!     return Err(OptimizeError::Download { url, status });
//! }
//! ```

use std::path::PathBuf;

/// Custom error types for image optimization
#[derive(thiserror::Error, Debug)]
pub enum OptimizeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Download request failed for {url}, response status: {status}")]
    Download {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Source image does not exist locally: {0}")]
    MissingSource(PathBuf),

    #[error("{0} initialization timeout")]
    LockTimeout(String),

    #[error("Encoding error: {0}")]
    Encode(String),

    #[error("SVG optimization error: {0}")]
    Svg(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Validation error: {0}")]
    Validation(String),
}
