//! # Srcset Optimizer Library
//!
//! Questo è il modulo principale della libreria che espone tutte le API pubbliche.
//!
//! ## Responsabilità:
//! - Definisce la struttura modulare della pipeline
//! - Espone i tipi e le funzioni principali tramite re-exports
//! - Fornisce un'interfaccia pulita per il main.rs e per altri consumatori
//!
//! ## Architettura dei moduli:
//! - `config`: Gestione configurazione e validazione parametri
//! - `error`: Tipi di errore custom per diverse operazioni
//! - `cache`: Existence cache process-lifetime per check filesystem
//! - `exclusive`: Exclusivity ticket (una esecuzione per chiave operazione)
//! - `reference`: Parsing riferimenti immagine e risoluzione path
//! - `loader`: Calcolo URL varianti e innesco dell'ottimizzazione
//! - `download`: Disponibilità locale delle sorgenti (copia o download)
//! - `variant`: Resize, ri-encoding e minificazione SVG delle varianti
//! - `optimizer`: Orchestratore per singola immagine
//! - `warm`: Pre-generazione batch delle varianti di una directory
//! - `progress`: Progress tracking e statistiche per la modalità warm
//!
//! ## Utilizzo:
//! ```rust,no_run
//! use srcset_optimizer::{Config, ImageOptimizer, OptimizeRequest, OptimizeError};
//!
//! # async fn demo(request: OptimizeRequest) -> Result<(), OptimizeError> {
//! let optimizer = ImageOptimizer::new(Config::default());
//! let generated = optimizer.optimize(&request).await?;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod download;
pub mod error;
pub mod exclusive;
pub mod loader;
pub mod optimizer;
pub mod progress;
pub mod reference;
pub mod variant;
pub mod warm;

pub use config::Config;
pub use error::OptimizeError;
pub use loader::OptimizedLoader;
pub use optimizer::{ImageOptimizer, OptimizeRequest};
pub use warm::Warmer;
