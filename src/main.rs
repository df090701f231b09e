//! # Srcset Optimizer - Main Entry Point
//!
//! Questo è il punto di ingresso del binario `optimize-image`.
//!
//! ## Responsabilità:
//! - Parsing degli argomenti della command line con `clap`
//! - Inizializzazione del sistema di logging con `tracing`
//! - Caricamento e validazione della configurazione
//! - Avvio dell'ottimizzazione singola o della modalità warm
//!
//! ## Contratto di uscita:
//! Il processo esce SEMPRE con codice 0: un errore su una singola immagine
//! viene loggato con il suo contesto ma non deve mai abortire la
//! generazione statica che ha invocato questo subprocess.
//!
//! ## Esempio di utilizzo:
//! ```bash
//! optimize-image https://example.com/a.png \
//!     build/static/media/example.com_a.png \
//!     build/static/media/srcset/example.com_a-opt-400.webp \
//!     400 75 webp
//!
//! optimize-image --warm public/media --workers 8 --verbose
//! ```

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info};

use srcset_optimizer::{Config, ImageOptimizer, OptimizeRequest, Warmer};

#[derive(Parser)]
#[command(name = "optimize-image")]
#[command(about = "Generate resized image variants for a static export")]
struct Args {
    /// Image source: local relative path or remote absolute URL
    source_url: Option<String>,

    /// Local path the source is cached at
    local_source_image_path: Option<PathBuf>,

    /// Variant path for the requested width
    local_optimized_image_path: Option<PathBuf>,

    /// Requested render width in pixels
    width: Option<u32>,

    /// Re-encoding quality (1-100)
    quality: Option<u8>,

    /// Target extension (webp, avif, png, jpeg, jpg, svg)
    extension: Option<String>,

    /// Pre-generate variants for every image under a directory
    #[arg(long, value_name = "DIR", conflicts_with = "source_url")]
    warm: Option<PathBuf>,

    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of parallel workers in warm mode
    #[arg(short, long)]
    workers: Option<usize>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Initialize logging
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(if args.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);

    // One bad image must never abort the surrounding static export:
    // log the full error chain and still exit 0.
    if let Err(e) = run(args).await {
        error!("Image optimization failed: {:?}", e);
    }
}

async fn run(args: Args) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => Config::from_file(path).await?,
        None => Config::default(),
    };

    if let Some(workers) = args.workers {
        config.workers = workers;
    }

    config.validate()?;

    if let Some(ref media_dir) = args.warm {
        if !media_dir.exists() {
            return Err(anyhow::anyhow!(
                "Media directory does not exist: {}",
                media_dir.display()
            ));
        }

        let warmer = Warmer::new(config);
        let stats = warmer.run(media_dir).await?;
        info!("{}", stats.format_summary());
        return Ok(());
    }

    let request = request_from_args(&args)?;
    let optimizer = ImageOptimizer::new(config);
    let generated = optimizer.optimize(&request).await?;
    info!(
        "Generated {} variants for {}",
        generated, request.source_url
    );

    Ok(())
}

fn request_from_args(args: &Args) -> Result<OptimizeRequest> {
    let (
        Some(source_url),
        Some(local_source_image_path),
        Some(local_optimized_image_path),
        Some(width),
        Some(quality),
        Some(extension),
    ) = (
        args.source_url.clone(),
        args.local_source_image_path.clone(),
        args.local_optimized_image_path.clone(),
        args.width,
        args.quality,
        args.extension.clone(),
    )
    else {
        return Err(anyhow::anyhow!(
            "Expected <source_url> <local_source_path> <local_optimized_path> <width> <quality> <extension>, or --warm <dir>"
        ));
    };

    Ok(OptimizeRequest {
        source_url,
        local_source_path: local_source_image_path,
        local_optimized_path: local_optimized_image_path,
        width,
        quality,
        extension: extension.to_lowercase(),
    })
}
