//! # Source Download Module
//!
//! Questo modulo garantisce la presenza locale della sorgente immagine.
//!
//! ## Responsabilità:
//! - No-op quando la sorgente è già presente (via existence cache)
//! - Copia in place i riferimenti locali, errore se assenti
//! - Scarica le sorgenti remote via HTTP seguendo i redirect
//! - Streamma il body su file temporaneo e rinomina atomicamente
//! - Al massimo un download in-flight per URL (ticket `download <url>`)
//!
//! ## Fallimenti:
//! Una risposta non-2xx produce `OptimizeError::Download`; errori di rete
//! producono `OptimizeError::Http`. Nessun retry automatico: il file di
//! destinazione non viene mai creato, quindi una build successiva riprova.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::cache::ExistenceCache;
use crate::error::OptimizeError;
use crate::exclusive::ExclusiveInit;
use crate::reference::ImageReference;

/// Makes image sources available on the local filesystem
pub struct SourceFetcher {
    client: reqwest::Client,
    cache: Arc<ExistenceCache>,
    exclusive: Arc<ExclusiveInit>,
}

impl SourceFetcher {
    pub fn new(cache: Arc<ExistenceCache>, exclusive: Arc<ExclusiveInit>) -> Self {
        Self {
            client: reqwest::Client::new(),
            cache,
            exclusive,
        }
    }

    /// Ensure the source identified by `url` exists at `dest`.
    ///
    /// Returns `Ok(true)` when this call materialized the file, `Ok(false)`
    /// when it was already present. Concurrent callers for the same URL await
    /// the single in-flight download instead of duplicating it.
    pub async fn ensure_source(&self, url: &str, dest: &Path) -> Result<bool, OptimizeError> {
        if self.cache.exists(dest) {
            return Ok(false);
        }

        let key = format!("download {}", url);
        self.exclusive
            .run(&key, || self.materialize(url, dest))
            .await
    }

    async fn materialize(&self, url: &str, dest: &Path) -> Result<(), OptimizeError> {
        // re-check under the ticket: a racing caller may have finished first
        if self.cache.exists(dest) {
            return Ok(());
        }

        self.cache.ensure_parent_dir(dest)?;

        let reference = ImageReference::parse(url);
        if !reference.is_remote() {
            let local = Path::new(url);
            if !local.exists() {
                return Err(OptimizeError::MissingSource(local.to_path_buf()));
            }
            debug!("Copying local source {} to {}", url, dest.display());
            tokio::fs::copy(local, dest).await?;
            self.cache.mark_created(dest);
            return Ok(());
        }

        info!("Downloading {} to {}", url, dest.display());

        let mut response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(OptimizeError::Download {
                url: url.to_string(),
                status: response.status(),
            });
        }

        let parent = dest.parent().unwrap_or_else(|| Path::new("."));
        let mut tmp = NamedTempFile::new_in(parent)?;
        while let Some(chunk) = response.chunk().await? {
            tmp.as_file_mut().write_all(&chunk)?;
        }
        tmp.as_file_mut().flush()?;
        tmp.persist(dest).map_err(|e| OptimizeError::Io(e.error))?;

        self.cache.mark_created(dest);
        Ok(())
    }

    /// Fetch a remote SVG and inline it as a base64 data URI.
    ///
    /// Non-SVG sources pass through unchanged.
    pub async fn fetch_svg_data_uri(&self, source_url: &str) -> Result<String, OptimizeError> {
        if !source_url.to_lowercase().ends_with(".svg") {
            return Ok(source_url.to_string());
        }

        let response = self.client.get(source_url).send().await?;
        if !response.status().is_success() {
            return Err(OptimizeError::Download {
                url: source_url.to_string(),
                status: response.status(),
            });
        }

        let bytes = response.bytes().await?;
        Ok(format!(
            "data:image/svg+xml;base64,{}",
            BASE64.encode(&bytes)
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;

    fn fetcher() -> SourceFetcher {
        SourceFetcher::new(
            Arc::new(ExistenceCache::new()),
            Arc::new(ExclusiveInit::new(Duration::from_secs(5))),
        )
    }

    /// Minimal one-response-per-connection HTTP server for download tests
    fn spawn_test_server(
        status_line: &'static str,
        body: &'static [u8],
        hits: Arc<AtomicUsize>,
    ) -> String {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        std::thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(mut stream) = stream else { break };
                hits.fetch_add(1, Ordering::SeqCst);

                let mut request = [0u8; 1024];
                let _ = stream.read(&mut request);

                let header = format!(
                    "{}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    status_line,
                    body.len()
                );
                let _ = std::io::Write::write_all(&mut stream, header.as_bytes());
                let _ = std::io::Write::write_all(&mut stream, body);
            }
        });

        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_ensure_source_copies_local_file() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("a.png");
        let dest = temp_dir.path().join("cache/a.png");
        std::fs::write(&source, b"png bytes").unwrap();

        let fetcher = fetcher();
        let created = fetcher
            .ensure_source(source.to_str().unwrap(), &dest)
            .await
            .unwrap();

        assert!(created);
        assert_eq!(std::fs::read(&dest).unwrap(), b"png bytes");

        // second call is a cached no-op
        let created_again = fetcher
            .ensure_source(source.to_str().unwrap(), &dest)
            .await
            .unwrap();
        assert!(!created_again);
    }

    #[tokio::test]
    async fn test_ensure_source_missing_local_fails() {
        let temp_dir = TempDir::new().unwrap();
        let dest = temp_dir.path().join("cache/a.png");

        let result = fetcher().ensure_source("does/not/exist.png", &dest).await;
        assert!(matches!(result, Err(OptimizeError::MissingSource(_))));
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn test_concurrent_downloads_fetch_once() {
        let hits = Arc::new(AtomicUsize::new(0));
        let base = spawn_test_server("HTTP/1.1 200 OK", b"remote image", hits.clone());
        let url = format!("{}/a.png", base);

        let temp_dir = TempDir::new().unwrap();
        let dest = temp_dir.path().join("a.png");

        let fetcher = Arc::new(fetcher());
        let mut handles = Vec::new();
        for _ in 0..4 {
            let fetcher = fetcher.clone();
            let url = url.clone();
            let dest = dest.clone();
            handles.push(tokio::spawn(async move {
                fetcher.ensure_source(&url, &dest).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(std::fs::read(&dest).unwrap(), b"remote image");
    }

    #[tokio::test]
    async fn test_download_failure_on_error_status() {
        let hits = Arc::new(AtomicUsize::new(0));
        let base = spawn_test_server("HTTP/1.1 404 Not Found", b"", hits.clone());
        let url = format!("{}/missing.png", base);

        let temp_dir = TempDir::new().unwrap();
        let dest = temp_dir.path().join("missing.png");

        let result = fetcher().ensure_source(&url, &dest).await;
        assert!(matches!(result, Err(OptimizeError::Download { .. })));
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn test_fetch_svg_data_uri() {
        let hits = Arc::new(AtomicUsize::new(0));
        let base = spawn_test_server("HTTP/1.1 200 OK", b"<svg/>", hits.clone());

        let fetcher = fetcher();
        let uri = fetcher
            .fetch_svg_data_uri(&format!("{}/icon.svg", base))
            .await
            .unwrap();
        assert_eq!(uri, format!("data:image/svg+xml;base64,{}", BASE64.encode(b"<svg/>")));

        // non-svg sources pass through untouched
        let passthrough = fetcher
            .fetch_svg_data_uri("https://example.com/a.png")
            .await
            .unwrap();
        assert_eq!(passthrough, "https://example.com/a.png");
    }
}
