//! # Exclusivity Ticket Module
//!
//! Questo modulo garantisce al massimo una esecuzione in-flight per chiave
//! di operazione (es. `download <url>`, `resize <src> to <dst>`).
//!
//! ## Responsabilità:
//! - Una sola esecuzione del lavoro per chiave, anche sotto chiamate concorrenti
//! - Le chiavi già completate ritornano immediatamente senza rieseguire
//! - I chiamanti in attesa bloccano sul mutex per-chiave invece di fare polling
//! - L'attesa è limitata da un timeout configurabile
//!
//! ## Semantica dei fallimenti:
//! Il flag di completamento viene impostato solo quando il lavoro riesce.
//! Un chiamante in attesa il cui holder è fallito riesegue il lavoro da sé;
//! l'output non è mai stato creato, quindi il retry è sicuro e idempotente.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::debug;

use crate::error::OptimizeError;

/// Per-key at-most-once execution for pipeline operations
#[derive(Debug)]
pub struct ExclusiveInit {
    timeout: Duration,
    slots: StdMutex<HashMap<String, Arc<Mutex<bool>>>>,
}

impl ExclusiveInit {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            slots: StdMutex::new(HashMap::new()),
        }
    }

    /// Run `work` at most once for `key`.
    ///
    /// Returns `Ok(true)` when this call executed the work, `Ok(false)` when a
    /// previous call already completed it. Waits for an in-flight execution of
    /// the same key up to the configured timeout, then fails with
    /// [`OptimizeError::LockTimeout`].
    pub async fn run<F, Fut>(&self, key: &str, work: F) -> Result<bool, OptimizeError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(), OptimizeError>>,
    {
        let slot = {
            let mut slots = self.slots.lock().expect("ticket table poisoned");
            slots.entry(key.to_string()).or_default().clone()
        };

        let mut completed = tokio::time::timeout(self.timeout, slot.lock())
            .await
            .map_err(|_| OptimizeError::LockTimeout(key.to_string()))?;

        if *completed {
            return Ok(false);
        }

        debug!("Initializing {} ...", key);
        work().await?;
        *completed = true;
        debug!("Initialized {}.", key);

        Ok(true)
    }
}
