//! # Progress Tracking and Statistics Module
//!
//! Questo modulo gestisce il progress tracking della modalità warm.
//!
//! ## Responsabilità:
//! - Progress bar visual con `indicatif` per feedback real-time
//! - Tracking statistiche di pre-warming (file processati, varianti, errori)
//! - Report finale con riepilogo aggregato
//!
//! ## Visual feedback:
//! ```text
//! ⠋ [00:00:42] [====================>-------------------] 73/150 (48%) ✅ photo.jpg: 17 variants
//! ```

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Manages progress reporting for variant pre-warming
#[derive(Clone)]
pub struct ProgressManager {
    bar: ProgressBar,
}

impl ProgressManager {
    /// Create a new progress manager
    pub fn new(total_files: u64) -> Self {
        let bar = ProgressBar::new(total_files);

        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
                .unwrap()
                .progress_chars("=>-"),
        );

        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }

    /// Update progress with a message
    pub fn update(&self, message: &str) {
        self.bar.inc(1);
        self.bar.set_message(message.to_string());
    }

    /// Finish with a final message
    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }
}

/// Statistics tracker for a pre-warming run
#[derive(Debug, Default)]
pub struct WarmStats {
    pub files_processed: usize,
    pub files_warmed: usize,
    pub files_skipped: usize,
    pub variants_generated: usize,
    pub errors: usize,
}

impl WarmStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_warmed(&mut self, variants: usize) {
        self.files_processed += 1;
        self.files_warmed += 1;
        self.variants_generated += variants;
    }

    pub fn add_skipped(&mut self) {
        self.files_processed += 1;
        self.files_skipped += 1;
    }

    pub fn add_error(&mut self) {
        self.files_processed += 1;
        self.errors += 1;
    }

    pub fn format_summary(&self) -> String {
        format!(
            "Processed: {} files | Warmed: {} | Up to date: {} | Errors: {} | Variants generated: {}",
            self.files_processed,
            self.files_warmed,
            self.files_skipped,
            self.errors,
            self.variants_generated
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warm_stats_accumulate() {
        let mut stats = WarmStats::new();
        stats.add_warmed(17);
        stats.add_warmed(3);
        stats.add_skipped();
        stats.add_error();

        assert_eq!(stats.files_processed, 4);
        assert_eq!(stats.files_warmed, 2);
        assert_eq!(stats.files_skipped, 1);
        assert_eq!(stats.errors, 1);
        assert_eq!(stats.variants_generated, 20);

        let summary = stats.format_summary();
        assert!(summary.contains("Processed: 4 files"));
        assert!(summary.contains("Variants generated: 20"));
    }
}
