//! # Progress Reporting Module
//!
//! Questo modulo gestisce il reporting dei risultati per ogni file e del riepilogo finale.
//!
//! ## Responsabilità:
//! - Progress bar visuale con `indicatif` per feedback real-time
//! - Una riga di log per ogni task completato (successo o errore)
//! - Riepilogo finale con dimensioni, spazio risparmiato e tempo
//! - Modalità JSON alternativa per consumatori programmatici
//!
//! ## Formato righe:
//! ```text
//! [3/10] Converted: photos/a.png (812.40 KB → 198.11 KB, Quality: 72, Ratio: 4.10x)
//! [4/10] Error converting photos/b.png: Decode error: ...
//! ```

use crate::aggregator::Summary;
use crate::config::RunConfig;
use crate::file_manager::FileManager;
use crate::json_output::JsonMessage;
use crate::scheduler::Completion;
use crate::task::EncodeOutcome;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tracing::{error, info};

/// Dove vanno i report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// Log leggibili + progress bar
    #[default]
    Human,
    /// Log leggibili, nessuna progress bar
    Plain,
    /// Una riga JSON per evento su stdout
    Json,
}

/// Reporting sink for one run
#[derive(Clone)]
pub struct ProgressReporter {
    bar: ProgressBar,
    mode: OutputMode,
    config_name: String,
}

impl ProgressReporter {
    pub fn new(config_name: &str, total_files: u64, mode: OutputMode) -> Self {
        let bar = match mode {
            OutputMode::Human => {
                let bar = ProgressBar::new(total_files);
                // Static template, cannot fail
                if let Ok(style) = ProgressStyle::default_bar().template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}",
                ) {
                    bar.set_style(style.progress_chars("=>-"));
                }
                bar.enable_steady_tick(Duration::from_millis(100));
                bar
            }
            OutputMode::Plain | OutputMode::Json => ProgressBar::hidden(),
        };

        Self {
            bar,
            mode,
            config_name: config_name.to_string(),
        }
    }

    pub fn start(&self, config: &RunConfig, total_files: usize) {
        match self.mode {
            OutputMode::Json => JsonMessage::start(config, total_files).emit(),
            _ => {
                info!("Starting conversion '{}' in: {}", config.name, config.source_dir.display());
                if let Some(ref description) = config.description {
                    info!("Description: {}", description);
                }
                info!("Found {} image files to convert", total_files);
            }
        }
    }

    /// One line per completed task
    pub fn report(&self, completion: &Completion) {
        self.bar.inc(1);

        match self.mode {
            OutputMode::Json => {
                let outcome = completion.outcome.clone();
                JsonMessage::file_complete(completion.position, completion.total, outcome).emit();
            }
            _ => {
                let line = format_completion(completion);
                self.bar.suspend(|| match completion.outcome {
                    EncodeOutcome::Success(_) => info!("{}", line),
                    EncodeOutcome::Failure(_) => error!("{}", line),
                });
                if let Some(name) = completion.outcome.input().file_name() {
                    self.bar.set_message(name.to_string_lossy().into_owned());
                }
            }
        }
    }

    pub fn finish(&self, summary: &Summary) {
        match self.mode {
            OutputMode::Json => JsonMessage::complete(&self.config_name, summary.clone()).emit(),
            _ => {
                self.bar.finish_with_message(summary.format_summary());
                for line in format_summary_lines(summary) {
                    info!("{}", line);
                }
            }
        }
    }
}

fn kb(bytes: u64) -> f64 {
    bytes as f64 / 1024.0
}

/// Human-readable line for one completed task
pub fn format_completion(completion: &Completion) -> String {
    let prefix = format!("[{}/{}]", completion.position, completion.total);

    match &completion.outcome {
        EncodeOutcome::Success(success) => format!(
            "{} Converted: {} ({:.2} KB → {:.2} KB, Quality: {}, Ratio: {:.2}x)",
            prefix,
            success.input.display(),
            kb(success.original_size),
            kb(success.encoded_size),
            success.quality,
            success.compression_ratio()
        ),
        EncodeOutcome::Failure(failure) => format!(
            "{} Error converting {}: {}",
            prefix,
            failure.input.display(),
            failure.error
        ),
    }
}

/// Final summary block
pub fn format_summary_lines(summary: &Summary) -> Vec<String> {
    vec![
        "=== Conversion Complete ===".to_string(),
        format!("Successfully converted: {} files", summary.succeeded),
        format!("Failed to convert: {} files", summary.failed),
        format!(
            "Total original size: {}",
            FileManager::format_size(summary.total_original_bytes)
        ),
        format!("Total new size: {}", FileManager::format_size(summary.total_encoded_bytes)),
        format!(
            "Space saved: {} ({:.2}%)",
            FileManager::format_size(summary.saved_bytes),
            summary.percent_saved
        ),
        format!("Time taken: {:.2} seconds", summary.elapsed_seconds),
    ]
}
