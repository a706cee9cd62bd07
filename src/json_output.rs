//! # JSON Output Module
//!
//! Output strutturato in JSON (una riga per messaggio su stdout) per uso programmatico.
//!
//! ## Tipi di messaggi:
//! - `start`: Inizio di un run (configurazione, numero di file)
//! - `file_complete`: Fine elaborazione di un file (successo o errore)
//! - `complete`: Fine run con il riepilogo finale
//! - `error`: Errore fatale per un run

use crate::aggregator::Summary;
use crate::config::RunConfig;
use crate::task::EncodeOutcome;
use serde::Serialize;
use std::path::PathBuf;

/// Tipo di messaggio JSON
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JsonMessage {
    /// Inizio di un run
    Start {
        config: String,
        input_dir: PathBuf,
        output_dir: PathBuf,
        total_files: usize,
        quality: u8,
        min_quality: u8,
        target_size_kb: Option<f64>,
        concurrency: usize,
    },

    /// Fine elaborazione di un file specifico
    FileComplete {
        position: usize,
        total: usize,
        #[serde(flatten)]
        outcome: EncodeOutcome,
    },

    /// Run completato
    Complete {
        config: String,
        #[serde(flatten)]
        summary: Summary,
    },

    /// Errore fatale per il run
    Error { config: String, message: String },
}

impl JsonMessage {
    /// Emette il messaggio JSON su stdout
    pub fn emit(&self) {
        if let Ok(json) = serde_json::to_string(self) {
            println!("{}", json);
        }
    }

    pub fn start(config: &RunConfig, total_files: usize) -> Self {
        Self::Start {
            config: config.name.clone(),
            input_dir: config.source_dir.clone(),
            output_dir: config.output_dir.clone(),
            total_files,
            quality: config.settings.quality,
            min_quality: config.settings.min_quality,
            target_size_kb: config.settings.target_size_kb,
            concurrency: config.concurrency,
        }
    }

    pub fn file_complete(position: usize, total: usize, outcome: EncodeOutcome) -> Self {
        Self::FileComplete {
            position,
            total,
            outcome,
        }
    }

    pub fn complete(config: &str, summary: Summary) -> Self {
        Self::Complete {
            config: config.to_string(),
            summary,
        }
    }

    pub fn error(config: &str, message: String) -> Self {
        Self::Error {
            config: config.to_string(),
            message,
        }
    }
}
