//! # Task and Outcome Types
//!
//! ## Strutture dati:
//! - `ConvertTask`: un file di input, la sua destinazione e uno snapshot dei settings
//! - `EncodeOutcome`: risultato immutabile (successo o errore) prodotto da un'unità di esecuzione
//!
//! Ogni task possiede la propria copia di `Settings` e `SearchPolicy` (entrambi `Copy`):
//! nessuna configurazione mutabile viene condivisa tra worker.

use crate::config::{SearchPolicy, Settings};
use serde::ser::{SerializeStruct, Serializer};
use serde::Serialize;
use std::path::PathBuf;

/// One file to convert
#[derive(Debug, Clone, PartialEq)]
pub struct ConvertTask {
    /// Position in the ordered task list (0-based)
    pub index: usize,
    pub input: PathBuf,
    pub output: PathBuf,
    pub settings: Settings,
    pub policy: SearchPolicy,
}

/// Successful conversion of one file. Serializes with its `compression_ratio`.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeSuccess {
    pub input: PathBuf,
    pub output: PathBuf,
    pub original_size: u64,
    pub encoded_size: u64,
    pub quality: u8,
    pub encode_calls: u32,
}

impl EncodeSuccess {
    /// `original / encoded`; 0 when nothing was written
    pub fn compression_ratio(&self) -> f64 {
        if self.encoded_size == 0 {
            0.0
        } else {
            self.original_size as f64 / self.encoded_size as f64
        }
    }
}

impl Serialize for EncodeSuccess {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("EncodeSuccess", 7)?;
        state.serialize_field("input", &self.input)?;
        state.serialize_field("output", &self.output)?;
        state.serialize_field("original_size", &self.original_size)?;
        state.serialize_field("encoded_size", &self.encoded_size)?;
        state.serialize_field("quality", &self.quality)?;
        state.serialize_field("encode_calls", &self.encode_calls)?;
        state.serialize_field("compression_ratio", &self.compression_ratio())?;
        state.end()
    }
}

/// Failed conversion of one file
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EncodeFailure {
    pub input: PathBuf,
    pub error: String,
}

/// Tagged result of one task. Created once per completion, consumed once.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EncodeOutcome {
    Success(EncodeSuccess),
    Failure(EncodeFailure),
}

impl EncodeOutcome {
    pub fn failure(input: impl Into<PathBuf>, error: impl ToString) -> Self {
        Self::Failure(EncodeFailure {
            input: input.into(),
            error: error.to_string(),
        })
    }

    pub fn input(&self) -> &std::path::Path {
        match self {
            Self::Success(s) => &s.input,
            Self::Failure(f) => &f.input,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}
