//! # Task Worker Module
//!
//! Unità di esecuzione per singoli file.
//! Ogni task viene eseguito dall'inizio alla fine: decode → resize opzionale →
//! ricerca qualità → scrittura, e produce un `EncodeOutcome` immutabile.
//!
//! ## Isolamento:
//! - Nessuno stato mutabile condiviso tra worker
//! - Ogni errore (decode, encode, write) viene convertito in `EncodeOutcome::Failure`
//! - Il codice è sincrono: lo scheduler lo esegue su `spawn_blocking`

use crate::{
    encoder::{self, Encoder},
    error::{ConvertError, Result},
    file_manager::FileManager,
    quality_search,
    resize,
    task::{ConvertTask, EncodeOutcome, EncodeSuccess},
};
use tracing::debug;

/// Runs one task to completion. Implementations must never panic on bad input;
/// a panic is still contained by the scheduler and counted as a failure.
pub trait TaskRunner: Send + Sync + 'static {
    fn run(&self, task: &ConvertTask) -> EncodeOutcome;
}

/// Decode, resize, search and write a real image file
pub struct ImageTaskRunner<E> {
    encoder: E,
}

impl<E: Encoder + 'static> ImageTaskRunner<E> {
    pub fn new(encoder: E) -> Self {
        Self { encoder }
    }

    /// Extension of the files this runner writes
    pub fn extension(&self) -> &'static str {
        self.encoder.extension()
    }

    fn convert(&self, task: &ConvertTask) -> Result<EncodeSuccess> {
        debug!("Starting conversion: {}", task.input.display());

        let original_size = FileManager::file_size(&task.input)?;

        let image = encoder::decode(&task.input)?;
        let image = if task.settings.resize.enabled {
            resize::apply(image, &task.settings.resize)
        } else {
            image
        };
        let image = self.encoder.prepare(image);

        let result = quality_search::search(&self.encoder, &image, &task.settings, &task.policy)?;
        debug!(
            "Search done for {}: q={} after {} encodes",
            task.input.display(),
            result.quality,
            result.encode_calls
        );

        FileManager::ensure_parent_dirs(&task.output)?;
        std::fs::write(&task.output, &result.bytes).map_err(|e| {
            ConvertError::Write(format!("{}: {}", task.output.display(), e))
        })?;

        let encoded_size = FileManager::file_size(&task.output)?;

        Ok(EncodeSuccess {
            input: task.input.clone(),
            output: task.output.clone(),
            original_size,
            encoded_size,
            quality: result.quality,
            encode_calls: result.encode_calls,
        })
    }
}

impl<E: Encoder + 'static> TaskRunner for ImageTaskRunner<E> {
    fn run(&self, task: &ConvertTask) -> EncodeOutcome {
        match self.convert(task) {
            Ok(success) => EncodeOutcome::Success(success),
            Err(e) => EncodeOutcome::failure(&task.input, e),
        }
    }
}
