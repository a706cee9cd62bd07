//! # Batch Converter
//!
//! Orchestratore di un singolo run: una configurazione, una directory sorgente,
//! una directory di output.
//!
//! ## Responsabilità:
//! - Validare la configurazione prima di toccare il filesystem
//! - Scoprire i file sorgente (errore fatale se la directory non è leggibile)
//! - Costruire la lista ordinata di `ConvertTask`
//! - Eseguire i task con `TaskScheduler` (o in modalità sequenziale)
//! - Accumulare gli outcome in `RunningTotals` nel contesto coordinatore
//! - Produrre il `Summary` finale e inoltrarlo al reporter
//!
//! ## Flusso:
//! 1. `RunConfig::validate`
//! 2. `FileManager::find_image_files`
//! 3. Nessun file → riepilogo vuoto
//! 4. Scheduling + report per ogni completamento
//! 5. Riepilogo

use crate::{
    aggregator::{RunningTotals, Summary},
    config::RunConfig,
    encoder::{Encoder, JpegEncoder},
    error::{ConvertError, Result},
    file_manager::FileManager,
    progress::{OutputMode, ProgressReporter},
    scheduler::{self, TaskScheduler},
    task::ConvertTask,
    worker::ImageTaskRunner,
};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Runs one configuration end to end
pub struct BatchConverter<E: Encoder + 'static = JpegEncoder> {
    config: RunConfig,
    runner: Arc<ImageTaskRunner<E>>,
    mode: OutputMode,
    sequential: bool,
}

impl BatchConverter<JpegEncoder> {
    pub fn new(config: RunConfig, mode: OutputMode) -> Result<Self> {
        Self::with_encoder(config, JpegEncoder, mode)
    }
}

impl<E: Encoder + 'static> BatchConverter<E> {
    pub fn with_encoder(config: RunConfig, encoder: E, mode: OutputMode) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            config,
            runner: Arc::new(ImageTaskRunner::new(encoder)),
            mode,
            sequential: false,
        })
    }

    /// Process one file at a time, in discovery order
    pub fn sequential(mut self, sequential: bool) -> Self {
        self.sequential = sequential;
        self
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Ordered task list, one per discovered file
    pub fn build_tasks(&self, files: &[PathBuf]) -> Result<Vec<ConvertTask>> {
        let extension = self.runner.extension();

        let tasks = files
            .iter()
            .enumerate()
            .map(|(index, input)| {
                let output = FileManager::output_path_for(
                    input,
                    &self.config.source_dir,
                    &self.config.output_dir,
                    extension,
                )?;
                Ok(ConvertTask {
                    index,
                    input: input.clone(),
                    output,
                    settings: self.config.settings,
                    policy: self.config.policy,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        for (output, first, second) in colliding_outputs(&tasks) {
            warn!(
                "{} and {} both convert to {}: the last one to finish wins",
                first.display(),
                second.display(),
                output.display()
            );
        }

        Ok(tasks)
    }

    /// Convert every image under the source directory
    pub async fn run(&self) -> Result<Summary> {
        let start_time = Instant::now();

        let files =
            FileManager::find_image_files(&self.config.source_dir, &self.config.extensions)?;
        let reporter = ProgressReporter::new(&self.config.name, files.len() as u64, self.mode);

        if files.is_empty() {
            warn!("No image files found in {}", self.config.source_dir.display());
            let summary = RunningTotals::new().summarize(start_time.elapsed());
            reporter.finish(&summary);
            return Ok(summary);
        }

        reporter.start(&self.config, files.len());
        info!("Output directory: {}", self.config.output_dir.display());

        let tasks = self.build_tasks(&files)?;

        let totals = if self.sequential {
            self.run_sequential(tasks, reporter.clone()).await?
        } else {
            self.run_concurrent(tasks, &reporter).await?
        };

        let summary = totals.summarize(start_time.elapsed());
        reporter.finish(&summary);

        Ok(summary)
    }

    async fn run_concurrent(
        &self,
        tasks: Vec<ConvertTask>,
        reporter: &ProgressReporter,
    ) -> Result<RunningTotals> {
        let scheduler = TaskScheduler::new(self.config.concurrency)?;
        info!("Using {} parallel workers", scheduler.concurrency());

        let mut totals = RunningTotals::new();
        let report = scheduler
            .run(tasks, self.runner.clone(), |completion| {
                totals.fold(&completion.outcome);
                reporter.report(&completion);
            })
            .await;

        debug!(
            "Scheduler finished {} tasks, peak in flight {}",
            report.total, report.peak_in_flight
        );
        Ok(totals)
    }

    async fn run_sequential(
        &self,
        tasks: Vec<ConvertTask>,
        reporter: ProgressReporter,
    ) -> Result<RunningTotals> {
        info!("Sequential mode: processing one file at a time");

        let runner = self.runner.clone();
        let handle = tokio::task::spawn_blocking(move || {
            let mut totals = RunningTotals::new();
            scheduler::run_sequential(&tasks, runner.as_ref(), |completion| {
                totals.fold(&completion.outcome);
                reporter.report(&completion);
            });
            totals
        });

        handle
            .await
            .map_err(|e| ConvertError::WorkerCrashed(format!("sequential driver: {}", e)))
    }
}

/// Tasks writing the same output path, as `(output, first input, later input)`
pub fn colliding_outputs(tasks: &[ConvertTask]) -> Vec<(&Path, &Path, &Path)> {
    let mut seen: HashMap<&Path, &Path> = HashMap::new();

    tasks
        .iter()
        .filter_map(|task| match seen.entry(task.output.as_path()) {
            Entry::Occupied(first) => {
                Some((task.output.as_path(), *first.get(), task.input.as_path()))
            }
            Entry::Vacant(slot) => {
                slot.insert(task.input.as_path());
                None
            }
        })
        .collect()
}
