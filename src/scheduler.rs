//! # Task Scheduler Module
//!
//! Scheduler a finestra scorrevole: mantiene esattamente N task in esecuzione e
//! ne avvia uno nuovo appena uno termina, finché la lista non è esaurita.
//!
//! ## Politica di dispatch:
//! - All'avvio: `min(N, L)` task, nell'ordine della lista
//! - Ad ogni completamento (successo o errore): callback `on_complete`, poi dispatch
//!   del prossimo task non ancora avviato (cursore monotono, FIFO)
//! - Terminazione: `completions == L`, unica condizione
//!
//! ## Concorrenza:
//! - Ogni task gira su `tokio::task::spawn_blocking` (decode/encode sono CPU-bound)
//! - I completamenti arrivano tramite `FuturesUnordered`, letti solo dal coordinatore
//! - `SchedulerState` e i totali sono mutati solo dal coordinatore: nessun lock
//!
//! ## Isolamento errori:
//! - Un errore del task è già un `EncodeOutcome::Failure`
//! - Un panic dell'unità di esecuzione (`JoinError`) diventa un `Failure` per quel file
//! - In entrambi i casi il run continua e lo slot viene riassegnato
//!
//! ## Limiti noti:
//! Nessun timeout: un task che non termina occupa il suo slot per tutto il run.

use crate::error::{ConvertError, Result};
use crate::task::{ConvertTask, EncodeOutcome};
use crate::worker::TaskRunner;
use futures::stream::{FuturesUnordered, StreamExt};
use std::any::Any;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tokio::task::JoinError;
use tracing::{debug, error};

/// One task delivered back to the coordinator
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    /// 1-based completion sequence number
    pub position: usize,
    pub total: usize,
    /// Index of the task in the original list
    pub task_index: usize,
    pub outcome: EncodeOutcome,
}

/// Bookkeeping for the sliding window.
///
/// Invariants: `in_flight <= concurrency` and `cursor == completions + in_flight`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerState {
    total: usize,
    concurrency: usize,
    cursor: usize,
    completions: usize,
    in_flight: usize,
}

impl SchedulerState {
    pub fn new(total: usize, concurrency: usize) -> Self {
        Self {
            total,
            concurrency,
            cursor: 0,
            completions: 0,
            in_flight: 0,
        }
    }

    pub fn can_dispatch(&self) -> bool {
        self.cursor < self.total && self.in_flight < self.concurrency
    }

    /// Claim the next task index
    pub fn dispatch(&mut self) -> usize {
        debug_assert!(self.can_dispatch());
        let index = self.cursor;
        self.cursor += 1;
        self.in_flight += 1;
        self.check_invariants();
        index
    }

    /// Record a completion, returning its 1-based position
    pub fn complete(&mut self) -> usize {
        debug_assert!(self.in_flight > 0);
        self.in_flight -= 1;
        self.completions += 1;
        self.check_invariants();
        self.completions
    }

    pub fn is_done(&self) -> bool {
        self.completions == self.total
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn dispatched(&self) -> usize {
        self.cursor
    }

    pub fn completions(&self) -> usize {
        self.completions
    }

    fn check_invariants(&self) {
        debug_assert!(self.in_flight <= self.concurrency);
        debug_assert_eq!(self.cursor, self.completions + self.in_flight);
        debug_assert!(self.cursor <= self.total);
    }
}

/// What a finished run looked like from the scheduler's side
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerReport {
    pub total: usize,
    pub peak_in_flight: usize,
}

/// Sliding-window dispatcher over an ordered task list
#[derive(Debug, Clone, Copy)]
pub struct TaskScheduler {
    concurrency: usize,
}

impl TaskScheduler {
    pub fn new(concurrency: usize) -> Result<Self> {
        if concurrency == 0 {
            return Err(ConvertError::InvalidSettings(
                "concurrency must be greater than 0".to_string(),
            ));
        }
        Ok(Self { concurrency })
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Run every task, keeping at most `concurrency` in flight.
    ///
    /// `on_complete` is called exactly once per task, in completion order,
    /// always from the calling context.
    pub async fn run<R, F>(
        &self,
        tasks: Vec<ConvertTask>,
        runner: Arc<R>,
        mut on_complete: F,
    ) -> SchedulerReport
    where
        R: TaskRunner,
        F: FnMut(Completion),
    {
        let total = tasks.len();
        let mut state = SchedulerState::new(total, self.concurrency);
        let mut in_flight = FuturesUnordered::new();
        let mut peak_in_flight = 0;

        debug!("Scheduling {} tasks with {} workers", total, self.concurrency);

        loop {
            while state.can_dispatch() {
                let index = state.dispatch();
                in_flight.push(Self::spawn_unit(index, tasks[index].clone(), runner.clone()));
                peak_in_flight = peak_in_flight.max(state.in_flight());
            }

            if state.is_done() {
                break;
            }

            let Some((task_index, outcome)) = in_flight.next().await else {
                // Unreachable while the invariants hold: not done implies in flight > 0
                error!(
                    "Scheduler stalled with {} of {} tasks completed",
                    state.completions(),
                    total
                );
                break;
            };

            let position = state.complete();
            on_complete(Completion {
                position,
                total,
                task_index,
                outcome,
            });
        }

        SchedulerReport {
            total,
            peak_in_flight,
        }
    }

    /// Start one execution unit on the blocking pool
    fn spawn_unit<R: TaskRunner>(
        index: usize,
        task: ConvertTask,
        runner: Arc<R>,
    ) -> impl Future<Output = (usize, EncodeOutcome)> {
        let input = task.input.clone();
        let handle = tokio::task::spawn_blocking(move || runner.run(&task));

        async move {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(join_error) => {
                    let reason = describe_join_error(join_error);
                    debug!("Worker for {} terminated abnormally: {}", input.display(), reason);
                    EncodeOutcome::failure(input, ConvertError::WorkerCrashed(reason))
                }
            };
            (index, outcome)
        }
    }
}

/// Single-item driver: same callback contract, one task at a time, in list order.
/// A panicking runner is contained and reported as that task's failure.
pub fn run_sequential<R, F>(
    tasks: &[ConvertTask],
    runner: &R,
    mut on_complete: F,
) -> SchedulerReport
where
    R: TaskRunner + ?Sized,
    F: FnMut(Completion),
{
    let total = tasks.len();
    let mut state = SchedulerState::new(total, 1);

    while state.can_dispatch() {
        let index = state.dispatch();
        let task = &tasks[index];

        let outcome = match panic::catch_unwind(AssertUnwindSafe(|| runner.run(task))) {
            Ok(outcome) => outcome,
            Err(payload) => {
                let reason = describe_panic(payload.as_ref());
                debug!("Worker for {} terminated abnormally: {}", task.input.display(), reason);
                EncodeOutcome::failure(&task.input, ConvertError::WorkerCrashed(reason))
            }
        };

        let position = state.complete();
        on_complete(Completion {
            position,
            total,
            task_index: index,
            outcome,
        });
    }

    SchedulerReport {
        total,
        peak_in_flight: total.min(1),
    }
}

fn describe_join_error(join_error: JoinError) -> String {
    if join_error.is_panic() {
        describe_panic(join_error.into_panic().as_ref())
    } else {
        "task was cancelled".to_string()
    }
}

fn describe_panic(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", message)
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panicked: {}", message)
    } else {
        "panicked".to_string()
    }
}
