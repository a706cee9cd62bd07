//! # Result Aggregation Module
//!
//! Accumula gli outcome dei task in totali correnti e produce il riepilogo finale.
//!
//! ## Responsabilità:
//! - `RunningTotals::fold`: integra un outcome alla volta (successo → dimensioni + contatore,
//!   errore → solo contatore errori)
//! - `RunningTotals::merge`: combinazione associativa e commutativa di due totali
//! - `RunningTotals::summarize`: calcola byte risparmiati, percentuale e tempo trascorso
//!
//! L'accumulo è indipendente dall'ordine: fold incrementale e fold in blocco producono
//! lo stesso `Summary`. I totali vengono mutati solo dal contesto coordinatore.

use crate::file_manager::FileManager;
use crate::task::EncodeOutcome;
use serde::Serialize;
use std::time::Duration;

/// Running sums over completed tasks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunningTotals {
    pub original_bytes: u64,
    pub encoded_bytes: u64,
    pub succeeded: usize,
    pub failed: usize,
}

impl RunningTotals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fold(&mut self, outcome: &EncodeOutcome) {
        match outcome {
            EncodeOutcome::Success(success) => {
                self.succeeded += 1;
                self.original_bytes += success.original_size;
                self.encoded_bytes += success.encoded_size;
            }
            EncodeOutcome::Failure(_) => {
                self.failed += 1;
            }
        }
    }

    pub fn merge(self, other: Self) -> Self {
        Self {
            original_bytes: self.original_bytes + other.original_bytes,
            encoded_bytes: self.encoded_bytes + other.encoded_bytes,
            succeeded: self.succeeded + other.succeeded,
            failed: self.failed + other.failed,
        }
    }

    pub fn processed(&self) -> usize {
        self.succeeded + self.failed
    }

    pub fn summarize(&self, elapsed: Duration) -> Summary {
        let percent_saved = if self.original_bytes == 0 {
            0.0
        } else {
            100.0 * (1.0 - self.encoded_bytes as f64 / self.original_bytes as f64)
        };

        Summary {
            processed: self.processed(),
            succeeded: self.succeeded,
            failed: self.failed,
            total_original_bytes: self.original_bytes,
            total_encoded_bytes: self.encoded_bytes,
            saved_bytes: self.original_bytes.saturating_sub(self.encoded_bytes),
            percent_saved,
            elapsed_seconds: elapsed.as_secs_f64(),
        }
    }
}

impl<'a> FromIterator<&'a EncodeOutcome> for RunningTotals {
    fn from_iter<I: IntoIterator<Item = &'a EncodeOutcome>>(iter: I) -> Self {
        let mut totals = Self::new();
        for outcome in iter {
            totals.fold(outcome);
        }
        totals
    }
}

/// Final statistics for one run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub total_original_bytes: u64,
    pub total_encoded_bytes: u64,
    pub saved_bytes: u64,
    /// `100 * (1 - encoded / original)`, 0 when nothing was read
    pub percent_saved: f64,
    pub elapsed_seconds: f64,
}

impl Summary {
    pub fn format_summary(&self) -> String {
        format!(
            "Processed: {} files | Converted: {} | Failed: {} | {} → {} | Saved: {} ({:.2}%) | {:.2}s",
            self.processed,
            self.succeeded,
            self.failed,
            FileManager::format_size(self.total_original_bytes),
            FileManager::format_size(self.total_encoded_bytes),
            FileManager::format_size(self.saved_bytes),
            self.percent_saved,
            self.elapsed_seconds
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::EncodeSuccess;

    const KB: u64 = 1024;

    fn success(name: &str, original: u64, encoded: u64) -> EncodeOutcome {
        EncodeOutcome::Success(EncodeSuccess {
            input: name.into(),
            output: format!("{}.jpg", name).into(),
            original_size: original,
            encoded_size: encoded,
            quality: 80,
            encode_calls: 1,
        })
    }

    #[test]
    fn test_fold_success_and_failure() {
        let mut totals = RunningTotals::new();
        totals.fold(&success("a", 100, 40));
        totals.fold(&EncodeOutcome::failure("b", "bad"));

        assert_eq!(totals.succeeded, 1);
        assert_eq!(totals.failed, 1);
        assert_eq!(totals.original_bytes, 100);
        assert_eq!(totals.encoded_bytes, 40);
    }

    #[test]
    fn test_ten_files_half_size() {
        let outcomes: Vec<_> = (0..10)
            .map(|i| success(&format!("f{}", i), 100 * KB, 50 * KB))
            .collect();
        let summary = outcomes
            .iter()
            .collect::<RunningTotals>()
            .summarize(Duration::from_millis(1500));

        assert_eq!(summary.succeeded, 10);
        assert_eq!(summary.failed, 0);
        assert_eq!(summary.total_original_bytes, 1000 * KB);
        assert_eq!(summary.total_encoded_bytes, 500 * KB);
        assert_eq!(summary.saved_bytes, 500 * KB);
        assert_eq!(format!("{:.2}", summary.percent_saved), "50.00");
        assert_eq!(summary.elapsed_seconds, 1.5);
    }

    #[test]
    fn test_zero_original_is_zero_percent() {
        let summary = RunningTotals::new().summarize(Duration::ZERO);
        assert_eq!(summary.percent_saved, 0.0);

        let only_failures: RunningTotals = [EncodeOutcome::failure("x", "e")].iter().collect();
        assert_eq!(only_failures.summarize(Duration::ZERO).percent_saved, 0.0);
    }

    #[test]
    fn test_growth_does_not_underflow() {
        let summary = [success("a", 10, 30)]
            .iter()
            .collect::<RunningTotals>()
            .summarize(Duration::ZERO);

        assert_eq!(summary.saved_bytes, 0);
        assert!(summary.percent_saved < 0.0);
    }

    #[test]
    fn test_fold_is_order_independent() {
        let outcomes = vec![
            success("a", 100, 10),
            EncodeOutcome::failure("b", "x"),
            success("c", 7, 3),
            success("d", 55, 54),
            EncodeOutcome::failure("e", "y"),
        ];

        let forward: RunningTotals = outcomes.iter().collect();
        let backward: RunningTotals = outcomes.iter().rev().collect();
        let rotated: RunningTotals = outcomes[2..].iter().chain(outcomes[..2].iter()).collect();
        let interleaved: RunningTotals = [4, 0, 3, 1, 2].iter().map(|&i| &outcomes[i]).collect();

        assert_eq!(forward, backward);
        assert_eq!(forward, rotated);
        assert_eq!(forward, interleaved);
    }

    #[test]
    fn test_merge_matches_single_fold() {
        let outcomes = vec![
            success("a", 100, 10),
            EncodeOutcome::failure("b", "x"),
            success("c", 7, 3),
        ];

        let whole: RunningTotals = outcomes.iter().collect();
        let left: RunningTotals = outcomes[..1].iter().collect();
        let right: RunningTotals = outcomes[1..].iter().collect();

        assert_eq!(left.merge(right), whole);
        assert_eq!(right.merge(left), whole);
    }

    #[test]
    fn test_format_summary() {
        let summary = [success("a", 2048, 1024)]
            .iter()
            .collect::<RunningTotals>()
            .summarize(Duration::from_secs(2));

        let text = summary.format_summary();
        assert!(text.contains("Converted: 1"));
        assert!(text.contains("50.00%"));
    }
}
