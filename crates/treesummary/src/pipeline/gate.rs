//! Decides, between batches, whether a limited run moves on to the next batch.
//!
//! The scheduler asks the gate once per completed batch while files remain.
//! Interactive front ends prompt the operator; headless ones use
//! [`AlwaysContinue`] or flip a [`StopFlag`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;

/// What the gate gets to see about the batch that just finished.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    /// 1-based batch number within the run.
    pub batch: usize,
    pub summarised: usize,
    pub failed: usize,
    /// Files checkpointed for this root, including earlier runs.
    pub processed_total: usize,
    pub remaining: usize,
}

pub trait ContinuationGate: Send + Sync {
    fn should_continue(&self, report: &BatchReport) -> bool;
}

pub struct AlwaysContinue;

impl ContinuationGate for AlwaysContinue {
    fn should_continue(&self, _report: &BatchReport) -> bool {
        true
    }
}

/// Ends the run after the first batch.
pub struct StopAfterBatch;

impl ContinuationGate for StopAfterBatch {
    fn should_continue(&self, _report: &BatchReport) -> bool {
        false
    }
}

/// Continues until the shared flag is raised, e.g. from a signal handler.
#[derive(Clone, Default)]
pub struct StopFlag {
    flag: Arc<AtomicBool>,
}

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_stop(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

impl ContinuationGate for StopFlag {
    fn should_continue(&self, _report: &BatchReport) -> bool {
        !self.is_stop_requested()
    }
}

impl<F> ContinuationGate for F
where
    F: Fn(&BatchReport) -> bool + Send + Sync,
{
    fn should_continue(&self, report: &BatchReport) -> bool {
        self(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> BatchReport {
        BatchReport {
            batch: 1,
            summarised: 2,
            failed: 0,
            processed_total: 2,
            remaining: 3,
        }
    }

    #[test]
    fn test_fixed_gates() {
        assert!(AlwaysContinue.should_continue(&report()));
        assert!(!StopAfterBatch.should_continue(&report()));
    }

    #[test]
    fn test_stop_flag_shared_between_clones() {
        let gate = StopFlag::new();
        let handle = gate.clone();
        assert!(gate.should_continue(&report()));

        handle.request_stop();
        assert!(gate.is_stop_requested());
        assert!(!gate.should_continue(&report()));
    }

    #[test]
    fn test_closure_gate() {
        let gate = |r: &BatchReport| r.batch < 2;
        assert!(gate.should_continue(&report()));
        assert!(!gate.should_continue(&BatchReport { batch: 2, ..report() }));
    }
}
