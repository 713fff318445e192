//! Output sinks receiving per-target outcomes.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::FetchError;
use crate::outcome::ScrapeOutcome;

/// Receives one outcome per target, in input order.
///
/// The orchestrator never writes files or databases itself; persistence
/// belongs to sinks.
#[async_trait]
pub trait OutcomeSink: Send + Sync {
    /// Accepts the outcome for the target at `index`.
    async fn accept(&self, index: usize, outcome: &ScrapeOutcome) -> Result<(), FetchError>;

    /// Called once after the last outcome.
    async fn finish(&self) -> Result<(), FetchError> {
        Ok(())
    }
}

/// Keeps every outcome in memory.
#[derive(Debug, Default)]
pub struct CollectingSink {
    outcomes: Mutex<Vec<(usize, ScrapeOutcome)>>,
}

impl CollectingSink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes the collected outcomes.
    pub fn take(&self) -> Vec<(usize, ScrapeOutcome)> {
        let mut outcomes = self
            .outcomes
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        std::mem::take(&mut *outcomes)
    }
}

#[async_trait]
impl OutcomeSink for CollectingSink {
    async fn accept(&self, index: usize, outcome: &ScrapeOutcome) -> Result<(), FetchError> {
        self.outcomes
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push((index, outcome.clone()));
        Ok(())
    }
}
