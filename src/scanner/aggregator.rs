use std::sync::Mutex;

use serde::Serialize;
use thiserror::Error;

use crate::probe::{Outcome, ProbeResult};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AggregatorError {
    #[error("result recorded after finalize")]
    RecordAfterFinalize,

    #[error("finalize called twice")]
    AlreadyFinalized,
}

/// Everything the scan found, ordered by probe completion. MISS results are
/// only counted so a run against a huge wordlist does not retain the bulk.
#[derive(Clone, Debug, Default, Serialize)]
pub struct ResultSet {
    pub results: Vec<ProbeResult>,
    pub hits: usize,
    pub misses: usize,
    pub errors: usize,
}

impl ResultSet {
    pub fn hit_results(&self) -> impl Iterator<Item = &ProbeResult> {
        self.results
            .iter()
            .filter(|r| r.outcome == Outcome::Hit)
    }
}

#[derive(Debug, Default)]
struct Inner {
    results: Vec<ProbeResult>,
    hits: usize,
    misses: usize,
    errors: usize,
    finalized: bool,
}

/// Append-only collection shared by all workers across all rounds. Recording
/// after `finalize` is a contract violation and fails loudly.
#[derive(Debug, Default)]
pub struct ResultAggregator {
    inner: Mutex<Inner>,
}

impl ResultAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, result: ProbeResult) -> Result<(), AggregatorError> {
        let mut inner = self.inner.lock().expect("aggregator lock poisoned");
        if inner.finalized {
            return Err(AggregatorError::RecordAfterFinalize);
        }
        match result.outcome {
            Outcome::Hit => {
                inner.hits += 1;
                inner.results.push(result);
            }
            Outcome::Miss => inner.misses += 1,
            Outcome::Error => {
                inner.errors += 1;
                inner.results.push(result);
            }
        }
        Ok(())
    }

    pub fn finalize(&self) -> Result<ResultSet, AggregatorError> {
        let mut inner = self.inner.lock().expect("aggregator lock poisoned");
        if inner.finalized {
            return Err(AggregatorError::AlreadyFinalized);
        }
        inner.finalized = true;
        Ok(ResultSet {
            results: std::mem::take(&mut inner.results),
            hits: inner.hits,
            misses: inner.misses,
            errors: inner.errors,
        })
    }
}
