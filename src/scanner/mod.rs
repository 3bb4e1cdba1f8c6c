pub mod aggregator;

use std::collections::VecDeque;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use futures::stream::FuturesUnordered;
use futures::StreamExt;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task;

use crate::probe::{self, Outcome, ProbeResult, Prober, RetryPolicy};
use aggregator::{AggregatorError, ResultAggregator, ResultSet};

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// One full pass of the wordlist against a fixed prefix at a fixed depth.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Round {
    pub prefix: String,
    pub depth: usize,
}

/// Shared pull cursor handing out each wordlist entry exactly once per
/// round. Workers pull independently; memory for in-flight work stays
/// proportional to the worker count.
pub struct CandidateCursor {
    words: Arc<Vec<String>>,
    next: AtomicUsize,
}

impl CandidateCursor {
    pub fn new(words: Arc<Vec<String>>) -> Self {
        Self {
            words,
            next: AtomicUsize::new(0),
        }
    }

    pub fn next(&self) -> Option<String> {
        let i = self.next.fetch_add(1, Ordering::Relaxed);
        self.words.get(i).cloned()
    }
}

/// Cooperative cancellation shared between the signal handler, the round
/// queue, and every worker. Workers stop pulling new candidates once the
/// flag is set; in-flight probes finish or time out on their own.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("aggregator contract violated: {0}")]
    InvalidState(#[from] AggregatorError),

    #[error("worker task failed: {source}")]
    WorkerJoin {
        #[source]
        source: task::JoinError,
    },
}

#[derive(Clone, Copy, Debug)]
pub struct ScannerConfig {
    pub threads: usize,
    pub max_depth: usize,
    pub rate: u32,
    pub retry: RetryPolicy,
}

/// The enumeration engine: a FIFO queue of rounds drained one at a time,
/// each by a fixed-size worker pool pulling from a shared cursor. Hits at
/// depth d < max_depth seed a new round at d + 1, so rounds run
/// breadth-first by construction.
pub struct Scanner {
    config: ScannerConfig,
    prober: Arc<dyn Prober>,
    words: Arc<Vec<String>>,
    cancel: CancelFlag,
}

impl Scanner {
    pub fn new(
        config: ScannerConfig,
        prober: Arc<dyn Prober>,
        words: Arc<Vec<String>>,
        cancel: CancelFlag,
    ) -> Self {
        Self {
            config,
            prober,
            words,
            cancel,
        }
    }

    /// Runs the whole scan rooted at `root` and returns the finalized result
    /// set. Every completed probe is forwarded over `events` as it resolves;
    /// a dropped receiver only disables streaming, never the scan.
    pub async fn run(
        &self,
        root: &str,
        events: mpsc::Sender<ProbeResult>,
    ) -> Result<ResultSet, ScanError> {
        let aggregator = Arc::new(ResultAggregator::new());
        let limiter: Arc<DirectLimiter> = Arc::new(RateLimiter::direct(Quota::per_second(
            NonZeroU32::new(self.config.rate.max(1)).expect("rate is clamped to nonzero"),
        )));

        let mut rounds: VecDeque<Round> = VecDeque::new();
        rounds.push_back(Round {
            prefix: root.to_string(),
            depth: 0,
        });

        while let Some(round) = rounds.pop_front() {
            if self.cancel.is_cancelled() {
                break;
            }
            let hits = self
                .run_round(&round, &aggregator, &limiter, &events)
                .await?;
            if round.depth < self.config.max_depth {
                for hit in hits {
                    rounds.push_back(Round {
                        prefix: hit,
                        depth: round.depth + 1,
                    });
                }
            }
        }

        Ok(aggregator.finalize()?)
    }

    /// Drains one round: spawns `threads` workers over a fresh cursor and
    /// returns the full targets of this round's hits once all workers have
    /// drained.
    async fn run_round(
        &self,
        round: &Round,
        aggregator: &Arc<ResultAggregator>,
        limiter: &Arc<DirectLimiter>,
        events: &mpsc::Sender<ProbeResult>,
    ) -> Result<Vec<String>, ScanError> {
        let cursor = Arc::new(CandidateCursor::new(self.words.clone()));

        let mut workers = FuturesUnordered::new();
        for _ in 0..self.config.threads.max(1) {
            workers.push(task::spawn(run_worker(
                self.prober.clone(),
                cursor.clone(),
                aggregator.clone(),
                limiter.clone(),
                events.clone(),
                round.clone(),
                self.config.retry,
                self.cancel.clone(),
            )));
        }

        let mut hits = Vec::new();
        while let Some(joined) = workers.next().await {
            let worker_hits = joined.map_err(|source| ScanError::WorkerJoin { source })??;
            hits.extend(worker_hits);
        }
        Ok(hits)
    }
}

// one worker: pull, rate-limit, probe, record, repeat until the cursor is
// exhausted or the scan is cancelled
#[allow(clippy::too_many_arguments)]
async fn run_worker(
    prober: Arc<dyn Prober>,
    cursor: Arc<CandidateCursor>,
    aggregator: Arc<ResultAggregator>,
    limiter: Arc<DirectLimiter>,
    events: mpsc::Sender<ProbeResult>,
    round: Round,
    retry: RetryPolicy,
    cancel: CancelFlag,
) -> Result<Vec<String>, AggregatorError> {
    let mut hits = Vec::new();
    while let Some(word) = cursor.next() {
        if cancel.is_cancelled() {
            break;
        }
        limiter.until_ready().await;
        let result = probe::probe(prober.as_ref(), &round.prefix, &word, round.depth, retry).await;
        if result.outcome == Outcome::Hit {
            hits.push(result.target.clone());
        }
        aggregator.record(result.clone())?;
        let _ = events.send(result).await;
    }
    Ok(hits)
}
