pub mod dns;
pub mod http;

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tokio::time::sleep;

// the Outcome enum classifies every completed probe
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Hit,
    Miss,
    Error,
}

// the ProbeResult struct which carries one classified probe
// through the result channel and into the aggregator
#[derive(Clone, Debug, Serialize)]
pub struct ProbeResult {
    pub word: String,
    pub target: String,
    pub outcome: Outcome,
    pub status: Option<u16>,
    pub addrs: Vec<String>,
    pub error: Option<String>,
    pub depth: usize,
}

/// Classification of a single successful network attempt.
#[derive(Clone, Debug)]
pub enum Verdict {
    Hit {
        status: Option<u16>,
        addrs: Vec<String>,
    },
    Miss {
        status: Option<u16>,
    },
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("resolution failed: {0}")]
    Resolve(String),

    #[error("probe timed out")]
    Timeout,
}

#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    /// Total attempts per probe, at least 1.
    pub attempts: u32,
    /// Base delay, grows linearly with each failed attempt.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: Duration::from_millis(250),
        }
    }
}

/// One probe implementation per scan mode. Implementations hold their own
/// client/resolver and perform exactly one network operation per `attempt`.
#[async_trait]
pub trait Prober: Send + Sync {
    /// Joins the round prefix and a wordlist entry into the string that is
    /// probed on the wire.
    fn full_target(&self, prefix: &str, word: &str) -> String;

    /// A single network attempt against an already-joined target.
    async fn attempt(&self, target: &str) -> Result<Verdict, TransportError>;
}

/// Probes one candidate, retrying transport failures with linearly
/// increasing backoff until the policy is exhausted. A MISS is a valid
/// classification and is never retried.
pub async fn probe(
    prober: &dyn Prober,
    prefix: &str,
    word: &str,
    depth: usize,
    retry: RetryPolicy,
) -> ProbeResult {
    let target = prober.full_target(prefix, word);
    let mut last_err = String::new();
    for attempt in 0..retry.attempts.max(1) {
        if attempt > 0 {
            sleep(retry.backoff * attempt).await;
        }
        match prober.attempt(&target).await {
            Ok(Verdict::Hit { status, addrs }) => {
                return ProbeResult {
                    word: word.to_string(),
                    target,
                    outcome: Outcome::Hit,
                    status,
                    addrs,
                    error: None,
                    depth,
                };
            }
            Ok(Verdict::Miss { status }) => {
                return ProbeResult {
                    word: word.to_string(),
                    target,
                    outcome: Outcome::Miss,
                    status,
                    addrs: Vec::new(),
                    error: None,
                    depth,
                };
            }
            Err(e) => last_err = e.to_string(),
        }
    }
    ProbeResult {
        word: word.to_string(),
        target,
        outcome: Outcome::Error,
        status: None,
        addrs: Vec::new(),
        error: Some(last_err),
        depth,
    }
}
