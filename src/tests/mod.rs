use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task;

use crate::probe::{self, Outcome, ProbeResult, Prober, RetryPolicy, TransportError, Verdict};
use crate::scanner::aggregator::ResultSet;
use crate::scanner::{CancelFlag, Scanner, ScannerConfig};

/// Deterministic prober: a map of full targets to status codes, plus
/// instrumentation for call counting and the in-flight high-water mark.
#[derive(Default)]
struct MockProber {
    responses: HashMap<String, u16>,
    fail: HashSet<String>,
    dns_style: bool,
    delay: Duration,
    active: AtomicUsize,
    peak: AtomicUsize,
    calls: Mutex<Vec<String>>,
}

impl MockProber {
    fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Prober for MockProber {
    fn full_target(&self, prefix: &str, word: &str) -> String {
        if self.dns_style {
            format!("{word}.{prefix}")
        } else {
            format!("{}/{}", prefix.trim_end_matches('/'), word)
        }
    }

    async fn attempt(&self, target: &str) -> Result<Verdict, TransportError> {
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(active, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.calls.lock().unwrap().push(target.to_string());
        self.active.fetch_sub(1, Ordering::SeqCst);

        if self.fail.contains(target) {
            return Err(TransportError::Timeout);
        }
        match self.responses.get(target) {
            Some(&status) if status != 404 => Ok(Verdict::Hit {
                status: Some(status),
                addrs: vec!["10.0.0.1".to_string()],
            }),
            Some(&status) => Ok(Verdict::Miss {
                status: Some(status),
            }),
            None => Ok(Verdict::Miss { status: Some(404) }),
        }
    }
}

fn config(threads: usize, max_depth: usize) -> ScannerConfig {
    ScannerConfig {
        threads,
        max_depth,
        rate: 100_000,
        retry: RetryPolicy {
            attempts: 1,
            backoff: Duration::ZERO,
        },
    }
}

async fn run_scan(
    prober: Arc<MockProber>,
    words: &[&str],
    config: ScannerConfig,
    root: &str,
    cancel: CancelFlag,
) -> (ResultSet, Vec<ProbeResult>) {
    let words = Arc::new(words.iter().map(|w| w.to_string()).collect::<Vec<_>>());
    let scanner = Scanner::new(config, prober, words, cancel);
    let (tx, mut rx) = mpsc::channel::<ProbeResult>(4096);
    let drain = task::spawn(async move {
        let mut events = Vec::new();
        while let Some(result) = rx.recv().await {
            events.push(result);
        }
        events
    });
    let set = scanner.run(root, tx).await.unwrap();
    let events = drain.await.unwrap();
    (set, events)
}

#[tokio::test]
async fn every_candidate_probed_exactly_once_per_round() {
    let words: Vec<String> = (0..50).map(|i| format!("w{i}")).collect();
    let word_refs: Vec<&str> = words.iter().map(|w| w.as_str()).collect();
    let prober = Arc::new(MockProber::default());

    let (set, _) = run_scan(
        prober.clone(),
        &word_refs,
        config(8, 0),
        "http://t",
        CancelFlag::new(),
    )
    .await;

    let calls = prober.calls();
    assert_eq!(calls.len(), 50);
    let distinct: HashSet<&String> = calls.iter().collect();
    assert_eq!(distinct.len(), 50);
    assert_eq!(set.hits + set.misses + set.errors, 50);
}

#[tokio::test]
async fn in_flight_probes_never_exceed_thread_count() {
    let words: Vec<String> = (0..40).map(|i| format!("w{i}")).collect();
    let word_refs: Vec<&str> = words.iter().map(|w| w.as_str()).collect();
    let prober = Arc::new(MockProber {
        delay: Duration::from_millis(5),
        ..Default::default()
    });

    run_scan(
        prober.clone(),
        &word_refs,
        config(4, 0),
        "http://t",
        CancelFlag::new(),
    )
    .await;

    assert_eq!(prober.calls().len(), 40);
    assert!(prober.peak() <= 4, "peak was {}", prober.peak());
}

#[tokio::test]
async fn http_scenario_classifies_hits_and_misses() {
    let prober = Arc::new(MockProber {
        responses: HashMap::from([
            ("http://example.com/admin".to_string(), 200),
            ("http://example.com/login".to_string(), 404),
            ("http://example.com/test".to_string(), 403),
        ]),
        ..Default::default()
    });

    let (set, events) = run_scan(
        prober,
        &["admin", "login", "test"],
        config(2, 0),
        "http://example.com",
        CancelFlag::new(),
    )
    .await;

    assert_eq!(set.hits, 2);
    assert_eq!(set.misses, 1);
    assert_eq!(set.errors, 0);
    let hit_targets: HashSet<&str> = set.hit_results().map(|r| r.target.as_str()).collect();
    assert!(hit_targets.contains("http://example.com/admin"));
    assert!(hit_targets.contains("http://example.com/test"));
    assert!(!hit_targets.contains("http://example.com/login"));

    // every completed probe was streamed, hits included
    assert_eq!(events.len(), 3);
    assert!(events
        .iter()
        .any(|r| r.outcome == Outcome::Hit && r.target == "http://example.com/admin"));
}

#[tokio::test]
async fn dns_hit_expands_one_round_and_stops_at_max_depth() {
    let prober = Arc::new(MockProber {
        responses: HashMap::from([
            ("dev.example.com".to_string(), 200),
            ("dev.dev.example.com".to_string(), 200),
        ]),
        dns_style: true,
        ..Default::default()
    });

    let (set, _) = run_scan(
        prober.clone(),
        &["dev"],
        config(2, 1),
        "example.com",
        CancelFlag::new(),
    )
    .await;

    // round 0 plus the round seeded by the depth-0 hit, nothing deeper even
    // though the depth-1 probe also hit
    assert_eq!(prober.calls().len(), 2);
    assert_eq!(set.hits, 2);
    assert!(set.results.iter().all(|r| r.depth <= 1));
}

#[tokio::test]
async fn expansion_reruns_full_wordlist_under_each_hit() {
    let prober = Arc::new(MockProber {
        responses: HashMap::from([
            ("http://t/a".to_string(), 200),
            ("http://t/a/a".to_string(), 200),
            ("http://t/a/b".to_string(), 301),
        ]),
        ..Default::default()
    });

    let (set, _) = run_scan(
        prober.clone(),
        &["a", "b"],
        config(2, 1),
        "http://t",
        CancelFlag::new(),
    )
    .await;

    let calls = prober.calls();
    // depth 0: a, b; depth 1 under the "a" hit: a/a, a/b
    assert_eq!(calls.len(), 4);
    assert!(calls.contains(&"http://t/a/a".to_string()));
    assert!(calls.contains(&"http://t/a/b".to_string()));
    assert_eq!(set.hits, 3);
    assert!(set.results.iter().all(|r| r.depth <= 1));
}

#[tokio::test]
async fn transport_failures_retry_then_record_an_error() {
    let prober = Arc::new(MockProber {
        fail: HashSet::from(["http://t/x".to_string()]),
        ..Default::default()
    });
    let mut cfg = config(1, 0);
    cfg.retry = RetryPolicy {
        attempts: 3,
        backoff: Duration::ZERO,
    };

    let (set, _) = run_scan(prober.clone(), &["x"], cfg, "http://t", CancelFlag::new()).await;

    assert_eq!(prober.calls().len(), 3);
    assert_eq!(set.errors, 1);
    assert_eq!(set.hits, 0);
    let error = &set.results[0];
    assert_eq!(error.outcome, Outcome::Error);
    assert!(error.error.is_some());
}

#[tokio::test]
async fn classification_is_deterministic_for_a_fixed_target() {
    let prober = MockProber {
        responses: HashMap::from([("http://t/admin".to_string(), 200)]),
        ..Default::default()
    };
    let retry = RetryPolicy {
        attempts: 1,
        backoff: Duration::ZERO,
    };

    let first = probe::probe(&prober, "http://t", "admin", 0, retry).await;
    let second = probe::probe(&prober, "http://t", "admin", 0, retry).await;
    assert_eq!(first.outcome, second.outcome);
    assert_eq!(first.status, second.status);
    assert_eq!(first.target, second.target);
}

#[tokio::test]
async fn cancellation_returns_partial_results() {
    let words: Vec<String> = (0..200).map(|i| format!("w{i}")).collect();
    let word_refs: Vec<&str> = words.iter().map(|w| w.as_str()).collect();
    let prober = Arc::new(MockProber {
        delay: Duration::from_millis(10),
        ..Default::default()
    });

    let cancel = CancelFlag::new();
    {
        let cancel = cancel.clone();
        task::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            cancel.cancel();
        });
    }

    let scan = tokio::time::timeout(
        Duration::from_secs(5),
        run_scan(prober, &word_refs, config(4, 0), "http://t", cancel),
    )
    .await
    .expect("cancelled scan did not return in time");

    let (set, _) = scan;
    let completed = set.hits + set.misses + set.errors;
    assert!(completed < 200, "completed {completed} of 200");
}
