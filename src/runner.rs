use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::fs::File;
use tokio::io::AsyncBufReadExt;
use tokio::io::BufReader;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::probe::dns::DnsProber;
use crate::probe::http::HttpProber;
use crate::probe::{ProbeResult, Prober, RetryPolicy};
use crate::scanner::aggregator::ResultSet;
use crate::scanner::{CancelFlag, ScanError, Scanner, ScannerConfig};

/// How candidates are combined with the target, fixed per run. Picked by the
/// caller from the shape of the target argument.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    HttpPath,
    DnsSubdomain,
}

#[derive(Clone, Debug)]
pub enum WordlistSource {
    FilePath(String),
    Inline(Vec<String>),
}

#[derive(Clone, Debug)]
pub struct Options {
    pub target: String,
    pub mode: Mode,
    pub wordlist: WordlistSource,
    pub max_depth: usize,
    pub threads: usize,
    pub trailing_slash: bool,
    pub proxy: Option<String>,
    pub miss_status: HashSet<u16>,
    pub rate: u32,
    pub timeout_seconds: usize,
    pub retries: u32,
    pub backoff_ms: u64,
}

impl Default for Options {
    fn default() -> Self {
        let mut miss_status = HashSet::new();
        miss_status.insert(404);
        Self {
            target: String::new(),
            mode: Mode::HttpPath,
            wordlist: WordlistSource::Inline(Vec::new()),
            max_depth: 2,
            threads: 64,
            trailing_slash: false,
            proxy: None,
            miss_status,
            rate: 1000,
            timeout_seconds: 10,
            retries: 2,
            backoff_ms: 250,
        }
    }
}

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("no target provided")]
    NoTarget,

    #[error("invalid target URL: {target}")]
    InvalidTarget { target: String },

    #[error("invalid threads {value}, expected positive integer")]
    InvalidThreads { value: usize },

    #[error("invalid rate {value}, expected positive integer")]
    InvalidRate { value: u32 },

    #[error("invalid timeout {value}, expected positive integer")]
    InvalidTimeout { value: usize },

    #[error("wordlist is empty")]
    EmptyWordlist,

    #[error("failed to open wordlist: {path}: {source}")]
    FileOpen {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read wordlist: {path}: {source}")]
    FileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to build HTTP client: {source}")]
    HttpClientBuild {
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to setup proxy: {proxy}: {source}")]
    ProxySetup {
        proxy: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("scan failed: {source}")]
    Scan {
        #[source]
        source: ScanError,
    },
}

#[derive(Clone, Debug)]
pub struct ScanResult {
    pub started_at: Instant,
    pub elapsed: Duration,
    pub wordlist_len: usize,
    /// Addresses behind `*.target`, DNS mode only. Candidates resolving to
    /// exactly this set were classified as misses.
    pub wildcard: Vec<String>,
    pub result_set: ResultSet,
}

#[derive(Clone, Debug)]
pub struct Runner {
    options: Options,
}

impl Runner {
    pub fn new(options: Options) -> Result<Self, RunnerError> {
        if options.target.trim().is_empty() {
            return Err(RunnerError::NoTarget);
        }
        if options.threads == 0 {
            return Err(RunnerError::InvalidThreads {
                value: options.threads,
            });
        }
        if options.rate == 0 {
            return Err(RunnerError::InvalidRate {
                value: options.rate,
            });
        }
        if options.timeout_seconds == 0 {
            return Err(RunnerError::InvalidTimeout {
                value: options.timeout_seconds,
            });
        }
        if options.mode == Mode::HttpPath && reqwest::Url::parse(&options.target).is_err() {
            return Err(RunnerError::InvalidTarget {
                target: options.target.clone(),
            });
        }
        Ok(Self { options })
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// The single entry point: loads the wordlist, builds the prober for the
    /// run's mode, and drains the round queue to completion (or to
    /// cancellation, in which case partial results are returned). Transient
    /// probe failures surface as ERROR entries, never as an `Err` here.
    pub async fn run(
        &self,
        cancel: CancelFlag,
        events: mpsc::Sender<ProbeResult>,
    ) -> Result<ScanResult, RunnerError> {
        let started_at = Instant::now();

        let words = load_wordlist(&self.options.wordlist).await?;
        if words.is_empty() {
            return Err(RunnerError::EmptyWordlist);
        }
        let words = Arc::new(words);

        let timeout = Duration::from_secs(self.options.timeout_seconds as u64);
        let retry = RetryPolicy {
            attempts: self.options.retries + 1,
            backoff: Duration::from_millis(self.options.backoff_ms),
        };

        let (prober, wildcard): (Arc<dyn Prober>, Vec<String>) = match self.options.mode {
            Mode::HttpPath => {
                let proxy = match self
                    .options
                    .proxy
                    .as_deref()
                    .filter(|p| !p.trim().is_empty())
                {
                    Some(raw) => {
                        Some(
                            reqwest::Proxy::all(raw).map_err(|e| RunnerError::ProxySetup {
                                proxy: raw.to_string(),
                                source: e,
                            })?,
                        )
                    }
                    None => None,
                };
                let prober = HttpProber::new(
                    self.options.miss_status.clone(),
                    self.options.trailing_slash,
                    timeout,
                    proxy,
                )
                .map_err(|e| RunnerError::HttpClientBuild { source: e })?;
                (Arc::new(prober), Vec::new())
            }
            Mode::DnsSubdomain => {
                // a proxy cannot apply to UDP lookups; the caller is warned
                // about this before the run starts
                let mut prober = DnsProber::new(timeout);
                let wildcard = prober.detect_wildcard(&self.options.target).await;
                (
                    Arc::new(prober),
                    wildcard.iter().map(|a| a.to_string()).collect(),
                )
            }
        };

        let scanner = Scanner::new(
            ScannerConfig {
                threads: self.options.threads,
                max_depth: self.options.max_depth,
                rate: self.options.rate,
                retry,
            },
            prober,
            words.clone(),
            cancel,
        );

        let result_set = scanner
            .run(&self.options.target, events)
            .await
            .map_err(|source| RunnerError::Scan { source })?;

        Ok(ScanResult {
            started_at,
            elapsed: started_at.elapsed(),
            wordlist_len: words.len(),
            wildcard,
            result_set,
        })
    }
}

pub(crate) async fn load_wordlist(source: &WordlistSource) -> Result<Vec<String>, RunnerError> {
    match source {
        WordlistSource::Inline(values) => Ok(values
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
            .collect()),
        WordlistSource::FilePath(path) => {
            let path = crate::config::expand_tilde_string(path.as_str());
            let handle = File::open(&path).await.map_err(|e| RunnerError::FileOpen {
                path: path.clone(),
                source: e,
            })?;
            let mut out = Vec::new();
            let mut lines = BufReader::new(handle).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let line = line.trim();
                        if line.is_empty() {
                            continue;
                        }
                        out.push(line.to_string());
                    }
                    Ok(None) => break,
                    Err(e) => {
                        return Err(RunnerError::FileRead { path, source: e });
                    }
                }
            }
            Ok(out)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_rejects_zero_threads() {
        let options = Options {
            target: "http://example.com".to_string(),
            threads: 0,
            ..Default::default()
        };
        assert!(matches!(
            Runner::new(options),
            Err(RunnerError::InvalidThreads { value: 0 })
        ));
    }

    #[test]
    fn new_rejects_missing_target() {
        let options = Options::default();
        assert!(matches!(Runner::new(options), Err(RunnerError::NoTarget)));
    }

    #[test]
    fn new_rejects_unparseable_http_target() {
        let options = Options {
            target: "not a url".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            Runner::new(options),
            Err(RunnerError::InvalidTarget { .. })
        ));
    }

    #[tokio::test]
    async fn inline_wordlist_trims_and_drops_blanks() {
        let source = WordlistSource::Inline(vec![
            " admin ".to_string(),
            String::new(),
            "login".to_string(),
        ]);
        let words = load_wordlist(&source).await.unwrap();
        assert_eq!(words, vec!["admin".to_string(), "login".to_string()]);
    }

    #[tokio::test]
    async fn missing_wordlist_file_is_fatal() {
        let source = WordlistSource::FilePath("/nonexistent/words.txt".to_string());
        assert!(matches!(
            load_wordlist(&source).await,
            Err(RunnerError::FileOpen { .. })
        ));
    }
}
