use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::json;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use crate::probe::Outcome;
use crate::runner::{Mode, ScanResult};
use crate::utils;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Clone, Debug, Serialize)]
struct HttpHit<'a> {
    url: &'a str,
    status_code: u16,
}

/// The JSON document emitted at the end of a run: elapsed seconds, the hits
/// in mode-specific shape (HTTP as url/status pairs, DNS grouped by name),
/// and the miss/error counts needed to judge scan health.
pub fn render_json(scan: &ScanResult, mode: Mode) -> Vec<u8> {
    let set = &scan.result_set;
    let hits = match mode {
        Mode::HttpPath => {
            let hits: Vec<HttpHit> = set
                .hit_results()
                .map(|r| HttpHit {
                    url: &r.target,
                    status_code: r.status.unwrap_or_default(),
                })
                .collect();
            json!(hits)
        }
        Mode::DnsSubdomain => {
            let mut grouped: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
            for r in set.hit_results() {
                grouped
                    .entry(r.target.as_str())
                    .or_default()
                    .extend(r.addrs.iter().map(|a| a.as_str()));
            }
            json!(grouped)
        }
    };

    let mut doc = json!({
        "elapsed": scan.elapsed.as_secs_f64(),
        "hits": hits,
        "misses": set.misses,
        "errors": set.errors,
    });
    if !scan.wildcard.is_empty() {
        doc["wildcard"] = json!(scan.wildcard);
    }
    serde_json::to_vec_pretty(&doc).unwrap_or_else(|_| b"{}".to_vec())
}

/// End-of-run summary for text mode. Hits were already streamed as they
/// arrived, so this only totals the run.
pub fn render_text(scan: &ScanResult) -> Vec<u8> {
    let set = &scan.result_set;
    let mut out = String::new();
    out.push('\n');
    out.push_str(&format!("Hit count: {}\n", set.hits));
    if set.errors > 0 {
        out.push_str(&format!("Error count: {}\n", set.errors));
    }
    out.push_str(&format!("Miss count: {}\n", set.misses));
    out.push_str(&format!(
        "Elapsed: {}\n",
        utils::format_elapsed(scan.elapsed)
    ));
    out.into_bytes()
}

pub async fn save(path: &str, data: &[u8]) -> std::io::Result<()> {
    let mut outfile = File::create(path).await?;
    outfile.write_all(data).await?;
    outfile.flush().await
}

/// Renders one streamed result as a plain line, used by JSON-lines style
/// consumers and by tests; the interactive printer colorizes separately.
pub fn render_result_line(result: &crate::probe::ProbeResult, mode: Mode) -> Option<String> {
    match (result.outcome, mode) {
        (Outcome::Hit, Mode::HttpPath) => Some(format!(
            "[{}] {}",
            result.status.unwrap_or_default(),
            result.target
        )),
        (Outcome::Hit, Mode::DnsSubdomain) => {
            Some(format!("{} > {:?}", result.target, result.addrs))
        }
        (Outcome::Error, _) => Some(format!(
            "[error] {}: {}",
            result.target,
            result.error.as_deref().unwrap_or("transport failure")
        )),
        _ => None,
    }
}
