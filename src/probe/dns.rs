use std::collections::HashSet;
use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::error::ResolveErrorKind;
use hickory_resolver::TokioAsyncResolver;

use super::{Prober, TransportError, Verdict};

/// DNS subdomain prober backed by the Cloudflare resolvers. One A/AAAA
/// lookup per attempt. Proxying is not applicable to DNS lookups, so any
/// configured proxy is ignored for this mode.
pub struct DnsProber {
    resolver: TokioAsyncResolver,
    wildcard: HashSet<IpAddr>,
}

impl DnsProber {
    pub fn new(timeout: Duration) -> Self {
        let mut opts = ResolverOpts::default();
        opts.timeout = timeout;
        // the scanner owns the retry policy
        opts.attempts = 1;
        let resolver = TokioAsyncResolver::tokio(ResolverConfig::cloudflare(), opts);
        Self {
            resolver,
            wildcard: HashSet::new(),
        }
    }

    /// Resolves `*.domain` once so wildcard zones don't turn every candidate
    /// into a hit. Returns the wildcard addresses, if any.
    pub async fn detect_wildcard(&mut self, domain: &str) -> Vec<IpAddr> {
        let name = format!("*.{}.", domain.trim_end_matches('.'));
        match self.resolver.lookup_ip(name).await {
            Ok(lookup) => {
                let addrs: Vec<IpAddr> = lookup.iter().collect();
                self.wildcard = addrs.iter().copied().collect();
                addrs
            }
            Err(_) => Vec::new(),
        }
    }

    #[cfg(test)]
    fn with_wildcard(mut self, wildcard: HashSet<IpAddr>) -> Self {
        self.wildcard = wildcard;
        self
    }
}

/// A candidate that resolves to exactly the wildcard address set is the
/// zone's catch-all answering, not a real subdomain.
fn matches_wildcard(addrs: &[IpAddr], wildcard: &HashSet<IpAddr>) -> bool {
    if wildcard.is_empty() {
        return false;
    }
    let resolved: HashSet<IpAddr> = addrs.iter().copied().collect();
    resolved == *wildcard
}

#[async_trait]
impl Prober for DnsProber {
    fn full_target(&self, prefix: &str, word: &str) -> String {
        format!("{}.{}", word, prefix.trim_end_matches('.'))
    }

    async fn attempt(&self, target: &str) -> Result<Verdict, TransportError> {
        // trailing dot keeps search domains out of the lookup
        match self.resolver.lookup_ip(format!("{target}.")).await {
            Ok(lookup) => {
                let addrs: Vec<IpAddr> = lookup.iter().collect();
                if addrs.is_empty() || matches_wildcard(&addrs, &self.wildcard) {
                    Ok(Verdict::Miss { status: None })
                } else {
                    Ok(Verdict::Hit {
                        status: None,
                        addrs: addrs.iter().map(|a| a.to_string()).collect(),
                    })
                }
            }
            Err(e) => match e.kind() {
                ResolveErrorKind::NoRecordsFound { .. } => Ok(Verdict::Miss { status: None }),
                ResolveErrorKind::Timeout => Err(TransportError::Timeout),
                _ => Err(TransportError::Resolve(e.to_string())),
            },
        }
    }
}
