use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{redirect, Proxy};

use super::{Prober, TransportError, Verdict};

/// HTTP path prober. One GET per attempt; the response body is never read,
/// only the status code matters for classification.
pub struct HttpProber {
    client: reqwest::Client,
    miss_status: HashSet<u16>,
    trailing_slash: bool,
}

impl HttpProber {
    pub fn new(
        miss_status: HashSet<u16>,
        trailing_slash: bool,
        timeout: Duration,
        proxy: Option<Proxy>,
    ) -> Result<Self, reqwest::Error> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::USER_AGENT,
            reqwest::header::HeaderValue::from_static(
                "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:95.0) Gecko/20100101 Firefox/95.0",
            ),
        );

        //no certs
        let mut builder = reqwest::Client::builder()
            .default_headers(headers)
            .redirect(redirect::Policy::none())
            .timeout(timeout)
            .danger_accept_invalid_hostnames(true)
            .danger_accept_invalid_certs(true);

        if let Some(proxy) = proxy {
            builder = builder.proxy(proxy);
        }

        Ok(Self {
            client: builder.build()?,
            miss_status,
            trailing_slash,
        })
    }
}

#[async_trait]
impl Prober for HttpProber {
    fn full_target(&self, prefix: &str, word: &str) -> String {
        let mut url = prefix.trim_end_matches('/').to_string();
        url.push('/');
        url.push_str(word);
        if self.trailing_slash && !url.ends_with('/') {
            url.push('/');
        }
        url
    }

    async fn attempt(&self, target: &str) -> Result<Verdict, TransportError> {
        let resp = self.client.get(target).send().await?;
        let status = resp.status().as_u16();
        if self.miss_status.contains(&status) {
            Ok(Verdict::Miss {
                status: Some(status),
            })
        } else {
            Ok(Verdict::Hit {
                status: Some(status),
                addrs: Vec::new(),
            })
        }
    }
}
