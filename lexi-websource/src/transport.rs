//! Abstract transport: one call resolves one hop of an exchange.
//!
//! The fetch state machine consumes this trait rather than an HTTP client
//! directly, so redirect chains, failures, and cancellation can be exercised
//! against scripted transports in tests while production uses reqwest.

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, LOCATION};
use reqwest::redirect::Policy;
use thiserror::Error;
use url::Url;

/// Transport-level failure. The description travels verbatim to the caller,
/// which is expected to display it in place of content.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct TransportError(pub String);

/// Outcome of a single hop.
#[derive(Debug)]
pub enum Hop {
    /// The server redirected; the fetcher re-issues against this target.
    Redirect(String),
    /// Terminal response body.
    Body {
        bytes: Vec<u8>,
        content_type: Option<String>,
    },
}

/// Issue an HTTP GET and resolve exactly one hop: a redirect target, a final
/// body, or an error. Implementations must be shareable across concurrent
/// lookups; each call is independent.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Hop, TransportError>;
}

/// reqwest-backed transport, shared read-mostly by every concurrent fetch.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Build the shared client.
    ///
    /// Certificate validation failures are accepted. Lookup sources are
    /// community-provided and routinely sit behind expired or self-signed
    /// certificates; reachability wins over transport-layer trust for this
    /// traffic, and the content is treated as untrusted downstream anyway.
    ///
    /// Redirects are resolved by the fetch state machine, not by reqwest, so
    /// every hop is observable and partial data is discarded per hop.
    pub fn new() -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .redirect(Policy::none())
            .danger_accept_invalid_certs(true)
            .connect_timeout(std::time::Duration::from_secs(10))
            .user_agent(concat!("lexi/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TransportError(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, url: &str) -> Result<Hop, TransportError> {
        let parsed =
            Url::parse(url).map_err(|e| TransportError(format!("invalid URL {url}: {e}")))?;

        let response = self
            .client
            .get(parsed.clone())
            .send()
            .await
            .map_err(|e| TransportError(e.to_string()))?;

        let status = response.status();
        if status.is_redirection() {
            if let Some(location) = response
                .headers()
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
            {
                // Location may be relative; resolve it against the hop we
                // just made. An unparseable target is passed through and
                // fails on the next hop with a concrete message.
                let target = match parsed.join(location) {
                    Ok(u) => u.to_string(),
                    Err(_) => location.to_string(),
                };
                tracing::debug!(
                    target: "websource.transport",
                    from = %url,
                    to = %target,
                    status = %status,
                    "redirect hop"
                );
                return Ok(Hop::Redirect(target));
            }
        }

        if !status.is_success() {
            return Err(TransportError(format!("HTTP {status} for {url}")));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let bytes = response
            .bytes()
            .await
            .map_err(|e| TransportError(e.to_string()))?;

        Ok(Hop::Body {
            bytes: bytes.to_vec(),
            content_type,
        })
    }
}
