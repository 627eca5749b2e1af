//! The per-lookup asynchronous state machine.
//!
//! Each lookup spawns one task that walks the redirect chain hop by hop and
//! finishes exactly once. The consumer holds an [`ArticleFetch`] handle;
//! handle and task share one mutex around buffer and state, so observing
//! "is it finished / what are the bytes" never races the completion path.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::normalize;
use crate::sniff;
use crate::transport::{Hop, Transport};

/// Lifecycle of one lookup. States only move forward; `Redirecting` loops
/// back through `Requesting` while the lookup remains logically in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchState {
    Requesting,
    Redirecting,
    Completed,
    Failed,
    Cancelled,
}

impl FetchState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            FetchState::Completed | FetchState::Failed | FetchState::Cancelled
        )
    }
}

struct Inner {
    state: FetchState,
    buffer: Vec<u8>,
    has_data: bool,
    error: Option<String>,
}

/// Handle to one outstanding article lookup.
///
/// Created by [`Dictionary::article`](crate::Dictionary::article); observed
/// by the caller while the fetch task drives it to a terminal state. All
/// failure reporting is request-scoped through [`error`](Self::error).
pub struct ArticleFetch {
    inner: Mutex<Inner>,
    done: Notify,
    cancel: CancellationToken,
}

impl ArticleFetch {
    fn pending() -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(Inner {
                state: FetchState::Requesting,
                buffer: Vec::new(),
                has_data: false,
                error: None,
            }),
            done: Notify::new(),
            cancel: CancellationToken::new(),
        })
    }

    /// An already-finished lookup carrying a prebuilt fragment. Used for
    /// iframe embed mode, where no transport exchange happens at all.
    pub fn instant(fragment: Vec<u8>) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(Inner {
                state: FetchState::Completed,
                has_data: !fragment.is_empty(),
                buffer: fragment,
                error: None,
            }),
            done: Notify::new(),
            cancel: CancellationToken::new(),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().expect("fetch state mutex poisoned")
    }

    pub fn state(&self) -> FetchState {
        self.lock().state
    }

    pub fn is_finished(&self) -> bool {
        self.lock().state.is_terminal()
    }

    /// True once the fragment has been stored. Never true for cancelled or
    /// failed lookups.
    pub fn has_data(&self) -> bool {
        self.lock().has_data
    }

    /// The produced fragment; empty until [`has_data`](Self::has_data).
    pub fn bytes(&self) -> Vec<u8> {
        self.lock().buffer.clone()
    }

    /// The transport's failure description, present only in `Failed`.
    pub fn error(&self) -> Option<String> {
        self.lock().error.clone()
    }

    /// Cancel the lookup.
    ///
    /// Idempotent: once any terminal state is reached this is a no-op, so
    /// cancelling after completion never disturbs stored data. Otherwise the
    /// lookup becomes `Cancelled` immediately and the in-flight exchange is
    /// abandoned without waiting for it to settle.
    pub fn cancel(&self) {
        {
            let mut inner = self.lock();
            if inner.state.is_terminal() {
                return;
            }
            inner.state = FetchState::Cancelled;
        }
        self.cancel.cancel();
        self.done.notify_waiters();
    }

    /// Wait until the lookup reaches a terminal state.
    pub async fn wait_finished(&self) {
        loop {
            let notified = self.done.notified();
            if self.is_finished() {
                return;
            }
            notified.await;
        }
    }

    /// Forward transition for the non-terminal phases. A lookup that was
    /// cancelled in the meantime stays cancelled.
    fn advance(&self, state: FetchState) {
        let mut inner = self.lock();
        if !inner.state.is_terminal() {
            inner.state = state;
        }
    }

    fn complete(&self, fragment: Vec<u8>) {
        {
            let mut inner = self.lock();
            if inner.state.is_terminal() {
                // Cancelled while the body was being processed; the result
                // belongs to an abandoned exchange and is dropped.
                return;
            }
            inner.buffer = fragment;
            inner.has_data = true;
            inner.state = FetchState::Completed;
        }
        self.done.notify_waiters();
    }

    fn fail(&self, message: String) {
        {
            let mut inner = self.lock();
            if inner.state.is_terminal() {
                return;
            }
            inner.error = Some(message);
            inner.state = FetchState::Failed;
        }
        self.done.notify_waiters();
    }
}

/// Upper bound on redirect hops per lookup; a chain longer than this (or a
/// cycle) fails the lookup instead of spinning.
const MAX_REDIRECT_HOPS: usize = 10;

/// Spawn the fetch task for a resolved URL. Must be called from within a
/// tokio runtime.
///
/// The task re-issues the request for every redirect hop on the same logical
/// lookup; partial data from a superseded hop is discarded with its future.
/// The buffer is written at most once, on the terminal response.
pub(crate) fn spawn_fetch(
    transport: Arc<dyn Transport>,
    url: String,
    source_id: String,
    rtl: bool,
) -> Arc<ArticleFetch> {
    let fetch = ArticleFetch::pending();
    let handle = Arc::clone(&fetch);
    let token = fetch.cancel.clone();

    tokio::spawn(async move {
        let mut current = url;
        let mut hops = 0;
        loop {
            handle.advance(FetchState::Requesting);
            let hop = tokio::select! {
                // Cancellation abandons the exchange outright; any later
                // notification for it is dropped by the terminal-state guard.
                _ = token.cancelled() => return,
                hop = transport.fetch(&current) => hop,
            };

            match hop {
                Ok(Hop::Redirect(target)) => {
                    hops += 1;
                    if hops > MAX_REDIRECT_HOPS {
                        handle.fail(format!(
                            "too many redirects ({MAX_REDIRECT_HOPS}) starting from {current}"
                        ));
                        return;
                    }
                    handle.advance(FetchState::Redirecting);
                    tracing::debug!(
                        target: "websource.fetch",
                        source = %source_id,
                        from = %current,
                        to = %target,
                        "following redirect"
                    );
                    current = target;
                }
                Ok(Hop::Body {
                    bytes,
                    content_type,
                }) => {
                    let text = sniff::decode_html(&bytes, content_type.as_deref());
                    let fetched = match Url::parse(&current) {
                        Ok(u) => u,
                        Err(e) => {
                            handle.fail(format!("invalid URL {current}: {e}"));
                            return;
                        }
                    };
                    let fragment = normalize::normalize_article(&text, &fetched, &source_id, rtl);
                    tracing::debug!(
                        target: "websource.fetch",
                        source = %source_id,
                        url = %current,
                        bytes = fragment.len(),
                        "article ready"
                    );
                    handle.complete(fragment);
                    return;
                }
                Err(e) => {
                    tracing::debug!(
                        target: "websource.fetch",
                        source = %source_id,
                        url = %current,
                        error = %e,
                        "article fetch failed"
                    );
                    handle.fail(e.to_string());
                    return;
                }
            }
        }
    });

    fetch
}
