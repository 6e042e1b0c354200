//! Fetch-until-empty page loop.
//!
//! Pages are requested one at a time starting at `start_page`. The loop ends
//! on the first page with no records, after `max_pages` pages, when the caller
//! cancels (checked only between pages), or when a page still fails after
//! `max_retries` retries. In every case the records collected so far are kept.
//!
//! Consecutive page requests are at least `min_delay` apart. Retries back off
//! linearly: retry `n` waits `n * backoff`.

use std::pin::pin;
use std::time::Duration;

use futures::stream::{self, Stream, StreamExt};
use reviewpulse_core::{FetchConfig, RawRecord};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::source::{Page, PageSource};
use crate::FetchError;

/// Why a fetch stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// A page came back with no records.
    Exhausted,
    /// The `max_pages` safety valve tripped.
    MaxPages,
    Cancelled,
    /// A page kept failing after all retries.
    Failed,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exhausted => "exhausted",
            Self::MaxPages => "max_pages",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        }
    }
}

/// One step of the page stream.
#[derive(Debug)]
pub enum FetchEvent {
    Page { index: u32, records: Vec<RawRecord> },
    Stopped {
        reason: StopReason,
        warning: Option<FetchError>,
    },
}

/// Everything a completed fetch produced.
#[derive(Debug)]
pub struct FetchOutcome {
    pub records: Vec<RawRecord>,
    /// Pages that returned records.
    pub pages_fetched: u32,
    pub stop: StopReason,
    /// Set when the fetch stopped on a failure. Partial data is still valid.
    pub warning: Option<FetchError>,
}

#[derive(Debug, Clone)]
struct Settings {
    start_page: u32,
    max_pages: u32,
    min_delay: Duration,
    max_retries: u32,
    backoff: Duration,
}

struct LoopState {
    next_page: u32,
    requested: u32,
    done: bool,
}

/// Drives a [`PageSource`] until it runs dry.
pub struct Fetcher<S> {
    source: S,
    settings: Settings,
}

impl<S: PageSource> Fetcher<S> {
    pub fn new(source: S, config: &FetchConfig) -> Self {
        Self {
            source,
            settings: Settings {
                start_page: config.start_page,
                max_pages: config.max_pages.max(1),
                min_delay: Duration::from_millis(config.min_delay_ms),
                max_retries: config.max_retries,
                backoff: Duration::from_millis(config.backoff_ms),
            },
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Fetch every page until the source runs dry.
    pub async fn fetch_all(&self) -> FetchOutcome {
        self.fetch_all_with(&CancellationToken::new()).await
    }

    /// Like [`fetch_all`](Self::fetch_all), stopping early at the next page
    /// boundary once `cancel` fires.
    pub async fn fetch_all_with(&self, cancel: &CancellationToken) -> FetchOutcome {
        let mut events = pin!(self.stream(cancel));
        let mut records = Vec::new();
        let mut pages_fetched = 0;

        while let Some(event) = events.next().await {
            match event {
                FetchEvent::Page { records: page, .. } => {
                    pages_fetched += 1;
                    records.extend(page);
                }
                FetchEvent::Stopped { reason, warning } => {
                    info!(
                        pages = pages_fetched,
                        records = records.len(),
                        reason = reason.as_str(),
                        "fetch finished"
                    );
                    return FetchOutcome {
                        records,
                        pages_fetched,
                        stop: reason,
                        warning,
                    };
                }
            }
        }

        // The stream always ends with `Stopped`; getting here means it was cut short.
        FetchOutcome {
            records,
            pages_fetched,
            stop: StopReason::Cancelled,
            warning: None,
        }
    }

    /// Lazy page stream: one request per poll, ending with a single
    /// [`FetchEvent::Stopped`].
    pub fn stream<'a>(
        &'a self,
        cancel: &'a CancellationToken,
    ) -> impl Stream<Item = FetchEvent> + 'a {
        let state = LoopState {
            next_page: self.settings.start_page,
            requested: 0,
            done: false,
        };
        stream::unfold(state, move |mut state| async move {
            if state.done {
                return None;
            }
            let event = self.step(&mut state, cancel).await;
            if matches!(event, FetchEvent::Stopped { .. }) {
                state.done = true;
            }
            Some((event, state))
        })
    }

    async fn step(&self, state: &mut LoopState, cancel: &CancellationToken) -> FetchEvent {
        if state.requested >= self.settings.max_pages {
            warn!(
                max_pages = self.settings.max_pages,
                "page limit reached before an empty page"
            );
            return stopped(StopReason::MaxPages, None);
        }
        if cancel.is_cancelled() {
            return stopped(StopReason::Cancelled, None);
        }

        if state.requested > 0 && !self.settings.min_delay.is_zero() {
            tokio::select! {
                _ = tokio::time::sleep(self.settings.min_delay) => {}
                _ = cancel.cancelled() => return stopped(StopReason::Cancelled, None),
            }
        }

        let index = state.next_page;
        state.requested += 1;
        state.next_page = state.next_page.saturating_add(1);

        match self.fetch_with_retry(index).await {
            Ok(page) if page.is_empty() => {
                debug!(page = index, "empty page");
                stopped(StopReason::Exhausted, None)
            }
            Ok(Page { records, has_more }) => {
                info!(page = index, count = records.len(), has_more, "fetched page");
                FetchEvent::Page { index, records }
            }
            Err(e) => {
                warn!(page = index, error = %e, "giving up on page, keeping partial results");
                stopped(StopReason::Failed, Some(e))
            }
        }
    }

    async fn fetch_with_retry(&self, page: u32) -> Result<Page, FetchError> {
        let mut attempt = 0u32;
        loop {
            match self.source.fetch_page(page).await {
                Ok(p) => return Ok(p),
                Err(e) if attempt < self.settings.max_retries => {
                    attempt += 1;
                    // Retries never go out faster than the regular pacing.
                    let wait = (self.settings.backoff * attempt).max(self.settings.min_delay);
                    warn!(
                        page,
                        attempt,
                        error = %e,
                        wait_ms = wait.as_millis() as u64,
                        "page fetch failed, retrying"
                    );
                    tokio::time::sleep(wait).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn stopped(reason: StopReason, warning: Option<FetchError>) -> FetchEvent {
    FetchEvent::Stopped { reason, warning }
}
