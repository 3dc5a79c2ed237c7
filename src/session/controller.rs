//! Session controller: the single entry point for analysis requests.
//!
//! A submit walks through `request -> await -> closed check -> commit`. The
//! commit pushes into the history ring and folds into the tracker under one
//! lock, so readers never observe one updated without the other.

use super::aggregate::{AggregateStats, AggregateTracker};
use super::history::{HistoryRing, DEFAULT_HISTORY_CAPACITY};
use crate::client::{AnalysisBackend, BackendError};
use crate::models::{NormalizeError, ResultEnvelope};
use futures::future;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Longest text accepted for analysis, in characters.
pub const MAX_TEXT_CHARS: usize = 10_000;

/// Tunables for a session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub history_capacity: usize,
    pub max_text_chars: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            max_text_chars: MAX_TEXT_CHARS,
        }
    }
}

/// Non-error results of [`SessionController::submit`].
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// Blank input; nothing was sent.
    Ignored,
    /// Another request is still in flight; nothing was sent.
    Busy,
    /// The result was recorded and is now the latest one.
    Completed(Arc<ResultEnvelope>),
    /// The session was closed while the request was in flight.
    Discarded,
}

/// Failures of a single submit. None of them touch history or stats.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("text is {len} characters long; the limit is {max}")]
    TextTooLong { len: usize, max: usize },

    #[error("analysis failed: {0}")]
    Transport(#[source] BackendError),

    #[error("analysis service sent an unusable response: {0}")]
    Malformed(String),

    #[error("session is closed")]
    Closed,
}

impl From<BackendError> for SessionError {
    fn from(e: BackendError) -> Self {
        if e.is_malformed() {
            SessionError::Malformed(e.to_string())
        } else {
            SessionError::Transport(e)
        }
    }
}

impl From<NormalizeError> for SessionError {
    fn from(e: NormalizeError) -> Self {
        SessionError::Malformed(e.to_string())
    }
}

/// What [`SessionController::hydrate`] managed to load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HydrateReport {
    pub stats_seeded: bool,
    pub history_seeded: usize,
}

/// Read-only view handed to presentation code.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub latest: Option<Arc<ResultEnvelope>>,
    pub last_error: Option<String>,
    pub history: Vec<Arc<ResultEnvelope>>,
    pub stats: AggregateStats,
    pub busy: bool,
}

#[derive(Debug)]
struct SessionState {
    history: HistoryRing,
    tracker: AggregateTracker,
    latest: Option<Arc<ResultEnvelope>>,
    last_error: Option<String>,
}

/// Clears the busy flag when dropped, including when the submit future is
/// dropped mid-flight.
struct BusyGuard<'a>(&'a AtomicBool);

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| BusyGuard(flag))
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Owns the history ring and aggregate tracker for one dashboard session.
pub struct SessionController<B> {
    backend: B,
    state: Mutex<SessionState>,
    busy: AtomicBool,
    closed: AtomicBool,
    hydrated: AtomicBool,
    max_text_chars: usize,
}

impl<B: AnalysisBackend> SessionController<B> {
    pub fn new(backend: B, config: SessionConfig) -> Self {
        debug!(
            history_capacity = config.history_capacity,
            max_text_chars = config.max_text_chars,
            "Creating analysis session"
        );

        Self {
            backend,
            state: Mutex::new(SessionState {
                history: HistoryRing::new(config.history_capacity),
                tracker: AggregateTracker::new(),
                latest: None,
                last_error: None,
            }),
            busy: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            hydrated: AtomicBool::new(false),
            max_text_chars: config.max_text_chars,
        }
    }

    /// Analyze `text` and record the result.
    ///
    /// Issues at most one request. Blank text and calls made while another
    /// request is outstanding return without contacting the service.
    pub async fn submit(&self, text: &str) -> Result<SubmitOutcome, SessionError> {
        if self.is_closed() {
            return Err(SessionError::Closed);
        }

        if text.trim().is_empty() {
            debug!("Ignoring blank submission");
            return Ok(SubmitOutcome::Ignored);
        }

        let len = text.chars().count();
        if len > self.max_text_chars {
            let err = SessionError::TextTooLong {
                len,
                max: self.max_text_chars,
            };
            self.record_error(&err);
            return Err(err);
        }

        let Some(_guard) = BusyGuard::acquire(&self.busy) else {
            debug!("Rejecting submission while another analysis is in flight");
            return Ok(SubmitOutcome::Busy);
        };

        info!("Submitting {} characters for analysis", len);
        let response = self.backend.analyze(text).await;

        if self.is_closed() {
            debug!("Session closed while request was in flight; discarding result");
            return Ok(SubmitOutcome::Discarded);
        }

        let envelope = match response
            .map_err(SessionError::from)
            .and_then(|raw| raw.normalize(text.to_string()).map_err(SessionError::from))
        {
            Ok(envelope) => Arc::new(envelope),
            Err(err) => {
                warn!("Analysis failed: {}", err);
                self.record_error(&err);
                return Err(err);
            }
        };

        {
            let mut state = self.state.lock();
            state.history.push(Arc::clone(&envelope));
            state.tracker.fold(&envelope);
            state.latest = Some(Arc::clone(&envelope));
            state.last_error = None;
        }

        info!(
            safe = envelope.is_safe,
            risk = envelope.risk_score,
            threats = envelope.threats.len(),
            "Analysis {} recorded",
            envelope.id
        );
        Ok(SubmitOutcome::Completed(envelope))
    }

    /// Seed stats and history from the service's read-only endpoints.
    ///
    /// Each endpoint is optional: failures are logged and leave that part
    /// empty. Runs at most once per session, and never after local results
    /// exist.
    pub async fn hydrate(&self) -> HydrateReport {
        if self.is_closed() {
            return HydrateReport::default();
        }
        if self.state.lock().latest.is_some() {
            debug!("Session already has results; skipping hydration");
            return HydrateReport::default();
        }
        let Some(_guard) = BusyGuard::acquire(&self.busy) else {
            debug!("Skipping hydration while an analysis is in flight");
            return HydrateReport::default();
        };
        if self.hydrated.swap(true, Ordering::AcqRel) {
            debug!("Session already hydrated");
            return HydrateReport::default();
        }

        let (stats, history) = future::join(self.backend.stats(), self.backend.history()).await;

        if self.is_closed() {
            return HydrateReport::default();
        }

        let mut entries: Vec<Arc<ResultEnvelope>> = match history {
            Ok(raw_entries) => raw_entries
                .into_iter()
                .enumerate()
                .filter_map(|(index, raw)| {
                    let text = raw.text.clone().unwrap_or_default();
                    match raw.normalize(text) {
                        Ok(envelope) => Some(Arc::new(envelope)),
                        Err(e) => {
                            warn!("Skipping history entry #{}: {}", index, e);
                            None
                        }
                    }
                })
                .collect(),
            Err(e) => {
                warn!("Could not load history: {}", e);
                Vec::new()
            }
        };
        entries.sort_by_key(|e| e.timestamp);

        let mut report = HydrateReport::default();
        let mut state = self.state.lock();

        match stats {
            Ok(server) => report.stats_seeded = state.tracker.seed(&server),
            Err(e) => warn!("Could not load stats: {}", e),
        }

        state.history.seed(entries);
        report.history_seeded = state.history.len();

        info!(
            stats = report.stats_seeded,
            history = report.history_seeded,
            "Session hydrated"
        );
        report
    }

    /// Tear the session down. In-flight results are dropped on arrival.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            debug!("Session closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub fn latest(&self) -> Option<Arc<ResultEnvelope>> {
        self.state.lock().latest.clone()
    }

    /// Message of the most recent failed submission, cleared by the next success.
    pub fn last_error(&self) -> Option<String> {
        self.state.lock().last_error.clone()
    }

    pub fn stats(&self) -> AggregateStats {
        self.state.lock().tracker.snapshot()
    }

    /// Recent results, newest first.
    pub fn history(&self) -> Vec<Arc<ResultEnvelope>> {
        self.state.lock().history.to_sequence()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.state.lock();
        SessionSnapshot {
            latest: state.latest.clone(),
            last_error: state.last_error.clone(),
            history: state.history.to_sequence(),
            stats: state.tracker.snapshot(),
            busy: self.is_busy(),
        }
    }

    fn record_error(&self, err: &SessionError) {
        self.state.lock().last_error = Some(err.to_string());
    }
}
