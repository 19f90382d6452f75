//! Session state controller: owns the working text, the selected tone and the
//! history mirror, and sequences every remote call the front end triggers.

use std::{
    future::Future,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use shared::{
    domain::{HistoryId, Tone},
    metrics::{measure, TextStats},
    protocol::{HistoryEntry, NewHistoryEntry, RephraseRequest, RephraseResult},
};
use tokio::sync::{broadcast, Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::{
    error::{ErrorKind, GatewayError, Operation, SessionError},
    gateway::RephraseGateway,
    history_cache::HistoryCache,
};

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Upper bound for every remote call; expiry is reported as a service failure.
    pub request_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Submitting,
}

/// Point-in-time copy of everything the rendering layer shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub input_text: String,
    pub tone: Tone,
    pub output_text: String,
    pub stats: TextStats,
    pub loading: bool,
    pub history: Vec<HistoryEntry>,
}

impl SessionState {
    pub fn phase(&self) -> SessionPhase {
        if self.loading {
            SessionPhase::Submitting
        } else {
            SessionPhase::Idle
        }
    }

    pub fn input_stats(&self) -> TextStats {
        measure(&self.input_text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Error(ErrorKind),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    LoadingChanged(bool),
    HistoryUpdated { entries: usize },
    Notice { level: NoticeLevel, message: String },
}

#[derive(Debug, Default)]
struct Workspace {
    input_text: String,
    tone: Tone,
    output_text: String,
    stats: TextStats,
}

/// Clears the loading flag when a submission ends, including when the
/// submitting future is dropped mid-flight.
struct LoadingGuard<'a> {
    loading: &'a AtomicBool,
    events: &'a broadcast::Sender<SessionEvent>,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.loading.store(false, Ordering::SeqCst);
        let _ = self.events.send(SessionEvent::LoadingChanged(false));
    }
}

pub struct SessionController {
    gateway: Arc<dyn RephraseGateway>,
    config: SessionConfig,
    inner: Mutex<Workspace>,
    // Only set while `inner` is held; cleared by `LoadingGuard`.
    loading: AtomicBool,
    history: RwLock<HistoryCache>,
    refresh_gate: Mutex<()>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionController {
    pub fn new(gateway: Arc<dyn RephraseGateway>) -> Self {
        Self::with_config(gateway, SessionConfig::default())
    }

    pub fn with_config(gateway: Arc<dyn RephraseGateway>, config: SessionConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            gateway,
            config,
            inner: Mutex::new(Workspace::default()),
            loading: AtomicBool::new(false),
            history: RwLock::new(HistoryCache::new()),
            refresh_gate: Mutex::new(()),
            events,
        }
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> SessionState {
        let history = self.history.read().await.entries().to_vec();
        let inner = self.inner.lock().await;
        SessionState {
            input_text: inner.input_text.clone(),
            tone: inner.tone,
            output_text: inner.output_text.clone(),
            stats: inner.stats,
            loading: self.loading.load(Ordering::SeqCst),
            history,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }

    /// Counts for the current input, derived on every call.
    pub async fn input_stats(&self) -> TextStats {
        measure(&self.inner.lock().await.input_text)
    }

    pub async fn set_input(&self, text: impl Into<String>) {
        self.inner.lock().await.input_text = text.into();
    }

    /// Only affects later submissions; the displayed output is untouched.
    pub async fn set_tone(&self, tone: Tone) {
        self.inner.lock().await.tone = tone;
        debug!(%tone, "tone selected");
    }

    /// Rephrases the current input with the current tone, applies the result,
    /// records it in the remote history and refreshes the history mirror.
    ///
    /// Rejected without any remote call when the input is blank or another
    /// submission is still in flight.
    pub async fn submit(&self) -> Result<RephraseResult, SessionError> {
        let request = {
            let inner = self.inner.lock().await;
            if self.is_loading() {
                drop(inner);
                return Err(self.report(SessionError::Busy));
            }
            let request = match RephraseRequest::new(inner.input_text.clone(), inner.tone) {
                Ok(request) => request,
                Err(err) => {
                    drop(inner);
                    return Err(self.report(err.into()));
                }
            };
            self.loading.store(true, Ordering::SeqCst);
            request
        };
        let loading = LoadingGuard {
            loading: &self.loading,
            events: &self.events,
        };
        self.emit(SessionEvent::LoadingChanged(true));
        info!(
            tone = %request.tone,
            chars = measure(&request.text).chars,
            "rephrase submitted"
        );

        let outcome = self.run_submission(&request).await;
        drop(loading);

        match outcome {
            Ok(result) => {
                self.notify_success("Text rephrased successfully!");
                Ok(result)
            }
            Err(err) => Err(self.report(err)),
        }
    }

    async fn run_submission(
        &self,
        request: &RephraseRequest,
    ) -> Result<RephraseResult, SessionError> {
        let result = self
            .call(Operation::Rephrase, self.gateway.submit_rephrase(request))
            .await?;

        {
            let mut inner = self.inner.lock().await;
            inner.output_text = result.rephrased_text.clone();
            inner.stats = result.stats();
        }

        // The tone captured at dispatch is persisted, not whatever is selected now.
        let new_entry = NewHistoryEntry {
            original_text: request.text.clone(),
            rephrased_text: result.rephrased_text.clone(),
            tone: request.tone,
        };
        let created = self
            .call(
                Operation::SaveHistory,
                self.gateway.create_history_entry(&new_entry),
            )
            .await?;
        debug!(history_id = %created.id, "history entry created");

        self.refresh_cache().await?;
        Ok(result)
    }

    /// Resets input, output and stats. Refused while a submission is in flight.
    pub async fn clear(&self) -> Result<(), SessionError> {
        let mut inner = self.inner.lock().await;
        if self.is_loading() {
            drop(inner);
            return Err(self.report(SessionError::Busy));
        }
        inner.input_text.clear();
        inner.output_text.clear();
        inner.stats = TextStats::default();
        Ok(())
    }

    /// Restores a past rephrasing into the workspace without any remote call.
    pub async fn load_history_item(&self, id: HistoryId) -> Result<HistoryEntry, SessionError> {
        let cached = self.history.read().await.get(id).cloned();
        let Some(entry) = cached else {
            return Err(self.report(SessionError::UnknownHistoryItem(id)));
        };

        let mut inner = self.inner.lock().await;
        if self.is_loading() {
            drop(inner);
            return Err(self.report(SessionError::Busy));
        }
        inner.input_text = entry.original_text.clone();
        inner.output_text = entry.rephrased_text.clone();
        inner.tone = entry.tone;
        inner.stats = measure(&entry.rephrased_text);
        drop(inner);

        self.notify_success("Loaded from history");
        Ok(entry)
    }

    /// Deletes a history entry remotely, then refreshes the mirror. An unknown
    /// id leaves both the workspace and the mirror untouched.
    pub async fn delete_history_item(&self, id: HistoryId) -> Result<(), SessionError> {
        if let Err(err) = self
            .call(
                Operation::DeleteHistory,
                self.gateway.delete_history_entry(id),
            )
            .await
        {
            return Err(self.report(err));
        }
        info!(history_id = %id, "history entry deleted");

        if let Err(err) = self.refresh_cache().await {
            return Err(self.report(err));
        }
        self.notify_success("History item deleted");
        Ok(())
    }

    /// Re-fetches the full history list, e.g. on start-up.
    pub async fn refresh_history(&self) -> Result<usize, SessionError> {
        match self.refresh_cache().await {
            Ok(entries) => Ok(entries),
            Err(err) => Err(self.report(err)),
        }
    }

    // Refreshes run one at a time behind the gate. The fetch fills a fresh
    // cache and readers only wait for the swap, never for the network.
    async fn refresh_cache(&self) -> Result<usize, SessionError> {
        let _gate = self.refresh_gate.lock().await;
        let mut fresh = HistoryCache::new();
        let entries = self
            .call(Operation::LoadHistory, fresh.refresh(self.gateway.as_ref()))
            .await?;
        *self.history.write().await = fresh;
        self.emit(SessionEvent::HistoryUpdated { entries });
        Ok(entries)
    }

    async fn call<T>(
        &self,
        operation: Operation,
        request: impl Future<Output = Result<T, GatewayError>>,
    ) -> Result<T, SessionError> {
        let timeout = self.config.request_timeout;
        match tokio::time::timeout(timeout, request).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(source)) => Err(SessionError::from_gateway(operation, source)),
            Err(_) => Err(SessionError::Timeout { operation, timeout }),
        }
    }

    fn report(&self, err: SessionError) -> SessionError {
        warn!(error = %err, kind = ?err.kind(), "session command failed");
        self.emit(SessionEvent::Notice {
            level: NoticeLevel::Error(err.kind()),
            message: err.notification(),
        });
        err
    }

    fn notify_success(&self, message: &str) {
        self.emit(SessionEvent::Notice {
            level: NoticeLevel::Success,
            message: message.to_string(),
        });
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
