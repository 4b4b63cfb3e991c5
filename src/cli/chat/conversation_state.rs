use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, error, info};

use crate::error::ChatError;
use crate::qa_client::{ConversationEntry, QaBackend};

/// Ordered question/answer pairs shown in the chat view.
///
/// Entries are only ever appended during a session. The one exception is the
/// history load, which replaces the log wholesale and bumps `generation` so
/// the renderer knows to redraw everything.
#[derive(Debug, Default)]
pub struct ConversationLog {
    entries: Vec<ConversationEntry>,
    generation: u64,
}

impl ConversationLog {
    pub fn entries(&self) -> &[ConversationEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn replace(&mut self, entries: Vec<ConversationEntry>) {
        self.entries = entries;
        self.generation += 1;
    }

    fn push(&mut self, entry: ConversationEntry) -> usize {
        self.entries.push(entry);
        self.entries.len() - 1
    }
}

/// Shared busy flag for the submission in flight.
///
/// Clones observe the same flag, which is how the spinner knows when to stop.
#[derive(Debug, Clone, Default)]
pub struct RequestState {
    busy: Arc<AtomicBool>,
}

impl RequestState {
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Marks a request as outstanding. Returns `None` if one already is.
    pub fn try_begin(&self) -> Option<RequestGuard> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RequestGuard {
                busy: Arc::clone(&self.busy),
            })
    }
}

/// Clears the busy flag when dropped, whatever way the request resolved.
#[derive(Debug)]
pub struct RequestGuard {
    busy: Arc<AtomicBool>,
}

impl Drop for RequestGuard {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

#[derive(Debug)]
pub enum SubmitOutcome {
    /// The answer was appended at this index of the log.
    Appended(usize),
    /// The draft was blank; nothing was sent.
    EmptyInput,
    /// Another submission is still outstanding; nothing was sent.
    Busy,
    /// The request failed. The draft is kept for a retry.
    Failed(ChatError),
}

/// State of one chat view: the log, the unsent draft and the busy flag.
#[derive(Debug, Default)]
pub struct ChatSession {
    log: ConversationLog,
    draft: String,
    request_state: RequestState,
    history_loaded: bool,
}

impl ChatSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&self) -> &ConversationLog {
        &self.log
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn set_draft(&mut self, draft: impl Into<String>) {
        self.draft = draft.into();
    }

    pub fn request_state(&self) -> RequestState {
        self.request_state.clone()
    }

    /// Seed the log with the service's stored conversations.
    ///
    /// Only the first call talks to the service; later calls return the
    /// current log length. On failure the log stays empty and the error is
    /// reported on the diagnostic channel before being returned.
    pub async fn load_history(&mut self, backend: &dyn QaBackend) -> Result<usize, ChatError> {
        if self.history_loaded {
            return Ok(self.log.len());
        }
        self.history_loaded = true;

        match backend.conversations().await {
            Ok(entries) => {
                info!("Loaded {} previous conversations", entries.len());
                self.log.replace(entries);
                Ok(self.log.len())
            }
            Err(e) => {
                error!("Error fetching conversations: {}", e);
                Err(ChatError::HistoryLoad(e))
            }
        }
    }

    /// Send the current draft to the service.
    ///
    /// A blank draft is rejected locally without logging. The draft is sent
    /// as typed, surrounding whitespace included, and is cleared only when
    /// the answer comes back.
    pub async fn submit(&mut self, backend: &dyn QaBackend) -> SubmitOutcome {
        if self.draft.trim().is_empty() {
            return SubmitOutcome::EmptyInput;
        }

        let _guard = match self.request_state.try_begin() {
            Some(guard) => guard,
            None => {
                debug!("Submission ignored, a request is already outstanding");
                return SubmitOutcome::Busy;
            }
        };

        match backend.ask(&self.draft).await {
            Ok(entry) => {
                debug!("Received answer (id {:?})", entry.id);
                let index = self.log.push(entry);
                self.draft.clear();
                SubmitOutcome::Appended(index)
            }
            Err(e) => {
                error!("Error fetching answer: {}", e);
                SubmitOutcome::Failed(ChatError::Submission(e))
            }
        }
    }
}
