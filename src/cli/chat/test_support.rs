use std::io::{self, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::cli::chat::conversation_state::RequestState;
use crate::error::ClientError;
use crate::qa_client::{ConversationEntry, QaBackend};

/// In-memory stand-in for the question-answering service.
pub struct MockBackend {
    history: Option<Vec<ConversationEntry>>,
    answer: Option<String>,
    asked: Mutex<Vec<String>>,
    history_calls: AtomicUsize,
    observed: Option<RequestState>,
    busy_during_ask: Mutex<Vec<bool>>,
    delay: Option<Duration>,
}

impl MockBackend {
    pub fn answering(answer: &str) -> Self {
        Self {
            history: Some(Vec::new()),
            answer: Some(answer.to_string()),
            asked: Mutex::new(Vec::new()),
            history_calls: AtomicUsize::new(0),
            observed: None,
            busy_during_ask: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    pub fn failing() -> Self {
        Self {
            answer: None,
            ..Self::answering("")
        }
    }

    pub fn with_history(mut self, history: Vec<ConversationEntry>) -> Self {
        self.history = Some(history);
        self
    }

    pub fn with_failing_history(mut self) -> Self {
        self.history = None;
        self
    }

    /// Record the flag's value each time `ask` runs.
    pub fn observing(mut self, state: RequestState) -> Self {
        self.observed = Some(state);
        self
    }

    /// Hold every `ask` for `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn asked(&self) -> Vec<String> {
        self.asked.lock().unwrap().clone()
    }

    pub fn history_calls(&self) -> usize {
        self.history_calls.load(Ordering::SeqCst)
    }

    pub fn busy_during_ask(&self) -> Vec<bool> {
        self.busy_during_ask.lock().unwrap().clone()
    }

    fn server_error(path: &str) -> ClientError {
        ClientError::Status {
            url: format!("http://localhost:8000/{}", path),
            status: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
            body: r#"{"detail":"Error processing request"}"#.to_string(),
        }
    }
}

#[async_trait]
impl QaBackend for MockBackend {
    async fn conversations(&self) -> Result<Vec<ConversationEntry>, ClientError> {
        self.history_calls.fetch_add(1, Ordering::SeqCst);
        self.history
            .clone()
            .ok_or_else(|| Self::server_error("conversations"))
    }

    async fn ask(&self, question: &str) -> Result<ConversationEntry, ClientError> {
        self.asked.lock().unwrap().push(question.to_string());
        if let Some(state) = &self.observed {
            self.busy_during_ask.lock().unwrap().push(state.is_busy());
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.answer {
            Some(answer) => Ok(ConversationEntry::new(question, answer.as_str())),
            None => Err(Self::server_error("ask")),
        }
    }
}

/// Writer whose contents stay readable after it is boxed into a view.
#[derive(Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).to_string()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
