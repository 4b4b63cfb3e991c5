use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::json;
use tracing::debug;
use url::Url;

use crate::error::ClientError;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// One question/answer pair exchanged with the question-answering service.
///
/// The service also reports the row id and the time the pair was stored.
/// Both are optional so that older or simpler backends still deserialize.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ConversationEntry {
    pub question: String,
    pub answer: String,
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub timestamp: Option<NaiveDateTime>,
}

#[cfg(test)]
impl ConversationEntry {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
            id: None,
            timestamp: None,
        }
    }
}

/// The two calls the chat view makes against the remote service.
#[async_trait]
pub trait QaBackend: Send + Sync {
    /// Fetch every stored question/answer pair, oldest first.
    async fn conversations(&self) -> Result<Vec<ConversationEntry>, ClientError>;

    /// Ask a question and return the pair the service stored for it.
    async fn ask(&self, question: &str) -> Result<ConversationEntry, ClientError>;
}

pub struct HttpQaClient {
    base_url: Url,
    client: reqwest::Client,
}

impl HttpQaClient {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let mut base_url = Url::parse(base_url)?;

        // Url::join replaces the last path segment unless the base ends in '/'
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            base_url,
            client: reqwest::Client::new(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        Ok(self.base_url.join(path)?)
    }

    async fn read_json<T: DeserializeOwned>(
        url: &Url,
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|source| ClientError::Transport {
                url: url.to_string(),
                source,
            })?;

        if !status.is_success() {
            return Err(ClientError::Status {
                url: url.to_string(),
                status,
                body,
            });
        }

        debug!("Received response from {}: {}", url, body);

        serde_json::from_str(&body).map_err(|source| ClientError::Decode {
            url: url.to_string(),
            source,
        })
    }
}

#[async_trait]
impl QaBackend for HttpQaClient {
    async fn conversations(&self) -> Result<Vec<ConversationEntry>, ClientError> {
        let url = self.endpoint("conversations")?;
        debug!("Fetching conversation history from {}", url);

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|source| ClientError::Transport {
                url: url.to_string(),
                source,
            })?;

        Self::read_json(&url, response).await
    }

    async fn ask(&self, question: &str) -> Result<ConversationEntry, ClientError> {
        let url = self.endpoint("ask")?;
        let request_body = json!({ "question": question });
        debug!("Sending question to {}: {}", url, request_body);

        let response = self
            .client
            .post(url.clone())
            .json(&request_body)
            .send()
            .await
            .map_err(|source| ClientError::Transport {
                url: url.to_string(),
                source,
            })?;

        Self::read_json(&url, response).await
    }
}

/// Accepts RFC 3339 or naive ISO-8601 timestamps. Anything else is dropped
/// instead of failing the whole payload.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(parse_timestamp))
}

fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(parsed) => Some(parsed.naive_utc()),
        Err(_) => match raw.parse::<NaiveDateTime>() {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                debug!("Ignoring unparseable timestamp {:?}: {}", raw, e);
                None
            }
        },
    }
}
