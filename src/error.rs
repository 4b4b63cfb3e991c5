use thiserror::Error;

/// Failures talking to the question-answering service.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid service URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} responded with {status}: {body}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("malformed response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Failures surfaced by the chat session, one per network effect.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Error fetching conversations")]
    HistoryLoad(#[source] ClientError),

    #[error("Error fetching answer")]
    Submission(#[source] ClientError),
}
