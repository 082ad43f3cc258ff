/// Failure of a single SSE body read loop.
///
/// Malformed frames are never reported here; they degrade to
/// `SsePayload::Text`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, serde::Serialize, serde::Deserialize)]
pub enum TransportError {
    /// Reading the next chunk from the response body failed.
    #[error("stream read failed: {message}")]
    Read { message: String },
    /// The caller aborted the stream.
    #[error("stream cancelled")]
    Cancelled,
    /// The read loop and its consumer disagreed about the stream lifecycle.
    #[error("stream protocol error: {message}")]
    Protocol { message: String },
}

impl TransportError {
    /// Creates a read error.
    pub fn read(message: impl Into<String>) -> Self {
        Self::Read {
            message: message.into(),
        }
    }

    /// Creates a protocol error.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }
}

/// Top-level error type for the public client API.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FoundryError {
    /// Invalid client configuration.
    #[error("config error: {0}")]
    Config(String),
    /// Invalid caller input (blank model name, empty query, ...).
    #[error("validation error: {0}")]
    Validation(String),
    /// The backend answered with a non-success status.
    #[error("request failed with status {status}: {body}")]
    Http { status: u16, body: String },
    /// The backend answered without a readable body.
    #[error("response has no readable body")]
    MissingBody,
    /// The request could not be sent or the connection failed.
    #[error("transport error: {0}")]
    Transport(String),
    /// A started stream ended with a failure.
    #[error(transparent)]
    Stream(TransportError),
}

impl From<TransportError> for FoundryError {
    fn from(value: TransportError) -> Self {
        FoundryError::Stream(value)
    }
}
