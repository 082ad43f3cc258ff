use std::sync::Arc;

use futures::StreamExt as _;
use reqwest::header::ACCEPT;
use tracing::debug;

use crate::auth::{CredentialStore, NoCredentials, StaticToken};
use crate::config::FoundryClientConfig;
use crate::errors::{FoundryError, TransportError};
use crate::stream::{ByteStream, PayloadStream};

const EVENT_STREAM: &str = "text/event-stream";

/// Body of a chat inference request.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ChatRequest {
    /// Agent that answers the query.
    pub agentic_application_id: String,
    /// User message.
    pub query: String,
    /// Conversation the message belongs to.
    pub session_id: String,
    /// Model used by the agent.
    pub model_name: String,
    /// Starts a fresh conversation for `session_id`.
    #[serde(default)]
    pub reset_conversation: bool,
}

impl ChatRequest {
    /// Creates a request in a new session with no model override.
    pub fn new(agentic_application_id: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            agentic_application_id: agentic_application_id.into(),
            query: query.into(),
            session_id: uuid::Uuid::new_v4().to_string(),
            model_name: String::new(),
            reset_conversation: false,
        }
    }

    pub fn session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self
    }

    pub fn model_name(mut self, model_name: impl Into<String>) -> Self {
        self.model_name = model_name.into();
        self
    }

    pub fn reset_conversation(mut self, reset: bool) -> Self {
        self.reset_conversation = reset;
        self
    }

    fn validate(&self) -> Result<(), FoundryError> {
        if self.agentic_application_id.trim().is_empty() {
            return Err(FoundryError::Validation(
                "agentic_application_id must not be empty".into(),
            ));
        }
        if self.query.trim().is_empty() {
            return Err(FoundryError::Validation("query must not be empty".into()));
        }
        Ok(())
    }
}

/// HTTP client for the backend's streaming endpoints.
///
/// Each call opens one response body and hands it to a `PayloadStream`. There
/// are no retries.
#[derive(Clone)]
pub struct FoundryClient {
    http: reqwest::Client,
    config: FoundryClientConfig,
    credentials: Arc<dyn CredentialStore>,
}

impl FoundryClient {
    /// Creates an unauthenticated client from explicit configuration.
    pub fn new(config: FoundryClientConfig) -> Result<Self, FoundryError> {
        config.validate()?;
        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| FoundryError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            config,
            credentials: Arc::new(NoCredentials),
        })
    }

    /// Creates a client from `FOUNDRY_*` variables, with a bearer token when
    /// `FOUNDRY_API_TOKEN` is set.
    pub fn from_env() -> Result<Self, FoundryError> {
        let client = Self::new(FoundryClientConfig::from_env()?)?;
        Ok(match StaticToken::from_env() {
            Some(token) => client.with_credentials(Arc::new(token)),
            None => client,
        })
    }

    /// Replaces the credential source.
    pub fn with_credentials(mut self, credentials: Arc<dyn CredentialStore>) -> Self {
        self.credentials = credentials;
        self
    }

    /// Returns the active configuration.
    pub fn config(&self) -> &FoundryClientConfig {
        &self.config
    }

    /// Starts an LLM-judge comparison between two models.
    ///
    /// Payloads carry `status`, `evaluation_id`, `message`, `processed` and
    /// `remaining`; see `ComparisonProgress`. The stream ends at `all_done`.
    pub async fn compare_models(
        &self,
        model1: &str,
        model2: &str,
    ) -> Result<PayloadStream, FoundryError> {
        if model1.trim().is_empty() || model2.trim().is_empty() {
            return Err(FoundryError::Validation(
                "both model names are required".into(),
            ));
        }
        let request = self
            .http
            .post(self.config.compare_url())
            .query(&[("model1", model1.trim()), ("model2", model2.trim())]);
        debug!(model1, model2, "starting comparison stream");
        self.open_stream(request, "comparison").await
    }

    /// Sends a chat query and streams the agent's execution steps.
    pub async fn chat(&self, request: &ChatRequest) -> Result<PayloadStream, FoundryError> {
        request.validate()?;
        let http_request = self.http.post(self.config.chat_url()).json(request);
        debug!(
            agent = %request.agentic_application_id,
            session_id = %request.session_id,
            "starting chat stream"
        );
        self.open_stream(http_request, "chat").await
    }

    async fn open_stream(
        &self,
        request: reqwest::RequestBuilder,
        label: &'static str,
    ) -> Result<PayloadStream, FoundryError> {
        let mut request = request.header(ACCEPT, EVENT_STREAM);
        if let Some(token) = self.credentials.bearer_token().await {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| FoundryError::Transport(format!("{label} request failed: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(FoundryError::Http {
                status: status.as_u16(),
                body,
            });
        }
        if response.content_length() == Some(0) {
            return Err(FoundryError::MissingBody);
        }

        let body: ByteStream = Box::pin(
            response
                .bytes_stream()
                .map(|chunk| chunk.map_err(|e| TransportError::read(e.to_string()))),
        );
        let stream = PayloadStream::spawn(body, self.config.stream_buffer_capacity);
        debug!(stream_id = %stream.stream_id(), label, "stream opened");
        Ok(stream)
    }
}
