//! Streaming client core for the Agentic Foundry backend.
//!
//! Two pieces do the real work:
//!
//! - [`sse`] and [`stream`] turn a chunked `text/event-stream` body into parsed
//!   payloads and stop at the `all_done` sentinel.
//! - [`steps`] rebuilds the agent's execution-step tree from the flat
//!   `Started`/`Completed`/content records of a chat stream and numbers it for
//!   display.
//!
//! [`client`] wires both to the backend's comparison and chat endpoints.
//!
//! ```no_run
//! use foundry_stream::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), FoundryError> {
//! let client = FoundryClient::from_env()?;
//! let stream = client.chat(&ChatRequest::new("agent-1", "Plan my week")).await?;
//! let log = collect_steps(stream).await?;
//! for step in log.display() {
//!     println!("{} {} ({:?})", step.display_number, step.name, step.status);
//! }
//! # Ok(())
//! # }
//! ```

/// Bearer credential sources.
pub mod auth;
/// HTTP client for the streaming endpoints.
pub mod client;
/// Typed view over model-comparison progress payloads.
pub mod comparison;
/// Client configuration and `.env` loading.
pub mod config;
/// Public error types.
pub mod errors;
/// Process-wide tracing setup.
pub mod observability;
/// Common imports for typical usage.
pub mod prelude;
/// SSE frame decoding.
pub mod sse;
/// Execution-step tree reconstruction and display numbering.
pub mod steps;
/// Body read loop, stream handle and cancellation.
pub mod stream;

pub use auth::{CredentialStore, NoCredentials, StaticToken};
pub use client::{ChatRequest, FoundryClient};
pub use comparison::ComparisonProgress;
pub use config::FoundryClientConfig;
pub use errors::{FoundryError, TransportError};
pub use sse::{SseDecoder, SseFrame, SsePayload};
pub use steps::{DisplayNode, StepLog, StepNode, StepStatus};
pub use stream::{AbortHandle, FinishReason, PayloadStream, StreamEvent, StreamSummary};
