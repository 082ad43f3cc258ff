//! Common imports for typical client usage.
pub use crate::steps::{collect_steps, reduce};
pub use crate::{
    AbortHandle, ChatRequest, ComparisonProgress, CredentialStore, DisplayNode, FinishReason,
    FoundryClient, FoundryClientConfig, FoundryError, PayloadStream, SsePayload, StaticToken,
    StepLog, StepNode, StepStatus, StreamEvent, TransportError,
};
