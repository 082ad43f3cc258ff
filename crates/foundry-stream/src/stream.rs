use std::collections::VecDeque;
use std::pin::Pin;

use bytes::Bytes;
use futures::StreamExt as _;
use futures::stream::{self, Stream};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{Instrument as _, debug, trace, warn};

use crate::errors::TransportError;
use crate::observability::stream_span;
use crate::sse::{SseDecoder, SsePayload};

/// Boxed response body as a stream of byte chunks.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, TransportError>> + Send + 'static>>;

/// Reads a body chunk by chunk and yields one payload per SSE frame.
///
/// Once the terminal payload has been yielded the body is dropped and no
/// further chunk is read, even if the server keeps the connection open. A read
/// error is yielded once and ends the stream.
pub fn payload_stream(
    bytes_stream: ByteStream,
) -> impl Stream<Item = Result<SsePayload, TransportError>> + Send {
    struct State {
        body: Option<ByteStream>,
        decoder: SseDecoder,
        pending: VecDeque<SsePayload>,
    }

    stream::try_unfold(
        State {
            body: Some(bytes_stream),
            decoder: SseDecoder::default(),
            pending: VecDeque::new(),
        },
        |mut state| async move {
            loop {
                if let Some(payload) = state.pending.pop_front() {
                    if payload.is_terminal() {
                        state.pending.clear();
                        state.body = None;
                    }
                    return Ok(Some((payload, state)));
                }
                let Some(body) = state.body.as_mut() else {
                    return Ok(None);
                };

                match body.next().await {
                    Some(Ok(chunk)) => {
                        for frame in state.decoder.push_chunk(&chunk) {
                            trace!(event = ?frame.event, len = frame.data.len(), "sse frame");
                            state.pending.push_back(frame.payload());
                        }
                    }
                    Some(Err(err)) => return Err(err),
                    None => {
                        state.body = None;
                        if let Some(frame) = state.decoder.finish() {
                            state.pending.push_back(frame.payload());
                        }
                    }
                }
            }
        },
    )
}

/// Why a stream ended without failing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// The server sent the `all_done` sentinel.
    Terminal,
    /// The body closed without a sentinel.
    EndOfStream,
}

/// Events exposed by `PayloadStream`.
#[derive(Clone, Debug, PartialEq)]
pub enum StreamEvent {
    /// First event of every stream.
    Opened { stream_id: uuid::Uuid },
    /// One decoded frame.
    Payload {
        stream_id: uuid::Uuid,
        seq: u64,
        payload: SsePayload,
    },
    /// Terminal success event.
    Finished {
        stream_id: uuid::Uuid,
        reason: FinishReason,
    },
    /// Terminal failure event.
    Failed {
        stream_id: uuid::Uuid,
        error: TransportError,
    },
}

/// Final outcome of a stream that did not fail.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamSummary {
    pub stream_id: uuid::Uuid,
    /// Number of payloads delivered.
    pub payloads: u64,
    pub reason: FinishReason,
}

/// Handle used to stop a running stream.
#[derive(Clone)]
pub struct AbortHandle {
    tx: watch::Sender<bool>,
}

impl AbortHandle {
    /// Requests cancellation.
    ///
    /// The read loop stops at its next suspension point and the consumer sees
    /// `StreamEvent::Failed` with `TransportError::Cancelled`.
    pub fn abort(&self) {
        let _ = self.tx.send(true);
    }
}

/// Consumer side of a body read loop running on its own task.
///
/// Dropping it stops the loop and releases the body, even while clones of its
/// `AbortHandle` are still alive.
pub struct PayloadStream {
    stream_id: uuid::Uuid,
    rx: mpsc::Receiver<StreamEvent>,
    final_rx: oneshot::Receiver<Result<StreamSummary, TransportError>>,
    abort_handle: AbortHandle,
    saw_terminal: bool,
}

impl PayloadStream {
    /// Spawns the read loop for `body` on the current tokio runtime.
    ///
    /// `capacity` bounds the number of undelivered events (zero is treated as one).
    pub fn spawn(body: ByteStream, capacity: usize) -> Self {
        let stream_id = uuid::Uuid::new_v4();
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let (final_tx, final_rx) = oneshot::channel();
        let (abort_tx, abort_rx) = watch::channel(false);
        tokio::spawn(
            read_task(stream_id, body, tx, final_tx, abort_rx).instrument(stream_span(stream_id)),
        );
        Self {
            stream_id,
            rx,
            final_rx,
            abort_handle: AbortHandle { tx: abort_tx },
            saw_terminal: false,
        }
    }

    /// Returns the id carried by every event of this stream.
    pub fn stream_id(&self) -> uuid::Uuid {
        self.stream_id
    }

    /// Returns a handle that can cancel the stream.
    pub fn abort_handle(&self) -> AbortHandle {
        self.abort_handle.clone()
    }

    /// Waits for the next event. Returns `None` once the stream is closed.
    pub async fn next_event(&mut self) -> Option<StreamEvent> {
        let event = self.rx.recv().await;
        if let Some(StreamEvent::Finished { .. } | StreamEvent::Failed { .. }) = &event {
            self.saw_terminal = true;
        }
        event
    }

    /// Drains the stream (if needed) and returns its outcome.
    pub async fn finish(mut self) -> Result<StreamSummary, TransportError> {
        while !self.saw_terminal {
            match self.rx.recv().await {
                Some(StreamEvent::Finished { .. } | StreamEvent::Failed { .. }) => {
                    self.saw_terminal = true;
                }
                Some(_) => {}
                None => break,
            }
        }
        match self.final_rx.await {
            Ok(result) => result,
            Err(_) => Err(TransportError::protocol(format!(
                "read task ended without final result (stream={})",
                self.stream_id
            ))),
        }
    }

    /// Collects every payload not yet consumed through `next_event()`.
    pub async fn collect_payloads(mut self) -> Result<Vec<SsePayload>, TransportError> {
        let mut payloads = Vec::new();
        while let Some(event) = self.next_event().await {
            match event {
                StreamEvent::Payload { payload, .. } => payloads.push(payload),
                StreamEvent::Failed { error, .. } => return Err(error),
                StreamEvent::Finished { .. } => break,
                StreamEvent::Opened { .. } => {}
            }
        }
        self.finish().await?;
        Ok(payloads)
    }
}

async fn read_task(
    stream_id: uuid::Uuid,
    body: ByteStream,
    tx: mpsc::Sender<StreamEvent>,
    final_tx: oneshot::Sender<Result<StreamSummary, TransportError>>,
    mut abort_rx: watch::Receiver<bool>,
) {
    if !send_event(&tx, StreamEvent::Opened { stream_id }).await {
        let _ = final_tx.send(Err(TransportError::protocol(
            "stream receiver dropped before open",
        )));
        return;
    }

    let mut payloads = Box::pin(payload_stream(body));
    let mut seq = 0_u64;
    loop {
        tokio::select! {
            biased;

            changed = abort_rx.changed() => {
                match changed {
                    Ok(()) if *abort_rx.borrow() => {
                        debug!(stream_id = %stream_id, seq, "stream aborted by caller");
                        let error = TransportError::Cancelled;
                        let _ = send_event(&tx, StreamEvent::Failed { stream_id, error: error.clone() }).await;
                        let _ = final_tx.send(Err(error));
                        return;
                    }
                    Ok(()) => {}
                    // Every abort handle is gone, so nobody is left to read.
                    Err(_) => return,
                }
            }
            _ = tx.closed() => {
                debug!(stream_id = %stream_id, seq, "stream receiver dropped, releasing body");
                return;
            }
            next = payloads.next() => {
                match next {
                    Some(Ok(payload)) => {
                        let terminal = payload.is_terminal();
                        let sent = send_event(&tx, StreamEvent::Payload { stream_id, seq, payload }).await;
                        seq = seq.saturating_add(1);
                        if !sent {
                            let _ = final_tx.send(Err(TransportError::protocol("stream receiver dropped during read")));
                            return;
                        }
                        if terminal {
                            debug!(stream_id = %stream_id, payloads = seq, "terminal sentinel received");
                            finish_ok(&tx, final_tx, stream_id, seq, FinishReason::Terminal).await;
                            return;
                        }
                    }
                    Some(Err(error)) => {
                        warn!(stream_id = %stream_id, seq, %error, "stream read failed");
                        let _ = send_event(&tx, StreamEvent::Failed { stream_id, error: error.clone() }).await;
                        let _ = final_tx.send(Err(error));
                        return;
                    }
                    None => {
                        debug!(stream_id = %stream_id, payloads = seq, "stream body closed");
                        finish_ok(&tx, final_tx, stream_id, seq, FinishReason::EndOfStream).await;
                        return;
                    }
                }
            }
        }
    }
}

async fn finish_ok(
    tx: &mpsc::Sender<StreamEvent>,
    final_tx: oneshot::Sender<Result<StreamSummary, TransportError>>,
    stream_id: uuid::Uuid,
    payloads: u64,
    reason: FinishReason,
) {
    let sent = send_event(tx, StreamEvent::Finished { stream_id, reason }).await;
    let _ = final_tx.send(if sent {
        Ok(StreamSummary {
            stream_id,
            payloads,
            reason,
        })
    } else {
        Err(TransportError::protocol(
            "stream receiver dropped before completion",
        ))
    });
}

async fn send_event(tx: &mpsc::Sender<StreamEvent>, event: StreamEvent) -> bool {
    tx.send(event).await.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt as _;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    fn body_from_chunks(chunks: &[&str]) -> ByteStream {
        let items: Vec<Result<Bytes, TransportError>> = chunks
            .iter()
            .map(|c| Ok(Bytes::copy_from_slice(c.as_bytes())))
            .collect();
        Box::pin(stream::iter(items))
    }

    fn counted_body(chunks: &[&str], reads: Arc<AtomicUsize>) -> ByteStream {
        let items: Vec<Result<Bytes, TransportError>> = chunks
            .iter()
            .map(|c| Ok(Bytes::copy_from_slice(c.as_bytes())))
            .collect();
        Box::pin(stream::iter(items).inspect(move |_| {
            reads.fetch_add(1, Ordering::SeqCst);
        }))
    }

    #[tokio::test]
    async fn terminal_sentinel_stops_reading_further_chunks() {
        let reads = Arc::new(AtomicUsize::new(0));
        let body = counted_body(
            &[
                "data: {\"status\":\"working\"}\n\n",
                "data: {\"status\":\"all_done\"}\n\n",
                "data: {\"status\":\"ignored\"}\n\n",
            ],
            reads.clone(),
        );
        let payloads: Vec<_> = payload_stream(body).collect().await;
        assert_eq!(payloads.len(), 2);
        assert_eq!(
            payloads[1],
            Ok(SsePayload::Json(serde_json::json!({"status":"all_done"})))
        );
        assert_eq!(reads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn frames_after_sentinel_in_same_chunk_are_discarded() {
        let body = body_from_chunks(&[
            "data: {\"status\":\"all_done\"}\n\ndata: {\"status\":\"late\"}\n\n",
        ]);
        let payloads: Vec<_> = payload_stream(body).collect().await;
        assert_eq!(payloads.len(), 1);
    }

    #[tokio::test]
    async fn read_error_is_yielded_once_and_ends_stream() {
        let items: Vec<Result<Bytes, TransportError>> = vec![
            Ok(Bytes::from_static(b"data: one\n\n")),
            Err(TransportError::read("connection reset")),
            Ok(Bytes::from_static(b"data: two\n\n")),
        ];
        let payloads: Vec<_> = payload_stream(Box::pin(stream::iter(items))).collect().await;
        assert_eq!(
            payloads,
            vec![
                Ok(SsePayload::Text("one".into())),
                Err(TransportError::read("connection reset")),
            ]
        );
    }

    #[tokio::test]
    async fn unterminated_trailing_frame_is_flushed_at_end_of_body() {
        let body = body_from_chunks(&["data: {\"a\":1}\n\ndata: tail"]);
        let payloads: Vec<_> = payload_stream(body).collect().await;
        assert_eq!(payloads.len(), 2);
        assert_eq!(payloads[1], Ok(SsePayload::Text("tail".into())));
    }

    #[tokio::test]
    async fn handle_emits_opened_payloads_then_finished() {
        let mut stream = PayloadStream::spawn(
            body_from_chunks(&["data: plain text\n\n", "data: {\"status\":\"all_done\"}\n\n"]),
            8,
        );
        assert!(matches!(
            stream.next_event().await,
            Some(StreamEvent::Opened { .. })
        ));
        match stream.next_event().await {
            Some(StreamEvent::Payload { seq, payload, .. }) => {
                assert_eq!(seq, 0);
                assert_eq!(payload, SsePayload::Text("plain text".into()));
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(matches!(
            stream.next_event().await,
            Some(StreamEvent::Payload { seq: 1, .. })
        ));
        assert!(matches!(
            stream.next_event().await,
            Some(StreamEvent::Finished {
                reason: FinishReason::Terminal,
                ..
            })
        ));
        let summary = stream.finish().await.expect("summary");
        assert_eq!(summary.payloads, 2);
        assert_eq!(summary.reason, FinishReason::Terminal);
    }

    #[tokio::test]
    async fn body_close_without_sentinel_finishes_with_end_of_stream() {
        let stream = PayloadStream::spawn(body_from_chunks(&["data: {\"n\":1}\n\n"]), 4);
        let summary = stream.finish().await.expect("summary");
        assert_eq!(summary.reason, FinishReason::EndOfStream);
        assert_eq!(summary.payloads, 1);
    }

    #[tokio::test]
    async fn read_failure_surfaces_from_collect() {
        let items: Vec<Result<Bytes, TransportError>> =
            vec![Err(TransportError::read("network down"))];
        let stream = PayloadStream::spawn(Box::pin(stream::iter(items)), 4);
        assert_eq!(
            stream.collect_payloads().await,
            Err(TransportError::read("network down"))
        );
    }

    #[tokio::test]
    async fn abort_stops_a_pending_stream() {
        let mut stream = PayloadStream::spawn(
            Box::pin(stream::pending::<Result<Bytes, TransportError>>()),
            4,
        );
        let abort = stream.abort_handle();
        let _ = stream.next_event().await;
        abort.abort();

        let mut saw_cancel = false;
        while let Some(event) = stream.next_event().await {
            if let StreamEvent::Failed {
                error: TransportError::Cancelled,
                ..
            } = event
            {
                saw_cancel = true;
                break;
            }
        }
        assert!(saw_cancel);
        assert_eq!(stream.finish().await, Err(TransportError::Cancelled));
    }

    #[tokio::test]
    async fn abort_before_first_read_delivers_no_payloads() {
        let chunks: Vec<String> = (0..50).map(|n| format!("data: {{\"n\":{n}}}\n\n")).collect();
        let chunk_refs: Vec<&str> = chunks.iter().map(String::as_str).collect();
        let mut stream = PayloadStream::spawn(body_from_chunks(&chunk_refs), 256);
        stream.abort_handle().abort();

        let mut payloads = 0;
        let mut cancelled = false;
        while let Some(event) = stream.next_event().await {
            match event {
                StreamEvent::Payload { .. } => payloads += 1,
                StreamEvent::Failed {
                    error: TransportError::Cancelled,
                    ..
                } => {
                    cancelled = true;
                    break;
                }
                StreamEvent::Opened { .. } => {}
                other => panic!("unexpected event: {other:?}"),
            }
        }
        assert!(cancelled);
        assert_eq!(payloads, 0);
    }

    struct DropFlag(Arc<AtomicBool>);

    impl Drop for DropFlag {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn dropping_the_stream_releases_an_idle_body() {
        let released = Arc::new(AtomicBool::new(false));
        let guard = DropFlag(released.clone());
        let body: ByteStream = Box::pin(
            stream::pending::<Result<Bytes, TransportError>>().inspect(move |_| {
                let _held = &guard;
            }),
        );

        let mut stream = PayloadStream::spawn(body, 4);
        let handle = stream.abort_handle();
        assert!(matches!(
            stream.next_event().await,
            Some(StreamEvent::Opened { .. })
        ));
        drop(stream);

        for _ in 0..100 {
            if released.load(Ordering::SeqCst) {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(released.load(Ordering::SeqCst));
        drop(handle);
    }
}
