//! SSE framing: event-to-bytes encoding, wall-clock timeout, and the
//! terminal-event guarantee.
//!
//! Each event is one `data: <json>\n\n` frame, flushed as it is produced
//! (the body is an unbuffered stream; hyper writes frames as they are
//! polled). The framer owns the deadline and the per-request cancellation
//! token: timeout cancels upstream and synthesizes the error terminator,
//! and dropping the body (client disconnect) cancels through the drop
//! guard without writing another byte.

use std::convert::Infallible;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::Response;
use bytes::Bytes;
use futures::Stream;
use tokio_stream::StreamExt;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::warn;

use chatrelay_core::StreamEvent;

use crate::middleware::request_id::REQUEST_ID_HEADER;

pub const TIMEOUT_ERROR: &str = "stream timeout";
pub const MISSING_TERMINATOR_ERROR: &str = "stream ended without terminator";

/// Encode one event as an SSE frame.
pub fn encode_frame(event: &StreamEvent) -> Bytes {
    match serde_json::to_string(event) {
        Ok(json) => Bytes::from(format!("data: {json}\n\n")),
        // Unreachable with the closed event union; kept total so the
        // framer can never lose its terminator.
        Err(e) => {
            warn!(error = %e, "event serialization failed");
            Bytes::from_static(
                b"data: {\"type\":\"error\",\"error\":\"event serialization failed\"}\n\n",
            )
        }
    }
}

/// Wrap an event stream in the wire contract: a deadline starting now, at
/// most one terminal event, and a synthesized terminator if the producer
/// ends without one. Nothing is emitted after the terminal frame.
pub fn frame_events<S>(
    events: S,
    timeout: Duration,
    cancel: CancellationToken,
) -> impl Stream<Item = Result<Bytes, Infallible>> + Send
where
    S: Stream<Item = StreamEvent> + Send + Unpin + 'static,
{
    struct FramerState<S> {
        events: S,
        deadline: tokio::time::Instant,
        cancel: CancellationToken,
        finished: bool,
        /// Cancels the request when the body is dropped mid-stream
        /// (client disconnect) so the upstream call is released.
        _guard: DropGuard,
    }

    let state = FramerState {
        events,
        deadline: tokio::time::Instant::now() + timeout,
        cancel: cancel.clone(),
        finished: false,
        _guard: cancel.drop_guard(),
    };

    futures::stream::unfold(state, |mut state| async move {
        if state.finished {
            return None;
        }
        tokio::select! {
            biased;
            _ = tokio::time::sleep_until(state.deadline) => {
                warn!("stream deadline exceeded, terminating");
                state.cancel.cancel();
                state.finished = true;
                Some((Ok(encode_frame(&StreamEvent::error(TIMEOUT_ERROR))), state))
            }
            event = state.events.next() => match event {
                Some(event) => {
                    if event.is_terminal() {
                        state.finished = true;
                    }
                    Some((Ok(encode_frame(&event)), state))
                }
                None => {
                    warn!("producer ended without a terminal event");
                    state.finished = true;
                    Some((Ok(encode_frame(&StreamEvent::error(MISSING_TERMINATOR_ERROR))), state))
                }
            }
        }
    })
}

/// Build the SSE response around an already-framed byte stream.
pub fn sse_response<S>(frames: S, request_id: &str) -> Response
where
    S: Stream<Item = Result<Bytes, Infallible>> + Send + 'static,
{
    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::CONNECTION, "keep-alive");
    if let Ok(value) = HeaderValue::from_str(request_id) {
        builder = builder.header(REQUEST_ID_HEADER, value);
    }
    builder
        .body(Body::from_stream(frames))
        // Infallible: every header value above is static or pre-validated.
        .unwrap_or_else(|_| Response::new(Body::empty()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use tokio_stream::StreamExt;

    async fn collect_frames<S>(frames: S) -> Vec<String>
    where
        S: Stream<Item = Result<Bytes, Infallible>> + Send,
    {
        let mut frames = std::pin::pin!(frames);
        let mut out = Vec::new();
        while let Some(Ok(bytes)) = frames.next().await {
            out.push(String::from_utf8(bytes.to_vec()).unwrap());
        }
        out
    }

    #[test]
    fn test_frame_encoding() {
        let frame = encode_frame(&StreamEvent::text_delta("He"));
        assert_eq!(&frame[..], b"data: {\"type\":\"text-delta\",\"textDelta\":\"He\"}\n\n");
    }

    #[tokio::test]
    async fn passes_events_through_until_terminal() {
        let events = stream::iter(vec![
            StreamEvent::text_delta("a"),
            StreamEvent::text_delta("b"),
            StreamEvent::Finish,
        ]);
        let framed = frame_events(events, Duration::from_secs(5), CancellationToken::new());
        let frames = collect_frames(framed).await;
        assert_eq!(
            frames,
            vec![
                "data: {\"type\":\"text-delta\",\"textDelta\":\"a\"}\n\n",
                "data: {\"type\":\"text-delta\",\"textDelta\":\"b\"}\n\n",
                "data: {\"type\":\"finish\"}\n\n",
            ]
        );
    }

    #[tokio::test]
    async fn nothing_after_terminal_event() {
        let events = stream::iter(vec![
            StreamEvent::Finish,
            StreamEvent::text_delta("late"),
            StreamEvent::Finish,
        ]);
        let framed = frame_events(events, Duration::from_secs(5), CancellationToken::new());
        let frames = collect_frames(framed).await;
        assert_eq!(frames, vec!["data: {\"type\":\"finish\"}\n\n"]);
    }

    #[tokio::test]
    async fn synthesizes_terminator_when_producer_ends_early() {
        let events = stream::iter(vec![StreamEvent::text_delta("a")]);
        let framed = frame_events(events, Duration::from_secs(5), CancellationToken::new());
        let frames = collect_frames(framed).await;
        assert_eq!(frames.len(), 2);
        assert!(frames[1].contains(MISSING_TERMINATOR_ERROR));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_synthesizes_error_and_cancels() {
        let events = stream::pending::<StreamEvent>();
        let cancel = CancellationToken::new();
        let framed = frame_events(
            Box::pin(events),
            Duration::from_secs(300),
            cancel.clone(),
        );
        let frames = collect_frames(framed).await;
        assert_eq!(frames.len(), 1);
        assert!(frames[0].contains(TIMEOUT_ERROR));
        assert!(cancel.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_at_first_byte_yields_timeout_only() {
        // Deadline of zero: the very first poll must produce the timeout
        // error, never a text delta.
        let events = stream::iter(vec![StreamEvent::text_delta("He"), StreamEvent::Finish]);
        let framed = frame_events(events, Duration::ZERO, CancellationToken::new());
        let frames = collect_frames(framed).await;
        assert_eq!(frames.len(), 1);
        assert!(frames[0].contains(TIMEOUT_ERROR));
    }

    #[tokio::test]
    async fn dropping_frames_cancels_request() {
        let cancel = CancellationToken::new();
        let events = stream::pending::<StreamEvent>();
        let framed = frame_events(Box::pin(events), Duration::from_secs(300), cancel.clone());
        drop(framed);
        assert!(cancel.is_cancelled());
    }

    #[test]
    fn test_response_headers() {
        let events = stream::iter(vec![Ok(Bytes::from_static(b"data: {}\n\n"))]);
        let response = sse_response(events, "req-123");
        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers["content-type"], "text/event-stream");
        assert_eq!(headers["cache-control"], "no-cache");
        assert_eq!(headers["connection"], "keep-alive");
        assert_eq!(headers[REQUEST_ID_HEADER], "req-123");
    }
}
