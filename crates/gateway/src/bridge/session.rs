//! Per-call session bridge — the state machine that owns both sockets.
//!
//! Lifecycle per accepted carrier socket:
//!
//! ```text
//! ACCEPTED ──start──► CONNECTING_AI ──handshake ok──► CONFIGURING
//!                │                └──handshake fail──► TERMINATING
//!                └──stop/close──► (no session)
//! CONFIGURING ──session.update sent──► RUNNING
//! RUNNING ──stop | carrier close | AI close | fatal error──► TERMINATING
//! TERMINATING ──sub-tasks joined──► CLOSED
//! ```
//!
//! RUNNING is two concurrent directions: the uplink (carrier→AI) runs
//! inline in the bridge task; the downlink (AI→carrier) is a spawned
//! sub-task. Either direction ending cancels the shared token, and the
//! termination path joins everything and releases both sockets.

use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use vb_conversation::Role;
use vb_domain::retry::RetryPolicy;
use vb_protocol::carrier::{CarrierEvent, CarrierFrame, StreamStart};
use vb_protocol::realtime::{
    AudioFormat, Modality, RealtimeEvent, SessionConfig, ToolChoice, TranscriptionConfig,
    TurnDetection,
};
use vb_realtime::{RealtimeConnection, RealtimeEvents, RealtimeSender};

use crate::bridge::logsink::SessionLog;
use crate::instructions;
use crate::state::AppState;
use crate::tools::{definitions, ToolDispatcher};

/// How long the carrier gets to deliver its `start` event.
const START_TIMEOUT: Duration = Duration::from_secs(30);

/// Grace period for the AI writer task to flush its close frame.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// State machine
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BridgeState {
    Accepted,
    ConnectingAi,
    Configuring,
    Running,
    Terminating,
    Closed,
}

struct BridgeSession {
    stream_sid: String,
    call_sid: String,
    state: BridgeState,
}

impl BridgeSession {
    fn new(start: &StreamStart) -> Self {
        Self {
            stream_sid: start.stream_sid.clone(),
            call_sid: start.call_sid.clone(),
            state: BridgeState::Accepted,
        }
    }

    fn advance(&mut self, next: BridgeState) {
        tracing::debug!(
            call_sid = %self.call_sid,
            from = ?self.state,
            to = ?next,
            "bridge state transition"
        );
        self.state = next;
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Entry point
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn run(socket: WebSocket, state: AppState) {
    let (carrier_sink, mut carrier_stream) = socket.split();

    // ── ACCEPTED: read frames until `start` ──────────────────────────
    let start = match wait_for_start(&mut carrier_stream).await {
        StartOutcome::Started(start) => start,
        StartOutcome::Ended => {
            // No AI contact, no conversation record.
            tracing::info!("carrier ended before start");
            close_carrier(carrier_sink).await;
            return;
        }
    };

    let customer_phone = start.customer_phone().unwrap_or("unknown").to_owned();
    if customer_phone == "unknown" {
        tracing::warn!(call_sid = %start.call_sid, "start event carried no customerPhone");
    }
    tracing::info!(
        stream_sid = %start.stream_sid,
        call_sid = %start.call_sid,
        customer_phone = %customer_phone,
        "media stream started"
    );

    let mut session = BridgeSession::new(&start);

    // The conversation record exists from here on; exactly one finalize
    // wins regardless of the exit path.
    let log = SessionLog::open(
        state.conversations.clone(),
        state.store.clone(),
        &start.call_sid,
        &start.stream_sid,
        &customer_phone,
        &state.config.realtime.model,
    );

    // ── CONNECTING_AI ────────────────────────────────────────────────
    session.advance(BridgeState::ConnectingAi);
    let policy = RetryPolicy::ai_handshake();
    let (connected, carrier_ended) = drive_handshake(
        &mut carrier_stream,
        vb_realtime::connect(&state.config.realtime, &policy),
    )
    .await;

    let connection = match connected {
        Ok(connection) => connection,
        Err(e) => {
            tracing::error!(call_sid = %session.call_sid, error = %e, "AI handshake failed");
            session.advance(BridgeState::Terminating);
            log.finalize("failed").await;
            close_carrier(carrier_sink).await;
            session.advance(BridgeState::Closed);
            return;
        }
    };

    if carrier_ended {
        tracing::info!(call_sid = %session.call_sid, "carrier ended during AI handshake");
        session.advance(BridgeState::Terminating);
        teardown_ai(connection).await;
        log.finalize("completed").await;
        close_carrier(carrier_sink).await;
        session.advance(BridgeState::Closed);
        return;
    }

    // ── CONFIGURING ──────────────────────────────────────────────────
    session.advance(BridgeState::Configuring);
    let session_config = build_session_config(&state, &customer_phone);
    let (configured, carrier_ended) = drive_handshake(
        &mut carrier_stream,
        connection.sender.configure(session_config),
    )
    .await;

    if let Err(e) = configured {
        tracing::error!(call_sid = %session.call_sid, error = %e, "AI session configuration failed");
        session.advance(BridgeState::Terminating);
        teardown_ai(connection).await;
        log.finalize("failed").await;
        close_carrier(carrier_sink).await;
        session.advance(BridgeState::Closed);
        return;
    }

    if carrier_ended {
        session.advance(BridgeState::Terminating);
        teardown_ai(connection).await;
        log.finalize("completed").await;
        close_carrier(carrier_sink).await;
        session.advance(BridgeState::Closed);
        return;
    }

    // session.update is on the wire: the session counts as initialized and
    // caller audio may flow to the AI.
    session.advance(BridgeState::Running);

    let RealtimeConnection { sender, events, writer: ai_writer } = connection;

    // ── RUNNING: two concurrent relay directions ─────────────────────
    let cancel = CancellationToken::new();
    let (frame_tx, frame_rx) = mpsc::channel::<CarrierFrame>(64);

    // Writer task: serializes all carrier writes for this session.
    let carrier_writer = tokio::spawn(write_carrier_frames(carrier_sink, frame_rx));

    let downlink = tokio::spawn(
        Downlink {
            events,
            sender: sender.clone(),
            frames: frame_tx,
            stream_sid: session.stream_sid.clone(),
            caller_phone: customer_phone.clone(),
            log: log.clone(),
            dispatcher: state.dispatcher.clone(),
            cancel: cancel.clone(),
        }
        .run(),
    );

    let uplink_end = uplink(&mut carrier_stream, &sender, &cancel).await;
    tracing::info!(call_sid = %session.call_sid, reason = ?uplink_end, "uplink finished");

    // ── TERMINATING: join sub-tasks, release both sockets ────────────
    session.advance(BridgeState::Terminating);
    cancel.cancel();
    let _ = downlink.await;
    sender.close().await;

    let mut ai_writer = ai_writer;
    if tokio::time::timeout(WRITER_DRAIN_TIMEOUT, &mut ai_writer).await.is_err() {
        ai_writer.abort();
    }
    // The carrier writer ends once every frame sender is gone, closing the
    // carrier socket on its way out.
    let _ = carrier_writer.await;

    log.finalize("completed").await;
    session.advance(BridgeState::Closed);
    tracing::info!(call_sid = %session.call_sid, "session closed");
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ACCEPTED helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

enum StartOutcome {
    Started(StreamStart),
    Ended,
}

/// Read carrier frames until `start`. Media before start is dropped;
/// `connected` and `mark` are informational; `stop` or a close ends the
/// session with no AI contact.
async fn wait_for_start(
    stream: &mut (impl StreamExt<Item = Result<Message, axum::Error>> + Unpin),
) -> StartOutcome {
    let outcome = tokio::time::timeout(START_TIMEOUT, async {
        while let Some(frame) = stream.next().await {
            let msg = match frame {
                Ok(msg) => msg,
                Err(e) => {
                    tracing::warn!(error = %e, "carrier read error before start");
                    return StartOutcome::Ended;
                }
            };
            match msg {
                Message::Text(text) => match serde_json::from_str::<CarrierEvent>(&text) {
                    Ok(CarrierEvent::Start { start }) => return StartOutcome::Started(start),
                    Ok(CarrierEvent::Stop { .. }) => return StartOutcome::Ended,
                    Ok(CarrierEvent::Media { .. }) => {
                        tracing::debug!("dropping media frame before start");
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::debug!(error = %e, "skipping unparseable carrier frame");
                    }
                },
                Message::Close(_) => return StartOutcome::Ended,
                _ => {}
            }
        }
        StartOutcome::Ended
    })
    .await;

    match outcome {
        Ok(outcome) => outcome,
        Err(_) => {
            tracing::warn!("carrier never sent start");
            StartOutcome::Ended
        }
    }
}

/// Drive `fut` to completion while draining the carrier socket, so nothing
/// is queued during the AI handshake. Media frames arriving meanwhile are
/// dropped. Returns the future's output plus whether the carrier ended.
async fn drive_handshake<T>(
    stream: &mut (impl StreamExt<Item = Result<Message, axum::Error>> + Unpin),
    fut: impl std::future::Future<Output = T>,
) -> (T, bool) {
    tokio::pin!(fut);
    let mut carrier_ended = false;
    loop {
        if carrier_ended {
            return (fut.await, true);
        }
        tokio::select! {
            out = &mut fut => return (out, carrier_ended),
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    match serde_json::from_str::<CarrierEvent>(&text) {
                        Ok(CarrierEvent::Media { .. }) => {
                            tracing::debug!("dropping media frame during AI handshake");
                        }
                        Ok(CarrierEvent::Stop { .. }) => carrier_ended = true,
                        Ok(_) => {}
                        Err(e) => {
                            tracing::debug!(error = %e, "skipping unparseable carrier frame");
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | None => carrier_ended = true,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "carrier read error during AI handshake");
                    carrier_ended = true;
                }
            }
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// CONFIGURING helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn build_session_config(state: &AppState, customer_phone: &str) -> SessionConfig {
    SessionConfig {
        modalities: vec![Modality::Text, Modality::Audio],
        instructions: instructions::render(&state.config.spa, customer_phone),
        voice: state.config.realtime.voice.clone(),
        input_audio_format: AudioFormat::G711Ulaw,
        output_audio_format: AudioFormat::G711Ulaw,
        input_audio_transcription: Some(TranscriptionConfig::whisper()),
        turn_detection: Some(TurnDetection::server_vad_default()),
        temperature: 0.8,
        tools: definitions::tool_schemas(),
        tool_choice: ToolChoice::Auto,
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Carrier → AI direction
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug)]
enum UplinkEnd {
    Stop,
    CarrierClosed,
    AiGone,
    Cancelled,
}

/// Forward caller audio to the AI in arrival order, with no intermediate
/// buffering. Ends on carrier `stop`/close, AI writer loss, or cancellation
/// from the other direction.
async fn uplink(
    stream: &mut (impl StreamExt<Item = Result<Message, axum::Error>> + Unpin),
    sender: &RealtimeSender,
    cancel: &CancellationToken,
) -> UplinkEnd {
    loop {
        let frame = tokio::select! {
            _ = cancel.cancelled() => return UplinkEnd::Cancelled,
            frame = stream.next() => frame,
        };
        match frame {
            Some(Ok(Message::Text(text))) => match serde_json::from_str::<CarrierEvent>(&text) {
                Ok(CarrierEvent::Media { media }) => {
                    if sender.append_audio(&media.payload).await.is_err() {
                        return UplinkEnd::AiGone;
                    }
                }
                Ok(CarrierEvent::Stop { .. }) => return UplinkEnd::Stop,
                Ok(CarrierEvent::Start { .. }) => {
                    tracing::warn!("duplicate start event ignored");
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!(error = %e, "skipping unparseable carrier frame");
                }
            },
            Some(Ok(Message::Close(_))) | None => return UplinkEnd::CarrierClosed,
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                tracing::warn!(error = %e, "carrier read error");
                return UplinkEnd::CarrierClosed;
            }
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// AI → carrier direction
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

struct Downlink {
    events: RealtimeEvents,
    sender: RealtimeSender,
    frames: mpsc::Sender<CarrierFrame>,
    stream_sid: String,
    caller_phone: String,
    log: SessionLog,
    dispatcher: std::sync::Arc<ToolDispatcher>,
    cancel: CancellationToken,
}

impl Downlink {
    /// Process AI events in arrival order. Tool calls are serviced
    /// synchronously within this direction: the result and `response.create`
    /// go out before any further AI event is acted on, and a second tool
    /// call is never dispatched before the previous result was sent.
    async fn run(mut self) {
        let mut assistant_accumulator = String::new();

        loop {
            let event = tokio::select! {
                _ = self.cancel.cancelled() => break,
                event = self.events.next_event() => match event {
                    Some(event) => event,
                    None => {
                        tracing::info!("AI socket closed");
                        break;
                    }
                },
            };

            match event {
                RealtimeEvent::AudioDelta { delta } => {
                    let frame = CarrierFrame::media(self.stream_sid.clone(), delta);
                    if self.frames.send(frame).await.is_err() {
                        break;
                    }
                }
                RealtimeEvent::TranscriptionCompleted { transcript, event_id, .. } => {
                    self.log.turn(Role::User, &transcript, event_id);
                }
                RealtimeEvent::AudioTranscriptDelta { delta } => {
                    assistant_accumulator.push_str(&delta);
                }
                RealtimeEvent::AudioTranscriptDone { transcript } => {
                    let text =
                        resolve_assistant_transcript(transcript, &mut assistant_accumulator);
                    self.log.turn(Role::Assistant, &text, None);
                }
                RealtimeEvent::FunctionCallArgumentsDone { name, call_id, arguments } => {
                    if self.service_tool_call(&name, &call_id, &arguments).await.is_err() {
                        break;
                    }
                }
                RealtimeEvent::Error { error } => {
                    // Non-fatal unless the socket closes.
                    tracing::error!(error = %error, "AI error event");
                }
                RealtimeEvent::SessionUpdated => {
                    tracing::debug!("AI session configuration acknowledged");
                }
                RealtimeEvent::SpeechStarted => {
                    tracing::debug!("caller speech started");
                }
                RealtimeEvent::Unhandled => {}
            }
        }

        // Wake the uplink if it is still reading.
        self.cancel.cancel();
    }

    async fn service_tool_call(
        &self,
        name: &str,
        call_id: &str,
        arguments: &str,
    ) -> Result<(), ()> {
        tracing::info!(tool = name, call_id, "dispatching tool call");

        // The uplink keeps streaming audio while the tool runs; session
        // termination cancels the dispatch.
        let outcome = tokio::select! {
            _ = self.cancel.cancelled() => return Err(()),
            outcome = self.dispatcher.dispatch(name, arguments, &self.caller_phone) => outcome,
        };

        self.log.tool_invocations(call_id, &outcome.invocations);

        self.sender
            .send_tool_result(call_id, outcome.output_json())
            .await
            .map_err(|_| ())
    }
}

/// The `done` event's transcript is authoritative; fall back to the
/// accumulated deltas when it is empty. Either way the accumulator resets.
fn resolve_assistant_transcript(done: String, accumulator: &mut String) -> String {
    if done.is_empty() {
        std::mem::take(accumulator)
    } else {
        accumulator.clear();
        done
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Socket teardown
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Drain outbound media frames onto the carrier socket, then close it.
async fn write_carrier_frames(
    mut sink: SplitSink<WebSocket, Message>,
    mut frames: mpsc::Receiver<CarrierFrame>,
) {
    while let Some(frame) = frames.recv().await {
        let json = match serde_json::to_string(&frame) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize carrier frame");
                continue;
            }
        };
        if sink.send(Message::Text(json)).await.is_err() {
            break;
        }
    }
    let _ = sink.send(Message::Close(None)).await;
    let _ = sink.close().await;
}

async fn close_carrier(mut sink: SplitSink<WebSocket, Message>) {
    let _ = sink.send(Message::Close(None)).await;
    let _ = sink.close().await;
}

/// Close the AI socket and reap its writer task.
async fn teardown_ai(connection: RealtimeConnection) {
    connection.sender.close().await;
    let mut writer = connection.writer;
    if tokio::time::timeout(WRITER_DRAIN_TIMEOUT, &mut writer).await.is_err() {
        writer.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;

    fn frames(raw: &[&str]) -> impl StreamExt<Item = Result<Message, axum::Error>> + Unpin {
        stream::iter(
            raw.iter()
                .map(|s| Ok::<Message, axum::Error>(Message::Text(s.to_string())))
                .collect::<Vec<_>>(),
        )
    }

    const START: &str = r#"{
        "event": "start",
        "start": {
            "streamSid": "MZ1",
            "callSid": "CA1",
            "customParameters": {"customerPhone": "+391110002222"}
        }
    }"#;

    #[tokio::test]
    async fn start_accepted_after_preamble() {
        let mut stream = frames(&[
            r#"{"event":"connected","protocol":"Call","version":"1.0.0"}"#,
            START,
        ]);
        match wait_for_start(&mut stream).await {
            StartOutcome::Started(start) => {
                assert_eq!(start.stream_sid, "MZ1");
                assert_eq!(start.customer_phone(), Some("+391110002222"));
            }
            StartOutcome::Ended => panic!("expected start"),
        }
    }

    #[tokio::test]
    async fn media_before_start_is_dropped() {
        let mut stream = frames(&[
            r#"{"event":"media","media":{"payload":"AAAA"}}"#,
            r#"{"event":"media","media":{"payload":"BBBB"}}"#,
            START,
        ]);
        assert!(matches!(
            wait_for_start(&mut stream).await,
            StartOutcome::Started(_)
        ));
    }

    #[tokio::test]
    async fn stop_before_start_ends_cleanly() {
        let mut stream = frames(&[r#"{"event":"stop","stop":{}}"#, START]);
        assert!(matches!(wait_for_start(&mut stream).await, StartOutcome::Ended));
    }

    #[tokio::test]
    async fn socket_close_before_start_ends_cleanly() {
        let mut stream = frames(&[]);
        assert!(matches!(wait_for_start(&mut stream).await, StartOutcome::Ended));
    }

    #[tokio::test]
    async fn malformed_frame_is_skipped_not_fatal() {
        let mut stream = frames(&["{not json", r#"{"event":"dtmf"}"#, START]);
        assert!(matches!(
            wait_for_start(&mut stream).await,
            StartOutcome::Started(_)
        ));
    }

    #[tokio::test]
    async fn handshake_drains_carrier_without_queueing() {
        let mut stream = frames(&[
            r#"{"event":"media","media":{"payload":"AAAA"}}"#,
            r#"{"event":"mark","mark":{"name":"m1"}}"#,
        ]);
        let (value, ended) = drive_handshake(&mut stream, async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            7
        })
        .await;
        assert_eq!(value, 7);
        // Stream exhaustion counts as the carrier ending.
        assert!(ended);
    }

    #[tokio::test]
    async fn handshake_observes_carrier_stop() {
        let mut stream = frames(&[r#"{"event":"stop","stop":{}}"#]);
        let (value, ended) = drive_handshake(&mut stream, async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            1
        })
        .await;
        assert_eq!(value, 1);
        assert!(ended);
    }

    #[test]
    fn done_transcript_wins_over_accumulator() {
        let mut acc = "per".to_owned();
        let text = resolve_assistant_transcript("perfetto, confermo".into(), &mut acc);
        assert_eq!(text, "perfetto, confermo");
        assert!(acc.is_empty());
    }

    #[test]
    fn empty_done_falls_back_to_accumulator() {
        let mut acc = "perfetto".to_owned();
        let text = resolve_assistant_transcript(String::new(), &mut acc);
        assert_eq!(text, "perfetto");
        assert!(acc.is_empty());
    }
}
