//! Core realtime client — manages the WebSocket lifecycle and outbound
//! event serialization.
//!
//! Flow:
//! 1. `connect` dials `wss://api.openai.com/v1/realtime?model=<id>` with
//!    bearer auth, retrying per the handshake policy (3 attempts, 1 s apart,
//!    ≤ 5 s total).
//! 2. The socket splits: a writer task drains an outbound channel into the
//!    sink; the caller consumes [`RealtimeEvents`] for inbound frames.
//! 3. [`RealtimeSender`] is clonable so both relay directions can emit
//!    events; ordering is preserved by the single writer task.

use std::time::Instant;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use vb_domain::config::RealtimeConfig;
use vb_domain::retry::RetryPolicy;
use vb_domain::{Error, Result};
use vb_protocol::realtime::{ClientEvent, ConversationItem, RealtimeEvent, SessionConfig};

/// Realtime WebSocket endpoint.
const REALTIME_WS_URL: &str = "wss://api.openai.com/v1/realtime";

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Connect
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// An established realtime session: a clonable sender, the inbound event
/// stream, and the writer task handle (aborted by the owner on teardown).
pub struct RealtimeConnection {
    pub sender: RealtimeSender,
    pub events: RealtimeEvents,
    pub writer: JoinHandle<()>,
}

/// Open the realtime socket, retrying per `policy`.
///
/// Fails with [`Error::AiHandshake`] once attempts or the wall-clock budget
/// run out.
pub async fn connect(cfg: &RealtimeConfig, policy: &RetryPolicy) -> Result<RealtimeConnection> {
    let started = Instant::now();
    let mut attempt: u32 = 0;
    let mut last_err = String::new();

    loop {
        if policy.should_give_up(attempt) || policy.budget_exhausted(started) {
            return Err(Error::AiHandshake(format!(
                "gave up after {attempt} attempt(s): {last_err}"
            )));
        }

        let delay = policy.delay_for_attempt(attempt);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        // Each attempt is clipped to the remaining wall-clock budget so a
        // hanging dial cannot overshoot it.
        let attempt_budget = match policy.budget {
            Some(budget) => budget.saturating_sub(started.elapsed()),
            None => std::time::Duration::from_secs(10),
        };

        match tokio::time::timeout(attempt_budget, connect_once(cfg)).await {
            Ok(Ok(conn)) => {
                tracing::info!(model = %cfg.model, attempt, "realtime socket connected");
                return Ok(conn);
            }
            Ok(Err(e)) => {
                tracing::warn!(model = %cfg.model, attempt, error = %e, "realtime connect failed");
                last_err = e.to_string();
                attempt += 1;
            }
            Err(_) => {
                tracing::warn!(model = %cfg.model, attempt, "realtime connect attempt timed out");
                last_err = "handshake attempt timed out".into();
                attempt += 1;
            }
        }
    }
}

/// Single connection attempt: dial, split, spawn the writer task.
async fn connect_once(cfg: &RealtimeConfig) -> Result<RealtimeConnection> {
    let request = build_request(cfg)?;
    let (ws, _response) = tokio_tungstenite::connect_async(request)
        .await
        .map_err(|e| Error::AiHandshake(e.to_string()))?;

    let (mut sink, stream) = ws.split();
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<Outbound>(256);

    // Writer task: serializes every outbound event onto the socket. Ends on
    // the close sentinel or when all senders are dropped.
    let writer = tokio::spawn(async move {
        while let Some(msg) = outbound_rx.recv().await {
            match msg {
                Outbound::Event(event) => {
                    let json = match serde_json::to_string(&event) {
                        Ok(j) => j,
                        Err(e) => {
                            tracing::error!(error = %e, "failed to serialize realtime event");
                            continue;
                        }
                    };
                    if sink.send(Message::Text(json)).await.is_err() {
                        break;
                    }
                }
                Outbound::Close => {
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
            }
        }
    });

    Ok(RealtimeConnection {
        sender: RealtimeSender { tx: outbound_tx },
        events: RealtimeEvents { stream },
        writer,
    })
}

/// Build the handshake request with auth + beta headers.
fn build_request(cfg: &RealtimeConfig) -> Result<Request> {
    let url = format!("{REALTIME_WS_URL}?model={}", cfg.model);
    let mut request = url
        .into_client_request()
        .map_err(|e| Error::AiHandshake(format!("invalid realtime URL: {e}")))?;

    let headers = request.headers_mut();
    headers.insert(
        "Authorization",
        format!("Bearer {}", cfg.api_key)
            .parse()
            .map_err(|_| Error::AiHandshake("API key is not a valid header value".into()))?,
    );
    headers.insert(
        "OpenAI-Beta",
        "realtime=v1"
            .parse()
            .expect("static header value"),
    );
    Ok(request)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Sender
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug)]
enum Outbound {
    Event(ClientEvent),
    Close,
}

/// Clonable handle for sending events into the AI session.
#[derive(Clone)]
pub struct RealtimeSender {
    tx: mpsc::Sender<Outbound>,
}

impl RealtimeSender {
    async fn send(&self, event: ClientEvent) -> Result<()> {
        self.tx
            .send(Outbound::Event(event))
            .await
            .map_err(|_| Error::PeerClosed("AI socket writer is gone".into()))
    }

    /// Send `session.update` with the full session configuration.
    pub async fn configure(&self, session: SessionConfig) -> Result<()> {
        self.send(ClientEvent::SessionUpdate { session }).await
    }

    /// Append one chunk of caller audio (already base64).
    pub async fn append_audio(&self, payload_b64: &str) -> Result<()> {
        self.send(ClientEvent::InputAudioBufferAppend { audio: payload_b64.to_owned() })
            .await
    }

    /// Deliver a tool result and force a follow-up turn. The result item is
    /// always enqueued before `response.create`.
    pub async fn send_tool_result(&self, call_id: &str, output_json: String) -> Result<()> {
        self.send(ClientEvent::ConversationItemCreate {
            item: ConversationItem::FunctionCallOutput {
                call_id: call_id.to_owned(),
                output: output_json,
            },
        })
        .await?;
        self.send(ClientEvent::ResponseCreate).await
    }

    /// Ask the writer to close the socket. Safe to call more than once.
    pub async fn close(&self) {
        let _ = self.tx.send(Outbound::Close).await;
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Events
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The inbound half of the session: framed events in arrival order.
pub struct RealtimeEvents {
    stream: futures_util::stream::SplitStream<WsStream>,
}

impl RealtimeEvents {
    /// Next parseable event, or `None` once the socket is closed.
    ///
    /// Malformed frames are logged and skipped; they never end the stream.
    pub async fn next_event(&mut self) -> Option<RealtimeEvent> {
        while let Some(msg) = self.stream.next().await {
            match msg {
                Ok(Message::Text(text)) => match serde_json::from_str::<RealtimeEvent>(&text) {
                    Ok(event) => return Some(event),
                    Err(e) => {
                        tracing::debug!(error = %e, "skipping unparseable realtime frame");
                    }
                },
                Ok(Message::Close(_)) => return None,
                Ok(_) => {
                    // Binary/ping/pong frames carry nothing for the bridge.
                }
                Err(e) => {
                    tracing::warn!(error = %e, "realtime socket read error");
                    return None;
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> RealtimeConfig {
        RealtimeConfig {
            api_key: "sk-test".into(),
            model: "gpt-4o-mini-realtime-preview-2024-12-17".into(),
            voice: "alloy".into(),
        }
    }

    #[test]
    fn request_url_carries_model() {
        let request = build_request(&test_config()).unwrap();
        assert_eq!(
            request.uri().to_string(),
            "wss://api.openai.com/v1/realtime?model=gpt-4o-mini-realtime-preview-2024-12-17"
        );
    }

    #[test]
    fn request_has_auth_and_beta_headers() {
        let request = build_request(&test_config()).unwrap();
        assert_eq!(
            request.headers().get("Authorization").unwrap(),
            "Bearer sk-test"
        );
        assert_eq!(request.headers().get("OpenAI-Beta").unwrap(), "realtime=v1");
    }

    #[test]
    fn newline_in_key_is_rejected_not_panicked() {
        let mut cfg = test_config();
        cfg.api_key = "bad\nkey".into();
        assert!(build_request(&cfg).is_err());
    }
}
