//! # WebSocket Ingestion Handler
//!
//! Handles the live fragment stream for one producer connection. Clients
//! connect to `/ws/audio` and exchange JSON text frames.
//!
//! ## WebSocket Protocol:
//! 1. **Connection**: the server sends a greeting frame
//! 2. **Control**: `{"type": "control", "token": "RECORD START" | "RECORD STOP"}`
//!    toggles the session's recording flag; other tokens are logged no-ops
//! 3. **Media**: `{"type": "media", "payload": "<base64 PCM>"}` carries one
//!    fragment of 16-bit little-endian samples
//! 4. **Acknowledgement**: every control and media frame is acked with the
//!    original contents echoed back
//! 5. **Render results**: once the window is full, each media frame triggers
//!    a render; the outcome comes back as `render_complete` / `render_failed`
//!
//! ## Per-connection pipeline:
//! decode → gate on the recording flag → window push → (window full) shape
//! every windowed fragment → mux → atomic sink commit. The window and session
//! flag are plain actor fields: actix dispatches one frame at a time per
//! connection, so no locking is needed, and disconnect drops the whole
//! session state. Renders run on a spawned task against a snapshot, so a slow
//! sink never blocks the next inbound frame.

use crate::audio::decoder::{decode_fragment, Fragment};
use crate::audio::fade::shape;
use crate::audio::muxer::{self, ContainerFormat, MuxError};
use crate::audio::session::RecordingSession;
use crate::audio::sink::{FileSink, RenderSink, SinkWriteError};
use crate::audio::window::SlidingWindow;
use crate::config::AppConfig;
use crate::state::AppState;

use actix::prelude::*;
use actix_web::{web, HttpRequest, HttpResponse, Result as ActixResult};
use actix_web_actors::ws;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Frame types exchanged with the producer.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WsMessage {
    /// Control token from the producer
    #[serde(rename = "control")]
    Control {
        /// One of the recognized record tokens, or anything else as a no-op
        token: String,
    },

    /// One audio fragment from the producer
    #[serde(rename = "media")]
    Media {
        /// Base64 text wrapping raw 16-bit little-endian PCM bytes
        payload: String,
    },

    /// Greeting sent once when the connection opens
    #[serde(rename = "greeting")]
    Greeting { message: String },

    /// Receipt acknowledgement echoing the original frame contents
    #[serde(rename = "ack")]
    Ack { message: String },

    /// A render pass committed its container to the sink
    #[serde(rename = "render_complete")]
    RenderComplete {
        /// Fragments concatenated into the container
        fragments: usize,
        /// Wall-clock render duration
        elapsed_ms: u64,
    },

    /// A render pass failed at the mux or sink stage
    #[serde(rename = "render_failed")]
    RenderFailed { code: String, message: String },

    /// Error frames (decode failures, malformed JSON)
    #[serde(rename = "error")]
    Error { code: String, message: String },

    /// Heartbeat ping from the server
    #[serde(rename = "ping")]
    Ping { timestamp: u64 },

    /// Heartbeat reply from the client
    #[serde(rename = "pong")]
    Pong { timestamp: u64 },
}

/// Where a render attempt failed.
#[derive(Debug)]
enum RenderError {
    Mux(MuxError),
    Sink(SinkWriteError),
}

impl RenderError {
    fn code(&self) -> &'static str {
        match self {
            RenderError::Mux(_) => "mux_error",
            RenderError::Sink(_) => "sink_error",
        }
    }
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::Mux(err) => err.fmt(f),
            RenderError::Sink(err) => err.fmt(f),
        }
    }
}

impl From<MuxError> for RenderError {
    fn from(err: MuxError) -> Self {
        RenderError::Mux(err)
    }
}

impl From<SinkWriteError> for RenderError {
    fn from(err: SinkWriteError) -> Self {
        RenderError::Sink(err)
    }
}

/// Shape every snapshot fragment, mux the window into one container, and
/// commit it through a file sink. Returns the fragment count on success.
///
/// Pure glue over the pipeline components; runs on a spawned task so the
/// actor keeps accepting frames while the sink blocks.
fn render_to_sink(
    fragments: &[Fragment],
    fade_len: usize,
    format: &ContainerFormat,
    output_path: &str,
) -> Result<usize, RenderError> {
    let shaped: Vec<Fragment> = fragments
        .iter()
        .map(|f| Fragment {
            samples: shape(&f.samples, fade_len),
            seq: f.seq,
        })
        .collect();

    let bytes = muxer::render(&shaped, format)?;

    let mut sink = FileSink::new(output_path);
    sink.write(&bytes)?;
    sink.commit()?;

    Ok(fragments.len())
}

/// Result of an offloaded render pass, routed back through the actor mailbox.
#[derive(Message)]
#[rtype(result = "()")]
enum RenderOutcome {
    Completed { fragments: usize, elapsed_ms: u64 },
    Failed { code: &'static str, message: String },
}

/// WebSocket actor owning one connection's ingestion state.
///
/// ## Actor Model:
/// Each connection is an independent actor; its window and session flag are
/// connection-local owned state, so sessions can never interfere with each
/// other's buffers.
pub struct StitchWebSocket {
    /// Shared application state (metrics)
    state: AppState,

    /// Configuration snapshot taken when the connection was accepted
    config: AppConfig,

    /// Recording flag and fragment counter for this connection
    session: RecordingSession,

    /// The last `W` accepted fragments, oldest first
    window: SlidingWindow,

    /// Last heartbeat time
    last_heartbeat: Instant,
}

impl StitchWebSocket {
    pub fn new(state: AppState, config: AppConfig) -> Self {
        let window = SlidingWindow::new(config.audio.window_size);
        Self {
            state,
            config,
            session: RecordingSession::new(),
            window,
            last_heartbeat: Instant::now(),
        }
    }

    fn send(&self, ctx: &mut ws::WebsocketContext<Self>, msg: &WsMessage) {
        if let Ok(json) = serde_json::to_string(msg) {
            ctx.text(json);
        }
    }

    /// Acknowledge a received frame, echoing its contents.
    fn ack(&self, ctx: &mut ws::WebsocketContext<Self>, contents: &str) {
        self.send(
            ctx,
            &WsMessage::Ack {
                message: format!("Message received: {}", contents),
            },
        );
    }

    fn send_error(&self, ctx: &mut ws::WebsocketContext<Self>, code: &str, message: &str) {
        self.send(
            ctx,
            &WsMessage::Error {
                code: code.to_string(),
                message: message.to_string(),
            },
        );
        warn!(code = %code, "WebSocket error: {}", message);
    }

    /// Apply a control token to the session state machine.
    fn handle_control(&mut self, token: String, ctx: &mut ws::WebsocketContext<Self>) {
        let outcome = self.session.apply_control(&token);
        info!(
            token = %token,
            outcome = ?outcome,
            state = %self.session.state(),
            "control message"
        );
        self.ack(ctx, &token);
    }

    /// Run one fragment through the ingestion pipeline.
    fn handle_media(&mut self, payload: String, ctx: &mut ws::WebsocketContext<Self>) {
        self.ack(ctx, &payload);
        self.state.record_fragment_received();

        // Idle sessions acknowledge media but never buffer it: the control
        // flag gates ingestion, not just rendering.
        if !self.session.is_recording() {
            debug!("session idle, dropping media frame");
            self.state.record_fragment_dropped();
            return;
        }

        let seq = self.session.next_seq();
        let fragment = match decode_fragment(&payload, seq) {
            Ok(fragment) => fragment,
            Err(err) => {
                warn!(seq = seq, "dropping undecodable fragment: {}", err);
                self.state.record_fragment_dropped();
                self.send_error(ctx, "decode_error", &err.to_string());
                return;
            }
        };

        debug!(seq = seq, samples = fragment.len(), "fragment accepted");
        self.window.push(fragment);

        if !self.window.is_full() {
            return;
        }

        // Every push on a full window renders the then-current contents. The
        // snapshot is taken before handoff so the render never races a later
        // eviction, and the window itself is retained for the next pass.
        let fragments = self.window.snapshot();
        let fade_len = self.config.audio.fade_len;
        let format = ContainerFormat {
            channels: self.config.audio.channels,
            frame_rate: self.config.audio.frame_rate(),
            bits_per_sample: self.config.audio.bit_depth,
        };
        let output_path = self.config.audio.output_path.clone();
        let state = self.state.clone();
        let addr = ctx.address();

        tokio::spawn(async move {
            let started = Instant::now();
            let result = render_to_sink(&fragments, fade_len, &format, &output_path);
            let elapsed_ms = started.elapsed().as_millis() as u64;

            match result {
                Ok(count) => {
                    state.record_render_completed(elapsed_ms);
                    info!(fragments = count, elapsed_ms = elapsed_ms, "render committed");
                    addr.do_send(RenderOutcome::Completed {
                        fragments: count,
                        elapsed_ms,
                    });
                }
                Err(err) => {
                    state.record_render_failed();
                    error!("render failed: {}", err);
                    addr.do_send(RenderOutcome::Failed {
                        code: err.code(),
                        message: err.to_string(),
                    });
                }
            }
        });
    }
}

impl Actor for StitchWebSocket {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        info!("WebSocket connection started");
        self.state.increment_active_sessions();

        self.send(
            ctx,
            &WsMessage::Greeting {
                message: "how are you?".to_string(),
            },
        );

        // Heartbeat: ping every 30s, drop clients silent for 60s.
        ctx.run_interval(Duration::from_secs(30), |act, ctx| {
            if Instant::now().duration_since(act.last_heartbeat) > Duration::from_secs(60) {
                warn!("WebSocket heartbeat timeout, closing connection");
                ctx.stop();
                return;
            }

            let timestamp = std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_millis() as u64;
            act.send(ctx, &WsMessage::Ping { timestamp });
        });
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        // Dropping the actor discards the window and resets the session; any
        // in-flight render finishes against its snapshot and commits (or is
        // abandoned) without touching the next session's state.
        self.state.decrement_active_sessions();
        info!(
            fragments_seen = self.session.fragments_seen(),
            "WebSocket connection stopped"
        );
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for StitchWebSocket {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Text(text)) => match serde_json::from_str::<WsMessage>(&text) {
                Ok(WsMessage::Control { token }) => {
                    self.handle_control(token, ctx);
                }
                Ok(WsMessage::Media { payload }) => {
                    self.handle_media(payload, ctx);
                }
                Ok(WsMessage::Pong { .. }) => {
                    self.last_heartbeat = Instant::now();
                }
                Ok(_) => {
                    warn!("received server-bound frame of a server-to-client type");
                }
                Err(err) => {
                    self.send_error(ctx, "invalid_json", &format!("Invalid JSON: {}", err));
                }
            },
            Ok(ws::Message::Binary(_)) => {
                self.send_error(ctx, "binary_unsupported", "media travels as base64 text frames");
            }
            Ok(ws::Message::Ping(data)) => {
                ctx.pong(&data);
                self.last_heartbeat = Instant::now();
            }
            Ok(ws::Message::Pong(_)) => {
                self.last_heartbeat = Instant::now();
            }
            Ok(ws::Message::Close(reason)) => {
                info!("WebSocket closed: {:?}", reason);
                ctx.stop();
            }
            Ok(ws::Message::Continuation(_)) => {
                warn!("received unexpected continuation frame");
            }
            Ok(ws::Message::Nop) => {}
            Err(err) => {
                error!("WebSocket protocol error: {}", err);
                ctx.stop();
            }
        }
    }
}

impl Handler<RenderOutcome> for StitchWebSocket {
    type Result = ();

    fn handle(&mut self, msg: RenderOutcome, ctx: &mut Self::Context) {
        match msg {
            RenderOutcome::Completed {
                fragments,
                elapsed_ms,
            } => {
                self.send(
                    ctx,
                    &WsMessage::RenderComplete {
                        fragments,
                        elapsed_ms,
                    },
                );
            }
            RenderOutcome::Failed { code, message } => {
                self.send(
                    ctx,
                    &WsMessage::RenderFailed {
                        code: code.to_string(),
                        message,
                    },
                );
            }
        }
    }
}

/// WebSocket endpoint handler: upgrades the HTTP request and hands the
/// connection to a fresh [`StitchWebSocket`] actor.
pub async fn audio_websocket(
    req: HttpRequest,
    stream: web::Payload,
    app_state: web::Data<AppState>,
) -> ActixResult<HttpResponse> {
    info!(
        "New WebSocket connection request from: {:?}",
        req.connection_info().peer_addr()
    );

    let config = app_state.get_config();
    let active = app_state.get_metrics_snapshot().active_sessions as usize;
    if active >= config.performance.max_concurrent_sessions {
        warn!(
            active = active,
            max = config.performance.max_concurrent_sessions,
            "rejecting connection, session limit reached"
        );
        return Ok(HttpResponse::ServiceUnavailable().json(serde_json::json!({
            "error": {
                "type": "session_limit",
                "message": format!(
                    "Maximum concurrent sessions ({}) reached",
                    config.performance.max_concurrent_sessions
                )
            }
        })));
    }

    let websocket = StitchWebSocket::new(app_state.get_ref().clone(), config);
    ws::start(websocket, &req, stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::session::{RECORD_START, RECORD_STOP};
    use base64::{engine::general_purpose, Engine as _};
    use hound::WavReader;
    use std::io::Cursor;

    fn media_payload(samples: &[i16]) -> String {
        let mut bytes = Vec::with_capacity(samples.len() * 2);
        for &sample in samples {
            bytes.extend_from_slice(&sample.to_le_bytes());
        }
        general_purpose::STANDARD.encode(bytes)
    }

    #[test]
    fn test_control_message_round_trip() {
        let msg = WsMessage::Control {
            token: RECORD_START.to_string(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"control\""));
        assert!(json.contains("RECORD START"));

        match serde_json::from_str::<WsMessage>(&json).unwrap() {
            WsMessage::Control { token } => assert_eq!(token, RECORD_START),
            other => panic!("wrong message type: {:?}", other),
        }
    }

    #[test]
    fn test_media_message_round_trip() {
        let payload = media_payload(&[1i16, -2, 3, -4]);
        let msg = WsMessage::Media {
            payload: payload.clone(),
        };
        let json = serde_json::to_string(&msg).unwrap();

        match serde_json::from_str::<WsMessage>(&json).unwrap() {
            WsMessage::Media { payload: decoded } => assert_eq!(decoded, payload),
            other => panic!("wrong message type: {:?}", other),
        }
    }

    #[test]
    fn test_stop_token_deserializes_alongside_start() {
        let json = format!(r#"{{"type": "control", "token": "{}"}}"#, RECORD_STOP);
        assert!(matches!(
            serde_json::from_str::<WsMessage>(&json).unwrap(),
            WsMessage::Control { .. }
        ));
    }

    #[test]
    fn test_render_to_sink_commits_full_window() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("concat_output.wav");
        let format = ContainerFormat {
            channels: 2,
            frame_rate: 24_000,
            bits_per_sample: 16,
        };

        let fragments: Vec<Fragment> = (0..3)
            .map(|seq| Fragment {
                samples: vec![8_000i16; 1000],
                seq,
            })
            .collect();

        let count =
            render_to_sink(&fragments, 50, &format, output.to_str().unwrap()).unwrap();
        assert_eq!(count, 3);

        let bytes = std::fs::read(&output).unwrap();
        let mut reader = WavReader::new(Cursor::new(bytes)).unwrap();
        assert_eq!(reader.spec().channels, 2);
        assert_eq!(reader.spec().sample_rate, 24_000);

        let samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(samples.len(), 3000);
        // Fragment boundaries are attenuated
        assert_eq!(samples[0], 0);
        assert!(samples[999].abs() < 8_000);
        assert!(samples[1000].abs() < 8_000);
        // Interiors pass through
        assert_eq!(samples[500], 8_000);
    }

    #[test]
    fn test_render_to_sink_reports_mux_failure() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("concat_output.wav");
        let format = ContainerFormat {
            channels: 2,
            frame_rate: 24_000,
            bits_per_sample: 16,
        };

        let err = render_to_sink(&[], 50, &format, output.to_str().unwrap()).unwrap_err();
        assert_eq!(err.code(), "mux_error");
        assert!(!output.exists(), "failed render must not touch the sink");
    }
}
