//! [`CockpitServer`] – HTTP + WebSocket front door of the car.
//!
//! Listens on `0.0.0.0:80` (configurable via [`CockpitServer::with_port`]).
//!
//! | Route | Handler |
//! |---|---|
//! | `GET /` | cockpit page, or a WebSocket upgrade |
//! | `GET /ws` | WebSocket upgrade |
//! | `GET /command`, `GET /command/` | queue `?command=` on the controller |
//! | `GET /status` | latest vehicle snapshot as JSON |
//! | anything else | static file from the public directory |

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use axum::{
    Json, Router,
    extract::{
        ConnectInfo, Query, State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::{Html, IntoResponse, Response},
    routing::get,
};
use futures_util::{SinkExt, StreamExt};
use rcpilot_kernel::ControllerHandle;
use rcpilot_middleware::{ObserverId, StatusBroadcaster};
use rcpilot_types::{ClientFrame, PilotError, VehicleSnapshot};
use tokio::net::TcpListener;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::{debug, info, warn};

/// Default TCP port.
pub const DEFAULT_PORT: u16 = 80;

/// Default directory for static assets, relative to the working directory.
pub const DEFAULT_PUBLIC_DIR: &str = "public";

/// Query key carrying the command string.
const COMMAND_PARAM: &str = "command";

/// The compiled-in cockpit page (HTML + CSS + JS).
const COCKPIT_HTML: &str = include_str!("cockpit.html");

// ---------------------------------------------------------------------------
// CockpitServer
// ---------------------------------------------------------------------------

/// Serves the cockpit and turns HTTP and WebSocket traffic into controller
/// commands and status broadcasts.
pub struct CockpitServer {
    controller: ControllerHandle,
    broadcaster: StatusBroadcaster,
    port: u16,
    public_dir: PathBuf,
}

#[derive(Clone)]
struct AppState {
    controller: ControllerHandle,
    broadcaster: StatusBroadcaster,
}

impl CockpitServer {
    pub fn new(controller: ControllerHandle, broadcaster: StatusBroadcaster) -> Self {
        Self {
            controller,
            broadcaster,
            port: DEFAULT_PORT,
            public_dir: PathBuf::from(DEFAULT_PUBLIC_DIR),
        }
    }

    /// Override the listening port (builder-style).
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Override the static asset directory (builder-style).
    pub fn with_public_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.public_dir = dir.into();
        self
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn public_dir(&self) -> &Path {
        &self.public_dir
    }

    /// Bind `0.0.0.0:<port>` and serve until the task is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`PilotError::Transport`] if the TCP listener cannot bind.
    pub async fn run(self) -> Result<(), PilotError> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| PilotError::Transport(format!("bind error on {addr}: {e}")))?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener.
    pub async fn serve(self, listener: TcpListener) -> Result<(), PilotError> {
        if let Ok(addr) = listener.local_addr() {
            info!(%addr, public_dir = %self.public_dir.display(), "cockpit listening");
        }

        tokio::spawn(self.broadcaster.clone().run_status_forwarder());

        let app = router(
            AppState {
                controller: self.controller,
                broadcaster: self.broadcaster,
            },
            &self.public_dir,
        );

        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .map_err(|e| PilotError::Transport(format!("cockpit server error: {e}")))
    }
}

fn router(state: AppState, public_dir: &Path) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/ws", get(websocket_handler))
        .route("/command", get(command_handler))
        .route("/command/", get(command_handler))
        .route("/status", get(status_handler))
        .fallback_service(ServeDir::new(public_dir))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

// ---------------------------------------------------------------------------
// HTTP handlers
// ---------------------------------------------------------------------------

/// Browsers load the page from `/` and then open their socket on the same
/// URL.
async fn index_handler(
    ws: Option<WebSocketUpgrade>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
) -> Response {
    match ws {
        Some(ws) => upgrade(ws, peer, state),
        None => Html(COCKPIT_HTML).into_response(),
    }
}

async fn websocket_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
) -> Response {
    upgrade(ws, peer, state)
}

/// Always `200 command: <cmd>`.  The first `command` key wins; dispatch
/// failures only show up in the log.
async fn command_handler(
    Query(params): Query<Vec<(String, String)>>,
    State(state): State<AppState>,
) -> String {
    let Some(command) = params
        .into_iter()
        .find_map(|(key, value)| (key == COMMAND_PARAM).then_some(value))
    else {
        debug!("command request without a command parameter");
        return "command: ".to_string();
    };

    if let Err(e) = state.controller.command(command.as_str(), "http").await {
        warn!(command = %command, error = %e, "command not queued");
    }
    format!("command: {command}")
}

async fn status_handler(State(state): State<AppState>) -> Json<VehicleSnapshot> {
    Json(state.controller.snapshot())
}

// ---------------------------------------------------------------------------
// WebSocket
// ---------------------------------------------------------------------------

fn upgrade(ws: WebSocketUpgrade, peer: SocketAddr, state: AppState) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, peer, state))
}

async fn handle_socket(socket: WebSocket, peer: SocketAddr, state: AppState) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let mut observer = state.broadcaster.connect();
    info!(%peer, observer = %observer.id(), "realtime client connected");

    loop {
        tokio::select! {
            // ── Downstream: broadcaster → client ──────────────────────────
            frame = observer.recv() => {
                let Some(frame) = frame else { break };
                match serde_json::to_string(&frame) {
                    Ok(json) => {
                        if ws_tx.send(Message::Text(json)).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!(error = %e, "frame serialization failed"),
                }
            }
            // ── Upstream: client → controller / broadcaster ───────────────
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        handle_upstream_message(
                            &text,
                            observer.id(),
                            &state.controller,
                            &state.broadcaster,
                        )
                        .await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        debug!(%peer, error = %e, "websocket error");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    info!(%peer, observer = %observer.id(), "realtime client disconnected");
}

/// Apply one text frame from a realtime client.
///
/// | Event | Effect |
/// |---|---|
/// | `robot command` | command queued on the controller |
/// | `robot update` | merged with the link flag, sent to every other client |
///
/// Anything else (unknown events, invalid JSON) is logged and dropped.
pub(crate) async fn handle_upstream_message(
    text: &str,
    origin: ObserverId,
    controller: &ControllerHandle,
    broadcaster: &StatusBroadcaster,
) {
    let frame = match serde_json::from_str::<ClientFrame>(text) {
        Ok(frame) => frame,
        Err(e) => {
            debug!(observer = %origin, error = %e, "ignoring unrecognised frame");
            return;
        }
    };

    match frame {
        ClientFrame::RobotCommand(raw) => {
            if let Err(e) = controller.command(raw, "ws").await {
                warn!(observer = %origin, error = %e, "command not queued");
            }
        }
        ClientFrame::RobotUpdate(report) => {
            let delivered = broadcaster.publish_update(origin, report);
            debug!(observer = %origin, delivered, "status update relayed");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rcpilot_hal::{Board, Channel, SimBoard};
    use rcpilot_kernel::{Controller, NamedValues};
    use rcpilot_middleware::LINK_STATUS_KEY;
    use rcpilot_types::{ActuatorConfig, ServerFrame};
    use serde_json::{Value, json};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;
    use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};

    async fn linked() -> (ControllerHandle, StatusBroadcaster, SimBoard) {
        let controller = Controller::spawn(NamedValues::default());
        let board = SimBoard::default();
        let bank = board
            .connect(ActuatorConfig::acceleration(), ActuatorConfig::steering())
            .await
            .unwrap();
        controller.link_ready(bank).await.unwrap();
        controller
            .watch_status()
            .wait_for(|s| s.has_actuator_link)
            .await
            .unwrap();
        let broadcaster = StatusBroadcaster::new(controller.watch_status());
        (controller, broadcaster, board)
    }

    async fn start(controller: ControllerHandle, broadcaster: StatusBroadcaster, public_dir: &Path) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = CockpitServer::new(controller, broadcaster).with_public_dir(public_dir);
        tokio::spawn(server.serve(listener));
        addr
    }

    async fn http_request(addr: SocketAddr, method: &str, target: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let request = format!(
            "{method} {target} HTTP/1.1\r\nHost: car\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
        );
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut response = Vec::new();
        stream.read_to_end(&mut response).await.unwrap();
        String::from_utf8_lossy(&response).into_owned()
    }

    async fn http_get(addr: SocketAddr, target: &str) -> String {
        http_request(addr, "GET", target).await
    }

    fn body(response: &str) -> &str {
        response.split_once("\r\n\r\n").map(|(_, b)| b).unwrap_or("")
    }

    fn has_header(response: &str, header: &str) -> bool {
        let head = response.split_once("\r\n\r\n").map(|(h, _)| h).unwrap_or(response);
        head.to_ascii_lowercase().contains(&header.to_ascii_lowercase())
    }

    // ── Builder ───────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn defaults_and_overrides() {
        let controller = Controller::spawn(NamedValues::default());
        let broadcaster = StatusBroadcaster::new(controller.watch_status());
        let server = CockpitServer::new(controller, broadcaster);
        assert_eq!(server.port(), DEFAULT_PORT);
        assert_eq!(server.public_dir(), Path::new(DEFAULT_PUBLIC_DIR));

        let server = server.with_port(8080).with_public_dir("/srv/www");
        assert_eq!(server.port(), 8080);
        assert_eq!(server.public_dir(), Path::new("/srv/www"));
    }

    // ── Upstream message handling ─────────────────────────────────────────────

    #[tokio::test]
    async fn upstream_command_reaches_the_servos() {
        let (controller, broadcaster, board) = linked().await;
        let origin = broadcaster.connect().id();

        let msg = r#"{"event":"robot command","data":"manual-turn-left"}"#;
        handle_upstream_message(msg, origin, &controller, &broadcaster).await;
        controller.full_stop().await.unwrap();

        assert!(board.probe(Channel::Steering).writes().contains(&40));
    }

    #[tokio::test]
    async fn upstream_update_is_relayed_to_others_only() {
        let (controller, broadcaster, _board) = linked().await;
        let mut sender = broadcaster.connect();
        let mut other = broadcaster.connect();
        sender.recv().await.unwrap();
        other.recv().await.unwrap();

        let msg = r#"{"event":"robot update","data":{"faces":2}}"#;
        handle_upstream_message(msg, sender.id(), &controller, &broadcaster).await;

        let ServerFrame::RobotStatus(report) = other.recv().await.unwrap();
        assert_eq!(report["faces"], 2);
        assert_eq!(report[LINK_STATUS_KEY], true);
        assert!(sender.try_recv().is_none());
    }

    #[tokio::test]
    async fn upstream_garbage_is_ignored() {
        let (controller, broadcaster, board) = linked().await;
        let mut observer = broadcaster.connect();
        observer.recv().await.unwrap();

        for msg in ["not json at all", r#"{"event":"robot dance","data":1}"#, r#"{"topic":"/cmd_vel"}"#] {
            handle_upstream_message(msg, observer.id(), &controller, &broadcaster).await;
        }
        controller.full_stop().await.unwrap();

        assert!(observer.try_recv().is_none());
        // Homing plus the full stop only.
        assert_eq!(board.probe(Channel::Steering).writes(), vec![70, 75]);
    }

    // ── HTTP ──────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn http_command_echoes_and_dispatches() {
        let (controller, broadcaster, board) = linked().await;
        let dir = tempfile::tempdir().unwrap();
        let addr = start(controller.clone(), broadcaster, dir.path()).await;

        let response = http_get(addr, "/command?command=manual-turn-right").await;
        assert!(response.starts_with("HTTP/1.1 200 OK"));
        assert!(has_header(&response, "content-type: text/plain"));
        assert_eq!(body(&response), "command: manual-turn-right");

        controller.full_stop().await.unwrap();
        assert!(board.probe(Channel::Steering).writes().contains(&100));
    }

    #[tokio::test]
    async fn http_command_is_always_200() {
        let (controller, broadcaster, _board) = linked().await;
        let dir = tempfile::tempdir().unwrap();
        let addr = start(controller, broadcaster, dir.path()).await;

        let response = http_get(addr, "/command/?command=fly-away").await;
        assert!(response.starts_with("HTTP/1.1 200 OK"));
        assert_eq!(body(&response), "command: fly-away");

        let response = http_get(addr, "/command").await;
        assert!(response.starts_with("HTTP/1.1 200 OK"));
        assert_eq!(body(&response), "command: ");
    }

    #[tokio::test]
    async fn http_command_query_is_decoded_and_first_key_wins() {
        let (controller, broadcaster, _board) = linked().await;
        let dir = tempfile::tempdir().unwrap();
        let addr = start(controller, broadcaster, dir.path()).await;

        let response = http_get(addr, "/command?command=red%2Dbegin&command=stop").await;
        assert_eq!(body(&response), "command: red-begin");

        let response = http_get(addr, "/command?other=1&command=face+begin").await;
        assert_eq!(body(&response), "command: face begin");
    }

    #[tokio::test]
    async fn http_status_returns_snapshot_json() {
        let (controller, broadcaster, _board) = linked().await;
        controller.full_stop().await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        let addr = start(controller, broadcaster, dir.path()).await;

        let response = http_get(addr, "/status").await;
        assert!(has_header(&response, "content-type: application/json"));
        let snapshot: Value = serde_json::from_str(body(&response)).unwrap();
        assert_eq!(snapshot["status"]["has_actuator_link"], true);
        assert_eq!(snapshot["steering"]["position"], 75);
    }

    #[tokio::test]
    async fn http_serves_index_and_static_files() {
        let (controller, broadcaster, _board) = linked().await;
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("app.css"), "body{}").unwrap();
        let addr = start(controller, broadcaster, dir.path()).await;

        let index = http_get(addr, "/").await;
        assert!(has_header(&index, "content-type: text/html"));
        assert!(body(&index).contains("WebSocket"));

        let css = http_get(addr, "/app.css").await;
        assert!(has_header(&css, "content-type: text/css"));
        assert_eq!(body(&css), "body{}");

        let missing = http_get(addr, "/nope.js").await;
        assert!(missing.starts_with("HTTP/1.1 404"));

        let escape = http_get(addr, "/../Cargo.toml").await;
        assert!(escape.starts_with("HTTP/1.1 404"));
    }

    #[tokio::test]
    async fn http_rejects_other_methods() {
        let (controller, broadcaster, board) = linked().await;
        let dir = tempfile::tempdir().unwrap();
        let addr = start(controller.clone(), broadcaster, dir.path()).await;

        let response = http_request(addr, "POST", "/command?command=manual-turn-left").await;
        assert!(response.starts_with("HTTP/1.1 405"));

        controller.full_stop().await.unwrap();
        assert!(!board.probe(Channel::Steering).writes().contains(&40));
    }

    #[tokio::test]
    async fn stalled_client_does_not_block_others() {
        let (controller, broadcaster, _board) = linked().await;
        let dir = tempfile::tempdir().unwrap();
        let addr = start(controller, broadcaster, dir.path()).await;

        // Half a request head, never finished.
        let mut stalled = TcpStream::connect(addr).await.unwrap();
        stalled.write_all(b"GET /status HTTP/1.1\r\nHost: ").await.unwrap();

        let response = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            http_get(addr, "/command?command=stop"),
        )
        .await
        .expect("second client was served");
        assert_eq!(body(&response), "command: stop");
    }

    // ── WebSocket ─────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn websocket_greets_and_relays() {
        let (controller, broadcaster, board) = linked().await;
        let dir = tempfile::tempdir().unwrap();
        let addr = start(controller.clone(), broadcaster, dir.path()).await;

        let (mut a, _) = connect_async(format!("ws://{addr}/")).await.unwrap();
        let (mut b, _) = connect_async(format!("ws://{addr}/ws")).await.unwrap();

        for ws in [&mut a, &mut b] {
            let Some(Ok(WsMessage::Text(greeting))) = ws.next().await else {
                panic!("expected greeting");
            };
            let frame: Value = serde_json::from_str(greeting.as_str()).unwrap();
            assert_eq!(frame, json!({ "event": "robot status", "data": "server connected" }));
        }

        let update = json!({ "event": "robot update", "data": { "fps": 9 } });
        a.send(WsMessage::Text(update.to_string().into())).await.unwrap();
        let Some(Ok(WsMessage::Text(relayed))) = b.next().await else {
            panic!("expected relayed status");
        };
        let frame: Value = serde_json::from_str(relayed.as_str()).unwrap();
        assert_eq!(frame["event"], "robot status");
        assert_eq!(frame["data"]["fps"], 9);
        assert_eq!(frame["data"][LINK_STATUS_KEY], true);

        let mut snapshots = controller.watch_snapshot();
        let command = json!({ "event": "robot command", "data": "manual-throttle-forward-1000" });
        b.send(WsMessage::Text(command.to_string().into())).await.unwrap();
        snapshots
            .wait_for(|s| s.acceleration.as_ref().is_some_and(|servo| servo.position == 65))
            .await
            .unwrap();
        assert!(board.probe(Channel::Acceleration).writes().contains(&65));
    }

    // ── HTML embedding ────────────────────────────────────────────────────────

    #[test]
    fn cockpit_html_contains_websocket_connect_code() {
        assert!(COCKPIT_HTML.contains("WebSocket"));
        assert!(COCKPIT_HTML.contains("robot command"));
    }

    #[test]
    fn cockpit_html_binds_arrow_keys() {
        assert!(COCKPIT_HTML.contains("ArrowUp") && COCKPIT_HTML.contains("ArrowLeft"));
    }
}
