//! Axum WebSocket server: screens upgrades through the rate limiter and
//! origin guard (§4.D), then serves the RPC surface (§6) as JSON text
//! frames, one `RpcRequest` per frame.
//!
//! Routing style grounded on the teacher's swarm daemon (`Router::new()`,
//! `.with_state`, `axum::serve` over a `std`-bound-then-converted listener).

use axum::extract::connect_info::ConnectInfo;
use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use std::net::SocketAddr;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::rpc::{dispatch, RpcRequest, RpcResponse};
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: axum::http::HeaderMap,
) -> impl IntoResponse {
    let ip = addr.ip().to_string();
    let is_loopback = addr.ip().is_loopback();
    let origin = headers
        .get(axum::http::header::ORIGIN)
        .and_then(|v| v.to_str().ok());

    if let Err(err) = state.origin_guard.check_origin(is_loopback, origin) {
        let reason = err.to_string();
        crate::observability::security_origin_rejected(origin.unwrap_or(""), &reason);
        return (StatusCode::FORBIDDEN, reason).into_response();
    }

    if let Err(wardline_trust::TrustError::RateLimited { retry_after_ms }) =
        state.rate_limiter.check_connection(&ip)
    {
        crate::observability::security_rate_limited(&ip, "connection", retry_after_ms);
        return (
            StatusCode::TOO_MANY_REQUESTS,
            format!("retry_after_ms={retry_after_ms}"),
        )
            .into_response();
    }

    ws.on_upgrade(move |socket| handle_socket(socket, state, ip))
}

async fn handle_socket(mut socket: WebSocket, state: AppState, ip: String) {
    let connection_id = Uuid::new_v4().to_string();
    let mut events = state.events.subscribe();

    loop {
        tokio::select! {
            incoming = socket.recv() => {
                let Some(Ok(message)) = incoming else { break };
                match message {
                    Message::Text(text) => {
                        if let Err(close) = handle_rpc_frame(&mut socket, &state, &ip, &connection_id, &text).await {
                            let _ = socket.send(Message::Close(Some(close))).await;
                            break;
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            event = events.recv() => {
                if let Ok(event) = event {
                    let payload = serde_json::to_string(&EventFrame::from(event)).unwrap_or_default();
                    if socket.send(Message::Text(payload)).await.is_err() {
                        break;
                    }
                }
            }
        }
    }

    state.rate_limiter.remove_connection(&connection_id);
}

/// Processes one inbound text frame. Returns `Err(close_frame)` when the
/// connection must be closed with WebSocket status 1008 (rate-limit / origin
/// policy violations close the connection per the error-handling design).
async fn handle_rpc_frame(
    socket: &mut WebSocket,
    state: &AppState,
    ip: &str,
    connection_id: &str,
    text: &str,
) -> Result<(), CloseFrame<'static>> {
    if let Err(wardline_trust::TrustError::RateLimited { retry_after_ms }) =
        state.rate_limiter.check_rpc_call(connection_id)
    {
        crate::observability::security_rate_limited(ip, "rpc", retry_after_ms);
        return Err(CloseFrame {
            code: 1008,
            reason: "rate limited".into(),
        });
    }

    let response = match serde_json::from_str::<RpcRequest>(text) {
        Ok(request) => dispatch(&state.coordinator, request),
        Err(err) => RpcResponse::invalid_request(err.to_string()),
    };

    let payload = serde_json::to_string(&response).unwrap_or_default();
    let _ = socket.send(Message::Text(payload)).await;
    Ok(())
}

#[derive(serde::Serialize)]
#[serde(tag = "type")]
enum EventFrame {
    #[serde(rename = "approval_request")]
    ApprovalRequest {
        request_id: Uuid,
        session_key: String,
        run_id: String,
        action: wardline_trust::approval::ApprovalAction,
        timestamp_ms: u64,
    },
    #[serde(rename = "approval_resolved")]
    ApprovalResolved {
        request_id: Uuid,
        session_key: String,
        run_id: String,
        decision: wardline_trust::approval::ApprovalDecision,
    },
}

impl From<wardline_trust::events::ApprovalEvent> for EventFrame {
    fn from(event: wardline_trust::events::ApprovalEvent) -> Self {
        use wardline_trust::events::ApprovalEvent;
        match event {
            ApprovalEvent::ApprovalRequest(request) => EventFrame::ApprovalRequest {
                request_id: request.request_id,
                session_key: request.session_key,
                run_id: request.run_id,
                action: request.action,
                timestamp_ms: request.timestamp_ms,
            },
            ApprovalEvent::ApprovalResolved {
                request_id,
                session_key,
                run_id,
                decision,
            } => EventFrame::ApprovalResolved {
                request_id,
                session_key,
                run_id,
                decision,
            },
        }
    }
}
