//! JSON-RPC-like wire envelope for the gateway's WebSocket surface.
//!
//! Two inbound methods, matching the approval coordinator's external
//! contract: `chat.approval.respond` and `chat.approval.status`.

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use wardline_trust::approval::ApprovalDecision;

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum RpcRequest {
    #[serde(rename = "chat.approval.respond")]
    Respond {
        request_id: Uuid,
        decision: String,
    },
    #[serde(rename = "chat.approval.status")]
    Status { request_id: Uuid },
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum RpcResponse {
    RespondOk {
        ok: bool,
        request_id: Uuid,
        decision: ApprovalDecision,
    },
    StatusOk {
        request_id: Uuid,
        pending: bool,
    },
    Error {
        error: RpcError,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct RpcError {
    pub code: &'static str,
    pub message: String,
}

impl RpcResponse {
    pub fn invalid_request(message: impl Into<String>) -> Self {
        RpcResponse::Error {
            error: RpcError {
                code: "INVALID_REQUEST",
                message: message.into(),
            },
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        RpcResponse::Error {
            error: RpcError {
                code: "NOT_FOUND",
                message: message.into(),
            },
        }
    }

    pub fn already_resolved(message: impl Into<String>) -> Self {
        RpcResponse::Error {
            error: RpcError {
                code: "ALREADY_RESOLVED",
                message: message.into(),
            },
        }
    }
}

/// Handle one parsed `RpcRequest` against the shared coordinator.
pub fn dispatch(
    coordinator: &wardline_trust::approval::ApprovalCoordinator,
    request: RpcRequest,
) -> RpcResponse {
    match request {
        RpcRequest::Respond { request_id, decision } => {
            let decision = match ApprovalDecision::parse(&decision) {
                Ok(d) => d,
                Err(_) => {
                    return RpcResponse::invalid_request(format!(
                        "invalid decision: {decision}"
                    ))
                }
            };
            let was_pending = coordinator.has_pending(&request_id);
            match coordinator.resolve_approval(request_id, decision) {
                Ok(()) => RpcResponse::RespondOk {
                    ok: true,
                    request_id,
                    decision,
                },
                Err(_) if was_pending => {
                    RpcResponse::already_resolved("request was already resolved")
                }
                Err(_) => RpcResponse::not_found("no pending request with that id"),
            }
        }
        RpcRequest::Status { request_id } => RpcResponse::StatusOk {
            request_id,
            pending: coordinator.has_pending(&request_id),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use wardline_trust::approval::{ApprovalAction, ApprovalCoordinator, ApprovalKind};

    fn noop_emitter() -> wardline_trust::events::EventEmitter {
        Arc::new(|_event| {})
    }

    #[tokio::test]
    async fn status_reports_pending_then_not_pending() {
        let coordinator = ApprovalCoordinator::new(noop_emitter(), 5_000);
        let (id, _rx) = coordinator.request_approval(
            "S".to_string(),
            "R".to_string(),
            ApprovalAction {
                kind: ApprovalKind::Write,
                command: None,
                file_path: Some("/tmp/x".to_string()),
                preview: None,
                tool_args: serde_json::json!({}),
            },
            Some(5_000),
        );

        let response = dispatch(&coordinator, RpcRequest::Status { request_id: id });
        assert!(matches!(response, RpcResponse::StatusOk { pending: true, .. }));

        let response = dispatch(
            &coordinator,
            RpcRequest::Respond {
                request_id: id,
                decision: "allow-once".to_string(),
            },
        );
        assert!(matches!(response, RpcResponse::RespondOk { ok: true, .. }));

        let response = dispatch(&coordinator, RpcRequest::Status { request_id: id });
        assert!(matches!(response, RpcResponse::StatusOk { pending: false, .. }));
    }

    #[tokio::test]
    async fn respond_with_invalid_decision_string_is_invalid_request() {
        let coordinator = ApprovalCoordinator::new(noop_emitter(), 5_000);
        let response = dispatch(
            &coordinator,
            RpcRequest::Respond {
                request_id: Uuid::new_v4(),
                decision: "maybe".to_string(),
            },
        );
        assert!(matches!(response, RpcResponse::Error { error } if error.code == "INVALID_REQUEST"));
    }

    #[tokio::test]
    async fn respond_to_unknown_request_id_is_not_found() {
        let coordinator = ApprovalCoordinator::new(noop_emitter(), 5_000);
        let response = dispatch(
            &coordinator,
            RpcRequest::Respond {
                request_id: Uuid::new_v4(),
                decision: "deny".to_string(),
            },
        );
        assert!(matches!(response, RpcResponse::Error { error } if error.code == "NOT_FOUND"));
    }
}
