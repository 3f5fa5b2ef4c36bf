//! The approval coordinator's outbound event-bus seam.
//!
//! The gateway's event bus, the human client, and delivery guarantees are
//! all out of scope for this crate — the coordinator depends only on an
//! injected emitter closure, matching the trait-object seam the teacher
//! uses for its own global audit/observability hooks.

use crate::approval::{ApprovalDecision, ApprovalRequest};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub enum ApprovalEvent {
    ApprovalRequest(ApprovalRequest),
    ApprovalResolved {
        request_id: uuid::Uuid,
        session_key: String,
        run_id: String,
        decision: ApprovalDecision,
    },
}

/// Best-effort broadcast; no ordering or delivery guarantees are required.
pub type EventEmitter = Arc<dyn Fn(ApprovalEvent) + Send + Sync>;
