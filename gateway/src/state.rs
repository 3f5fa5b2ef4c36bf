//! Shared application state: constructed once at startup, cloned into every
//! connection handler.

use std::sync::Arc;
use tokio::sync::broadcast;
use wardline_core::config::{ApprovalConfig, OriginConfig, RateLimitConfig};
use wardline_trust::approval::ApprovalCoordinator;
use wardline_trust::events::ApprovalEvent;
use wardline_trust::ratelimit::{OriginGuard, RateLimiter};

#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<ApprovalCoordinator>,
    pub rate_limiter: Arc<RateLimiter>,
    pub origin_guard: Arc<OriginGuard>,
    /// Fanned out to every connected WebSocket; the gateway's stand-in for
    /// the wider product's session-subscriber event bus.
    pub events: broadcast::Sender<ApprovalEvent>,
}

impl AppState {
    pub fn from_env() -> Self {
        let (events_tx, _rx) = broadcast::channel(1024);
        let emitter_tx = events_tx.clone();
        let emitter: wardline_trust::events::EventEmitter = Arc::new(move |event| {
            match &event {
                ApprovalEvent::ApprovalRequest(request) => {
                    crate::observability::audit_approval_requested(
                        &request.request_id.to_string(),
                        &request.session_key,
                        &request.run_id,
                        &format!("{:?}", request.action.kind),
                    );
                }
                ApprovalEvent::ApprovalResolved {
                    request_id,
                    decision,
                    ..
                } => {
                    crate::observability::audit_approval_resolved(
                        &request_id.to_string(),
                        &format!("{decision:?}"),
                    );
                }
            }
            let _ = emitter_tx.send(event);
        });

        let approval_cfg = ApprovalConfig::from_env();
        let rate_cfg = RateLimitConfig::from_env();
        let origin_cfg = OriginConfig::from_env();

        Self {
            coordinator: Arc::new(ApprovalCoordinator::new(emitter, approval_cfg.timeout_ms)),
            rate_limiter: Arc::new(RateLimiter::from_config(&rate_cfg)),
            origin_guard: Arc::new(OriginGuard::from_config(&origin_cfg)),
            events: events_tx,
        }
    }
}
