//! Connection-Level Rate Limiter & Origin Guard.
//!
//! Grounded on the module-split seen in the pack's gateway reference
//! (`server-gateway::rate_limit`, `::policy`): each concern (connection
//! quota, RPC quota, auth lockout, origin allowlist) is its own small
//! sliding-window structure, composed here by a single `RateLimiter` facade
//! instead of one monolithic mutex.

use crate::error::TrustError;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

const AUTH_WINDOW: Duration = Duration::from_secs(60);
const MAX_BACKOFF_MULTIPLIER: u32 = 32;

struct AuthState {
    failures: VecDeque<Instant>,
    lockout_until: Option<Instant>,
    backoff_multiplier: u32,
}

impl Default for AuthState {
    fn default() -> Self {
        Self {
            failures: VecDeque::new(),
            lockout_until: None,
            backoff_multiplier: 1,
        }
    }
}

/// Sliding-window quota enforcement plus auth-failure lockout tracking.
pub struct RateLimiter {
    conn_windows: Mutex<HashMap<String, VecDeque<Instant>>>,
    rpc_windows: Mutex<HashMap<String, VecDeque<Instant>>>,
    auth_state: Mutex<HashMap<String, AuthState>>,
    conn_limit: u64,
    rpc_limit: u64,
    auth_failure_threshold: u64,
    pub cleanup_interval: Duration,
}

fn prune(window: &mut VecDeque<Instant>, now: Instant, span: Duration) {
    while let Some(&front) = window.front() {
        if now.duration_since(front) > span {
            window.pop_front();
        } else {
            break;
        }
    }
}

impl RateLimiter {
    pub fn new(conn_limit: u64, rpc_limit: u64, auth_failure_threshold: u64, cleanup_interval: Duration) -> Self {
        Self {
            conn_windows: Mutex::new(HashMap::new()),
            rpc_windows: Mutex::new(HashMap::new()),
            auth_state: Mutex::new(HashMap::new()),
            conn_limit,
            rpc_limit,
            auth_failure_threshold,
            cleanup_interval,
        }
    }

    pub fn from_config(cfg: &wardline_core::config::RateLimitConfig) -> Self {
        Self::new(
            cfg.conn_limit_per_min,
            cfg.rpc_limit_per_sec,
            cfg.auth_failure_threshold,
            Duration::from_millis(cfg.cleanup_interval_ms),
        )
    }

    /// 1-minute sliding window, default ≤10 per IP.
    pub fn check_connection(&self, ip: &str) -> Result<(), TrustError> {
        let now = Instant::now();
        let mut windows = self.conn_windows.lock().expect("conn_windows poisoned");
        let window = windows.entry(ip.to_string()).or_default();
        prune(window, now, Duration::from_secs(60));
        if (window.len() as u64) < self.conn_limit {
            window.push_back(now);
            Ok(())
        } else {
            let oldest = *window.front().expect("window full implies non-empty");
            let retry_after = Duration::from_secs(60).saturating_sub(now.duration_since(oldest));
            Err(TrustError::RateLimited {
                retry_after_ms: retry_after.as_millis() as u64,
            })
        }
    }

    /// 1-second sliding window, default ≤100, per connection.
    pub fn check_rpc_call(&self, connection_id: &str) -> Result<(), TrustError> {
        let now = Instant::now();
        let mut windows = self.rpc_windows.lock().expect("rpc_windows poisoned");
        let window = windows.entry(connection_id.to_string()).or_default();
        prune(window, now, Duration::from_secs(1));
        if (window.len() as u64) < self.rpc_limit {
            window.push_back(now);
            Ok(())
        } else {
            let oldest = *window.front().expect("window full implies non-empty");
            let retry_after = Duration::from_secs(1).saturating_sub(now.duration_since(oldest));
            Err(TrustError::RateLimited {
                retry_after_ms: retry_after.as_millis() as u64,
            })
        }
    }

    /// Connection teardown: drop this connection's RPC window.
    pub fn remove_connection(&self, connection_id: &str) {
        self.rpc_windows
            .lock()
            .expect("rpc_windows poisoned")
            .remove(connection_id);
    }

    /// Denied with `retry_after_ms` if `ip` is inside an active lockout.
    pub fn check_auth_attempt(&self, ip: &str) -> Result<(), TrustError> {
        let now = Instant::now();
        let state = self.auth_state.lock().expect("auth_state poisoned");
        if let Some(entry) = state.get(ip) {
            if let Some(until) = entry.lockout_until {
                if until > now {
                    return Err(TrustError::RateLimited {
                        retry_after_ms: until.duration_since(now).as_millis() as u64,
                    });
                }
            }
        }
        Ok(())
    }

    /// Record a failed authentication attempt for `ip`.
    pub fn record_auth_failure(&self, ip: &str) {
        let now = Instant::now();
        let mut state = self.auth_state.lock().expect("auth_state poisoned");
        let entry = state.entry(ip.to_string()).or_default();
        entry.failures.push_back(now);
        prune(&mut entry.failures, now, AUTH_WINDOW);

        let currently_locked = entry.lockout_until.map(|until| until > now).unwrap_or(false);
        if currently_locked {
            entry.backoff_multiplier = (entry.backoff_multiplier * 2).min(MAX_BACKOFF_MULTIPLIER);
            entry.lockout_until = Some(now + AUTH_WINDOW * entry.backoff_multiplier);
        } else if entry.failures.len() as u64 >= self.auth_failure_threshold {
            entry.lockout_until = Some(now + AUTH_WINDOW * entry.backoff_multiplier);
        }
    }

    /// Successful authentication: erase the IP's auth record entirely.
    pub fn clear_auth_failures(&self, ip: &str) {
        self.auth_state.lock().expect("auth_state poisoned").remove(ip);
    }

    /// Evict expired timestamps and fully-idle entries. Intended to run
    /// periodically from a detached janitor task.
    pub fn cleanup(&self) {
        let now = Instant::now();

        let mut conns = self.conn_windows.lock().expect("conn_windows poisoned");
        conns.retain(|_, window| {
            prune(window, now, Duration::from_secs(60));
            !window.is_empty()
        });
        drop(conns);

        let mut rpcs = self.rpc_windows.lock().expect("rpc_windows poisoned");
        rpcs.retain(|_, window| {
            prune(window, now, Duration::from_secs(1));
            !window.is_empty()
        });
        drop(rpcs);

        let mut auths = self.auth_state.lock().expect("auth_state poisoned");
        auths.retain(|_, entry| {
            prune(&mut entry.failures, now, AUTH_WINDOW);
            let locked = entry.lockout_until.map(|until| until > now).unwrap_or(false);
            locked || !entry.failures.is_empty()
        });
    }
}

/// Spawn the background janitor as a detached task. It is never awaited by
/// shutdown, so it cannot prevent process exit; dropping the returned
/// handle (or the runtime) ends it.
pub fn spawn_janitor(limiter: std::sync::Arc<RateLimiter>) -> tokio::task::JoinHandle<()> {
    let interval = limiter.cleanup_interval;
    tokio::task::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;
            limiter.cleanup();
        }
    })
}

/// WebSocket upgrade Origin screening.
pub struct OriginGuard {
    allowed_origins: Vec<String>,
}

impl OriginGuard {
    pub fn new(allowed_origins: Vec<String>) -> Self {
        Self { allowed_origins }
    }

    pub fn from_config(cfg: &wardline_core::config::OriginConfig) -> Self {
        Self::new(cfg.allowed_origins.clone())
    }

    /// `peer_is_loopback` covers IPv4 127.0.0.0/8, IPv4-mapped
    /// `::ffff:127.0.0.0/104`, and IPv6 `::1`.
    pub fn check_origin(
        &self,
        peer_is_loopback: bool,
        origin_header: Option<&str>,
    ) -> Result<(), TrustError> {
        if peer_is_loopback {
            return Ok(());
        }
        let Some(origin) = origin_header else {
            // Non-browser peers do not send an Origin header.
            return Ok(());
        };

        let parsed = url::Url::parse(origin).map_err(|_| TrustError::OriginRejected {
            reason: "invalid_origin_format".to_string(),
        })?;
        let host = parsed.host_str().ok_or_else(|| TrustError::OriginRejected {
            reason: "invalid_origin_format".to_string(),
        })?;

        if host == "localhost" || host == "127.0.0.1" || host == "::1" || host.ends_with(".ts.net") {
            return Ok(());
        }

        if self.allowed_origins.is_empty() {
            return Err(TrustError::OriginRejected {
                reason: "origin_not_allowlisted".to_string(),
            });
        }

        for allowed in &self.allowed_origins {
            if let Some(suffix) = allowed.strip_prefix("*.") {
                if host == suffix || host.ends_with(&format!(".{suffix}")) {
                    return Ok(());
                }
            } else if allowed == origin || allowed == host {
                return Ok(());
            }
        }

        Err(TrustError::OriginRejected {
            reason: "origin_not_allowlisted".to_string(),
        })
    }
}
