//! Fixed-window request counters.
//!
//! Counters are keyed by client (address, optionally composed with the
//! authenticated subject) and by route policy. Windows expire lazily: a
//! key resets the first time it is touched after its window elapsed, so
//! stale entries cost memory bounded by distinct-key churn, never a
//! background sweep.

use axum::http::Method;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// One limit/window pair.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WindowSetting {
    pub limit: u32,
    pub window_seconds: u64,
}

/// Per-route limits layered on top of the application-wide default.
/// The numbers mirror the production deployment profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitSettings {
    pub default: WindowSetting,
    pub login: WindowSetting,
    pub register: WindowSetting,
    pub upload: WindowSetting,
    pub delete: WindowSetting,
    pub health: WindowSetting,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            default: WindowSetting {
                limit: 100,
                window_seconds: 3600,
            },
            login: WindowSetting {
                limit: 5,
                window_seconds: 60,
            },
            register: WindowSetting {
                limit: 3,
                window_seconds: 3600,
            },
            upload: WindowSetting {
                limit: 10,
                window_seconds: 3600,
            },
            delete: WindowSetting {
                limit: 5,
                window_seconds: 3600,
            },
            health: WindowSetting {
                limit: 30,
                window_seconds: 60,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum PolicyKind {
    Default,
    Login,
    Register,
    Upload,
    Delete,
    Health,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Admitted,
    Rejected { retry_after_seconds: u64 },
}

struct Window {
    started: Instant,
    count: u32,
}

pub struct RateLimiter {
    settings: RateLimitSettings,
    windows: Mutex<HashMap<(PolicyKind, String), Window>>,
}

impl RateLimiter {
    #[must_use]
    pub fn new(settings: RateLimitSettings) -> Self {
        Self {
            settings,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Which route-specific policy applies, if any. The default policy
    /// always applies in addition.
    fn route_policy(method: &Method, path: &str) -> Option<PolicyKind> {
        if *method == Method::POST && path == "/api/auth/login" {
            return Some(PolicyKind::Login);
        }
        if *method == Method::POST && path == "/api/auth/register" {
            return Some(PolicyKind::Register);
        }
        if *method == Method::POST && path == "/api/documents/upload" {
            return Some(PolicyKind::Upload);
        }
        if *method == Method::DELETE {
            return Some(PolicyKind::Delete);
        }
        if *method == Method::GET && path == "/api/health" {
            return Some(PolicyKind::Health);
        }
        None
    }

    const fn setting(&self, kind: PolicyKind) -> WindowSetting {
        match kind {
            PolicyKind::Default => self.settings.default,
            PolicyKind::Login => self.settings.login,
            PolicyKind::Register => self.settings.register,
            PolicyKind::Upload => self.settings.upload,
            PolicyKind::Delete => self.settings.delete,
            PolicyKind::Health => self.settings.health,
        }
    }

    /// Admit-or-reject for one request. The whole read-modify-write runs
    /// under one lock so two racing requests on the same key cannot both
    /// slip past the limit, and a rejected request consumes no quota from
    /// any window.
    pub fn check(&self, method: &Method, path: &str, key: &str) -> Decision {
        self.check_at(method, path, key, Instant::now())
    }

    fn check_at(&self, method: &Method, path: &str, key: &str, now: Instant) -> Decision {
        let mut applicable = vec![PolicyKind::Default];
        if let Some(kind) = Self::route_policy(method, path) {
            applicable.push(kind);
        }

        let mut windows = self.windows.lock().expect("rate limiter lock poisoned");

        // First pass: lazily reset elapsed windows and look for a full one
        for &kind in &applicable {
            let setting = self.setting(kind);
            let window = windows
                .entry((kind, key.to_string()))
                .or_insert_with(|| Window {
                    started: now,
                    count: 0,
                });

            if now.duration_since(window.started) >= Duration::from_secs(setting.window_seconds) {
                window.started = now;
                window.count = 0;
            }

            if window.count >= setting.limit {
                let elapsed = now.duration_since(window.started).as_secs();
                let retry_after_seconds = setting.window_seconds.saturating_sub(elapsed).max(1);
                return Decision::Rejected {
                    retry_after_seconds,
                };
            }
        }

        // Second pass: the request is admitted, count it everywhere
        for &kind in &applicable {
            if let Some(window) = windows.get_mut(&(kind, key.to_string())) {
                window.count += 1;
            }
        }

        Decision::Admitted
    }
}
