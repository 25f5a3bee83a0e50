//! In-process abuse heuristics.
//!
//! Runs ahead of routing and authentication. Each client address
//! accumulates strikes for suspicious traits; enough strikes earn a timed
//! block. This is best-effort protection and deliberately independent of
//! the rate limiter: either one refusing a request is final.

use regex::RegexSet;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::{LazyLock, Mutex};
use std::time::{Duration, Instant};

/// Injection signatures checked case-insensitively against query strings
/// and textual request bodies.
static INJECTION_SIGNATURES: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        r"(?i)union.*select",
        r"(?i)select.*from",
        r"(?i)insert.*into",
        r"(?i)delete.*from",
        r"(?i)drop.*table",
        r"--",
        r"/\*",
        r"(?i)waitfor.*delay",
        r"(?i)xp_cmdshell",
    ])
    .expect("injection signature set must compile")
});

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AbuseSettings {
    /// Strikes before a timed block kicks in.
    pub strike_threshold: u32,

    /// Block duration once the threshold is reached.
    pub block_seconds: u64,

    /// Requests per `burst_window_seconds` tolerated on sensitive paths.
    pub burst_limit: usize,

    pub burst_window_seconds: u64,

    /// User-Agent values shorter than this count as implausible.
    pub min_user_agent_len: usize,

    /// At most this many body bytes are inspected for signatures.
    pub scan_cap_bytes: usize,

    /// Path prefixes where burst frequency earns strikes.
    pub sensitive_prefixes: Vec<String>,
}

impl Default for AbuseSettings {
    fn default() -> Self {
        Self {
            strike_threshold: 10,
            block_seconds: 900,
            burst_limit: 30,
            burst_window_seconds: 60,
            min_user_agent_len: 10,
            scan_cap_bytes: 64 * 1024,
            sensitive_prefixes: vec![
                "/api/auth".to_string(),
                "/api/users".to_string(),
                "/api/products".to_string(),
                "/api/documents".to_string(),
            ],
        }
    }
}

/// Everything the filter needs to know about one request.
#[derive(Debug)]
pub struct RequestSummary<'a> {
    pub client_ip: &'a str,
    pub user_agent: Option<&'a str>,
    pub path: &'a str,
    pub query: Option<&'a str>,
    /// Textual body bytes, when the content type is scannable.
    pub body: Option<&'a [u8]>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Clean,
    /// Reject this request outright (injection signature match).
    Reject,
    /// The address is serving a timed block.
    Blocked { retry_after_seconds: u64 },
}

#[derive(Default)]
struct ClientRecord {
    strikes: u32,
    blocked_until: Option<Instant>,
    recent_sensitive: VecDeque<Instant>,
}

pub struct AbuseFilter {
    settings: AbuseSettings,
    state: Mutex<HashMap<String, ClientRecord>>,
}

impl AbuseFilter {
    #[must_use]
    pub fn new(settings: AbuseSettings) -> Self {
        Self {
            settings,
            state: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub const fn settings(&self) -> &AbuseSettings {
        &self.settings
    }

    #[must_use]
    pub fn matches_signature(text: &str) -> bool {
        INJECTION_SIGNATURES.is_match(text)
    }

    pub fn inspect(&self, request: &RequestSummary<'_>) -> Verdict {
        self.inspect_at(request, Instant::now())
    }

    fn inspect_at(&self, request: &RequestSummary<'_>, now: Instant) -> Verdict {
        let mut state = self.state.lock().expect("abuse filter lock poisoned");
        let record = state.entry(request.client_ip.to_string()).or_default();

        if let Some(until) = record.blocked_until {
            if now < until {
                return Verdict::Blocked {
                    retry_after_seconds: until.duration_since(now).as_secs().max(1),
                };
            }
            record.blocked_until = None;
        }

        // Injection signatures short-circuit: strike and refuse before the
        // request reaches routing.
        if self.has_injection(request) {
            tracing::warn!(
                client_ip = request.client_ip,
                path = request.path,
                "Injection signature in request"
            );
            Self::strike(record, &self.settings, now);
            return Verdict::Reject;
        }

        let mut became_blocked = false;

        // Missing or implausibly short client identification
        let plausible_agent = request
            .user_agent
            .is_some_and(|ua| ua.len() >= self.settings.min_user_agent_len);
        if !plausible_agent {
            tracing::debug!(
                client_ip = request.client_ip,
                "Missing or implausible User-Agent"
            );
            became_blocked |= Self::strike(record, &self.settings, now);
        }

        // Burst frequency, only on sensitive prefixes
        if self
            .settings
            .sensitive_prefixes
            .iter()
            .any(|prefix| request.path.starts_with(prefix.as_str()))
        {
            let window = Duration::from_secs(self.settings.burst_window_seconds);
            record.recent_sensitive.push_back(now);
            while let Some(&oldest) = record.recent_sensitive.front() {
                if now.duration_since(oldest) >= window {
                    record.recent_sensitive.pop_front();
                } else {
                    break;
                }
            }
            if record.recent_sensitive.len() > self.settings.burst_limit {
                tracing::warn!(
                    client_ip = request.client_ip,
                    path = request.path,
                    "Burst frequency on sensitive path"
                );
                became_blocked |= Self::strike(record, &self.settings, now);
            }
        }

        if became_blocked {
            Verdict::Blocked {
                retry_after_seconds: self.settings.block_seconds,
            }
        } else {
            Verdict::Clean
        }
    }

    fn has_injection(&self, request: &RequestSummary<'_>) -> bool {
        if let Some(query) = request.query
            && INJECTION_SIGNATURES.is_match(query)
        {
            return true;
        }

        if let Some(body) = request.body {
            let capped = &body[..body.len().min(self.settings.scan_cap_bytes)];
            let text = String::from_utf8_lossy(capped);
            if INJECTION_SIGNATURES.is_match(&text) {
                return true;
            }
        }

        false
    }

    /// Records one strike. Returns true when the threshold was reached and
    /// a block started; the strike counter resets at that point.
    fn strike(record: &mut ClientRecord, settings: &AbuseSettings, now: Instant) -> bool {
        record.strikes += 1;
        if record.strikes >= settings.strike_threshold {
            record.blocked_until = Some(now + Duration::from_secs(settings.block_seconds));
            record.strikes = 0;
            true
        } else {
            false
        }
    }
}
