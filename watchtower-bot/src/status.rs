use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Bot health shared between the session manager, the scanner, the alert
/// dispatcher and the status route. Lock free; every field is written by
/// exactly one component.
#[derive(Debug)]
pub struct BotStatus {
    online: AtomicBool,
    /// Unix milliseconds of the last completed scan.
    last_check_ms: AtomicI64,
    alerts_sent: AtomicU64,
    started: Instant,
    started_at: DateTime<Utc>,
}

/// JSON body of `GET /`.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub status: &'static str,
    pub bot_online: bool,
    pub last_check: DateTime<Utc>,
    pub players_detected: u64,
    /// Seconds since the process started
    pub uptime: f64,
}

impl BotStatus {
    pub fn new() -> Self {
        let started_at = Utc::now();
        Self {
            online: AtomicBool::new(false),
            last_check_ms: AtomicI64::new(started_at.timestamp_millis()),
            alerts_sent: AtomicU64::new(0),
            started: Instant::now(),
            started_at,
        }
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::Relaxed);
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::Relaxed)
    }

    pub fn record_scan(&self) {
        self.last_check_ms
            .store(Utc::now().timestamp_millis(), Ordering::Relaxed);
    }

    pub fn last_check(&self) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp_millis(self.last_check_ms.load(Ordering::Relaxed))
            .unwrap_or(self.started_at)
    }

    /// Count one successfully delivered alert.
    pub fn record_alert(&self) {
        self.alerts_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn alerts_sent(&self) -> u64 {
        self.alerts_sent.load(Ordering::Relaxed)
    }

    pub fn report(&self) -> StatusReport {
        StatusReport {
            status: "Bot is running",
            bot_online: self.is_online(),
            last_check: self.last_check(),
            players_detected: self.alerts_sent(),
            uptime: self.started.elapsed().as_secs_f64(),
        }
    }
}

impl Default for BotStatus {
    fn default() -> Self {
        Self::new()
    }
}
