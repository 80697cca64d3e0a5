use crate::clock::Clock;
use crate::error::{ChatError, StorageError};
use crate::storage::KeyValueStore;
use chrono::{DateTime, Duration, TimeZone};
use log::{debug, info, warn};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

pub const STORAGE_KEY: &str = "compliance_chat_queries";
pub const DEFAULT_DAILY_MAX: u32 = 10;
/// Same shape as `Date.prototype.toDateString()`, e.g. "Mon Jan 01 2024".
pub const DATE_FORMAT: &str = "%a %b %d %Y";
/// Remaining count at or below which the quota display turns to a warning.
const LOW_WATERMARK: u32 = 2;

/// Persisted quota state.
///
/// Field names `queries`/`lastReset` are accepted as aliases so a record in
/// that shape can be dropped into the store by hand; only the field shape is
/// shared, the storage key is this client's own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaRecord {
    #[serde(
        rename = "queryCount",
        alias = "queries",
        deserialize_with = "lenient_count"
    )]
    pub query_count: u32,
    #[serde(rename = "lastResetDate", alias = "lastReset")]
    pub last_reset_date: String,
}

// Hand-edited records may hold `10.0`, `"4"` or a negative number. Keep the
// count instead of discarding the whole record: floor fractions, clamp to
// `0..=u32::MAX`.
fn lenient_count<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let number = match &value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match number {
        Some(n) if n.is_finite() => Ok(n.floor().clamp(0.0, u32::MAX as f64) as u32),
        _ => Err(D::Error::custom(format!(
            "queryCount must be a number, got {}",
            value
        ))),
    }
}

impl QuotaRecord {
    pub fn fresh(day: impl Into<String>) -> Self {
        Self {
            query_count: 0,
            last_reset_date: day.into(),
        }
    }
}

pub fn format_day<Tz: TimeZone>(now: &DateTime<Tz>) -> String
where
    Tz::Offset: fmt::Display,
{
    now.format(DATE_FORMAT).to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaLevel {
    Normal,
    Low,
    Exhausted,
}

/// Snapshot for the remaining-quota display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaStatus {
    pub used: u32,
    pub limit: u32,
    pub remaining: u32,
}

impl QuotaStatus {
    pub fn level(&self) -> QuotaLevel {
        match self.remaining {
            0 => QuotaLevel::Exhausted,
            r if r <= LOW_WATERMARK => QuotaLevel::Low,
            _ => QuotaLevel::Normal,
        }
    }
}

impl fmt::Display for QuotaStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} queries remaining today", self.remaining)
    }
}

/// Time left until the next local midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Countdown {
    pub hours: i64,
    pub minutes: i64,
    pub seconds: i64,
}

impl Countdown {
    pub fn from_seconds(total: i64) -> Self {
        let total = total.max(0);
        Self {
            hours: total / 3600,
            minutes: (total % 3600) / 60,
            seconds: total % 60,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.hours == 0 && self.minutes == 0 && self.seconds == 0
    }
}

impl fmt::Display for Countdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}:{:02}", self.hours, self.minutes, self.seconds)
    }
}

pub fn time_until_next_reset<Tz: TimeZone>(now: &DateTime<Tz>) -> Countdown {
    let tz = now.timezone();
    let Some(midnight) = now
        .date_naive()
        .succ_opt()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
    else {
        return Countdown::default();
    };
    // Zones that skip midnight for DST start the day at 01:00.
    let next = tz
        .from_local_datetime(&midnight)
        .earliest()
        .or_else(|| tz.from_local_datetime(&(midnight + Duration::hours(1))).earliest());
    match next {
        Some(next) => {
            Countdown::from_seconds(next.signed_duration_since(now.clone()).num_seconds())
        }
        None => Countdown::default(),
    }
}

/// A quota unit charged before a send, owed back if the send never lands.
#[must_use = "a reservation must be settled"]
#[derive(Debug, PartialEq, Eq)]
pub struct Reservation {
    day: String,
    count: u32,
}

impl Reservation {
    /// Day the attempt was charged to.
    pub fn day(&self) -> &str {
        &self.day
    }

    /// Stored count right after the charge.
    pub fn count(&self) -> u32 {
        self.count
    }
}

/// Daily query quota backed by a key-value store.
///
/// Every operation re-reads the stored record; nothing is cached between calls.
pub struct DailyQuota {
    store: Box<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    daily_max: u32,
}

impl DailyQuota {
    pub fn new(store: Box<dyn KeyValueStore>, clock: Arc<dyn Clock>, daily_max: u32) -> Self {
        Self {
            store,
            clock,
            daily_max,
        }
    }

    pub fn today(&self) -> String {
        format_day(&self.clock.now())
    }

    /// Stored record, or a fresh one for today when absent or unreadable.
    pub fn load(&self) -> QuotaRecord {
        let raw = match self.store.get(STORAGE_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return QuotaRecord::fresh(self.today()),
            Err(e) => {
                warn!("Could not read quota record: {}", e);
                return QuotaRecord::fresh(self.today());
            }
        };
        match serde_json::from_str(&raw) {
            Ok(rec) => rec,
            Err(e) => {
                warn!("Discarding malformed quota record: {}", e);
                QuotaRecord::fresh(self.today())
            }
        }
    }

    fn save(&mut self, rec: &QuotaRecord) -> Result<(), StorageError> {
        let raw = serde_json::to_string(rec)?;
        self.store.set(STORAGE_KEY, &raw)
    }

    /// Applies the daily reset if the stored day is stale, then reports whether
    /// another query is allowed.
    pub fn check_quota(&mut self) -> Result<bool, StorageError> {
        let mut rec = self.load();
        let today = self.today();
        if rec.last_reset_date != today {
            info!(
                "Resetting daily quota (was {} on {})",
                rec.query_count, rec.last_reset_date
            );
            rec = QuotaRecord::fresh(today);
            self.save(&rec)?;
        }
        Ok(rec.query_count < self.daily_max)
    }

    pub fn record_attempt(&mut self) -> Result<QuotaRecord, StorageError> {
        let mut rec = self.load();
        rec.query_count = rec.query_count.saturating_add(1);
        self.save(&rec)?;
        debug!("Quota charged: {}/{}", rec.query_count, self.daily_max);
        Ok(rec)
    }

    pub fn rollback_attempt(&mut self) -> Result<QuotaRecord, StorageError> {
        let mut rec = self.load();
        rec.query_count = rec.query_count.saturating_sub(1);
        self.save(&rec)?;
        debug!("Quota released: {}/{}", rec.query_count, self.daily_max);
        Ok(rec)
    }

    /// Read-only view for display; a stale day reads as unused without being rewritten.
    pub fn status(&self) -> QuotaStatus {
        let rec = self.load();
        let used = if rec.last_reset_date == self.today() {
            rec.query_count
        } else {
            0
        };
        QuotaStatus {
            used,
            limit: self.daily_max,
            remaining: self.daily_max.saturating_sub(used),
        }
    }

    /// First phase: check the quota and charge one attempt.
    pub fn reserve(&mut self) -> Result<Reservation, ChatError> {
        if !self.check_quota()? {
            return Err(ChatError::QuotaExceeded {
                limit: self.daily_max,
            });
        }
        let rec = self.record_attempt()?;
        Ok(Reservation {
            day: rec.last_reset_date,
            count: rec.query_count,
        })
    }

    /// Second phase: keep the charge if the message was delivered, otherwise
    /// give it back. A reservation taken before a daily reset stays charged to
    /// its own day, so releasing it leaves the new day's count alone.
    pub fn settle(
        &mut self,
        reservation: Reservation,
        delivered: bool,
    ) -> Result<(), StorageError> {
        if delivered {
            return Ok(());
        }
        let rec = self.load();
        if rec.last_reset_date != reservation.day {
            info!(
                "Not releasing attempt charged to {}; quota already reset to {}",
                reservation.day, rec.last_reset_date
            );
            return Ok(());
        }
        self.rollback_attempt()?;
        Ok(())
    }

    pub fn time_until_next_reset(&self) -> Countdown {
        time_until_next_reset(&self.clock.now())
    }
}
