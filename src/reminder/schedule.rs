//! Trigger-time arithmetic. All results are absolute UTC instants; wall-clock
//! phrases are resolved in the caller's timezone.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurationUnit {
    Seconds,
    Minutes,
    Hours,
}

/// Convert an amount to whole minutes. Hours are ×60; seconds round up, and
/// any positive duration is at least one minute.
pub fn to_minutes(amount: u32, unit: DurationUnit) -> u32 {
    match unit {
        DurationUnit::Seconds => amount.div_ceil(60).max(1),
        DurationUnit::Minutes => amount,
        DurationUnit::Hours => amount.saturating_mul(60),
    }
}

/// The next instant strictly after `now` at which the wall clock in `tz`
/// reads `time`. Rolls to tomorrow if that time has already passed today.
///
/// A time skipped by a DST jump resolves to the same wall time one hour
/// later; an ambiguous time resolves to its earlier instant.
pub fn next_occurrence(time: NaiveTime, now: DateTime<Utc>, tz: Tz) -> DateTime<Utc> {
    let today = now.with_timezone(&tz).date_naive();
    let candidate = resolve_local(today, time, tz);
    if candidate > now {
        return candidate;
    }
    let tomorrow = today.succ_opt().unwrap_or(today);
    resolve_local(tomorrow, time, tz)
}

fn resolve_local(date: NaiveDate, time: NaiveTime, tz: Tz) -> DateTime<Utc> {
    let naive = date.and_time(time);
    tz.from_local_datetime(&naive)
        .earliest()
        .or_else(|| tz.from_local_datetime(&(naive + Duration::hours(1))).earliest())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&naive))
}

/// Advance `previous` by whole `interval_minutes` steps until it is strictly
/// after `now`. Always advances at least one step.
pub fn advance_past(
    previous: DateTime<Utc>,
    interval_minutes: u32,
    now: DateTime<Utc>,
) -> DateTime<Utc> {
    let step = Duration::minutes(interval_minutes.max(1) as i64);
    let mut next = previous + step;
    if next <= now {
        let behind = (now - next).num_seconds();
        let steps = behind / step.num_seconds() + 1;
        next += step * steps as i32;
    }
    next
}
