//! Reminder entity and its derived alarm id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderKind {
    OneTime,
    Recurring,
}

impl ReminderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OneTime => "one_time",
            Self::Recurring => "recurring",
        }
    }
}

impl std::fmt::Display for ReminderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ReminderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "one_time" => Ok(Self::OneTime),
            "recurring" => Ok(Self::Recurring),
            _ => Err(format!("unknown reminder kind: {s}")),
        }
    }
}

/// A persisted reminder.
///
/// `next_trigger` is always set; while `is_active` is true an alarm is
/// expected to exist for it. Retired one-time reminders are kept (inactive)
/// so they can still be promoted to recurring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reminder {
    pub id: String,
    pub owner_id: String,
    pub message: String,
    pub kind: ReminderKind,
    /// Set for recurring reminders, and for duration-based one-time reminders
    /// (the offset they were created with).
    pub interval_minutes: Option<u32>,
    /// Requested wall-clock time of a static one-time reminder.
    pub scheduled_time: Option<DateTime<Utc>>,
    pub next_trigger: DateTime<Utc>,
    pub is_active: bool,
    pub is_duration_based: bool,
    pub created_at: DateTime<Utc>,
    pub triggered_at: Option<DateTime<Utc>>,
}

impl Reminder {
    pub fn alarm_id(&self) -> u32 {
        alarm_id(&self.id)
    }
}

/// Input to [`super::engine::ReminderEngine::create`].
#[derive(Debug, Clone, PartialEq)]
pub struct NewReminder {
    pub owner_id: String,
    pub message: String,
    pub kind: ReminderKind,
    pub interval_minutes: Option<u32>,
    pub scheduled_time: Option<DateTime<Utc>>,
    pub is_duration_based: bool,
}

impl NewReminder {
    pub fn recurring(owner_id: &str, message: &str, interval_minutes: u32) -> Self {
        Self {
            owner_id: owner_id.into(),
            message: message.into(),
            kind: ReminderKind::Recurring,
            interval_minutes: Some(interval_minutes),
            scheduled_time: None,
            is_duration_based: false,
        }
    }

    /// One-time reminder at an absolute wall-clock time ("at 5pm").
    pub fn at(owner_id: &str, message: &str, scheduled_time: DateTime<Utc>) -> Self {
        Self {
            owner_id: owner_id.into(),
            message: message.into(),
            kind: ReminderKind::OneTime,
            interval_minutes: None,
            scheduled_time: Some(scheduled_time),
            is_duration_based: false,
        }
    }

    /// One-time reminder `minutes` from now ("in 10 minutes").
    pub fn after(owner_id: &str, message: &str, minutes: u32) -> Self {
        Self {
            owner_id: owner_id.into(),
            message: message.into(),
            kind: ReminderKind::OneTime,
            interval_minutes: Some(minutes),
            scheduled_time: None,
            is_duration_based: true,
        }
    }
}

/// A persisted reminder row that could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorruptReminder {
    pub id: String,
    pub reason: String,
}

/// Deterministic alarm id for a reminder id: 32-bit FNV-1a masked to 31 bits,
/// so it fits platform APIs that take a positive `i32`.
///
/// Distinct reminder ids can collide. Nothing here detects that; two colliding
/// reminders would overwrite each other's alarm. A dedicated allocated id per
/// reminder would remove the risk.
pub fn alarm_id(reminder_id: &str) -> u32 {
    const OFFSET: u32 = 0x811c_9dc5;
    const PRIME: u32 = 0x0100_0193;
    let hash = reminder_id
        .bytes()
        .fold(OFFSET, |h, b| (h ^ b as u32).wrapping_mul(PRIME));
    hash & 0x7fff_ffff
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alarm_id_is_stable_and_positive() {
        let a = alarm_id("0192f0aa-1111-7000-8000-000000000001");
        assert_eq!(a, alarm_id("0192f0aa-1111-7000-8000-000000000001"));
        assert!(a <= i32::MAX as u32);
        assert_ne!(a, alarm_id("0192f0aa-1111-7000-8000-000000000002"));
    }

    #[test]
    fn fnv1a_reference_value() {
        // FNV-1a("a") = 0xe40c292c
        assert_eq!(alarm_id("a"), 0xe40c_292c & 0x7fff_ffff);
    }

    #[test]
    fn kind_round_trips_through_str() {
        for kind in [ReminderKind::OneTime, ReminderKind::Recurring] {
            assert_eq!(kind.as_str().parse::<ReminderKind>().unwrap(), kind);
        }
        assert!("weekly".parse::<ReminderKind>().is_err());
    }
}
