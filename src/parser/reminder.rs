//! Regex extraction of reminder requests from free text.
//!
//! Three shapes are recognised, tried in this order:
//! - recurring: "... every 2 hours", "every hour"
//! - wall-clock one-time: "... at 5pm", "at 17:30"
//! - relative one-time: "... in 10 minutes", "after an hour"

use chrono::{DateTime, Duration, NaiveTime, Utc};
use chrono_tz::Tz;
use regex::{Captures, Regex};
use std::sync::LazyLock;

use crate::reminder::schedule::{next_occurrence, to_minutes, DurationUnit};
use crate::reminder::{NewReminder, ReminderKind};

const UNIT: &str = r"(seconds?|secs?|minutes?|mins?|hours?|hrs?)";

static RECURRING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)\bevery\s+(?:(\d+|an?|one)\s+)?{UNIT}\b")).unwrap()
});

static AT_TIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bat\s+(\d{1,2})(?::(\d{2}))?\s*(am|pm|o'?clock)?\b").unwrap()
});

/// Words that may follow a bare "at 5" when it is a time.
const AFTER_BARE_HOUR: &[&str] = &[
    "to", "and", "today", "tonight", "tomorrow", "please", "for", "on", "every", "in", "then",
    "so", "sharp",
];

static RELATIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)\b(?:in|after)\s+(\d+|an?|one)\s+{UNIT}\b")).unwrap()
});

static TASK_AFTER_TO: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bto\s+(.+)").unwrap());

static LEADING_FILLER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\s*(?:please\s+|can you\s+|could you\s+)?(?:remind me|set (?:a|an) (?:reminder|alarm)|create (?:a|an) (?:reminder|alarm)|i need (?:a|an) (?:reminder|alarm)|recurring reminder|repeat reminder|reminder|alarm)\b",
    )
    .unwrap()
});

static WAKE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^\s*wake me(?:\s+up)?\b").unwrap());

const REMINDER_WORDS: &[&str] = &["remind", "reminder", "alarm", "wake me"];

/// A reminder extracted from text, ready to hand to the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct ReminderRequest {
    pub kind: ReminderKind,
    pub message: String,
    pub interval_minutes: Option<u32>,
    pub scheduled_time: Option<DateTime<Utc>>,
    pub is_duration_based: bool,
}

impl ReminderRequest {
    pub fn into_new_reminder(self, owner_id: &str) -> NewReminder {
        NewReminder {
            owner_id: owner_id.to_string(),
            message: self.message,
            kind: self.kind,
            interval_minutes: self.interval_minutes,
            scheduled_time: self.scheduled_time,
            is_duration_based: self.is_duration_based,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReminderParse {
    Parsed(ReminderRequest),
    /// No time phrase and no reminder wording.
    NotAReminder,
    /// Reminder wording, but the time could not be understood.
    Malformed(String),
}

/// Parse a reminder request. Wall-clock times resolve to their next future
/// occurrence in `tz` relative to `now`.
pub fn parse_reminder(text: &str, now: DateTime<Utc>, tz: Tz) -> ReminderParse {
    let text = normalize_meridiem(text);

    if let Some(caps) = RECURRING.captures(&text) {
        let amount = match amount(caps.get(1).map(|m| m.as_str())) {
            Ok(n) => n,
            Err(reason) => return ReminderParse::Malformed(reason),
        };
        let minutes = to_minutes(amount, unit(&caps[2]));
        return ReminderParse::Parsed(ReminderRequest {
            kind: ReminderKind::Recurring,
            message: task(&text, &caps),
            interval_minutes: Some(minutes),
            scheduled_time: None,
            is_duration_based: false,
        });
    }

    if let Some(caps) = wall_clock(&text) {
        let time = match wall_time(&caps) {
            Ok(t) => t,
            Err(reason) => return ReminderParse::Malformed(reason),
        };
        return ReminderParse::Parsed(ReminderRequest {
            kind: ReminderKind::OneTime,
            message: task(&text, &caps),
            interval_minutes: None,
            scheduled_time: Some(next_occurrence(time, now, tz)),
            is_duration_based: false,
        });
    }

    if let Some(caps) = RELATIVE.captures(&text) {
        let amount = match amount(caps.get(1).map(|m| m.as_str())) {
            Ok(n) => n,
            Err(reason) => return ReminderParse::Malformed(reason),
        };
        let minutes = to_minutes(amount, unit(&caps[2]));
        return ReminderParse::Parsed(ReminderRequest {
            kind: ReminderKind::OneTime,
            message: task(&text, &caps),
            interval_minutes: Some(minutes),
            scheduled_time: Some(now + Duration::minutes(minutes as i64)),
            is_duration_based: true,
        });
    }

    let lower = text.to_lowercase();
    if REMINDER_WORDS.iter().any(|w| lower.contains(w)) {
        ReminderParse::Malformed("couldn't understand the time".into())
    } else {
        ReminderParse::NotAReminder
    }
}

/// The first "at ..." clause that reads as a time. A bare hour ("at 3")
/// only counts at the end of a clause or before a connective, so "look at 3
/// photos" is not a time.
fn wall_clock(text: &str) -> Option<Captures<'_>> {
    AT_TIME.captures_iter(text).find(|caps| {
        if caps.get(2).is_some() || caps.get(3).is_some() {
            return true;
        }
        let end = caps.get(0).map_or(text.len(), |m| m.end());
        let rest = &text[end..];
        if rest.trim_start().is_empty() || rest.starts_with([',', '.', '!', '?', ';']) {
            return true;
        }
        rest.split_whitespace()
            .next()
            .is_some_and(|w| AFTER_BARE_HOUR.contains(&w.to_lowercase().as_str()))
    })
}

fn normalize_meridiem(text: &str) -> String {
    text.replace("a.m.", "am")
        .replace("p.m.", "pm")
        .replace("A.M.", "am")
        .replace("P.M.", "pm")
}

fn amount(raw: Option<&str>) -> Result<u32, String> {
    match raw.map(str::to_lowercase).as_deref() {
        None | Some("a") | Some("an") | Some("one") => Ok(1),
        Some(digits) => match digits.parse::<u32>() {
            Ok(0) => Err("the time must be more than zero".into()),
            Ok(n) => Ok(n),
            Err(_) => Err(format!("{digits} is not a usable number")),
        },
    }
}

fn unit(raw: &str) -> DurationUnit {
    let raw = raw.to_lowercase();
    if raw.starts_with('s') {
        DurationUnit::Seconds
    } else if raw.starts_with('h') {
        DurationUnit::Hours
    } else {
        DurationUnit::Minutes
    }
}

fn wall_time(caps: &Captures<'_>) -> Result<NaiveTime, String> {
    let hour: u32 = caps[1].parse().map_err(|_| "invalid hour".to_string())?;
    let minute: u32 = match caps.get(2) {
        Some(m) => m.as_str().parse().map_err(|_| "invalid minute".to_string())?,
        None => 0,
    };
    let meridiem = caps
        .get(3)
        .map(|m| m.as_str().to_lowercase())
        .filter(|m| m == "am" || m == "pm");
    let hour = match meridiem.as_deref() {
        Some(meridiem) => {
            if !(1..=12).contains(&hour) {
                return Err(format!("{hour}{meridiem} is not a valid time"));
            }
            match (meridiem, hour) {
                ("am", 12) => 0,
                ("pm", 12) => 12,
                ("pm", h) => h + 12,
                (_, h) => h,
            }
        }
        None => hour,
    };
    NaiveTime::from_hms_opt(hour, minute, 0).ok_or_else(|| "that is not a valid time".to_string())
}

/// The task phrase: the text with the time clause removed, taken from after
/// the first "to" when present, otherwise with reminder wording stripped.
fn task(text: &str, time_clause: &Captures<'_>) -> String {
    let whole = time_clause.get(0).map_or(0..0, |m| m.range());
    let rest = format!("{} {}", &text[..whole.start], &text[whole.end..]);

    let phrase = if let Some(caps) = TASK_AFTER_TO.captures(&rest) {
        caps[1].to_string()
    } else if WAKE.is_match(&rest) {
        let remainder = WAKE.replace(&rest, "").to_string();
        if clean(&remainder).is_empty() {
            "wake up".to_string()
        } else {
            remainder
        }
    } else {
        LEADING_FILLER.replace(&rest, "").to_string()
    };

    let cleaned = clean(&phrase);
    if cleaned.is_empty() {
        "Reminder".to_string()
    } else {
        capitalize(&cleaned)
    }
}

fn clean(phrase: &str) -> String {
    let mut s = phrase.split_whitespace().collect::<Vec<_>>().join(" ");
    loop {
        let trimmed = s
            .trim_matches(|c: char| c.is_whitespace() || ".,!?;:".contains(c))
            .to_string();
        match strip_trailing_word(&trimmed, &["reminder", "please"]) {
            Some(shorter) => s = shorter.to_string(),
            None => return trimmed,
        }
    }
}

/// `s` without a trailing whole word from `words` (ASCII case-insensitive).
fn strip_trailing_word<'a>(s: &'a str, words: &[&str]) -> Option<&'a str> {
    words.iter().find_map(|w| {
        let cut = s.len().checked_sub(w.len())?;
        if !s.is_char_boundary(cut) || !s[cut..].eq_ignore_ascii_case(w) {
            return None;
        }
        let head = &s[..cut];
        (head.is_empty() || head.ends_with(' ')).then_some(head)
    })
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 14, 9, 0, 0).unwrap()
    }

    fn parsed(text: &str) -> ReminderRequest {
        match parse_reminder(text, now(), Tz::UTC) {
            ReminderParse::Parsed(r) => r,
            other => panic!("{text:?} did not parse: {other:?}"),
        }
    }

    #[test]
    fn recurring_every_n_hours() {
        let r = parsed("remind me to stretch every 2 hours");
        assert_eq!(r.kind, ReminderKind::Recurring);
        assert_eq!(r.message, "Stretch");
        assert_eq!(r.interval_minutes, Some(120));
        assert!(!r.is_duration_based);
    }

    #[test]
    fn recurring_without_number() {
        let r = parsed("Drink water every hour");
        assert_eq!(r.message, "Drink water");
        assert_eq!(r.interval_minutes, Some(60));
    }

    #[test]
    fn recurring_time_first() {
        let r = parsed("Remind me every 30 mins to check the oven");
        assert_eq!(r.message, "Check the oven");
        assert_eq!(r.interval_minutes, Some(30));
    }

    #[test]
    fn recurring_with_reminder_suffix() {
        let r = parsed("water plants reminder every 45 minutes");
        assert_eq!(r.message, "Water plants");
    }

    #[test]
    fn static_time_pm() {
        let r = parsed("Remind me to call mom at 5pm");
        assert_eq!(r.kind, ReminderKind::OneTime);
        assert_eq!(r.message, "Call mom");
        assert_eq!(r.scheduled_time, Some(Utc.with_ymd_and_hms(2026, 2, 14, 17, 0, 0).unwrap()));
        assert_eq!(r.interval_minutes, None);
    }

    #[test]
    fn static_time_rolls_to_tomorrow() {
        let r = parsed("remind me at 8:15 a.m. to take vitamins");
        assert_eq!(r.message, "Take vitamins");
        assert_eq!(r.scheduled_time, Some(Utc.with_ymd_and_hms(2026, 2, 15, 8, 15, 0).unwrap()));
    }

    #[test]
    fn static_time_twelve_am_and_pm() {
        let midnight = parsed("remind me to sleep at 12am");
        assert_eq!(midnight.scheduled_time, Some(Utc.with_ymd_and_hms(2026, 2, 15, 0, 0, 0).unwrap()));
        let noon = parsed("remind me to eat lunch at 12pm");
        assert_eq!(noon.scheduled_time, Some(Utc.with_ymd_and_hms(2026, 2, 14, 12, 0, 0).unwrap()));
    }

    #[test]
    fn static_time_in_local_zone() {
        let r = match parse_reminder("remind me to call dad at 6pm", now(), chrono_tz::Asia::Kolkata) {
            ReminderParse::Parsed(r) => r,
            other => panic!("{other:?}"),
        };
        // 18:00 IST = 12:30 UTC
        assert_eq!(r.scheduled_time, Some(Utc.with_ymd_and_hms(2026, 2, 14, 12, 30, 0).unwrap()));
    }

    #[test]
    fn bare_number_after_at_is_not_always_a_time() {
        let r = parsed("remind me to look at 3 photos in 10 minutes");
        assert_eq!(r.kind, ReminderKind::OneTime);
        assert!(r.is_duration_based);
        assert_eq!(r.scheduled_time, Some(now() + Duration::minutes(10)));
        assert_eq!(r.message, "Look at 3 photos");

        let r = parsed("remind me at 7 to stretch");
        assert_eq!(r.message, "Stretch");
        assert_eq!(r.scheduled_time, Some(Utc.with_ymd_and_hms(2026, 2, 15, 7, 0, 0).unwrap()));

        let r = parsed("remind me to call mom at 5 o'clock");
        assert_eq!(r.message, "Call mom");
        assert_eq!(r.scheduled_time, Some(Utc.with_ymd_and_hms(2026, 2, 15, 5, 0, 0).unwrap()));

        let r = parsed("remind me to look at 2 forms at 5pm");
        assert_eq!(r.message, "Look at 2 forms");
        assert_eq!(r.scheduled_time, Some(Utc.with_ymd_and_hms(2026, 2, 14, 17, 0, 0).unwrap()));
    }

    #[test]
    fn wake_me_up() {
        let r = parsed("Wake me up at 7am");
        assert_eq!(r.message, "Wake up");
    }

    #[test]
    fn duration_minutes() {
        let r = parsed("remind me to check the laundry in 10 minutes");
        assert_eq!(r.kind, ReminderKind::OneTime);
        assert_eq!(r.message, "Check the laundry");
        assert_eq!(r.interval_minutes, Some(10));
        assert_eq!(r.scheduled_time, Some(now() + Duration::minutes(10)));
        assert!(r.is_duration_based);
    }

    #[test]
    fn duration_seconds_round_up() {
        let r = parsed("remind me in 90 seconds to flip the pancake");
        assert_eq!(r.interval_minutes, Some(2));
        let r = parsed("remind me in 20 secs to breathe");
        assert_eq!(r.interval_minutes, Some(1));
    }

    #[test]
    fn duration_an_hour() {
        let r = parsed("take the cake out after an hour");
        assert_eq!(r.message, "Take the cake out");
        assert_eq!(r.interval_minutes, Some(60));
    }

    #[test]
    fn task_keeps_inner_to() {
        let r = parsed("remind me to go to the store at 5pm");
        assert_eq!(r.message, "Go to the store");
    }

    #[test]
    fn missing_task_defaults() {
        let r = parsed("set a reminder in 5 minutes");
        assert_eq!(r.message, "Reminder");
    }

    #[test]
    fn reminder_without_time_is_malformed() {
        assert!(matches!(
            parse_reminder("remind me to call the bank tomorrow", now(), Tz::UTC),
            ReminderParse::Malformed(_)
        ));
    }

    #[test]
    fn invalid_clock_time_is_malformed() {
        assert!(matches!(
            parse_reminder("remind me to run at 13pm", now(), Tz::UTC),
            ReminderParse::Malformed(_)
        ));
        assert!(matches!(
            parse_reminder("remind me every 0 minutes to blink", now(), Tz::UTC),
            ReminderParse::Malformed(_)
        ));
    }

    #[test]
    fn plain_statement_is_not_a_reminder() {
        assert_eq!(
            parse_reminder("I parked in lot B5", now(), Tz::UTC),
            ReminderParse::NotAReminder
        );
    }
}
