//! Keyword heuristics for routing an utterance when no classifier is available.

use serde::{Deserialize, Serialize};

use super::cancel::{parse_cancel_target, CancelTarget};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Save,
    Search,
    Reminder,
    CancelAll,
    CancelSpecific,
    Unclear,
}

const CANCEL_WORDS: &[&str] = &[
    "cancel", "stop", "delete", "remove", "clear", "turn off", "get rid of", "no more",
    "don't want", "don't need", "no longer need", "wipe", "erase", "kill", "disable",
];

const REMINDER_WORDS: &[&str] = &["remind", "alarm", "wake me"];

/// Openings that make an utterance a request for a new reminder, whatever
/// verbs follow ("remind me to clear the table").
const REMINDER_LEADS: &[&str] = &[
    "remind me", "wake me", "set a reminder", "set an alarm", "set a alarm", "add a reminder",
    "create a reminder", "make a reminder", "new reminder", "i need a reminder",
    "can you remind me", "could you remind me", "will you remind me",
];

const POLITE_OPENINGS: &[&str] = &["please ", "hey ", "ok ", "okay "];

const QUESTION_STARTS: &[&str] = &[
    "where", "what", "when", "who", "which", "how", "do you", "did i", "do i", "have i",
    "is there", "tell me", "find", "search", "recall", "show me", "look up",
];

const SAVE_STARTS: &[&str] = &[
    "remember", "note that", "note:", "save", "store", "keep in mind", "don't forget that",
    "i ", "i'", "my ", "the ", "our ",
];

fn contains_any(text: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| text.contains(n))
}

fn starts_with_any(text: &str, prefixes: &[&str]) -> bool {
    prefixes.iter().any(|p| text.starts_with(p))
}

/// Classify an utterance. Order matters: a reminder lead-in beats
/// everything, then cancel wording ("stop the water reminder"), then
/// reminder wording, then questions, then statements.
///
/// Cancel wording only counts when it governs the utterance: either the
/// cancel parser finds a target, or the utterance opens with a cancel verb
/// and is about reminders.
pub fn classify_intent(text: &str) -> Intent {
    let q = text.trim().to_lowercase();
    if q.is_empty() {
        return Intent::Unclear;
    }
    let opening = strip_openings(&q);

    if starts_with_any(opening, REMINDER_LEADS) {
        return Intent::Reminder;
    }

    match parse_cancel_target(&q) {
        CancelTarget::All => return Intent::CancelAll,
        CancelTarget::Topic(_) => return Intent::CancelSpecific,
        CancelTarget::NoMatch => {
            if starts_with_any(opening, CANCEL_WORDS) && contains_any(&q, REMINDER_WORDS) {
                return Intent::CancelSpecific;
            }
        }
    }

    let is_question = q.ends_with('?') || starts_with_any(&q, QUESTION_STARTS);
    if contains_any(&q, REMINDER_WORDS) && !starts_with_any(&q, &["what", "which", "show", "list"]) {
        return Intent::Reminder;
    }
    if !is_question && has_schedule_phrase(&q) {
        return Intent::Reminder;
    }

    if is_question {
        return Intent::Search;
    }
    if starts_with_any(&q, SAVE_STARTS) || q.split_whitespace().count() >= 3 {
        return Intent::Save;
    }
    Intent::Unclear
}

fn strip_openings(q: &str) -> &str {
    let mut rest = q;
    while let Some(p) = POLITE_OPENINGS.iter().find(|p| rest.starts_with(**p)) {
        rest = rest[p.len()..].trim_start();
    }
    rest
}

/// "every 2 hours" or "in 10 minutes" without reminder wording, e.g.
/// "drink water every hour".
fn has_schedule_phrase(q: &str) -> bool {
    let words: Vec<&str> = q.split_whitespace().collect();
    let is_number = |w: &str| !w.is_empty() && w.chars().all(|c| c.is_ascii_digit());
    words.windows(2).any(|w| {
        let numbered = matches!(w[0], "every" | "in" | "after") && is_number(w[1]);
        numbered || (w[0] == "every" && is_unit(w[1]))
    }) && words.iter().any(|w| is_unit(w))
}

fn is_unit(word: &str) -> bool {
    matches!(
        word.trim_end_matches(|c: char| !c.is_alphanumeric()),
        "second" | "seconds" | "sec" | "secs" | "minute" | "minutes" | "min" | "mins" | "hour"
            | "hours" | "hr" | "hrs"
    )
}

/// Strip "remember that" style lead-ins from content to be saved.
pub fn strip_save_prefix(text: &str) -> &str {
    let trimmed = text.trim();
    let lower = trimmed.to_lowercase();
    for prefix in [
        "please remember that ",
        "remember that ",
        "remember ",
        "note that ",
        "note: ",
        "save that ",
        "save ",
        "keep in mind that ",
        "don't forget that ",
    ] {
        if lower.starts_with(prefix) && trimmed.is_char_boundary(prefix.len()) {
            return trimmed[prefix.len()..].trim_start();
        }
    }
    trimmed
}
