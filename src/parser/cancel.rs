//! Which reminder(s) a cancel request refers to.

use regex::Regex;
use std::sync::LazyLock;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelTarget {
    /// Every active reminder of the owner.
    All,
    /// Reminders whose message contains this topic.
    Topic(String),
    /// No reminder-shaped phrase; ask the user to clarify.
    NoMatch,
}

const VERBS: &str = r"(?:cancel|stop|remove|delete|clear|disable|end|kill|turn\s+off|get\s+rid\s+of)";

/// "cancel the reminder to call mom", "remove my reminder about the dentist"
static REMINDER_TO: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)\b{VERBS}\s+(?:my\s+|the\s+|that\s+)?reminders?\s+(?:to|about|for)\s+(.+)"
    ))
    .unwrap()
});

/// "stop reminding me to drink water"
static STOP_REMINDING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:stop|quit|don't|do\s+not)\s+reminding\s+me\s+(?:to|about)\s+(.+)").unwrap()
});

/// "stop the water reminder", "turn off my meds reminder"
static TOPIC_REMINDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)\b{VERBS}\s+(?:my\s+|the\s+|that\s+|this\s+)?(.+?)\s+(?:reminders?|alarms?)\b"
    ))
    .unwrap()
});

/// "I don't need the gym reminder anymore", "no more water reminder"
static NEGATED_REMINDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:no\s+more|no\s+need\s+for|(?:don't|do\s+not|no\s+longer)\s+(?:want|need))\s+(?:my\s+|the\s+|that\s+)?(.+?)\s+reminders?\b",
    )
    .unwrap()
});

/// "all my reminders", "every reminder", "all of the alarms"
static ALL_REMINDERS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:all|every|each)\s+(?:of\s+)?(?:my\s+|the\s+|your\s+|these\s+|those\s+)?(?:reminders?|alarms?)\b")
        .unwrap()
});

/// "clear everything", "please cancel them all"
static VERB_EVERYTHING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)^\s*(?:please\s+)?{VERBS}\s+(?:everything|them\s+all|all(?:\s+of\s+them)?)\s*(?:please)?[.!]*\s*$"
    ))
    .unwrap()
});

/// A trailing schedule clause, which is not part of the reminder's message.
static SCHEDULE_TAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\s+(?:(?:every|each)\s+\S.*|(?:at|in|after)\s+(?:\d|an?\s|one\s).*|daily|hourly|today|tonight|tomorrow)$",
    )
    .unwrap()
});

const FILLER: &[&str] = &["my", "the", "that", "this", "a", "an", "all", "every", "any", "your"];

/// Work out what a cancel request targets.
pub fn parse_cancel_target(text: &str) -> CancelTarget {
    if ALL_REMINDERS.is_match(text) || VERB_EVERYTHING.is_match(text) {
        return CancelTarget::All;
    }

    for pattern in [&REMINDER_TO, &STOP_REMINDING, &NEGATED_REMINDER, &TOPIC_REMINDER] {
        if let Some(topic) = pattern
            .captures(text)
            .and_then(|c| c.get(1))
            .and_then(|m| clean_topic(m.as_str()))
        {
            return CancelTarget::Topic(topic);
        }
    }

    // "reminders: cancel them all" style, with no topic to pick out
    let lower = text.to_lowercase();
    let says_all = lower
        .split(|c: char| !c.is_alphanumeric())
        .any(|w| w == "all");
    if says_all && (lower.contains("reminder") || lower.contains("alarm")) {
        return CancelTarget::All;
    }

    CancelTarget::NoMatch
}

fn clean_topic(raw: &str) -> Option<String> {
    let raw = SCHEDULE_TAIL.replace(raw.trim_end_matches(['.', '!', '?']), "");
    let mut words: Vec<&str> = raw
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| ".,!?;:\"".contains(c)))
        .filter(|w| !w.is_empty())
        .collect();
    while words
        .first()
        .is_some_and(|w| FILLER.contains(&w.to_lowercase().as_str()))
    {
        words.remove(0);
    }
    while words
        .last()
        .is_some_and(|w| matches!(w.to_lowercase().as_str(), "please" | "anymore" | "now"))
    {
        words.pop();
    }
    let topic = words.join(" ");
    (!topic.is_empty()).then_some(topic)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topic(t: &str) -> CancelTarget {
        CancelTarget::Topic(t.to_string())
    }

    #[test]
    fn cancel_all_variants() {
        assert_eq!(parse_cancel_target("cancel all my reminders"), CancelTarget::All);
        assert_eq!(parse_cancel_target("Delete every reminder"), CancelTarget::All);
        assert_eq!(parse_cancel_target("please clear everything"), CancelTarget::All);
        assert_eq!(parse_cancel_target("turn off all alarms"), CancelTarget::All);
    }

    #[test]
    fn topic_reminder() {
        assert_eq!(parse_cancel_target("stop the water reminder"), topic("water"));
        assert_eq!(parse_cancel_target("turn off my meds reminder"), topic("meds"));
        assert_eq!(parse_cancel_target("Remove gym reminder."), topic("gym"));
        assert_eq!(parse_cancel_target("cancel the drink water reminders"), topic("drink water"));
    }

    #[test]
    fn reminder_to_task() {
        assert_eq!(
            parse_cancel_target("cancel the reminder to call mom"),
            topic("call mom")
        );
        assert_eq!(
            parse_cancel_target("delete my reminder about the dentist"),
            topic("dentist")
        );
    }

    #[test]
    fn stop_reminding_me() {
        assert_eq!(
            parse_cancel_target("stop reminding me to stretch"),
            topic("stretch")
        );
    }

    #[test]
    fn negated_phrasing() {
        assert_eq!(
            parse_cancel_target("I don't need the gym reminder anymore"),
            topic("gym")
        );
        assert_eq!(parse_cancel_target("no more water reminder"), topic("water"));
    }

    #[test]
    fn every_in_a_schedule_is_not_cancel_all() {
        assert_eq!(
            parse_cancel_target("stop reminding me to drink water every hour"),
            topic("drink water")
        );
        assert_eq!(
            parse_cancel_target("cancel the reminder to water plants every day"),
            topic("water plants")
        );
        assert_eq!(
            parse_cancel_target("stop reminding me to water all the plants"),
            topic("water all the plants")
        );
        assert_eq!(
            parse_cancel_target("remind me to clear all the dishes in 20 minutes"),
            CancelTarget::NoMatch
        );
    }

    #[test]
    fn no_reminder_shape() {
        assert_eq!(parse_cancel_target("cancel"), CancelTarget::NoMatch);
        assert_eq!(parse_cancel_target("stop the reminder"), CancelTarget::NoMatch);
        assert_eq!(parse_cancel_target("where is my car"), CancelTarget::NoMatch);
    }
}
