//! Keyword extraction for the non-semantic fallback path.

use std::collections::HashSet;
use std::sync::LazyLock;

static STOPWORDS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "a", "about", "all", "also", "am", "an", "and", "any", "are", "as", "at", "be", "been",
        "but", "by", "can", "could", "did", "do", "does", "for", "from", "get", "got", "had",
        "has", "have", "her", "here", "him", "his", "how", "i", "if", "in", "into", "is", "it",
        "its", "just", "know", "let", "me", "mine", "my", "of", "on", "or", "our", "please",
        "remember", "say", "said", "she", "should", "so", "tell", "that", "the", "their", "them",
        "then", "there", "these", "they", "this", "those", "to", "told", "us", "was", "we",
        "were", "what", "whats", "when", "where", "wheres", "which", "who", "why", "will", "with",
        "would", "you", "your",
    ]
    .into_iter()
    .collect()
});

/// Meaningful lowercase keywords in `text`, deduplicated in first-seen order.
///
/// Drops stopwords and tokens of two characters or fewer, and trims a
/// trailing plural `s` from tokens longer than three characters.
pub fn extract_keywords(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    text.split(|c: char| !c.is_alphanumeric())
        .map(|t| t.to_lowercase())
        .filter(|t| t.chars().count() > 2 && !STOPWORDS.contains(t.as_str()))
        .map(|t| {
            if t.chars().count() > 3 && t.ends_with('s') && !t.ends_with("ss") {
                t[..t.len() - 1].to_string()
            } else {
                t
            }
        })
        .filter(|t| seen.insert(t.clone()))
        .collect()
}
