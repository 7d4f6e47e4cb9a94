//! Decides whether a follow-up question needs prior conversation attached,
//! and serializes recent turns into a bounded text blob. A cheap client-side
//! signal, not intent detection: missed follow-ups are an accepted cost of
//! not shipping the full history on every turn.

use crate::guard::MAX_CONTEXT_CHARS;
use crate::models::Message;

pub const HISTORY_MESSAGE_LIMIT: usize = 6;

const SHORT_QUESTION_CHARS: usize = 12;
const ANAPHOR_SCAN_CHARS: usize = 50;

const CONTINUATION_STARTERS: [&str; 5] = ["what about", "how about", "and", "what else", "same"];

const ANAPHORS: [&str; 9] = [
    "it", "they", "them", "that", "those", "this", "these", "there", "again",
];

pub fn should_attach_history(question: &str) -> bool {
    let trimmed = question.trim();
    if trimmed.is_empty() {
        return false;
    }

    let length = trimmed.chars().count();
    if length <= SHORT_QUESTION_CHARS {
        return true;
    }

    let lower = trimmed.to_ascii_lowercase();
    if CONTINUATION_STARTERS
        .iter()
        .any(|starter| starts_with_phrase(&lower, starter))
    {
        return true;
    }

    length <= ANAPHOR_SCAN_CHARS && contains_anaphor(&lower)
}

/// Renders the most recent turns as `"User: ..."` / `"Assistant: ..."` lines.
/// Returns `None` when there is no prior conversation or the question does
/// not look like a follow-up.
pub fn build_history(messages: &[Message], question: &str) -> Option<String> {
    if messages.is_empty() || !should_attach_history(question) {
        return None;
    }

    let start = messages.len().saturating_sub(HISTORY_MESSAGE_LIMIT);
    let rendered = messages[start..]
        .iter()
        .map(|message| format!("{}: {}", message.role.label(), message.content))
        .collect::<Vec<_>>()
        .join("\n");

    Some(tail_chars(&rendered, MAX_CONTEXT_CHARS))
}

fn starts_with_phrase(lower: &str, phrase: &str) -> bool {
    if !lower.starts_with(phrase) {
        return false;
    }
    match lower[phrase.len()..].chars().next() {
        None => true,
        Some(next) => !next.is_alphanumeric(),
    }
}

fn contains_anaphor(lower: &str) -> bool {
    lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .any(|word| ANAPHORS.contains(&word))
}

/// Keeps the trailing `limit` characters, truncating from the front so the
/// most recent content survives.
fn tail_chars(text: &str, limit: usize) -> String {
    let count = text.chars().count();
    if count <= limit {
        return text.to_string();
    }
    text.chars().skip(count - limit).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    fn message(role: Role, content: &str) -> Message {
        Message::new(role, content, None)
    }

    #[test]
    fn short_questions_attach_history() {
        assert!(should_attach_history("And T2?"));
        assert!(should_attach_history("where is it"));
    }

    #[test]
    fn continuation_starter_attaches_history() {
        assert!(should_attach_history("What about the swim start?"));
        assert!(should_attach_history("How about relay teams then?"));
        assert!(should_attach_history("Same for the Sunday race briefing?"));
    }

    #[test]
    fn starter_must_be_word_bounded() {
        // "android" starts with "and" but is not a continuation.
        assert!(!should_attach_history("Android app users need the briefing?"));
    }

    #[test]
    fn anaphor_in_short_question_attaches_history() {
        assert!(should_attach_history("When do they open the racks?"));
    }

    #[test]
    fn plain_question_does_not_attach_history() {
        assert!(!should_attach_history("What time does the race start?"));
    }

    #[test]
    fn anaphor_beyond_scan_window_does_not_attach() {
        let question = "Could you please explain whether it would be possible to collect my bike?";
        assert!(question.chars().count() > 50);
        assert!(!should_attach_history(question));
    }

    #[test]
    fn no_prior_messages_yields_nothing() {
        assert_eq!(build_history(&[], "And T2?"), None);
    }

    #[test]
    fn non_follow_up_yields_nothing() {
        let messages = vec![message(Role::User, "What time does the race start?")];
        assert_eq!(build_history(&messages, "What are the bike course cut off times?"), None);
    }

    #[test]
    fn uses_exactly_the_last_six_messages_oldest_first() {
        let messages: Vec<Message> = (1..=7)
            .map(|n| {
                let role = if n % 2 == 1 { Role::User } else { Role::Assistant };
                message(role, &format!("turn {n}"))
            })
            .collect();

        let rendered = build_history(&messages, "And T2?").expect("history expected");
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines.len(), 6);
        assert_eq!(lines[0], "Assistant: turn 2");
        assert_eq!(lines[5], "User: turn 7");
    }

    #[test]
    fn oversized_history_keeps_the_trailing_1500_chars() {
        let long = "x".repeat(1000);
        let messages = vec![
            message(Role::User, &long),
            message(Role::Assistant, &long),
        ];

        let rendered = build_history(&messages, "And T2?").expect("history expected");
        assert_eq!(rendered.chars().count(), 1500);
        assert!(rendered.ends_with(&long));
    }
}
