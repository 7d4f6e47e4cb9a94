//! Heuristics for pulling a structured schedule out of athlete-guide text and
//! for inferring venue names from loosely structured activity lines.

use std::collections::{HashMap, HashSet};

use regex::Regex;

use crate::models::{PageChunk, ScheduleDay, ScheduleItem};

const SCHEDULE_SECTION_KEYWORDS: [&str; 2] = ["schedule", "time activity"];

const BLOCKLISTED_SECTION_PHRASES: [&str; 4] = ["location", "broadcast", "pro race", "cut-off"];

const DAY_NAMES: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

const MONTH_NAMES: [&str; 12] = [
    "JANUARY",
    "FEBRUARY",
    "MARCH",
    "APRIL",
    "MAY",
    "JUNE",
    "JULY",
    "AUGUST",
    "SEPTEMBER",
    "OCTOBER",
    "NOVEMBER",
    "DECEMBER",
];

const HEADER_STRINGS: [&str; 5] = [
    "TIME ACTIVITY",
    "TIME ACTIVITY LOCATION",
    "EVENT SCHEDULE",
    "RACE START TIMES",
    "PRIZE-GIVING TIMES",
];

const LOCATION_HINTS: [&str; 35] = [
    "park",
    "parks",
    "gardens",
    "garden",
    "dock",
    "docks",
    "museum",
    "room",
    "rooms",
    "car park",
    "church",
    "beach",
    "hall",
    "arena",
    "centre",
    "center",
    "quay",
    "harbour",
    "harbor",
    "street",
    "road",
    "school",
    "club",
    "pool",
    "stadium",
    "village",
    "pavilion",
    "plaza",
    "hotel",
    "promenade",
    "bay",
    "pier",
    "marina",
    "college",
    "square",
];

/// Walks all days and items in input order and produces the deduplicated,
/// display-ordered list of venue names. Item order within a day is never
/// reordered; the output order is first appearance across the traversal.
pub fn derive_locations(days: &[ScheduleDay]) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut venues = Vec::new();

    for day in days {
        for item in &day.items {
            let Some(venue) = venue_for_item(item) else {
                continue;
            };
            if seen.insert(venue.to_lowercase()) {
                venues.push(venue);
            }
        }
    }

    venues
}

fn venue_for_item(item: &ScheduleItem) -> Option<String> {
    if let Some(explicit) = item.location.as_deref() {
        // whitespace-only explicit locations fall through to inference
        if !explicit.trim().is_empty() {
            let cleaned = clean_location(explicit);
            if cleaned.is_empty() || is_placeholder(&cleaned) {
                return None;
            }
            return Some(cleaned);
        }
    }

    infer_location(&item.activity)
}

fn infer_location(activity: &str) -> Option<String> {
    for (_, right) in split_point_candidates(activity) {
        let cleaned = clean_location(&right);
        if looks_like_location(&cleaned) {
            return Some(cleaned);
        }
    }
    None
}

/// Extracts a day-by-day schedule from plain text chunks whose section title
/// looks like a timetable. Overlapping chunks repeat lines, so parsed rows
/// are deduplicated on (day, time, activity, location).
pub fn extract_schedule(chunks: &[PageChunk]) -> Vec<ScheduleDay> {
    let mut days: Vec<ScheduleDay> = Vec::new();
    let mut indices: HashMap<String, usize> = HashMap::new();
    let mut seen: HashSet<(String, String, String, String)> = HashSet::new();
    let mut current: Option<usize> = None;

    for chunk in chunks {
        if !looks_like_schedule_section(&chunk.section) {
            continue;
        }
        for raw_line in chunk.text.lines() {
            let line = raw_line.trim();
            if line.is_empty() || should_skip_line(line) {
                continue;
            }

            if let Some(title) = parse_day_label(line) {
                let index = *indices.entry(title.clone()).or_insert_with(|| {
                    days.push(ScheduleDay {
                        title,
                        items: Vec::new(),
                    });
                    days.len() - 1
                });
                current = Some(index);
                continue;
            }

            let Some((time, remainder)) = parse_time_and_activity(line) else {
                continue;
            };
            let Some(index) = current else {
                continue;
            };

            let activity = clean_activity_text(&remainder);
            if activity.is_empty() {
                continue;
            }
            let (activity, location) = split_activity_and_location(&activity);

            let key = (
                days[index].title.to_ascii_lowercase(),
                time.clone(),
                activity.to_ascii_lowercase(),
                location.as_deref().unwrap_or_default().to_ascii_lowercase(),
            );
            if !seen.insert(key) {
                continue;
            }

            days[index].items.push(ScheduleItem {
                time,
                activity,
                location,
            });
        }
    }

    days.retain(|day| !day.items.is_empty());
    days
}

fn looks_like_schedule_section(section: &str) -> bool {
    if section.is_empty() {
        return false;
    }
    let lowered = section.to_ascii_lowercase();
    let squashed: String = lowered.chars().filter(|c| *c != ' ').collect();
    if BLOCKLISTED_SECTION_PHRASES
        .iter()
        .any(|phrase| lowered.contains(phrase) || squashed.contains(phrase))
    {
        return false;
    }
    SCHEDULE_SECTION_KEYWORDS
        .iter()
        .any(|keyword| lowered.contains(keyword))
}

fn should_skip_line(line: &str) -> bool {
    let cleaned = collapse_whitespace(line);
    if cleaned.is_empty() || cleaned.starts_with('*') {
        return true;
    }
    if cleaned.to_ascii_lowercase().contains("t100triathlon.com") {
        return true;
    }
    let upper = cleaned.to_ascii_uppercase();
    upper.starts_with("PAGE ") || HEADER_STRINGS.contains(&upper.as_str())
}

/// Builds a normalized day label ("Saturday 12 July") from a heading line.
/// A bare weekday with no date/month detail is not a label.
fn parse_day_label(line: &str) -> Option<String> {
    let tokens: Vec<&str> = tokenize_alphanumeric(line);
    if tokens.is_empty() {
        return None;
    }
    let upper_tokens: Vec<String> = tokens.iter().map(|t| t.to_ascii_uppercase()).collect();

    let limit = tokens.len().min(4);
    for index in 1..limit {
        let candidate: String = upper_tokens[..index].concat();
        for day_name in DAY_NAMES {
            if candidate == day_name.to_ascii_uppercase() {
                if let Some(label) = assemble_day_label(day_name, &tokens[index..]) {
                    return Some(label);
                }
            }
        }
    }
    None
}

fn assemble_day_label(day_name: &str, remainder: &[&str]) -> Option<String> {
    let mut parts: Vec<String> = vec![day_name.to_string()];
    let mut has_detail = false;

    for token in remainder {
        let upper = token.to_ascii_uppercase();
        if token.chars().all(|c| c.is_ascii_digit()) || is_ordinal(token) {
            parts.push((*token).to_string());
            has_detail = true;
            continue;
        }
        if MONTH_NAMES.contains(&upper.as_str()) {
            parts.push(title_case_word(token));
            has_detail = true;
            continue;
        }
        break;
    }

    if !has_detail {
        return None;
    }
    Some(normalize_title(&parts.join(" ")))
}

fn is_ordinal(token: &str) -> bool {
    let upper = token.to_ascii_uppercase();
    let digits = upper.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 || digits > 2 {
        return false;
    }
    matches!(&upper[digits..], "ST" | "ND" | "RD" | "TH")
}

/// Splits a line into its time portion and the remaining description.
/// Lines whose remainder is itself a day label are headings, not items.
fn parse_time_and_activity(line: &str) -> Option<(String, String)> {
    let time_re = Regex::new(
        r"^(?i)\d{1,2}:\d{2}(?:\s*[-\x{2013}\x{2014}]\s*\d{1,2}:\d{2})?(?:\s*(?:AM|PM))?",
    )
    .ok()?;
    let matched = time_re.find(line)?;
    let time = normalize_time(matched.as_str());

    let mut remainder = line[matched.end()..]
        .trim()
        .trim_matches(['-', '\u{2013}', '\u{2014}'])
        .replace("**", "")
        .replace('*', "");
    if let Ok(re) = Regex::new(r"(?i)(EVENT|PRO|RACE)\s+SCHEDULE.*$") {
        remainder = re.replace(&remainder, "").into_owned();
    }
    let remainder = collapse_whitespace(&remainder);
    if remainder.is_empty() || parse_day_label(&remainder).is_some() {
        return None;
    }

    // extraction sometimes glues columns together ("BriefingSouth Quay")
    Some((time, split_lower_upper_boundaries(&remainder)))
}

fn normalize_time(raw: &str) -> String {
    let dashed = match Regex::new(r"\s*[-\x{2013}\x{2014}]\s*") {
        Ok(re) => re.replace_all(raw, " - ").into_owned(),
        Err(_) => raw.to_string(),
    };
    collapse_whitespace(&dashed).to_uppercase()
}

fn clean_activity_text(value: &str) -> String {
    let cleaned = collapse_whitespace(value);
    if cleaned.is_empty() {
        return String::new();
    }

    // drop trailing footnotes and page artefacts
    let mut cleaned = match Regex::new(r"\s+\*\s+") {
        Ok(re) => re
            .splitn(&cleaned, 2)
            .next()
            .unwrap_or_default()
            .to_string(),
        Err(_) => cleaned,
    };
    for pattern in [
        r"(?i)\s*\d+\s+t100triathlon\.com$",
        r"(?i)\s*your wave start time.*$",
        r"(?i)\s*start times will also be listed.*$",
        r"\s+\d+$",
    ] {
        if let Ok(re) = Regex::new(pattern) {
            cleaned = re.replace(&cleaned, "").into_owned();
        }
    }

    cleaned.trim_matches([' ', '-']).trim().to_string()
}

/// Candidate (activity, location) split points for a description, in the
/// priority order the heuristics are tried.
fn split_point_candidates(text: &str) -> Vec<(String, String)> {
    let mut candidates = Vec::new();

    let lowered = text.to_ascii_lowercase();
    if let Some(index) = lowered.rfind(" at ") {
        candidates.push((text[..index].to_string(), text[index + 4..].to_string()));
    }

    for separator in [" - ", " \u{2013} ", " \u{2014} "] {
        if let Some(index) = text.rfind(separator) {
            candidates.push((
                text[..index].to_string(),
                text[index + separator.len()..].to_string(),
            ));
        }
    }

    if let Some(index) = text.rfind(':') {
        candidates.push((text[..index].to_string(), text[index + 1..].to_string()));
    }

    if let Some((left, right)) = split_trailing_capitalized_run(text) {
        candidates.push((left, right));
    }

    candidates
}

fn split_activity_and_location(text: &str) -> (String, Option<String>) {
    for (left, right) in split_point_candidates(text) {
        let cleaned = clean_location(&right);
        if !looks_like_location(&cleaned) {
            continue;
        }
        let activity = left
            .trim_matches(|c: char| c.is_whitespace() || matches!(c, '-' | ',' | ':'))
            .to_string();
        if activity.is_empty() {
            continue;
        }
        return (activity, Some(cleaned));
    }
    (text.to_string(), None)
}

/// Scans back from the end of the string for a run of capitalized words,
/// splitting it off from the preceding text. The run may not consume the
/// whole string.
fn split_trailing_capitalized_run(text: &str) -> Option<(String, String)> {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() < 2 {
        return None;
    }

    let mut start = words.len();
    for index in (0..words.len()).rev() {
        if is_capitalized_word(words[index]) {
            start = index;
        } else {
            break;
        }
    }
    if start == 0 || start >= words.len() {
        return None;
    }

    Some((words[..start].join(" "), words[start..].join(" ")))
}

fn is_capitalized_word(word: &str) -> bool {
    let mut chars = word.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if !first.is_uppercase() {
        return false;
    }
    chars.all(|c| {
        c.is_alphanumeric()
            || matches!(
                c,
                '(' | ')' | '\'' | '\u{2019}' | '&' | '-' | '/' | '.' | ','
            )
    })
}

/// Normalizes a venue candidate: straight apostrophes, collapsed whitespace,
/// spaced dashes as " - ", trimmed edges, and a stray trailing item/page
/// number removed.
pub fn clean_location(value: &str) -> String {
    let straight = value.replace(['\u{2018}', '\u{2019}'], "'");
    let collapsed = collapse_whitespace(&straight);
    let dashed = match Regex::new(r"\s[-\x{2013}\x{2014}]\s") {
        Ok(re) => re.replace_all(&collapsed, " - ").into_owned(),
        Err(_) => collapsed,
    };

    let mut cleaned = dashed
        .trim_matches(|c: char| c.is_whitespace() || matches!(c, '-' | ',' | ':'))
        .to_string();
    for pattern in [r"\s*\*+$", r"\s*\d{1,2}$"] {
        if let Ok(re) = Regex::new(pattern) {
            cleaned = re.replace(&cleaned, "").into_owned();
        }
    }
    cleaned.trim().to_string()
}

/// Heuristic gate for inferred venue candidates. Explicit locations bypass
/// this test; placeholders are handled separately.
pub fn looks_like_location(value: &str) -> bool {
    let text = value.trim();
    if text.chars().count() < 3 {
        return false;
    }
    if is_placeholder(text) {
        return false;
    }
    if !text.chars().any(|c| c.is_alphabetic()) {
        return false;
    }

    let lowered = text.to_ascii_lowercase();
    if LOCATION_HINTS.iter().any(|hint| lowered.contains(hint)) {
        return true;
    }

    let words: Vec<&str> = text.split(' ').collect();
    words.len() >= 2
        && words
            .iter()
            .any(|word| word.chars().next().is_some_and(char::is_uppercase))
}

fn is_placeholder(value: &str) -> bool {
    value.eq_ignore_ascii_case("tbc") || value.eq_ignore_ascii_case("tba")
}

fn tokenize_alphanumeric(line: &str) -> Vec<&str> {
    line.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|token| !token.is_empty())
        .collect()
}

fn split_lower_upper_boundaries(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    let mut previous: Option<char> = None;
    for c in text.chars() {
        if let Some(prev) = previous {
            if prev.is_lowercase() && c.is_uppercase() {
                out.push(' ');
            }
        }
        out.push(c);
        previous = Some(c);
    }
    out
}

fn normalize_title(value: &str) -> String {
    collapse_whitespace(value)
        .split(' ')
        .map(title_case_word)
        .collect::<Vec<_>>()
        .join(" ")
}

fn title_case_word(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
        None => String::new(),
    }
}

fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}
