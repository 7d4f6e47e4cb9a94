//! Splits athlete-guide PDFs into contextual chunks. Text extraction itself
//! is delegated to the `pdf-extract` crate; this module owns section
//! inference and chunking.

use anyhow::{Context, Result};
use uuid::Uuid;

use crate::models::PageChunk;

const CHUNK_TARGET_CHARS: usize = 800;
const CHUNK_OVERLAP_CHARS: usize = 200;
const SECTION_SCAN_LINES: usize = 5;
const SECTION_MAX_CHARS: usize = 80;

/// Extracts per-page text, infers a section heading per page, and splits the
/// text into overlapping chunks. Returns the chunks and the page count.
pub fn load_pdf_chunks(file_bytes: &[u8]) -> Result<(Vec<PageChunk>, usize)> {
    let pages = pdf_extract::extract_text_from_mem_by_pages(file_bytes)
        .context("failed to extract text from PDF")?;
    let page_count = pages.len();

    let mut chunks = Vec::new();
    for (page_index, page_text) in pages.iter().enumerate() {
        let stripped = page_text.trim();
        if stripped.is_empty() {
            continue;
        }

        let section = infer_section_title(stripped);
        for piece in split_text(stripped, CHUNK_TARGET_CHARS, CHUNK_OVERLAP_CHARS) {
            chunks.push(PageChunk {
                id: Uuid::new_v4().to_string(),
                text: piece,
                page: (page_index + 1) as u32,
                section: section.clone(),
                order: chunks.len(),
            });
        }
    }

    Ok((chunks, page_count))
}

/// Guesses a section heading for a page from its prominent early lines: a
/// short, mostly-alphabetic, all-caps line wins; otherwise the first line.
pub fn infer_section_title(page_text: &str) -> String {
    let lines: Vec<&str> = page_text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    let Some(first) = lines.first() else {
        return "Unknown Section".to_string();
    };

    for line in lines.iter().take(SECTION_SCAN_LINES) {
        let length = line.chars().count();
        let alpha = line.chars().filter(|c| c.is_alphabetic()).count();
        let alpha_ratio = alpha as f32 / length.max(1) as f32;
        if length <= SECTION_MAX_CHARS && alpha_ratio > 0.5 && line.to_uppercase() == **line {
            return normalize_title(line);
        }
    }

    normalize_title(first)
}

/// Word-boundary splitter with a character ceiling per piece and a trailing
/// overlap carried into the next piece.
fn split_text(text: &str, target_chars: usize, overlap_chars: usize) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return vec![];
    }

    let mut pieces = Vec::new();
    let mut start = 0usize;
    while start < words.len() {
        let mut end = start;
        let mut length = 0usize;
        while end < words.len() {
            let add = words[end].chars().count() + usize::from(length > 0);
            if length + add > target_chars && end > start {
                break;
            }
            length += add;
            end += 1;
        }

        pieces.push(words[start..end].join(" "));
        if end == words.len() {
            break;
        }

        let mut back = end;
        let mut overlap = 0usize;
        while back > start + 1 && overlap < overlap_chars {
            back -= 1;
            overlap += words[back].chars().count() + 1;
        }
        start = back.max(start + 1);
    }

    pieces
}

fn normalize_title(title: &str) -> String {
    title
        .split_whitespace()
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_caps_heading_becomes_the_section_title() {
        let page = "some intro line\nRACE DAY SCHEDULE\nThe swim starts at dawn.";
        assert_eq!(infer_section_title(page), "Race Day Schedule");
    }

    #[test]
    fn first_line_is_the_fallback_title() {
        let page = "Welcome to the event guide\nlots of body text follows here";
        assert_eq!(infer_section_title(page), "Welcome To The Event Guide");
    }

    #[test]
    fn heading_scan_ignores_lines_past_the_window() {
        let page = "one\ntwo\nthree\nfour\nfive\nRACE DAY SCHEDULE";
        assert_eq!(infer_section_title(page), "One");
    }

    #[test]
    fn long_or_numeric_lines_are_not_headings() {
        let page = format!("{}\nCOURSE MAP", "X".repeat(100));
        assert_eq!(infer_section_title(&page), "Course Map");

        let numeric = "07:00 08:00 09:00\nbody text";
        assert_eq!(infer_section_title(numeric), "07:00 08:00 09:00");
    }

    #[test]
    fn short_text_stays_in_one_piece() {
        let pieces = split_text("a handful of words", 800, 200);
        assert_eq!(pieces, vec!["a handful of words".to_string()]);
    }

    #[test]
    fn long_text_splits_with_overlap() {
        let text = (1..=300)
            .map(|n| format!("word{n}"))
            .collect::<Vec<_>>()
            .join(" ");

        let pieces = split_text(&text, 200, 50);
        assert!(pieces.len() >= 2);
        for piece in &pieces {
            assert!(piece.chars().count() <= 200);
        }

        // consecutive pieces share their boundary words
        let first_tail = pieces[0].split_whitespace().last().unwrap();
        assert!(pieces[1].contains(first_tail));
    }

    #[test]
    fn splitter_always_advances() {
        // a single word larger than the target cannot loop forever
        let text = "x".repeat(1000);
        let pieces = split_text(&text, 100, 50);
        assert_eq!(pieces.len(), 1);
    }
}
