//! Prompt assembly and answer generation over retrieved guide chunks.

use anyhow::Result;

use crate::openai::OpenAiClient;

pub const NOT_FOUND_MESSAGE: &str = "I couldn't find that in the athlete guide.";

pub const SYSTEM_PROMPT: &str = "You are a concise triathlon race assistant. \
    Answer questions using only the provided context. If the answer is not \
    contained in the context, respond with \"I couldn't find that in the \
    athlete guide.\" Always include citations for each statement in the \
    format [Section - p.X]. Synthesize the key facts (times, locations, \
    requirements) in your own words instead of copying large blocks of text.";

const EXCERPT_WORDS: usize = 36;

/// The slice of a retrieved chunk the prompt and citations need.
#[derive(Debug, Clone)]
pub struct ContextChunk {
    pub section: String,
    pub page: u32,
    pub text: String,
}

pub async fn answer_question(
    client: &OpenAiClient,
    model: &str,
    question: &str,
    history: Option<&str>,
    chunks: &[ContextChunk],
) -> Result<String> {
    if chunks.is_empty() {
        return Ok(NOT_FOUND_MESSAGE.to_string());
    }

    let context = build_context(chunks);
    let prompt = build_user_prompt(question, &context, history);
    client.chat(model, SYSTEM_PROMPT, &prompt, 1.0).await
}

pub fn build_context(chunks: &[ContextChunk]) -> String {
    chunks
        .iter()
        .map(|chunk| {
            format!(
                "Section: {}\nPage: {}\nExcerpt: {}",
                chunk.section, chunk.page, chunk.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n---\n")
}

pub fn build_user_prompt(question: &str, context: &str, history: Option<&str>) -> String {
    match history {
        Some(history) => format!(
            "Context:\n{context}\n\nPrevious conversation:\n{history}\n\nQuestion: {question}\n"
        ),
        None => format!("Context:\n{context}\n\nQuestion: {question}\n"),
    }
}

/// Leading words of a chunk, used as the citation excerpt.
pub fn excerpt(text: &str) -> String {
    text.split_whitespace()
        .take(EXCERPT_WORDS)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_blocks_carry_section_and_page() {
        let chunks = vec![
            ContextChunk {
                section: "Race Day Schedule".to_string(),
                page: 4,
                text: "Swim start at 07:00.".to_string(),
            },
            ContextChunk {
                section: "Transition".to_string(),
                page: 6,
                text: "Racking closes at 06:30.".to_string(),
            },
        ];

        let context = build_context(&chunks);
        assert!(context.contains("Section: Race Day Schedule\nPage: 4"));
        assert!(context.contains("\n---\n"));
        assert!(context.ends_with("Racking closes at 06:30."));
    }

    #[test]
    fn history_section_only_appears_when_present() {
        let with = build_user_prompt("Q?", "ctx", Some("User: hi"));
        assert!(with.contains("Previous conversation:\nUser: hi"));

        let without = build_user_prompt("Q?", "ctx", None);
        assert!(!without.contains("Previous conversation"));
    }

    #[test]
    fn excerpt_truncates_to_leading_words() {
        let text = (1..=50)
            .map(|n| format!("w{n}"))
            .collect::<Vec<_>>()
            .join(" ");
        let snippet = excerpt(&text);
        assert_eq!(snippet.split_whitespace().count(), 36);
        assert!(snippet.starts_with("w1 w2"));
    }
}
