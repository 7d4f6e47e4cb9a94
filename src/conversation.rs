//! Client-side conversation state: the loaded guide, the message transcript,
//! and the transitions that are allowed to change them. Messages are only
//! appended or wholesale-reset, never edited in place, and a failed ask
//! leaves the state untouched.

use crate::citations;
use crate::models::{Citation, Message, Role, UploadResponse};

#[derive(Debug, Default)]
pub struct ConversationState {
    document: Option<UploadResponse>,
    messages: Vec<Message>,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn document(&self) -> Option<&UploadResponse> {
        self.document.as_ref()
    }

    pub fn document_id(&self) -> Option<&str> {
        self.document.as_ref().map(|doc| doc.document_id.as_str())
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// A newly loaded guide starts a fresh conversation.
    pub fn upload_success(&mut self, response: UploadResponse) {
        self.messages.clear();
        self.document = Some(response);
    }

    /// Records a completed ask: the user turn and the assistant turn land
    /// together, with the answer's citations deduplicated on arrival.
    pub fn ask_success(
        &mut self,
        question: impl Into<String>,
        answer: impl Into<String>,
        answer_citations: Option<Vec<Citation>>,
    ) {
        self.messages.push(Message::new(Role::User, question, None));
        self.messages.push(Message::new(
            Role::Assistant,
            answer,
            citations::dedupe(answer_citations),
        ));
    }

    /// Clears the transcript; the loaded guide stays available.
    pub fn reset(&mut self) {
        self.messages.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn upload(document_id: &str) -> UploadResponse {
        UploadResponse {
            document_id: document_id.to_string(),
            filename: "guide.pdf".to_string(),
            page_count: 12,
            uploaded_at: Utc::now(),
            schedule: vec![],
        }
    }

    fn citation(section: &str, page: u32) -> Citation {
        Citation {
            section: section.to_string(),
            page,
            excerpt: None,
        }
    }

    #[test]
    fn ask_success_appends_both_turns() {
        let mut state = ConversationState::new();
        state.upload_success(upload("doc-1"));
        state.ask_success("When is the swim?", "At dawn [Schedule - p.4]", None);

        assert_eq!(state.messages().len(), 2);
        assert_eq!(state.messages()[0].role, Role::User);
        assert_eq!(state.messages()[1].role, Role::Assistant);
    }

    #[test]
    fn answer_citations_are_deduplicated_on_arrival() {
        let mut state = ConversationState::new();
        state.upload_success(upload("doc-1"));
        state.ask_success(
            "When is the swim?",
            "At dawn",
            Some(vec![
                citation("Schedule", 4),
                citation("Schedule", 4),
                citation("Course", 7),
            ]),
        );

        let stored = state.messages()[1]
            .citations
            .as_ref()
            .expect("citations kept");
        assert_eq!(stored.len(), 2);
    }

    #[test]
    fn new_upload_starts_a_fresh_conversation() {
        let mut state = ConversationState::new();
        state.upload_success(upload("doc-1"));
        state.ask_success("q", "a", None);

        state.upload_success(upload("doc-2"));
        assert!(state.messages().is_empty());
        assert_eq!(state.document_id(), Some("doc-2"));
    }

    #[test]
    fn reset_clears_messages_but_keeps_the_guide() {
        let mut state = ConversationState::new();
        state.upload_success(upload("doc-1"));
        state.ask_success("q", "a", None);

        state.reset();
        assert!(state.messages().is_empty());
        assert_eq!(state.document_id(), Some("doc-1"));
    }
}
