//! HTTP client for the ask-my-race API, used by the terminal chat binary.
//! Runs the same pre-submission guard checks a browser front end would, and
//! reduces error bodies to a single human-readable message.

use std::path::Path;

use anyhow::{Context, Result};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::guard;
use crate::models::{AskRequest, AskResponse, ExampleGuide, UploadResponse};

const GENERIC_FAILURE: &str = "The request failed. Please try again.";

#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
        }
    }

    pub async fn upload(&self, path: &Path) -> Result<UploadResponse> {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("failed reading {}", path.display()))?;
        let filename = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default()
            .to_string();

        // pre-submission check; the server repeats it authoritatively
        guard::validate_pdf_upload(Some("application/pdf"), &filename, bytes.len() as u64)
            .map_err(|rejection| anyhow::anyhow!(rejection.message()))?;

        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(filename)
            .mime_str("application/pdf")
            .context("failed building multipart body")?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(format!("{}/upload", self.base_url))
            .multipart(form)
            .send()
            .await
            .context("upload request failed")?;
        decode_response(response).await
    }

    pub async fn list_examples(&self) -> Result<Vec<ExampleGuide>> {
        let response = self
            .client
            .get(format!("{}/examples", self.base_url))
            .send()
            .await
            .context("examples request failed")?;
        decode_response(response).await
    }

    pub async fn load_example(&self, slug: &str) -> Result<UploadResponse> {
        let response = self
            .client
            .post(format!("{}/examples/{slug}", self.base_url))
            .send()
            .await
            .context("example load request failed")?;
        decode_response(response).await
    }

    pub async fn ask(
        &self,
        document_id: &str,
        question: &str,
        context: Option<String>,
    ) -> Result<AskResponse> {
        let payload = AskRequest {
            document_id: document_id.to_string(),
            question: question.to_string(),
            context,
        };

        let response = self
            .client
            .post(format!("{}/ask", self.base_url))
            .json(&payload)
            .send()
            .await
            .context("ask request failed")?;
        decode_response(response).await
    }
}

async fn decode_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();
    if status.is_success() {
        return response
            .json::<T>()
            .await
            .context("failed to decode server response");
    }

    let body = response.text().await.unwrap_or_default();
    let message = extract_error_message(&body).unwrap_or_else(|| GENERIC_FAILURE.to_string());
    anyhow::bail!(message)
}

/// Reduces an error body to a displayable message: a JSON string body is the
/// message; otherwise a "detail" field that is a string or a list whose first
/// element has a string "msg"; otherwise a non-empty plain-text body.
pub fn extract_error_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }

    let Ok(value) = serde_json::from_str::<Value>(trimmed) else {
        return Some(trimmed.to_string());
    };

    match value {
        Value::String(message) if !message.trim().is_empty() => Some(message),
        Value::Object(map) => match map.get("detail") {
            Some(Value::String(message)) => Some(message.clone()),
            Some(Value::Array(items)) => items
                .first()
                .and_then(|item| item.get("msg"))
                .and_then(|msg| msg.as_str())
                .map(str::to_string),
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_string_body_is_the_message() {
        assert_eq!(
            extract_error_message(r#""upload too large""#),
            Some("upload too large".to_string())
        );
    }

    #[test]
    fn detail_string_is_extracted() {
        assert_eq!(
            extract_error_message(r#"{"detail": "Only PDF uploads are supported."}"#),
            Some("Only PDF uploads are supported.".to_string())
        );
    }

    #[test]
    fn detail_list_uses_the_first_msg() {
        let body = r#"{"detail": [{"loc": ["body", "question"], "msg": "Question cannot be empty."}]}"#;
        assert_eq!(
            extract_error_message(body),
            Some("Question cannot be empty.".to_string())
        );
    }

    #[test]
    fn plain_text_body_is_the_message() {
        assert_eq!(
            extract_error_message("bad gateway"),
            Some("bad gateway".to_string())
        );
    }

    #[test]
    fn unusable_bodies_yield_nothing() {
        assert_eq!(extract_error_message(""), None);
        assert_eq!(extract_error_message(r#"{"code": 500}"#), None);
        assert_eq!(extract_error_message(r#"{"detail": 42}"#), None);
        assert_eq!(extract_error_message("[1, 2]"), None);
    }
}
