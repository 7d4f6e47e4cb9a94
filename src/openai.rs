use anyhow::{Context, Result};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

// Keeps individual embedding requests well under the API body limits.
const EMBED_BATCH_SIZE: usize = 64;

#[derive(Clone)]
pub struct OpenAiClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl OpenAiClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    /// Embeds a collection of chunk texts, preserving input order.
    pub async fn embed_documents(&self, model: &str, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(EMBED_BATCH_SIZE) {
            vectors.extend(self.embed_batch(model, batch).await?);
        }
        Ok(vectors)
    }

    /// Embeds a single query string for similarity search.
    pub async fn embed_query(&self, model: &str, text: &str) -> Result<Vec<f32>> {
        let input = text.trim();
        if input.is_empty() {
            anyhow::bail!("cannot embed empty text input");
        }

        let mut vectors = self.embed_batch(model, &[input.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| anyhow::anyhow!("embeddings endpoint returned no vectors"))
    }

    async fn embed_batch(&self, model: &str, batch: &[String]) -> Result<Vec<Vec<f32>>> {
        #[derive(Serialize)]
        struct EmbedReq<'a> {
            model: &'a str,
            input: &'a [String],
        }

        #[derive(Deserialize)]
        struct EmbedResp {
            data: Vec<EmbedDatum>,
        }

        #[derive(Deserialize)]
        struct EmbedDatum {
            embedding: Vec<f32>,
        }

        if batch.is_empty() {
            return Ok(vec![]);
        }

        let url = format!("{}/embeddings", self.base_url);
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&EmbedReq {
                model,
                input: batch,
            })
            .send()
            .await
            .context("failed to call embeddings endpoint")?;

        if response.status() != StatusCode::OK {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("embeddings endpoint returned {status}: {}", normalize_err_body(&body));
        }

        let response = response
            .json::<EmbedResp>()
            .await
            .context("failed to decode embeddings response")?;

        if response.data.len() != batch.len() {
            anyhow::bail!(
                "embeddings endpoint returned {} vectors for {} inputs",
                response.data.len(),
                batch.len()
            );
        }

        Ok(response.data.into_iter().map(|d| d.embedding).collect())
    }

    pub async fn chat(
        &self,
        model: &str,
        system_prompt: &str,
        user_prompt: &str,
        temperature: f32,
    ) -> Result<String> {
        #[derive(Serialize)]
        struct ChatReq<'a> {
            model: &'a str,
            messages: Vec<ChatReqMessage<'a>>,
            temperature: f32,
        }

        #[derive(Serialize)]
        struct ChatReqMessage<'a> {
            role: &'a str,
            content: &'a str,
        }

        #[derive(Deserialize)]
        struct ChatResp {
            choices: Vec<ChatChoice>,
        }

        #[derive(Deserialize)]
        struct ChatChoice {
            message: ChatChoiceMessage,
        }

        #[derive(Deserialize)]
        struct ChatChoiceMessage {
            content: String,
        }

        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&ChatReq {
                model,
                messages: vec![
                    ChatReqMessage {
                        role: "system",
                        content: system_prompt,
                    },
                    ChatReqMessage {
                        role: "user",
                        content: user_prompt,
                    },
                ],
                temperature,
            })
            .send()
            .await
            .context("failed to call chat completions endpoint")?;

        if response.status() != StatusCode::OK {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!(
                "chat completions endpoint returned {status}: {}",
                normalize_err_body(&body)
            );
        }

        let response = response
            .json::<ChatResp>()
            .await
            .context("failed to decode chat completions response")?;

        let content = response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| anyhow::anyhow!("chat completions endpoint returned no choices"))?;

        Ok(content.trim().to_string())
    }
}

fn normalize_err_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "<empty body>".to_string();
    }

    if let Ok(json) = serde_json::from_str::<serde_json::Value>(trimmed) {
        if let Some(message) = json
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(|m| m.as_str())
        {
            return message.to_string();
        }
        if let Some(message) = json.get("error").and_then(|e| e.as_str()) {
            return message.to_string();
        }
    }

    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_body_extracts_nested_message() {
        let body = r#"{"error": {"message": "model not found", "type": "invalid_request_error"}}"#;
        assert_eq!(normalize_err_body(body), "model not found");
    }

    #[test]
    fn error_body_falls_back_to_raw_text() {
        assert_eq!(normalize_err_body("bad gateway"), "bad gateway");
        assert_eq!(normalize_err_body("  "), "<empty body>");
    }
}
