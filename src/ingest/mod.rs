pub mod pdf;

use anyhow::Context;
use chrono::Utc;
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::models::{PageChunk, UploadResponse};
use crate::openai::OpenAiClient;
use crate::registry::{Chunk, DocumentEntry, SharedRegistry};
use crate::schedule;

const TRIATHLON_KEYWORDS: [&str; 16] = [
    "triathlon",
    "triathlete",
    "swim",
    "bike",
    "run",
    "transition",
    "t1",
    "t2",
    "split",
    "race brief",
    "cut off",
    "ironman",
    "70.3",
    "half iron",
    "age group",
    "relay",
];
const MIN_KEYWORD_MATCHES: usize = 3;
const GUIDE_SAMPLE_CHUNKS: usize = 10;

#[derive(Debug, Error)]
pub enum IngestError {
    /// User-correctable rejection, surfaced as a 400 with this message.
    #[error("{0}")]
    Rejected(String),
    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

#[derive(Clone)]
pub struct Ingestor {
    config: AppConfig,
    openai: OpenAiClient,
    registry: SharedRegistry,
}

impl Ingestor {
    pub fn new(config: AppConfig, openai: OpenAiClient, registry: SharedRegistry) -> Self {
        Self {
            config,
            openai,
            registry,
        }
    }

    /// Chunks, validates, embeds, and registers an uploaded guide. Re-uploads
    /// of byte-identical files reuse the already-embedded entry.
    pub async fn ingest_pdf(
        &self,
        file_bytes: Vec<u8>,
        filename: &str,
    ) -> Result<UploadResponse, IngestError> {
        let fingerprint = sha256_hex(&file_bytes);
        {
            let registry = self.registry.read().await;
            if let Some(existing) = registry.find_by_fingerprint(&fingerprint) {
                tracing::info!(
                    document_id = %existing.id,
                    filename = %existing.filename,
                    "reusing previously ingested guide"
                );
                return Ok(upload_response(existing));
            }
        }

        let extracted = tokio::task::spawn_blocking(move || pdf::load_pdf_chunks(&file_bytes))
            .await
            .context("PDF extraction task panicked")?;
        let (chunks, page_count) = match extracted {
            Ok(result) => result,
            Err(err) => {
                tracing::warn!(error = %err, filename, "PDF text extraction failed");
                return Err(IngestError::Rejected(
                    "Could not extract text from the PDF.".to_string(),
                ));
            }
        };

        if chunks.is_empty() {
            return Err(IngestError::Rejected(
                "Could not extract text from the PDF.".to_string(),
            ));
        }
        if !looks_like_triathlon_guide(&chunks) {
            return Err(IngestError::Rejected(
                "The uploaded PDF does not appear to describe a triathlon athlete guide."
                    .to_string(),
            ));
        }

        let texts: Vec<String> = chunks.iter().map(|chunk| chunk.text.clone()).collect();
        let embeddings = self
            .openai
            .embed_documents(&self.config.embedding_model, &texts)
            .await
            .context("failed embedding the uploaded guide")?;
        if embeddings.len() != chunks.len() {
            return Err(IngestError::Failed(anyhow::anyhow!(
                "embedding count {} does not match chunk count {}",
                embeddings.len(),
                chunks.len()
            )));
        }

        let extracted_schedule = schedule::extract_schedule(&chunks);

        let entry = DocumentEntry {
            id: Uuid::new_v4().to_string(),
            filename: filename.to_string(),
            page_count,
            uploaded_at: Utc::now(),
            fingerprint,
            chunks: chunks
                .into_iter()
                .zip(embeddings)
                .map(|(chunk, embedding)| Chunk {
                    id: chunk.id,
                    text: chunk.text,
                    page: chunk.page,
                    section: chunk.section,
                    order: chunk.order,
                    embedding,
                })
                .collect(),
            schedule: extracted_schedule,
        };

        tracing::info!(
            document_id = %entry.id,
            filename,
            page_count,
            chunk_count = entry.chunks.len(),
            schedule_days = entry.schedule.len(),
            "ingested athlete guide"
        );

        let response = upload_response(&entry);
        self.registry.write().await.add(entry);
        Ok(response)
    }
}

fn upload_response(entry: &DocumentEntry) -> UploadResponse {
    UploadResponse {
        document_id: entry.id.clone(),
        filename: entry.filename.clone(),
        page_count: entry.page_count,
        uploaded_at: entry.uploaded_at,
        schedule: entry.schedule.clone(),
    }
}

/// Cheap topicality check over the first few chunks so obviously unrelated
/// PDFs are rejected before any embedding spend.
fn looks_like_triathlon_guide(chunks: &[PageChunk]) -> bool {
    let sample = chunks
        .iter()
        .take(GUIDE_SAMPLE_CHUNKS)
        .map(|chunk| chunk.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
        .to_ascii_lowercase();

    let matches = TRIATHLON_KEYWORDS
        .iter()
        .filter(|keyword| sample.contains(**keyword))
        .count();
    matches >= MIN_KEYWORD_MATCHES
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(text: &str) -> PageChunk {
        PageChunk {
            id: "c".to_string(),
            text: text.to_string(),
            page: 1,
            section: "Intro".to_string(),
            order: 0,
        }
    }

    #[test]
    fn guide_with_enough_keywords_is_accepted() {
        let chunks = vec![chunk(
            "Welcome to the triathlon! The swim starts at dawn and the bike course is flat.",
        )];
        assert!(looks_like_triathlon_guide(&chunks));
    }

    #[test]
    fn unrelated_document_is_rejected() {
        let chunks = vec![chunk(
            "Quarterly earnings rose four percent on strong advertising revenue.",
        )];
        assert!(!looks_like_triathlon_guide(&chunks));
    }

    #[test]
    fn keyword_scan_only_samples_leading_chunks() {
        let mut chunks: Vec<PageChunk> = (0..GUIDE_SAMPLE_CHUNKS)
            .map(|_| chunk("nothing relevant here"))
            .collect();
        chunks.push(chunk("triathlon swim bike run transition"));
        assert!(!looks_like_triathlon_guide(&chunks));
    }

    #[test]
    fn fingerprints_are_stable_and_distinct() {
        assert_eq!(sha256_hex(b"abc"), sha256_hex(b"abc"));
        assert_ne!(sha256_hex(b"abc"), sha256_hex(b"abd"));
    }
}
