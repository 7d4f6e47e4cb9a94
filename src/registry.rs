//! In-memory store for uploaded guides, keyed by document id. Documents are
//! added whole and read whole; nothing is mutated in place.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::models::ScheduleDay;

pub type SharedRegistry = Arc<RwLock<DocumentRegistry>>;

/// Single vectorized passage extracted from an uploaded PDF.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub id: String,
    pub text: String,
    pub page: u32,
    pub section: String,
    pub order: usize,
    pub embedding: Vec<f32>,
}

/// Container for one uploaded PDF, its chunks, and the extracted schedule.
#[derive(Debug, Clone)]
pub struct DocumentEntry {
    pub id: String,
    pub filename: String,
    pub page_count: usize,
    pub uploaded_at: DateTime<Utc>,
    pub fingerprint: String,
    pub chunks: Vec<Chunk>,
    pub schedule: Vec<ScheduleDay>,
}

impl DocumentEntry {
    /// Ranks chunks by cosine similarity against the query embedding and
    /// returns the top anchors, each pulling in at most one not-yet-selected
    /// neighbour from the same page for extra context.
    pub fn similarity_search(&self, query_embedding: &[f32], top_k: usize) -> Vec<&Chunk> {
        if self.chunks.is_empty() || top_k == 0 {
            return vec![];
        }

        let mut scored: Vec<(usize, f32)> = self
            .chunks
            .iter()
            .enumerate()
            .map(|(index, chunk)| (index, cosine_similarity(&chunk.embedding, query_embedding)))
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));

        let mut selected = Vec::new();
        let mut seen: HashSet<&str> = HashSet::new();

        for (index, _) in scored.into_iter().take(top_k) {
            let anchor = &self.chunks[index];
            if !seen.insert(anchor.id.as_str()) {
                continue;
            }
            selected.push(anchor);

            for candidate in &self.chunks {
                if candidate.page != anchor.page || seen.contains(candidate.id.as_str()) {
                    continue;
                }
                seen.insert(candidate.id.as_str());
                selected.push(candidate);
                break;
            }
        }

        selected
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm = norm_a * norm_b;
    if norm <= f32::EPSILON {
        return 0.0;
    }
    dot / norm
}

#[derive(Debug, Default)]
pub struct DocumentRegistry {
    entries: HashMap<String, DocumentEntry>,
    by_fingerprint: HashMap<String, String>,
}

impl DocumentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedRegistry {
        Arc::new(RwLock::new(Self::new()))
    }

    /// Adds an entry, replacing any previous version with the same id.
    pub fn add(&mut self, entry: DocumentEntry) {
        self.by_fingerprint
            .insert(entry.fingerprint.clone(), entry.id.clone());
        self.entries.insert(entry.id.clone(), entry);
    }

    pub fn get(&self, document_id: &str) -> Option<&DocumentEntry> {
        self.entries.get(document_id)
    }

    /// Looks up an already-ingested document by the SHA-256 of its bytes.
    pub fn find_by_fingerprint(&self, fingerprint: &str) -> Option<&DocumentEntry> {
        self.by_fingerprint
            .get(fingerprint)
            .and_then(|id| self.entries.get(id))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(id: &str, page: u32, embedding: Vec<f32>) -> Chunk {
        Chunk {
            id: id.to_string(),
            text: format!("chunk {id}"),
            page,
            section: "Race Day".to_string(),
            order: 0,
            embedding,
        }
    }

    fn entry(chunks: Vec<Chunk>) -> DocumentEntry {
        DocumentEntry {
            id: "doc".to_string(),
            filename: "guide.pdf".to_string(),
            page_count: 3,
            uploaded_at: Utc::now(),
            fingerprint: "fp".to_string(),
            chunks,
            schedule: vec![],
        }
    }

    #[test]
    fn best_match_ranks_first() {
        let entry = entry(vec![
            chunk("a", 1, vec![0.0, 1.0]),
            chunk("b", 2, vec![1.0, 0.0]),
            chunk("c", 3, vec![0.7, 0.7]),
        ]);

        let hits = entry.similarity_search(&[1.0, 0.0], 1);
        assert_eq!(hits[0].id, "b");
    }

    #[test]
    fn anchor_pulls_one_same_page_neighbour() {
        let entry = entry(vec![
            chunk("a", 1, vec![1.0, 0.0]),
            chunk("b", 1, vec![0.0, 1.0]),
            chunk("c", 1, vec![0.1, 0.9]),
            chunk("d", 2, vec![0.9, 0.1]),
        ]);

        let hits = entry.similarity_search(&[1.0, 0.0], 1);
        let ids: Vec<&str> = hits.iter().map(|c| c.id.as_str()).collect();
        // anchor "a" plus exactly one other chunk from page 1
        assert_eq!(ids.len(), 2);
        assert_eq!(ids[0], "a");
        assert_eq!(hits[1].page, 1);
    }

    #[test]
    fn empty_entry_returns_nothing() {
        let entry = entry(vec![]);
        assert!(entry.similarity_search(&[1.0, 0.0], 5).is_empty());
    }

    #[test]
    fn zero_norm_embeddings_do_not_panic() {
        let entry = entry(vec![chunk("a", 1, vec![0.0, 0.0])]);
        let hits = entry.similarity_search(&[0.0, 0.0], 1);
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn fingerprint_lookup_finds_existing_entry() {
        let mut registry = DocumentRegistry::new();
        registry.add(entry(vec![]));

        assert!(registry.find_by_fingerprint("fp").is_some());
        assert!(registry.find_by_fingerprint("other").is_none());
        assert_eq!(registry.len(), 1);
    }
}
