//! Document Index
//!
//! Embeds one text column of a CSV file into the vector store and answers
//! similarity queries against it.

use crate::documents::embedder::Embedder;
use crate::documents::vector_store::{Document, SearchResult, VectorStore};
use crate::error::{Result, ScoutError};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

pub const BATCH_SIZE: usize = 100;
pub const DEFAULT_INGEST_LIMIT: usize = 1000;
pub const DEFAULT_SEARCH_RESULTS: usize = 3;

struct PendingDocument {
    id: String,
    text: String,
    metadata: BTreeMap<String, String>,
}

pub struct DocumentIndex {
    embedder: Arc<dyn Embedder>,
    store: VectorStore,
    persist_path: Option<PathBuf>,
}

impl DocumentIndex {
    pub fn new(embedder: Arc<dyn Embedder>, store: VectorStore) -> Self {
        Self {
            embedder,
            store,
            persist_path: None,
        }
    }

    /// Save the store to `path` after every embedded batch, so a failed
    /// run keeps the batches it already paid for
    pub fn with_persist_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.persist_path = Some(path.into());
        self
    }

    pub fn store(&self) -> &VectorStore {
        &self.store
    }

    pub fn into_store(self) -> VectorStore {
        self.store
    }

    /// Index up to `limit` rows of `path`; rows already indexed under
    /// `doc_{row}` are skipped. Returns how many documents were added.
    pub async fn ingest_csv(
        &mut self,
        path: impl AsRef<Path>,
        text_column: &str,
        metadata_columns: &[String],
        limit: usize,
    ) -> Result<usize> {
        let mut reader = csv::Reader::from_path(path.as_ref())?;
        let headers = reader.headers()?.clone();

        let column_index = |name: &str| {
            headers
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| ScoutError::Index(format!("column '{}' not found in {}", name, path.as_ref().display())))
        };
        let text_idx = column_index(text_column)?;
        let meta_idx = metadata_columns
            .iter()
            .map(|name| column_index(name).map(|idx| (name.clone(), idx)))
            .collect::<Result<Vec<_>>>()?;

        let mut pending = Vec::with_capacity(BATCH_SIZE);
        let mut added = 0;
        let mut skipped = 0;

        for (row, record) in reader.records().take(limit).enumerate() {
            let record = record?;
            let id = format!("doc_{}", row);
            if self.store.contains(&id) {
                skipped += 1;
                continue;
            }

            pending.push(PendingDocument {
                id,
                text: record.get(text_idx).unwrap_or_default().to_string(),
                metadata: meta_idx
                    .iter()
                    .map(|(name, idx)| (name.clone(), record.get(*idx).unwrap_or_default().to_string()))
                    .collect(),
            });

            if pending.len() == BATCH_SIZE {
                added += self.flush(&mut pending).await?;
            }
        }
        added += self.flush(&mut pending).await?;

        info!(added, skipped, total = self.store.len(), "Indexed documents");
        Ok(added)
    }

    async fn flush(&mut self, pending: &mut Vec<PendingDocument>) -> Result<usize> {
        if pending.is_empty() {
            return Ok(0);
        }
        let texts: Vec<String> = pending.iter().map(|p| p.text.clone()).collect();
        let embeddings = self.embedder.embed(&texts).await?;
        if embeddings.len() != texts.len() {
            return Err(ScoutError::Embedding(format!(
                "Expected {} embeddings, got {}",
                texts.len(),
                embeddings.len()
            )));
        }

        let count = pending.len();
        for (doc, embedding) in pending.drain(..).zip(embeddings) {
            self.store.add(Document {
                id: doc.id,
                text: doc.text,
                metadata: doc.metadata,
                embedding,
            })?;
        }

        if let Some(ref path) = self.persist_path {
            self.store.save(path)?;
            debug!(path = %path.display(), total = self.store.len(), "Saved document batch");
        }
        Ok(count)
    }

    pub async fn search(&self, query: &str, n: usize) -> Result<Vec<SearchResult>> {
        if self.store.is_empty() {
            return Ok(Vec::new());
        }
        let embedding = self
            .embedder
            .embed(&[query.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ScoutError::Embedding("No embedding returned for query".to_string()))?;
        self.store.search(&embedding, n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Maps text onto [len, vowel count] and records each batch size
    struct StubEmbedder {
        batches: std::sync::Mutex<Vec<usize>>,
        calls: AtomicUsize,
    }

    impl StubEmbedder {
        fn new() -> Self {
            Self {
                batches: std::sync::Mutex::new(Vec::new()),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Embedder for StubEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<crate::documents::Embedding>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.batches.lock().unwrap().push(texts.len());
            Ok(texts
                .iter()
                .map(|t| {
                    let vowels = t.chars().filter(|c| "aeiou".contains(*c)).count();
                    vec![t.len() as f32 + 1.0, vowels as f32]
                })
                .collect())
        }
    }

    fn write_csv(rows: usize) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("scout-docs-{}.csv", uuid::Uuid::new_v4()));
        let mut writer = csv::Writer::from_path(&path).unwrap();
        writer.write_record(["review", "rating"]).unwrap();
        for i in 0..rows {
            writer.write_record([format!("review number {}", i), (i % 5).to_string()]).unwrap();
        }
        writer.flush().unwrap();
        path
    }

    #[tokio::test]
    async fn test_ingest_batches_and_limit() {
        let path = write_csv(250);
        let embedder = Arc::new(StubEmbedder::new());
        let mut index = DocumentIndex::new(embedder.clone(), VectorStore::new());

        let added = index
            .ingest_csv(&path, "review", &["rating".to_string()], 230)
            .await
            .unwrap();

        assert_eq!(added, 230);
        assert_eq!(*embedder.batches.lock().unwrap(), vec![100, 100, 30]);
        let first = index.store().get("doc_0").unwrap();
        assert_eq!(first.text, "review number 0");
        assert_eq!(first.metadata.get("rating").map(String::as_str), Some("0"));
        std::fs::remove_file(&path).unwrap();
    }

    #[tokio::test]
    async fn test_reingest_skips_existing() {
        let path = write_csv(10);
        let embedder = Arc::new(StubEmbedder::new());
        let mut index = DocumentIndex::new(embedder.clone(), VectorStore::new());

        assert_eq!(index.ingest_csv(&path, "review", &[], 5).await.unwrap(), 5);
        assert_eq!(index.ingest_csv(&path, "review", &[], 10).await.unwrap(), 5);
        assert_eq!(index.store().len(), 10);
        std::fs::remove_file(&path).unwrap();
    }

    /// Embeds the first batch, then fails like an exhausted API quota
    struct FailsAfterFirstBatch {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Embedder for FailsAfterFirstBatch {
        async fn embed(&self, texts: &[String]) -> Result<Vec<crate::documents::Embedding>> {
            if self.calls.fetch_add(1, Ordering::SeqCst) > 0 {
                return Err(ScoutError::Embedding("429 Too Many Requests".to_string()));
            }
            Ok(texts.iter().map(|t| vec![t.len() as f32, 1.0]).collect())
        }
    }

    #[tokio::test]
    async fn test_failed_batch_keeps_earlier_batches_on_disk() {
        let path = write_csv(150);
        let index_path = std::env::temp_dir().join(format!("scout-index-{}.json", uuid::Uuid::new_v4()));
        let embedder = Arc::new(FailsAfterFirstBatch {
            calls: AtomicUsize::new(0),
        });
        let mut index = DocumentIndex::new(embedder, VectorStore::new()).with_persist_path(&index_path);

        let err = index
            .ingest_csv(&path, "review", &[], DEFAULT_INGEST_LIMIT)
            .await
            .unwrap_err();
        assert!(matches!(err, ScoutError::Embedding(_)));

        let saved = VectorStore::load(&index_path).unwrap();
        assert_eq!(saved.len(), BATCH_SIZE);
        assert!(saved.contains("doc_0"));
        assert!(saved.contains("doc_99"));
        assert!(!saved.contains("doc_100"));
        std::fs::remove_file(&path).unwrap();
        std::fs::remove_file(&index_path).unwrap();
    }

    #[tokio::test]
    async fn test_missing_text_column() {
        let path = write_csv(1);
        let mut index = DocumentIndex::new(Arc::new(StubEmbedder::new()), VectorStore::new());

        let err = index.ingest_csv(&path, "body", &[], 10).await.unwrap_err();
        assert!(matches!(err, ScoutError::Index(msg) if msg.contains("'body'")));
        std::fs::remove_file(&path).unwrap();
    }

    #[tokio::test]
    async fn test_search_empty_index_skips_embedding() {
        let embedder = Arc::new(StubEmbedder::new());
        let index = DocumentIndex::new(embedder.clone(), VectorStore::new());

        assert!(index.search("anything", DEFAULT_SEARCH_RESULTS).await.unwrap().is_empty());
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_search_returns_top_n() {
        let path = write_csv(8);
        let mut index = DocumentIndex::new(Arc::new(StubEmbedder::new()), VectorStore::new());
        index.ingest_csv(&path, "review", &[], DEFAULT_INGEST_LIMIT).await.unwrap();

        let results = index.search("review number 3", DEFAULT_SEARCH_RESULTS).await.unwrap();
        assert_eq!(results.len(), 3);
        assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
        std::fs::remove_file(&path).unwrap();
    }
}
