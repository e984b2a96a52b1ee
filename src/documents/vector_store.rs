//! Vector Store
//!
//! In-memory document store with linear cosine-similarity search and JSON
//! persistence. Every embedding in one store has the same dimension.

use crate::documents::embedder::Embedding;
use crate::error::{Result, ScoutError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    pub embedding: Embedding,
}

#[derive(Debug, Clone)]
pub struct SearchResult {
    pub document: Document,
    pub score: f32,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct VectorStore {
    dimension: Option<usize>,
    documents: Vec<Document>,
    #[serde(skip)]
    ids: HashSet<String>,
}

impl VectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn get(&self, id: &str) -> Option<&Document> {
        self.documents.iter().find(|d| d.id == id)
    }

    /// The first document fixes the store's dimension
    pub fn add(&mut self, document: Document) -> Result<()> {
        if document.embedding.is_empty() {
            return Err(ScoutError::Index(format!("document {} has an empty embedding", document.id)));
        }
        match self.dimension {
            Some(dim) if dim != document.embedding.len() => {
                return Err(ScoutError::Index(format!(
                    "embedding dimension {} doesn't match store dimension {}",
                    document.embedding.len(),
                    dim
                )))
            }
            Some(_) => {}
            None => self.dimension = Some(document.embedding.len()),
        }
        if !self.ids.insert(document.id.clone()) {
            return Err(ScoutError::Index(format!("document {} is already indexed", document.id)));
        }
        self.documents.push(document);
        Ok(())
    }

    /// Top `n` documents by cosine similarity, best first
    pub fn search(&self, query: &[f32], n: usize) -> Result<Vec<SearchResult>> {
        let Some(dim) = self.dimension else {
            return Ok(Vec::new());
        };
        if query.len() != dim {
            return Err(ScoutError::Index(format!(
                "query embedding dimension {} doesn't match store dimension {}",
                query.len(),
                dim
            )));
        }

        let mut results: Vec<SearchResult> = self
            .documents
            .iter()
            .map(|doc| SearchResult {
                score: cosine_similarity(query, &doc.embedding),
                document: doc.clone(),
            })
            .collect();

        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(n);
        Ok(results)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let encoded = serde_json::to_string(self)?;
        std::fs::write(path, encoded)?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let encoded = std::fs::read_to_string(path)?;
        let mut store: Self = serde_json::from_str(&encoded)?;
        store.ids = store.documents.iter().map(|d| d.id.clone()).collect();
        if store.ids.len() != store.documents.len() {
            return Err(ScoutError::Index("saved index contains duplicate ids".to_string()));
        }
        if let Some(dim) = store.dimension {
            if let Some(bad) = store.documents.iter().find(|d| d.embedding.len() != dim) {
                return Err(ScoutError::Index(format!(
                    "saved document {} has dimension {}, expected {}",
                    bad.id,
                    bad.embedding.len(),
                    dim
                )));
            }
        }
        Ok(store)
    }

    /// Load the index at `path`, or start empty when it doesn't exist yet
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::new())
        }
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str, embedding: Vec<f32>) -> Document {
        Document {
            id: id.to_string(),
            text: format!("text of {}", id),
            metadata: BTreeMap::new(),
            embedding,
        }
    }

    #[test]
    fn test_cosine_similarity() {
        assert_eq!(cosine_similarity(&[1.0, 0.0, 0.0], &[1.0, 0.0, 0.0]), 1.0);
        assert_eq!(cosine_similarity(&[1.0, 0.0, 0.0], &[0.0, 1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn test_search_orders_by_similarity() {
        let mut store = VectorStore::new();
        store.add(doc("east", vec![1.0, 0.0])).unwrap();
        store.add(doc("north", vec![0.0, 1.0])).unwrap();
        store.add(doc("north_east", vec![1.0, 1.0])).unwrap();

        let results = store.search(&[0.9, 0.1], 2).unwrap();
        let ids: Vec<&str> = results.iter().map(|r| r.document.id.as_str()).collect();
        assert_eq!(ids, vec!["east", "north_east"]);
        assert!(results[0].score > results[1].score);
    }

    #[test]
    fn test_dimension_is_enforced() {
        let mut store = VectorStore::new();
        store.add(doc("a", vec![1.0, 0.0])).unwrap();
        assert!(store.add(doc("b", vec![1.0, 0.0, 0.0])).is_err());
        assert!(store.search(&[1.0], 3).is_err());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut store = VectorStore::new();
        store.add(doc("a", vec![1.0])).unwrap();
        assert!(store.add(doc("a", vec![2.0])).is_err());
        assert!(store.contains("a"));
    }

    #[test]
    fn test_empty_store_search() {
        let store = VectorStore::new();
        assert!(store.search(&[1.0, 2.0], 3).unwrap().is_empty());
    }

    #[test]
    fn test_save_and_load() {
        let dir = std::env::temp_dir().join(format!("scout-index-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("index.json");

        let mut store = VectorStore::new();
        let mut with_meta = doc("a", vec![0.5, 0.5]);
        with_meta.metadata.insert("source".to_string(), "reviews.csv".to_string());
        store.add(with_meta.clone()).unwrap();
        store.save(&path).unwrap();

        let loaded = VectorStore::load(&path).unwrap();
        assert_eq!(loaded.dimension(), Some(2));
        assert!(loaded.contains("a"));
        assert_eq!(loaded.get("a"), Some(&with_meta));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let path = std::env::temp_dir().join(format!("scout-missing-{}.json", uuid::Uuid::new_v4()));
        assert!(VectorStore::load_or_default(&path).unwrap().is_empty());
    }
}
