//! Single-node persistent index.
//!
//! Records and their vectors live in memory behind a `tokio::sync::RwLock`
//! and are snapshotted to `<dir>/index.json` after every write, so a reopened
//! index sees everything previously added. Search is brute-force cosine
//! similarity over the candidate set.

use crate::embeddings::Embedder;
use crate::traits::ChunkIndex;
use crate::{ChunkRecord, IndexError, ScoredChunk};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, info};

pub const INDEX_FILE_NAME: &str = "index.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredEntry {
    record: ChunkRecord,
    vector: Vec<f32>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    dimensions: usize,
    entries: Vec<StoredEntry>,
    #[serde(skip)]
    positions: HashMap<String, usize>,
}

impl Snapshot {
    fn reindex(&mut self) {
        self.positions = self
            .entries
            .iter()
            .enumerate()
            .map(|(position, entry)| (entry.record.id.clone(), position))
            .collect();
    }

    fn upsert(&mut self, entry: StoredEntry) {
        match self.positions.get(&entry.record.id) {
            Some(&position) => self.entries[position] = entry,
            None => {
                self.positions
                    .insert(entry.record.id.clone(), self.entries.len());
                self.entries.push(entry);
            }
        }
    }
}

pub struct LocalIndex<E: Embedder> {
    file: Option<PathBuf>,
    embedder: E,
    state: RwLock<Snapshot>,
}

impl<E: Embedder> LocalIndex<E> {
    /// Opens (or creates) the index stored under `dir`.
    pub async fn open(dir: impl AsRef<Path>, embedder: E) -> Result<Self, IndexError> {
        let dir = dir.as_ref();
        tokio::fs::create_dir_all(dir).await?;
        let file = dir.join(INDEX_FILE_NAME);

        let mut snapshot = if tokio::fs::try_exists(&file).await? {
            let raw = tokio::fs::read(&file).await?;
            serde_json::from_slice::<Snapshot>(&raw)?
        } else {
            Snapshot::default()
        };

        if snapshot.entries.is_empty() {
            snapshot.dimensions = embedder.dimensions();
        } else if snapshot.dimensions != embedder.dimensions() {
            return Err(IndexError::Request(format!(
                "index at {} holds {}-dimensional vectors but the embedder produces {}",
                file.display(),
                snapshot.dimensions,
                embedder.dimensions()
            )));
        }
        snapshot.reindex();

        info!(path = %file.display(), records = snapshot.entries.len(), "opened local chunk index");

        Ok(Self {
            file: Some(file),
            embedder,
            state: RwLock::new(snapshot),
        })
    }

    /// Index that is never written to disk.
    pub fn in_memory(embedder: E) -> Self {
        let snapshot = Snapshot {
            dimensions: embedder.dimensions(),
            ..Snapshot::default()
        };
        Self {
            file: None,
            embedder,
            state: RwLock::new(snapshot),
        }
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn persist(&self, snapshot: &Snapshot) -> Result<(), IndexError> {
        let Some(file) = &self.file else {
            return Ok(());
        };

        let staging = file.with_extension("json.tmp");
        tokio::fs::write(&staging, serde_json::to_vec(snapshot)?).await?;
        tokio::fs::rename(&staging, file).await?;
        debug!(path = %file.display(), records = snapshot.entries.len(), "persisted local chunk index");
        Ok(())
    }
}

#[async_trait]
impl<E: Embedder> ChunkIndex for LocalIndex<E> {
    async fn add(&self, records: &[ChunkRecord]) -> Result<(), IndexError> {
        if records.is_empty() {
            return Ok(());
        }

        let texts = records
            .iter()
            .map(|record| record.text.clone())
            .collect::<Vec<_>>();
        let vectors = self.embedder.embed(&texts).await?;
        if vectors.len() != records.len() {
            return Err(IndexError::Embedding(format!(
                "embedding count {} doesn't match record count {}",
                vectors.len(),
                records.len()
            )));
        }

        let mut state = self.state.write().await;
        if let Some(vector) = vectors.iter().find(|vector| vector.len() != state.dimensions) {
            return Err(IndexError::Request(format!(
                "embedding dimension {} != {}",
                vector.len(),
                state.dimensions
            )));
        }

        for (record, vector) in records.iter().zip(vectors) {
            state.upsert(StoredEntry {
                record: record.clone(),
                vector,
            });
        }

        self.persist(&state).await
    }

    async fn query(
        &self,
        text: &str,
        document_ids: Option<&[String]>,
        limit: usize,
    ) -> Result<Vec<ScoredChunk>, IndexError> {
        let query_vector = self
            .embedder
            .embed(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| IndexError::Embedding("no embedding returned for query".to_string()))?;

        let allowed: Option<HashSet<&str>> =
            document_ids.map(|ids| ids.iter().map(String::as_str).collect());

        let state = self.state.read().await;
        let mut scored = state
            .entries
            .iter()
            .filter(|entry| {
                allowed
                    .as_ref()
                    .map_or(true, |ids| ids.contains(entry.record.metadata.document_id.as_str()))
            })
            .map(|entry| ScoredChunk {
                record: entry.record.clone(),
                score: cosine_sim(&query_vector, &entry.vector),
            })
            .collect::<Vec<_>>();

        scored.sort_by(|left, right| right.score.total_cmp(&left.score));
        scored.truncate(limit);
        Ok(scored)
    }

    async fn get(&self, document_ids: &[String]) -> Result<Vec<ChunkRecord>, IndexError> {
        let allowed: HashSet<&str> = document_ids.iter().map(String::as_str).collect();
        let state = self.state.read().await;
        Ok(state
            .entries
            .iter()
            .filter(|entry| allowed.contains(entry.record.metadata.document_id.as_str()))
            .map(|entry| entry.record.clone())
            .collect())
    }
}

fn cosine_sim(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if mag_a < f32::EPSILON || mag_b < f32::EPSILON {
        0.0
    } else {
        dot / (mag_a * mag_b)
    }
}
