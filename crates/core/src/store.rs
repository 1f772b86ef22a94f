use crate::models::{chunk_key, source_name_or_unknown, utc_timestamp};
use crate::traits::ChunkIndex;
use crate::{ChunkMetadata, ChunkRecord, IndexError, QueryResult, StoreOutcome};
use chrono::Utc;
use tracing::{error, info, warn};

/// Chunk persistence over an injected similarity index.
///
/// Insert failures are normalized into [`StoreOutcome::Failed`]; provider
/// errors never escape the insert path.
pub struct ChunkStore<I: ChunkIndex> {
    index: I,
}

impl<I: ChunkIndex> ChunkStore<I> {
    pub fn new(index: I) -> Self {
        Self { index }
    }

    pub fn index(&self) -> &I {
        &self.index
    }

    pub fn into_index(self) -> I {
        self.index
    }

    /// Stores `chunks` for one document as a single batch.
    ///
    /// Chunk indices follow sequence order. Empty strings are skipped without
    /// leaving gaps in the index sequence. A batch with nothing to store
    /// succeeds before the document id is checked.
    pub async fn insert(
        &self,
        document_id: &str,
        chunks: &[String],
        source_name: Option<&str>,
    ) -> StoreOutcome {
        let source = source_name_or_unknown(source_name);
        let created_at = utc_timestamp(Utc::now());
        let records = chunks
            .iter()
            .filter(|chunk| !chunk.trim().is_empty())
            .enumerate()
            .map(|(position, text)| {
                let chunk_index = position as u64;
                ChunkRecord {
                    id: chunk_key(document_id, chunk_index),
                    text: text.clone(),
                    metadata: ChunkMetadata {
                        document_id: document_id.to_string(),
                        chunk_index,
                        source: source.clone(),
                        created_at: created_at.clone(),
                    },
                }
            })
            .collect::<Vec<_>>();

        if records.is_empty() {
            warn!(document_id, "no chunks to store");
            return StoreOutcome::Success { chunks_stored: 0 };
        }

        if document_id.trim().is_empty() {
            error!("refusing to store chunks without a document id");
            return StoreOutcome::Failed {
                error: "document id must not be empty".to_string(),
            };
        }

        match self.index.add(&records).await {
            Ok(()) => {
                info!(
                    document_id,
                    source = %source,
                    chunk_count = records.len(),
                    "stored document chunks"
                );
                StoreOutcome::Success {
                    chunks_stored: records.len(),
                }
            }
            Err(index_error) => {
                error!(document_id, error = %index_error, "failed to store document chunks");
                StoreOutcome::Failed {
                    error: index_error.to_string(),
                }
            }
        }
    }

    /// Similarity search. An absent or empty `document_ids` searches every
    /// document; otherwise the index restricts the search to those documents.
    pub async fn query(
        &self,
        query_text: &str,
        document_ids: Option<&[String]>,
        n_results: usize,
    ) -> Result<QueryResult, IndexError> {
        let scope = document_ids.filter(|ids| !ids.is_empty());
        let hits = self.index.query(query_text, scope, n_results).await?;
        Ok(hits.into_iter().collect())
    }

    /// Every stored chunk text of the given documents, unranked.
    pub async fn get_all(&self, document_ids: &[String]) -> Result<Vec<String>, IndexError> {
        if document_ids.is_empty() {
            return Ok(Vec::new());
        }

        let records = self.index.get(document_ids).await?;
        Ok(records.into_iter().map(|record| record.text).collect())
    }
}
