use crate::{ChunkRecord, IndexError, ScoredChunk};
use async_trait::async_trait;
use std::sync::Arc;

/// Embedding-backed similarity index holding chunk records.
///
/// Implementations compute embeddings themselves on `add` and `query`.
/// Records whose id already exists are overwritten.
#[async_trait]
pub trait ChunkIndex: Send + Sync {
    /// Writes all records as one batch.
    async fn add(&self, records: &[ChunkRecord]) -> Result<(), IndexError>;

    /// Returns up to `limit` records ordered by descending similarity to
    /// `text`. When `document_ids` is set, only records of those documents
    /// are considered during the search itself.
    async fn query(
        &self,
        text: &str,
        document_ids: Option<&[String]>,
        limit: usize,
    ) -> Result<Vec<ScoredChunk>, IndexError>;

    /// Returns every record belonging to any of `document_ids`, unranked.
    async fn get(&self, document_ids: &[String]) -> Result<Vec<ChunkRecord>, IndexError>;
}

#[async_trait]
impl<T: ChunkIndex + ?Sized> ChunkIndex for Box<T> {
    async fn add(&self, records: &[ChunkRecord]) -> Result<(), IndexError> {
        (**self).add(records).await
    }

    async fn query(
        &self,
        text: &str,
        document_ids: Option<&[String]>,
        limit: usize,
    ) -> Result<Vec<ScoredChunk>, IndexError> {
        (**self).query(text, document_ids, limit).await
    }

    async fn get(&self, document_ids: &[String]) -> Result<Vec<ChunkRecord>, IndexError> {
        (**self).get(document_ids).await
    }
}

#[async_trait]
impl<T: ChunkIndex + ?Sized> ChunkIndex for Arc<T> {
    async fn add(&self, records: &[ChunkRecord]) -> Result<(), IndexError> {
        (**self).add(records).await
    }

    async fn query(
        &self,
        text: &str,
        document_ids: Option<&[String]>,
        limit: usize,
    ) -> Result<Vec<ScoredChunk>, IndexError> {
        (**self).query(text, document_ids, limit).await
    }

    async fn get(&self, document_ids: &[String]) -> Result<Vec<ChunkRecord>, IndexError> {
        (**self).get(document_ids).await
    }
}
