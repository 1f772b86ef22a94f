use crate::store::ChunkStore;
use crate::traits::ChunkIndex;
use crate::{QueryResult, RetrievalError};
use std::sync::Arc;

pub const DEFAULT_N_RESULTS: usize = 5;

/// Read-only seam over the chunk store for transport and narration code.
pub struct RetrievalFacade<I: ChunkIndex> {
    store: Arc<ChunkStore<I>>,
}

impl<I: ChunkIndex> Clone for RetrievalFacade<I> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<I: ChunkIndex> RetrievalFacade<I> {
    pub fn new(store: Arc<ChunkStore<I>>) -> Self {
        Self { store }
    }

    pub async fn search(
        &self,
        query: &str,
        document_ids: Option<&[String]>,
        n_results: usize,
    ) -> Result<QueryResult, RetrievalError> {
        if query.trim().is_empty() {
            return Err(RetrievalError::InvalidInput("query is empty".to_string()));
        }
        if n_results == 0 {
            return Err(RetrievalError::InvalidInput(
                "n_results must be positive".to_string(),
            ));
        }

        Ok(self.store.query(query, document_ids, n_results).await?)
    }

    pub async fn all_chunks(&self, document_ids: &[String]) -> Result<Vec<String>, RetrievalError> {
        Ok(self.store.get_all(document_ids).await?)
    }
}
