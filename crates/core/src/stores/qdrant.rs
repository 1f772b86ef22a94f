use crate::embeddings::Embedder;
use crate::traits::ChunkIndex;
use crate::{ChunkMetadata, ChunkRecord, IndexError, ScoredChunk};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

const SCROLL_PAGE_SIZE: usize = 256;

pub struct QdrantIndex<E: Embedder> {
    endpoint: String,
    collection: String,
    client: Client,
    embedder: E,
}

#[derive(Debug, Deserialize)]
struct PointPayload {
    chunk_id: String,
    text: String,
    document_id: String,
    chunk_index: u64,
    source: String,
    created_at: String,
}

impl PointPayload {
    fn into_record(self) -> ChunkRecord {
        ChunkRecord {
            id: self.chunk_id,
            text: self.text,
            metadata: ChunkMetadata {
                document_id: self.document_id,
                chunk_index: self.chunk_index,
                source: self.source,
                created_at: self.created_at,
            },
        }
    }
}

impl<E: Embedder> QdrantIndex<E> {
    pub fn new(endpoint: impl Into<String>, collection: impl Into<String>, embedder: E) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            collection: collection.into(),
            client: Client::new(),
            embedder,
        }
    }

    fn collection_url(&self, suffix: &str) -> String {
        format!("{}/collections/{}{}", self.endpoint, self.collection, suffix)
    }

    /// Creates the collection sized for the embedder when it does not exist yet.
    pub async fn ensure_collection(&self) -> Result<(), IndexError> {
        let response = self.client.get(self.collection_url("")).send().await?;

        if response.status().is_success() {
            return Ok(());
        }

        if response.status() != StatusCode::NOT_FOUND {
            return Err(backend_error(response.status()));
        }

        let response = self
            .client
            .put(self.collection_url(""))
            .json(&json!({
                "vectors": {
                    "size": self.embedder.dimensions(),
                    "distance": "Cosine",
                }
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(IndexError::Request(format!(
                "qdrant collection setup failed with {}",
                response.status()
            )));
        }

        info!(collection = %self.collection, dimensions = self.embedder.dimensions(), "created qdrant collection");
        Ok(())
    }
}

/// Qdrant point ids must be integers or UUIDs; derive a stable UUID from the
/// chunk key so re-adding the same key overwrites the same point.
pub fn point_id(chunk_key: &str) -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, chunk_key.as_bytes())
}

pub fn document_filter(document_ids: &[String]) -> Value {
    json!({
        "must": [
            {
                "key": "document_id",
                "match": { "any": document_ids }
            }
        ]
    })
}

fn backend_error(status: StatusCode) -> IndexError {
    IndexError::BackendResponse {
        backend: "qdrant".to_string(),
        details: status.to_string(),
    }
}

fn parse_payload(point: &Value) -> Result<ChunkRecord, IndexError> {
    let payload = point
        .pointer("/payload")
        .cloned()
        .ok_or_else(|| IndexError::BackendResponse {
            backend: "qdrant".to_string(),
            details: "point without payload".to_string(),
        })?;
    Ok(serde_json::from_value::<PointPayload>(payload)?.into_record())
}

#[async_trait]
impl<E: Embedder> ChunkIndex for QdrantIndex<E> {
    async fn add(&self, records: &[ChunkRecord]) -> Result<(), IndexError> {
        if records.is_empty() {
            return Ok(());
        }

        let texts = records
            .iter()
            .map(|record| record.text.clone())
            .collect::<Vec<_>>();
        let embeddings = self.embedder.embed(&texts).await?;

        if records.len() != embeddings.len() {
            return Err(IndexError::Request(format!(
                "embedding count {} doesn't match chunk count {}",
                embeddings.len(),
                records.len()
            )));
        }

        let points = records
            .iter()
            .zip(embeddings.iter())
            .map(|(record, embedding)| {
                json!({
                    "id": point_id(&record.id).to_string(),
                    "vector": embedding,
                    "payload": {
                        "chunk_id": record.id,
                        "text": record.text,
                        "document_id": record.metadata.document_id,
                        "chunk_index": record.metadata.chunk_index,
                        "source": record.metadata.source,
                        "created_at": record.metadata.created_at,
                    },
                })
            })
            .collect::<Vec<_>>();

        let response = self
            .client
            .put(self.collection_url("/points?wait=true"))
            .json(&json!({ "points": points }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(backend_error(response.status()));
        }

        Ok(())
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

        let mut body = json!({
            "vector": query_vector,
            "limit": limit,
            "with_payload": true,
        });
        if let (Some(ids), Some(object)) = (document_ids, body.as_object_mut()) {
            object.insert("filter".to_string(), document_filter(ids));
        }

        let response = self
            .client
            .post(self.collection_url("/points/search"))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(backend_error(response.status()));
        }

        let parsed: Value = response.json().await?;
        let hits = parsed
            .pointer("/result")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        hits.iter()
            .map(|hit| -> Result<ScoredChunk, IndexError> {
                Ok(ScoredChunk {
                    record: parse_payload(hit)?,
                    score: hit.pointer("/score").and_then(Value::as_f64).unwrap_or(0.0) as f32,
                })
            })
            .collect()
    }

    async fn get(&self, document_ids: &[String]) -> Result<Vec<ChunkRecord>, IndexError> {
        let mut records = Vec::new();
        let mut offset = Value::Null;

        loop {
            let response = self
                .client
                .post(self.collection_url("/points/scroll"))
                .json(&json!({
                    "filter": document_filter(document_ids),
                    "limit": SCROLL_PAGE_SIZE,
                    "with_payload": true,
                    "with_vector": false,
                    "offset": offset,
                }))
                .send()
                .await?;

            if !response.status().is_success() {
                return Err(backend_error(response.status()));
            }

            let parsed: Value = response.json().await?;
            if let Some(points) = parsed.pointer("/result/points").and_then(Value::as_array) {
                for point in points {
                    records.push(parse_payload(point)?);
                }
            }

            match parsed.pointer("/result/next_page_offset") {
                Some(next) if !next.is_null() => offset = next.clone(),
                _ => break,
            }
        }

        Ok(records)
    }
}
