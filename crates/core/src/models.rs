use crate::chunking::ChunkingConfig;
use crate::error::IngestError;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CHUNK_SIZE: usize = 1_000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;
pub const MIN_DOCUMENT_CHARS: usize = 100;
pub const UNKNOWN_SOURCE: &str = "unknown";

/// One uploaded PDF. Never mutated once its chunks are stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub document_id: String,
    pub source_name: String,
}

impl Document {
    /// Builds a document, generating a v4 UUID when the caller supplies no id.
    pub fn new(document_id: Option<String>, source_name: Option<String>) -> Self {
        let document_id = document_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        Self {
            document_id,
            source_name: source_name_or_unknown(source_name.as_deref()),
        }
    }
}

pub fn source_name_or_unknown(source_name: Option<&str>) -> String {
    source_name
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or(UNKNOWN_SOURCE)
        .to_string()
}

/// Composite identity of a stored chunk. Must be unique within an index.
pub fn chunk_key(document_id: &str, chunk_index: u64) -> String {
    format!("{document_id}_chunk_{chunk_index}")
}

/// UTC ISO-8601 timestamp with a `Z` suffix.
pub fn utc_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub document_id: String,
    pub chunk_index: u64,
    pub source: String,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub id: String,
    pub text: String,
    pub metadata: ChunkMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub record: ChunkRecord,
    pub score: f32,
}

/// Result of one insert batch. Serializes as
/// `{"status", "chunks_stored", "error"?}`; a failure always reports zero
/// stored chunks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "OutcomeWire", try_from = "OutcomeWire")]
pub enum StoreOutcome {
    Success { chunks_stored: usize },
    Failed { error: String },
}

#[derive(Serialize, Deserialize)]
struct OutcomeWire {
    status: String,
    chunks_stored: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl From<StoreOutcome> for OutcomeWire {
    fn from(value: StoreOutcome) -> Self {
        let status = value.status().to_string();
        match value {
            StoreOutcome::Success { chunks_stored } => Self {
                status,
                chunks_stored,
                error: None,
            },
            StoreOutcome::Failed { error } => Self {
                status,
                chunks_stored: 0,
                error: Some(error),
            },
        }
    }
}

impl TryFrom<OutcomeWire> for StoreOutcome {
    type Error = String;

    fn try_from(value: OutcomeWire) -> Result<Self, Self::Error> {
        match value.status.as_str() {
            "success" => Ok(Self::Success {
                chunks_stored: value.chunks_stored,
            }),
            "failed" => Ok(Self::Failed {
                error: value.error.unwrap_or_default(),
            }),
            other => Err(format!("unknown store outcome status: {other}")),
        }
    }
}

impl StoreOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn chunks_stored(&self) -> usize {
        match self {
            Self::Success { chunks_stored } => *chunks_stored,
            Self::Failed { .. } => 0,
        }
    }

    pub fn status(&self) -> &'static str {
        match self {
            Self::Success { .. } => "success",
            Self::Failed { .. } => "failed",
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Success { .. } => None,
            Self::Failed { error } => Some(error),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestionOutcome {
    pub document_id: String,
    pub source_name: String,
    pub chunks_count: usize,
}

impl IngestionOutcome {
    pub fn status(&self) -> &'static str {
        "success"
    }
}

/// Similarity query result; the three sequences are parallel and ordered by
/// descending similarity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub chunks: Vec<String>,
    pub ids: Vec<String>,
    pub metadatas: Vec<ChunkMetadata>,
}

impl QueryResult {
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

impl FromIterator<ScoredChunk> for QueryResult {
    fn from_iter<T: IntoIterator<Item = ScoredChunk>>(iter: T) -> Self {
        let mut result = QueryResult::default();
        for hit in iter {
            result.chunks.push(hit.record.text);
            result.ids.push(hit.record.id);
            result.metadatas.push(hit.record.metadata);
        }
        result
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestionOptions {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub min_document_chars: usize,
}

impl Default for IngestionOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            min_document_chars: MIN_DOCUMENT_CHARS,
        }
    }
}

impl IngestionOptions {
    pub fn validate(&self) -> Result<(), IngestError> {
        ChunkingConfig::from(*self).validate()
    }
}
