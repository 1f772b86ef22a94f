pub mod chunking;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod ingest;
pub mod models;
pub mod retrieval;
pub mod speech;
pub mod store;
pub mod stores;
pub mod traits;

#[cfg(test)]
mod test_support;

pub use chunking::{chunk_text, ChunkingConfig, DEFAULT_SEPARATORS};
pub use embeddings::{
    CharacterNgramEmbedder, Embedder, OpenAiEmbedder, DEFAULT_EMBEDDING_DIMENSIONS,
    DEFAULT_OPENAI_MODEL,
};
pub use error::{IndexError, IngestError, RetrievalError, SpeechError};
pub use extractor::{
    extract_text, extract_text_blocking, LopdfExtractor, PageText, PdfExtractor, PdfSource};
pub use ingest::{discover_pdf_files, FolderIngestionReport, IngestionPipeline, SkippedPdf};
pub use models::{
    chunk_key, ChunkMetadata, ChunkRecord, Document, IngestionOptions, IngestionOutcome,
    QueryResult, ScoredChunk, StoreOutcome, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE,
    MIN_DOCUMENT_CHARS, UNKNOWN_SOURCE,
};
pub use retrieval::{RetrievalFacade, DEFAULT_N_RESULTS};
pub use speech::{
    available_voices, segment_filename, ElevenLabsClient, SegmentRenderer, Speaker,
    SpeechSynthesizer, DEFAULT_SPEECH_MODEL,
};
pub use store::ChunkStore;
pub use stores::{LocalIndex, QdrantIndex};
pub use traits::ChunkIndex;
