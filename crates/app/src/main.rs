use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use pdf_podcast_core::{
    CharacterNgramEmbedder, ChunkIndex, ChunkStore, Document, ElevenLabsClient, Embedder,
    IngestError, IngestionOptions, IngestionPipeline, LocalIndex, OpenAiEmbedder, PdfSource,
    QdrantIndex, RetrievalFacade, SegmentRenderer, Speaker, DEFAULT_OPENAI_MODEL,
    DEFAULT_SPEECH_MODEL,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum IndexBackend {
    /// Single-node index persisted under --index-dir.
    Local,
    /// Remote Qdrant collection.
    Qdrant,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum EmbedderKind {
    /// Offline character n-gram embeddings.
    Ngram,
    /// OpenAI embeddings API (requires OPENAI_API_KEY).
    Openai,
}

#[derive(Parser)]
#[command(name = "pdf-podcast", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Where chunks are indexed.
    #[arg(long, env = "INDEX_BACKEND", value_enum, default_value = "local")]
    index_backend: IndexBackend,

    /// Directory of the local persistent index.
    #[arg(long, env = "INDEX_DIR", default_value = "./chunk_index")]
    index_dir: PathBuf,

    /// Qdrant base URL
    #[arg(long, env = "QDRANT_URL", default_value = "http://localhost:6333")]
    qdrant_url: String,

    /// Qdrant collection
    #[arg(long, env = "QDRANT_COLLECTION", default_value = "document_chunks")]
    qdrant_collection: String,

    /// Embedding provider.
    #[arg(long, env = "EMBEDDER", value_enum, default_value = "ngram")]
    embedder: EmbedderKind,

    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    openai_api_key: Option<String>,

    #[arg(long, env = "EMBEDDING_MODEL", default_value = DEFAULT_OPENAI_MODEL)]
    embedding_model: String,

    /// Maximum characters per chunk.
    #[arg(long, env = "CHUNK_SIZE", default_value = "1000")]
    chunk_size: usize,

    /// Characters shared by adjacent chunks.
    #[arg(long, env = "CHUNK_OVERLAP", default_value = "200")]
    chunk_overlap: usize,

    #[arg(long, env = "ELEVENLABS_API_KEY", hide_env_values = true)]
    elevenlabs_api_key: Option<String>,

    #[arg(long, env = "SPEECH_MODEL", default_value = DEFAULT_SPEECH_MODEL)]
    speech_model: String,

    /// Output directory for rendered audio segments.
    #[arg(long, env = "PODCAST_DIR", default_value = "./podcasts")]
    podcast_dir: PathBuf,
}

#[derive(Subcommand)]
enum Command {
    /// Extract, chunk, and index one PDF.
    Ingest {
        /// PDF to ingest.
        #[arg(long)]
        file: PathBuf,
        /// Document id; a UUID is generated when omitted.
        #[arg(long)]
        document_id: Option<String>,
    },
    /// Ingest every PDF under a folder, each under a fresh document id.
    IngestFolder {
        /// Folder that contains PDFs recursively.
        #[arg(long)]
        folder: PathBuf,
    },
    /// Similarity search over stored chunks.
    Search {
        /// Search query
        #[arg(long)]
        query: String,
        /// Restrict results to these documents (repeatable).
        #[arg(long = "document-id")]
        document_ids: Vec<String>,
        /// Number of chunks to return.
        #[arg(long, default_value = "5")]
        n_results: usize,
    },
    /// Print every stored chunk of the given documents.
    Chunks {
        #[arg(long = "document-id", required = true)]
        document_ids: Vec<String>,
    },
    /// Render one podcast segment to audio.
    Speak {
        #[arg(long)]
        text: String,
        /// host or guest
        #[arg(long)]
        speaker: String,
        #[arg(long)]
        segment: u32,
    },
}

impl Cli {
    fn ingestion_options(&self) -> IngestionOptions {
        IngestionOptions {
            chunk_size: self.chunk_size,
            chunk_overlap: self.chunk_overlap,
            ..IngestionOptions::default()
        }
    }

    fn build_embedder(&self) -> anyhow::Result<Box<dyn Embedder>> {
        match self.embedder {
            EmbedderKind::Ngram => Ok(Box::new(CharacterNgramEmbedder::default())),
            EmbedderKind::Openai => {
                let api_key = self
                    .openai_api_key
                    .clone()
                    .ok_or_else(|| anyhow::anyhow!("OPENAI_API_KEY is required for --embedder openai"))?;
                Ok(Box::new(OpenAiEmbedder::new(api_key, &self.embedding_model)))
            }
        }
    }

    async fn build_index(&self) -> anyhow::Result<Arc<dyn ChunkIndex>> {
        let embedder = self.build_embedder()?;
        match self.index_backend {
            IndexBackend::Local => {
                let index = LocalIndex::open(&self.index_dir, embedder)
                    .await
                    .map_err(|error| anyhow::anyhow!(error.to_string()))?;
                Ok(Arc::new(index))
            }
            IndexBackend::Qdrant => {
                let index = QdrantIndex::new(&self.qdrant_url, &self.qdrant_collection, embedder);
                index
                    .ensure_collection()
                    .await
                    .map_err(|error| anyhow::anyhow!(error.to_string()))?;
                Ok(Arc::new(index))
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        "pdf-podcast boot"
    );

    match &cli.command {
        Command::Ingest { file, document_id } => {
            let index = cli.build_index().await?;
            let pipeline =
                IngestionPipeline::new(ChunkStore::new(index), cli.ingestion_options())
                    .map_err(|error| anyhow::anyhow!(error.to_string()))?;
            ingest_file(&pipeline, file, document_id.clone()).await?;
        }
        Command::IngestFolder { folder } => {
            let index = cli.build_index().await?;
            let pipeline =
                IngestionPipeline::new(ChunkStore::new(index), cli.ingestion_options())
                    .map_err(|error| anyhow::anyhow!(error.to_string()))?;
            let report = pipeline
                .ingest_folder(folder)
                .await
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;

            if !report.skipped_files.is_empty() {
                warn!(
                    "skipped_files={} for folder={}",
                    report.skipped_files.len(),
                    folder.display()
                );
                for skipped in &report.skipped_files {
                    warn!(path = %skipped.path.display(), reason = %skipped.reason, "skipped pdf");
                }
            }

            for outcome in &report.ingested {
                println!(
                    "document_id={} source={} status={} chunks={}",
                    outcome.document_id,
                    outcome.source_name,
                    outcome.status(),
                    outcome.chunks_count
                );
            }
            println!(
                "{} documents ingested, {} skipped at {}",
                report.ingested.len(),
                report.skipped_files.len(),
                Utc::now().to_rfc3339()
            );
        }
        Command::Search {
            query,
            document_ids,
            n_results,
        } => {
            let facade = RetrievalFacade::new(Arc::new(ChunkStore::new(cli.build_index().await?)));
            let scope = (!document_ids.is_empty()).then_some(document_ids.as_slice());
            let result = facade
                .search(query, scope, *n_results)
                .await
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;

            println!("query: {query}");
            if result.is_empty() {
                println!("no matching chunks");
            }
            for ((text, id), metadata) in result
                .chunks
                .iter()
                .zip(result.ids.iter())
                .zip(result.metadatas.iter())
            {
                println!(
                    "[{id}] document_id={} chunk_index={} source={}",
                    metadata.document_id, metadata.chunk_index, metadata.source
                );
                println!("  chunk_text:\n{text}");
            }
        }
        Command::Chunks { document_ids } => {
            let facade = RetrievalFacade::new(Arc::new(ChunkStore::new(cli.build_index().await?)));
            let chunks = facade
                .all_chunks(document_ids)
                .await
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;

            println!("{} chunks", chunks.len());
            for chunk in chunks {
                println!("---\n{chunk}");
            }
        }
        Command::Speak {
            text,
            speaker,
            segment,
        } => {
            let speaker: Speaker = speaker
                .parse()
                .map_err(|error: pdf_podcast_core::SpeechError| anyhow::anyhow!(error.to_string()))?;
            let api_key = cli
                .elevenlabs_api_key
                .clone()
                .ok_or_else(|| anyhow::anyhow!("ELEVENLABS_API_KEY is required to render speech"))?;
            let client = ElevenLabsClient::new(api_key).with_model(&cli.speech_model);
            let renderer = SegmentRenderer::new(client, &cli.podcast_dir);

            let path = renderer
                .render_segment(text, speaker, *segment)
                .await
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;
            println!("{}", path.display());
        }
    }

    Ok(())
}

async fn ingest_file(
    pipeline: &IngestionPipeline<Arc<dyn ChunkIndex>>,
    file: &Path,
    document_id: Option<String>,
) -> anyhow::Result<()> {
    let source = PdfSource::Path(file.to_path_buf());
    let document = Document::new(document_id, source.source_name());

    match pipeline.ingest_document(&document, &source).await {
        Ok(outcome) => {
            println!(
                "document_id={} status={} chunks={}",
                outcome.document_id,
                outcome.status(),
                outcome.chunks_count
            );
            Ok(())
        }
        Err(error @ IngestError::DocumentTooShort { .. }) => {
            Err(anyhow::anyhow!("document rejected: {error}"))
        }
        Err(error @ IngestError::StorageFailure { .. }) => {
            Err(anyhow::anyhow!("storage failed: {error}"))
        }
        Err(error) => Err(anyhow::anyhow!(error.to_string())),
    }
}
