use crate::chunking::ChunkingConfig;
use crate::extractor::{extract_text_blocking, LopdfExtractor, PdfExtractor, PdfSource};
use crate::store::ChunkStore;
use crate::traits::ChunkIndex;
use crate::{Document, IngestError, IngestionOptions, IngestionOutcome, StoreOutcome};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};
use walkdir::WalkDir;

pub fn discover_pdf_files(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let is_pdf = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

        if is_pdf {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

pub struct SkippedPdf {
    pub path: PathBuf,
    pub reason: String,
}

pub struct FolderIngestionReport {
    pub ingested: Vec<IngestionOutcome>,
    pub skipped_files: Vec<SkippedPdf>,
}

/// Runs one document through extract, length check, chunk, and store.
///
/// The only caller of the extractor, the chunker, and the store's insert
/// path. Extraction runs on the blocking pool. A store failure aborts the
/// call but does not undo writes that already landed.
pub struct IngestionPipeline<I: ChunkIndex, X: PdfExtractor = LopdfExtractor> {
    store: ChunkStore<I>,
    extractor: Arc<X>,
    options: IngestionOptions,
}

impl<I: ChunkIndex> IngestionPipeline<I, LopdfExtractor> {
    pub fn new(store: ChunkStore<I>, options: IngestionOptions) -> Result<Self, IngestError> {
        Self::with_extractor(store, LopdfExtractor, options)
    }
}

impl<I: ChunkIndex, X: PdfExtractor + 'static> IngestionPipeline<I, X> {
    pub fn with_extractor(
        store: ChunkStore<I>,
        extractor: X,
        options: IngestionOptions,
    ) -> Result<Self, IngestError> {
        options.validate()?;
        Ok(Self {
            store,
            extractor: Arc::new(extractor),
            options,
        })
    }

    pub fn store(&self) -> &ChunkStore<I> {
        &self.store
    }

    pub fn extractor(&self) -> &X {
        &self.extractor
    }

    pub fn options(&self) -> IngestionOptions {
        self.options
    }

    pub async fn ingest(
        &self,
        document_id: &str,
        source: &PdfSource,
    ) -> Result<IngestionOutcome, IngestError> {
        let document = Document::new(Some(document_id.to_string()), source.source_name());
        self.ingest_document(&document, source).await
    }

    pub async fn ingest_document(
        &self,
        document: &Document,
        source: &PdfSource,
    ) -> Result<IngestionOutcome, IngestError> {
        let document_id = document.document_id.as_str();
        info!(document_id, source = %document.source_name, "processing document");

        let text = extract_text_blocking(Arc::clone(&self.extractor), source.clone()).await;
        let chars = text.chars().count();
        if chars < self.options.min_document_chars {
            error!(document_id, chars, "document is too short or empty");
            return Err(IngestError::DocumentTooShort {
                document_id: document_id.to_string(),
                chars,
            });
        }
        info!(document_id, chars, "extracted document text");

        let chunks = ChunkingConfig::from(self.options).split(&text)?;
        info!(document_id, chunk_count = chunks.len(), "chunked document");

        match self
            .store
            .insert(document_id, &chunks, Some(&document.source_name))
            .await
        {
            StoreOutcome::Success { chunks_stored } => {
                info!(document_id, chunks_stored, "document ingested");
                Ok(IngestionOutcome {
                    document_id: document_id.to_string(),
                    source_name: document.source_name.clone(),
                    chunks_count: chunks_stored,
                })
            }
            StoreOutcome::Failed { error: message } => {
                error!(document_id, error = %message, "failed to store document chunks");
                Err(IngestError::StorageFailure {
                    document_id: document_id.to_string(),
                    message,
                })
            }
        }
    }

    /// Ingests every PDF under `folder` with a freshly generated id per file.
    /// A failing file is reported and skipped; it never aborts the batch.
    pub async fn ingest_folder(&self, folder: &Path) -> Result<FolderIngestionReport, IngestError> {
        let files = discover_pdf_files(folder);

        if files.is_empty() {
            return Err(IngestError::InvalidInput(format!(
                "no pdf files found in {}",
                folder.display()
            )));
        }

        let mut ingested = Vec::new();
        let mut skipped_files = Vec::new();

        for path in files {
            let source = PdfSource::Path(path.clone());
            let document = Document::new(None, source.source_name());
            match self.ingest_document(&document, &source).await {
                Ok(outcome) => ingested.push(outcome),
                Err(error) => {
                    warn!(path = %path.display(), reason = %error, "skipped pdf");
                    skipped_files.push(SkippedPdf {
                        path,
                        reason: error.to_string(),
                    });
                }
            }
        }

        Ok(FolderIngestionReport {
            ingested,
            skipped_files,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::CharacterNgramEmbedder;
    use crate::extractor::PageText;
    use crate::store::tests::RecordingIndex;
    use crate::stores::LocalIndex;
    use crate::test_support::sample_pdf;
    use std::fs::{self, File};
    use std::io::Write;
    use std::sync::atomic::Ordering;
    use std::sync::Mutex;
    use std::thread::{self, ThreadId};
    use tempfile::tempdir;

    struct FixedText(String);

    impl PdfExtractor for FixedText {
        fn extract_pages(&self, _source: &PdfSource) -> Result<Vec<PageText>, IngestError> {
            Ok(vec![PageText {
                number: 1,
                text: self.0.clone(),
            }])
        }
    }

    fn upload() -> PdfSource {
        PdfSource::Bytes(b"%PDF-1.4".to_vec())
    }

    const LECTURE_LINES: [&str; 9] = [
        "Machine Learning Fundamentals",
        "Machine learning is a subset of artificial intelligence that",
        "enables computers to learn from data without being explicitly",
        "programmed. It uses algorithms to identify patterns in data",
        "and make predictions or decisions based on those patterns.",
        "Neural networks are computational models inspired by the",
        "structure and function of biological neural networks in the",
        "human brain. They consist of interconnected nodes (neurons)",
        "that process and transmit information.",
    ];

    #[test]
    fn discover_pdf_files_is_recursive() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let base = dir.path();
        let nested = base.join("nested");
        fs::create_dir(&nested)?;

        File::create(base.join("a.pdf")).and_then(|mut file| file.write_all(b"%PDF-1.4\n%fake"))?;
        File::create(nested.join("b.PDF"))
            .and_then(|mut file| file.write_all(b"%PDF-1.4\n%fake"))?;
        File::create(base.join("notes.txt"))?;

        let files = discover_pdf_files(base);
        assert_eq!(files.len(), 2);
        Ok(())
    }

    #[test]
    fn invalid_options_are_rejected() {
        let options = IngestionOptions {
            chunk_size: 50,
            chunk_overlap: 60,
            ..IngestionOptions::default()
        };
        let result = IngestionPipeline::new(ChunkStore::new(RecordingIndex::default()), options);
        assert!(matches!(result, Err(IngestError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn short_documents_fail_before_any_store_write() {
        let pipeline = IngestionPipeline::with_extractor(
            ChunkStore::new(RecordingIndex::default()),
            FixedText("too short".to_string()),
            IngestionOptions::default(),
        )
        .expect("valid options");

        let error = pipeline
            .ingest("doc-short", &upload())
            .await
            .expect_err("short text must be rejected");

        assert!(matches!(error, IngestError::DocumentTooShort { chars: 9, .. }));
        assert_eq!(pipeline.store().index().add_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unreadable_pdf_is_too_short() {
        let pipeline = IngestionPipeline::new(
            ChunkStore::new(RecordingIndex::default()),
            IngestionOptions::default(),
        )
        .expect("valid options");

        let error = pipeline
            .ingest("doc-broken", &PdfSource::Bytes(b"%PDF-1.4\n%broken".to_vec()))
            .await
            .expect_err("unreadable pdf must be rejected");

        assert!(matches!(error, IngestError::DocumentTooShort { chars: 0, .. }));
    }

    #[tokio::test]
    async fn storage_failure_aborts_ingestion() {
        let pipeline = IngestionPipeline::with_extractor(
            ChunkStore::new(RecordingIndex::failing("Simulated storage failure")),
            FixedText("x ".repeat(150)),
            IngestionOptions::default(),
        )
        .expect("valid options");

        let error = pipeline
            .ingest("doc-fail", &upload())
            .await
            .expect_err("storage failure must surface");

        match error {
            IngestError::StorageFailure {
                document_id,
                message,
            } => {
                assert_eq!(document_id, "doc-fail");
                assert!(message.contains("Simulated storage failure"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    struct ThreadRecordingExtractor {
        seen: Mutex<Option<ThreadId>>,
    }

    impl PdfExtractor for ThreadRecordingExtractor {
        fn extract_pages(&self, _source: &PdfSource) -> Result<Vec<PageText>, IngestError> {
            *self.seen.lock().expect("thread lock") = Some(thread::current().id());
            Ok(vec![PageText {
                number: 1,
                text: "word ".repeat(60),
            }])
        }
    }

    #[tokio::test]
    async fn extraction_runs_off_the_async_worker() {
        let pipeline = IngestionPipeline::with_extractor(
            ChunkStore::new(RecordingIndex::default()),
            ThreadRecordingExtractor {
                seen: Mutex::new(None),
            },
            IngestionOptions::default(),
        )
        .expect("valid options");

        pipeline
            .ingest("doc-thread", &upload())
            .await
            .expect("ingestion should succeed");

        let seen = *pipeline.extractor().seen.lock().expect("thread lock");
        assert!(seen.is_some());
        assert_ne!(seen, Some(thread::current().id()));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_ingests_with_distinct_ids_all_land() -> Result<(), Box<dyn std::error::Error>>
    {
        let dir = tempdir()?;
        let index = LocalIndex::open(dir.path(), CharacterNgramEmbedder::default()).await?;
        let pipeline = Arc::new(IngestionPipeline::with_extractor(
            ChunkStore::new(index),
            FixedText("concurrent upload text ".repeat(10)),
            IngestionOptions::default(),
        )?);

        let mut handles = Vec::new();
        for upload_no in 0..8 {
            let pipeline = Arc::clone(&pipeline);
            handles.push(tokio::spawn(async move {
                pipeline
                    .ingest(&format!("upload-{upload_no}"), &upload())
                    .await
            }));
        }
        for handle in handles {
            assert_eq!(handle.await??.chunks_count, 1);
        }

        let reopened = LocalIndex::open(dir.path(), CharacterNgramEmbedder::default()).await?;
        assert_eq!(reopened.len().await, 8);
        Ok(())
    }

    #[tokio::test]
    async fn long_text_is_stored_as_several_chunks() {
        let text = (0..400)
            .map(|index| format!("sentence{index}"))
            .collect::<Vec<_>>()
            .join(" ");
        let pipeline = IngestionPipeline::with_extractor(
            ChunkStore::new(RecordingIndex::default()),
            FixedText(text),
            IngestionOptions::default(),
        )
        .expect("valid options");

        let outcome = pipeline
            .ingest("doc-long", &upload())
            .await
            .expect("ingestion should succeed");

        let added = pipeline.store().index().added.lock().expect("lock").clone();
        assert!(outcome.chunks_count > 1);
        assert_eq!(added.len(), outcome.chunks_count);
        for (position, record) in added.iter().enumerate() {
            assert_eq!(record.metadata.chunk_index, position as u64);
            assert!(record.text.chars().count() <= 1_000);
        }
    }

    #[tokio::test]
    async fn generated_pdf_ingests_end_to_end() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("test_e2e.pdf");
        fs::write(&path, sample_pdf(&[&LECTURE_LINES]))?;

        let store = ChunkStore::new(LocalIndex::open(dir.path().join("index"), CharacterNgramEmbedder::default()).await?);
        let pipeline = IngestionPipeline::new(store, IngestionOptions::default())?;

        let outcome = pipeline
            .ingest("test_e2e_doc", &PdfSource::Path(path))
            .await?;
        assert_eq!(outcome.status(), "success");
        assert_eq!(outcome.chunks_count, 1);
        assert_eq!(outcome.source_name, "test_e2e.pdf");

        let scope = vec!["test_e2e_doc".to_string()];
        let result = pipeline
            .store()
            .query("machine learning", Some(&scope), 5)
            .await?;

        assert!(!result.is_empty());
        for metadata in &result.metadatas {
            assert_eq!(metadata.document_id, "test_e2e_doc");
            assert_eq!(metadata.source, "test_e2e.pdf");
            assert_eq!(metadata.chunk_index, 0);
        }
        Ok(())
    }

    #[tokio::test]
    async fn folder_ingestion_skips_bad_files() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        fs::write(dir.path().join("good.pdf"), sample_pdf(&[&LECTURE_LINES]))?;
        fs::write(dir.path().join("unreadable.pdf"), b"%PDF-1.4\n%broken")?;

        let pipeline = IngestionPipeline::new(
            ChunkStore::new(LocalIndex::in_memory(CharacterNgramEmbedder::default())),
            IngestionOptions::default(),
        )?;
        let report = pipeline.ingest_folder(dir.path()).await?;

        assert_eq!(report.ingested.len(), 1);
        assert_eq!(report.ingested[0].source_name, "good.pdf");
        assert_eq!(report.skipped_files.len(), 1);
        assert_eq!(
            report.skipped_files[0]
                .path
                .file_name()
                .and_then(|name| name.to_str()),
            Some("unreadable.pdf")
        );
        Ok(())
    }

    #[tokio::test]
    async fn folder_without_pdfs_is_invalid() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let pipeline = IngestionPipeline::new(
            ChunkStore::new(RecordingIndex::default()),
            IngestionOptions::default(),
        )?;

        let result = pipeline.ingest_folder(dir.path()).await;
        assert!(matches!(result, Err(IngestError::InvalidInput(_))));
        Ok(())
    }
}
