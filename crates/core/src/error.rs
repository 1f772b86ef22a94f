use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("pdf parse error: {0}")]
    PdfParse(String),

    #[error("document {document_id} is too short or empty ({chars} characters extracted)")]
    DocumentTooShort { document_id: String, chars: usize },

    #[error("failed to store document chunks for {document_id}: {message}")]
    StorageFailure { document_id: String, message: String },

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("index request failed: {0}")]
    Request(String),

    #[error("embedding failed: {0}")]
    Embedding(String),
}

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Index(#[from] IndexError),
}

#[derive(Debug, Error)]
pub enum SpeechError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("speaker must be 'host' or 'guest', got: {0}")]
    UnknownSpeaker(String),

    #[error("rate limit exceeded, wait before making more requests: {0}")]
    RateLimited(String),

    #[error("speech api returned {status}: {details}")]
    Api { status: u16, details: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
