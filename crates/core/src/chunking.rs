use crate::error::IngestError;
use crate::models::IngestionOptions;

/// Separators tried in order: paragraph, line, word, then raw characters.
pub const DEFAULT_SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl From<IngestionOptions> for ChunkingConfig {
    fn from(value: IngestionOptions) -> Self {
        Self {
            chunk_size: value.chunk_size,
            chunk_overlap: value.chunk_overlap,
        }
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        IngestionOptions::default().into()
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<(), IngestError> {
        if self.chunk_size == 0 {
            return Err(IngestError::InvalidInput(
                "chunk size must be greater than zero".to_string(),
            ));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(IngestError::InvalidInput(format!(
                "chunk overlap {} must be smaller than chunk size {}",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }

    /// Splits `text` into overlapping chunks of at most `chunk_size` characters.
    ///
    /// The largest structural unit that fits is preferred; units that are too
    /// long are re-split with the next separator. Adjacent chunks share up to
    /// `chunk_overlap` characters. Output is deterministic and never contains
    /// empty strings.
    pub fn split(&self, text: &str) -> Result<Vec<String>, IngestError> {
        self.validate()?;
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.split_recursive(text, &DEFAULT_SEPARATORS))
    }

    fn split_recursive(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let mut separator = separators.last().copied().unwrap_or("");
        let mut remaining: &[&str] = &[];
        for (position, candidate) in separators.iter().copied().enumerate() {
            if candidate.is_empty() {
                separator = candidate;
                break;
            }
            if text.contains(candidate) {
                separator = candidate;
                remaining = &separators[position + 1..];
                break;
            }
        }

        let mut chunks = Vec::new();
        let mut fitting = Vec::new();
        for piece in split_keeping_separator(text, separator) {
            if char_len(&piece) < self.chunk_size {
                fitting.push(piece);
                continue;
            }

            if !fitting.is_empty() {
                chunks.extend(self.merge(&fitting));
                fitting.clear();
            }

            if remaining.is_empty() {
                if !piece.trim().is_empty() {
                    chunks.push(piece);
                }
            } else {
                chunks.extend(self.split_recursive(&piece, remaining));
            }
        }

        if !fitting.is_empty() {
            chunks.extend(self.merge(&fitting));
        }

        chunks
    }

    /// Greedily packs pieces into chunks, carrying a tail of at most
    /// `chunk_overlap` characters into the next chunk.
    fn merge(&self, pieces: &[String]) -> Vec<String> {
        let mut merged = Vec::new();
        let mut window: Vec<&str> = Vec::new();
        let mut total = 0usize;

        for piece in pieces {
            let length = char_len(piece);
            if total + length > self.chunk_size && !window.is_empty() {
                push_trimmed(&mut merged, &window.concat());

                while total > self.chunk_overlap
                    || (total + length > self.chunk_size && total > 0)
                {
                    let dropped = window.remove(0);
                    total -= char_len(dropped);
                }
            }

            window.push(piece);
            total += length;
        }

        push_trimmed(&mut merged, &window.concat());
        merged
    }
}

/// Convenience wrapper over [`ChunkingConfig::split`].
pub fn chunk_text(
    text: &str,
    chunk_size: usize,
    chunk_overlap: usize,
) -> Result<Vec<String>, IngestError> {
    ChunkingConfig {
        chunk_size,
        chunk_overlap,
    }
    .split(text)
}

fn split_keeping_separator(text: &str, separator: &str) -> Vec<String> {
    if separator.is_empty() {
        return text.chars().map(String::from).collect();
    }

    let mut pieces = Vec::new();
    for (position, part) in text.split(separator).enumerate() {
        let piece = if position == 0 {
            part.to_string()
        } else {
            format!("{separator}{part}")
        };
        if !piece.is_empty() {
            pieces.push(piece);
        }
    }
    pieces
}

fn push_trimmed(target: &mut Vec<String>, candidate: &str) {
    let trimmed = candidate.trim();
    if !trimmed.is_empty() {
        target.push(trimmed.to_string());
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}
