//! Two-voice podcast segment rendering.
//!
//! Text is validated locally, sent to a [`SpeechSynthesizer`], and the
//! returned audio is written to `segment_{n}_{speaker}.mp3` under the output
//! directory, which is created on demand.

use crate::SpeechError;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::ffi::OsStr;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{error, info};

pub const HOST_VOICE_ID: &str = "21m00Tcm4TlvDq8ikWAM";
pub const GUEST_VOICE_ID: &str = "EXAVITQu4vr4xnSDxMaL";
pub const DEFAULT_SPEECH_MODEL: &str = "eleven_turbo_v2";
pub const DEFAULT_ELEVENLABS_BASE_URL: &str = "https://api.elevenlabs.io";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Speaker {
    Host,
    Guest,
}

impl Speaker {
    pub const ALL: [Speaker; 2] = [Speaker::Host, Speaker::Guest];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Host => "host",
            Self::Guest => "guest",
        }
    }

    pub fn voice_id(self) -> &'static str {
        match self {
            Self::Host => HOST_VOICE_ID,
            Self::Guest => GUEST_VOICE_ID,
        }
    }
}

impl fmt::Display for Speaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Speaker {
    type Err = SpeechError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "host" => Ok(Self::Host),
            "guest" => Ok(Self::Guest),
            other => Err(SpeechError::UnknownSpeaker(other.to_string())),
        }
    }
}

/// Configured voice per speaker role.
pub fn available_voices() -> Vec<(Speaker, &'static str)> {
    Speaker::ALL
        .iter()
        .map(|speaker| (*speaker, speaker.voice_id()))
        .collect()
}

pub fn segment_filename(segment_number: u32, speaker: Speaker) -> String {
    format!("segment_{segment_number}_{speaker}.mp3")
}

#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Returns encoded audio for `text` spoken by `voice_id`.
    async fn synthesize(&self, text: &str, voice_id: &str) -> Result<Vec<u8>, SpeechError>;
}

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    text: &'a str,
    model_id: &'a str,
}

pub struct ElevenLabsClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl ElevenLabsClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: DEFAULT_ELEVENLABS_BASE_URL.to_string(),
            api_key: api_key.into(),
            model: DEFAULT_SPEECH_MODEL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

#[async_trait]
impl SpeechSynthesizer for ElevenLabsClient {
    async fn synthesize(&self, text: &str, voice_id: &str) -> Result<Vec<u8>, SpeechError> {
        let response = self
            .client
            .post(format!("{}/v1/text-to-speech/{}", self.base_url, voice_id))
            .header("xi-api-key", &self.api_key)
            .header("accept", "audio/mpeg")
            .json(&SpeechRequest {
                text,
                model_id: &self.model,
            })
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let details = response.text().await.unwrap_or_default();
            return Err(SpeechError::RateLimited(details));
        }
        if !status.is_success() {
            let details = response.text().await.unwrap_or_default();
            return Err(SpeechError::Api {
                status: status.as_u16(),
                details,
            });
        }

        Ok(response.bytes().await?.to_vec())
    }
}

pub struct SegmentRenderer<S: SpeechSynthesizer> {
    synthesizer: S,
    output_dir: PathBuf,
}

impl<S: SpeechSynthesizer> SegmentRenderer<S> {
    pub fn new(synthesizer: S, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            synthesizer,
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Synthesizes `text` with `voice_id` and writes it to `output_filename`
    /// inside the output directory.
    pub async fn generate_speech(
        &self,
        text: &str,
        voice_id: &str,
        output_filename: &str,
    ) -> Result<PathBuf, SpeechError> {
        if text.trim().is_empty() {
            return Err(SpeechError::InvalidInput("text cannot be empty".to_string()));
        }
        if voice_id.trim().is_empty() {
            return Err(SpeechError::InvalidInput("voice id is required".to_string()));
        }
        if output_filename.trim().is_empty() {
            return Err(SpeechError::InvalidInput(
                "output filename is required".to_string(),
            ));
        }
        if Path::new(output_filename).file_name() != Some(OsStr::new(output_filename)) {
            return Err(SpeechError::InvalidInput(format!(
                "output filename must be a bare file name: {output_filename}"
            )));
        }

        info!(chars = text.chars().count(), voice_id, "generating speech");
        let audio = self
            .synthesizer
            .synthesize(text, voice_id)
            .await
            .map_err(|synth_error| {
                error!(voice_id, error = %synth_error, "speech generation failed");
                synth_error
            })?;

        tokio::fs::create_dir_all(&self.output_dir).await?;
        let output_path = self.output_dir.join(output_filename);
        tokio::fs::write(&output_path, audio).await?;

        info!(path = %output_path.display(), "audio saved");
        Ok(output_path)
    }

    pub async fn render_segment(
        &self,
        text: &str,
        speaker: Speaker,
        segment_number: u32,
    ) -> Result<PathBuf, SpeechError> {
        self.generate_speech(
            text,
            speaker.voice_id(),
            &segment_filename(segment_number, speaker),
        )
        .await
    }
}
