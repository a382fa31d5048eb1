use std::path::Path;

use thiserror::Error;

use super::recognition_model::RecognitionModel;
use super::speaker_reference::EncodedSpeaker;
use crate::transcript::domain::codec_error::CodecError;

/// One audio file submitted to the recognition service.
#[derive(Debug, Clone, Copy)]
pub struct RecognitionRequest<'a> {
    pub audio_path: &'a Path,
    pub model: RecognitionModel,
    pub prompt: Option<&'a str>,
    pub speakers: &'a [EncodedSpeaker],
}

impl<'a> RecognitionRequest<'a> {
    pub fn new(audio_path: &'a Path, model: RecognitionModel) -> Self {
        Self {
            audio_path,
            model,
            prompt: None,
            speakers: &[],
        }
    }

    pub fn with_prompt(mut self, prompt: Option<&'a str>) -> Self {
        self.prompt = prompt;
        self
    }

    pub fn with_speakers(mut self, speakers: &'a [EncodedSpeaker]) -> Self {
        self.speakers = speakers;
        self
    }
}

#[derive(Error, Debug)]
pub enum RecognitionError {
    #[error("recognition request timed out")]
    Timeout,
    #[error("network error: {0}")]
    Network(String),
    #[error("rate limited by recognition service: {0}")]
    RateLimited(String),
    #[error("recognition service error {status}: {body}")]
    Server { status: u16, body: String },
    #[error("recognition request rejected {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("could not read audio: {0}")]
    Io(#[from] std::io::Error),
    #[error("unreadable recognition response: {0}")]
    InvalidResponse(#[from] CodecError),
}

impl RecognitionError {
    /// Whether another attempt might succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            RecognitionError::Timeout
                | RecognitionError::Network(_)
                | RecognitionError::RateLimited(_)
                | RecognitionError::Server { .. }
        )
    }
}

/// Domain interface for the remote speech-to-text service.
///
/// Returns the raw response body; shaping it into captions is the caller's
/// concern since it depends on the model and segment duration.
pub trait SpeechRecognizer: Send + Sync {
    fn recognize(&self, request: &RecognitionRequest<'_>) -> Result<String, RecognitionError>;
}
