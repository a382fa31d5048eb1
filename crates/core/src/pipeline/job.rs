use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use crate::media::domain::media_transcoder::MediaError;
use crate::planning::domain::chunk_planner::PlanError;
use crate::recognition::domain::recognition_model::RecognitionModel;
use crate::recognition::domain::speaker_reference::SpeakerReference;
use crate::recognition::domain::speech_recognizer::RecognitionError;
use crate::shared::constants::{
    BYTES_PER_MB, MAX_SPEAKER_REFERENCES, MAX_SPEED_MULTIPLIER, MIN_SPEED_MULTIPLIER,
};
use crate::transcript::domain::codec_error::CodecError;

/// One end-to-end transcription request.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptionJob {
    pub source: PathBuf,
    pub model: RecognitionModel,
    pub prompt: Option<String>,
    pub speakers: Vec<SpeakerReference>,
    pub speed: Option<f64>,
    pub compress: bool,
}

impl TranscriptionJob {
    pub fn new(source: impl Into<PathBuf>, model: RecognitionModel) -> Self {
        Self {
            source: source.into(),
            model,
            prompt: None,
            speakers: Vec::new(),
            speed: None,
            compress: false,
        }
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    pub fn with_speakers(mut self, speakers: Vec<SpeakerReference>) -> Self {
        self.speakers = speakers;
        self
    }

    pub fn with_speed(mut self, multiplier: f64) -> Self {
        self.speed = Some(multiplier);
        self
    }

    pub fn with_compression(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    /// Speed multiplier that actually changes the audio, if any.
    pub fn effective_speed(&self) -> Option<f64> {
        self.speed.filter(|m| *m > MIN_SPEED_MULTIPLIER)
    }

    pub fn validate(&self) -> Result<(), JobError> {
        if !self.source.is_file() {
            return Err(JobError::SourceNotFound(self.source.clone()));
        }
        if let Some(m) = self.speed {
            if !m.is_finite() || !(MIN_SPEED_MULTIPLIER..=MAX_SPEED_MULTIPLIER).contains(&m) {
                return Err(JobError::InvalidRequest(format!(
                    "speed multiplier must be between {MIN_SPEED_MULTIPLIER} and \
                     {MAX_SPEED_MULTIPLIER}, got {m}"
                )));
            }
        }
        if self.speakers.len() > MAX_SPEAKER_REFERENCES {
            return Err(JobError::InvalidRequest(format!(
                "at most {MAX_SPEAKER_REFERENCES} speaker references are supported, got {}",
                self.speakers.len()
            )));
        }
        if let Some(s) = self.speakers.iter().find(|s| s.name.trim().is_empty()) {
            return Err(JobError::InvalidRequest(format!(
                "speaker reference {} has an empty name",
                s.path.display()
            )));
        }
        if self.model.is_diarized() {
            if let Some(s) = self.speakers.iter().find(|s| !s.path.is_file()) {
                return Err(JobError::InvalidRequest(format!(
                    "speaker reference for '{}' not found: {}",
                    s.name,
                    s.path.display()
                )));
            }
        }
        Ok(())
    }
}

/// Where a job currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStage {
    Planning,
    Transcoding,
    AdjustingSpeed,
    Compressing,
    Splitting,
    Recognizing,
    Combining,
    Done,
    Failed,
}

impl fmt::Display for JobStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobStage::Planning => "planning",
            JobStage::Transcoding => "transcoding",
            JobStage::AdjustingSpeed => "adjusting speed",
            JobStage::Compressing => "compressing",
            JobStage::Splitting => "splitting",
            JobStage::Recognizing => "recognizing",
            JobStage::Combining => "combining",
            JobStage::Done => "done",
            JobStage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// One time-bounded slice of the prepared audio.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub index: usize,
    pub path: PathBuf,
    pub duration: f64,
}

impl Segment {
    pub fn new(index: usize, path: impl Into<PathBuf>, duration: f64) -> Self {
        Self {
            index,
            path: path.into(),
            duration,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// A recognized segment, already shaped into a caption document.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentResult {
    pub index: usize,
    pub duration: f64,
    pub captions: String,
}

/// A segment whose recognition exhausted its attempts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedSegment {
    pub index: usize,
    pub duration: f64,
}

/// Successful job result as handed back to the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptionOutcome {
    pub text: String,
    pub transcript: String,
    pub chunked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_chunks: Option<usize>,
    pub is_diarized: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_chunks: Option<Vec<FailedSegment>>,
}

#[derive(Error, Debug)]
pub enum JobError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Audio file not found: {}", .0.display())]
    SourceNotFound(PathBuf),
    #[error("This file needs {operation}, which requires ffmpeg. Please install ffmpeg and try again.")]
    ToolUnavailable { operation: &'static str },
    #[error("Audio conversion failed: {0}")]
    Conversion(#[source] MediaError),
    #[error(
        "File is {size_mb:.1}MB, over the {limit_mb}MB upload limit, and cannot be split \
         because ffmpeg is not available. Please use a smaller or compressed file."
    )]
    FileTooLarge { size_mb: f64, limit_mb: u64 },
    #[error("Could not plan audio segments: {0}")]
    Planning(#[from] PlanError),
    #[error("Transcription failed: {0}")]
    Recognition(String),
    #[error("Could not assemble transcript: {0}")]
    Transcript(#[from] CodecError),
    #[error("Could not prepare temporary files: {0}")]
    Io(#[from] std::io::Error),
    #[error("Transcription cancelled")]
    Cancelled,
}

impl JobError {
    /// Maps a recognition failure to a message safe to show the user.
    ///
    /// Raw backend bodies are logged, never surfaced.
    pub fn from_recognition(err: &RecognitionError) -> Self {
        log::error!("Recognition failed: {err}");
        let reason = match err {
            RecognitionError::Timeout => "the request timed out".to_string(),
            RecognitionError::Network(_) => "could not reach the transcription service".to_string(),
            RecognitionError::RateLimited(_) => "the transcription service is rate limiting requests".to_string(),
            RecognitionError::Server { status, .. } => {
                format!("the transcription service returned an error (HTTP {status})")
            }
            RecognitionError::Rejected { status, .. } => {
                format!("the transcription service rejected the request (HTTP {status})")
            }
            RecognitionError::Io(e) => format!("could not read audio ({e})"),
            RecognitionError::InvalidResponse(_) => {
                "the transcription service returned an unreadable response".to_string()
            }
        };
        JobError::Recognition(reason)
    }
}

impl From<MediaError> for JobError {
    fn from(err: MediaError) -> Self {
        match err {
            MediaError::Cancelled => JobError::Cancelled,
            other => JobError::Conversion(other),
        }
    }
}

/// Terminal failure as handed back to the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorReport {
    pub error: String,
}

impl From<&JobError> for ErrorReport {
    fn from(err: &JobError) -> Self {
        Self {
            error: err.to_string(),
        }
    }
}

/// Share of total audio duration lost to failed segments, in percent.
pub fn missing_percentage(failed: &[FailedSegment], total_duration: f64) -> f64 {
    if total_duration <= 0.0 {
        return 0.0;
    }
    let missing: f64 = failed.iter().map(|f| f.duration).sum();
    missing / total_duration * 100.0
}

/// Human-readable warning for a partially transcribed job, if any segment failed.
pub fn partial_failure_warning(
    failed: &[FailedSegment],
    total_segments: usize,
    total_duration: f64,
) -> Option<String> {
    if failed.is_empty() {
        return None;
    }
    Some(format!(
        "{} of {} segments could not be transcribed; about {:.1}% of the audio is missing \
         from this transcript.",
        failed.len(),
        total_segments,
        missing_percentage(failed, total_duration)
    ))
}

pub(crate) fn size_mb(bytes: u64) -> f64 {
    bytes as f64 / BYTES_PER_MB as f64
}
