use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MediaError {
    #[error("media engine '{tool}' is not available: {source}")]
    ToolUnavailable {
        tool: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{operation} failed: {message}")]
    ConversionFailed {
        operation: &'static str,
        message: String,
    },
    #[error("could not read duration of {path}: {message}")]
    Probe { path: PathBuf, message: String },
    #[error("media I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("media operation cancelled")]
    Cancelled,
}

/// Domain interface for the external audio-processing engine.
///
/// Every operation writes a fresh file into `out_dir` and never mutates its
/// input. Failures are deterministic and not retried.
pub trait MediaTranscoder: Send + Sync {
    /// Whether the engine can be invoked at all.
    fn is_available(&self) -> bool;

    fn probe_duration(&self, path: &Path) -> Result<f64, MediaError>;

    /// Converts to the canonical lossy codec at a fixed bitrate and sample rate.
    fn transcode(&self, path: &Path, out_dir: &Path) -> Result<PathBuf, MediaError>;

    /// Re-times the audio by `multiplier` without changing pitch.
    fn adjust_speed(
        &self,
        path: &Path,
        multiplier: f64,
        out_dir: &Path,
    ) -> Result<PathBuf, MediaError>;

    /// Re-encodes to a low-bitrate mono file.
    fn compress(&self, path: &Path, out_dir: &Path) -> Result<PathBuf, MediaError>;

    /// Extracts `[start, start + duration)` into `segment-<index>`.
    fn cut_segment(
        &self,
        path: &Path,
        index: usize,
        start: f64,
        duration: f64,
        out_dir: &Path,
    ) -> Result<PathBuf, MediaError>;

    /// Normalizes a speaker reference into a short mono clip.
    fn prepare_reference_clip(
        &self,
        path: &Path,
        index: usize,
        out_dir: &Path,
    ) -> Result<PathBuf, MediaError>;
}
