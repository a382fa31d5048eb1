use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::media::domain::media_transcoder::{MediaError, MediaTranscoder};
use crate::shared::constants::{
    COMPRESS_BITRATE, COMPRESS_SAMPLE_RATE, SEGMENT_BITRATE, SPEAKER_CLIP_MAX_SECS,
    TRANSCODE_BITRATE, TRANSCODE_SAMPLE_RATE,
};

const POLL_INTERVAL: Duration = Duration::from_millis(50);
const MAX_ATEMPO: f64 = 2.0;

/// Media engine backed by the `ffmpeg` / `ffprobe` executables.
///
/// A running child is killed when the cancellation flag is raised.
pub struct FfmpegCliTranscoder {
    ffmpeg: String,
    ffprobe: String,
    cancelled: Arc<AtomicBool>,
}

impl FfmpegCliTranscoder {
    pub fn new(ffmpeg: impl Into<String>, ffprobe: impl Into<String>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_cancel_flag(mut self, cancelled: Arc<AtomicBool>) -> Self {
        self.cancelled = cancelled;
        self
    }

    fn run_ffmpeg(&self, operation: &'static str, args: &[String]) -> Result<(), MediaError> {
        log::debug!("{operation}: {} {}", self.ffmpeg, args.join(" "));
        let mut child = Command::new(&self.ffmpeg)
            .args(["-hide_banner", "-nostdin", "-loglevel", "error", "-y"])
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| self.spawn_error(&self.ffmpeg, e))?;

        // Drained concurrently so a chatty child never blocks on a full pipe.
        let stderr_reader = child.stderr.take().map(|mut pipe| {
            thread::spawn(move || {
                let mut bytes = Vec::new();
                let _ = pipe.read_to_end(&mut bytes);
                bytes
            })
        });
        let collect_stderr = |reader: Option<thread::JoinHandle<Vec<u8>>>| {
            reader
                .and_then(|handle| handle.join().ok())
                .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
                .unwrap_or_default()
        };

        let status = loop {
            if self.cancelled.load(Ordering::Relaxed) {
                let _ = child.kill();
                let _ = child.wait();
                return Err(MediaError::Cancelled);
            }
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(e) => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(MediaError::Io(e));
                }
            }
        };

        let stderr = collect_stderr(stderr_reader);
        if status.success() {
            return Ok(());
        }
        let message = match stderr.trim() {
            "" => format!("ffmpeg exited with {status}"),
            text => text.to_string(),
        };
        Err(MediaError::ConversionFailed { operation, message })
    }

    fn spawn_error(&self, tool: &str, e: std::io::Error) -> MediaError {
        if e.kind() == std::io::ErrorKind::NotFound {
            MediaError::ToolUnavailable {
                tool: tool.to_string(),
                source: e,
            }
        } else {
            MediaError::Io(e)
        }
    }

    fn tool_responds(tool: &str) -> bool {
        Command::new(tool)
            .arg("-version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }
}

impl Default for FfmpegCliTranscoder {
    fn default() -> Self {
        Self::new("ffmpeg", "ffprobe")
    }
}

impl MediaTranscoder for FfmpegCliTranscoder {
    fn is_available(&self) -> bool {
        Self::tool_responds(&self.ffmpeg) && Self::tool_responds(&self.ffprobe)
    }

    fn probe_duration(&self, path: &Path) -> Result<f64, MediaError> {
        let output = Command::new(&self.ffprobe)
            .args([
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
            ])
            .arg(path)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| self.spawn_error(&self.ffprobe, e))?;

        if !output.status.success() {
            return Err(MediaError::Probe {
                path: path.to_path_buf(),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        parse_probe_output(&String::from_utf8_lossy(&output.stdout)).ok_or_else(|| {
            MediaError::Probe {
                path: path.to_path_buf(),
                message: "no duration reported".to_string(),
            }
        })
    }

    fn transcode(&self, path: &Path, out_dir: &Path) -> Result<PathBuf, MediaError> {
        let output = out_dir.join(format!("{}-converted.mp3", file_stem(path)));
        self.run_ffmpeg(
            "conversion",
            &[
                "-i".into(),
                path_arg(path),
                "-vn".into(),
                "-codec:a".into(),
                "libmp3lame".into(),
                "-ar".into(),
                TRANSCODE_SAMPLE_RATE.to_string(),
                "-b:a".into(),
                TRANSCODE_BITRATE.into(),
                path_arg(&output),
            ],
        )?;
        Ok(output)
    }

    fn adjust_speed(
        &self,
        path: &Path,
        multiplier: f64,
        out_dir: &Path,
    ) -> Result<PathBuf, MediaError> {
        let output = out_dir.join(format!("{}-speed.mp3", file_stem(path)));
        self.run_ffmpeg(
            "speed adjustment",
            &[
                "-i".into(),
                path_arg(path),
                "-vn".into(),
                "-filter:a".into(),
                atempo_chain(multiplier),
                "-codec:a".into(),
                "libmp3lame".into(),
                "-b:a".into(),
                TRANSCODE_BITRATE.into(),
                path_arg(&output),
            ],
        )?;
        Ok(output)
    }

    fn compress(&self, path: &Path, out_dir: &Path) -> Result<PathBuf, MediaError> {
        let output = out_dir.join(format!("{}-compressed.mp3", file_stem(path)));
        self.run_ffmpeg(
            "compression",
            &[
                "-i".into(),
                path_arg(path),
                "-vn".into(),
                "-ac".into(),
                "1".into(),
                "-ar".into(),
                COMPRESS_SAMPLE_RATE.to_string(),
                "-codec:a".into(),
                "libmp3lame".into(),
                "-b:a".into(),
                COMPRESS_BITRATE.into(),
                path_arg(&output),
            ],
        )?;
        Ok(output)
    }

    fn cut_segment(
        &self,
        path: &Path,
        index: usize,
        start: f64,
        duration: f64,
        out_dir: &Path,
    ) -> Result<PathBuf, MediaError> {
        let output = out_dir.join(format!("segment-{index:03}.mp3"));
        self.run_ffmpeg(
            "segment extraction",
            &[
                "-ss".into(),
                format!("{start:.3}"),
                "-t".into(),
                format!("{duration:.3}"),
                "-i".into(),
                path_arg(path),
                "-vn".into(),
                "-codec:a".into(),
                "libmp3lame".into(),
                "-b:a".into(),
                SEGMENT_BITRATE.into(),
                path_arg(&output),
            ],
        )?;
        Ok(output)
    }

    fn prepare_reference_clip(
        &self,
        path: &Path,
        index: usize,
        out_dir: &Path,
    ) -> Result<PathBuf, MediaError> {
        let output = out_dir.join(format!("speaker-{index}.wav"));
        self.run_ffmpeg(
            "speaker reference preparation",
            &[
                "-i".into(),
                path_arg(path),
                "-t".into(),
                format!("{SPEAKER_CLIP_MAX_SECS:.1}"),
                "-vn".into(),
                "-ac".into(),
                "1".into(),
                "-ar".into(),
                "24000".into(),
                path_arg(&output),
            ],
        )?;
        Ok(output)
    }
}

/// `atempo` accepts at most 2.0 per filter, so larger factors are chained.
pub fn atempo_chain(multiplier: f64) -> String {
    let mut remaining = multiplier;
    let mut filters = Vec::new();
    while remaining > MAX_ATEMPO {
        filters.push(format!("atempo={MAX_ATEMPO:.1}"));
        remaining /= MAX_ATEMPO;
    }
    filters.push(format!("atempo={}", trim_float(remaining)));
    filters.join(",")
}

fn parse_probe_output(stdout: &str) -> Option<f64> {
    stdout
        .lines()
        .filter_map(|line| line.trim().parse::<f64>().ok())
        .find(|d| d.is_finite() && *d > 0.0)
}

fn trim_float(value: f64) -> String {
    let text = format!("{value:.4}");
    let text = text.trim_end_matches('0');
    match text.strip_suffix('.') {
        Some(whole) => format!("{whole}.0"),
        None => text.to_string(),
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("audio")
        .to_string()
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
