pub const BYTES_PER_MB: u64 = 1024 * 1024;

/// Hard per-request upload limit enforced by the recognition backend.
pub const MAX_UPLOAD_BYTES: u64 = 25 * BYTES_PER_MB;

/// Target size for each split segment, leaving headroom under the upload limit.
pub const SEGMENT_CEILING_BYTES: u64 = 20 * BYTES_PER_MB;

pub const DEFAULT_API_BASE_URL: &str = "https://api.openai.com/v1";

pub const DEFAULT_WORKER_COUNT: usize = 3;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 1000;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 300;

pub const MAX_SPEAKER_REFERENCES: usize = 4;
pub const SPEAKER_CLIP_MAX_SECS: f64 = 10.0;

pub const MIN_SPEED_MULTIPLIER: f64 = 1.0;
pub const MAX_SPEED_MULTIPLIER: f64 = 3.0;

/// Canonical transcode target (MP3).
pub const TRANSCODE_BITRATE: &str = "128k";
pub const TRANSCODE_SAMPLE_RATE: u32 = 44100;
/// Segments are cut slightly below the transcode bitrate for extra size control.
pub const SEGMENT_BITRATE: &str = "96k";
pub const COMPRESS_BITRATE: &str = "48k";
pub const COMPRESS_SAMPLE_RATE: u32 = 16000;

/// Extensions the recognition backend ingests without transcoding.
pub const NATIVE_AUDIO_EXTENSIONS: &[&str] = &["mp3", "mp4", "mpeg", "mpga", "m4a", "wav"];

pub const SETTINGS_DIR_NAME: &str = "chunkscribe";
