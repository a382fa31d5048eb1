use std::path::Path;

use crate::shared::constants::NATIVE_AUDIO_EXTENSIONS;

/// Whether the recognition backend cannot ingest this container as-is.
///
/// Recorder containers (webm) and less common codecs (ogg, opus, flac, aac, ...)
/// are transcoded. Files without an extension are transcoded too.
pub fn needs_transcode(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| !NATIVE_AUDIO_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(true)
}

/// Best-effort MIME type for an upload, from the file extension.
pub fn mime_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "mp3" | "mpga" | "mpeg" => "audio/mpeg",
        "mp4" | "m4a" => "audio/mp4",
        "wav" => "audio/wav",
        "webm" => "audio/webm",
        "ogg" | "opus" => "audio/ogg",
        "flac" => "audio/flac",
        _ => "application/octet-stream",
    }
}
