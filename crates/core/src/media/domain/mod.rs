pub mod audio_format;
pub mod media_transcoder;
