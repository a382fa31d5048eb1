pub mod artifact_registry;
pub mod infrastructure;
pub mod job;
pub mod progress;
pub mod segment_dispatcher;
pub mod transcribe_audio_use_case;
