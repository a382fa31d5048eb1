//! Chunked speech-to-text transcription.
//!
//! Splits recordings that exceed the recognition backend's upload limit into
//! time-bounded segments, recognizes them with bounded concurrency and
//! reassembles the results into one time-coded caption document.

pub mod media;
pub mod pipeline;
pub mod planning;
pub mod recognition;
pub mod shared;
pub mod transcript;
