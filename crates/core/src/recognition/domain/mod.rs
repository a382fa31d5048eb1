pub mod recognition_model;
pub mod speaker_reference;
pub mod speech_recognizer;
