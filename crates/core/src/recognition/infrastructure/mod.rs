pub mod http_speech_recognizer;
