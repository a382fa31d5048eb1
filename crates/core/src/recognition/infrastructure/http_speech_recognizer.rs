use std::fs;
use std::time::Duration;

use reqwest::blocking::multipart::{Form, Part};
use reqwest::blocking::Client;

use crate::media::domain::audio_format::mime_type;
use crate::recognition::domain::speech_recognizer::{
    RecognitionError, RecognitionRequest, SpeechRecognizer,
};

const TRANSCRIPTIONS_PATH: &str = "/audio/transcriptions";

/// Recognizer backed by an OpenAI-compatible `/audio/transcriptions` endpoint.
pub struct HttpSpeechRecognizer {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl HttpSpeechRecognizer {
    pub fn new(
        base_url: &str,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, RecognitionError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RecognitionError::Network(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint_url(base_url),
            api_key: api_key.into(),
        })
    }

    fn build_form(&self, request: &RecognitionRequest<'_>) -> Result<Form, RecognitionError> {
        let bytes = fs::read(request.audio_path)?;
        let file_name = request
            .audio_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("audio.mp3")
            .to_string();
        let part = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str(mime_type(request.audio_path))
            .map_err(|e| RecognitionError::Network(e.to_string()))?;

        let mut form = Form::new().part("file", part);
        for (name, value) in request.model.form_fields(request.prompt, request.speakers) {
            form = form.text(name, value);
        }
        Ok(form)
    }
}

impl SpeechRecognizer for HttpSpeechRecognizer {
    fn recognize(&self, request: &RecognitionRequest<'_>) -> Result<String, RecognitionError> {
        let form = self.build_form(request)?;
        log::debug!(
            "POST {} model={} file={}",
            self.endpoint,
            request.model,
            request.audio_path.display()
        );

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .map_err(map_transport_error)?;

        let status = response.status().as_u16();
        let body = response.text().map_err(map_transport_error)?;
        if (200..300).contains(&status) {
            Ok(body)
        } else {
            Err(classify_status(status, body))
        }
    }
}

fn endpoint_url(base_url: &str) -> String {
    format!("{}{TRANSCRIPTIONS_PATH}", base_url.trim().trim_end_matches('/'))
}

fn map_transport_error(e: reqwest::Error) -> RecognitionError {
    if e.is_timeout() {
        RecognitionError::Timeout
    } else {
        RecognitionError::Network(e.to_string())
    }
}

fn classify_status(status: u16, body: String) -> RecognitionError {
    match status {
        408 => RecognitionError::Timeout,
        429 => RecognitionError::RateLimited(body),
        500..=599 => RecognitionError::Server { status, body },
        _ => RecognitionError::Rejected { status, body },
    }
}
