use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::speaker_reference::EncodedSpeaker;
use crate::transcript::domain::caption_codec::{parse_captions, render_captions};
use crate::transcript::domain::codec_error::CodecError;
use crate::transcript::domain::response_converter::{
    diarized_json_to_captions, json_to_captions, parse_diarized, parse_flat_text,
};

/// The three recognition backends, each with its own request and response shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecognitionModel {
    /// Returns caption-formatted text with cue timing.
    Caption,
    /// Returns `{ text }` with no timing.
    FlatJson,
    /// Returns `{ segments: [{start, end, speaker, text}] }`.
    Diarized,
}

impl RecognitionModel {
    pub const ALL: &'static [RecognitionModel] = &[
        RecognitionModel::Caption,
        RecognitionModel::FlatJson,
        RecognitionModel::Diarized,
    ];

    /// Backend model identifier.
    pub fn api_id(self) -> &'static str {
        match self {
            RecognitionModel::Caption => "whisper-1",
            RecognitionModel::FlatJson => "gpt-4o-transcribe",
            RecognitionModel::Diarized => "gpt-4o-transcribe-diarize",
        }
    }

    pub fn response_format(self) -> &'static str {
        match self {
            RecognitionModel::Caption => "vtt",
            RecognitionModel::FlatJson => "json",
            RecognitionModel::Diarized => "diarized_json",
        }
    }

    pub fn supports_prompt(self) -> bool {
        !matches!(self, RecognitionModel::Diarized)
    }

    pub fn is_diarized(self) -> bool {
        matches!(self, RecognitionModel::Diarized)
    }

    /// Multipart text fields for one recognition request.
    ///
    /// Prompts are dropped for the diarizing model; speaker references are
    /// only sent to it.
    pub fn form_fields(
        self,
        prompt: Option<&str>,
        speakers: &[EncodedSpeaker],
    ) -> Vec<(&'static str, String)> {
        let mut fields = vec![
            ("model", self.api_id().to_string()),
            ("response_format", self.response_format().to_string()),
        ];
        if self.supports_prompt() {
            if let Some(prompt) = prompt.map(str::trim).filter(|p| !p.is_empty()) {
                fields.push(("prompt", prompt.to_string()));
            }
        }
        if self.is_diarized() {
            fields.push(("chunking_strategy", "auto".to_string()));
            for speaker in speakers {
                fields.push(("known_speaker_names[]", speaker.name.clone()));
            }
            for speaker in speakers {
                fields.push(("known_speaker_references[]", speaker.data_url.clone()));
            }
        }
        fields
    }

    /// Converts a raw response body into a caption document.
    ///
    /// Caption bodies are parsed and re-rendered so a malformed one fails
    /// here rather than when segments are combined. `duration` bounds the
    /// single container cue of the flat-JSON model.
    pub fn to_captions(self, body: &str, duration: Option<f64>) -> Result<String, CodecError> {
        match self {
            RecognitionModel::Caption => Ok(render_captions(&parse_captions(body)?)),
            RecognitionModel::FlatJson => Ok(json_to_captions(&parse_flat_text(body)?, duration)),
            RecognitionModel::Diarized => Ok(diarized_json_to_captions(&parse_diarized(body)?)),
        }
    }
}

impl fmt::Display for RecognitionModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.api_id())
    }
}

impl FromStr for RecognitionModel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "whisper-1" | "whisper" | "caption" | "vtt" => Ok(RecognitionModel::Caption),
            "gpt-4o-transcribe" | "json" | "flat_json" => Ok(RecognitionModel::FlatJson),
            "gpt-4o-transcribe-diarize" | "diarize" | "diarized" => {
                Ok(RecognitionModel::Diarized)
            }
            other => Err(format!(
                "Unknown model '{other}', expected one of: {}",
                RecognitionModel::ALL
                    .iter()
                    .map(|m| m.api_id())
                    .collect::<Vec<_>>()
                    .join(", ")
            )),
        }
    }
}
