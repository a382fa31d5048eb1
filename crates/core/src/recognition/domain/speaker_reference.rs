use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::media::domain::audio_format::mime_type;

/// A short clip of a known speaker, used to seed diarization.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeakerReference {
    pub name: String,
    pub path: PathBuf,
}

/// A speaker reference ready to inline into a request.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedSpeaker {
    pub name: String,
    pub data_url: String,
}

impl SpeakerReference {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }

    /// Same speaker, clip replaced by `path` (e.g. a normalized copy).
    pub fn with_path(&self, path: &Path) -> Self {
        Self {
            name: self.name.clone(),
            path: path.to_path_buf(),
        }
    }

    /// Reads the clip and encodes it as a base64 data URL.
    pub fn encode(&self) -> std::io::Result<EncodedSpeaker> {
        let bytes = fs::read(&self.path)?;
        Ok(EncodedSpeaker {
            name: self.name.clone(),
            data_url: format!("data:{};base64,{}", mime_type(&self.path), STANDARD.encode(bytes)),
        })
    }
}

/// Parses `NAME=PATH`.
impl FromStr for SpeakerReference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, path) = s
            .split_once('=')
            .ok_or_else(|| format!("Speaker reference must be NAME=PATH, got '{s}'"))?;
        let name = name.trim();
        let path = path.trim();
        if name.is_empty() || path.is_empty() {
            return Err(format!("Speaker reference must be NAME=PATH, got '{s}'"));
        }
        Ok(SpeakerReference::new(name, path))
    }
}
