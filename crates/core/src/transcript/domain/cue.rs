use serde::Serialize;

use super::caption_codec;
use super::codec_error::CodecError;

/// One timestamped span of transcript text. Times are in seconds.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Cue {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

impl Cue {
    pub fn new(start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
        }
    }
}

/// An ordered sequence of cues: the canonical output of a transcription job.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Transcript {
    cues: Vec<Cue>,
    diarized: bool,
}

impl Transcript {
    pub fn new(cues: Vec<Cue>) -> Self {
        Self {
            cues,
            diarized: false,
        }
    }

    pub fn with_diarized(mut self, diarized: bool) -> Self {
        self.diarized = diarized;
        self
    }

    pub fn cues(&self) -> &[Cue] {
        &self.cues
    }

    pub fn is_diarized(&self) -> bool {
        self.diarized
    }

    /// Parses a caption document.
    pub fn parse(document: &str) -> Result<Self, CodecError> {
        caption_codec::parse_captions(document).map(Self::new)
    }

    /// Renders the canonical caption document.
    pub fn to_document(&self) -> String {
        caption_codec::render_captions(&self.cues)
    }

    /// Spoken text only, one cue per line.
    pub fn plain_text(&self) -> String {
        self.cues
            .iter()
            .flat_map(|cue| cue.text.lines())
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Multiplies every timestamp by `factor`.
    ///
    /// Maps cue times produced from sped-up audio back onto the original timeline.
    pub fn scaled(mut self, factor: f64) -> Result<Self, CodecError> {
        if !factor.is_finite() || factor <= 0.0 {
            return Err(CodecError::InvalidScale(factor));
        }
        for cue in &mut self.cues {
            cue.start *= factor;
            cue.end *= factor;
        }
        Ok(self)
    }
}
