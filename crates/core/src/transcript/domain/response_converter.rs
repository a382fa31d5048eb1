use serde::Deserialize;

use super::caption_codec::render_captions;
use super::codec_error::CodecError;
use super::cue::Cue;

pub const UNKNOWN_SPEAKER: &str = "Unknown";

/// `{ "text": ... }` returned by the flat-JSON model.
#[derive(Debug, Clone, Deserialize)]
pub struct FlatTextResponse {
    #[serde(default)]
    pub text: String,
}

/// `{ "segments": [...] }` returned by the diarizing model.
#[derive(Debug, Clone, Deserialize)]
pub struct DiarizedResponse {
    #[serde(default)]
    pub segments: Vec<DiarizedSegment>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiarizedSegment {
    pub start: f64,
    pub end: f64,
    #[serde(default)]
    pub speaker: Option<String>,
    #[serde(default)]
    pub text: String,
}

/// Wraps flat text into a single container cue spanning `duration`.
///
/// The backend reports no timing, so there are no inner cue boundaries.
/// Empty text yields a header-only document.
pub fn json_to_captions(response: &FlatTextResponse, duration: Option<f64>) -> String {
    let text = response.text.trim();
    if text.is_empty() {
        return render_captions(&[]);
    }
    let end = duration.filter(|d| d.is_finite() && *d > 0.0).unwrap_or(0.0);
    render_captions(&[Cue::new(0.0, end, text)])
}

/// One cue per diarized segment, text prefixed with `[speaker]`.
pub fn diarized_json_to_captions(response: &DiarizedResponse) -> String {
    let cues: Vec<Cue> = response
        .segments
        .iter()
        .filter(|seg| !seg.text.trim().is_empty())
        .map(|seg| {
            let speaker = seg
                .speaker
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .unwrap_or(UNKNOWN_SPEAKER);
            let start = seg.start.max(0.0);
            Cue::new(
                start,
                seg.end.max(start),
                format!("[{}] {}", speaker, seg.text.trim()),
            )
        })
        .collect();
    render_captions(&cues)
}

pub fn parse_flat_text(body: &str) -> Result<FlatTextResponse, CodecError> {
    serde_json::from_str(body).map_err(CodecError::MalformedResponse)
}

pub fn parse_diarized(body: &str) -> Result<DiarizedResponse, CodecError> {
    serde_json::from_str(body).map_err(CodecError::MalformedResponse)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcript::domain::caption_codec::{combine_caption_segments, parse_captions};
    use approx::assert_relative_eq;

    #[test]
    fn test_flat_text_becomes_single_cue() {
        let response = parse_flat_text(r#"{"text": "  Hello world.  "}"#).unwrap();
        let doc = json_to_captions(&response, Some(42.5));
        assert_eq!(
            doc,
            "WEBVTT\n\n1\n00:00:00.000 --> 00:00:42.500\nHello world.\n\n"
        );
    }

    #[test]
    fn test_flat_text_without_duration() {
        let response = FlatTextResponse {
            text: "hi".to_string(),
        };
        let cues = parse_captions(&json_to_captions(&response, None)).unwrap();
        assert_eq!(cues.len(), 1);
        assert_relative_eq!(cues[0].end, 0.0);
    }

    #[test]
    fn test_empty_flat_text_is_header_only() {
        let response = FlatTextResponse {
            text: "   ".to_string(),
        };
        assert_eq!(json_to_captions(&response, Some(1.0)), "WEBVTT\n\n");
    }

    #[test]
    fn test_diarized_segments_prefix_speaker() {
        let body = r#"{"segments": [
            {"start": 0.0, "end": 5.0, "speaker": "A", "text": "Hi."},
            {"start": 5.5, "end": 7.25, "text": "Who's there?"}
        ]}"#;
        let doc = diarized_json_to_captions(&parse_diarized(body).unwrap());
        let cues = parse_captions(&doc).unwrap();
        assert_eq!(cues.len(), 2);
        assert_eq!(cues[0].text, "[A] Hi.");
        assert_eq!(cues[1].text, "[Unknown] Who's there?");
        assert_relative_eq!(cues[1].end, 7.25);
    }

    #[test]
    fn test_diarized_two_segments_offset_by_first_duration() {
        let first = r#"{"segments": [{"start": 0, "end": 5, "speaker": "A", "text": "one"}]}"#;
        let second = r#"{"segments": [{"start": 0, "end": 3, "speaker": "B", "text": "two"}]}"#;
        let docs = [
            diarized_json_to_captions(&parse_diarized(first).unwrap()),
            diarized_json_to_captions(&parse_diarized(second).unwrap()),
        ];
        let transcript = combine_caption_segments(&docs, &[10.0, 10.0]).unwrap();
        let cue = &transcript.cues()[1];
        assert_relative_eq!(cue.start, 10.0);
        assert_relative_eq!(cue.end, 13.0);
        assert_eq!(cue.text, "[B] two");
    }

    #[test]
    fn test_malformed_json_is_rejected() {
        assert!(matches!(
            parse_diarized("<html>502</html>"),
            Err(CodecError::MalformedResponse(_))
        ));
        assert!(matches!(
            parse_flat_text("not json"),
            Err(CodecError::MalformedResponse(_))
        ));
    }
}
