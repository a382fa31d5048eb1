use super::codec_error::CodecError;
use super::cue::{Cue, Transcript};
use super::timestamp::{format_caption_timestamp, parse_caption_timestamp};

pub const CAPTION_HEADER: &str = "WEBVTT";
pub const TIME_RANGE_SEPARATOR: &str = "-->";

/// Renders cues as a caption document with sequential cue numbers.
pub fn render_captions(cues: &[Cue]) -> String {
    let mut out = String::new();
    out.push_str(CAPTION_HEADER);
    out.push_str("\n\n");
    for (i, cue) in cues.iter().enumerate() {
        out.push_str(&format!(
            "{}\n{} {} {}\n{}\n\n",
            i + 1,
            format_caption_timestamp(cue.start),
            TIME_RANGE_SEPARATOR,
            format_caption_timestamp(cue.end),
            cue.text.trim()
        ));
    }
    out
}

/// Parses a caption document into cues.
///
/// Header block, blank lines and cue numbers are skipped. Any line containing
/// `-->` starts a new cue; the lines after it up to the next blank line or
/// time range are its text. Cues without text are dropped.
pub fn parse_captions(document: &str) -> Result<Vec<Cue>, CodecError> {
    let lines: Vec<&str> = document.lines().map(|l| l.trim_end_matches('\r')).collect();
    let body_start = header_block_end(&lines);

    let mut cues = Vec::new();
    let mut current: Option<(f64, f64, Vec<&str>)> = None;

    for (i, line) in lines.iter().enumerate().skip(body_start) {
        let trimmed = line.trim();
        if trimmed.contains(TIME_RANGE_SEPARATOR) {
            flush_cue(&mut current, &mut cues);
            let (start, end) = parse_time_range(trimmed)?;
            current = Some((start, end, Vec::new()));
        } else if trimmed.is_empty() {
            flush_cue(&mut current, &mut cues);
        } else if is_cue_number(&lines, i) {
            continue;
        } else if let Some((_, _, text)) = current.as_mut() {
            text.push(trimmed);
        }
    }
    flush_cue(&mut current, &mut cues);

    Ok(cues)
}

/// Reassembles per-segment caption documents into one transcript.
///
/// Each segment's cues are shifted by the summed durations of the segments
/// before it. A failed segment contributes an empty document but still
/// advances the offset by its duration.
pub fn combine_caption_segments<S: AsRef<str>>(
    segments: &[S],
    durations: &[f64],
) -> Result<Transcript, CodecError> {
    if segments.len() != durations.len() {
        return Err(CodecError::LengthMismatch {
            segments: segments.len(),
            durations: durations.len(),
        });
    }

    let mut combined = Vec::new();
    let mut offset = 0.0;
    for (segment, &duration) in segments.iter().zip(durations) {
        if !duration.is_finite() || duration < 0.0 {
            return Err(CodecError::InvalidDuration(duration));
        }
        for cue in parse_captions(segment.as_ref())? {
            combined.push(Cue::new(cue.start + offset, cue.end + offset, cue.text));
        }
        offset += duration;
    }

    Ok(Transcript::new(combined))
}

/// Strips header, cue-number and time-range lines, leaving spoken text.
///
/// Idempotent: stripping already-stripped text returns it unchanged.
pub fn to_plain_text(document: &str) -> String {
    let lines: Vec<&str> = document.lines().map(|l| l.trim_end_matches('\r')).collect();
    let body_start = header_block_end(&lines);

    lines
        .iter()
        .enumerate()
        .skip(body_start)
        .filter(|(i, line)| {
            let trimmed = line.trim();
            !trimmed.is_empty()
                && !trimmed.contains(TIME_RANGE_SEPARATOR)
                && !is_cue_number(&lines, *i)
        })
        .map(|(_, line)| line.trim())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Index of the first line after the header block, or 0 if there is no header.
fn header_block_end(lines: &[&str]) -> usize {
    let Some(first) = lines.iter().position(|l| !l.trim().is_empty()) else {
        return lines.len();
    };
    if !lines[first].trim_start().starts_with(CAPTION_HEADER) {
        return 0;
    }
    lines[first..]
        .iter()
        .position(|l| l.trim().is_empty() || l.contains(TIME_RANGE_SEPARATOR))
        .map(|offset| first + offset)
        .unwrap_or(lines.len())
}

/// A digits-only line directly followed by a time range.
fn is_cue_number(lines: &[&str], index: usize) -> bool {
    let trimmed = lines[index].trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    lines
        .get(index + 1)
        .map(|next| next.contains(TIME_RANGE_SEPARATOR))
        .unwrap_or(false)
}

fn parse_time_range(line: &str) -> Result<(f64, f64), CodecError> {
    let invalid = || CodecError::InvalidTimestamp(line.to_string());
    let (start, rest) = line.split_once(TIME_RANGE_SEPARATOR).ok_or_else(invalid)?;
    // Cue settings may follow the end timestamp.
    let end = rest.split_whitespace().next().ok_or_else(invalid)?;
    let start = parse_caption_timestamp(start)?;
    let end = parse_caption_timestamp(end)?;
    Ok((start, end.max(start)))
}

fn flush_cue(current: &mut Option<(f64, f64, Vec<&str>)>, cues: &mut Vec<Cue>) {
    if let Some((start, end, text)) = current.take() {
        if !text.is_empty() {
            cues.push(Cue::new(start, end, text.join("\n")));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    const WHISPER_VTT: &str = "WEBVTT\n\n00:00:00.000 --> 00:00:04.200\nHello there.\n\n00:00:04.200 --> 00:00:09.000\nGeneral Kenobi.\n\n";

    #[test]
    fn test_parse_backend_captions_without_numbers() {
        let cues = parse_captions(WHISPER_VTT).unwrap();
        assert_eq!(cues.len(), 2);
        assert_eq!(cues[0].text, "Hello there.");
        assert_relative_eq!(cues[1].start, 4.2);
        assert_relative_eq!(cues[1].end, 9.0);
    }

    #[test]
    fn test_parse_numbered_multiline_cues() {
        let doc = "WEBVTT\n\n1\n00:00:01.000 --> 00:00:02.000\nline one\nline two\n\n2\n00:00:02.000 --> 00:00:03.000\n42\n\n";
        let cues = parse_captions(doc).unwrap();
        assert_eq!(cues.len(), 2);
        assert_eq!(cues[0].text, "line one\nline two");
        assert_eq!(cues[1].text, "42");
    }

    #[test]
    fn test_parse_ignores_header_metadata_and_cue_settings() {
        let doc = "WEBVTT\nKind: captions\nLanguage: en\n\n00:01.000 --> 00:02.500 align:start position:0%\nhi\n";
        let cues = parse_captions(doc).unwrap();
        assert_eq!(cues.len(), 1);
        assert_relative_eq!(cues[0].start, 1.0);
        assert_relative_eq!(cues[0].end, 2.5);
        assert_eq!(cues[0].text, "hi");
    }

    #[test]
    fn test_parse_handles_crlf() {
        let doc = "WEBVTT\r\n\r\n00:00:00.000 --> 00:00:01.000\r\nhi\r\n\r\n";
        let cues = parse_captions(doc).unwrap();
        assert_eq!(cues[0].text, "hi");
    }

    #[test]
    fn test_parse_rejects_bad_time_range() {
        let doc = "WEBVTT\n\nxx --> 00:00:01.000\nhi\n";
        assert!(matches!(
            parse_captions(doc),
            Err(CodecError::InvalidTimestamp(_))
        ));
    }

    #[test]
    fn test_parse_empty_document() {
        assert!(parse_captions("").unwrap().is_empty());
        assert!(parse_captions("WEBVTT\n\n").unwrap().is_empty());
    }

    #[test]
    fn test_render_numbers_cues_sequentially() {
        let doc = render_captions(&[Cue::new(0.0, 1.5, "a"), Cue::new(1.5, 3.0, "b")]);
        assert_eq!(
            doc,
            "WEBVTT\n\n1\n00:00:00.000 --> 00:00:01.500\na\n\n2\n00:00:01.500 --> 00:00:03.000\nb\n\n"
        );
    }

    #[test]
    fn test_render_then_parse_preserves_cues() {
        let cues = vec![Cue::new(0.25, 1.5, "[A] hi"), Cue::new(61.0, 62.125, "bye")];
        assert_eq!(parse_captions(&render_captions(&cues)).unwrap(), cues);
    }

    #[test]
    fn test_combine_offsets_by_prior_durations() {
        let first = "WEBVTT\n\n00:00:00.000 --> 00:00:05.000\none\n\n";
        let second = "WEBVTT\n\n00:00:01.000 --> 00:00:04.000\ntwo\n\n";
        let transcript = combine_caption_segments(&[first, second], &[600.0, 600.0]).unwrap();
        let cues = transcript.cues();
        assert_eq!(cues.len(), 2);
        assert_relative_eq!(cues[1].start, 601.0);
        assert_relative_eq!(cues[1].end, 604.0);
        assert!(transcript.to_document().contains("2\n00:10:01.000 --> 00:10:04.000\ntwo"));
    }

    #[test]
    fn test_combine_empty_segment_still_advances_offset() {
        let cue = "WEBVTT\n\n00:00:00.000 --> 00:00:01.000\nx\n\n";
        let transcript = combine_caption_segments(&[cue, "", cue], &[10.0, 20.0, 5.0]).unwrap();
        assert_eq!(transcript.cues().len(), 2);
        assert_relative_eq!(transcript.cues()[1].start, 30.0);
    }

    #[test]
    fn test_combine_start_times_are_monotonic_across_segments() {
        let seg = "WEBVTT\n\n00:00:00.000 --> 00:00:02.000\na\n\n00:00:02.000 --> 00:00:09.500\nb\n\n";
        let segments = vec![seg; 6];
        let durations = vec![10.0; 6];
        let transcript = combine_caption_segments(&segments, &durations).unwrap();
        let starts: Vec<f64> = transcript.cues().iter().map(|c| c.start).collect();
        assert_eq!(starts.len(), 12);
        assert!(starts.windows(2).all(|w| w[0] <= w[1]));
    }

    #[rstest]
    #[case::negative(-1.0)]
    #[case::nan(f64::NAN)]
    #[case::infinite(f64::INFINITY)]
    fn test_combine_rejects_invalid_duration(#[case] duration: f64) {
        let result = combine_caption_segments(&["WEBVTT\n\n"], &[duration]);
        assert!(matches!(result, Err(CodecError::InvalidDuration(_))));
    }

    #[test]
    fn test_combine_rejects_length_mismatch() {
        let result = combine_caption_segments(&["", ""], &[1.0]);
        assert!(matches!(
            result,
            Err(CodecError::LengthMismatch {
                segments: 2,
                durations: 1
            })
        ));
    }

    #[test]
    fn test_plain_text_strips_structure() {
        let doc = render_captions(&[
            Cue::new(0.0, 1.0, "Hello."),
            Cue::new(1.0, 2.0, "2"),
            Cue::new(2.0, 3.0, "Bye."),
        ]);
        assert_eq!(to_plain_text(&doc), "Hello.\n2\nBye.");
    }

    #[rstest]
    #[case::document(WHISPER_VTT)]
    #[case::numbered("WEBVTT\n\n1\n00:00:01.000 --> 00:00:02.000\n7\n\n2\n00:00:02.000 --> 00:00:03.000\nseven\n")]
    #[case::already_plain("just words\n12\nmore words")]
    #[case::empty("")]
    fn test_plain_text_is_idempotent(#[case] doc: &str) {
        let once = to_plain_text(doc);
        assert_eq!(to_plain_text(&once), once);
    }

    #[test]
    fn test_plain_text_matches_transcript_plain_text() {
        let transcript = Transcript::parse(WHISPER_VTT).unwrap();
        assert_eq!(to_plain_text(WHISPER_VTT), transcript.plain_text());
    }
}
