use super::codec_error::CodecError;

/// Parses a caption timestamp into seconds.
///
/// Accepts `HH:MM:SS.mmm` and `MM:SS.mmm`; a `,` millisecond separator is
/// also accepted.
pub fn parse_caption_timestamp(text: &str) -> Result<f64, CodecError> {
    let invalid = || CodecError::InvalidTimestamp(text.to_string());
    let trimmed = text.trim();

    let (clock, millis) = trimmed
        .rsplit_once(['.', ','])
        .ok_or_else(invalid)?;
    if millis.len() != 3 {
        return Err(invalid());
    }
    let millis = parse_digits(millis).ok_or_else(invalid)?;

    let parts: Vec<&str> = clock.split(':').collect();
    let (hours, minutes, seconds) = match parts.as_slice() {
        [h, m, s] => (
            parse_digits(h).ok_or_else(invalid)?,
            parse_digits(m).ok_or_else(invalid)?,
            parse_digits(s).ok_or_else(invalid)?,
        ),
        [m, s] => (
            0,
            parse_digits(m).ok_or_else(invalid)?,
            parse_digits(s).ok_or_else(invalid)?,
        ),
        _ => return Err(invalid()),
    };
    if minutes >= 60 || seconds >= 60 {
        return Err(invalid());
    }

    let total_ms = hours
        .checked_mul(60)
        .and_then(|v| v.checked_add(minutes))
        .and_then(|v| v.checked_mul(60))
        .and_then(|v| v.checked_add(seconds))
        .and_then(|v| v.checked_mul(1000))
        .and_then(|v| v.checked_add(millis))
        .ok_or_else(invalid)?;
    Ok(total_ms as f64 / 1000.0)
}

/// Formats seconds as `HH:MM:SS.mmm`, rounding to the nearest millisecond.
///
/// Negative and NaN inputs clamp to zero.
pub fn format_caption_timestamp(seconds: f64) -> String {
    let total_ms = if seconds.is_finite() && seconds > 0.0 {
        (seconds * 1000.0).round() as u64
    } else {
        0
    };
    let hours = total_ms / 3_600_000;
    let mins = (total_ms % 3_600_000) / 60_000;
    let secs = (total_ms % 60_000) / 1_000;
    let millis = total_ms % 1_000;
    format!("{:02}:{:02}:{:02}.{:03}", hours, mins, secs, millis)
}

fn parse_digits(s: &str) -> Option<u64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}
