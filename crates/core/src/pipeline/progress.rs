use std::fmt;

use crossbeam_channel::{Receiver, Sender};

/// A pipeline stage transition, for display only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    Converting,
    Optimizing { multiplier_percent: u32 },
    Compressing,
    Splitting { segments: usize },
    Transcribing { current: usize, total: usize },
    Combining,
}

impl ProgressEvent {
    /// Short stage keyword.
    pub fn stage(&self) -> &'static str {
        match self {
            ProgressEvent::Converting => "converting",
            ProgressEvent::Optimizing { .. } => "optimizing",
            ProgressEvent::Compressing => "compressing",
            ProgressEvent::Splitting { .. } => "splitting",
            ProgressEvent::Transcribing { .. } => "transcribing",
            ProgressEvent::Combining => "combining",
        }
    }
}

impl fmt::Display for ProgressEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgressEvent::Converting => write!(f, "Converting audio to a supported format..."),
            ProgressEvent::Optimizing { multiplier_percent } => write!(
                f,
                "Speeding up audio to {}.{:02}x...",
                multiplier_percent / 100,
                multiplier_percent % 100
            ),
            ProgressEvent::Compressing => write!(f, "Compressing audio..."),
            ProgressEvent::Splitting { segments } => {
                write!(f, "Splitting audio into {segments} segments...")
            }
            ProgressEvent::Transcribing { current, total } if *total > 1 => {
                write!(f, "Transcribing segment {current} of {total}...")
            }
            ProgressEvent::Transcribing { .. } => write!(f, "Transcribing audio..."),
            ProgressEvent::Combining => write!(f, "Combining transcripts..."),
        }
    }
}

/// Sending half of the progress stream.
///
/// Emitting never blocks and never fails: a dropped receiver or a disabled
/// sink silently discards events.
#[derive(Debug, Clone, Default)]
pub struct ProgressSink {
    tx: Option<Sender<ProgressEvent>>,
}

impl ProgressSink {
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn emit(&self, event: ProgressEvent) {
        log::debug!("progress: {event}");
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }
}

/// Creates a connected progress sink and the receiver the caller subscribes to.
pub fn channel() -> (ProgressSink, Receiver<ProgressEvent>) {
    let (tx, rx) = crossbeam_channel::unbounded();
    (ProgressSink { tx: Some(tx) }, rx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_events_reach_receiver_in_order() {
        let (sink, rx) = channel();
        sink.emit(ProgressEvent::Converting);
        sink.emit(ProgressEvent::Combining);
        drop(sink);
        let events: Vec<_> = rx.iter().collect();
        assert_eq!(events, vec![ProgressEvent::Converting, ProgressEvent::Combining]);
    }

    #[test]
    fn test_emit_after_receiver_dropped_is_silent() {
        let (sink, rx) = channel();
        drop(rx);
        sink.emit(ProgressEvent::Compressing);
    }

    #[test]
    fn test_disabled_sink_discards() {
        ProgressSink::disabled().emit(ProgressEvent::Converting);
    }

    #[rstest]
    #[case(ProgressEvent::Transcribing { current: 2, total: 5 }, "Transcribing segment 2 of 5...")]
    #[case(ProgressEvent::Transcribing { current: 1, total: 1 }, "Transcribing audio...")]
    #[case(ProgressEvent::Optimizing { multiplier_percent: 150 }, "Speeding up audio to 1.50x...")]
    #[case(ProgressEvent::Splitting { segments: 3 }, "Splitting audio into 3 segments...")]
    fn test_display(#[case] event: ProgressEvent, #[case] expected: &str) {
        assert_eq!(event.to_string(), expected);
    }

    #[test]
    fn test_stage_keywords() {
        assert_eq!(ProgressEvent::Optimizing { multiplier_percent: 200 }.stage(), "optimizing");
        assert_eq!(ProgressEvent::Transcribing { current: 1, total: 2 }.stage(), "transcribing");
    }
}
