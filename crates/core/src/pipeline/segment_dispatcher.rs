use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use super::job::{FailedSegment, Segment, SegmentResult};
use super::progress::ProgressSink;
use crate::recognition::domain::recognition_model::RecognitionModel;
use crate::recognition::domain::speaker_reference::EncodedSpeaker;
use crate::recognition::domain::speech_recognizer::{
    RecognitionError, RecognitionRequest, SpeechRecognizer,
};
use crate::shared::constants::{DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_BACKOFF_MS};

/// How transient recognition failures are retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// Wait before attempt `attempt + 1`; grows linearly.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.backoff * attempt
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(
            DEFAULT_MAX_ATTEMPTS,
            Duration::from_millis(DEFAULT_RETRY_BACKOFF_MS),
        )
    }
}

/// Everything a dispatcher needs to recognize the segments of one job.
pub struct DispatchContext<'a> {
    pub recognizer: &'a dyn SpeechRecognizer,
    pub model: RecognitionModel,
    pub prompt: Option<&'a str>,
    /// Attached to segment 0 only.
    pub speakers: &'a [EncodedSpeaker],
    pub retry: RetryPolicy,
    pub cancelled: &'a AtomicBool,
    pub progress: &'a ProgressSink,
}

impl DispatchContext<'_> {
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

/// What became of one segment.
#[derive(Debug)]
pub enum SegmentOutcome {
    Recognized(SegmentResult),
    Failed {
        segment: FailedSegment,
        error: RecognitionError,
    },
    Cancelled,
}

/// Results of dispatching every segment of a job, in completion order.
#[derive(Debug, Default)]
pub struct DispatchReport {
    pub results: Vec<SegmentResult>,
    pub failed: Vec<FailedSegment>,
    pub cancelled: bool,
}

impl DispatchReport {
    pub fn record(&mut self, outcome: SegmentOutcome) {
        match outcome {
            SegmentOutcome::Recognized(result) => self.results.push(result),
            SegmentOutcome::Failed { segment, error } => {
                log::warn!("Segment {} failed: {error}", segment.index);
                self.failed.push(segment);
            }
            SegmentOutcome::Cancelled => self.cancelled = true,
        }
    }
}

/// Strategy for issuing recognition calls across the segments of a job.
///
/// A failed segment never aborts the others. After cancellation no new
/// segment is started.
pub trait SegmentDispatcher: Send + Sync {
    fn dispatch(&self, segments: &[Segment], ctx: &DispatchContext<'_>) -> DispatchReport;
}

/// Recognizes one segment, retrying transient failures per `ctx.retry`.
///
/// `prompt` overrides the context prompt so strategies can add context.
pub fn recognize_with_retry(
    ctx: &DispatchContext<'_>,
    segment: &Segment,
    prompt: Option<&str>,
) -> SegmentOutcome {
    let speakers: &[EncodedSpeaker] = if segment.index == 0 { ctx.speakers } else { &[] };
    let request = RecognitionRequest::new(segment.path(), ctx.model)
        .with_prompt(prompt)
        .with_speakers(speakers);

    let mut attempt = 1;
    loop {
        if ctx.is_cancelled() {
            return SegmentOutcome::Cancelled;
        }
        let error = match ctx.recognizer.recognize(&request) {
            Ok(body) => match ctx.model.to_captions(&body, Some(segment.duration)) {
                Ok(captions) => {
                    return SegmentOutcome::Recognized(SegmentResult {
                        index: segment.index,
                        duration: segment.duration,
                        captions,
                    })
                }
                Err(e) => RecognitionError::InvalidResponse(e),
            },
            Err(e) => e,
        };

        if !error.is_transient() || attempt >= ctx.retry.max_attempts {
            return SegmentOutcome::Failed {
                segment: FailedSegment {
                    index: segment.index,
                    duration: segment.duration,
                },
                error,
            };
        }
        let delay = ctx.retry.delay_after(attempt);
        log::warn!(
            "Segment {} attempt {attempt}/{} failed: {error}; retrying in {}ms",
            segment.index,
            ctx.retry.max_attempts,
            delay.as_millis()
        );
        thread::sleep(delay);
        attempt += 1;
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    fn ctx<'a>(
        recognizer: &'a ScriptedRecognizer,
        speakers: &'a [EncodedSpeaker],
        cancelled: &'a AtomicBool,
        progress: &'a ProgressSink,
    ) -> DispatchContext<'a> {
        DispatchContext {
            recognizer,
            model: RecognitionModel::Caption,
            prompt: None,
            speakers,
            retry: fast_retry(3),
            cancelled,
            progress,
        }
    }

    #[test]
    fn test_transient_failure_is_retried_then_succeeds() {
        let recognizer = ScriptedRecognizer::default().script(
            "segment-000.mp3",
            vec![Err(RecognitionError::Timeout), Ok(CAPTIONS.to_string())],
        );
        let cancelled = AtomicBool::new(false);
        let progress = ProgressSink::disabled();
        let ctx = ctx(&recognizer, &[], &cancelled, &progress);

        let outcome = recognize_with_retry(&ctx, &segments(&[5.0])[0], None);

        assert!(matches!(outcome, SegmentOutcome::Recognized(_)));
        assert_eq!(recognizer.calls_for("segment-000.mp3").len(), 2);
    }

    #[test]
    fn test_gives_up_after_max_attempts() {
        let recognizer = ScriptedRecognizer::default().script(
            "segment-000.mp3",
            vec![
                Err(RecognitionError::Timeout),
                Err(RecognitionError::Timeout),
                Err(RecognitionError::Timeout),
                Ok(CAPTIONS.to_string()),
            ],
        );
        let cancelled = AtomicBool::new(false);
        let progress = ProgressSink::disabled();
        let ctx = ctx(&recognizer, &[], &cancelled, &progress);

        let outcome = recognize_with_retry(&ctx, &segments(&[7.5])[0], None);

        match outcome {
            SegmentOutcome::Failed { segment, .. } => {
                assert_eq!(segment.index, 0);
                assert_eq!(segment.duration, 7.5);
            }
            other => panic!("expected failure, got {other:?}"),
        }
        assert_eq!(recognizer.calls_for("segment-000.mp3").len(), 3);
    }

    #[test]
    fn test_permanent_failure_is_not_retried() {
        let recognizer = ScriptedRecognizer::default().script(
            "segment-000.mp3",
            vec![Err(RecognitionError::Rejected {
                status: 400,
                body: String::new(),
            })],
        );
        let cancelled = AtomicBool::new(false);
        let progress = ProgressSink::disabled();
        let ctx = ctx(&recognizer, &[], &cancelled, &progress);

        let outcome = recognize_with_retry(&ctx, &segments(&[1.0])[0], None);

        assert!(matches!(outcome, SegmentOutcome::Failed { .. }));
        assert_eq!(recognizer.calls_for("segment-000.mp3").len(), 1);
    }

    #[test]
    fn test_malformed_response_is_permanent() {
        let recognizer = ScriptedRecognizer::default()
            .script("segment-000.mp3", vec![Ok("not json".to_string())]);
        let cancelled = AtomicBool::new(false);
        let progress = ProgressSink::disabled();
        let mut ctx = ctx(&recognizer, &[], &cancelled, &progress);
        ctx.model = RecognitionModel::FlatJson;

        let outcome = recognize_with_retry(&ctx, &segments(&[1.0])[0], None);

        match outcome {
            SegmentOutcome::Failed { error, .. } => {
                assert!(matches!(error, RecognitionError::InvalidResponse(_)))
            }
            other => panic!("expected failure, got {other:?}"),
        }
        assert_eq!(recognizer.calls_for("segment-000.mp3").len(), 1);
    }

    #[test]
    fn test_malformed_caption_timing_is_permanent() {
        let recognizer = ScriptedRecognizer::default().script(
            "segment-000.mp3",
            vec![Ok("WEBVTT\n\n00:00:01.000 --> soon\nbad\n".to_string())],
        );
        let cancelled = AtomicBool::new(false);
        let progress = ProgressSink::disabled();
        let ctx = ctx(&recognizer, &[], &cancelled, &progress);

        let outcome = recognize_with_retry(&ctx, &segments(&[1.0])[0], None);

        match outcome {
            SegmentOutcome::Failed { error, .. } => {
                assert!(matches!(error, RecognitionError::InvalidResponse(_)))
            }
            other => panic!("expected failure, got {other:?}"),
        }
        assert_eq!(recognizer.calls_for("segment-000.mp3").len(), 1);
    }

    #[test]
    fn test_speakers_only_attached_to_first_segment() {
        let recognizer = ScriptedRecognizer::default();
        let speakers = vec![EncodedSpeaker {
            name: "Ada".into(),
            data_url: "data:audio/wav;base64,AA==".into(),
        }];
        let cancelled = AtomicBool::new(false);
        let progress = ProgressSink::disabled();
        let ctx = ctx(&recognizer, &speakers, &cancelled, &progress);

        for segment in segments(&[1.0, 1.0]) {
            recognize_with_retry(&ctx, &segment, None);
        }

        assert_eq!(recognizer.calls_for("segment-000.mp3")[0].speaker_count, 1);
        assert_eq!(recognizer.calls_for("segment-001.mp3")[0].speaker_count, 0);
    }

    #[test]
    fn test_cancelled_before_call() {
        let recognizer = ScriptedRecognizer::default();
        let cancelled = AtomicBool::new(true);
        let progress = ProgressSink::disabled();
        let ctx = ctx(&recognizer, &[], &cancelled, &progress);

        let outcome = recognize_with_retry(&ctx, &segments(&[1.0])[0], None);

        assert!(matches!(outcome, SegmentOutcome::Cancelled));
        assert!(recognizer.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_retry_delay_grows_linearly() {
        let policy = RetryPolicy::new(3, Duration::from_millis(100));
        assert_eq!(policy.delay_after(1), Duration::from_millis(100));
        assert_eq!(policy.delay_after(2), Duration::from_millis(200));
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts, 1);
    }
}
