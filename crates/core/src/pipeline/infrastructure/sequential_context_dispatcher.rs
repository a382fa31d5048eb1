use crate::pipeline::job::Segment;
use crate::pipeline::progress::ProgressEvent;
use crate::pipeline::segment_dispatcher::{
    recognize_with_retry, DispatchContext, DispatchReport, SegmentDispatcher, SegmentOutcome,
};
use crate::transcript::domain::caption_codec::to_plain_text;

/// Words of the previous segment carried into the next prompt.
pub const CONTEXT_TAIL_WORDS: usize = 50;

/// Recognizes segments one at a time, prompting each with the tail of the
/// previous segment's text.
///
/// Slower than the threaded pool but keeps names and spelling consistent
/// across segment boundaries. Only models that accept a prompt get the
/// carried context.
#[derive(Debug, Default)]
pub struct SequentialContextDispatcher;

impl SegmentDispatcher for SequentialContextDispatcher {
    fn dispatch(&self, segments: &[Segment], ctx: &DispatchContext<'_>) -> DispatchReport {
        let total = segments.len();
        let mut report = DispatchReport::default();
        let mut previous_text = String::new();

        for segment in segments {
            if ctx.is_cancelled() {
                report.cancelled = true;
                break;
            }
            ctx.progress.emit(ProgressEvent::Transcribing {
                current: segment.index + 1,
                total,
            });

            let prompt = if ctx.model.supports_prompt() {
                context_prompt(ctx.prompt, &previous_text)
            } else {
                None
            };
            let outcome = recognize_with_retry(ctx, segment, prompt.as_deref());
            previous_text = match &outcome {
                SegmentOutcome::Recognized(result) => to_plain_text(&result.captions),
                _ => String::new(),
            };
            report.record(outcome);
        }

        report
    }
}

/// Joins the caller's prompt with the last words of the previous segment.
fn context_prompt(base: Option<&str>, previous_text: &str) -> Option<String> {
    let words: Vec<&str> = previous_text.split_whitespace().collect();
    let tail = words[words.len().saturating_sub(CONTEXT_TAIL_WORDS)..].join(" ");
    let base = base.map(str::trim).filter(|b| !b.is_empty());
    match (base, tail.is_empty()) {
        (None, true) => None,
        (Some(base), true) => Some(base.to_string()),
        (None, false) => Some(tail),
        (Some(base), false) => Some(format!("{base}\n\n{tail}")),
    }
}
