use std::thread;

use crate::pipeline::job::Segment;
use crate::pipeline::progress::ProgressEvent;
use crate::pipeline::segment_dispatcher::{
    recognize_with_retry, DispatchContext, DispatchReport, SegmentDispatcher, SegmentOutcome,
};
use crate::shared::constants::DEFAULT_WORKER_COUNT;

/// Dispatches segments to a fixed-size pool of worker threads.
///
/// Layout: `feeder → [worker × N] → collector`
///
/// The feeder hands segments out in index order through a bounded channel,
/// so at most `worker_count` recognition calls are in flight. Completion
/// order is arbitrary; callers re-sort by index.
pub struct ThreadedSegmentDispatcher {
    worker_count: usize,
}

impl ThreadedSegmentDispatcher {
    pub fn new(worker_count: usize) -> Self {
        Self {
            worker_count: worker_count.max(1),
        }
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }
}

impl Default for ThreadedSegmentDispatcher {
    fn default() -> Self {
        Self::new(DEFAULT_WORKER_COUNT)
    }
}

impl SegmentDispatcher for ThreadedSegmentDispatcher {
    fn dispatch(&self, segments: &[Segment], ctx: &DispatchContext<'_>) -> DispatchReport {
        let total = segments.len();
        let workers = self.worker_count.min(total).max(1);
        let (segment_tx, segment_rx) = crossbeam_channel::bounded::<&Segment>(workers);
        let (outcome_tx, outcome_rx) = crossbeam_channel::unbounded::<SegmentOutcome>();
        let mut report = DispatchReport::default();

        thread::scope(|scope| {
            for _ in 0..workers {
                let segment_rx = segment_rx.clone();
                let outcome_tx = outcome_tx.clone();
                scope.spawn(move || {
                    for segment in segment_rx {
                        let outcome = recognize_with_retry(ctx, segment, ctx.prompt);
                        if outcome_tx.send(outcome).is_err() {
                            break;
                        }
                    }
                });
            }
            drop(segment_rx);
            drop(outcome_tx);

            for segment in segments {
                if ctx.is_cancelled() {
                    log::info!("Cancelled; not dispatching segment {} onwards", segment.index);
                    report.cancelled = true;
                    break;
                }
                ctx.progress.emit(ProgressEvent::Transcribing {
                    current: segment.index + 1,
                    total,
                });
                if segment_tx.send(segment).is_err() {
                    break;
                }
            }
            drop(segment_tx);

            for outcome in outcome_rx {
                report.record(outcome);
            }
        });

        report
    }
}
