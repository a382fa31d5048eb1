use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::artifact_registry::ArtifactRegistry;
use super::job::{
    partial_failure_warning, size_mb, FailedSegment, JobError, JobStage, Segment,
    TranscriptionJob, TranscriptionOutcome,
};
use super::progress::{ProgressEvent, ProgressSink};
use super::segment_dispatcher::{
    recognize_with_retry, DispatchContext, RetryPolicy, SegmentDispatcher, SegmentOutcome,
};
use crate::media::domain::audio_format::needs_transcode;
use crate::media::domain::media_transcoder::{MediaError, MediaTranscoder};
use crate::planning::domain::chunk_planner::ChunkPlanner;
use crate::recognition::domain::recognition_model::RecognitionModel;
use crate::recognition::domain::speaker_reference::EncodedSpeaker;
use crate::recognition::domain::speech_recognizer::SpeechRecognizer;
use crate::shared::constants::BYTES_PER_MB;
use crate::transcript::domain::caption_codec::combine_caption_segments;
use crate::transcript::domain::cue::Transcript;

/// Recognized transcript before speed rescaling and packaging.
struct Recognized {
    transcript: Transcript,
    total_chunks: Option<usize>,
    failed: Vec<FailedSegment>,
    total_duration: f64,
}

/// Runs one transcription job end to end.
///
/// Stage order is fixed: transcode → speed → compress → size check → split →
/// recognize → combine. Every intermediate file is registered with an
/// [`ArtifactRegistry`] and removed before `run` returns, whatever the outcome.
pub struct TranscribeAudioUseCase {
    transcoder: Box<dyn MediaTranscoder>,
    recognizer: Box<dyn SpeechRecognizer>,
    dispatcher: Box<dyn SegmentDispatcher>,
    planner: ChunkPlanner,
    retry: RetryPolicy,
    progress: ProgressSink,
    cancelled: Arc<AtomicBool>,
}

impl TranscribeAudioUseCase {
    pub fn new(
        transcoder: Box<dyn MediaTranscoder>,
        recognizer: Box<dyn SpeechRecognizer>,
        dispatcher: Box<dyn SegmentDispatcher>,
    ) -> Self {
        Self {
            transcoder,
            recognizer,
            dispatcher,
            planner: ChunkPlanner::default(),
            retry: RetryPolicy::default(),
            progress: ProgressSink::disabled(),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_planner(mut self, planner: ChunkPlanner) -> Self {
        self.planner = planner;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_progress(mut self, progress: ProgressSink) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_cancel_flag(mut self, cancelled: Arc<AtomicBool>) -> Self {
        self.cancelled = cancelled;
        self
    }

    /// Handle the caller can set to cancel the running job.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancelled.clone()
    }

    pub fn run(&self, job: &TranscriptionJob) -> Result<TranscriptionOutcome, JobError> {
        job.validate()?;
        let mut registry = ArtifactRegistry::new()?;
        log::info!(
            "Transcribing {} with {}",
            job.source.display(),
            job.model
        );

        let result = self.execute(job, &mut registry);
        registry.cleanup();

        match &result {
            Ok(outcome) => {
                log::debug!("stage: {}", JobStage::Done);
                if let Some(warning) = &outcome.warning {
                    log::warn!("{warning}");
                }
            }
            Err(e) => {
                log::debug!("stage: {}", JobStage::Failed);
                log::error!("Transcription of {} failed: {e}", job.source.display());
            }
        }
        result
    }

    fn execute(
        &self,
        job: &TranscriptionJob,
        registry: &mut ArtifactRegistry,
    ) -> Result<TranscriptionOutcome, JobError> {
        self.enter(JobStage::Planning)?;
        let tool_available = self.transcoder.is_available();
        if !tool_available {
            log::warn!("Media engine unavailable; only native uploads under the size limit will work");
        }

        let audio = self.prepare_audio(job, tool_available, registry)?;
        let speakers = self.prepare_speakers(job, tool_available, registry)?;

        let size = fs::metadata(&audio)?.len();
        let recognized = if self.planner.requires_split(size) {
            if !tool_available {
                return Err(JobError::FileTooLarge {
                    size_mb: size_mb(size),
                    limit_mb: self.planner.upload_limit_bytes() / BYTES_PER_MB,
                });
            }
            self.recognize_split(job, &audio, size, &speakers, registry)?
        } else {
            self.recognize_single(job, &audio, tool_available, &speakers)?
        };

        let Recognized {
            mut transcript,
            total_chunks,
            mut failed,
            mut total_duration,
        } = recognized;

        if let Some(multiplier) = job.effective_speed() {
            transcript = transcript.scaled(multiplier)?;
            total_duration *= multiplier;
            for segment in &mut failed {
                segment.duration *= multiplier;
            }
        }
        let transcript = transcript.with_diarized(job.model.is_diarized());

        let warning = total_chunks
            .and_then(|total| partial_failure_warning(&failed, total, total_duration));
        Ok(TranscriptionOutcome {
            text: transcript.plain_text(),
            transcript: transcript.to_document(),
            chunked: total_chunks.is_some(),
            total_chunks,
            is_diarized: transcript.is_diarized(),
            warning,
            failed_chunks: (!failed.is_empty()).then_some(failed),
        })
    }

    /// Transcode, speed adjustment and compression, in that order.
    fn prepare_audio(
        &self,
        job: &TranscriptionJob,
        tool_available: bool,
        registry: &mut ArtifactRegistry,
    ) -> Result<PathBuf, JobError> {
        let mut audio = job.source.clone();

        if needs_transcode(&audio) {
            require_tool(tool_available, "format conversion")?;
            self.enter(JobStage::Transcoding)?;
            self.progress.emit(ProgressEvent::Converting);
            let converted = self.transcoder.transcode(&audio, registry.work_dir())?;
            registry.register_file(&converted);
            audio = converted;
        }

        if let Some(multiplier) = job.effective_speed() {
            require_tool(tool_available, "speed adjustment")?;
            self.enter(JobStage::AdjustingSpeed)?;
            self.progress.emit(ProgressEvent::Optimizing {
                multiplier_percent: (multiplier * 100.0).round() as u32,
            });
            let adjusted = self
                .transcoder
                .adjust_speed(&audio, multiplier, registry.work_dir())?;
            registry.register_file(&adjusted);
            audio = adjusted;
        }

        if job.compress {
            if tool_available {
                self.enter(JobStage::Compressing)?;
                self.progress.emit(ProgressEvent::Compressing);
                match self.transcoder.compress(&audio, registry.work_dir()) {
                    Ok(compressed) => {
                        registry.register_file(&compressed);
                        audio = compressed;
                    }
                    Err(MediaError::Cancelled) => return Err(JobError::Cancelled),
                    Err(e) => log::warn!("Compression failed, continuing uncompressed: {e}"),
                }
            } else {
                log::warn!("Compression skipped: media engine unavailable");
            }
        }

        Ok(audio)
    }

    /// Encodes the speaker references for the diarizing model.
    fn prepare_speakers(
        &self,
        job: &TranscriptionJob,
        tool_available: bool,
        registry: &mut ArtifactRegistry,
    ) -> Result<Vec<EncodedSpeaker>, JobError> {
        if job.speakers.is_empty() {
            return Ok(Vec::new());
        }
        if !job.model.is_diarized() {
            log::warn!(
                "Ignoring {} speaker reference(s): {} does not diarize",
                job.speakers.len(),
                job.model
            );
            return Ok(Vec::new());
        }

        let mut encoded = Vec::with_capacity(job.speakers.len());
        for (index, speaker) in job.speakers.iter().enumerate() {
            let reference = if tool_available {
                match self
                    .transcoder
                    .prepare_reference_clip(&speaker.path, index, registry.work_dir())
                {
                    Ok(clip) => {
                        registry.register_file(&clip);
                        speaker.with_path(&clip)
                    }
                    Err(MediaError::Cancelled) => return Err(JobError::Cancelled),
                    Err(e) => {
                        log::warn!("Using speaker clip for '{}' as-is: {e}", speaker.name);
                        speaker.clone()
                    }
                }
            } else {
                speaker.clone()
            };
            let speaker_encoded = reference.encode().map_err(|e| {
                JobError::InvalidRequest(format!(
                    "could not read speaker reference for '{}': {e}",
                    speaker.name
                ))
            })?;
            encoded.push(speaker_encoded);
        }
        Ok(encoded)
    }

    fn recognize_single(
        &self,
        job: &TranscriptionJob,
        audio: &Path,
        tool_available: bool,
        speakers: &[EncodedSpeaker],
    ) -> Result<Recognized, JobError> {
        // Only the flat-JSON model needs a duration, to bound its single cue.
        let duration = if job.model == RecognitionModel::FlatJson && tool_available {
            match self.transcoder.probe_duration(audio) {
                Ok(d) => d,
                Err(e) => {
                    log::debug!("Could not probe duration for {}: {e}", audio.display());
                    0.0
                }
            }
        } else {
            0.0
        };

        self.enter(JobStage::Recognizing)?;
        self.progress
            .emit(ProgressEvent::Transcribing { current: 1, total: 1 });
        let segment = Segment::new(0, audio, duration);
        let ctx = self.context(job, speakers);
        let captions = match recognize_with_retry(&ctx, &segment, ctx.prompt) {
            SegmentOutcome::Recognized(result) => result.captions,
            SegmentOutcome::Failed { error, .. } => return Err(JobError::from_recognition(&error)),
            SegmentOutcome::Cancelled => return Err(JobError::Cancelled),
        };

        Ok(Recognized {
            transcript: Transcript::parse(&captions)?,
            total_chunks: None,
            failed: Vec::new(),
            total_duration: duration,
        })
    }

    fn recognize_split(
        &self,
        job: &TranscriptionJob,
        audio: &Path,
        size: u64,
        speakers: &[EncodedSpeaker],
        registry: &mut ArtifactRegistry,
    ) -> Result<Recognized, JobError> {
        let duration = self.transcoder.probe_duration(audio)?;
        let plan = self.planner.plan_split(size, duration)?;
        log::info!(
            "Splitting {:.1}MB into {} segments of {}s",
            size_mb(size),
            plan.segment_count,
            plan.segment_duration
        );

        self.enter(JobStage::Splitting)?;
        self.progress.emit(ProgressEvent::Splitting {
            segments: plan.segment_count,
        });
        let segment_dir = registry.create_dir("segments")?;
        let mut segments = Vec::with_capacity(plan.segment_count);
        for (index, (start, length)) in plan.segment_bounds().into_iter().enumerate() {
            self.check_cancelled()?;
            let path = self
                .transcoder
                .cut_segment(audio, index, start, length, &segment_dir)?;
            registry.register_file(&path);
            segments.push(Segment::new(index, path, length));
        }

        self.enter(JobStage::Recognizing)?;
        let ctx = self.context(job, speakers);
        let report = self.dispatcher.dispatch(&segments, &ctx);
        if report.cancelled {
            return Err(JobError::Cancelled);
        }

        self.enter(JobStage::Combining)?;
        self.progress.emit(ProgressEvent::Combining);
        let mut results = report.results;
        results.sort_by_key(|r| r.index);
        let mut documents = vec![String::new(); segments.len()];
        for result in results {
            if let Some(slot) = documents.get_mut(result.index) {
                *slot = result.captions;
            }
        }
        let durations: Vec<f64> = segments.iter().map(|s| s.duration).collect();
        let transcript = combine_caption_segments(&documents, &durations)?;

        let mut failed = report.failed;
        failed.sort_by_key(|f| f.index);
        Ok(Recognized {
            transcript,
            total_chunks: Some(segments.len()),
            failed,
            total_duration: durations.iter().sum(),
        })
    }

    fn context<'a>(
        &'a self,
        job: &'a TranscriptionJob,
        speakers: &'a [EncodedSpeaker],
    ) -> DispatchContext<'a> {
        DispatchContext {
            recognizer: &*self.recognizer,
            model: job.model,
            prompt: job.prompt.as_deref(),
            speakers,
            retry: self.retry,
            cancelled: &self.cancelled,
            progress: &self.progress,
        }
    }

    fn enter(&self, stage: JobStage) -> Result<(), JobError> {
        self.check_cancelled()?;
        log::debug!("stage: {stage}");
        Ok(())
    }

    fn check_cancelled(&self) -> Result<(), JobError> {
        if self.cancelled.load(Ordering::Relaxed) {
            Err(JobError::Cancelled)
        } else {
            Ok(())
        }
    }
}

fn require_tool(available: bool, operation: &'static str) -> Result<(), JobError> {
    if available {
        Ok(())
    } else {
        Err(JobError::ToolUnavailable { operation })
    }
}
