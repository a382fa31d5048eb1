use std::env;
use std::fs;
use std::path::PathBuf;
use std::process;
use std::thread;
use std::time::Duration;

use clap::Parser;

use chunkscribe_core::media::infrastructure::ffmpeg_cli_transcoder::FfmpegCliTranscoder;
use chunkscribe_core::pipeline::infrastructure::sequential_context_dispatcher::SequentialContextDispatcher;
use chunkscribe_core::pipeline::infrastructure::threaded_segment_dispatcher::ThreadedSegmentDispatcher;
use chunkscribe_core::pipeline::job::{ErrorReport, TranscriptionJob};
use chunkscribe_core::pipeline::progress;
use chunkscribe_core::pipeline::segment_dispatcher::{RetryPolicy, SegmentDispatcher};
use chunkscribe_core::pipeline::transcribe_audio_use_case::TranscribeAudioUseCase;
use chunkscribe_core::recognition::domain::recognition_model::RecognitionModel;
use chunkscribe_core::recognition::domain::speaker_reference::SpeakerReference;
use chunkscribe_core::recognition::infrastructure::http_speech_recognizer::HttpSpeechRecognizer;
use chunkscribe_core::shared::settings::Settings;

const API_KEY_VAR: &str = "OPENAI_API_KEY";

/// Transcribe audio files of any length with a speech-to-text API.
#[derive(Parser, Debug)]
#[command(name = "chunkscribe", version)]
struct Cli {
    /// Audio or video file to transcribe.
    #[arg(required_unless_present = "init_config")]
    input: Option<PathBuf>,

    /// Recognition model: whisper-1, gpt-4o-transcribe or gpt-4o-transcribe-diarize.
    #[arg(long)]
    model: Option<RecognitionModel>,

    /// Vocabulary or context hint passed to the model.
    #[arg(long)]
    prompt: Option<String>,

    /// Known speaker clip for diarization (repeatable, up to 4).
    #[arg(long = "speaker", value_name = "NAME=PATH")]
    speakers: Vec<SpeakerReference>,

    /// Speed the audio up before upload (1.0-3.0).
    #[arg(long)]
    speed: Option<f64>,

    /// Re-encode to low-bitrate mono before upload.
    #[arg(long)]
    compress: bool,

    /// Concurrent recognition requests for split files.
    #[arg(long)]
    workers: Option<usize>,

    /// Recognize segments one by one, prompting each with the previous one's text.
    #[arg(long)]
    sequential_context: bool,

    /// Write the caption document to this file.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print the full result as JSON instead of plain text.
    #[arg(long)]
    json: bool,

    /// API key (defaults to $OPENAI_API_KEY).
    #[arg(long)]
    api_key: Option<String>,

    /// Base URL of an OpenAI-compatible API.
    #[arg(long)]
    api_base_url: Option<String>,

    /// Settings file (defaults to the platform config directory).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the current settings to the settings file and exit.
    #[arg(long)]
    init_config: bool,
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();
    let json = cli.json;
    if let Err(e) = run(cli) {
        if json {
            let report = ErrorReport {
                error: e.to_string(),
            };
            match serde_json::to_string(&report) {
                Ok(body) => println!("{body}"),
                Err(_) => eprintln!("Error: {e}"),
            }
        } else {
            eprintln!("Error: {e}");
        }
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let settings_path = cli.config.clone().or_else(Settings::config_path);
    let settings = settings_path
        .as_deref()
        .map(Settings::load_from)
        .unwrap_or_default();

    if cli.init_config {
        let path = settings_path.ok_or("No configuration directory available")?;
        settings.save_to(&path)?;
        eprintln!("Settings written to {}", path.display());
        return Ok(());
    }
    let input = cli.input.ok_or("An input file is required")?;

    let model = match cli.model {
        Some(model) => model,
        None => settings.default_model.parse::<RecognitionModel>()?,
    };
    let api_key = cli
        .api_key
        .or_else(|| env::var(API_KEY_VAR).ok())
        .filter(|key| !key.trim().is_empty())
        .ok_or_else(|| format!("No API key: set {API_KEY_VAR} or pass --api-key"))?;
    let base_url = cli
        .api_base_url
        .unwrap_or_else(|| settings.api_base_url.clone());

    let transcoder = FfmpegCliTranscoder::new(&settings.ffmpeg_path, &settings.ffprobe_path);
    let recognizer = HttpSpeechRecognizer::new(
        &base_url,
        api_key,
        Duration::from_secs(settings.request_timeout_secs),
    )?;
    let dispatcher: Box<dyn SegmentDispatcher> = if cli.sequential_context {
        Box::new(SequentialContextDispatcher)
    } else {
        Box::new(ThreadedSegmentDispatcher::new(
            cli.workers.unwrap_or(settings.worker_count),
        ))
    };

    let (sink, events) = progress::channel();
    let printer = thread::spawn(move || {
        for event in events {
            eprintln!("{event}");
        }
    });

    let use_case = TranscribeAudioUseCase::new(Box::new(transcoder), Box::new(recognizer), dispatcher)
        .with_retry(RetryPolicy::new(
            settings.max_attempts,
            Duration::from_millis(settings.retry_backoff_ms),
        ))
        .with_progress(sink);

    let mut job = TranscriptionJob::new(&input, model)
        .with_speakers(cli.speakers)
        .with_compression(cli.compress);
    if let Some(prompt) = cli.prompt {
        job = job.with_prompt(prompt);
    }
    if let Some(speed) = cli.speed {
        job = job.with_speed(speed);
    }

    let result = use_case.run(&job);
    drop(use_case);
    let _ = printer.join();
    let outcome = result?;

    if let Some(path) = &cli.output {
        fs::write(path, &outcome.transcript)?;
        log::info!("Transcript written to {}", path.display());
    }

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        if let Some(warning) = &outcome.warning {
            eprintln!("Warning: {warning}");
        }
        println!("{}", outcome.text);
    }
    Ok(())
}
