pub mod ffmpeg_cli_transcoder;
