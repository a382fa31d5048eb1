pub mod caption_codec;
pub mod codec_error;
pub mod cue;
pub mod response_converter;
pub mod timestamp;
