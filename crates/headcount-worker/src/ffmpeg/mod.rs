//! FFmpeg-backed decoding and encoding.

mod sink;
mod source;
mod stream_info;

pub use sink::{FfmpegSink, FfmpegSinkFactory};
pub use source::{FfmpegSource, FfmpegSourceOpener};
pub use stream_info::{parse_frame_rate, read_stream_info};
