//! FFmpeg CLI wrapper for video processing.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building
//! - Progress parsing from `-progress pipe:2`
//! - The [`TranscodeEngine`] seam: an engine turns a transcode request
//!   into an ordered stream of [`EngineEvent`]s, so job bookkeeping can
//!   be tested without a real FFmpeg binary

pub mod command;
pub mod engine;
pub mod error;
pub mod probe;
pub mod progress;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use engine::{EngineEvent, FfmpegEngine, TranscodeEngine, TranscodeSpec};
pub use error::{EngineError, EngineResult};
pub use probe::probe_duration_ms;
pub use progress::FfmpegProgress;
