//! Transcode engine seam.
//!
//! An engine accepts a [`TranscodeSpec`] and reports its lifecycle as
//! an ordered stream of [`EngineEvent`]s over a channel: `Started`
//! first, any number of `Progress` ticks, then exactly one of
//! `Completed` or `Failed`. Dropping the receiver is the cancellation
//! signal; the FFmpeg implementation kills the child process when it
//! can no longer deliver events.

use std::path::PathBuf;

use tokio::sync::mpsc;
use tracing::{debug, error};

use vscrub_models::Operation;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::probe::probe_duration_ms;

/// Lifecycle event emitted by a running transcode.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Work has begun on the input.
    Started,
    /// Percent complete, 0..=100. May repeat or skip values.
    Progress(u8),
    /// The output file is fully written.
    Completed,
    /// The transcode failed; no usable output exists.
    Failed(String),
}

/// One transcode request.
#[derive(Debug, Clone)]
pub struct TranscodeSpec {
    pub input: PathBuf,
    pub output: PathBuf,
    pub operation: Operation,
}

/// Something that can execute a [`TranscodeSpec`] asynchronously.
pub trait TranscodeEngine: Send + Sync {
    /// Begin the transcode and return the event stream. The engine owns
    /// the work from here; the caller only observes events.
    fn spawn(&self, spec: TranscodeSpec) -> mpsc::Receiver<EngineEvent>;
}

/// Map an operation to its FFmpeg invocation.
fn command_for(spec: &TranscodeSpec) -> FfmpegCommand {
    let cmd = FfmpegCommand::new(&spec.input, &spec.output);
    match spec.operation {
        // Blur the frame; watermarks are not localized, so the whole
        // picture gets the treatment
        Operation::RemoveWatermark => cmd.video_filter("boxblur=5:1").audio_codec("copy"),
        // Stream copy minus subtitle tracks
        Operation::RemoveSubtitle => cmd.no_subtitles().video_codec("copy").audio_codec("copy"),
        Operation::Batch => cmd.video_codec("libx264").crf(23).audio_codec("aac"),
        Operation::Custom => cmd
            .video_codec("libx264")
            .preset("medium")
            .crf(18)
            .audio_codec("aac")
            .audio_bitrate("192k"),
    }
}

/// Engine backed by the system FFmpeg binary.
pub struct FfmpegEngine {
    timeout_secs: Option<u64>,
}

impl FfmpegEngine {
    pub fn new(timeout_secs: Option<u64>) -> Self {
        Self { timeout_secs }
    }
}

impl TranscodeEngine for FfmpegEngine {
    fn spawn(&self, spec: TranscodeSpec) -> mpsc::Receiver<EngineEvent> {
        let (tx, rx) = mpsc::channel(64);
        let timeout_secs = self.timeout_secs;

        tokio::spawn(async move {
            if tx.send(EngineEvent::Started).await.is_err() {
                return;
            }

            // Duration is only needed for percentage reporting; a probe
            // failure degrades to progress-free execution
            let total_ms = probe_duration_ms(&spec.input).await.unwrap_or(0);

            let mut runner = FfmpegRunner::new();
            if let Some(secs) = timeout_secs {
                runner = runner.with_timeout(secs);
            }

            let cmd = command_for(&spec);
            let progress_tx = tx.clone();
            let run = runner.run_with_progress(&cmd, move |progress| {
                if total_ms > 0 {
                    // Backpressure drops ticks, never blocks ffmpeg
                    let _ = progress_tx
                        .try_send(EngineEvent::Progress(progress.percentage(total_ms)));
                }
            });

            // Dropping the run future kills the child (kill_on_drop)
            let result = tokio::select! {
                result = run => result,
                _ = tx.closed() => {
                    debug!(input = %spec.input.display(), "receiver dropped, aborting transcode");
                    // The killed child may have left a partial output
                    let _ = tokio::fs::remove_file(&spec.output).await;
                    return;
                }
            };

            match result {
                Ok(()) => {
                    debug!(output = %spec.output.display(), "transcode complete");
                    let _ = tx.send(EngineEvent::Completed).await;
                }
                Err(e) => {
                    error!(error = %e, input = %spec.input.display(), "transcode failed");
                    let _ = tx.send(EngineEvent::Failed(e.to_string())).await;
                }
            }
        });

        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec_for(operation: Operation) -> TranscodeSpec {
        TranscodeSpec {
            input: "in.mp4".into(),
            output: "out.mp4".into(),
            operation,
        }
    }

    #[test]
    fn test_remove_watermark_blurs_and_copies_audio() {
        let args = command_for(&spec_for(Operation::RemoveWatermark)).build_args();
        let vf = args.iter().position(|a| a == "-vf").unwrap();
        assert_eq!(args[vf + 1], "boxblur=5:1");
        let ca = args.iter().position(|a| a == "-c:a").unwrap();
        assert_eq!(args[ca + 1], "copy");
    }

    #[test]
    fn test_remove_subtitle_is_pure_stream_copy() {
        let args = command_for(&spec_for(Operation::RemoveSubtitle)).build_args();
        assert!(args.contains(&"-sn".to_string()));
        let cv = args.iter().position(|a| a == "-c:v").unwrap();
        assert_eq!(args[cv + 1], "copy");
        // No re-encode flags
        assert!(!args.contains(&"-crf".to_string()));
    }

    #[test]
    fn test_batch_reencodes_at_crf_23() {
        let args = command_for(&spec_for(Operation::Batch)).build_args();
        let crf = args.iter().position(|a| a == "-crf").unwrap();
        assert_eq!(args[crf + 1], "23");
    }

    #[test]
    fn test_custom_uses_high_quality_preset() {
        let args = command_for(&spec_for(Operation::Custom)).build_args();
        let preset = args.iter().position(|a| a == "-preset").unwrap();
        assert_eq!(args[preset + 1], "medium");
        let crf = args.iter().position(|a| a == "-crf").unwrap();
        assert_eq!(args[crf + 1], "18");
        let ba = args.iter().position(|a| a == "-b:a").unwrap();
        assert_eq!(args[ba + 1], "192k");
    }
}
