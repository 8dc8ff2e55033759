//! FFprobe duration lookup.

use std::path::Path;
use std::process::Stdio;
use serde::Deserialize;
use tokio::process::Command;

use crate::error::{EngineError, EngineResult};

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

/// Container duration of a media file in milliseconds. Returns 0 when
/// the container does not report one; callers treat that as "duration
/// unknown" and skip percentage reporting.
pub async fn probe_duration_ms(path: impl AsRef<Path>) -> EngineResult<i64> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(EngineError::FileNotFound(path.to_path_buf()));
    }

    which::which("ffprobe").map_err(|_| EngineError::FfprobeNotFound)?;

    let output = Command::new("ffprobe")
        .args(["-v", "quiet", "-print_format", "json", "-show_format"])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        return Err(EngineError::FfprobeFailed {
            message: String::from_utf8_lossy(&output.stderr).to_string(),
        });
    }

    let probe: FfprobeOutput = serde_json::from_slice(&output.stdout)?;

    let duration_secs = probe
        .format
        .duration
        .as_deref()
        .and_then(|d| d.parse::<f64>().ok())
        .unwrap_or(0.0);

    Ok((duration_secs * 1000.0) as i64)
}
