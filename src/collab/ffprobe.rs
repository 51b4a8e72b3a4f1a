//! Video signatures via ffprobe.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::OnceLock;

use serde::Deserialize;

use super::{CollaboratorError, VideoProbe, VideoSignature};

const TOOL: &str = "ffprobe";

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    format: Option<ProbeFormat>,
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    format_name: Option<String>,
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_name: Option<String>,
    duration: Option<String>,
}

/// Build a signature from ffprobe's JSON output.
///
/// The container duration is preferred; the first video stream's duration
/// is used when the container has none. Returns `None` when neither parses.
///
/// # Errors
///
/// Returns an error if the output is not ffprobe JSON.
pub fn parse_probe_output(json: &str) -> Result<Option<VideoSignature>, CollaboratorError> {
    let output: ProbeOutput = serde_json::from_str(json).map_err(|source| {
        CollaboratorError::Parse {
            tool: TOOL.to_string(),
            source,
        }
    })?;

    let stream = output.streams.first();
    let duration = output
        .format
        .as_ref()
        .and_then(|f| f.duration.as_deref())
        .and_then(parse_duration)
        .or_else(|| {
            stream
                .and_then(|s| s.duration.as_deref())
                .and_then(parse_duration)
        });

    Ok(duration.map(|duration_secs| VideoSignature {
        duration_secs,
        codec: stream.and_then(|s| s.codec_name.clone()),
        container: output.format.and_then(|f| f.format_name),
    }))
}

fn parse_duration(s: &str) -> Option<f64> {
    s.trim()
        .parse::<f64>()
        .ok()
        .filter(|d| d.is_finite() && *d > 0.0)
}

/// Video probe backed by the ffprobe executable.
#[derive(Debug)]
pub struct FfProbe {
    program: PathBuf,
    available: OnceLock<bool>,
}

impl FfProbe {
    /// Use `program`, or `ffprobe` from `PATH` when `None`.
    #[must_use]
    pub fn new(program: Option<PathBuf>) -> Self {
        Self {
            program: program.unwrap_or_else(|| PathBuf::from(TOOL)),
            available: OnceLock::new(),
        }
    }
}

impl VideoProbe for FfProbe {
    fn name(&self) -> &str {
        TOOL
    }

    fn is_available(&self) -> bool {
        *self.available.get_or_init(|| {
            let ok = Command::new(&self.program)
                .arg("-version")
                .output()
                .is_ok_and(|o| o.status.success());
            if ok {
                log::info!("ffprobe found: {}", self.program.display());
            }
            ok
        })
    }

    fn probe(&self, path: &Path) -> Result<Option<VideoSignature>, CollaboratorError> {
        let output = Command::new(&self.program)
            .args([
                "-v",
                "error",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
                "-select_streams",
                "v:0",
            ])
            .arg(path)
            .output()
            .map_err(|source| CollaboratorError::Unavailable {
                tool: TOOL.to_string(),
                source,
            })?;

        if !output.status.success() {
            return Err(CollaboratorError::Failed {
                tool: TOOL.to_string(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let signature = parse_probe_output(&String::from_utf8_lossy(&output.stdout))?;
        if let Some(ref sig) = signature {
            log::trace!(
                "Probed {}: {:.3}s {:?}",
                path.display(),
                sig.duration_secs,
                sig.codec
            );
        }
        Ok(signature)
    }
}
