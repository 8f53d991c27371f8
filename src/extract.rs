//! Frame Extractor: out-of-process ffprobe/ffmpeg invocations that turn a
//! video file into a frame rate plus an ordered set of still images.

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use serde::Deserialize;

use crate::error::PlayerError;

/// Poll interval while waiting on the extraction process.
const EXTRACT_POLL: Duration = Duration::from_millis(25);
/// Longest stderr excerpt carried into an error message.
const STDERR_TAIL_CHARS: usize = 500;

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    r_frame_rate: String,
}

/// Frames per second of the first video stream.
pub fn probe_frame_rate(path: &Path) -> Result<f64, PlayerError> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=r_frame_rate",
            "-of",
            "json",
        ])
        .arg(path)
        .output()
        .map_err(|err| PlayerError::Probe(spawn_failure("ffprobe", &err)))?;

    if !output.status.success() {
        return Err(PlayerError::Probe(tool_failure("ffprobe", &output)));
    }

    let parsed: ProbeOutput = serde_json::from_slice(&output.stdout)
        .map_err(|err| PlayerError::Probe(format!("unreadable ffprobe output: {err}")))?;

    let stream = parsed
        .streams
        .first()
        .ok_or_else(|| PlayerError::Probe("no video streams found".to_owned()))?;

    parse_rational_fps(&stream.r_frame_rate)
}

fn parse_rational_fps(raw: &str) -> Result<f64, PlayerError> {
    let (num, den) = raw
        .split_once('/')
        .ok_or_else(|| PlayerError::Probe(format!("invalid r_frame_rate format: {raw}")))?;

    let num: f64 = num
        .trim()
        .parse()
        .map_err(|_| PlayerError::Probe(format!("invalid r_frame_rate numerator: {raw}")))?;
    let den: f64 = den
        .trim()
        .parse()
        .map_err(|_| PlayerError::Probe(format!("invalid r_frame_rate denominator: {raw}")))?;

    let rate = num / den;
    if !rate.is_finite() || rate <= 0.0 {
        return Err(PlayerError::Probe(format!("non-positive frame rate: {raw}")));
    }
    Ok(rate)
}

/// Writes one still per frame into `output_dir` as `1.jpg`, `2.jpg`, ... and
/// returns the paths ordered by that sequence number. Checks `cancel`
/// between polls and kills the external process when it flips.
pub fn extract_frames(
    path: &Path,
    frame_rate: f64,
    output_dir: &Path,
    cancel: &AtomicBool,
) -> Result<Vec<PathBuf>, PlayerError> {
    let mut child = Command::new("ffmpeg")
        .args(["-hide_banner", "-loglevel", "error"])
        .arg("-i")
        .arg(path)
        .arg("-vf")
        .arg(format!("fps=fps={frame_rate}"))
        .arg(output_dir.join("%d.jpg"))
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|err| PlayerError::Extraction(spawn_failure("ffmpeg", &err)))?;

    // Drain stderr on a side thread so a chatty process can never fill the
    // pipe and wedge the poll loop below.
    let stderr_pipe = child.stderr.take();
    let stderr_reader = thread::spawn(move || {
        let mut buffer = String::new();
        if let Some(mut pipe) = stderr_pipe {
            let _ = pipe.read_to_string(&mut buffer);
        }
        buffer
    });

    let status = loop {
        if cancel.load(Ordering::Relaxed) {
            let _ = child.kill();
            let _ = child.wait();
            let _ = stderr_reader.join();
            return Err(PlayerError::Cancelled);
        }
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => thread::sleep(EXTRACT_POLL),
            Err(err) => {
                let _ = child.kill();
                let _ = child.wait();
                let _ = stderr_reader.join();
                return Err(PlayerError::Extraction(format!("failed to wait on ffmpeg: {err}")));
            }
        }
    };

    let stderr = stderr_reader.join().unwrap_or_default();
    if !status.success() {
        return Err(PlayerError::Extraction(exit_failure("ffmpeg", &status, &stderr)));
    }

    let frames = list_frames_numeric(output_dir)?;
    if frames.is_empty() {
        return Err(PlayerError::Extraction("no frames were produced".to_owned()));
    }
    Ok(frames)
}

/// Frame stills in `dir`, ordered by the numeric value of each filename's
/// sequence number. Lexical order would put `10.jpg` before `2.jpg`.
fn list_frames_numeric(dir: &Path) -> Result<Vec<PathBuf>, PlayerError> {
    let entries = fs::read_dir(dir).map_err(|err| {
        PlayerError::Extraction(format!("unreadable output directory {}: {err}", dir.display()))
    })?;

    let mut frames = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| {
            PlayerError::Extraction(format!("unreadable output directory {}: {err}", dir.display()))
        })?;
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("jpg") {
            continue;
        }
        let Some(sequence) = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .and_then(|stem| stem.parse::<u64>().ok())
        else {
            continue;
        };
        frames.push((sequence, path));
    }

    frames.sort_by_key(|(sequence, _)| *sequence);
    Ok(frames.into_iter().map(|(_, path)| path).collect())
}

fn spawn_failure(tool: &str, err: &io::Error) -> String {
    if err.kind() == io::ErrorKind::NotFound {
        format!("{tool} executable not found. Install ffmpeg and ensure it is on PATH")
    } else {
        format!("failed to run {tool}: {err}")
    }
}

fn tool_failure(tool: &str, output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    exit_failure(tool, &output.status, &stderr)
}

fn exit_failure(tool: &str, status: &std::process::ExitStatus, stderr: &str) -> String {
    let tail = last_n_chars(stderr.trim(), STDERR_TAIL_CHARS);
    if tail.is_empty() {
        format!("{tool} exited with {status}")
    } else {
        format!("{tool} exited with {status}: {tail}")
    }
}

fn last_n_chars(s: &str, n: usize) -> String {
    let count = s.chars().count();
    if count <= n {
        s.to_owned()
    } else {
        s.chars().skip(count - n).collect()
    }
}
