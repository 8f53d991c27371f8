//! End-to-end extractor tests against real ffmpeg/ffprobe binaries. Every
//! test returns early when the tools are not installed.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::AtomicBool;

use tempfile::tempdir;

use telecine::error::PlayerError;
use telecine::extract;

fn command_available(name: &str, version_arg: &str) -> bool {
    Command::new(name)
        .arg(version_arg)
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

fn tools_available() -> bool {
    command_available("ffmpeg", "-version") && command_available("ffprobe", "-version")
}

/// One second of the ffmpeg test pattern at 15fps, encoded with the
/// always-built-in mpeg4 encoder.
fn synthesize_clip(dir: &Path) -> PathBuf {
    let clip = dir.join("clip.mp4");
    let status = Command::new("ffmpeg")
        .args([
            "-hide_banner",
            "-loglevel",
            "error",
            "-f",
            "lavfi",
            "-i",
            "testsrc=duration=1:size=64x48:rate=15",
            "-c:v",
            "mpeg4",
        ])
        .arg(&clip)
        .status()
        .expect("ffmpeg should run");
    assert!(status.success(), "test clip should encode");
    clip
}

#[test]
fn probe_reads_frame_rate_from_real_clip() {
    if !tools_available() {
        return;
    }
    let dir = tempdir().expect("tempdir should create");
    let clip = synthesize_clip(dir.path());

    let rate = extract::probe_frame_rate(&clip).expect("probe should succeed");
    assert!((rate - 15.0).abs() < 0.01, "expected 15fps, got {rate}");
}

#[test]
fn extraction_produces_numerically_ordered_stills() {
    if !tools_available() {
        return;
    }
    let dir = tempdir().expect("tempdir should create");
    let clip = synthesize_clip(dir.path());
    let output_dir = dir.path().join("frames");
    std::fs::create_dir(&output_dir).expect("output dir should create");

    let cancel = AtomicBool::new(false);
    let frames = extract::extract_frames(&clip, 15.0, &output_dir, &cancel)
        .expect("extraction should succeed");

    assert!(
        (14..=16).contains(&frames.len()),
        "one second at 15fps should yield about 15 stills, got {}",
        frames.len()
    );
    let stems = frames
        .iter()
        .map(|path| {
            path.file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(|stem| stem.parse::<u64>().ok())
                .expect("frame stems should be sequence numbers")
        })
        .collect::<Vec<_>>();
    assert_eq!(stems[0], 1, "sequence should start at 1");
    let mut sorted = stems.clone();
    sorted.sort_unstable();
    assert_eq!(stems, sorted, "frames should come back in sequence order");
}

#[test]
fn probe_rejects_non_video_input() {
    if !command_available("ffprobe", "-version") {
        return;
    }
    let dir = tempdir().expect("tempdir should create");
    let junk = dir.path().join("notes.txt");
    std::fs::write(&junk, "plain text, not a container").expect("junk file should write");

    let err = extract::probe_frame_rate(&junk).expect_err("probe should fail");
    assert!(matches!(err, PlayerError::Probe(_)), "got {err:?}");
}

#[test]
fn cancelled_extraction_stops_without_frames() {
    if !tools_available() {
        return;
    }
    let dir = tempdir().expect("tempdir should create");
    let clip = synthesize_clip(dir.path());
    let output_dir = dir.path().join("frames");
    std::fs::create_dir(&output_dir).expect("output dir should create");

    let cancel = AtomicBool::new(true);
    let err = extract::extract_frames(&clip, 15.0, &output_dir, &cancel)
        .expect_err("cancelled extraction should not succeed");
    assert!(matches!(err, PlayerError::Cancelled), "got {err:?}");
}
