use std::path::Path;
use std::process::Command;

use tempfile::tempdir;

fn run_telecine(cwd: &Path, args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_telecine"))
        .current_dir(cwd)
        .args(args)
        .output()
        .expect("telecine command should run")
}

#[test]
fn missing_file_fails_before_any_probing() {
    let dir = tempdir().expect("tempdir should create");
    let output = run_telecine(dir.path(), &["missing.mp4"]);

    assert!(!output.status.success(), "missing file should fail");
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("file does not exist: missing.mp4"),
        "stderr should name the missing file, got: {stderr}"
    );
}

#[test]
fn no_arguments_is_a_usage_error() {
    let dir = tempdir().expect("tempdir should create");
    let output = run_telecine(dir.path(), &[]);

    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Usage"), "clap should print usage, got: {stderr}");
}

#[test]
fn help_lists_playback_flags() {
    let dir = tempdir().expect("tempdir should create");
    let output = run_telecine(dir.path(), &["--help"]);

    assert!(output.status.success(), "help should succeed");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("--auto-play"));
    assert!(stdout.contains("--auto-repeat"));
    assert!(stdout.contains("Video file to play"));
}

#[test]
fn version_names_the_binary() {
    let dir = tempdir().expect("tempdir should create");
    let output = run_telecine(dir.path(), &["--version"]);

    assert!(output.status.success(), "version should succeed");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("telecine"), "got: {stdout}");
    assert!(
        stdout.contains(env!("CARGO_PKG_VERSION")),
        "version output should carry the package version, got: {stdout}"
    );
}
