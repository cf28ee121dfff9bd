//! Runs the `logroll` binary end to end.

use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};

use tempfile::tempdir;

const INPUT: &[u8] = b"alpha\nbeta\ngamma\n";

fn run_logroll(args: &[&str], input: &[u8]) -> Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_logroll"))
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();

    // dropping stdin closes it, which ends the run
    child.stdin.take().unwrap().write_all(input).unwrap();

    let output = child.wait_with_output().unwrap();
    assert!(
        output.status.success(),
        "logroll failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    output
}

fn read_files(dir: &Path) -> Vec<Vec<u8>> {
    let mut files: Vec<_> = std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .collect();
    files.sort();
    files.iter().map(|path| std::fs::read(path).unwrap()).collect()
}

#[test]
fn test_stdout_mirrors_file_contents() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("logs/app.log");

    let output = run_logroll(&["--path", path.to_str().unwrap(), "--stdout"], INPUT);

    let files = read_files(&dir.path().join("logs"));
    assert_eq!(files.len(), 1);
    assert_eq!(files[0], INPUT);
    assert_eq!(output.stdout, files[0]);
}

#[test]
fn test_stdout_mirror_spans_rotations() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("app.log");

    let output = run_logroll(
        &["--path", path.to_str().unwrap(), "--max-lines", "1", "--stdout"],
        INPUT,
    );

    let files = read_files(dir.path());
    assert_eq!(files, vec![b"alpha\n".to_vec(), b"beta\n".to_vec(), b"gamma\n".to_vec()]);
    assert_eq!(output.stdout, INPUT);
}

#[test]
fn test_stdout_quiet_without_mirror() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("app.log");

    let output = run_logroll(&["--path", path.to_str().unwrap()], INPUT);

    assert_eq!(read_files(dir.path()), vec![INPUT.to_vec()]);
    assert!(output.stdout.is_empty());
}
