//!
//! external process plumbing: spawn, capture, convert non-zero exit into an
//! error carrying the command name and stderr
//!
use crate::error::{CgpError, Result};
use log::debug;
use std::path::Path;
use std::process::{Command, Stdio};

fn describe(cmd: &Command) -> String {
    let args: Vec<String> = cmd
        .get_args()
        .map(|a| a.to_string_lossy().into_owned())
        .collect();
    format!("{} {}", cmd.get_program().to_string_lossy(), args.join(" "))
}

///
/// Run a command to completion, discarding stdout. Non-zero exit is an
/// error carrying the trailing stderr.
///
pub fn run(mut cmd: Command) -> Result<()> {
    let line = describe(&cmd);
    debug!("running: {}", line);
    let output = cmd
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .map_err(|e| CgpError::process(&line, e.to_string()))?;
    check_status(&line, output.status, &output.stderr)
}

///
/// Run a command with stdout redirected to `stdout_path`.
///
pub fn run_with_stdout(mut cmd: Command, stdout_path: &Path) -> Result<()> {
    let line = describe(&cmd);
    debug!("running: {} > {}", line, stdout_path.display());
    let stdout = std::fs::File::create(stdout_path)?;
    let output = cmd
        .stdout(Stdio::from(stdout))
        .stderr(Stdio::piped())
        .output()
        .map_err(|e| CgpError::process(&line, e.to_string()))?;
    check_status(&line, output.status, &output.stderr)
}

fn check_status(line: &str, status: std::process::ExitStatus, stderr: &[u8]) -> Result<()> {
    if status.success() {
        return Ok(());
    }
    let tail: String = String::from_utf8_lossy(stderr)
        .lines()
        .rev()
        .take(10)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect::<Vec<_>>()
        .join("\n");
    Err(CgpError::process(
        line,
        format!("exit status {:?}: {}", status.code(), tail),
    ))
}

//
// tests
//

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failing_command_reports_stderr() {
        let mut cmd = Command::new("sh");
        cmd.args(&["-c", "echo boom >&2; exit 3"]);
        let err = run(cmd).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("sh"), "{}", msg);
        assert!(msg.contains("boom"), "{}", msg);
    }

    #[test]
    fn stdout_is_captured_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.txt");
        let mut cmd = Command::new("sh");
        cmd.args(&["-c", "echo hello"]);
        run_with_stdout(cmd, &out).unwrap();
        assert_eq!(std::fs::read_to_string(&out).unwrap(), "hello\n");
    }
}
