//! Bounded external command execution

use std::ffi::OsStr;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::debug;

use crate::errors::SyncError;

/// Run `program args...` in `cwd`, killing it once `timeout` elapses.
///
/// Returns trimmed stdout on a zero exit; otherwise `ProcessFailed` with the
/// combined output, or `ProcessTimedOut`.
pub async fn run_command<I, S>(
    program: &Path,
    args: I,
    cwd: Option<&Path>,
    timeout: Duration,
) -> Result<String, SyncError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let args: Vec<_> = args.into_iter().map(|a| a.as_ref().to_owned()).collect();
    let command_line = format!(
        "{} {}",
        program.display(),
        args.iter().map(|a| a.to_string_lossy()).collect::<Vec<_>>().join(" ")
    );

    let mut command = Command::new(program);
    command
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = cwd {
        command.current_dir(dir);
    }

    debug!("Running `{}`", command_line);
    let child = command.spawn()?;

    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(result) => result?,
        Err(_) => {
            return Err(SyncError::ProcessTimedOut {
                command: command_line,
                timeout,
            })
        }
    };

    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if output.status.success() {
        return Ok(stdout);
    }

    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    let combined = [stdout, stderr]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("\n");
    Err(SyncError::ProcessFailed {
        command: command_line,
        status: output.status.to_string(),
        output: combined,
    })
}
