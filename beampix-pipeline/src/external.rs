//! External tool invocation.
//!
//! The heavy lifting of the conversion chain is done by external binaries
//! (the EUDAQ converter and the tracking toolkit). This module wraps their
//! invocation: argument assembly with optional flags, working-directory
//! handling so the tools find their configuration files, and translation of
//! spawn failures and nonzero exits into [`Error::StageFailed`].

use crate::{Error, Result};
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

const STDERR_EXCERPT_CHARS: usize = 512;

/// One external executable and the arguments for a single invocation.
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<OsString>,
    working_dir: Option<PathBuf>,
}

impl ToolCommand {
    /// Starts building an invocation of the given executable.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
        }
    }

    /// Runs the tool from the given directory so it can resolve relative
    /// configuration paths.
    #[must_use]
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Appends one argument.
    #[must_use]
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    /// Appends `flag value` when the value is present, nothing otherwise.
    #[must_use]
    pub fn opt(self, flag: &str, value: Option<impl AsRef<OsStr>>) -> Self {
        match value {
            Some(value) => self.arg(flag).arg(value),
            None => self,
        }
    }

    /// Arguments assembled so far.
    #[must_use]
    pub fn args(&self) -> &[OsString] {
        &self.args
    }

    /// Runs the tool to completion.
    ///
    /// # Errors
    /// A spawn failure or nonzero exit becomes [`Error::StageFailed`]
    /// carrying the exit status and a stderr excerpt.
    pub fn run(&self, stage: &str) -> Result<()> {
        debug!(stage, command = %self.render(), "spawning external tool");
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }
        let output = command.output().map_err(|err| Error::StageFailed {
            stage: stage.to_string(),
            details: format!("failed to spawn {}: {err}", self.program.display()),
        })?;
        if !output.status.success() {
            return Err(Error::StageFailed {
                stage: stage.to_string(),
                details: format!(
                    "{} ({}); stderr: {}",
                    self.program.display(),
                    output.status,
                    stderr_excerpt(&output.stderr)
                ),
            });
        }
        Ok(())
    }

    fn render(&self) -> String {
        let mut line = self.program.display().to_string();
        for arg in &self.args {
            line.push(' ');
            line.push_str(&arg.to_string_lossy());
        }
        line
    }
}

/// Verifies that `<program> --version` reports the required major version.
///
/// # Errors
/// Returns [`Error::ToolVersionMismatch`] when the reported major version
/// differs, or when no version can be extracted at all.
pub fn check_major_version(tool: &str, program: &Path, required: u32) -> Result<()> {
    let found = probe_major_version(program);
    match found {
        Some(found) if found == required => Ok(()),
        Some(found) => Err(Error::ToolVersionMismatch {
            tool: tool.to_string(),
            required,
            found: found.to_string(),
        }),
        None => Err(Error::ToolVersionMismatch {
            tool: tool.to_string(),
            required,
            found: "unknown".to_string(),
        }),
    }
}

/// Runs `<program> --version` and extracts the leading major version from
/// its output, if any.
#[must_use]
pub fn probe_major_version(program: &Path) -> Option<u32> {
    let output = Command::new(program).arg("--version").output().ok()?;
    if !output.status.success() {
        return None;
    }
    parse_major(&String::from_utf8_lossy(&output.stdout))
}

fn parse_major(text: &str) -> Option<u32> {
    text.split_whitespace().find_map(|word| {
        let word = word.trim_start_matches('v');
        word.split('.').next()?.parse().ok()
    })
}

fn stderr_excerpt(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return "(no stderr output)".to_string();
    }
    trimmed.chars().take(STDERR_EXCERPT_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opt_omits_absent_flags() {
        let command = ToolCommand::new("pt-align")
            .arg("input.h5")
            .arg("out/prefix")
            .opt("-n", Some("1000"))
            .opt("-s", None::<&str>);
        let args: Vec<_> = command
            .args()
            .iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect();
        assert_eq!(args, vec!["input.h5", "out/prefix", "-n", "1000"]);
    }

    #[test]
    fn test_successful_exit_is_ok() {
        ToolCommand::new("sh")
            .arg("-c")
            .arg("exit 0")
            .run("probe")
            .unwrap();
    }

    #[test]
    fn test_nonzero_exit_reports_status_and_stderr() {
        let err = ToolCommand::new("sh")
            .arg("-c")
            .arg("echo boom >&2; exit 3")
            .run("track")
            .unwrap_err();
        match err {
            Error::StageFailed { stage, details } => {
                assert_eq!(stage, "track");
                assert!(details.contains('3'), "status missing from {details}");
                assert!(details.contains("boom"), "stderr missing from {details}");
            }
            other => panic!("expected StageFailed, got {other:?}"),
        }
    }

    #[test]
    fn test_spawn_failure_reports_program() {
        let err = ToolCommand::new("/nonexistent/bin/pt-track")
            .run("track")
            .unwrap_err();
        match err {
            Error::StageFailed { details, .. } => {
                assert!(details.contains("failed to spawn"));
                assert!(details.contains("pt-track"));
            }
            other => panic!("expected StageFailed, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_major_accepts_common_formats() {
        assert_eq!(parse_major("pt-track 2.1.0"), Some(2));
        assert_eq!(parse_major("v3.4"), Some(3));
        assert_eq!(parse_major("2"), Some(2));
        assert_eq!(parse_major("no digits here"), None);
    }

    #[test]
    fn test_version_mismatch_carries_found_version() {
        let dir = tempfile::TempDir::new().unwrap();
        let fake = dir.path().join("pt-track");
        std::fs::write(&fake, "#!/bin/sh\necho 'pt-track 1.9.2'\n").unwrap();
        let mut perms = std::fs::metadata(&fake).unwrap().permissions();
        use std::os::unix::fs::PermissionsExt;
        perms.set_mode(0o755);
        std::fs::set_permissions(&fake, perms).unwrap();

        let err = check_major_version("pt-track", &fake, 2).unwrap_err();
        match err {
            Error::ToolVersionMismatch {
                tool,
                required,
                found,
            } => {
                assert_eq!(tool, "pt-track");
                assert_eq!(required, 2);
                assert_eq!(found, "1");
            }
            other => panic!("expected ToolVersionMismatch, got {other:?}"),
        }
    }
}
