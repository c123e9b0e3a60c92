use super::sink::{ShareError, ShareTarget, SharedFile};
use std::path::PathBuf;
use std::process::{Command, Stdio};

/// Exit code a share program uses to report that the user dismissed the share.
pub const SHARE_ABORTED_EXIT_CODE: i32 = 130;

/// [`ShareTarget`] that hands the file to an external program.
///
/// The program is invoked as `program [args..] <file>` with `AVMERGE_SHARE_TITLE`,
/// `AVMERGE_SHARE_TEXT` and `AVMERGE_SHARE_MIME` set. Exit status 0 means shared,
/// [`SHARE_ABORTED_EXIT_CODE`] means dismissed, anything else is a failure.
#[derive(Clone, Debug)]
pub struct CommandShareTarget {
    program: PathBuf,
    args: Vec<String>,
    mime_prefixes: Vec<String>,
}

impl CommandShareTarget {
    /// Share target accepting any `video/*` file.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            mime_prefixes: vec!["video/".to_owned()],
        }
    }

    /// Extra arguments placed before the file path.
    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Restrict sharing to MIME types starting with one of `prefixes`.
    pub fn accepting(mut self, prefixes: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.mime_prefixes = prefixes.into_iter().map(Into::into).collect();
        self
    }
}

impl ShareTarget for CommandShareTarget {
    fn can_share(&self, mime_type: &str) -> bool {
        self.mime_prefixes.iter().any(|p| mime_type.starts_with(p.as_str()))
    }

    fn share(&self, file: &SharedFile<'_>) -> Result<(), ShareError> {
        let dir = tempfile::Builder::new()
            .prefix("avmerge_share_")
            .tempdir()
            .map_err(|e| ShareError::Failed(format!("create share directory: {e}")))?;
        let path = dir.path().join(file.filename);
        std::fs::write(&path, file.bytes)
            .map_err(|e| ShareError::Failed(format!("stage '{}': {e}", path.display())))?;

        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(&path)
            .env("AVMERGE_SHARE_TITLE", file.title)
            .env("AVMERGE_SHARE_TEXT", file.text)
            .env("AVMERGE_SHARE_MIME", file.mime_type)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| {
                ShareError::Failed(format!("failed to run '{}': {e}", self.program.display()))
            })?;

        match output.status.code() {
            Some(0) => Ok(()),
            Some(SHARE_ABORTED_EXIT_CODE) => Err(ShareError::Aborted),
            _ => Err(ShareError::Failed(format!(
                "'{}' exited with status {}: {}",
                self.program.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ))),
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/export/command.rs"]
mod tests;
