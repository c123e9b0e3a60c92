use crate::encode::artifact::EncodedArtifact;
use crate::encode::ffmpeg::ensure_parent_dir;
use crate::foundation::error::MergeResult;
use anyhow::Context as _;
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write as _};
use std::path::{Path, PathBuf};

/// Highest `name (N).ext` suffix tried before giving up.
const MAX_DOWNLOAD_SUFFIX: u32 = 9_999;

/// Title and text attached to share requests.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShareText {
    /// Share sheet title.
    pub title: String,
    /// Message body.
    pub text: String,
}

impl Default for ShareText {
    fn default() -> Self {
        Self {
            title: "Share video".to_owned(),
            text: "Check out this video!".to_owned(),
        }
    }
}

/// Options for [`ExportSink`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExportOpts {
    /// Directory download fallbacks are written to.
    pub download_dir: PathBuf,
    /// Text attached to share requests.
    pub share: ShareText,
}

impl Default for ExportOpts {
    fn default() -> Self {
        Self {
            download_dir: PathBuf::from("."),
            share: ShareText::default(),
        }
    }
}

/// A file offered to a [`ShareTarget`].
#[derive(Clone, Copy, Debug)]
pub struct SharedFile<'a> {
    /// File name including extension.
    pub filename: &'a str,
    /// MIME type of `bytes`.
    pub mime_type: &'a str,
    /// File contents.
    pub bytes: &'a [u8],
    /// Share sheet title.
    pub title: &'a str,
    /// Message body.
    pub text: &'a str,
}

/// Why a share did not deliver the file.
#[derive(thiserror::Error, Debug)]
pub enum ShareError {
    /// The user dismissed the share sheet. Not an error.
    #[error("share aborted by user")]
    Aborted,
    /// The platform failed to share.
    #[error("share failed: {0}")]
    Failed(String),
}

/// Platform share capability.
pub trait ShareTarget: Send + Sync {
    /// `true` when files of `mime_type` can be shared.
    fn can_share(&self, mime_type: &str) -> bool;
    /// Share one file.
    fn share(&self, file: &SharedFile<'_>) -> Result<(), ShareError>;
}

/// How an artifact reached the user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Delivery {
    /// Handed to the platform share target.
    Delivered,
    /// Written to this path.
    Downloaded(PathBuf),
}

/// Export Sink: tries the share target, falls back to a download. An export is never lost.
pub struct ExportSink {
    opts: ExportOpts,
    target: Option<Box<dyn ShareTarget>>,
}

impl ExportSink {
    /// Sink that only downloads.
    pub fn new(opts: ExportOpts) -> Self {
        Self { opts, target: None }
    }

    /// Try `target` before falling back to a download.
    pub fn with_share_target(mut self, target: impl ShareTarget + 'static) -> Self {
        self.target = Some(Box::new(target));
        self
    }

    /// Deliver `artifact` under `filename`. The codec extension is added when missing.
    #[tracing::instrument(skip_all, fields(filename = filename, bytes = artifact.len()))]
    pub fn export(&self, artifact: EncodedArtifact, filename: &str) -> MergeResult<Delivery> {
        let filename = normalized_filename(filename, artifact.extension());

        if let Some(target) = self.target.as_deref()
            && target.can_share(artifact.mime_type())
        {
            let file = SharedFile {
                filename: &filename,
                mime_type: artifact.mime_type(),
                bytes: &artifact.bytes,
                title: &self.opts.share.title,
                text: &self.opts.share.text,
            };
            match target.share(&file) {
                Ok(()) => {
                    tracing::info!(%filename, "artifact shared");
                    return Ok(Delivery::Delivered);
                }
                Err(ShareError::Aborted) => {
                    tracing::debug!("share dismissed, downloading instead");
                }
                Err(e) => {
                    tracing::warn!("{e}; downloading instead");
                }
            }
        }

        let path = download(&self.opts.download_dir, &filename, &artifact.bytes)?;
        tracing::info!(path = %path.display(), "artifact downloaded");
        Ok(Delivery::Downloaded(path))
    }
}

/// Keep only the final path component and make sure it carries an extension.
fn normalized_filename(filename: &str, extension: &str) -> String {
    let base = Path::new(filename.trim())
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .unwrap_or("export");
    if Path::new(base).extension().is_some() {
        base.to_owned()
    } else {
        format!("{base}.{extension}")
    }
}

/// Write `bytes` to `dir/filename`, or `name (N).ext` when that file exists.
pub fn download(dir: &Path, filename: &str, bytes: &[u8]) -> MergeResult<PathBuf> {
    let first = dir.join(filename);
    ensure_parent_dir(&first)?;

    let name = Path::new(filename);
    let stem = name
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(filename);
    let ext = name.extension().and_then(|e| e.to_str());

    for n in 0..=MAX_DOWNLOAD_SUFFIX {
        let path = match (n, ext) {
            (0, _) => first.clone(),
            (n, Some(ext)) => dir.join(format!("{stem} ({n}).{ext}")),
            (n, None) => dir.join(format!("{stem} ({n})")),
        };
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                file.write_all(bytes)
                    .and_then(|()| file.flush())
                    .with_context(|| format!("write download '{}'", path.display()))?;
                return Ok(path);
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => {
                return Err(anyhow::Error::new(e)
                    .context(format!("create download '{}'", path.display()))
                    .into());
            }
        }
    }
    Err(anyhow::anyhow!(
        "no free download name for '{filename}' in '{}'",
        dir.display()
    )
    .into())
}

#[cfg(test)]
#[path = "../../tests/unit/export/sink.rs"]
mod tests;
