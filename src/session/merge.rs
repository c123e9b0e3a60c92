use super::composite::{CancelHandle, CompositeSession, SessionObserver, SessionOpts};
use crate::audio::pcm::{AudioSample, decode_pcm_base64};
use crate::encode::artifact::EncodedArtifact;
use crate::encode::recorder::MediaHost;
use crate::foundation::error::{MergeError, MergeResult};
use crate::source::{FfmpegVideoDecoder, FrameSource, LoopingVideo, StillImage};
use anyhow::anyhow;
use std::path::PathBuf;
use std::sync::Arc;

/// Per-call options for the merge entry points.
#[derive(Default)]
pub struct MergeOpts {
    /// Session options.
    pub session: SessionOpts,
    /// Progress observer, also told about asset loading.
    pub observer: Option<Box<dyn SessionObserver>>,
    /// Handle the caller keeps to abort the merge.
    pub cancel: Option<CancelHandle>,
}

/// Where a source video comes from.
#[derive(Clone, Debug)]
pub enum VideoInput {
    /// A file on disk.
    Path(PathBuf),
    /// An in-memory container, spooled to a temporary file for decoding.
    Bytes(Vec<u8>),
}

/// Merge base64 PCM narration with a still image (raw bytes, base64 or `data:` URL).
#[tracing::instrument(skip_all, fields(image_bytes = image.len()))]
pub async fn merge_audio_and_image(
    host: Arc<dyn MediaHost>,
    image: Vec<u8>,
    audio_base64: &str,
    opts: MergeOpts,
) -> MergeResult<EncodedArtifact> {
    merge_with(host, audio_base64, opts, move || {
        Ok(Box::new(StillImage::decode(&image)?) as Box<dyn FrameSource>)
    })
    .await
}

/// Merge base64 PCM narration with a video that loops to cover the narration.
///
/// The video's own audio is ignored.
#[tracing::instrument(skip_all)]
pub async fn merge_audio_and_video(
    host: Arc<dyn MediaHost>,
    video: VideoInput,
    audio_base64: &str,
    opts: MergeOpts,
) -> MergeResult<EncodedArtifact> {
    merge_with(host, audio_base64, opts, move || {
        let looping = match video {
            VideoInput::Path(path) => LoopingVideo::open(&path)?,
            VideoInput::Bytes(bytes) => LoopingVideo::new(FfmpegVideoDecoder::from_bytes(&bytes)?)?,
        };
        Ok(Box::new(looping) as Box<dyn FrameSource>)
    })
    .await
}

/// Run a session over an already decoded audio sample and frame source.
pub async fn merge_sources(
    host: Arc<dyn MediaHost>,
    audio: AudioSample,
    source: Box<dyn FrameSource>,
    opts: MergeOpts,
) -> MergeResult<EncodedArtifact> {
    let mut session = CompositeSession::new(audio, source, host, opts.session);
    if let Some(observer) = opts.observer {
        session = session.with_boxed_observer(observer);
    }
    if let Some(cancel) = opts.cancel {
        session = session.with_cancel_handle(cancel);
    }
    session.run().await
}

async fn merge_with<F>(
    host: Arc<dyn MediaHost>,
    audio_base64: &str,
    mut opts: MergeOpts,
    load_visual: F,
) -> MergeResult<EncodedArtifact>
where
    F: FnOnce() -> MergeResult<Box<dyn FrameSource>> + Send + 'static,
{
    if let Some(o) = opts.observer.as_mut() {
        o.on_progress("Loading assets...");
    }
    // Audio first: malformed input fails before any decode pipeline exists.
    let audio = decode_pcm_base64(audio_base64)?;
    let source = tokio::task::spawn_blocking(load_visual)
        .await
        .map_err(|e| MergeError::Other(anyhow!("asset loading task failed: {e}")))??;
    merge_sources(host, audio, source, opts).await
}
