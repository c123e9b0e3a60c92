use super::mux::{CombinedStream, StreamItem};
use super::state::{SessionState, StateMachine};
use crate::audio::pcm::AudioSample;
use crate::audio::playback::{AudioPlayback, DEFAULT_BLOCK_SAMPLES, PlaybackEnded};
use crate::encode::artifact::EncodedArtifact;
use crate::encode::codec::{ContainerCodec, negotiate};
use crate::encode::recorder::{
    DEFAULT_VIDEO_BITS_PER_SECOND, EncodedChunk, MediaHost, Recorder, RecorderConfig,
    RecorderOutput,
};
use crate::foundation::core::Fps;
use crate::foundation::error::{MergeError, MergeResult};
use crate::render::compositor::{Compositor, CompositorStats, DrawLoop};
use crate::source::{FrameSource, SourceKind};
use anyhow::anyhow;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

/// Options for a [`CompositeSession`].
#[derive(Clone, Debug, PartialEq)]
pub struct SessionOpts {
    /// Compositor draw rate and nominal video frame rate.
    pub fps: Fps,
    /// Target video bit rate.
    pub video_bits_per_second: u32,
    /// Samples released per audio playback block.
    pub audio_block_samples: usize,
    /// Container/codec probe order; the first supported entry wins.
    pub codec_preference: Vec<ContainerCodec>,
}

impl Default for SessionOpts {
    fn default() -> Self {
        Self {
            fps: Fps::DEFAULT,
            video_bits_per_second: DEFAULT_VIDEO_BITS_PER_SECOND,
            audio_block_samples: DEFAULT_BLOCK_SAMPLES,
            codec_preference: ContainerCodec::DEFAULT_PREFERENCE.to_vec(),
        }
    }
}

impl SessionOpts {
    /// Reject options no session can run with.
    pub fn validate(&self) -> MergeResult<()> {
        Fps::new(self.fps.num, self.fps.den)?;
        if self.audio_block_samples == 0 {
            return Err(MergeError::validation("audio_block_samples must be non-zero"));
        }
        if self.video_bits_per_second == 0 {
            return Err(MergeError::validation("video_bits_per_second must be non-zero"));
        }
        Ok(())
    }
}

/// One step of the Priming -> Recording setup, in the order it must run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SetupStep {
    /// Compositor draw loop started; the first frame is already on the surface.
    DrawLoop,
    /// Recorder accepting the combined stream.
    Recorder,
    /// Audio playback started; the recorded duration starts counting.
    Audio,
}

impl SetupStep {
    /// Required order.
    pub const ORDER: [SetupStep; 3] = [SetupStep::DrawLoop, SetupStep::Recorder, SetupStep::Audio];
}

/// Observer for session progress. Purely informational.
///
/// Any `FnMut(&str)` closure is an observer that only receives progress messages.
pub trait SessionObserver: Send {
    /// Human-readable status message.
    fn on_progress(&mut self, _message: &str) {}

    /// State machine transition.
    fn on_transition(&mut self, _from: SessionState, _to: SessionState) {}

    /// A setup step completed.
    fn on_setup_step(&mut self, _step: SetupStep) {}
}

impl<F> SessionObserver for F
where
    F: FnMut(&str) + Send,
{
    fn on_progress(&mut self, message: &str) {
        self(message)
    }
}

/// Clonable handle that aborts a running session.
#[derive(Clone, Debug, Default)]
pub struct CancelHandle(CancellationToken);

impl CancelHandle {
    /// Request cancellation. The session stops at its next suspension point.
    pub fn cancel(&self) {
        self.0.cancel();
    }

    /// `true` once cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.is_cancelled()
    }
}

/// Enforces [`SetupStep::ORDER`].
#[derive(Debug, Default)]
struct SetupSequence {
    done: usize,
}

impl SetupSequence {
    fn complete(&mut self, step: SetupStep) -> MergeResult<()> {
        let expected = SetupStep::ORDER.get(self.done).copied();
        debug_assert_eq!(expected, Some(step), "setup steps out of order");
        if expected != Some(step) {
            return Err(MergeError::validation(format!(
                "setup step {step:?} out of order (expected {expected:?})"
            )));
        }
        self.done += 1;
        Ok(())
    }
}

/// Everything a session acquires. Each resource is released at most once.
#[derive(Default)]
struct Resources {
    compositor: Option<Compositor>,
    draw: Option<DrawLoop>,
    recorder: Option<Box<dyn Recorder>>,
    playback: Option<AudioPlayback>,
    stats: CompositorStats,
}

impl Resources {
    /// Stop the draw loop (or release a compositor that never started).
    async fn stop_draw_loop(&mut self) -> MergeResult<()> {
        if let Some(compositor) = self.compositor.take() {
            self.stats = compositor.release();
        }
        if let Some(mut draw) = self.draw.take() {
            self.stats = draw.stop().await?;
        }
        Ok(())
    }

    async fn release(&mut self) {
        if let Some(mut recorder) = self.recorder.take() {
            recorder.abort();
        }
        if let Err(e) = self.stop_draw_loop().await {
            tracing::warn!("draw loop stopped with error: {e}");
        }
        if let Some(mut playback) = self.playback.take() {
            playback.stop().await;
        }
    }
}

/// Output of a finished recording, before resources are released.
struct Recording {
    codec: ContainerCodec,
    size: (u32, u32),
    chunks: Vec<EncodedChunk>,
    output: RecorderOutput,
}

enum RecordingEnd {
    Ended(PlaybackEnded),
    Cancelled,
}

/// One export: plays the audio, composites the visual source and records both.
///
/// A session runs once. Cancelling through a [`CancelHandle`] yields
/// [`MergeError::Cancelled`] and no artifact.
pub struct CompositeSession {
    audio: AudioSample,
    source: Option<Box<dyn FrameSource>>,
    host: Arc<dyn MediaHost>,
    opts: SessionOpts,
    observer: Option<Box<dyn SessionObserver>>,
    machine: StateMachine,
    cancel: CancellationToken,
}

impl CompositeSession {
    /// Create an idle session owning `audio` and `source`.
    pub fn new(
        audio: AudioSample,
        source: Box<dyn FrameSource>,
        host: Arc<dyn MediaHost>,
        opts: SessionOpts,
    ) -> Self {
        Self {
            audio,
            source: Some(source),
            host,
            opts,
            observer: None,
            machine: StateMachine::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// Attach a progress observer.
    pub fn with_observer(self, observer: impl SessionObserver + 'static) -> Self {
        self.with_boxed_observer(Box::new(observer))
    }

    /// Attach an already boxed progress observer.
    pub fn with_boxed_observer(mut self, observer: Box<dyn SessionObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Let an existing handle abort this session.
    pub fn with_cancel_handle(mut self, handle: CancelHandle) -> Self {
        self.cancel = handle.0;
        self
    }

    /// Handle that aborts this session.
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle(self.cancel.clone())
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.machine.state()
    }

    /// Every state the session passed through.
    pub fn history(&self) -> &[SessionState] {
        self.machine.history()
    }

    /// Run the session to completion.
    ///
    /// Every acquired resource is released before this returns, on success and on error.
    #[tracing::instrument(skip_all, fields(samples = self.audio.len()))]
    pub async fn run(&mut self) -> MergeResult<EncodedArtifact> {
        if self.state() != SessionState::Idle {
            return Err(MergeError::validation(format!(
                "session already ran (state {})",
                self.state()
            )));
        }

        if let Err(e) = self.opts.validate().and_then(|()| self.check_audio()) {
            self.release_unused_source();
            self.enter(SessionState::Failed)?;
            return Err(e);
        }

        let mut res = Resources::default();
        let recorded = self.record(&mut res).await;
        res.release().await;
        let recorded = recorded.and_then(|rec| self.assemble(rec, res.stats));

        match recorded {
            Ok(artifact) => {
                self.enter(SessionState::Done)?;
                tracing::info!(
                    codec = artifact.codec.label(),
                    bytes = artifact.len(),
                    duration_secs = artifact.duration.as_secs_f64(),
                    "session finished"
                );
                Ok(artifact)
            }
            Err(e) if e.is_cancelled() => {
                if self.state() != SessionState::Finalizing {
                    self.enter(SessionState::Finalizing)?;
                }
                self.enter(SessionState::Cancelled)?;
                tracing::info!("session cancelled by caller");
                Err(e)
            }
            Err(e) => {
                self.enter(SessionState::Failed)?;
                tracing::error!(error = %e, class = ?e.class(), "session failed");
                Err(e)
            }
        }
    }

    fn check_audio(&self) -> MergeResult<()> {
        if self.audio.is_empty() {
            return Err(MergeError::malformed_audio("audio track has no samples"));
        }
        Ok(())
    }

    fn release_unused_source(&mut self) {
        if let Some(mut source) = self.source.take() {
            source.stop();
        }
    }

    fn enter(&mut self, next: SessionState) -> MergeResult<()> {
        let from = self.machine.transition(next)?;
        tracing::debug!(%from, to = %next, "session transition");
        if let Some(o) = self.observer.as_mut() {
            o.on_transition(from, next);
        }
        Ok(())
    }

    fn progress(&mut self, message: &str) {
        tracing::debug!("{message}");
        if let Some(o) = self.observer.as_mut() {
            o.on_progress(message);
        }
    }

    fn check_cancelled(&self) -> MergeResult<()> {
        if self.cancel.is_cancelled() {
            return Err(MergeError::Cancelled);
        }
        Ok(())
    }

    async fn record(&mut self, res: &mut Resources) -> MergeResult<Recording> {
        if self.cancel.is_cancelled() {
            self.release_unused_source();
            return Err(MergeError::Cancelled);
        }
        self.enter(SessionState::Priming)?;
        self.progress("Preparing media...");

        let source = self
            .source
            .take()
            .ok_or_else(|| MergeError::validation("session has no frame source"))?;
        let kind = source.kind();
        let mut compositor = Compositor::new(source, self.opts.fps)?;
        let size = compositor.surface_size();
        let video = compositor.capture_track();
        res.compositor = Some(compositor);

        let codec = negotiate(self.host.as_ref(), &self.opts.codec_preference)?;
        self.progress(&format!("Encoding as {}", codec.mime_type()));

        let cfg = RecorderConfig {
            width: size.0,
            height: size.1,
            fps: self.opts.fps,
            sample_rate: self.audio.sample_rate(),
            audio_samples: self.audio.len() as u64,
            video_bits_per_second: self.opts.video_bits_per_second,
        };
        res.recorder = Some(self.host.create_recorder(codec, cfg)?);

        let mut playback = AudioPlayback::new(self.audio.clone(), self.opts.audio_block_samples)?;
        let audio = playback.connect();
        res.playback = Some(playback);
        let mut stream = CombinedStream::combine(video.ok(), audio.ok())?;

        self.check_cancelled()?;
        let mut ended = self.start_sequenced(res)?;

        self.enter(SessionState::Recording)?;
        self.progress(match kind {
            SourceKind::StillImage => "Rendering video...",
            SourceKind::LoopingVideo => "Mixing audio and video...",
        });

        let mut chunks = Vec::new();
        let end = self
            .pump(res, &mut stream, &mut ended, &mut chunks)
            .await;

        self.enter(SessionState::Finalizing)?;
        self.progress("Finalizing export...");
        let end = end?;

        let output = match end {
            RecordingEnd::Cancelled => {
                if let Some(mut recorder) = res.recorder.take() {
                    recorder.abort();
                }
                if let Err(e) = res.stop_draw_loop().await {
                    tracing::debug!("draw loop error after cancellation: {e}");
                }
                return Err(MergeError::Cancelled);
            }
            RecordingEnd::Ended(signal) => {
                let recorder = res
                    .recorder
                    .take()
                    .ok_or_else(|| MergeError::validation("recorder missing at finalize"))?;
                let output = finalize_recorder(recorder).await;
                let drawn = res.stop_draw_loop().await;
                tracing::debug!(
                    samples_delivered = signal.samples_delivered,
                    "audio playback ended"
                );
                let output = output?;
                drawn?;
                output
            }
        };

        Ok(Recording {
            codec,
            size,
            chunks,
            output,
        })
    }

    /// Start draw loop, recorder and audio, in that order.
    fn start_sequenced(
        &mut self,
        res: &mut Resources,
    ) -> MergeResult<oneshot::Receiver<PlaybackEnded>> {
        let mut seq = SetupSequence::default();

        let compositor = res
            .compositor
            .take()
            .ok_or_else(|| MergeError::validation("compositor missing at setup"))?;
        res.draw = Some(compositor.start()?);
        self.setup_done(&mut seq, SetupStep::DrawLoop)?;

        res.recorder
            .as_mut()
            .ok_or_else(|| MergeError::validation("recorder missing at setup"))?
            .start()?;
        self.setup_done(&mut seq, SetupStep::Recorder)?;

        let ended = res
            .playback
            .as_mut()
            .ok_or_else(|| MergeError::validation("audio playback missing at setup"))?
            .start()?;
        self.setup_done(&mut seq, SetupStep::Audio)?;
        Ok(ended)
    }

    fn setup_done(&mut self, seq: &mut SetupSequence, step: SetupStep) -> MergeResult<()> {
        seq.complete(step)?;
        tracing::debug!(?step, "setup step complete");
        if let Some(o) = self.observer.as_mut() {
            o.on_setup_step(step);
        }
        Ok(())
    }

    /// Feed the recorder until playback ends or the caller cancels.
    async fn pump(
        &self,
        res: &mut Resources,
        stream: &mut CombinedStream,
        ended: &mut oneshot::Receiver<PlaybackEnded>,
        chunks: &mut Vec<EncodedChunk>,
    ) -> MergeResult<RecordingEnd> {
        let Resources { recorder, draw, .. } = res;
        let recorder = recorder
            .as_mut()
            .ok_or_else(|| MergeError::validation("recorder missing while recording"))?;
        let draw = draw
            .as_mut()
            .ok_or_else(|| MergeError::validation("draw loop missing while recording"))?;

        let signal = loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Ok(RecordingEnd::Cancelled),
                signal = &mut *ended => {
                    break signal.map_err(|_| {
                        MergeError::Other(anyhow!("audio playback stopped without an end signal"))
                    })?;
                }
                drawn = draw.exited() => {
                    let err = match drawn {
                        Err(e) => e,
                        Ok(_) => MergeError::validation("draw loop exited before playback ended"),
                    };
                    tracing::warn!(error = %err, "draw loop failed while recording");
                    return Err(err);
                }
                item = stream.next() => {
                    let Some(item) = item else {
                        return Err(MergeError::validation(
                            "combined stream closed before playback ended",
                        ));
                    };
                    write_item(&mut **recorder, &item)?;
                    chunks.extend(recorder.take_chunks());
                }
            }
        };

        // Ended fires after the last block was queued; drain what is still buffered.
        while let Some(item) = stream.try_next() {
            write_item(&mut **recorder, &item)?;
        }
        chunks.extend(recorder.take_chunks());
        Ok(RecordingEnd::Ended(signal))
    }

    fn assemble(&self, rec: Recording, stats: CompositorStats) -> MergeResult<EncodedArtifact> {
        let Recording {
            codec,
            size,
            mut chunks,
            output,
        } = rec;
        chunks.extend(output.chunks);
        let bytes: Vec<u8> = chunks.into_iter().flat_map(|c| c.data).collect();
        if bytes.is_empty() {
            return Err(MergeError::encoding_stalled(format!(
                "{} recorder produced no data for {} frames",
                codec.label(),
                output.video_frames
            )));
        }

        let rate = u64::from(self.audio.sample_rate().max(1));
        let duration = Duration::from_nanos(
            (u128::from(output.audio_samples) * 1_000_000_000 / u128::from(rate)) as u64,
        );
        Ok(EncodedArtifact {
            bytes,
            codec,
            width: size.0,
            height: size.1,
            fps: self.opts.fps,
            duration,
            video_frames: output.video_frames,
            audio_samples: output.audio_samples,
            source_restarts: stats.source_restarts,
        })
    }
}

impl Drop for CompositeSession {
    fn drop(&mut self) {
        self.release_unused_source();
    }
}

/// Stop the recorder on the blocking pool; encoders may wait on child processes here.
async fn finalize_recorder(mut recorder: Box<dyn Recorder>) -> MergeResult<RecorderOutput> {
    tokio::task::spawn_blocking(move || {
        let output = recorder.stop();
        if output.is_err() {
            recorder.abort();
        }
        output
    })
    .await
    .map_err(|e| MergeError::Other(anyhow!("recorder finalize task failed: {e}")))?
}

fn write_item(recorder: &mut dyn Recorder, item: &StreamItem) -> MergeResult<()> {
    match item {
        StreamItem::Video(frame) => recorder.write_video(frame),
        StreamItem::Audio(block) => recorder.write_audio(block),
    }
}

#[cfg(test)]
#[path = "../../tests/unit/session/composite.rs"]
mod tests;
