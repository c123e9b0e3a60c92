use super::surface::RenderSurface;
use crate::foundation::core::{Fps, FrameIndex, Raster};
use crate::foundation::error::{MergeError, MergeResult};
use crate::source::{FrameSource, SourceKind};
use anyhow::anyhow;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;

/// One captured surface snapshot, stamped with its place on the recording timeline.
#[derive(Clone, Debug, PartialEq)]
pub struct VideoFrame {
    /// Frame slot at the nominal capture rate.
    pub index: FrameIndex,
    /// Surface contents at capture time.
    pub raster: Raster,
}

/// Receiving end of the compositor's capture stream.
#[derive(Debug)]
pub struct VideoTrack {
    rx: mpsc::UnboundedReceiver<VideoFrame>,
    width: u32,
    height: u32,
    fps: Fps,
}

impl VideoTrack {
    /// Frame size carried by this track.
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Nominal capture rate.
    pub fn fps(&self) -> Fps {
        self.fps
    }

    pub(crate) async fn recv(&mut self) -> Option<VideoFrame> {
        self.rx.recv().await
    }

    pub(crate) fn try_recv(&mut self) -> Option<VideoFrame> {
        self.rx.try_recv().ok()
    }
}

/// Counters reported once the draw loop has exited.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CompositorStats {
    /// Surface draws, including the synchronous first frame.
    pub frames_drawn: u64,
    /// Source (re)starts observed, including the initial start.
    pub source_restarts: u64,
}

/// Redraws a [`FrameSource`] onto a [`RenderSurface`] at a fixed cadence.
pub struct Compositor {
    source: Box<dyn FrameSource>,
    surface: RenderSurface,
    fps: Fps,
    tx: Option<mpsc::UnboundedSender<VideoFrame>>,
    captured: bool,
    frames_drawn: u64,
    released: bool,
}

impl Compositor {
    /// Size a surface for `source` and prepare to draw it at `fps`.
    ///
    /// The source is stopped before an error is returned.
    pub fn new(mut source: Box<dyn FrameSource>, fps: Fps) -> MergeResult<Self> {
        let surface = match RenderSurface::for_source(source.natural_size()) {
            Ok(s) => s,
            Err(e) => {
                source.stop();
                return Err(e);
            }
        };
        tracing::debug!(
            kind = ?source.kind(),
            width = surface.width(),
            height = surface.height(),
            "compositor surface allocated"
        );
        Ok(Self {
            source,
            surface,
            fps,
            tx: None,
            captured: false,
            frames_drawn: 0,
            released: false,
        })
    }

    /// Surface size `(width, height)`, always even.
    pub fn surface_size(&self) -> (u32, u32) {
        self.surface.size()
    }

    /// Kind of the source being drawn.
    pub fn source_kind(&self) -> SourceKind {
        self.source.kind()
    }

    /// Nominal capture rate.
    pub fn fps(&self) -> Fps {
        self.fps
    }

    /// Expose the surface as a capturable track. Only one track can be captured.
    pub fn capture_track(&mut self) -> MergeResult<VideoTrack> {
        if self.captured {
            return Err(MergeError::validation("compositor track was already captured"));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        self.tx = Some(tx);
        self.captured = true;
        let (width, height) = self.surface.size();
        Ok(VideoTrack {
            rx,
            width,
            height,
            fps: self.fps,
        })
    }

    /// Draw the source frame visible `elapsed` after start and snapshot the surface.
    pub fn draw(&mut self, elapsed: Duration) -> MergeResult<VideoFrame> {
        let frame = self.source.current_frame(elapsed)?;
        self.surface.draw(frame);
        self.frames_drawn += 1;
        Ok(VideoFrame {
            index: self.fps.frame_at(elapsed),
            raster: self.surface.snapshot(),
        })
    }

    /// Start the source, draw the first frame synchronously and spawn the periodic loop.
    ///
    /// Requires a captured track and a tokio runtime. On error the source is released.
    pub fn start(mut self) -> MergeResult<DrawLoop> {
        let Some(tx) = self.tx.take() else {
            return Err(self.fail_start(MergeError::validation(
                "compositor track must be captured before start",
            )));
        };
        if let Err(e) = self.source.start() {
            return Err(self.fail_start(e));
        }

        let origin = Instant::now();
        let first = match self.draw(Duration::ZERO) {
            Ok(f) => f,
            Err(e) => return Err(self.fail_start(e)),
        };
        // A closed track only means nobody records yet; keep drawing.
        let _ = tx.send(first);

        let stop = CancellationToken::new();
        let task = tokio::spawn(run_draw_loop(self, tx, origin, stop.clone()));
        Ok(DrawLoop {
            stop,
            task: Some(task),
        })
    }

    /// Release the source of a compositor that is not going to be started.
    pub fn release(mut self) -> CompositorStats {
        self.release_source()
    }

    fn fail_start(&mut self, err: MergeError) -> MergeError {
        self.release_source();
        err
    }

    fn release_source(&mut self) -> CompositorStats {
        if !self.released {
            self.source.stop();
            self.released = true;
        }
        CompositorStats {
            frames_drawn: self.frames_drawn,
            source_restarts: self.source.restarts(),
        }
    }
}

impl Drop for Compositor {
    fn drop(&mut self) {
        self.release_source();
    }
}

async fn run_draw_loop(
    mut compositor: Compositor,
    tx: mpsc::UnboundedSender<VideoFrame>,
    origin: Instant,
    stop: CancellationToken,
) -> MergeResult<CompositorStats> {
    let period = compositor.fps.frame_interval();
    let mut ticker = interval_at(origin + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let result = loop {
        tokio::select! {
            biased;
            _ = stop.cancelled() => break Ok(()),
            _ = ticker.tick() => {
                let frame = match compositor.draw(origin.elapsed()) {
                    Ok(f) => f,
                    Err(e) => break Err(e),
                };
                if tx.send(frame).is_err() {
                    tracing::debug!("video track receiver dropped, stopping draw loop");
                    break Ok(());
                }
            }
        }
    };

    let stats = compositor.release_source();
    tracing::debug!(
        frames_drawn = stats.frames_drawn,
        source_restarts = stats.source_restarts,
        "draw loop exited"
    );
    result.map(|()| stats)
}

/// Handle to a running draw loop.
///
/// Dropping the handle stops the loop at its next tick.
pub struct DrawLoop {
    stop: CancellationToken,
    task: Option<JoinHandle<MergeResult<CompositorStats>>>,
}

impl DrawLoop {
    /// `true` until the loop has been stopped or has exited on its own.
    pub fn is_running(&self) -> bool {
        self.task.is_some()
    }

    /// Wait until the loop exits on its own: the source failed or the track was dropped.
    ///
    /// Never resolves once the loop has been stopped. Cancel-safe.
    pub async fn exited(&mut self) -> MergeResult<CompositorStats> {
        let Some(task) = self.task.as_mut() else {
            return std::future::pending().await;
        };
        let joined = task.await;
        self.task = None;
        joined.map_err(|e| MergeError::Other(anyhow!("draw loop task failed: {e}")))?
    }

    /// Stop the loop, release the source and return the final counters.
    ///
    /// A second call returns default counters.
    pub async fn stop(&mut self) -> MergeResult<CompositorStats> {
        self.stop.cancel();
        let Some(task) = self.task.take() else {
            return Ok(CompositorStats::default());
        };
        task.await
            .map_err(|e| MergeError::Other(anyhow!("draw loop task failed: {e}")))?
    }
}

impl Drop for DrawLoop {
    fn drop(&mut self) {
        self.stop.cancel();
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/compositor.rs"]
mod tests;
