use super::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

struct Probe {
    size: (u32, u32),
    frame: Raster,
    started: bool,
    stops: Arc<AtomicUsize>,
}

impl Probe {
    fn new(size: (u32, u32), stops: &Arc<AtomicUsize>) -> Box<Self> {
        Box::new(Self {
            size,
            frame: Raster::solid(size.0.max(1), size.1.max(1), [200, 10, 10, 255]),
            started: false,
            stops: Arc::clone(stops),
        })
    }
}

impl FrameSource for Probe {
    fn kind(&self) -> SourceKind {
        SourceKind::StillImage
    }

    fn natural_size(&self) -> (u32, u32) {
        self.size
    }

    fn start(&mut self) -> MergeResult<()> {
        self.started = true;
        Ok(())
    }

    fn current_frame(&mut self, _elapsed: Duration) -> MergeResult<&Raster> {
        if !self.started {
            return Err(MergeError::validation("not started"));
        }
        Ok(&self.frame)
    }

    fn stop(&mut self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::test(start_paused = true)]
async fn first_frame_is_available_immediately_after_start() {
    let stops = Arc::default();
    let mut c = Compositor::new(Probe::new((64, 48), &stops), Fps::DEFAULT).unwrap();
    let mut track = c.capture_track().unwrap();
    assert_eq!(track.size(), (64, 48));

    let mut running = c.start().unwrap();
    let first = track.try_recv().expect("first frame drawn synchronously");
    assert_eq!(first.index, FrameIndex(0));
    assert!(!first.raster.is_blank());

    running.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn draws_at_nominal_rate_until_stopped() {
    let stops = Arc::default();
    let mut c = Compositor::new(Probe::new((32, 32), &stops), Fps::DEFAULT).unwrap();
    let mut track = c.capture_track().unwrap();
    let mut running = c.start().unwrap();

    tokio::time::sleep(Duration::from_millis(1010)).await;
    let stats = running.stop().await.unwrap();
    assert_eq!(stats.frames_drawn, 31);

    let mut indices = Vec::new();
    while let Some(frame) = track.recv().await {
        indices.push(frame.index.0);
    }
    assert_eq!(indices, (0..=30).collect::<Vec<_>>());
}

#[tokio::test(start_paused = true)]
async fn stop_releases_source_once() {
    let stops = Arc::new(AtomicUsize::new(0));
    let mut c = Compositor::new(Probe::new((16, 16), &stops), Fps::DEFAULT).unwrap();
    let _track = c.capture_track().unwrap();
    let mut running = c.start().unwrap();
    assert!(running.is_running());

    running.stop().await.unwrap();
    assert_eq!(running.stop().await.unwrap(), CompositorStats::default());
    assert!(!running.is_running());
    drop(running);
    assert_eq!(stops.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn unstarted_compositor_releases_source_once() {
    let stops = Arc::new(AtomicUsize::new(0));
    let mut c = Compositor::new(Probe::new((16, 16), &stops), Fps::DEFAULT).unwrap();
    assert!(c.capture_track().is_ok());
    assert!(c.capture_track().is_err());
    let stats = c.release();
    assert_eq!(stats.frames_drawn, 0);
    assert_eq!(stops.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn start_without_track_fails_and_releases() {
    let stops = Arc::new(AtomicUsize::new(0));
    let c = Compositor::new(Probe::new((16, 16), &stops), Fps::DEFAULT).unwrap();
    let err = c.start().err().unwrap();
    assert!(matches!(err, MergeError::Validation(_)));
    assert_eq!(stops.load(Ordering::SeqCst), 1);
}

#[test]
fn degenerate_source_is_rejected_and_released() {
    let stops = Arc::new(AtomicUsize::new(0));
    let err = Compositor::new(Probe::new((0, 10), &stops), Fps::DEFAULT)
        .err()
        .unwrap();
    assert!(matches!(err, MergeError::VisualSourceUnavailable(_)));
    assert_eq!(stops.load(Ordering::SeqCst), 1);
}

struct FailsAfter {
    limit: Duration,
    frame: Raster,
    stops: Arc<AtomicUsize>,
}

impl FrameSource for FailsAfter {
    fn kind(&self) -> SourceKind {
        SourceKind::LoopingVideo
    }

    fn natural_size(&self) -> (u32, u32) {
        (8, 8)
    }

    fn start(&mut self) -> MergeResult<()> {
        Ok(())
    }

    fn current_frame(&mut self, elapsed: Duration) -> MergeResult<&Raster> {
        if elapsed >= self.limit {
            return Err(MergeError::visual_unavailable("decode pipeline lost"));
        }
        Ok(&self.frame)
    }

    fn stop(&mut self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::test(start_paused = true)]
async fn exited_reports_source_failure_as_soon_as_it_happens() {
    let stops = Arc::new(AtomicUsize::new(0));
    let source = Box::new(FailsAfter {
        limit: Duration::from_millis(200),
        frame: Raster::solid(8, 8, [1, 2, 3, 255]),
        stops: Arc::clone(&stops),
    });
    let mut c = Compositor::new(source, Fps::DEFAULT).unwrap();
    let _track = c.capture_track().unwrap();
    let mut running = c.start().unwrap();

    let t0 = tokio::time::Instant::now();
    let err = running.exited().await.unwrap_err();
    assert!(matches!(err, MergeError::VisualSourceUnavailable(_)));
    assert!(t0.elapsed() < Duration::from_millis(300));
    assert!(!running.is_running());
    assert_eq!(stops.load(Ordering::SeqCst), 1);
    assert_eq!(running.stop().await.unwrap(), CompositorStats::default());
}

#[tokio::test(start_paused = true)]
async fn exited_never_resolves_after_stop() {
    let stops = Arc::default();
    let mut c = Compositor::new(Probe::new((16, 16), &stops), Fps::DEFAULT).unwrap();
    let _track = c.capture_track().unwrap();
    let mut running = c.start().unwrap();
    running.stop().await.unwrap();

    let waited = tokio::time::timeout(Duration::from_secs(1), running.exited()).await;
    assert!(waited.is_err());
}
