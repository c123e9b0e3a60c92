use super::*;
use crate::encode::memory::{CaptureLog, InMemoryHost};
use crate::foundation::core::Raster;
use crate::source::StillImage;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Clone, Default)]
struct Events(Arc<Mutex<Vec<String>>>);

impl Events {
    fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.0.lock().unwrap())
    }
}

impl SessionObserver for Events {
    fn on_progress(&mut self, message: &str) {
        self.0.lock().unwrap().push(format!("progress:{message}"));
    }

    fn on_transition(&mut self, from: SessionState, to: SessionState) {
        self.0.lock().unwrap().push(format!("state:{from}->{to}"));
    }

    fn on_setup_step(&mut self, step: SetupStep) {
        self.0.lock().unwrap().push(format!("setup:{step:?}"));
    }
}

struct Counted {
    inner: StillImage,
    stops: Arc<AtomicUsize>,
}

impl FrameSource for Counted {
    fn kind(&self) -> SourceKind {
        self.inner.kind()
    }

    fn natural_size(&self) -> (u32, u32) {
        self.inner.natural_size()
    }

    fn start(&mut self) -> MergeResult<()> {
        self.inner.start()
    }

    fn current_frame(&mut self, elapsed: Duration) -> MergeResult<&Raster> {
        self.inner.current_frame(elapsed)
    }

    fn stop(&mut self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.inner.stop();
    }
}

fn counted(stops: &Arc<AtomicUsize>) -> Box<dyn FrameSource> {
    Box::new(Counted {
        inner: StillImage::new(Raster::solid(16, 8, [0, 128, 255, 255])),
        stops: Arc::clone(stops),
    })
}

fn audio(secs: f64) -> AudioSample {
    let n = (secs * 24_000.0) as usize;
    AudioSample::from_samples(24_000, vec![0.1; n]).unwrap()
}

#[tokio::test(start_paused = true)]
async fn setup_runs_draw_loop_then_recorder_then_audio() {
    let host = Arc::new(InMemoryHost::new());
    let events = Events::default();
    let stops = Arc::new(AtomicUsize::new(0));
    let mut session = CompositeSession::new(audio(0.5), counted(&stops), host.clone(), SessionOpts::default())
        .with_observer(events.clone());

    let artifact = session.run().await.unwrap();
    assert_eq!(artifact.codec, ContainerCodec::Mp4H264);
    assert_eq!((artifact.width, artifact.height), (16, 8));
    assert_eq!(artifact.video_frames, 15);
    assert_eq!(artifact.duration, Duration::from_millis(500));

    let log = events.take();
    let setup: Vec<&str> = log
        .iter()
        .filter_map(|e| e.strip_prefix("setup:"))
        .collect();
    assert_eq!(setup, ["DrawLoop", "Recorder", "Audio"]);
    assert!(log.contains(&"progress:Encoding as video/mp4".to_owned()));
    assert!(log.contains(&"progress:Rendering video...".to_owned()));
    let recording = log.iter().position(|e| e == "state:Priming->Recording").unwrap();
    let last_setup = log.iter().position(|e| e == "setup:Audio").unwrap();
    assert!(last_setup < recording);

    assert_eq!(
        session.history(),
        &[
            SessionState::Idle,
            SessionState::Priming,
            SessionState::Recording,
            SessionState::Finalizing,
            SessionState::Done
        ]
    );
    assert_eq!(stops.load(Ordering::SeqCst), 1);
    assert_eq!(host.recorders_stopped(), 1);
    assert_eq!(host.recorders_aborted(), 0);

    let capture = CaptureLog::parse(&artifact.bytes).unwrap();
    assert_eq!(capture.audio_samples, 12_000);
    assert_eq!(capture.frame_digests.len(), 15);
}

#[tokio::test(start_paused = true)]
async fn a_session_runs_only_once() {
    let host = Arc::new(InMemoryHost::new());
    let stops = Arc::new(AtomicUsize::new(0));
    let mut session =
        CompositeSession::new(audio(0.1), counted(&stops), host, SessionOpts::default());
    session.run().await.unwrap();
    let err = session.run().await.unwrap_err();
    assert!(matches!(err, MergeError::Validation(_)));
    assert_eq!(session.state(), SessionState::Done);
}

#[tokio::test]
async fn empty_audio_fails_before_acquiring_anything() {
    let host = Arc::new(InMemoryHost::new());
    let stops = Arc::new(AtomicUsize::new(0));
    let empty = AudioSample::from_samples(24_000, Vec::<f32>::new()).unwrap();
    let mut session = CompositeSession::new(empty, counted(&stops), host.clone(), SessionOpts::default());
    let err = session.run().await.unwrap_err();
    assert!(matches!(err, MergeError::MalformedAudioInput(_)));
    assert_eq!(session.state(), SessionState::Failed);
    assert_eq!(stops.load(Ordering::SeqCst), 1);
    assert_eq!(host.recorders_created(), 0);
}

#[tokio::test(start_paused = true)]
async fn stalled_recorder_fails_after_releasing_resources() {
    let host = Arc::new(InMemoryHost::new().with_stall(true));
    let stops = Arc::new(AtomicUsize::new(0));
    let mut session =
        CompositeSession::new(audio(0.3), counted(&stops), host.clone(), SessionOpts::default());
    let err = session.run().await.unwrap_err();
    assert!(matches!(err, MergeError::EncodingStalled(_)));
    assert_eq!(err.class(), crate::foundation::error::ErrorClass::Retry);
    assert_eq!(session.state(), SessionState::Failed);
    assert_eq!(stops.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn cancel_before_run_acquires_nothing() {
    let host = Arc::new(InMemoryHost::new());
    let stops = Arc::new(AtomicUsize::new(0));
    let mut session =
        CompositeSession::new(audio(1.0), counted(&stops), host.clone(), SessionOpts::default());
    let handle = session.cancel_handle();
    handle.cancel();
    assert!(handle.is_cancelled());

    let err = session.run().await.unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(
        session.history(),
        &[SessionState::Idle, SessionState::Finalizing, SessionState::Cancelled]
    );
    assert_eq!(host.recorders_created(), 0);
    assert_eq!(stops.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn invalid_options_fail_fast() {
    let host = Arc::new(InMemoryHost::new());
    let stops = Arc::new(AtomicUsize::new(0));
    let opts = SessionOpts {
        audio_block_samples: 0,
        ..SessionOpts::default()
    };
    let mut session = CompositeSession::new(audio(0.1), counted(&stops), host, opts);
    assert!(matches!(
        session.run().await.unwrap_err(),
        MergeError::Validation(_)
    ));
    assert_eq!(stops.load(Ordering::SeqCst), 1);
}

#[test]
fn closures_observe_progress_only() {
    let mut seen = Vec::new();
    {
        let mut observer = |m: &str| seen.push(m.to_owned());
        SessionObserver::on_progress(&mut observer, "hello");
        SessionObserver::on_setup_step(&mut observer, SetupStep::Audio);
    }
    assert_eq!(seen, ["hello"]);
}
