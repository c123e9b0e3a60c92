use super::*;
use crate::encode::codec::ContainerCodec;
use crate::foundation::core::Fps;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Clone, Copy)]
enum Outcome {
    Ok,
    Abort,
    Fail,
}

#[derive(Clone)]
struct FakeShare {
    mime: &'static str,
    outcome: Outcome,
    calls: Arc<Mutex<Vec<(String, String, String)>>>,
}

impl FakeShare {
    fn new(outcome: Outcome) -> Self {
        Self {
            mime: "video/",
            outcome,
            calls: Arc::default(),
        }
    }
}

impl ShareTarget for FakeShare {
    fn can_share(&self, mime_type: &str) -> bool {
        mime_type.starts_with(self.mime)
    }

    fn share(&self, file: &SharedFile<'_>) -> Result<(), ShareError> {
        self.calls.lock().unwrap().push((
            file.filename.to_owned(),
            file.title.to_owned(),
            file.mime_type.to_owned(),
        ));
        match self.outcome {
            Outcome::Ok => Ok(()),
            Outcome::Abort => Err(ShareError::Aborted),
            Outcome::Fail => Err(ShareError::Failed("no handler".into())),
        }
    }
}

fn artifact(codec: ContainerCodec) -> EncodedArtifact {
    EncodedArtifact {
        bytes: vec![1, 2, 3, 4],
        codec,
        width: 2,
        height: 2,
        fps: Fps::DEFAULT,
        duration: Duration::from_secs(1),
        video_frames: 30,
        audio_samples: 24_000,
        source_restarts: 0,
    }
}

fn sink(dir: &Path, share: Option<FakeShare>) -> ExportSink {
    let sink = ExportSink::new(ExportOpts {
        download_dir: dir.to_path_buf(),
        share: ShareText {
            title: "My clip".into(),
            text: "hi".into(),
        },
    });
    match share {
        Some(s) => sink.with_share_target(s),
        None => sink,
    }
}

#[test]
fn successful_share_is_delivered_without_download() {
    let dir = tempfile::tempdir().unwrap();
    let share = FakeShare::new(Outcome::Ok);
    let got = sink(dir.path(), Some(share.clone()))
        .export(artifact(ContainerCodec::Mp4H264), "clip")
        .unwrap();
    assert_eq!(got, Delivery::Delivered);
    let calls = share.calls.lock().unwrap();
    assert_eq!(
        calls.as_slice(),
        &[("clip.mp4".to_owned(), "My clip".to_owned(), "video/mp4".to_owned())]
    );
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn aborted_or_failed_share_falls_back_to_download() {
    for outcome in [Outcome::Abort, Outcome::Fail] {
        let dir = tempfile::tempdir().unwrap();
        let got = sink(dir.path(), Some(FakeShare::new(outcome)))
            .export(artifact(ContainerCodec::WebmVp9), "clip")
            .unwrap();
        let expected = dir.path().join("clip.webm");
        assert_eq!(got, Delivery::Downloaded(expected.clone()));
        assert_eq!(std::fs::read(expected).unwrap(), vec![1, 2, 3, 4]);
    }
}

#[test]
fn unsupported_type_skips_share() {
    let dir = tempfile::tempdir().unwrap();
    let mut share = FakeShare::new(Outcome::Ok);
    share.mime = "image/";
    let got = sink(dir.path(), Some(share.clone()))
        .export(artifact(ContainerCodec::Mp4H264), "clip.mp4")
        .unwrap();
    assert!(matches!(got, Delivery::Downloaded(_)));
    assert!(share.calls.lock().unwrap().is_empty());
}

#[test]
fn downloads_never_overwrite() {
    let dir = tempfile::tempdir().unwrap();
    let s = sink(dir.path(), None);
    let a = s.export(artifact(ContainerCodec::WebmH264), "../evil/clip").unwrap();
    let b = s.export(artifact(ContainerCodec::WebmH264), "clip").unwrap();
    let c = s.export(artifact(ContainerCodec::WebmH264), "clip.mkv").unwrap();
    assert_eq!(a, Delivery::Downloaded(dir.path().join("clip.mkv")));
    assert_eq!(b, Delivery::Downloaded(dir.path().join("clip (1).mkv")));
    assert_eq!(c, Delivery::Downloaded(dir.path().join("clip (2).mkv")));
}

#[test]
fn filename_normalization() {
    assert_eq!(normalized_filename("video", "mp4"), "video.mp4");
    assert_eq!(normalized_filename("video.mov", "mp4"), "video.mov");
    assert_eq!(normalized_filename("  ", "webm"), "export.webm");
    assert_eq!(normalized_filename("a/b/c", "mkv"), "c.mkv");
}
