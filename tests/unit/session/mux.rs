use super::*;
use crate::audio::pcm::AudioSample;
use crate::audio::playback::AudioPlayback;
use crate::foundation::core::Raster;
use crate::render::compositor::Compositor;
use crate::source::StillImage;

fn tracks() -> (Compositor, VideoTrack, AudioPlayback, AudioTrack) {
    let source = StillImage::new(Raster::solid(8, 6, [1, 2, 3, 255]));
    let mut compositor = Compositor::new(Box::new(source), Fps::DEFAULT).unwrap();
    let video = compositor.capture_track().unwrap();
    let sample = AudioSample::from_samples(24_000, vec![0.25; 2_400]).unwrap();
    let mut playback = AudioPlayback::new(sample, 1_200).unwrap();
    let audio = playback.connect().unwrap();
    (compositor, video, playback, audio)
}

#[test]
fn missing_track_fails() {
    let (_c, video, _p, audio) = tracks();
    assert!(matches!(
        CombinedStream::combine(None, Some(audio)).unwrap_err(),
        MergeError::Validation(_)
    ));
    assert!(CombinedStream::combine(Some(video), None).is_err());
}

#[tokio::test(start_paused = true)]
async fn yields_both_tracks_until_closed() {
    let (compositor, video, mut playback, audio) = tracks();
    let mut stream = CombinedStream::combine(Some(video), Some(audio)).unwrap();
    assert_eq!(stream.video_size(), (8, 6));
    assert_eq!(stream.sample_rate(), 24_000);

    let mut draw = compositor.start().unwrap();
    let ended = playback.start().unwrap();

    let mut frames = 0;
    let mut samples = 0;
    tokio::select! {
        _ = async {
            while let Some(item) = stream.next().await {
                match item {
                    StreamItem::Video(_) => frames += 1,
                    StreamItem::Audio(b) => samples += b.samples.len(),
                }
            }
        } => {}
        _ = ended => {}
    }
    draw.stop().await.unwrap();
    playback.stop().await;
    while let Some(item) = stream.try_next() {
        match item {
            StreamItem::Video(_) => frames += 1,
            StreamItem::Audio(b) => samples += b.samples.len(),
        }
    }
    assert!(stream.next().await.is_none());
    assert_eq!(samples, 2_400);
    assert!(frames >= 3, "frames = {frames}");
}
