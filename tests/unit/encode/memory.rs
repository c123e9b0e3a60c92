use super::*;
use crate::foundation::core::FrameIndex;

fn cfg(audio_samples: u64) -> RecorderConfig {
    RecorderConfig {
        width: 4,
        height: 2,
        fps: Fps::DEFAULT,
        sample_rate: 24_000,
        audio_samples,
        video_bits_per_second: 1,
    }
}

fn frame(idx: u64) -> VideoFrame {
    VideoFrame {
        index: FrameIndex(idx),
        raster: Raster::solid(4, 2, [idx as u8, 1, 2, 255]),
    }
}

fn collect(chunks: Vec<EncodedChunk>) -> Vec<u8> {
    chunks.into_iter().flat_map(|c| c.data).collect()
}

#[test]
fn capture_log_round_trips_through_chunks() {
    let host = InMemoryHost::new();
    let mut rec = host
        .create_recorder(ContainerCodec::Mp4H264, cfg(24_000))
        .unwrap();
    rec.start().unwrap();
    let mut bytes = Vec::new();
    for i in 0..10u64 {
        rec.write_video(&frame(i * 3)).unwrap();
        rec.write_audio(&AudioBlock {
            first_sample: i * 2400,
            samples: vec![0.0; 2400],
        })
        .unwrap();
        bytes.extend(collect(rec.take_chunks()));
    }
    let out = rec.stop().unwrap();
    bytes.extend(collect(out.chunks));

    assert_eq!(out.video_frames, 30);
    assert_eq!(out.audio_samples, 24_000);
    let log = CaptureLog::parse(&bytes).unwrap();
    assert_eq!((log.width, log.height), (4, 2));
    assert_eq!(log.frame_digests.len(), 30);
    assert_eq!(log.audio_duration(), Duration::from_secs(1));
    assert!((log.video_duration().as_secs_f64() - 1.0).abs() < 1e-6);
    assert_eq!(log.frame_digests[0], log.frame_digests[2]);
    assert_ne!(log.frame_digests[2], log.frame_digests[3]);
    assert_eq!(host.recorders_created(), 1);
    assert_eq!(host.recorders_stopped(), 1);
}

#[test]
fn stalled_recorder_emits_nothing() {
    let host = InMemoryHost::new().with_stall(true);
    let mut rec = host.create_recorder(ContainerCodec::WebmVp9, cfg(240)).unwrap();
    rec.start().unwrap();
    rec.write_video(&frame(0)).unwrap();
    assert!(rec.take_chunks().is_empty());
    assert!(rec.stop().unwrap().chunks.is_empty());
}

#[test]
fn abort_is_counted_once() {
    let host = InMemoryHost::new();
    let mut rec = host.create_recorder(ContainerCodec::Mp4H264, cfg(240)).unwrap();
    rec.start().unwrap();
    rec.abort();
    rec.abort();
    assert!(rec.write_video(&frame(0)).is_err());
    assert_eq!(host.recorders_aborted(), 1);
}

#[test]
fn unsupported_codec_cannot_be_recorded() {
    let host = InMemoryHost::supporting([ContainerCodec::WebmVp9]);
    let err = host
        .create_recorder(ContainerCodec::Mp4H264, cfg(240))
        .err()
        .unwrap();
    assert!(matches!(err, MergeError::CodecUnavailable(_)));
    assert_eq!(host.recorders_created(), 0);
}

#[test]
fn garbage_is_not_a_capture_log() {
    assert!(CaptureLog::parse(b"nope").is_err());
    let mut bytes = MAGIC.to_vec();
    bytes.extend_from_slice(&[0u8; 20]);
    assert!(CaptureLog::parse(&bytes).is_err());
}
