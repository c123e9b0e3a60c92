use super::*;
use crate::foundation::core::FrameIndex;

fn frame(idx: u64, shade: u8) -> VideoFrame {
    VideoFrame {
        index: FrameIndex(idx),
        raster: Raster::solid(2, 2, [shade, 0, 0, 255]),
    }
}

fn shades(timeline: &mut FrameTimeline, frames: &[VideoFrame]) -> Vec<u8> {
    let mut out = Vec::new();
    for f in frames {
        timeline
            .place(f, |r| {
                out.push(r.data[0]);
                Ok(())
            })
            .unwrap();
    }
    timeline
        .finish(|r| {
            out.push(r.data[0]);
            Ok(())
        })
        .unwrap();
    out
}

#[test]
fn gaps_repeat_previous_frame_and_tail_is_padded() {
    let mut t = FrameTimeline::new(6);
    let out = shades(&mut t, &[frame(0, 10), frame(1, 11), frame(3, 13)]);
    assert_eq!(out, vec![10, 11, 11, 13, 13, 13]);
    assert_eq!(t.emitted(), 6);
}

#[test]
fn late_and_overflow_frames_are_dropped() {
    let mut t = FrameTimeline::new(3);
    let out = shades(
        &mut t,
        &[frame(0, 1), frame(0, 2), frame(1, 3), frame(2, 4), frame(3, 5), frame(9, 6)],
    );
    assert_eq!(out, vec![1, 3, 4]);
}

#[test]
fn finishing_without_any_frame_stalls() {
    let mut t = FrameTimeline::new(2);
    let err = t.finish(|_| Ok(())).unwrap_err();
    assert!(matches!(err, MergeError::EncodingStalled(_)));
    assert!(FrameTimeline::new(0).finish(|_| Ok(())).is_ok());
}

#[test]
fn config_frame_count_covers_audio() {
    let cfg = RecorderConfig {
        width: 800,
        height: 600,
        fps: Fps::DEFAULT,
        sample_rate: 24_000,
        audio_samples: 48_000,
        video_bits_per_second: DEFAULT_VIDEO_BITS_PER_SECOND,
    };
    assert!(cfg.validate().is_ok());
    assert_eq!(cfg.frame_count(), 60);
    assert_eq!(cfg.audio_duration(), Duration::from_secs(2));

    let odd = RecorderConfig {
        audio_samples: 24_001,
        ..cfg.clone()
    };
    assert_eq!(odd.frame_count(), 31);

    let bad = RecorderConfig { width: 801, ..cfg };
    assert!(bad.validate().is_err());
}
