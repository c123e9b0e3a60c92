use super::*;

#[test]
fn fps_rejects_zero_parts() {
    assert!(Fps::new(0, 1).is_err());
    assert!(Fps::new(30, 0).is_err());
    assert_eq!(Fps::new(30, 1).unwrap(), Fps::DEFAULT);
}

#[test]
fn frame_duration_follows_rate() {
    let ntsc = Fps::new(30_000, 1_001).unwrap();
    assert!((ntsc.frame_duration_secs() - 1_001.0 / 30_000.0).abs() < 1e-12);
    let pal = Fps::new(25, 1).unwrap().frame_interval();
    assert!(pal.abs_diff(Duration::from_millis(40)) <= Duration::from_nanos(1));
    assert!((Fps::DEFAULT.frames_to_secs(90) - 3.0).abs() < 1e-9);
}

#[test]
fn frame_at_rounds_to_nearest_tick() {
    let fps = Fps::DEFAULT;
    assert_eq!(fps.frame_at(Duration::ZERO), FrameIndex(0));
    assert_eq!(fps.frame_at(fps.frame_interval() * 7), FrameIndex(7));
    assert_eq!(fps.frame_at(Duration::from_millis(1010)), FrameIndex(30));
}

#[test]
fn frames_covering_samples_is_exact_ceiling() {
    let fps = Fps::DEFAULT;
    assert_eq!(fps.frames_covering_samples(24_000, 24_000), 30);
    assert_eq!(fps.frames_covering_samples(24_001, 24_000), 31);
    assert_eq!(fps.frames_covering_samples(0, 24_000), 0);

    let ntsc = Fps::new(30000, 1001).unwrap();
    assert_eq!(ntsc.frames_covering_samples(48_000, 24_000), 60);
}

#[test]
fn even_dimensions_drop_one_pixel_when_odd() {
    assert_eq!(even_dimensions(800, 600), (800, 600));
    assert_eq!(even_dimensions(801, 599), (800, 598));
    assert_eq!(even_dimensions(1, 1), (0, 0));
}

#[test]
fn raster_validates_length_and_detects_blank() {
    assert!(Raster::new(2, 2, vec![0u8; 15]).is_err());
    let blank = Raster::new(2, 2, vec![0u8; 16]).unwrap();
    assert!(blank.is_blank());

    let red = Raster::solid(2, 1, [255, 0, 0, 255]);
    assert_eq!(&red.data[..], &[255, 0, 0, 255, 255, 0, 0, 255]);
    assert!(!red.is_blank());
    assert_eq!(red.size(), (2, 1));
}
