use super::*;
use crate::encode::memory::InMemoryHost;

#[test]
fn first_supported_preference_wins() {
    let host = InMemoryHost::new();
    assert_eq!(
        negotiate(&host, &ContainerCodec::DEFAULT_PREFERENCE).unwrap(),
        ContainerCodec::Mp4H264
    );

    let host = InMemoryHost::supporting([ContainerCodec::WebmVp9, ContainerCodec::WebmH264]);
    assert_eq!(
        negotiate(&host, &ContainerCodec::DEFAULT_PREFERENCE).unwrap(),
        ContainerCodec::WebmH264
    );

    let host = InMemoryHost::supporting([ContainerCodec::WebmVp9]);
    assert_eq!(
        negotiate(&host, &ContainerCodec::DEFAULT_PREFERENCE).unwrap(),
        ContainerCodec::WebmVp9
    );
}

#[test]
fn nothing_supported_is_codec_unavailable() {
    let host = InMemoryHost::supporting([]);
    let err = negotiate(&host, &ContainerCodec::DEFAULT_PREFERENCE).unwrap_err();
    assert!(matches!(err, MergeError::CodecUnavailable(_)));

    let host = InMemoryHost::new();
    assert!(matches!(
        negotiate(&host, &[]).unwrap_err(),
        MergeError::CodecUnavailable(_)
    ));
}

#[test]
fn labels_parse_back() {
    for codec in ContainerCodec::DEFAULT_PREFERENCE {
        assert_eq!(codec.label().parse::<ContainerCodec>().unwrap(), codec);
    }
    assert_eq!(" WEBM-VP9 ".parse::<ContainerCodec>().unwrap(), ContainerCodec::WebmVp9);
    assert!("avi".parse::<ContainerCodec>().is_err());
}

#[test]
fn mime_and_extension_match_container() {
    assert_eq!(ContainerCodec::Mp4H264.to_string(), "video/mp4");
    assert_eq!(ContainerCodec::WebmVp9.extension(), "webm");
    assert_eq!(ContainerCodec::WebmH264.muxer(), "matroska");
    assert_eq!(
        serde_json::to_string(&ContainerCodec::WebmH264).unwrap(),
        "\"webm-h264\""
    );
}
