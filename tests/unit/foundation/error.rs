use super::*;

#[test]
fn display_prefixes_are_stable() {
    assert!(
        MergeError::malformed_audio("x")
            .to_string()
            .contains("malformed audio input:")
    );
    assert!(
        MergeError::visual_unavailable("x")
            .to_string()
            .contains("visual source unavailable:")
    );
    assert!(
        MergeError::codec_unavailable("x")
            .to_string()
            .contains("codec unavailable:")
    );
    assert!(
        MergeError::encoding_stalled("x")
            .to_string()
            .contains("encoding stalled:")
    );
    assert_eq!(MergeError::Cancelled.to_string(), "session cancelled");
}

#[test]
fn classes_separate_input_retry_and_cancel() {
    assert_eq!(
        MergeError::malformed_audio("odd").class(),
        ErrorClass::FixInput
    );
    assert_eq!(
        MergeError::visual_unavailable("404").class(),
        ErrorClass::FixInput
    );
    assert_eq!(MergeError::codec_unavailable("none").class(), ErrorClass::Retry);
    assert_eq!(MergeError::encoding_stalled("0").class(), ErrorClass::Retry);
    assert_eq!(MergeError::Cancelled.class(), ErrorClass::Cancelled);
    assert!(MergeError::Cancelled.is_cancelled());
    assert!(!MergeError::validation("x").is_cancelled());
}

#[test]
fn other_preserves_source() {
    let base = std::io::Error::other("boom");
    let err = MergeError::Other(anyhow::Error::new(base));
    assert!(err.to_string().contains("boom"));
    assert_eq!(err.class(), ErrorClass::Internal);
}
