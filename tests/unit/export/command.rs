use super::*;

fn file<'a>(bytes: &'a [u8]) -> SharedFile<'a> {
    SharedFile {
        filename: "clip.mp4",
        mime_type: "video/mp4",
        bytes,
        title: "t",
        text: "x",
    }
}

#[test]
fn accepts_video_types_by_default() {
    let target = CommandShareTarget::new("true");
    assert!(target.can_share("video/webm;codecs=vp9,opus"));
    assert!(!target.can_share("image/png"));
    let target = target.accepting(["image/"]);
    assert!(target.can_share("image/png"));
    assert!(!target.can_share("video/mp4"));
}

#[cfg(unix)]
#[test]
fn exit_status_maps_to_share_outcome() {
    let ok = CommandShareTarget::new("sh").with_args(["-c", "test -s \"$1\"", "share"]);
    assert!(ok.share(&file(b"data")).is_ok());

    let aborted = CommandShareTarget::new("sh").with_args(["-c", "exit 130", "share"]);
    assert!(matches!(
        aborted.share(&file(b"data")),
        Err(ShareError::Aborted)
    ));

    let failed = CommandShareTarget::new("sh").with_args(["-c", "echo nope >&2; exit 3", "share"]);
    match failed.share(&file(b"data")) {
        Err(ShareError::Failed(msg)) => assert!(msg.contains("nope")),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn missing_program_is_a_failure() {
    let target = CommandShareTarget::new("/nonexistent/avmerge-share");
    assert!(matches!(
        target.share(&file(b"data")),
        Err(ShareError::Failed(_))
    ));
}
