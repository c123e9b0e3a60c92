use super::*;
use SessionState::*;

#[test]
fn happy_path_is_linear() {
    let mut m = StateMachine::new();
    for next in [Priming, Recording, Finalizing, Done] {
        m.transition(next).unwrap();
    }
    assert_eq!(m.history(), &[Idle, Priming, Recording, Finalizing, Done]);
    assert!(m.state().is_terminal());
}

#[test]
fn failed_is_reachable_from_every_live_state() {
    for from in [Idle, Priming, Recording, Finalizing] {
        assert!(from.can_transition_to(Failed), "{from} -> Failed");
    }
    for from in [Done, Failed, Cancelled] {
        assert!(!from.can_transition_to(Failed), "{from} -> Failed");
    }
}

#[test]
fn cancellation_goes_through_finalizing() {
    assert!(!Recording.can_transition_to(Cancelled));
    assert!(Recording.can_transition_to(Finalizing));
    assert!(Finalizing.can_transition_to(Cancelled));
    assert!(Priming.can_transition_to(Finalizing));
}

#[test]
fn illegal_transition_is_rejected_without_moving() {
    let mut m = StateMachine::new();
    let err = m.transition(Recording).unwrap_err();
    assert!(matches!(err, MergeError::Validation(_)));
    assert_eq!(m.state(), Idle);
    assert!(!Done.can_transition_to(Priming));
}
