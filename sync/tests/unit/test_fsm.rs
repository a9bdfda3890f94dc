//! FSM unit tests

use resin_sync::sync::fsm::{SyncEvent, SyncFsm, SyncState};

fn advanced_to(events: Vec<SyncEvent>) -> SyncFsm {
    let mut fsm = SyncFsm::new();
    for event in events {
        fsm.process(event).unwrap();
    }
    fsm
}

#[test]
fn test_fsm_initial_state() {
    let fsm = SyncFsm::new();
    assert_eq!(fsm.state(), SyncState::Idle);
    assert!(fsm.error().is_none());
    assert!(fsm.failed_in().is_none());
    assert!(!fsm.needs_compensation());
}

#[test]
fn test_fsm_skipped_restart_reaches_done() {
    let fsm = advanced_to(vec![
        SyncEvent::Begin,
        SyncEvent::Validated,
        SyncEvent::PreHookDone,
        SyncEvent::Transferred,
        SyncEvent::RestartSkipped,
        SyncEvent::PostHookDone,
    ]);
    assert_eq!(fsm.state(), SyncState::Done);
    assert!(fsm.state().is_terminal());
}

#[test]
fn test_fsm_pre_hook_failure_needs_no_compensation() {
    let mut fsm = advanced_to(vec![SyncEvent::Begin, SyncEvent::Validated]);
    fsm.process(SyncEvent::Fail("exit 1".to_string())).unwrap();

    assert_eq!(fsm.failed_in(), Some(SyncState::PreHook));
    assert!(!fsm.needs_compensation());
}

#[test]
fn test_fsm_failures_from_transfer_onward_need_compensation() {
    let prefixes = vec![
        vec![SyncEvent::Begin, SyncEvent::Validated, SyncEvent::PreHookDone],
        vec![
            SyncEvent::Begin,
            SyncEvent::Validated,
            SyncEvent::PreHookDone,
            SyncEvent::Transferred,
        ],
        vec![
            SyncEvent::Begin,
            SyncEvent::Validated,
            SyncEvent::PreHookDone,
            SyncEvent::Transferred,
            SyncEvent::Restarted,
        ],
    ];

    for prefix in prefixes {
        let mut fsm = advanced_to(prefix);
        let stage = fsm.state();
        fsm.process(SyncEvent::Fail("boom".to_string())).unwrap();
        assert_eq!(fsm.state(), SyncState::Failed);
        assert_eq!(fsm.failed_in(), Some(stage));
        assert!(fsm.needs_compensation(), "{:?} should need compensation", stage);
        assert_eq!(fsm.error(), Some("boom"));
    }
}

#[test]
fn test_fsm_invalid_transition() {
    let mut fsm = SyncFsm::new();

    // Idle -> Transferred is not valid
    assert!(fsm.process(SyncEvent::Transferred).is_err());
    assert_eq!(fsm.state(), SyncState::Idle);

    // Nothing has started, so nothing can fail
    assert!(fsm.process(SyncEvent::Fail("early".to_string())).is_err());
}

#[test]
fn test_fsm_terminal_states_are_final() {
    let mut fsm = advanced_to(vec![SyncEvent::Begin]);
    fsm.process(SyncEvent::Fail("offline".to_string())).unwrap();
    assert!(fsm.process(SyncEvent::Fail("again".to_string())).is_err());
    assert!(fsm.process(SyncEvent::Begin).is_err());
    assert_eq!(fsm.error(), Some("offline"));
}
