//! Finite State Machine for one device sync

use serde::{Deserialize, Serialize};

/// Sync stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncState {
    /// Not yet started
    Idle,

    /// Checking the device is online, owned and compatible
    Validating,

    /// Running the before-command
    PreHook,

    /// Copying files into the application container
    Transferring,

    /// Stopping then starting the application
    Restarting,

    /// Running the after-command
    PostHook,

    Done,

    Failed,
}

impl SyncState {
    /// Whether a failure in this stage leaves the application in an unknown state
    pub fn needs_compensation(&self) -> bool {
        matches!(
            self,
            SyncState::Transferring | SyncState::Restarting | SyncState::PostHook
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SyncState::Done | SyncState::Failed)
    }
}

/// Sync event
#[derive(Debug, Clone)]
pub enum SyncEvent {
    Begin,

    Validated,

    PreHookDone,

    Transferred,

    /// Restart was not requested
    RestartSkipped,

    Restarted,

    PostHookDone,

    /// Current stage failed
    Fail(String),
}

/// Sync FSM
#[derive(Debug, Clone)]
pub struct SyncFsm {
    state: SyncState,
    failed_in: Option<SyncState>,
    error: Option<String>,
}

impl SyncFsm {
    /// Create a new FSM in idle state
    pub fn new() -> Self {
        Self {
            state: SyncState::Idle,
            failed_in: None,
            error: None,
        }
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    /// Stage in which the sync failed, if it did
    pub fn failed_in(&self) -> Option<SyncState> {
        self.failed_in
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Whether the application must be restarted to recover from the failure
    pub fn needs_compensation(&self) -> bool {
        self.failed_in.is_some_and(|state| state.needs_compensation())
    }

    /// Process an event and transition state
    pub fn process(&mut self, event: SyncEvent) -> Result<(), String> {
        let new_state = match (self.state, &event) {
            (SyncState::Idle, SyncEvent::Begin) => SyncState::Validating,
            (SyncState::Validating, SyncEvent::Validated) => SyncState::PreHook,
            (SyncState::PreHook, SyncEvent::PreHookDone) => SyncState::Transferring,
            (SyncState::Transferring, SyncEvent::Transferred) => SyncState::Restarting,
            (SyncState::Restarting, SyncEvent::Restarted | SyncEvent::RestartSkipped) => SyncState::PostHook,
            (SyncState::PostHook, SyncEvent::PostHookDone) => SyncState::Done,

            // Any started, unfinished stage may fail
            (state, SyncEvent::Fail(err)) if state != SyncState::Idle && !state.is_terminal() => {
                self.failed_in = Some(state);
                self.error = Some(err.clone());
                SyncState::Failed
            }

            // Invalid transitions
            (state, event) => {
                return Err(format!("Invalid transition: {:?} -> {:?}", state, event));
            }
        };

        self.state = new_state;
        Ok(())
    }
}

impl Default for SyncFsm {
    fn default() -> Self {
        Self::new()
    }
}
