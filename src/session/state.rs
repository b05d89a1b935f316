//! Session states
//!
//! ```text
//! None -> Build -> Version -> Status -> Idle -+-> Done
//!                                              +-> Download -> Done
//!                                              +-> FirmwareStatus -> FirmwareStatusWait -> Done
//!                                              +-> DebugIo -> Done
//!                                              +-> ExtendedStatus -> Done
//! ```

use core::fmt;

use crate::chars::Role;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionState {
    /// Connected, nothing read yet
    #[default]
    None,
    Build,
    Version,
    Status,
    /// Status known, command not dispatched yet
    Idle,
    Download,
    /// Waiting for the first firmware status
    FirmwareStatus,
    /// Upload in progress
    FirmwareStatusWait,
    DebugIo,
    ExtendedStatus,
    Done,
}

impl SessionState {
    /// Next discovery step and the characteristic it reads
    pub fn next_discovery(self) -> Option<(SessionState, Role)> {
        match self {
            SessionState::None => Some((SessionState::Build, Role::Build)),
            SessionState::Build => Some((SessionState::Version, Role::Version)),
            SessionState::Version => Some((SessionState::Status, Role::Status)),
            _ => None,
        }
    }

    /// States that read a status reply as a status refresh
    ///
    /// Elsewhere a read response belongs to the pending command.
    pub fn accepts_keep_alive(self) -> bool {
        matches!(self, SessionState::Idle | SessionState::Download)
    }

    pub fn is_discovery(self) -> bool {
        matches!(
            self,
            SessionState::None | SessionState::Build | SessionState::Version
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::None => "none",
            SessionState::Build => "build",
            SessionState::Version => "version",
            SessionState::Status => "status",
            SessionState::Idle => "idle",
            SessionState::Download => "download",
            SessionState::FirmwareStatus => "firmware status",
            SessionState::FirmwareStatusWait => "firmware upload",
            SessionState::DebugIo => "debug i/o",
            SessionState::ExtendedStatus => "extended status",
            SessionState::Done => "done",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discovery_order() {
        let mut state = SessionState::default();
        let mut roles = Vec::new();
        while let Some((next, role)) = state.next_discovery() {
            roles.push(role);
            state = next;
        }
        assert_eq!(roles, [Role::Build, Role::Version, Role::Status]);
        assert_eq!(state, SessionState::Status);
        assert!(!state.is_discovery());
        assert!(!SessionState::FirmwareStatusWait.accepts_keep_alive());
        assert!(SessionState::Download.accepts_keep_alive());
    }
}
