use serde::{Deserialize, Serialize};

/// Lifecycle state of a voice session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Idle,
    Connecting,
    Active,
    Error,
}

/// Inputs that drive the session state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    StartRequested,
    ChannelOpened,
    StopRequested,
    ChannelClosed,
    ChannelFailed,
    DeviceFailed,
}

/// Next state for `event`, or `None` when the event does not apply
pub fn transition(state: SessionState, event: SessionEvent) -> Option<SessionState> {
    use SessionEvent::*;
    use SessionState::*;

    match (state, event) {
        (Idle | Error, StartRequested) => Some(Connecting),
        (Connecting, ChannelOpened) => Some(Active),
        (Connecting | Active, ChannelFailed | DeviceFailed) => Some(Error),
        (Connecting | Active, ChannelClosed) => Some(Idle),
        (_, StopRequested) => Some(Idle),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_only_from_resting_states() {
        assert_eq!(
            transition(SessionState::Idle, SessionEvent::StartRequested),
            Some(SessionState::Connecting)
        );
        assert_eq!(
            transition(SessionState::Error, SessionEvent::StartRequested),
            Some(SessionState::Connecting)
        );
        assert_eq!(transition(SessionState::Connecting, SessionEvent::StartRequested), None);
        assert_eq!(transition(SessionState::Active, SessionEvent::StartRequested), None);
    }

    #[test]
    fn test_open_only_while_connecting() {
        assert_eq!(
            transition(SessionState::Connecting, SessionEvent::ChannelOpened),
            Some(SessionState::Active)
        );
        assert_eq!(transition(SessionState::Idle, SessionEvent::ChannelOpened), None);
        assert_eq!(transition(SessionState::Active, SessionEvent::ChannelOpened), None);
    }

    #[test]
    fn test_failures_surface_error() {
        for state in [SessionState::Connecting, SessionState::Active] {
            assert_eq!(transition(state, SessionEvent::ChannelFailed), Some(SessionState::Error));
            assert_eq!(transition(state, SessionEvent::DeviceFailed), Some(SessionState::Error));
        }
        assert_eq!(transition(SessionState::Idle, SessionEvent::ChannelFailed), None);
    }

    #[test]
    fn test_close_does_not_clear_error() {
        assert_eq!(
            transition(SessionState::Active, SessionEvent::ChannelClosed),
            Some(SessionState::Idle)
        );
        assert_eq!(transition(SessionState::Error, SessionEvent::ChannelClosed), None);
    }

    #[test]
    fn test_stop_from_any_state() {
        for state in [
            SessionState::Idle,
            SessionState::Connecting,
            SessionState::Active,
            SessionState::Error,
        ] {
            assert_eq!(transition(state, SessionEvent::StopRequested), Some(SessionState::Idle));
        }
    }
}
