//! Bus lifecycle states.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::StateMachine;

/// Lifecycle of the event bus.
///
/// `Stopped -> Starting -> Running -> Stopping -> Stopped`. A failed start
/// falls back from `Starting` to `Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BusState {
    #[default]
    Stopped,
    Starting,
    Running,
    Stopping,
}

impl BusState {
    /// True only in `Running`, the single state that accepts publish and
    /// delivery.
    pub fn is_running(&self) -> bool {
        matches!(self, BusState::Running)
    }
}

impl StateMachine for BusState {
    fn can_transition_to(&self, target: &Self) -> bool {
        use BusState::*;
        matches!(
            (self, target),
            (Stopped, Starting)
                | (Starting, Running)
                | (Starting, Stopped)
                | (Running, Stopping)
                | (Stopping, Stopped)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use BusState::*;
        match self {
            Stopped => vec![Starting],
            Starting => vec![Running, Stopped],
            Running => vec![Stopping],
            Stopping => vec![Stopped],
        }
    }
}

impl fmt::Display for BusState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BusState::Stopped => "stopped",
            BusState::Starting => "starting",
            BusState::Running => "running",
            BusState::Stopping => "stopping",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_state_is_stopped() {
        assert_eq!(BusState::default(), BusState::Stopped);
    }

    #[test]
    fn full_cycle_is_valid() {
        let state = BusState::Stopped
            .transition_to(BusState::Starting)
            .and_then(|s| s.transition_to(BusState::Running))
            .and_then(|s| s.transition_to(BusState::Stopping))
            .and_then(|s| s.transition_to(BusState::Stopped));
        assert_eq!(state, Ok(BusState::Stopped));
    }

    #[test]
    fn cannot_skip_starting() {
        assert!(BusState::Stopped.transition_to(BusState::Running).is_err());
    }

    #[test]
    fn cannot_start_twice() {
        assert!(BusState::Running.transition_to(BusState::Starting).is_err());
    }

    #[test]
    fn failed_start_returns_to_stopped() {
        assert!(BusState::Starting.can_transition_to(&BusState::Stopped));
    }

    #[test]
    fn only_running_is_running() {
        assert!(BusState::Running.is_running());
        for state in [BusState::Stopped, BusState::Starting, BusState::Stopping] {
            assert!(!state.is_running());
        }
    }

    #[test]
    fn can_transition_to_is_consistent_with_valid_transitions() {
        for state in [
            BusState::Stopped,
            BusState::Starting,
            BusState::Running,
            BusState::Stopping,
        ] {
            for target in state.valid_transitions() {
                assert!(
                    state.can_transition_to(&target),
                    "can_transition_to should return true for {:?} -> {:?}",
                    state,
                    target
                );
            }
        }
    }
}
