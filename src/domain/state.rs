use serde::{Deserialize, Serialize};

/// Coarse engine state witnessed by all callers.
///
/// `Idle → Running ⇄ Paused`; `Running → Stopped` requires an explicit
/// restart; `KillSwitchActive` is reachable from any state and is
/// terminal until explicit deactivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineState {
    /// Constructed but not started
    Idle,
    /// Processing loop is consuming the queue
    Running,
    /// Loop alive but not consuming; pending tasks preserved
    Paused,
    /// Explicitly stopped; pending tasks were discarded
    Stopped,
    /// Safety interlock tripped; all activity halted
    KillSwitchActive,
}

impl EngineState {
    pub fn is_running(&self) -> bool {
        matches!(self, EngineState::Running)
    }

    /// Whether submit_order may enqueue new work in this state.
    pub fn accepts_orders(&self) -> bool {
        !matches!(self, EngineState::KillSwitchActive)
    }
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineState::Idle => write!(f, "idle"),
            EngineState::Running => write!(f, "running"),
            EngineState::Paused => write!(f, "paused"),
            EngineState::Stopped => write!(f, "stopped"),
            EngineState::KillSwitchActive => write!(f, "kill_switch_active"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_predicates() {
        assert!(EngineState::Running.is_running());
        assert!(!EngineState::Paused.is_running());

        assert!(EngineState::Idle.accepts_orders());
        assert!(EngineState::Paused.accepts_orders());
        assert!(!EngineState::KillSwitchActive.accepts_orders());
    }

    #[test]
    fn test_state_display() {
        assert_eq!(EngineState::KillSwitchActive.to_string(), "kill_switch_active");
        assert_eq!(EngineState::Running.to_string(), "running");
    }
}
