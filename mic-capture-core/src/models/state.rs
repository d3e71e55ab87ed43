/// Audio device session lifecycle.
///
/// State transitions:
/// ```text
/// created → configured → running ⇄ stopped
///                           ↓         ↓
///                           └→ disposed ←┘
/// ```
/// `Disposed` is terminal. A session returned from `create` is always
/// `Running`; `Created` and `Configured` are only observed while the
/// configuration sequence is in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Created,
    Configured,
    Running,
    Stopped,
    Disposed,
}

impl SessionState {
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self, Self::Stopped)
    }

    pub fn is_disposed(&self) -> bool {
        matches!(self, Self::Disposed)
    }

    /// Whether the session still holds a hardware unit.
    pub fn holds_unit(&self) -> bool {
        !self.is_disposed()
    }
}

/// Whether the system audio session is currently interrupted
/// (incoming call, another app taking exclusive audio, etc.).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum InterruptionState {
    #[default]
    NotInterrupted,
    Interrupted,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_predicates() {
        assert!(SessionState::Running.is_running());
        assert!(SessionState::Stopped.is_stopped());
        assert!(SessionState::Stopped.holds_unit());
        assert!(!SessionState::Disposed.holds_unit());
        assert_eq!(InterruptionState::default(), InterruptionState::NotInterrupted);
    }
}
