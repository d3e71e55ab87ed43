//! System audio session notifications.
//!
//! The platform delivers these asynchronously; the session consumes them from
//! an explicit channel instead of a global notification center.

use std::fmt;

/// Phase of a system audio interruption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InterruptionKind {
    Began,
    Ended,
}

/// Why the audio route changed.
///
/// Raw values match the platform route-change reason codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteChangeReason {
    Unknown,
    NewDeviceAvailable,
    OldDeviceUnavailable,
    CategoryChange,
    Override,
    WakeFromSleep,
    NoSuitableRouteForCategory,
    /// The route's own configuration changed (for example, after this process
    /// reconfigured its unit). Never a reason to restart.
    RouteConfigurationChange,
    Other(u32),
}

impl RouteChangeReason {
    pub const ALL_KNOWN: [Self; 8] = [
        Self::Unknown,
        Self::NewDeviceAvailable,
        Self::OldDeviceUnavailable,
        Self::CategoryChange,
        Self::Override,
        Self::WakeFromSleep,
        Self::NoSuitableRouteForCategory,
        Self::RouteConfigurationChange,
    ];

    pub fn from_raw(raw: u32) -> Self {
        match raw {
            0 => Self::Unknown,
            1 => Self::NewDeviceAvailable,
            2 => Self::OldDeviceUnavailable,
            3 => Self::CategoryChange,
            4 => Self::Override,
            6 => Self::WakeFromSleep,
            7 => Self::NoSuitableRouteForCategory,
            8 => Self::RouteConfigurationChange,
            other => Self::Other(other),
        }
    }

    pub fn raw(&self) -> u32 {
        match self {
            Self::Unknown => 0,
            Self::NewDeviceAvailable => 1,
            Self::OldDeviceUnavailable => 2,
            Self::CategoryChange => 3,
            Self::Override => 4,
            Self::WakeFromSleep => 6,
            Self::NoSuitableRouteForCategory => 7,
            Self::RouteConfigurationChange => 8,
            Self::Other(raw) => *raw,
        }
    }
}

impl fmt::Display for RouteChangeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => f.write_str("unknown"),
            Self::NewDeviceAvailable => f.write_str("newDeviceAvailable"),
            Self::OldDeviceUnavailable => f.write_str("oldDeviceUnavailable"),
            Self::CategoryChange => f.write_str("categoryChange"),
            Self::Override => f.write_str("override"),
            Self::WakeFromSleep => f.write_str("wakeFromSleep"),
            Self::NoSuitableRouteForCategory => f.write_str("noSuitableRouteForCategory"),
            Self::RouteConfigurationChange => f.write_str("routeConfigurationChange"),
            Self::Other(raw) => write!(f, "other({})", raw),
        }
    }
}

/// A notification from the system audio session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SystemAudioEvent {
    Interruption(InterruptionKind),
    RouteChange {
        reason: RouteChangeReason,
        /// Human-readable description of the route before the change.
        previous_route: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_values_round_trip() {
        for reason in RouteChangeReason::ALL_KNOWN {
            assert_eq!(RouteChangeReason::from_raw(reason.raw()), reason);
        }
        assert_eq!(RouteChangeReason::from_raw(5), RouteChangeReason::Other(5));
        assert_eq!(RouteChangeReason::from_raw(42).raw(), 42);
    }

    #[test]
    fn display_names() {
        assert_eq!(
            RouteChangeReason::RouteConfigurationChange.to_string(),
            "routeConfigurationChange"
        );
        assert_eq!(RouteChangeReason::Other(9).to_string(), "other(9)");
    }
}
