//! Link-state reporting for the dispatcher.
//!
//! The core never manages radio association itself. Whatever owns the WiFi
//! driver (or the OS network stack on gateway hosts) implements
//! [`ConnectivitySupervisor`]; the dispatcher reads the state before every
//! send and may ask for a reconnect attempt, nothing more.

use gatenode_core::ConnectionState;

/// Link state source consumed by the dispatcher and queue drain.
pub trait ConnectivitySupervisor {
    /// Current link state.
    fn state(&self) -> ConnectionState;

    /// Whether requests may be dispatched right now.
    fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Ask the owner of the radio to attempt a reconnect.
    ///
    /// Advisory only; the supervisor decides if and when to act.
    fn request_reconnect(&mut self);
}

/// Supervisor with externally driven state.
///
/// Suits gateway hosts where the OS keeps the link up, and tests that need
/// to script link transitions.
#[derive(Debug, Clone)]
pub struct StaticLink {
    state: ConnectionState,
    reconnect_requests: u32,
}

impl StaticLink {
    /// Create a supervisor reporting `Connected`.
    #[must_use]
    pub fn connected() -> Self {
        Self {
            state: ConnectionState::Connected,
            reconnect_requests: 0,
        }
    }

    /// Create a supervisor reporting `Disconnected`.
    #[must_use]
    pub fn disconnected() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            reconnect_requests: 0,
        }
    }

    /// Drive a state transition from the outside.
    pub fn set_state(&mut self, state: ConnectionState) {
        self.state = state;
    }

    /// Number of reconnect attempts the dispatcher has asked for.
    #[must_use]
    pub fn reconnect_requests(&self) -> u32 {
        self.reconnect_requests
    }
}

impl ConnectivitySupervisor for StaticLink {
    fn state(&self) -> ConnectionState {
        self.state
    }

    fn request_reconnect(&mut self) {
        self.reconnect_requests += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_link_states() {
        let mut link = StaticLink::disconnected();
        assert!(!link.is_connected());

        link.set_state(ConnectionState::Connecting);
        assert!(!link.is_connected());
        assert_eq!(link.state(), ConnectionState::Connecting);

        link.set_state(ConnectionState::Connected);
        assert!(link.is_connected());
    }

    #[test]
    fn test_reconnect_requests_counted() {
        let mut link = StaticLink::disconnected();
        link.request_reconnect();
        link.request_reconnect();
        assert_eq!(link.reconnect_requests(), 2);
    }

    #[test]
    fn test_ap_fallback_not_connected() {
        let mut link = StaticLink::connected();
        link.set_state(ConnectionState::AccessPointFallback);
        assert!(!link.is_connected());
    }
}
