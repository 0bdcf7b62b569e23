//! Online/connected state of a remote

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use tokio::sync::broadcast;

const EVENT_CHANNEL_CAPACITY: usize = 16;

/// One of the two state flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StateField {
    /// Reachable by ping or already connected
    Online,
    /// SSH session currently open
    Connected,
}

impl fmt::Display for StateField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Online => write!(f, "online"),
            Self::Connected => write!(f, "connected"),
        }
    }
}

/// A flag changed value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateEvent {
    /// Which flag changed
    pub field: StateField,
    /// Its new value
    pub value: bool,
}

/// `is_online` and `is_connected` with change notification
///
/// [`State::update`] is the only way to change either flag.
pub struct State {
    online: AtomicBool,
    connected: AtomicBool,
    events: broadcast::Sender<StateEvent>,
}

impl Default for State {
    fn default() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            online: AtomicBool::new(false),
            connected: AtomicBool::new(false),
            events,
        }
    }
}

impl State {
    /// Creates a state with both flags false
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the host is reachable
    #[must_use]
    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Whether an SSH session is open
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Sets `field` to `value`, notifying subscribers if it changed.
    ///
    /// Returns true when the value changed.
    pub fn update(&self, field: StateField, value: bool) -> bool {
        let flag = match field {
            StateField::Online => &self.online,
            StateField::Connected => &self.connected,
        };
        if flag.swap(value, Ordering::SeqCst) == value {
            return false;
        }

        tracing::debug!(%field, value, "State changed");
        let _ = self.events.send(StateEvent { field, value });
        true
    }

    /// Subscribes to flag changes
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<StateEvent> {
        self.events.subscribe()
    }

    /// Copies both flags
    #[must_use]
    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            is_online: self.is_online(),
            is_connected: self.is_connected(),
        }
    }
}

impl fmt::Debug for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("State")
            .field("is_online", &self.is_online())
            .field("is_connected", &self.is_connected())
            .finish()
    }
}

/// Point-in-time copy of a [`State`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StateSnapshot {
    /// Reachable by ping or already connected
    pub is_online: bool,
    /// SSH session currently open
    pub is_connected: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_notifies_only_on_change() {
        let state = State::new();
        let mut events = state.subscribe();

        assert!(state.update(StateField::Online, true));
        assert!(!state.update(StateField::Online, true));
        assert!(!state.update(StateField::Connected, false));
        assert!(state.update(StateField::Connected, true));

        assert_eq!(
            events.try_recv().unwrap(),
            StateEvent {
                field: StateField::Online,
                value: true
            }
        );
        assert_eq!(
            events.try_recv().unwrap(),
            StateEvent {
                field: StateField::Connected,
                value: true
            }
        );
        assert!(events.try_recv().is_err());
        assert_eq!(
            state.snapshot(),
            StateSnapshot {
                is_online: true,
                is_connected: true
            }
        );
    }
}
