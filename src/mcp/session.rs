//! Per-connection protocol lifecycle
//!
//! Stateful transports keep one `Session` per connection. Until the client
//! has sent `initialize`, only `initialize` and `ping` are served; after it,
//! a second `initialize` is refused.

use std::sync::{
    atomic::{AtomicU8, Ordering},
    OnceLock,
};

use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Uninitialized,
    Initializing,
    Ready,
    Closed,
}

impl SessionPhase {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Uninitialized,
            1 => Self::Initializing,
            2 => Self::Ready,
            _ => Self::Closed,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            Self::Uninitialized => 0,
            Self::Initializing => 1,
            Self::Ready => 2,
            Self::Closed => 3,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum SessionRejection {
    NotInitialized,
    AlreadyInitialized,
    Closed,
}

#[derive(Debug)]
pub struct Session {
    phase: AtomicU8,
    protocol_version: OnceLock<String>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            phase: AtomicU8::new(SessionPhase::Uninitialized.as_u8()),
            protocol_version: OnceLock::new(),
        }
    }

    pub fn phase(&self) -> SessionPhase {
        SessionPhase::from_u8(self.phase.load(Ordering::Acquire))
    }

    pub fn protocol_version(&self) -> Option<&str> {
        self.protocol_version.get().map(String::as_str)
    }

    pub fn admit(&self, method: &str) -> Result<(), SessionRejection> {
        match (self.phase(), method) {
            (SessionPhase::Closed, _) => Err(SessionRejection::Closed),
            (SessionPhase::Uninitialized, "initialize") | (_, "ping") => Ok(()),
            (_, "initialize") => Err(SessionRejection::AlreadyInitialized),
            (SessionPhase::Uninitialized, _) => Err(SessionRejection::NotInitialized),
            _ => Ok(()),
        }
    }

    /// Records the negotiated version. Only the first `initialize` of a
    /// session may do this.
    pub fn mark_initializing(&self, protocol_version: &str) -> Result<(), SessionRejection> {
        self.phase
            .compare_exchange(
                SessionPhase::Uninitialized.as_u8(),
                SessionPhase::Initializing.as_u8(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map_err(|current| match SessionPhase::from_u8(current) {
                SessionPhase::Closed => SessionRejection::Closed,
                _ => SessionRejection::AlreadyInitialized,
            })?;
        if self.protocol_version.set(protocol_version.to_string()).is_err() {
            debug!("session protocol version already negotiated");
        }
        debug!(protocol_version, "session initializing");
        Ok(())
    }

    pub fn mark_ready(&self) {
        if self.phase() == SessionPhase::Initializing {
            self.transition(SessionPhase::Ready);
        }
    }

    pub fn close(&self) {
        self.transition(SessionPhase::Closed);
    }

    fn transition(&self, next: SessionPhase) {
        let previous = SessionPhase::from_u8(self.phase.swap(next.as_u8(), Ordering::AcqRel));
        debug!(?previous, ?next, "session phase changed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_handshake_methods_before_initialize() {
        let session = Session::new();
        assert_eq!(session.admit("ping"), Ok(()));
        assert_eq!(session.admit("initialize"), Ok(()));
        assert_eq!(
            session.admit("resources/list"),
            Err(SessionRejection::NotInitialized)
        );
    }

    #[test]
    fn handshake_moves_to_ready() {
        let session = Session::new();
        session.mark_initializing("2025-06-18").expect("first initialize");
        assert_eq!(session.phase(), SessionPhase::Initializing);
        assert_eq!(session.admit("tools/list"), Ok(()));

        session.mark_ready();
        assert_eq!(session.phase(), SessionPhase::Ready);
        assert_eq!(session.protocol_version(), Some("2025-06-18"));
    }

    #[test]
    fn second_initialize_keeps_negotiated_version() {
        let session = Session::new();
        session.mark_initializing("2025-03-26").expect("first initialize");
        session.mark_ready();

        assert_eq!(
            session.admit("initialize"),
            Err(SessionRejection::AlreadyInitialized)
        );
        assert_eq!(
            session.mark_initializing("2025-06-18"),
            Err(SessionRejection::AlreadyInitialized)
        );
        assert_eq!(session.protocol_version(), Some("2025-03-26"));
        assert_eq!(session.phase(), SessionPhase::Ready);
        assert_eq!(session.admit("ping"), Ok(()));
    }

    #[test]
    fn initialized_notification_without_initialize_is_ignored() {
        let session = Session::new();
        session.mark_ready();
        assert_eq!(session.phase(), SessionPhase::Uninitialized);
    }

    #[test]
    fn closed_session_rejects_everything() {
        let session = Session::new();
        session.close();
        assert_eq!(session.admit("ping"), Err(SessionRejection::Closed));
    }
}
