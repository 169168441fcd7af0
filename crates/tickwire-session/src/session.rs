//! Per-connection session state.
//!
//! A [`Session`] is shared between an endpoint's loops. Every field is an
//! independent atomic so the read, write and owner loops can record
//! activity without contending on a lock.

use std::fmt;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::time::Duration;

use tickwire_protocol::SessionId;
use tokio::time::Instant;

use crate::{IdleReason, Idleness};

// ---------------------------------------------------------------------------
// CloseReason
// ---------------------------------------------------------------------------

/// Why a session was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CloseReason {
    /// `close()` was called on the endpoint.
    Requested = 1,
    /// Idle detection fired.
    Idle = 2,
    /// The peer went away.
    PeerClosed = 3,
    /// `force_close()` was called.
    Forced = 4,
    /// The server is shutting down.
    Shutdown = 5,
    /// The peer sent a kick for its own session.
    Kicked = 6,
}

impl CloseReason {
    fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Requested),
            2 => Some(Self::Idle),
            3 => Some(Self::PeerClosed),
            4 => Some(Self::Forced),
            5 => Some(Self::Shutdown),
            6 => Some(Self::Kicked),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Requested => "requested",
            Self::Idle => "idle",
            Self::PeerClosed => "peer_closed",
            Self::Forced => "forced",
            Self::Shutdown => "shutdown",
            Self::Kicked => "kicked",
        }
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

const OPEN: u8 = 0;

/// Identity, activity timestamps and close state of one connection.
///
/// Timestamps are stored as nanoseconds since the session was created,
/// measured on tokio's clock so paused-time tests drive them too.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    created: Instant,
    last_read: AtomicU64,
    last_write: AtomicU64,
    last_pong: AtomicU64,
    state: AtomicU8,
}

impl Session {
    /// A new open session with a random id. All timestamps start at now.
    pub fn new() -> Self {
        Self::with_id(SessionId::new_random())
    }

    pub fn with_id(id: SessionId) -> Self {
        Self {
            id,
            created: Instant::now(),
            last_read: AtomicU64::new(0),
            last_write: AtomicU64::new(0),
            last_pong: AtomicU64::new(0),
            state: AtomicU8::new(OPEN),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn touch_read(&self) {
        self.last_read.store(self.offset_now(), Ordering::Release);
    }

    pub fn touch_write(&self) {
        self.last_write.store(self.offset_now(), Ordering::Release);
    }

    pub fn touch_pong(&self) {
        self.last_pong.store(self.offset_now(), Ordering::Release);
    }

    /// Marks the session closed.
    ///
    /// Returns `true` only for the call that performed the transition;
    /// later calls keep the first reason and return `false`.
    pub fn close(&self, reason: CloseReason) -> bool {
        self.state
            .compare_exchange(OPEN, reason as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.state.load(Ordering::Acquire) != OPEN
    }

    pub fn close_reason(&self) -> Option<CloseReason> {
        CloseReason::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Which timestamps are older than `timeout`.
    ///
    /// A zero `timeout` returns [`Idleness::Disabled`].
    pub fn idleness(&self, timeout: Duration) -> Idleness {
        if timeout.is_zero() {
            return Idleness::Disabled;
        }
        let now = self.offset_now();
        let limit = duration_nanos(timeout);
        let stale = |stamp: &AtomicU64| now.saturating_sub(stamp.load(Ordering::Acquire)) > limit;

        let mut reason = IdleReason::empty();
        if stale(&self.last_read) {
            reason |= IdleReason::READ;
        }
        if stale(&self.last_write) {
            reason |= IdleReason::WRITE;
        }
        if stale(&self.last_pong) {
            reason |= IdleReason::PONG;
        }

        if reason.is_empty() {
            Idleness::Active
        } else {
            Idleness::Idle(reason)
        }
    }

    fn offset_now(&self) -> u64 {
        duration_nanos(Instant::now().saturating_duration_since(self.created))
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

fn duration_nanos(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test(start_paused = true)]
    async fn test_idleness_fresh_session_is_active() {
        let session = Session::new();
        assert_eq!(session.idleness(Duration::from_secs(30)), Idleness::Active);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idleness_zero_timeout_is_disabled() {
        let session = Session::new();
        tokio::time::advance(Duration::from_secs(3600)).await;
        assert_eq!(session.idleness(Duration::ZERO), Idleness::Disabled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idleness_all_stale_reports_every_channel() {
        let session = Session::new();
        tokio::time::advance(Duration::from_secs(31)).await;
        assert_eq!(
            session.idleness(Duration::from_secs(30)),
            Idleness::Idle(IdleReason::all())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_idleness_touched_channels_are_not_reported() {
        let session = Session::new();
        tokio::time::advance(Duration::from_secs(31)).await;
        session.touch_read();
        session.touch_pong();
        assert_eq!(
            session.idleness(Duration::from_secs(30)),
            Idleness::Idle(IdleReason::WRITE)
        );

        session.touch_write();
        assert_eq!(session.idleness(Duration::from_secs(30)), Idleness::Active);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idleness_exactly_at_timeout_is_active() {
        let session = Session::new();
        tokio::time::advance(Duration::from_secs(30)).await;
        assert_eq!(session.idleness(Duration::from_secs(30)), Idleness::Active);
    }

    #[test]
    fn test_close_first_call_wins() {
        let session = Session::new();
        assert!(!session.is_closed());
        assert_eq!(session.close_reason(), None);

        assert!(session.close(CloseReason::Idle));
        assert!(!session.close(CloseReason::Forced));
        assert!(session.is_closed());
        assert_eq!(session.close_reason(), Some(CloseReason::Idle));
    }

    #[test]
    fn test_close_concurrent_callers_exactly_one_succeeds() {
        let session = Arc::new(Session::new());
        let winners = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let session = Arc::clone(&session);
                let winners = Arc::clone(&winners);
                std::thread::spawn(move || {
                    if session.close(CloseReason::Requested) {
                        winners.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(winners.load(Ordering::SeqCst), 1);
        assert!(session.is_closed());
    }

    #[test]
    fn test_close_reason_display() {
        assert_eq!(CloseReason::PeerClosed.to_string(), "peer_closed");
        assert_eq!(CloseReason::Idle.to_string(), "idle");
    }
}
