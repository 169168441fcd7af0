//! Idle detection results.

use std::fmt;

bitflags::bitflags! {
    /// Which activity timestamps went stale.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct IdleReason: u8 {
        /// Nothing was read from the peer.
        const READ = 1;
        /// Nothing was written to the peer.
        const WRITE = 1 << 1;
        /// The peer has not answered a ping.
        const PONG = 1 << 2;
    }
}

impl fmt::Display for IdleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("none");
        }
        let mut first = true;
        for (name, _) in self.iter_names() {
            if !first {
                f.write_str("|")?;
            }
            f.write_str(&name.to_ascii_lowercase())?;
            first = false;
        }
        Ok(())
    }
}

/// Outcome of [`Session::idleness`](crate::Session::idleness).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Idleness {
    /// The timeout is zero, so idle detection is switched off.
    Disabled,
    /// Every timestamp is within the timeout.
    Active,
    /// At least one timestamp is older than the timeout.
    Idle(IdleReason),
}

impl Idleness {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle(_))
    }

    /// The stale channels, or `None` when not idle.
    pub fn reason(&self) -> Option<IdleReason> {
        match self {
            Self::Idle(reason) => Some(*reason),
            Self::Disabled | Self::Active => None,
        }
    }
}
