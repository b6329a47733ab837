//! Control values returned by iteration callbacks.
//!
//! Callbacks return `Result<Visit, E>` (or `Result<KeyAction, E>` for the
//! key phase of a sparse read). Stopping is an ordinary value, so it can
//! never be mistaken for a failure and propagated by accident.

/// What an iteration callback wants to happen next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Visit {
    /// Move on to the next entry.
    Continue,
    /// End iteration now; the iterating call returns `Ok(())`.
    Stop,
}

impl Visit {
    pub fn is_stop(self) -> bool {
        matches!(self, Visit::Stop)
    }
}

/// Decision made on a key during a sparse read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyAction {
    /// Do not read this key's value.
    Skip,
    /// Read the value and hand it to the value callback.
    Fetch,
    /// End iteration now without reading the value.
    Stop,
}

impl From<bool> for KeyAction {
    /// `true` fetches, `false` skips.
    fn from(fetch: bool) -> Self {
        if fetch {
            KeyAction::Fetch
        } else {
            KeyAction::Skip
        }
    }
}
