//! Type-safe ID types for desks, tasks, displays and transitions
//!
//! Tasks, displays and desks are identified by ids handed to us by the window
//! system, so they wrap plain integers. Transition tokens are generated here:
//! - Cannot be zero (using NonZeroU64)
//! - Unique within the process lifetime
//! - Support atomic generation

use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU64, Ordering};

macro_rules! plain_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(u32);

        impl $name {
            pub const fn new(id: u32) -> Self {
                $name(id)
            }

            /// Get the raw ID value
            pub const fn get(&self) -> u32 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($label, "({})"), self.0)
            }
        }
    };
}

plain_id!(
    /// Identifier of a task (one application window stack)
    TaskId,
    "Task"
);
plain_id!(
    /// Identifier of a physical or virtual display
    DisplayId,
    "Display"
);
plain_id!(
    /// Identifier of a desk
    ///
    /// Under the single-desk strategy a desk id is numerically equal to its display id.
    DeskId,
    "Desk"
);
plain_id!(
    /// Identifier of a user profile owning a repository
    UserId,
    "User"
);

impl DisplayId {
    /// The built-in display
    pub const DEFAULT: DisplayId = DisplayId(0);
}

impl DeskId {
    /// Desk id aliased to a display id (single-desk strategy)
    pub const fn for_display(display: DisplayId) -> Self {
        DeskId(display.get())
    }
}

impl UserId {
    /// The primary user
    pub const SYSTEM: UserId = UserId(0);
}

/// Opaque identifier for one asynchronous batch of window-tree mutations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct TransitionToken(NonZeroU64);

/// Atomic counter for generating unique transition tokens
/// Starts at 1 to ensure NonZeroU64 is always valid
static TRANSITION_COUNTER: AtomicU64 = AtomicU64::new(1);

impl TransitionToken {
    /// Generate a new unique token
    pub fn next() -> Self {
        let id = TRANSITION_COUNTER.fetch_add(1, Ordering::Relaxed);
        TransitionToken(NonZeroU64::new(id).unwrap_or(NonZeroU64::MIN))
    }

    /// Create a token from a raw value
    ///
    /// Returns None if the value is zero
    pub fn from_raw(id: u64) -> Option<Self> {
        NonZeroU64::new(id).map(TransitionToken)
    }

    /// Get the raw token value
    pub fn get(&self) -> u64 {
        self.0.get()
    }
}

impl fmt::Display for TransitionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Transition({})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_token_is_unique() {
        let a = TransitionToken::next();
        let b = TransitionToken::next();
        assert_ne!(a, b);
    }

    #[test]
    fn transition_token_from_raw_rejects_zero() {
        assert!(TransitionToken::from_raw(0).is_none());
        assert_eq!(TransitionToken::from_raw(7).map(|t| t.get()), Some(7));
    }

    #[test]
    fn desk_aliases_display() {
        let display = DisplayId::new(3);
        assert_eq!(DeskId::for_display(display).get(), 3);
        assert_eq!(format!("{}", DeskId::new(3)), "Desk(3)");
    }
}
