//! Lock modes and the multiple-granularity compatibility rules.
//!
//! Five modes: intention-share (IS), intention-exclusive (IX), share (S),
//! update (U), and exclusive (X).  Compatibility between transactions is
//! table-driven; whether a held mode already covers a new request, and which
//! in-place upgrades are valid, are separate normative tables that encode
//! more than the raw matrix.

use std::fmt;

// ---------------------------------------------------------------------------
//  Lock mode
// ---------------------------------------------------------------------------

/// Lock mode on a hierarchical resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub enum LockMode {
    /// Intention-share -- announces a descendant read.
    IntentShare,
    /// Intention-exclusive -- announces a descendant update or write.
    IntentExclusive,
    /// Share -- read the resource itself.
    Share,
    /// Update -- read with intent to modify; upgradeable to exclusive.
    Update,
    /// Exclusive -- single writer, no other access of any kind.
    Exclusive,
}

impl LockMode {
    /// Check whether this requested mode is compatible with a mode held by
    /// *another* transaction on the same resource.
    ///
    /// Note that `X` is incompatible with itself and so is `U`.
    pub fn compatible_with(self, held: LockMode) -> bool {
        use LockMode::{Exclusive, IntentExclusive, IntentShare, Share, Update};
        match self {
            IntentShare => held != Exclusive,
            IntentExclusive => matches!(held, IntentShare | IntentExclusive),
            Share => matches!(held, IntentShare | Share | Update),
            Update => matches!(held, IntentShare | Share),
            Exclusive => false,
        }
    }

    /// Check compatibility against every mode in `held`.
    pub fn compatible_with_all<I>(self, held: I) -> bool
    where
        I: IntoIterator<Item = LockMode>,
    {
        held.into_iter().all(|m| self.compatible_with(m))
    }

    /// Check whether a lock already held in this mode makes a request for
    /// `requested` a no-op (success with no state change and no event).
    pub fn covers(self, requested: LockMode) -> bool {
        use LockMode::{Exclusive, IntentExclusive, IntentShare, Share, Update};
        match self {
            IntentShare => requested == IntentShare,
            IntentExclusive => matches!(requested, IntentShare | IntentExclusive),
            Share => matches!(requested, IntentShare | Share),
            Update => matches!(requested, IntentShare | Share | Update),
            Exclusive => true,
        }
    }

    /// Check whether a lock held in this mode may be upgraded in place to
    /// `requested`.
    pub fn upgrades_to(self, requested: LockMode) -> bool {
        use LockMode::{Exclusive, IntentExclusive, IntentShare, Share, Update};
        match self {
            IntentShare => matches!(requested, IntentExclusive | Share | Update | Exclusive),
            Share => matches!(requested, Update | Exclusive),
            IntentExclusive => requested == Exclusive,
            Update => requested == Exclusive,
            Exclusive => false,
        }
    }

    /// The intention mode that must be held on every ancestor before this
    /// mode may be taken on a resource.  Intention modes need nothing
    /// further themselves.
    pub fn required_intent(self) -> Option<LockMode> {
        match self {
            LockMode::Share => Some(LockMode::IntentShare),
            LockMode::Update | LockMode::Exclusive => Some(LockMode::IntentExclusive),
            LockMode::IntentShare | LockMode::IntentExclusive => None,
        }
    }

    /// Short uppercase tag (`IS`, `IX`, `S`, `U`, `X`).
    pub fn tag(self) -> &'static str {
        match self {
            LockMode::IntentShare => "IS",
            LockMode::IntentExclusive => "IX",
            LockMode::Share => "S",
            LockMode::Update => "U",
            LockMode::Exclusive => "X",
        }
    }
}

impl fmt::Display for LockMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

// ---------------------------------------------------------------------------
//  Tests
// ---------------------------------------------------------------------------
