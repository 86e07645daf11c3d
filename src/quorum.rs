//! Quorum membership and the per-phase headcount rule.

use std::collections::BTreeSet;

use error_stack::Report;
use tracing::trace;

use crate::error::{ConsensusError, PeerError, WeakError};

/// The set of peer identities a phase is conducted against.
///
/// Built fresh from the peer list at the start of every phase cycle and
/// held identical across the phases of one iteration.
pub type Quorum<C> = BTreeSet<C>;

/// Per-phase tally of peers that answered, plus the first opaque failure.
///
/// Every phase starts a fresh tally; a deferred weak error never crosses a
/// phase boundary.
pub(crate) struct Headcount {
    reached: usize,
    weak: Option<Report<WeakError>>,
}

impl Headcount {
    pub(crate) fn new() -> Self {
        Self {
            reached: 0,
            weak: None,
        }
    }

    /// Record a peer that answered the phase.
    pub(crate) fn reach(&mut self) {
        self.reached += 1;
    }

    /// Record a failed peer, keeping the first opaque error for later.
    pub(crate) fn fail(&mut self, error: PeerError) {
        if let PeerError::Weak(report) = error
            && self.weak.is_none()
        {
            self.weak = Some(report);
        }
    }

    /// Apply the majority rule after a phase joined.
    ///
    /// Writes need a strict majority of the quorum; reads are allowed one
    /// peer less, so a single unreachable peer does not abort a read the
    /// rest of the quorum answered. On shortfall, a captured weak error
    /// takes precedence over the plain headcount failure.
    pub(crate) fn check<V, C>(self, total: usize, reading: bool) -> Result<(), ConsensusError<V, C>> {
        let majority = total / 2 + 1;
        let required = if reading {
            (majority - 1).max(1)
        } else {
            majority
        };
        trace!(reached = self.reached, required, total, "checking headcount");
        if self.reached >= required {
            return Ok(());
        }
        match self.weak {
            Some(report) => Err(ConsensusError::Weak(report)),
            None => Err(ConsensusError::TooFewPeers {
                reached: self.reached,
                total,
            }),
        }
    }
}
