//! Reply and result records exchanged with peers.

use crate::proposal::Proposal;
use crate::quorum::Quorum;

/// A value an acceptor has accepted, with the proposal that carried it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Accepted<T, V, C> {
    /// Proposal the value was accepted under.
    pub proposal: Proposal<V, C>,
    /// The accepted value.
    pub value: T,
}

/// Reply to a prepare request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Response<T, V, C> {
    /// Highest proposal the peer had already seen when ours arrived.
    pub seen: Option<Proposal<V, C>>,
    /// Value the peer has already accepted, if any.
    pub accepted: Option<Accepted<T, V, C>>,
    /// Whether the peer already witnessed a confirmation for the accepted
    /// value. Implies `accepted` is present.
    pub confirmed: bool,
}

/// Result of driving a value to chosen status.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Choice<T, V, C> {
    /// The proposal the operation completed at.
    pub proposal: Proposal<V, C>,
    /// True when an already-accepted value was adopted instead of ours.
    pub conflicted: bool,
    /// The adopted value; present exactly when `conflicted` is set.
    pub value: Option<T>,
}

impl<T, V, C> Choice<T, V, C> {
    /// The caller's own value went through at `proposal`.
    pub(crate) fn chosen(proposal: Proposal<V, C>) -> Self {
        Self {
            proposal,
            conflicted: false,
            value: None,
        }
    }

    /// A previously accepted value was adopted to preserve safety.
    pub(crate) fn adopted(proposal: Proposal<V, C>, value: T) -> Self {
        Self {
            proposal,
            conflicted: true,
            value: Some(value),
        }
    }
}

/// Snapshot of the distributed state as seen by a consistent read.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct State<T, V, C> {
    /// The chosen value, if any peer reported one.
    pub value: Option<T>,
    /// The quorum the read was conducted against.
    pub quorum: Quorum<C>,
    /// The proposal that carried `value`; present exactly when `value` is.
    pub proposal: Option<Proposal<V, C>>,
}
