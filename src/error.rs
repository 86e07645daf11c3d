//! Error taxonomy for the peer RPCs and the proposer surface.

use core::fmt;

use error_stack::Report;

use crate::proposal::Proposal;

/// Context for an opaque, peer-originated failure.
///
/// Peers wrap errors the protocol does not recognize in this context. The
/// proposer treats the carrying peer as unavailable for quorum accounting
/// but keeps the first report of a phase around, so that a subsequent
/// headcount failure surfaces the original diagnostic instead of a bare
/// shortfall.
#[derive(Debug, Clone, Copy, Default)]
pub struct WeakError;

impl fmt::Display for WeakError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("peer reported an opaque error")
    }
}

impl core::error::Error for WeakError {}

/// Failure signals shared by the `propose`, `accept` and `confirm` RPCs.
#[derive(Debug)]
pub enum PeerError {
    /// The peer could not be reached or is temporarily unable to take part.
    Unavailable,
    /// The peer failed with a wrapped foreign error.
    Weak(Report<WeakError>),
}

impl fmt::Display for PeerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeerError::Unavailable => f.write_str("peer unavailable"),
            PeerError::Weak(report) => write!(f, "{report}"),
        }
    }
}

impl core::error::Error for PeerError {}

/// A peer's quorum view disagrees with the one it was sent.
///
/// Carries the proposal at which the reconfiguration was observed; absent
/// on replies from peers predating that field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WrongQuorum<V, C> {
    /// Proposal at which the peer observed a different quorum.
    pub proposal: Option<Proposal<V, C>>,
}

impl<V: fmt::Debug, C: fmt::Debug> fmt::Display for WrongQuorum<V, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.proposal {
            Some(proposal) => write!(f, "peer disagrees with quorum as of {proposal:?}"),
            None => f.write_str("peer disagrees with quorum"),
        }
    }
}

impl<V: fmt::Debug, C: fmt::Debug> core::error::Error for WrongQuorum<V, C> {}

/// Failure signals of the `get` RPC.
#[derive(Debug)]
pub enum GetError<V, C> {
    /// One of the signals shared with the write-path RPCs.
    Peer(PeerError),
    /// The peer's quorum view disagrees with ours.
    WrongQuorum(WrongQuorum<V, C>),
}

impl<V, C> From<PeerError> for GetError<V, C> {
    fn from(error: PeerError) -> Self {
        GetError::Peer(error)
    }
}

impl<V: fmt::Debug, C: fmt::Debug> fmt::Display for GetError<V, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GetError::Peer(error) => write!(f, "{error}"),
            GetError::WrongQuorum(wrong) => write!(f, "{wrong}"),
        }
    }
}

impl<V: fmt::Debug, C: fmt::Debug> core::error::Error for GetError<V, C> {}

/// Terminal errors surfaced by the proposer operations.
#[derive(Debug)]
pub enum ConsensusError<V, C> {
    /// Majority not reached in some phase.
    TooFewPeers {
        /// Peers that answered the failing phase.
        reached: usize,
        /// Size of the quorum the phase was conducted against.
        total: usize,
    },
    /// The first opaque peer failure captured before the headcount failed.
    Weak(Report<WeakError>),
    /// The caller's peer view is stale; refresh the peer list and retry.
    WrongQuorum(WrongQuorum<V, C>),
}

impl<V: fmt::Debug, C: fmt::Debug> fmt::Display for ConsensusError<V, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsensusError::TooFewPeers { reached, total } => write!(
                f,
                "too few peers are available to reach consensus: {reached} of {total}"
            ),
            ConsensusError::Weak(report) => write!(f, "{report}"),
            ConsensusError::WrongQuorum(wrong) => write!(f, "{wrong}"),
        }
    }
}

impl<V: fmt::Debug, C: fmt::Debug> core::error::Error for ConsensusError<V, C> {}
