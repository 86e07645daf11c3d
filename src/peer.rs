//! The capability surface each acceptor exposes to the proposer.

use core::fmt;

use crate::error::{GetError, PeerError};
use crate::messages::{Accepted, Response};
use crate::proposal::Proposal;
use crate::quorum::Quorum;

/// One acceptor, as seen from the proposer.
///
/// Implementations own transport, serialization and timeouts; a timed-out
/// call must surface as [`PeerError::Unavailable`]. Every operation
/// receives the quorum the proposer is conducting the phase against, so
/// the acceptor can detect membership drift.
#[expect(async_fn_in_trait)]
pub trait Peer {
    /// Application payload driven through consensus.
    type Value: Clone + fmt::Debug;
    /// Logical version values are decided at.
    type Version: Clone + Ord + fmt::Debug;
    /// Stable participant identity, shared with client identities.
    type Id: Copy + Ord + fmt::Debug;

    /// Stable identity of this peer.
    fn id(&self) -> Self::Id;

    /// Phase 1: register `proposal` and report what this peer has seen.
    async fn propose(
        &self,
        quorum: &Quorum<Self::Id>,
        proposal: &Proposal<Self::Version, Self::Id>,
    ) -> Result<Response<Self::Value, Self::Version, Self::Id>, PeerError>;

    /// Phase 2: submit `value` at `proposal`.
    ///
    /// Returns the minimum proposal the peer is willing to accept at this
    /// version; a minimum above `proposal` means the submission lost to a
    /// concurrent proposer.
    async fn accept(
        &self,
        quorum: &Quorum<Self::Id>,
        proposal: &Proposal<Self::Version, Self::Id>,
        value: &Self::Value,
    ) -> Result<Proposal<Self::Version, Self::Id>, PeerError>;

    /// Phase 3: record that `proposal` carried the chosen value.
    async fn confirm(
        &self,
        quorum: &Quorum<Self::Id>,
        proposal: &Proposal<Self::Version, Self::Id>,
    ) -> Result<(), PeerError>;

    /// Consistent read: the highest accepted value this peer knows of.
    async fn get(
        &self,
        quorum: &Quorum<Self::Id>,
    ) -> Result<
        Option<Accepted<Self::Value, Self::Version, Self::Id>>,
        GetError<Self::Version, Self::Id>,
    >;
}
