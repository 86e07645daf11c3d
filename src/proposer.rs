//! The proposer state machine: driving values to chosen status and
//! reading the distributed state back.

use std::collections::BTreeSet;

use rand::Rng;
use rand::rngs::StdRng;
use tracing::{debug, instrument, trace};

use crate::config::{ProposerConfig, Sleep, TokioSleep};
use crate::error::{ConsensusError, GetError, WrongQuorum};
use crate::fanout::{Flow, fan_out};
use crate::messages::{Accepted, Choice, Response, State};
use crate::peer::Peer;
use crate::proposal::Proposal;
use crate::quorum::{Headcount, Quorum};

type PeerProposal<P> = Proposal<<P as Peer>::Version, <P as Peer>::Id>;
type PeerResponse<P> = Response<<P as Peer>::Value, <P as Peer>::Version, <P as Peer>::Id>;
type PeerAccepted<P> = Accepted<<P as Peer>::Value, <P as Peer>::Version, <P as Peer>::Id>;
type PeerChoice<P> = Choice<<P as Peer>::Value, <P as Peer>::Version, <P as Peer>::Id>;
type PeerState<P> = State<<P as Peer>::Value, <P as Peer>::Version, <P as Peer>::Id>;
type PeerConsensusError<P> = ConsensusError<<P as Peer>::Version, <P as Peer>::Id>;

/// Drives single values through a quorum of peers, one decided value per
/// version.
///
/// A proposer is not thread-safe: it runs inside a single task, and
/// `choose`/`state` must not be invoked concurrently with themselves (the
/// exclusive borrows enforce this). The peer list may be replaced between
/// operations but not during one.
pub struct Proposer<P: Peer, S: Sleep = TokioSleep, R: Rng = StdRng> {
    id: P::Id,
    peers: Vec<P>,
    round: u64,
    config: ProposerConfig<S, R>,
}

impl<P: Peer> Proposer<P> {
    /// Create a proposer over `peers` with the default configuration.
    ///
    /// # Panics
    ///
    /// Panics if `peers` is empty.
    #[must_use]
    pub fn new(id: P::Id, peers: Vec<P>) -> Self {
        Self::with_config(id, peers, ProposerConfig::default())
    }
}

impl<P: Peer, S: Sleep, R: Rng> Proposer<P, S, R> {
    /// Create a proposer with an explicit configuration.
    ///
    /// # Panics
    ///
    /// Panics if `peers` is empty.
    #[must_use]
    pub fn with_config(id: P::Id, peers: Vec<P>, config: ProposerConfig<S, R>) -> Self {
        assert!(!peers.is_empty(), "a proposer needs at least one peer");
        Self {
            id,
            peers,
            round: 0,
            config,
        }
    }

    /// Replace the peer list.
    ///
    /// # Panics
    ///
    /// Panics if `peers` is empty.
    pub fn peers(&mut self, peers: Vec<P>) {
        assert!(!peers.is_empty(), "a proposer needs at least one peer");
        self.peers = peers;
    }

    /// Toggle the randomized delay between conflicted iterations.
    pub fn conflict_backoff(&mut self, enabled: bool) {
        self.config.conflict_backoff = enabled;
    }

    fn quorum(&self) -> Quorum<P::Id> {
        self.peers.iter().map(Peer::id).collect()
    }

    /// Drive `value` to chosen status at the default version.
    ///
    /// # Errors
    ///
    /// See [`choose_at`](Self::choose_at).
    pub async fn choose(&mut self, value: P::Value) -> Result<PeerChoice<P>, PeerConsensusError<P>>
    where
        P::Version: Default,
    {
        self.choose_at(P::Version::default(), value).await
    }

    /// Drive `value` to chosen status at `version`.
    ///
    /// Returns the choice actually made: either `value` under our own
    /// proposal, or a previously accepted value this client adopted to
    /// preserve safety, flagged `conflicted`. Conflicts with concurrent
    /// proposers are retried internally with escalated proposals and
    /// randomized exponential backoff; only peer availability bounds the
    /// retries.
    ///
    /// # Errors
    ///
    /// Fails with [`ConsensusError::TooFewPeers`] when any phase reaches
    /// less than a strict majority of the quorum, or with
    /// [`ConsensusError::Weak`] when an opaque peer failure was captured
    /// before the shortfall.
    #[instrument(skip_all, fields(client = ?self.id))]
    pub async fn choose_at(
        &mut self,
        mut version: P::Version,
        value: P::Value,
    ) -> Result<PeerChoice<P>, PeerConsensusError<P>> {
        debug!(?value, "choosing value");
        let mut backoff = 1u32;
        loop {
            let quorum = self.quorum();
            let mut unavailables: BTreeSet<P::Id> = BTreeSet::new();
            let mut replace: Option<P::Value> = None;
            // The round advances before every prepare, so each iteration
            // sends a proposal strictly above anything we sent before.
            self.round += 1;
            let proposal = Proposal::new(version.clone(), self.round, self.id);
            trace!(?proposal, "sending proposal");

            // Phase 1: prepare.
            let mut headcount = Headcount::new();
            let mut responses: Vec<PeerResponse<P>> = Vec::new();
            {
                let q = &quorum;
                let p = &proposal;
                fan_out(
                    self.peers
                        .iter()
                        .map(|peer| async move { (peer.id(), peer.propose(q, p).await) }),
                    |(id, outcome)| {
                        match outcome {
                            Ok(response) => {
                                headcount.reach();
                                responses.push(response);
                            }
                            Err(error) => {
                                trace!(peer = ?id, %error, "peer failed to prepare");
                                unavailables.insert(id);
                                headcount.fail(error);
                            }
                        }
                        Flow::Continue
                    },
                )
                .await;
            }

            // A confirmation was already witnessed: the value is chosen,
            // adopt it no matter how many peers answered.
            if let Some(accepted) = responses
                .iter()
                .find(|response| response.confirmed)
                .and_then(|response| response.accepted.as_ref())
            {
                debug!(proposal = ?accepted.proposal, "value already confirmed");
                return Ok(Choice::adopted(
                    accepted.proposal.clone(),
                    accepted.value.clone(),
                ));
            }
            headcount.check(quorum.len(), false)?;

            // Safety: re-propose the accepted value carried by the highest
            // proposal instead of our own value.
            if let Some(accepted) = responses
                .iter()
                .filter_map(|response| response.accepted.as_ref())
                .max_by(|a, b| a.proposal.cmp(&b.proposal))
            {
                debug!(proposal = ?accepted.proposal, "adopting already accepted value");
                replace = Some(accepted.value.clone());
            }

            if let Some(seen) = responses
                .iter()
                .filter_map(|response| response.seen.as_ref())
                .max()
            {
                if *seen == proposal {
                    // Our own proposal came back: a replayed round.
                    self.round = seen.round + 1;
                    debug!(round = self.round, "self conflict, retrying");
                    continue;
                }
                if proposal < *seen {
                    // The next iteration's increment takes us past it.
                    version = seen.version.clone();
                    self.round = seen.round;
                    debug!(?version, round = self.round, "higher proposal seen, retrying");
                    continue;
                }
            }

            // Phase 2: accept.
            let mut headcount = Headcount::new();
            let mut conflict: Option<PeerProposal<P>> = None;
            {
                let q = &quorum;
                let p = &proposal;
                let body = replace.as_ref().unwrap_or(&value);
                let calls: Vec<_> = self
                    .peers
                    .iter()
                    .filter(|peer| !unavailables.contains(&peer.id()))
                    .map(|peer| async move { (peer.id(), peer.accept(q, p, body).await) })
                    .collect();
                fan_out(calls, |(id, outcome)| {
                    match outcome {
                        Ok(minimum) => {
                            if proposal < minimum {
                                trace!(peer = ?id, ?minimum, "conflicted proposal");
                                conflict = Some(minimum);
                                return Flow::Break;
                            }
                            headcount.reach();
                        }
                        Err(error) => {
                            trace!(peer = ?id, %error, "peer failed to accept");
                            unavailables.insert(id);
                            headcount.fail(error);
                        }
                    }
                    Flow::Continue
                })
                .await;
            }

            if let Some(minimum) = conflict {
                version = minimum.version;
                self.round = minimum.round;
                let delay = self.config.backoff.delay(backoff, &mut self.config.rng);
                if self.config.conflict_backoff {
                    debug!(?delay, "conflicted proposal, backing off");
                    self.config.sleep.sleep(delay).await;
                } else {
                    debug!("conflicted proposal, retrying");
                }
                backoff = self.config.backoff.escalate(backoff);
                continue;
            }
            headcount.check(quorum.len(), false)?;

            trace!(chosen = ?replace.as_ref().unwrap_or(&value), "value accepted, confirming");

            // Phase 3: confirm.
            let mut headcount = Headcount::new();
            {
                let q = &quorum;
                let p = &proposal;
                let calls: Vec<_> = self
                    .peers
                    .iter()
                    .filter(|peer| !unavailables.contains(&peer.id()))
                    .map(|peer| async move { (peer.id(), peer.confirm(q, p).await) })
                    .collect();
                fan_out(calls, |(id, outcome)| {
                    match outcome {
                        Ok(()) => headcount.reach(),
                        Err(error) => {
                            trace!(peer = ?id, %error, "peer failed to confirm");
                            unavailables.insert(id);
                            headcount.fail(error);
                        }
                    }
                    Flow::Continue
                })
                .await;
            }
            headcount.check(quorum.len(), false)?;

            return Ok(match replace {
                Some(adopted) => Choice::adopted(proposal, adopted),
                None => Choice::chosen(proposal),
            });
        }
    }

    /// Read the distributed state: the chosen value (if any), the quorum
    /// it was read under, and the proposal that carried it.
    ///
    /// # Errors
    ///
    /// Fails with [`ConsensusError::WrongQuorum`] when a peer's quorum
    /// view supersedes ours (refresh the peer list and retry), and with
    /// [`ConsensusError::TooFewPeers`] or [`ConsensusError::Weak`] on a
    /// read headcount shortfall.
    #[instrument(skip_all, fields(client = ?self.id))]
    pub async fn state(&self) -> Result<PeerState<P>, PeerConsensusError<P>> {
        let quorum = self.quorum();
        let mut headcount = Headcount::new();
        let mut res: Option<PeerAccepted<P>> = None;
        let mut wrong_quorum: Option<WrongQuorum<P::Version, P::Id>> = None;
        let mut legacy: Option<WrongQuorum<P::Version, P::Id>> = None;
        {
            let q = &quorum;
            fan_out(
                self.peers
                    .iter()
                    .map(|peer| async move { (peer.id(), peer.get(q).await) }),
                |(id, outcome)| {
                    match outcome {
                        Ok(accepted) => {
                            if let Some(accepted) = accepted {
                                if res
                                    .as_ref()
                                    .is_none_or(|best| best.proposal < accepted.proposal)
                                {
                                    trace!(proposal = ?accepted.proposal, "keeping accepted value");
                                    res = Some(accepted);
                                } else {
                                    trace!(proposal = ?accepted.proposal, "skipping accepted value");
                                }
                            }
                            headcount.reach();
                        }
                        Err(GetError::WrongQuorum(wrong)) => {
                            if wrong.proposal.is_none() {
                                // Peers predating the proposal field cannot
                                // be ranked; surface them as-is once the
                                // fan-out joins.
                                legacy = Some(wrong);
                                return Flow::Continue;
                            }
                            if wrong_quorum
                                .as_ref()
                                .is_none_or(|best| best.proposal < wrong.proposal)
                            {
                                trace!(proposal = ?wrong.proposal, "keeping wrong quorum");
                                wrong_quorum = Some(wrong);
                            } else {
                                trace!(proposal = ?wrong.proposal, "skipping wrong quorum");
                            }
                            headcount.reach();
                        }
                        Err(GetError::Peer(error)) => {
                            trace!(peer = ?id, %error, "peer failed to answer read");
                            headcount.fail(error);
                        }
                    }
                    Flow::Continue
                },
            )
            .await;
        }

        if let Some(wrong) = legacy {
            debug!("peer rejected quorum without a proposal");
            return Err(ConsensusError::WrongQuorum(wrong));
        }
        headcount.check(quorum.len(), true)?;

        // A reconfiguration report at or above the best accepted value
        // supersedes it; a lower one is stale and ignored.
        if let Some(wrong) = wrong_quorum
            && wrong
                .proposal
                .as_ref()
                .is_some_and(|at| res.as_ref().is_none_or(|best| best.proposal <= *at))
        {
            debug!(proposal = ?wrong.proposal, "quorum view superseded");
            return Err(ConsensusError::WrongQuorum(wrong));
        }

        Ok(match res {
            Some(accepted) => State {
                value: Some(accepted.value),
                quorum,
                proposal: Some(accepted.proposal),
            },
            None => State {
                value: None,
                quorum,
                proposal: None,
            },
        })
    }

    /// The chosen value, if any.
    ///
    /// # Errors
    ///
    /// See [`state`](Self::state).
    pub async fn get(&self) -> Result<Option<P::Value>, PeerConsensusError<P>> {
        Ok(self.state().await?.value)
    }
}
