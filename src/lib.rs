//! Single-decree Paxos proposer.
//!
//! This crate implements the client side of the Paxos consensus protocol:
//! the component a participant uses to drive one decided value through a
//! quorum of acceptors at a logical version.
//!
//! # Architecture
//!
//! - [`Proposer`] drives the prepare → accept → confirm phases, retrying
//!   internally with escalated proposals when it loses to a concurrent
//!   proposer.
//! - [`Peer`] is the capability each acceptor exposes; implementations own
//!   transport, serialization and timeouts.
//! - [`Proposer::state`] is the consistent read path, which also detects
//!   obsolete quorum membership and reports it as
//!   [`ConsensusError::WrongQuorum`].
//!
//! # Quick start
//!
//! ```ignore
//! use paxos_client::Proposer;
//!
//! let mut proposer = Proposer::new(my_id, peers);
//! match proposer.choose_at(1, value).await? {
//!     choice if choice.conflicted => { /* an earlier value won; adopt it */ }
//!     choice => { /* our value was chosen at choice.proposal */ }
//! }
//! let state = proposer.state().await?;
//! ```

#![warn(clippy::pedantic)]

pub mod config;
mod error;
mod fanout;
mod messages;
mod peer;
mod proposal;
mod proposer;
mod quorum;

pub use config::{BackoffConfig, ProposerConfig};
pub use error::{ConsensusError, GetError, PeerError, WeakError, WrongQuorum};
pub use messages::{Accepted, Choice, Response, State};
pub use peer::Peer;
pub use proposal::Proposal;
pub use proposer::Proposer;
pub use quorum::Quorum;
