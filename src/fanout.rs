//! Cancellable parallel fan-out over peer calls.
//!
//! One future per peer runs concurrently inside the caller's task;
//! outcomes are handed to a single driver closure in completion order.
//! Because nothing leaves the task, the driver may freely mutate
//! caller-local aggregates between suspension points. Returning
//! [`Flow::Break`] drops the pending futures, cancelling the in-flight
//! calls while keeping every outcome already delivered.

use std::future::Future;

use futures::stream::{FuturesUnordered, StreamExt};

/// Driver verdict after each completed sub-task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flow {
    /// Keep collecting outcomes.
    Continue,
    /// Cancel the remaining sub-tasks and join immediately.
    Break,
}

/// Run every future in `calls` concurrently, feeding completed outcomes to
/// `each` until all are done or the driver breaks.
pub(crate) async fn fan_out<F, T>(
    calls: impl IntoIterator<Item = F>,
    mut each: impl FnMut(T) -> Flow,
) where
    F: Future<Output = T>,
{
    let mut pending: FuturesUnordered<F> = calls.into_iter().collect();
    while let Some(outcome) = pending.next().await {
        if matches!(each(outcome), Flow::Break) {
            break;
        }
    }
}
