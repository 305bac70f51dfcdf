//! Leader Election
//!
//! Implements the Bully election cascade over a [`NodeStore`].
//!
//! Each node moves `Idle -> Candidate -> {Leader | Deferring} -> Idle`.
//! A candidate sends ELECTION to every higher active node in ascending
//! order; each of those answers OK and immediately runs its own election
//! before the candidate moves on, so the cascade always ends with the
//! highest active id promoted. The cascade is driven by an explicit stack
//! of frames rather than recursion, and a node joins it at most once per
//! call, which bounds one call to N `Started` events.

use std::vec;

use crate::error::Result;
use crate::events::{ElectionEvent, EventSink};
use crate::state::{NodeId, NodeRole, NodeStore};

/// A candidate and the higher nodes it has not yet contacted
struct Frame {
    candidate: NodeId,
    higher: vec::IntoIter<NodeId>,
}

/// Bookkeeping for one call to [`start_election`]
#[derive(Default)]
struct Cascade {
    stack: Vec<Frame>,
    candidates: Vec<NodeId>,
    winner: Option<NodeId>,
}

impl Cascade {
    /// Make `candidate` a candidate and either promote it or push its frame
    fn enter(&mut self, store: &mut NodeStore, sink: &dyn EventSink, candidate: NodeId) -> Result<()> {
        store.set_election_in_progress(candidate, true)?;
        self.candidates.push(candidate);
        sink.on_event(&ElectionEvent::Started { initiator: candidate });

        let higher: Vec<NodeId> = store
            .active_nodes()
            .into_iter()
            .filter(|id| *id > candidate)
            .collect();

        if higher.is_empty() {
            promote(store, sink, candidate)?;
            self.winner = Some(candidate);
        } else {
            tracing::debug!("P{} defers to {} higher node(s)", candidate, higher.len());
            self.stack.push(Frame {
                candidate,
                higher: higher.into_iter(),
            });
        }
        Ok(())
    }
}

/// Run an election initiated by `initiator`
///
/// Returns the elected node, or `None` when the call is a no-op because
/// the initiator has failed or is already a candidate.
pub fn start_election(
    store: &mut NodeStore,
    sink: &dyn EventSink,
    initiator: NodeId,
) -> Result<Option<NodeId>> {
    let node = store.get(initiator)?;
    if !node.is_active() || node.election_in_progress {
        return Ok(None);
    }

    let mut cascade = Cascade::default();
    cascade.enter(store, sink, initiator)?;

    while let Some(frame) = cascade.stack.last_mut() {
        let candidate = frame.candidate;
        let Some(h) = frame.higher.next() else {
            cascade.stack.pop();
            continue;
        };

        sink.on_event(&ElectionEvent::election(candidate, h));
        sink.on_event(&ElectionEvent::ok(h, candidate));

        // Already a candidate in this cascade
        if store.get(h)?.election_in_progress {
            continue;
        }
        cascade.enter(store, sink, h)?;
    }

    for id in cascade.candidates {
        store.set_election_in_progress(id, false)?;
    }

    Ok(cascade.winner)
}

/// Make `id` the leader and point every active node at it
pub fn promote(store: &mut NodeStore, sink: &dyn EventSink, id: NodeId) -> Result<()> {
    // Validate before touching any other record
    store.get(id)?;

    let previous = store.leader().filter(|p| *p != id);
    let demoted: Vec<NodeId> = store
        .all()
        .filter(|n| n.is_leader() && n.id != id)
        .map(|n| n.id)
        .collect();
    for old in demoted {
        store.set_role(old, NodeRole::Follower)?;
    }

    store.set_role(id, NodeRole::Leader)?;
    for follower in store.active_nodes() {
        store.set_coordinator(follower, Some(id))?;
    }

    tracing::info!("P{} won the election", id);
    sink.on_event(&ElectionEvent::Elected { leader: id, previous });

    Ok(())
}
