//! The transport boundary.
//!
//! This module exports the point-to-point primitives the exchange engine is
//! written against, encapsulated by the [`Transport`] trait. The trait is
//! implemented twice: [`LiveTransport`] delegates to the external MPI-style
//! library through a C shim (behind the `mpi` feature), and [`SimTransport`]
//! reproduces the same interface deterministically inside a single process
//! for testing. Methods that resolve message state take the slot store so
//! the simulated variant can answer from memory; the live variant ignores
//! it and asks the wire.

#[cfg(feature = "mpi")]
pub(crate) mod ffi;
#[cfg(feature = "mpi")]
mod live;
mod sim;

#[cfg(feature = "mpi")]
pub use live::LiveTransport;
pub use sim::SimTransport;

use crate::channel::SlotStore;
use crate::error::Result;
use crate::slot::{Handle, MessageSlot};
use crate::{Rank, Tag};

/// A message reported by a probe: who sent it, and under which tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Envelope {
    pub source: Rank,
    pub tag: Tag,
}

/// A received message body together with its resolved origin, which may
/// differ from the request when wildcards or interrupt preemption were
/// involved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub body: Vec<u8>,
    pub source: Rank,
    pub tag: Tag,
}

/// Outcome of waiting on an unresolved transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wait {
    /// The transfer completed and the slot may be reused.
    Resolved,
    /// The transfer can never complete because no second participant exists
    /// to receive it. The caller decides whether that is a protocol
    /// violation or a queueing opportunity.
    NeverResolves,
}

/// Point-to-point primitives addressed by (rank, tag).
pub trait Transport {
    /// Identity of the local worker within the group.
    fn self_rank(&self) -> Rank;

    /// Fixed number of workers in the group.
    fn world_size(&self) -> i32;

    /// Issue a non-blocking send and hand back its delivery handle. The
    /// `synchronous` flag selects rendezvous completion: the handle then
    /// resolves only once a matching receive is posted.
    fn send(&mut self, dest: Rank, tag: Tag, body: &[u8], synchronous: bool) -> Result<Handle>;

    /// Whether the slot's transfer has completed. A slot that never carried
    /// a message was never delivered.
    fn is_resolved(&mut self, slot: &mut MessageSlot) -> Result<bool>;

    /// Block until the slot's transfer completes, where blocking can make
    /// progress.
    fn wait(&mut self, slot: &mut MessageSlot) -> Result<Wait>;

    /// Non-blocking check for a pending message from `source` under `tag`
    /// (negative: any tag), without consuming it.
    fn probe(&mut self, store: &SlotStore, source: Rank, tag: Tag) -> Result<Option<Envelope>>;

    /// Receive a message from `source` under `tag` (negative: any tag).
    /// A synchronous receive blocks until a message arrives, where blocking
    /// can make progress; otherwise an absent message yields `None`.
    fn receive(
        &mut self,
        store: &mut SlotStore,
        source: Rank,
        tag: Tag,
        synchronous: bool,
    ) -> Result<Option<Delivery>>;

    /// Discard all pending message state addressed to this worker.
    fn clear_all(&mut self, store: &mut SlotStore) -> Result<()>;

    /// Block until every worker in the group reaches the barrier.
    fn barrier(&mut self) -> Result<()>;

    /// Shut the transport down. Called exactly once, at session teardown.
    fn finalize(&mut self) -> Result<()>;
}
