//! The reusable buffer + metadata unit representing one message's lifecycle.

use std::collections::VecDeque;

use crate::{Rank, Tag};

/// Delivery state of a slot's most recent transfer.
///
/// Simulated transfers move `Unsent -> Pending -> Resolved`; live transfers
/// hold the transport's request id until the request completes, at which
/// point the slot collapses to `Resolved` as well.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handle {
    /// The slot has never carried a message, or was reset.
    Unsent,
    /// A simulated transfer was issued but not yet received.
    Pending,
    /// The transfer completed; the slot is logically empty and reusable.
    Resolved,
    /// An in-flight request id held by the live transport.
    Live(i32),
}

/// One in-flight or completed message transfer.
///
/// A slot owns its body bytes for as long as the transfer is unresolved; it
/// is reinitialized in place when a channel manager recycles it. A slot whose
/// `destination` is `None` has never carried a message: never sent, never
/// delivered.
#[derive(Debug)]
pub struct MessageSlot {
    body: Vec<u8>,
    destination: Option<Rank>,
    tag: Tag,
    handle: Handle,
    /// Synchronous sends issued while this holder was still unresolved, in
    /// submission order. Used only by the simulated transport, which has no
    /// concurrent deliverer to free the holder.
    overflow: VecDeque<MessageSlot>,
}

impl MessageSlot {
    /// A slot that has never carried a message.
    pub fn empty() -> Self {
        Self {
            body: Vec::new(),
            destination: None,
            tag: -1,
            handle: Handle::Unsent,
            overflow: VecDeque::new(),
        }
    }

    /// A freshly initialized slot carrying a copy of `body`.
    pub fn new(destination: Rank, tag: Tag, body: &[u8]) -> Self {
        let mut slot = Self::empty();
        slot.init(destination, tag, body);
        slot
    }

    /// Reinitialize the slot with a new payload. The previous transfer must
    /// be resolved, or explicitly queued by the caller, before this is
    /// called.
    pub fn init(&mut self, destination: Rank, tag: Tag, body: &[u8]) {
        self.body.clear();
        self.body.extend_from_slice(body);
        self.destination = Some(destination);
        self.tag = tag;
        self.handle = Handle::Unsent;
    }

    /// Reset to the never-sent state, dropping any queued overflow.
    pub fn clear(&mut self) {
        self.destination = None;
        self.handle = Handle::Unsent;
        self.overflow.clear();
    }

    /// Whether this slot has ever carried a message.
    pub fn is_sent(&self) -> bool {
        self.destination.is_some()
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn destination(&self) -> Option<Rank> {
        self.destination
    }

    pub fn tag(&self) -> Tag {
        self.tag
    }

    pub fn handle(&self) -> Handle {
        self.handle
    }

    pub fn set_handle(&mut self, handle: Handle) {
        self.handle = handle;
    }

    /// Mark the transfer delivered, making the slot eligible for reuse.
    pub fn mark_resolved(&mut self) {
        self.handle = Handle::Resolved;
    }

    /// Slot-matching predicate used by the simulated transport: a pending
    /// transfer addressed to `source` whose tag matches the request. A
    /// negative requested tag matches any tag.
    pub fn matches(&self, source: Rank, tag: Tag) -> bool {
        self.handle == Handle::Pending
            && self.destination == Some(source)
            && (tag < 0 || self.tag == tag)
    }

    /// Queue a payload behind this holder, preserving submission order, and
    /// return the queued slot.
    pub(crate) fn push_overflow(&mut self, slot: MessageSlot) -> &mut MessageSlot {
        self.overflow.push_back(slot);
        let last = self.overflow.len() - 1;
        &mut self.overflow[last]
    }

    /// Replace this delivered holder with the next queued synchronous
    /// message; the promoted message inherits the remainder of the queue.
    /// Returns false when nothing was queued.
    pub(crate) fn promote_overflow(&mut self) -> bool {
        match self.overflow.pop_front() {
            Some(mut next) => {
                std::mem::swap(&mut next.overflow, &mut self.overflow);
                *self = next;
                true
            }
            None => false,
        }
    }

    #[cfg(test)]
    pub(crate) fn overflow_len(&self) -> usize {
        self.overflow.len()
    }
}
