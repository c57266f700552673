//! Channel managers: the slot collections backing the three logical
//! channels, and their staging and recycling disciplines.

use std::collections::VecDeque;

use tracing::trace;

use crate::error::{ExchangeError, Result};
use crate::slot::{Handle, MessageSlot};
use crate::transport::{Transport, Wait};
use crate::{Rank, Tag};

/// Process-local storage for every outgoing message of a session.
///
/// One interrupt slot and one synchronous slot per destination, plus the
/// bounded asynchronous queue. The queue keeps its newest entry at the front;
/// "oldest" in the scan descriptions below therefore means the back of the
/// deque.
pub struct SlotStore {
    interrupt: Vec<MessageSlot>,
    sync: Vec<MessageSlot>,
    async_queue: VecDeque<MessageSlot>,
    max_async_len: usize,
}

impl SlotStore {
    pub fn new(world_size: usize, max_async_len: usize) -> Self {
        Self {
            interrupt: (0..world_size).map(|_| MessageSlot::empty()).collect(),
            sync: (0..world_size).map(|_| MessageSlot::empty()).collect(),
            async_queue: VecDeque::new(),
            max_async_len,
        }
    }

    pub fn interrupt_slot(&self, rank: Rank) -> &MessageSlot {
        &self.interrupt[rank as usize]
    }

    pub fn interrupt_slot_mut(&mut self, rank: Rank) -> &mut MessageSlot {
        &mut self.interrupt[rank as usize]
    }

    pub fn sync_slot(&self, rank: Rank) -> &MessageSlot {
        &self.sync[rank as usize]
    }

    pub fn sync_slot_mut(&mut self, rank: Rank) -> &mut MessageSlot {
        &mut self.sync[rank as usize]
    }

    /// Number of entries currently held by the asynchronous queue.
    pub fn async_len(&self) -> usize {
        self.async_queue.len()
    }

    #[cfg(test)]
    pub(crate) fn async_slot_mut(&mut self, index: usize) -> &mut MessageSlot {
        &mut self.async_queue[index]
    }

    /// Stage an interrupt to `dest`. At most one interrupt per destination
    /// may be outstanding: staging over an unresolved one waits for it where
    /// the transport can wait, and is a protocol violation where it cannot.
    pub fn stage_interrupt(
        &mut self,
        transport: &mut dyn Transport,
        dest: Rank,
        tag: Tag,
        body: &[u8],
    ) -> Result<&mut MessageSlot> {
        let slot = &mut self.interrupt[dest as usize];
        if slot.is_sent() && !transport.is_resolved(slot)? {
            match transport.wait(slot)? {
                Wait::Resolved => {}
                Wait::NeverResolves => {
                    return Err(ExchangeError::protocol(format!(
                        "an interrupt to rank {} is already outstanding",
                        dest
                    )));
                }
            }
        }
        slot.init(dest, tag, body);
        Ok(slot)
    }

    /// Stage a synchronous message to `dest`. An unresolved holder is waited
    /// on where the transport can wait; otherwise the payload is queued
    /// behind the holder in submission order.
    pub fn stage_sync(
        &mut self,
        transport: &mut dyn Transport,
        dest: Rank,
        tag: Tag,
        body: &[u8],
    ) -> Result<&mut MessageSlot> {
        let slot = &mut self.sync[dest as usize];
        if slot.is_sent() && !transport.is_resolved(slot)? {
            match transport.wait(slot)? {
                Wait::Resolved => slot.init(dest, tag, body),
                Wait::NeverResolves => {
                    return Ok(slot.push_overflow(MessageSlot::new(dest, tag, body)));
                }
            }
        } else {
            slot.init(dest, tag, body);
        }
        Ok(slot)
    }

    /// Stage an asynchronous message, recycling queue space where possible.
    ///
    /// One compaction pass per send: walk the queue from the front (newest)
    /// to the back (oldest). Every delivered entry encountered is a recycling
    /// candidate; the last candidate found is reused in place and the other
    /// candidates are erased. With no candidate, a new slot is allocated at
    /// the front while the queue is below its bound; past the bound the send
    /// fails with `QueueExhausted`.
    pub fn stage_async(
        &mut self,
        transport: &mut dyn Transport,
        dest: Rank,
        tag: Tag,
        body: &[u8],
    ) -> Result<&mut MessageSlot> {
        let mut reuse: Option<usize> = None;
        let mut i = 0;
        while i < self.async_queue.len() {
            if transport.is_resolved(&mut self.async_queue[i])? {
                if let Some(prev) = reuse.take() {
                    trace!("dropping delivered asynchronous slot at index {}", prev);
                    self.async_queue.remove(prev);
                    i -= 1;
                }
                reuse = Some(i);
            }
            i += 1;
        }

        match reuse {
            Some(index) => {
                trace!("recycling asynchronous slot at index {}", index);
                let slot = &mut self.async_queue[index];
                slot.init(dest, tag, body);
                Ok(slot)
            }
            None => {
                if self.async_queue.len() + 1 > self.max_async_len {
                    return Err(ExchangeError::QueueExhausted {
                        capacity: self.max_async_len,
                    });
                }
                self.async_queue.push_front(MessageSlot::new(dest, tag, body));
                Ok(&mut self.async_queue[0])
            }
        }
    }

    /// First pending asynchronous entry matching `(source, tag)`, oldest
    /// first, as an `(address, tag)` pair.
    pub fn probe_async(&self, source: Rank, tag: Tag) -> Option<(Rank, Tag)> {
        for slot in self.async_queue.iter().rev() {
            if slot.matches(source, tag) {
                return slot.destination().map(|address| (address, slot.tag()));
            }
        }
        None
    }

    /// Find the asynchronous entry a receive resolves to.
    ///
    /// The queue is scanned oldest to newest, tracking the latest match. With
    /// a concrete requested tag, a newer match with the same tag supersedes
    /// the one found before it: the superseded entry is marked delivered
    /// without being returned, mirroring the live transport's drain-to-newest
    /// rule for backlogged same-tag streams. A newer match carrying a
    /// different tag ends the scan and the earlier find is delivered. With a
    /// wildcard tag no collapse occurs and the newest match wins.
    pub fn resolve_async(&mut self, source: Rank, tag: Tag) -> Option<&mut MessageSlot> {
        let mut found: Option<usize> = None;
        for i in (0..self.async_queue.len()).rev() {
            if !self.async_queue[i].matches(source, tag) {
                continue;
            }
            match found {
                None => found = Some(i),
                Some(prev) => {
                    if tag < 0 {
                        found = Some(i);
                    } else if self.async_queue[prev].tag() == self.async_queue[i].tag() {
                        self.async_queue[prev].mark_resolved();
                        found = Some(i);
                    } else {
                        break;
                    }
                }
            }
        }
        match found {
            Some(index) => Some(&mut self.async_queue[index]),
            None => None,
        }
    }

    /// Whether any channel holds a pending message.
    pub fn any_message_present(&self) -> bool {
        self.interrupt
            .iter()
            .chain(self.sync.iter())
            .chain(self.async_queue.iter())
            .any(|slot| slot.handle() == Handle::Pending)
    }

    /// Mark every slot never-sent and empty the asynchronous queue.
    pub fn reset(&mut self) {
        for slot in self.interrupt.iter_mut().chain(self.sync.iter_mut()) {
            slot.clear();
        }
        self.async_queue.clear();
    }
}
