//! Deterministic single-process transport used for exercising the exchange
//! machinery without a launched worker group.
//!
//! Nothing travels anywhere: a staged slot itself is the in-memory message,
//! observable through probe and receive. Handles are plain state flags, and
//! operations that would block on a second participant report that fact
//! instead of hanging.

use super::{Delivery, Envelope, Transport, Wait};
use crate::channel::SlotStore;
use crate::error::{ExchangeError, Result};
use crate::slot::{Handle, MessageSlot};
use crate::{Rank, Tag};

pub struct SimTransport {
    self_rank: Rank,
    world_size: i32,
    data_tag: Tag,
    interrupt_tag: Tag,
}

impl SimTransport {
    pub fn new(self_rank: Rank, world_size: i32, data_tag: Tag, interrupt_tag: Tag) -> Self {
        Self {
            self_rank,
            world_size,
            data_tag,
            interrupt_tag,
        }
    }
}

fn envelope_of(slot: &MessageSlot) -> Option<Envelope> {
    slot.destination().map(|source| Envelope {
        source,
        tag: slot.tag(),
    })
}

/// Mark the slot delivered and copy its payload out for the caller.
fn deliver(slot: &mut MessageSlot) -> Option<Delivery> {
    let source = slot.destination()?;
    slot.mark_resolved();
    Some(Delivery {
        body: slot.body().to_vec(),
        source,
        tag: slot.tag(),
    })
}

impl Transport for SimTransport {
    fn self_rank(&self) -> Rank {
        self.self_rank
    }

    fn world_size(&self) -> i32 {
        self.world_size
    }

    fn send(&mut self, _dest: Rank, _tag: Tag, _body: &[u8], _synchronous: bool) -> Result<Handle> {
        Ok(Handle::Pending)
    }

    fn is_resolved(&mut self, slot: &mut MessageSlot) -> Result<bool> {
        Ok(slot.is_sent() && slot.handle() == Handle::Resolved)
    }

    fn wait(&mut self, slot: &mut MessageSlot) -> Result<Wait> {
        if self.is_resolved(slot)? {
            Ok(Wait::Resolved)
        } else {
            Ok(Wait::NeverResolves)
        }
    }

    fn probe(&mut self, store: &SlotStore, source: Rank, tag: Tag) -> Result<Option<Envelope>> {
        if tag == self.interrupt_tag {
            let slot = store.interrupt_slot(source);
            if slot.matches(source, self.interrupt_tag) {
                return Ok(envelope_of(slot));
            }
            return Ok(None);
        }
        if tag == self.data_tag || tag < 0 {
            let slot = store.sync_slot(source);
            if slot.matches(source, self.data_tag) {
                return Ok(envelope_of(slot));
            }
        }
        Ok(store
            .probe_async(source, tag)
            .map(|(source, tag)| Envelope { source, tag }))
    }

    fn receive(
        &mut self,
        store: &mut SlotStore,
        source: Rank,
        tag: Tag,
        synchronous: bool,
    ) -> Result<Option<Delivery>> {
        if store.interrupt_slot(source).matches(source, tag) {
            return Ok(deliver(store.interrupt_slot_mut(source)));
        }
        if synchronous && !store.any_message_present() {
            return Err(ExchangeError::protocol(
                "a synchronous receive cannot block in simulated mode: nothing is pending",
            ));
        }
        if store.sync_slot(source).matches(source, tag) {
            let slot = store.sync_slot_mut(source);
            let delivery = deliver(slot);
            if delivery.is_some() {
                slot.promote_overflow();
            }
            return Ok(delivery);
        }
        if let Some(slot) = store.resolve_async(source, tag) {
            return Ok(deliver(slot));
        }
        Ok(None)
    }

    fn clear_all(&mut self, store: &mut SlotStore) -> Result<()> {
        store.reset();
        Ok(())
    }

    fn barrier(&mut self) -> Result<()> {
        // only one participant exists
        Ok(())
    }

    fn finalize(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wait_reports_never_resolves_for_pending_transfers() {
        let mut transport = SimTransport::new(0, 2, 5, 100);
        let mut slot = MessageSlot::new(1, 7, b"x");
        slot.set_handle(Handle::Pending);
        assert_eq!(transport.wait(&mut slot).unwrap(), Wait::NeverResolves);

        slot.mark_resolved();
        assert_eq!(transport.wait(&mut slot).unwrap(), Wait::Resolved);
    }

    #[test]
    fn never_sent_slots_are_never_resolved() {
        let mut transport = SimTransport::new(0, 2, 5, 100);
        let mut slot = MessageSlot::empty();
        slot.set_handle(Handle::Resolved);
        assert!(!transport.is_resolved(&mut slot).unwrap());
    }

    #[test]
    fn synchronous_receive_with_nothing_pending_fails_loudly() {
        let mut transport = SimTransport::new(0, 2, 5, 100);
        let mut store = SlotStore::new(2, 4);
        let err = transport.receive(&mut store, 1, -1, true).unwrap_err();
        assert!(matches!(err, ExchangeError::Protocol { .. }));
    }
}
