//! The exchange engine: session lifecycle and the send/receive/probe
//! orchestration, written once against the transport interface.

use tracing::{debug, warn};

use crate::channel::SlotStore;
use crate::error::{ExchangeError, Result};
#[cfg(feature = "mpi")]
use crate::transport::LiveTransport;
use crate::transport::{Delivery, Envelope, SimTransport, Transport};
use crate::{Rank, Tag};

/// Which transport backs the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Delegate to the external transport runtime.
    Live,
    /// Deterministic in-process simulation with a caller-supplied identity.
    Simulated { self_rank: Rank, world_size: i32 },
}

/// Session configuration. Tags are caller-assigned and must be distinct,
/// non-negative integers; the queue capacity bounds the number of
/// concurrently unresolved asynchronous messages.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub mode: Mode,
    pub data_tag: Tag,
    pub interrupt_tag: Tag,
    pub async_queue_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            mode: Mode::Live,
            data_tag: 5,
            interrupt_tag: 100,
            async_queue_capacity: 10,
        }
    }
}

fn validate(config: &SessionConfig) -> Result<()> {
    if config.data_tag < 0 || config.interrupt_tag < 0 {
        return Err(ExchangeError::protocol("message tags must be non-negative"));
    }
    if config.data_tag == config.interrupt_tag {
        return Err(ExchangeError::protocol(
            "the data and interrupt tags must be distinct",
        ));
    }
    if config.async_queue_capacity == 0 {
        return Err(ExchangeError::protocol(
            "the asynchronous queue capacity must be positive",
        ));
    }
    if let Mode::Simulated {
        self_rank,
        world_size,
    } = config.mode
    {
        if world_size < 1 || self_rank < 0 || self_rank >= world_size {
            return Err(ExchangeError::protocol(
                "the simulated rank must lie within the worker group",
            ));
        }
    }
    Ok(())
}

/// Report of a probe pass: parallel source and tag sequences in per-source
/// scan order, empty when nothing matched.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ProbeReport {
    pub sources: Vec<Rank>,
    pub tags: Vec<Tag>,
}

impl ProbeReport {
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    fn push(&mut self, envelope: Envelope) {
        self.sources.push(envelope.source);
        self.tags.push(envelope.tag);
    }
}

/// A communication session for one worker process.
///
/// Owns the slot store and the transport for the lifetime of the process;
/// dropping the session finalizes the transport. All operations are driven
/// by a single caller thread.
pub struct Session {
    store: SlotStore,
    transport: Box<dyn Transport>,
    data_tag: Tag,
    interrupt_tag: Tag,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("data_tag", &self.data_tag)
            .field("interrupt_tag", &self.interrupt_tag)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Start a session: bring the transport up, discover this worker's
    /// identity and size the per-destination slot arrays.
    pub fn initialize(config: SessionConfig) -> Result<Session> {
        validate(&config)?;
        let transport: Box<dyn Transport> = match config.mode {
            Mode::Simulated {
                self_rank,
                world_size,
            } => Box::new(SimTransport::new(
                self_rank,
                world_size,
                config.data_tag,
                config.interrupt_tag,
            )),
            #[cfg(feature = "mpi")]
            Mode::Live => Box::new(LiveTransport::initialize()?),
            #[cfg(not(feature = "mpi"))]
            Mode::Live => {
                return Err(ExchangeError::TransportInit {
                    reason: "this build does not include the live transport \
                             (enable the `mpi` feature)"
                        .into(),
                });
            }
        };
        let store = SlotStore::new(transport.world_size() as usize, config.async_queue_capacity);
        debug!(
            "session initialized: rank {} of {}",
            transport.self_rank(),
            transport.world_size()
        );
        Ok(Session {
            store,
            transport,
            data_tag: config.data_tag,
            interrupt_tag: config.interrupt_tag,
        })
    }

    /// Identity of this worker within the group.
    pub fn self_rank(&self) -> Rank {
        self.transport.self_rank()
    }

    /// Fixed number of workers in the group.
    pub fn world_size(&self) -> i32 {
        self.transport.world_size()
    }

    fn check_rank(&self, rank: Rank, op: &'static str) -> Result<()> {
        if rank < 0 {
            Err(ExchangeError::protocol(format!(
                "{} addressed to a wildcard rank is not supported",
                op
            )))
        } else if rank >= self.transport.world_size() {
            Err(ExchangeError::protocol(format!(
                "{} addressed to rank {} outside the worker group",
                op, rank
            )))
        } else {
            Ok(())
        }
    }

    /// Send `body` to `dest`. The interrupt tag routes to the interrupt
    /// channel; any other tag routes per the `synchronous` flag. The payload
    /// is copied into the owning slot before the transport is driven, so the
    /// caller's buffer carries no further lifetime obligation.
    pub fn send(&mut self, dest: Rank, tag: Tag, synchronous: bool, body: &[u8]) -> Result<()> {
        self.check_rank(dest, "send")?;
        if tag < 0 {
            return Err(ExchangeError::protocol(
                "messages must carry a non-negative tag",
            ));
        }
        let interrupt = tag == self.interrupt_tag;
        let Session {
            store, transport, ..
        } = self;
        let transport = transport.as_mut();
        let slot = if interrupt {
            debug!("sending interrupt to rank {} ({} bytes)", dest, body.len());
            store.stage_interrupt(transport, dest, tag, body)?
        } else if synchronous {
            debug!(
                "sending synchronous message to rank {}, tag {} ({} bytes)",
                dest,
                tag,
                body.len()
            );
            store.stage_sync(transport, dest, tag, body)?
        } else {
            debug!(
                "sending asynchronous message to rank {}, tag {} ({} bytes)",
                dest,
                tag,
                body.len()
            );
            store.stage_async(transport, dest, tag, body)?
        };
        // data channels use the rendezvous send, interrupts the eager one
        let handle = transport.send(dest, tag, slot.body(), !interrupt)?;
        slot.set_handle(handle);
        Ok(())
    }

    /// Non-blocking check for pending messages from each of `sources` under
    /// any of `tags`. The interrupt channel is consulted first for every
    /// source and, when an interrupt is pending, wins outright; otherwise
    /// the requested tags are tried in order and the first match reported.
    pub fn probe(
        &mut self,
        sources: &[Rank],
        tags: &[Tag],
        interrupt_only: bool,
    ) -> Result<ProbeReport> {
        for &source in sources {
            self.check_rank(source, "probe")?;
        }
        let interrupt_tag = self.interrupt_tag;
        let Session {
            store, transport, ..
        } = self;
        let transport = transport.as_mut();
        let mut report = ProbeReport::default();
        for &source in sources {
            let interrupt = transport.probe(store, source, interrupt_tag)?;
            let interrupt_present = interrupt.is_some();
            if let Some(envelope) = interrupt {
                report.push(envelope);
            }
            if interrupt_present || interrupt_only {
                continue;
            }
            for &tag in tags {
                if tag == interrupt_tag {
                    continue; // already checked
                }
                if let Some(envelope) = transport.probe(store, source, tag)? {
                    report.push(envelope);
                    break;
                }
            }
        }
        Ok(report)
    }

    /// Receive one message from `source`. A negative `tag` accepts any tag.
    /// A pending interrupt from `source` is always received first, whatever
    /// tag was requested. With `synchronous` set the call blocks until a
    /// message arrives (where the transport can block); otherwise an absent
    /// message yields an explicit empty result.
    pub fn receive(
        &mut self,
        source: Rank,
        tag: Tag,
        synchronous: bool,
    ) -> Result<Option<Delivery>> {
        self.check_rank(source, "receive")?;
        if tag == self.data_tag {
            return Err(ExchangeError::protocol(
                "bulk transfers on the reserved data tag are not implemented",
            ));
        }
        let interrupt_tag = self.interrupt_tag;
        let Session {
            store, transport, ..
        } = self;
        let transport = transport.as_mut();
        let mut tag = tag;
        if tag != interrupt_tag && transport.probe(store, source, interrupt_tag)?.is_some() {
            debug!(
                "interrupt from rank {} preempts receive of tag {}",
                source, tag
            );
            tag = interrupt_tag;
        }
        let delivery = transport.receive(store, source, tag, synchronous)?;
        if let Some(delivery) = &delivery {
            debug!(
                "received {} bytes from rank {}, tag {}",
                delivery.body.len(),
                delivery.source,
                delivery.tag
            );
        }
        Ok(delivery)
    }

    /// Discard all pending message state addressed to this worker.
    pub fn clear_all(&mut self) -> Result<()> {
        debug!("discarding all pending messages");
        let Session {
            store, transport, ..
        } = self;
        transport.clear_all(store)
    }

    /// Block until every worker in the group reaches the barrier.
    pub fn barrier(&mut self) -> Result<()> {
        self.transport.barrier()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        debug!("closing session for rank {}", self.transport.self_rank());
        if let Err(err) = self.transport.finalize() {
            warn!("transport finalization failed: {}", err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ANY_TAG;

    const DATA: Tag = 5;
    const INTERRUPT: Tag = 100;

    fn sim_session(capacity: usize) -> Session {
        Session::initialize(SessionConfig {
            mode: Mode::Simulated {
                self_rank: 0,
                world_size: 4,
            },
            data_tag: DATA,
            interrupt_tag: INTERRUPT,
            async_queue_capacity: capacity,
        })
        .unwrap()
    }

    fn body(delivery: Option<Delivery>) -> Vec<u8> {
        delivery.expect("expected a delivered message").body
    }

    #[test]
    fn reports_identity_and_passes_the_barrier() {
        let mut session = sim_session(4);
        assert_eq!(session.self_rank(), 0);
        assert_eq!(session.world_size(), 4);
        session.barrier().unwrap();
    }

    #[test]
    fn rejects_invalid_configuration() {
        let mut config = SessionConfig {
            mode: Mode::Simulated {
                self_rank: 0,
                world_size: 2,
            },
            ..SessionConfig::default()
        };
        config.interrupt_tag = config.data_tag;
        assert!(Session::initialize(config.clone()).is_err());

        config.interrupt_tag = 100;
        config.async_queue_capacity = 0;
        assert!(Session::initialize(config.clone()).is_err());

        config.async_queue_capacity = 4;
        config.data_tag = -2;
        assert!(Session::initialize(config.clone()).is_err());

        config.data_tag = 5;
        config.mode = Mode::Simulated {
            self_rank: 2,
            world_size: 2,
        };
        assert!(Session::initialize(config).is_err());
    }

    #[cfg(not(feature = "mpi"))]
    #[test]
    fn live_mode_requires_the_mpi_feature() {
        let err = Session::initialize(SessionConfig::default()).unwrap_err();
        assert!(matches!(err, ExchangeError::TransportInit { .. }));
    }

    #[test]
    fn asynchronous_sends_are_retrievable_by_destination_and_tag() {
        let mut session = sim_session(4);
        session.send(1, 7, false, b"a").unwrap();
        session.send(2, 7, false, b"b").unwrap();
        session.send(1, 8, false, b"c").unwrap();

        assert_eq!(body(session.receive(2, 7, false).unwrap()), b"b");
        assert_eq!(body(session.receive(1, 8, false).unwrap()), b"c");
        assert_eq!(body(session.receive(1, 7, false).unwrap()), b"a");
    }

    #[test]
    fn queue_exhaustion_is_reported_and_recoverable() {
        let mut session = sim_session(2);
        session.send(1, 7, false, b"a").unwrap();
        session.send(1, 7, false, b"b").unwrap();

        let err = session.send(1, 7, false, b"c").unwrap_err();
        assert!(matches!(err, ExchangeError::QueueExhausted { capacity: 2 }));

        // deliver the oldest entry; the next send recycles its slot
        session.store.async_slot_mut(1).mark_resolved();
        session.send(1, 9, false, b"c").unwrap();
        assert_eq!(session.store.async_len(), 2);
    }

    #[test]
    fn recycled_slots_keep_the_scenario_payloads_straight() {
        let mut session = sim_session(2);
        session.send(0, 7, false, b"A").unwrap();
        session.send(0, 7, false, b"B").unwrap();

        // first send delivered; "C" must reuse its slot in place
        session.store.async_slot_mut(1).mark_resolved();
        session.send(0, 9, false, b"C").unwrap();
        assert_eq!(session.store.async_len(), 2);

        assert_eq!(body(session.receive(0, 7, false).unwrap()), b"B");
        assert_eq!(body(session.receive(0, 9, false).unwrap()), b"C");
    }

    #[test]
    fn synchronous_stream_is_fifo_per_destination() {
        let mut session = sim_session(4);
        session.send(1, DATA, true, b"one").unwrap();
        session.send(1, DATA, true, b"two").unwrap();
        session.send(1, DATA, true, b"three").unwrap();

        assert_eq!(body(session.receive(1, -1, false).unwrap()), b"one");
        assert_eq!(body(session.receive(1, -1, false).unwrap()), b"two");
        assert_eq!(body(session.receive(1, -1, false).unwrap()), b"three");
        assert!(session.receive(1, -1, false).unwrap().is_none());
    }

    #[test]
    fn interleaved_synchronous_traffic_stays_in_order() {
        let mut session = sim_session(4);
        session.send(1, DATA, true, b"one").unwrap();
        session.send(1, DATA, true, b"two").unwrap();
        assert_eq!(body(session.receive(1, ANY_TAG, false).unwrap()), b"one");

        session.send(1, DATA, true, b"three").unwrap();
        assert_eq!(body(session.receive(1, ANY_TAG, false).unwrap()), b"two");
        assert_eq!(body(session.receive(1, ANY_TAG, false).unwrap()), b"three");
        assert!(session.receive(1, ANY_TAG, false).unwrap().is_none());
    }

    #[test]
    fn synchronous_sends_with_a_custom_tag_match_that_tag() {
        let mut session = sim_session(4);
        session.send(2, 42, true, b"custom").unwrap();
        let delivery = session.receive(2, 42, false).unwrap().unwrap();
        assert_eq!(delivery.body, b"custom");
        assert_eq!(delivery.source, 2);
        assert_eq!(delivery.tag, 42);
    }

    #[test]
    fn duplicate_outstanding_interrupt_is_a_protocol_violation() {
        let mut session = sim_session(4);
        session.send(1, INTERRUPT, false, b"stop").unwrap();
        let err = session.send(1, INTERRUPT, false, b"again").unwrap_err();
        assert!(matches!(err, ExchangeError::Protocol { .. }));
    }

    #[test]
    fn interrupts_can_be_resent_once_delivered() {
        let mut session = sim_session(4);
        session.send(1, INTERRUPT, false, b"first").unwrap();
        assert_eq!(body(session.receive(1, INTERRUPT, false).unwrap()), b"first");
        session.send(1, INTERRUPT, false, b"second").unwrap();
    }

    #[test]
    fn probe_reports_only_the_interrupt_when_both_are_pending() {
        let mut session = sim_session(4);
        session.send(1, 7, false, b"data").unwrap();
        session.send(1, INTERRUPT, false, b"stop").unwrap();

        let report = session.probe(&[1], &[7], false).unwrap();
        assert_eq!(report.sources, vec![1]);
        assert_eq!(report.tags, vec![INTERRUPT]);
    }

    #[test]
    fn probe_scans_each_requested_source_independently() {
        let mut session = sim_session(4);
        session.send(1, 7, false, b"a").unwrap();
        session.send(2, 9, false, b"b").unwrap();

        let report = session.probe(&[1, 2, 3], &[7, 9], false).unwrap();
        assert_eq!(report.sources, vec![1, 2]);
        assert_eq!(report.tags, vec![7, 9]);
    }

    #[test]
    fn interrupt_only_probe_ignores_data_messages() {
        let mut session = sim_session(4);
        session.send(1, 7, false, b"data").unwrap();
        let report = session.probe(&[1], &[7], true).unwrap();
        assert!(report.is_empty());
    }

    #[test]
    fn probe_sees_synchronous_messages_on_the_data_tag() {
        let mut session = sim_session(4);
        session.send(1, DATA, true, b"sync").unwrap();
        let report = session.probe(&[1], &[DATA], false).unwrap();
        assert_eq!(report.sources, vec![1]);
        assert_eq!(report.tags, vec![DATA]);
    }

    #[test]
    fn a_pending_interrupt_preempts_the_requested_tag() {
        let mut session = sim_session(4);
        session.send(1, 7, false, b"data").unwrap();
        session.send(1, INTERRUPT, false, b"stop").unwrap();

        let delivery = session.receive(1, 7, false).unwrap().unwrap();
        assert_eq!(delivery.body, b"stop");
        assert_eq!(delivery.tag, INTERRUPT);

        // the data message is still there afterwards
        assert_eq!(body(session.receive(1, 7, false).unwrap()), b"data");
    }

    #[test]
    fn empty_receive_is_a_result_not_an_error() {
        let mut session = sim_session(4);
        assert!(session.receive(1, -1, false).unwrap().is_none());
    }

    #[test]
    fn newest_same_tag_entry_wins_and_older_ones_are_discarded() {
        let mut session = sim_session(4);
        session.send(1, 7, false, b"one").unwrap();
        session.send(1, 7, false, b"two").unwrap();
        session.send(1, 7, false, b"three").unwrap();

        assert_eq!(body(session.receive(1, 7, false).unwrap()), b"three");
        assert!(session.receive(1, 7, false).unwrap().is_none());
    }

    #[test]
    fn wildcard_tag_receive_returns_the_newest_without_discarding() {
        let mut session = sim_session(4);
        session.send(1, 7, false, b"seven").unwrap();
        session.send(1, 9, false, b"nine").unwrap();

        assert_eq!(body(session.receive(1, ANY_TAG, false).unwrap()), b"nine");
        assert_eq!(body(session.receive(1, ANY_TAG, false).unwrap()), b"seven");
    }

    #[test]
    fn wildcard_and_out_of_range_ranks_are_rejected() {
        let mut session = sim_session(4);
        assert!(session.send(-1, 7, false, b"x").is_err());
        assert!(session.receive(-1, 7, false).is_err());
        assert!(session.probe(&[-1], &[7], false).is_err());
        assert!(session.receive(7, 7, false).is_err());
    }

    #[test]
    fn receiving_on_the_reserved_data_tag_is_rejected() {
        let mut session = sim_session(4);
        let err = session.receive(1, DATA, false).unwrap_err();
        assert!(matches!(err, ExchangeError::Protocol { .. }));
    }

    #[test]
    fn synchronous_receive_with_nothing_pending_fails_in_simulation() {
        let mut session = sim_session(4);
        let err = session.receive(1, -1, true).unwrap_err();
        assert!(matches!(err, ExchangeError::Protocol { .. }));
    }

    #[test]
    fn clear_all_leaves_every_channel_empty() {
        let mut session = sim_session(4);
        session.send(1, 7, false, b"a").unwrap();
        session.send(2, DATA, true, b"b").unwrap();
        session.send(3, INTERRUPT, false, b"c").unwrap();

        session.clear_all().unwrap();
        for source in 0..4 {
            let report = session.probe(&[source], &[-1], false).unwrap();
            assert!(report.is_empty());
            assert!(session.receive(source, -1, false).unwrap().is_none());
        }
    }
}
