//! Live transport backed by the system MPI library through the C shim.

use super::{ffi, Delivery, Envelope, Transport, Wait};
use crate::channel::SlotStore;
use crate::error::{ExchangeError, Result};
use crate::slot::{Handle, MessageSlot};
use crate::{Rank, Tag};

pub struct LiveTransport {
    self_rank: Rank,
    world_size: i32,
}

fn check(op: &'static str, code: i32) -> Result<()> {
    if code == 0 {
        Ok(())
    } else {
        Err(ExchangeError::Transport { op, code })
    }
}

impl LiveTransport {
    /// Start the external transport and discover this worker's identity.
    pub fn initialize() -> Result<Self> {
        let mut rank = -1;
        let mut size = 0;
        let code = unsafe { ffi::xb_init(&mut rank, &mut size) };
        if code != 0 {
            return Err(ExchangeError::TransportInit {
                reason: format!("external transport returned status {}", code),
            });
        }
        Ok(Self {
            self_rank: rank,
            world_size: size,
        })
    }

    fn iprobe(&self, source: Rank, tag: Tag) -> Result<Option<ffi::Status>> {
        let mut flag = 0;
        let mut status = ffi::Status::empty();
        check("probe", unsafe {
            ffi::xb_iprobe(source, tag, &mut flag, &mut status)
        })?;
        Ok(if flag != 0 { Some(status) } else { None })
    }

    fn recv(&self, count: i32, source: Rank, tag: Tag) -> Result<Vec<u8>> {
        let mut body = vec![0u8; count as usize];
        check("receive", unsafe {
            ffi::xb_recv(body.as_mut_ptr(), count, source, tag)
        })?;
        Ok(body)
    }
}

impl Transport for LiveTransport {
    fn self_rank(&self) -> Rank {
        self.self_rank
    }

    fn world_size(&self) -> i32 {
        self.world_size
    }

    fn send(&mut self, dest: Rank, tag: Tag, body: &[u8], synchronous: bool) -> Result<Handle> {
        let mut request = -1;
        // The slot keeps `body` alive and in place until the request
        // resolves; the transport reads from it after this call returns.
        check("send", unsafe {
            ffi::xb_isend(
                body.as_ptr(),
                body.len() as i32,
                dest,
                tag,
                synchronous as i32,
                &mut request,
            )
        })?;
        Ok(Handle::Live(request))
    }

    fn is_resolved(&mut self, slot: &mut MessageSlot) -> Result<bool> {
        match slot.handle() {
            Handle::Live(request) => {
                let mut done = 0;
                check("test", unsafe { ffi::xb_test(request, &mut done) })?;
                if done != 0 {
                    slot.set_handle(Handle::Resolved);
                }
                Ok(done != 0)
            }
            Handle::Resolved => Ok(slot.is_sent()),
            // never sent, never delivered
            _ => Ok(false),
        }
    }

    fn wait(&mut self, slot: &mut MessageSlot) -> Result<Wait> {
        if let Handle::Live(request) = slot.handle() {
            check("wait", unsafe { ffi::xb_wait(request) })?;
            slot.set_handle(Handle::Resolved);
        }
        Ok(Wait::Resolved)
    }

    fn probe(&mut self, _store: &SlotStore, source: Rank, tag: Tag) -> Result<Option<Envelope>> {
        Ok(self.iprobe(source, tag)?.map(|status| Envelope {
            source: status.source,
            tag: status.tag,
        }))
    }

    fn receive(
        &mut self,
        _store: &mut SlotStore,
        source: Rank,
        tag: Tag,
        synchronous: bool,
    ) -> Result<Option<Delivery>> {
        let status = if synchronous {
            let mut status = ffi::Status::empty();
            check("probe", unsafe { ffi::xb_probe(source, tag, &mut status) })?;
            status
        } else {
            match self.iprobe(source, tag)? {
                Some(status) => status,
                None => return Ok(None),
            }
        };

        let (source_found, tag_found) = (status.source, status.tag);
        let mut body = self.recv(status.count, source_found, tag_found)?;
        if !synchronous && tag >= 0 {
            // Later messages with the same tag supersede the one just read:
            // drain the backlog and hand the caller the newest.
            while let Some(next) = self.iprobe(source, tag)? {
                if next.tag != tag_found {
                    break;
                }
                body = self.recv(next.count, source, tag)?;
            }
        }
        Ok(Some(Delivery {
            body,
            source: source_found,
            tag: tag_found,
        }))
    }

    fn clear_all(&mut self, _store: &mut SlotStore) -> Result<()> {
        // Receive and discard everything currently probeable for this
        // worker, across all sources and tags, until nothing remains.
        while let Some(status) = self.iprobe(-1, -1)? {
            self.recv(status.count, status.source, status.tag)?;
        }
        Ok(())
    }

    fn barrier(&mut self) -> Result<()> {
        check("barrier", unsafe { ffi::xb_barrier() })
    }

    fn finalize(&mut self) -> Result<()> {
        check("finalize", unsafe { ffi::xb_finalize() })
    }
}
