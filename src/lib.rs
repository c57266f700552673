//! Point-to-point message exchange between a fixed group of worker ranks.
//!
//! A [`Session`] gives each worker process three logical channels to every
//! other rank: best-effort asynchronous data messages held in a bounded,
//! recyclable slot queue, flow-controlled synchronous data messages with one
//! holder per destination, and a high-priority interrupt channel that is
//! always observed ahead of data. The underlying transport is encapsulated
//! by the [`transport::Transport`] trait, implemented by a live MPI-backed
//! variant (behind the `mpi` feature) and by a deterministic in-process
//! simulation used for testing, so the exchange machinery is written once
//! and is oblivious to which one is active.

mod channel;
mod coder;
mod error;
mod session;
mod slot;
pub mod transport;

pub use channel::SlotStore;
#[cfg(feature = "codec")]
pub use coder::JsonCoder;
pub use coder::{Coder, NullCoder};
pub use error::{ExchangeError, Result};
pub use session::{Mode, ProbeReport, Session, SessionConfig};
pub use slot::{Handle, MessageSlot};
pub use transport::{Delivery, Envelope};

/// Integer identity of a worker process within the fixed group. Negative
/// values denote the (unsupported) wildcard address.
pub type Rank = i32;

/// Integer message classifier used for matching sends to receives.
pub type Tag = i32;

/// Wildcard tag: matches any message tag in probe and receive requests.
pub const ANY_TAG: Tag = -1;
