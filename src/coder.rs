//! The byte-codec seam between structured host values and the flat payloads
//! the exchange engine transfers. The engine itself treats message bodies as
//! opaque bytes; a `Coder` sits at the boundary where hosts hand values in.

use crate::error::{ExchangeError, Result};

/// An object that can encode a particular type to, and decode it from, a
/// byte payload, reporting the exact encoded size up front. The
/// implementation can be based on a `serde` data format, or anything else.
pub trait Coder {
    type Type;

    /// Exact number of bytes `encode` will produce for this value.
    fn size_of(&self, value: &Self::Type) -> Result<usize>;

    /// Convert a value into its byte payload.
    fn encode(&self, value: &Self::Type) -> Result<Vec<u8>>;

    /// Reconstruct a value from a received payload.
    fn decode(&self, data: &[u8]) -> Result<Self::Type>;
}

/// Shim implementation of `Coder` for sessions that move raw bytes only.
/// Every operation reports a codec error.
pub struct NullCoder<T> {
    phantom: std::marker::PhantomData<T>,
}

impl<T> NullCoder<T> {
    pub fn new() -> Self {
        Self {
            phantom: std::marker::PhantomData,
        }
    }
}

impl<T> Default for NullCoder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Coder for NullCoder<T> {
    type Type = T;

    fn size_of(&self, _: &Self::Type) -> Result<usize> {
        Err(ExchangeError::Codec {
            reason: "no codec configured for this session".into(),
        })
    }

    fn encode(&self, _: &Self::Type) -> Result<Vec<u8>> {
        Err(ExchangeError::Codec {
            reason: "no codec configured for this session".into(),
        })
    }

    fn decode(&self, _: &[u8]) -> Result<Self::Type> {
        Err(ExchangeError::Codec {
            reason: "no codec configured for this session".into(),
        })
    }
}

/// `Coder` backed by the serde JSON data format.
#[cfg(feature = "codec")]
pub struct JsonCoder<T> {
    phantom: std::marker::PhantomData<T>,
}

#[cfg(feature = "codec")]
impl<T> JsonCoder<T> {
    pub fn new() -> Self {
        Self {
            phantom: std::marker::PhantomData,
        }
    }
}

#[cfg(feature = "codec")]
impl<T> Default for JsonCoder<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "codec")]
impl<T> Coder for JsonCoder<T>
where
    T: serde::Serialize + serde::de::DeserializeOwned,
{
    type Type = T;

    fn size_of(&self, value: &Self::Type) -> Result<usize> {
        Ok(self.encode(value)?.len())
    }

    fn encode(&self, value: &Self::Type) -> Result<Vec<u8>> {
        serde_json::to_vec(value).map_err(|err| ExchangeError::Codec {
            reason: err.to_string(),
        })
    }

    fn decode(&self, data: &[u8]) -> Result<Self::Type> {
        serde_json::from_slice(data).map_err(|err| ExchangeError::Codec {
            reason: err.to_string(),
        })
    }
}
