//! Bijection between logical ids and storage keys.
//!
//! A key is the id emitted as a fixed-width big-endian integer, optionally
//! with its top bytes overwritten by a queue prefix. Big-endian keeps the
//! store's lexicographic key order identical to numeric id order, and a
//! prefix confines one queue to one contiguous key range so several
//! queues can share a store.
//!
//! The codec is configuration, not policy: `to_key` silently masks id
//! bits that do not fit the id space, and range enforcement stays with
//! the queue engine.

use fifodb_error::{FifoError, Result};

/// Storage key width, in line with the unsigned integer it encodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyWidth {
    U16,
    U32,
    U64,
}

impl KeyWidth {
    /// Key length in bytes.
    #[must_use]
    pub const fn bytes(self) -> usize {
        match self {
            Self::U16 => 2,
            Self::U32 => 4,
            Self::U64 => 8,
        }
    }
}

/// Fixed high-order key bytes identifying one queue inside a shared store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Prefix {
    /// Width of the prefix in bytes. Must be at least 1 and strictly less
    /// than the key width.
    pub bytes: usize,
    /// Prefix value; must fit in `bytes`.
    pub value: u64,
}

impl Prefix {
    #[must_use]
    pub const fn new(bytes: usize, value: u64) -> Self {
        Self { bytes, value }
    }
}

/// Encoded storage key: up to eight bytes, length fixed per codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodedKey {
    buf: [u8; 8],
    len: u8,
}

impl EncodedKey {
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len as usize]
    }
}

impl AsRef<[u8]> for EncodedKey {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

/// Id ↔ key converter for one queue.
///
/// `(width, prefix)` are frozen at construction; every key this codec
/// emits or accepts is exactly `width.bytes()` long.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyCodec {
    key_bytes: usize,
    /// Prefix value pre-shifted into the high bytes; zero when unprefixed.
    template: u64,
    max_id: u64,
}

impl KeyCodec {
    /// Codec without a prefix: the queue owns the whole key space of the
    /// chosen width.
    #[must_use]
    pub fn new(width: KeyWidth) -> Self {
        let key_bytes = width.bytes();
        Self {
            key_bytes,
            template: 0,
            max_id: low_bits_mask(key_bytes * 8),
        }
    }

    /// Codec whose keys carry `prefix` in their top bytes.
    pub fn with_prefix(width: KeyWidth, prefix: Prefix) -> Result<Self> {
        let key_bytes = width.bytes();
        if prefix.bytes == 0 || prefix.bytes >= key_bytes {
            return Err(FifoError::PrefixTooWide {
                prefix_bytes: prefix.bytes,
                key_bytes,
            });
        }
        if prefix.value >> (prefix.bytes * 8) != 0 {
            return Err(FifoError::PrefixValueTooLarge {
                value: prefix.value,
                prefix_bytes: prefix.bytes,
            });
        }
        let id_bits = (key_bytes - prefix.bytes) * 8;
        Ok(Self {
            key_bytes,
            template: prefix.value << id_bits,
            max_id: low_bits_mask(id_bits),
        })
    }

    /// Largest id this codec can represent.
    #[must_use]
    pub fn max_id(&self) -> u64 {
        self.max_id
    }

    /// Exact byte length of every key of this codec.
    #[must_use]
    pub fn key_len(&self) -> usize {
        self.key_bytes
    }

    /// Encode `id` as a storage key. Bits of `id` above [`max_id`](Self::max_id)
    /// are masked out; the caller is the authority on range.
    #[must_use]
    pub fn to_key(&self, id: u64) -> EncodedKey {
        let raw = self.template | (id & self.max_id);
        let wide = raw.to_be_bytes();
        let mut buf = [0u8; 8];
        buf[..self.key_bytes].copy_from_slice(&wide[8 - self.key_bytes..]);
        EncodedKey {
            buf,
            len: self.key_bytes as u8,
        }
    }

    /// Decode a storage key back to its id, discarding the prefix bits.
    pub fn to_id(&self, key: &[u8]) -> Result<u64> {
        if key.len() != self.key_bytes {
            return Err(FifoError::KeyLengthMismatch {
                found: key.len(),
                expected: self.key_bytes,
            });
        }
        Ok(self.raw(key) & self.max_id)
    }

    /// Whether `key` belongs to this codec's partition: right length and
    /// matching prefix bits.
    #[must_use]
    pub fn covers(&self, key: &[u8]) -> bool {
        key.len() == self.key_bytes && self.raw(key) & !self.max_id == self.template
    }

    fn raw(&self, key: &[u8]) -> u64 {
        let mut wide = [0u8; 8];
        wide[8 - self.key_bytes..].copy_from_slice(key);
        u64::from_be_bytes(wide)
    }
}

/// Mask with the low `bits` bits set.
const fn low_bits_mask(bits: usize) -> u64 {
    if bits >= 64 {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    }
}
