//! The 32-byte BLAKE2b digest used for block, deploy and entropy hashes.

use std::{
    array::TryFromSliceError,
    convert::TryFrom,
    fmt::{self, Debug, Display, Formatter},
};

use blake2::{
    digest::{Update, VariableOutput},
    VarBlake2b,
};
use datasize::DataSize;
use hex_fmt::HexFmt;
use serde::{Deserialize, Serialize};

/// The hash digest; a wrapped `u8` array.
///
/// Digests are ordered lexicographically by their bytes. This is the canonical order used for
/// every deterministic tie-break in the consensus core.
#[derive(
    Copy, Clone, DataSize, Ord, PartialOrd, Eq, PartialEq, Hash, Default, Serialize, Deserialize,
)]
pub struct Digest([u8; Digest::LENGTH]);

impl Digest {
    /// The number of bytes in a digest hash.
    pub const LENGTH: usize = 32;

    /// Creates a 32-byte hash digest from a given piece of data.
    pub fn hash<T: AsRef<[u8]>>(data: T) -> Digest {
        let mut hasher = Hasher::new();
        hasher.update(data);
        hasher.finalize()
    }

    /// Hashes a pair of byte slices into a single digest.
    pub fn hash_pair<T: AsRef<[u8]>, U: AsRef<[u8]>>(data1: T, data2: U) -> Digest {
        let mut hasher = Hasher::new();
        hasher.update(data1);
        hasher.update(data2);
        hasher.finalize()
    }

    /// Returns a reference to the underlying bytes.
    pub fn inner(&self) -> &[u8; Digest::LENGTH] {
        &self.0
    }

    /// Returns the underlying bytes.
    pub fn value(self) -> [u8; Digest::LENGTH] {
        self.0
    }
}

impl AsRef<[u8]> for Digest {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; Digest::LENGTH]> for Digest {
    fn from(arr: [u8; Digest::LENGTH]) -> Self {
        Digest(arr)
    }
}

impl<'a> TryFrom<&'a [u8]> for Digest {
    type Error = TryFromSliceError;

    fn try_from(slice: &[u8]) -> Result<Digest, Self::Error> {
        <[u8; Digest::LENGTH]>::try_from(slice).map(Digest)
    }
}

impl Debug for Digest {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}", HexFmt(&self.0))
    }
}

impl Display for Digest {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{:10}", HexFmt(&self.0))
    }
}

/// An incremental hasher producing a [`Digest`].
///
/// Fields are fed in the order of `update` calls; callers are responsible for a canonical order.
pub struct Hasher(VarBlake2b);

impl Hasher {
    /// Creates a new hasher.
    pub fn new() -> Self {
        Hasher(VarBlake2b::new(Digest::LENGTH).expect("should create hasher"))
    }

    /// Feeds `data` into the hasher.
    pub fn update<T: AsRef<[u8]>>(&mut self, data: T) {
        self.0.update(data);
    }

    /// Feeds a `u64` in big-endian byte order into the hasher.
    pub fn update_u64(&mut self, value: u64) {
        self.0.update(value.to_be_bytes());
    }

    /// Consumes the hasher and returns the digest.
    pub fn finalize(self) -> Digest {
        let mut result = [0; Digest::LENGTH];
        self.0.finalize_variable(|slice| {
            result.copy_from_slice(slice);
        });
        Digest(result)
    }
}

impl Default for Hasher {
    fn default() -> Self {
        Hasher::new()
    }
}
