//! Cryptographic primitives used by the consensus core.

pub mod hash;

pub use hash::Digest;
