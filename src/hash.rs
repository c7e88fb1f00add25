//! Content and signature hashing

use std::fmt;

use sha2::{Digest, Sha256};

/// SHA-256 digest used for file contents and row signatures
#[derive(Copy, Clone, Default, Eq, PartialEq, Hash)]
#[repr(transparent)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
   pub const fn new(hash: [u8; 32]) -> Self {
      Self(hash)
   }

   /// Computes SHA-256 hash of data
   pub fn sum(dat: impl AsRef<[u8]>) -> Self {
      Self(Sha256::digest(dat.as_ref()).into())
   }

   /// Finalizes an incrementally-fed hasher
   pub fn from_hasher(hasher: Sha256) -> Self {
      Self(hasher.finalize().into())
   }
}

impl AsRef<[u8]> for ContentHash {
   fn as_ref(&self) -> &[u8] {
      &self.0
   }
}

impl fmt::Display for ContentHash {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      write!(f, "{}", hex::encode(self.0))
   }
}

impl fmt::Debug for ContentHash {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      write!(f, "Hash({})", hex::encode(self.0))
   }
}
