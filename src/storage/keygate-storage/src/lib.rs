//! # Keygate Storage
//!
//! Storage abstraction for the session revocation list.
//!
//! Sessions are carried entirely in signed client-side cookies, so the only
//! server-side state is the list of sessions that were logged out before
//! their natural expiry.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod backend;
pub mod error;
pub mod memory;

pub use backend::RevocationStore;
pub use error::StorageError;
pub use memory::MemoryRevocationStore;
