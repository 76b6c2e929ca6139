//! Entry reading and destination writes.

pub mod atomic;
pub(crate) mod reader;

pub use atomic::write_atomic;
