//! Limits applied to untrusted size fields before decoding.

pub mod limits;

pub use limits::check_declared_size;
pub use limits::validate_compression_ratio;
