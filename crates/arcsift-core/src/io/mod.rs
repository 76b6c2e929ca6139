//! Bounded readers for untrusted header bytes.

pub mod fields;

pub use fields::FieldReader;
