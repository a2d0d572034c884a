//! Shared foundational types for the prep cache.
//!
//! This crate provides the transform matrix used to place solids and the
//! content hash used to checksum cached payloads.

#![warn(missing_docs)]

pub mod hash;
pub mod matrix;

pub use hash::{ContentHash, ParseContentHashError};
pub use matrix::Matrix4;
