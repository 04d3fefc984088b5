// "Tifflin" Kernel
// - By John Hodge (thePowersGang)
//
// Core/lib/mod.rs
//! Library datatypes

pub mod ring_buffer;
pub mod fixed_string;

// vim: ft=rust
