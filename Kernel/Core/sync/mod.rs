// "Tifflin" Kernel
// - By John Hodge (thePowersGang)
//
// Core/sync/mod.rs
//! Synchronisation primitives

pub use crate::arch::sync::Spinlock;
pub use crate::arch::sync::HeldSpinlock;

// vim: ft=rust
