// "Tifflin" Kernel
// - By John Hodge (thePowersGang)
//
// Core/main.rs
// - Support library root
//! Support library shared by the host-controller modules
//!
//! Provides logging, boot-time style configuration parsing, spinlocks and a tick source.
//! Builds as `no_std` (with `alloc`) unless the `test` feature is enabled, in which case the
//! std-backed implementations in `arch/imp-test.rs` are used.
#![cfg_attr(not(any(test,feature="test")),no_std)]

extern crate alloc;
#[cfg(feature="test")]
#[macro_use]
extern crate lazy_static;

#[doc(hidden)]
#[macro_use] pub mod logmacros;
#[doc(hidden)]
#[macro_use] pub mod macros;

/// Common imports (`alloc` types not in `core::prelude`)
pub mod prelude;

/// Library datatypes
pub mod lib;

/// Achitecture/environment specific back-ends
pub mod arch;

/// Synchronisation primitives
pub mod sync;

/// Timekeeping (tick source for log timestamps)
pub mod time;

/// Kernel logging framework
pub mod logging;

/// Configuration option parsing
#[macro_use]
pub mod config;

// vim: ft=rust
