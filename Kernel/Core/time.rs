// "Tifflin" Kernel
// - By John Hodge (thePowersGang)
//
// Core/time.rs
//! Timekeeping
//!
//! There is no timer hardware here, the platform registers a tick source (hosted builds use
//! the std monotonic clock). Ticks are only used to timestamp log entries.

/// Time in arbitary ticks (milliseconds on hosted builds)
pub type TickCount = u64;

/// Returns the current tick count (zero if no source is registered)
pub fn ticks() -> TickCount
{
	crate::arch::imp::time::ticks()
}

/// Register the function used to obtain the current tick count
#[cfg(not(feature="test"))]
pub fn register_source(f: fn() -> TickCount)
{
	crate::arch::imp::time::set_source(f)
}

// vim: ft=rust
