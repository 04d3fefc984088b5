// "Tifflin" Kernel
// - By John Hodge (thePowersGang)
//
// Core/prelude.rs
/// Common global definitons
///
/// Modules start with `use kernel::prelude::*`, which imports the names from this module
pub use core::prelude::v1::*;

pub use alloc::boxed::Box;
pub use alloc::vec::Vec;
pub use alloc::string::String;
pub use alloc::collections::VecDeque;

pub use crate::logging::HexDump;

// vim: ft=rust
