// "Tifflin" Kernel - USB Core
// - By John Hodge (thePowersGang)
//
// Modules/usb_core/lib.rs
//! USB Core
//!
//! Bus-level definitions shared between the host controller drivers and their users:
//! endpoint addressing, transfer kinds, completion status codes and the standard device
//! request (setup packet) encoding.
#![no_std]
#[cfg(test)]
#[macro_use]
extern crate /**/ std;

#[allow(unused_extern_crates)]
#[macro_use]
extern crate kernel;
extern crate stack_dst;

pub mod host;
pub mod hw_decls;

pub use self::host::{EndpointAddr, Speed, Direction, EndpointType, TransferStatus};
