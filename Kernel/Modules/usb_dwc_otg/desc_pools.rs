//! Channel and queue head pools
//!
//! Both pools hand out indices rather than references. Channels are returned through a
//! non-copyable handle (`ChannelHandle`) that can only go back to the pool once the hardware
//! has acknowledged the halt (`HaltedChannel`).
mod hc_pool;
mod qh_pool;

pub use self::hc_pool::{ChannelPool, Channel, ChannelState, ChannelHandle, HaltedChannel, HaltStatus};
pub use self::qh_pool::{QhPool, QhId};
