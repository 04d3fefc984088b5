//! (Micro)frame number arithmetic
//!
//! The hardware frame counter is 14 bits and wraps, so ordering is only meaningful within
//! half of the counter's range.
use crate::hw_regs::HFNUM_MAX_FRNUM;

/// Frames between adding a periodic QH and its first scheduled frame
pub const SCHEDULE_SLOP: u16 = 10;

/// Returns true if `a` is at or before `b`
pub fn frame_num_le(a: u16, b: u16) -> bool
{
	(b.wrapping_sub(a) & HFNUM_MAX_FRNUM) <= (HFNUM_MAX_FRNUM >> 1)
}

/// `frame + inc`, wrapped to the counter width
pub fn frame_num_inc(frame: u16, inc: u16) -> u16
{
	frame.wrapping_add(inc) & HFNUM_MAX_FRNUM
}

/// Full (1ms) frame number containing a microframe number
pub fn full_frame_num(frame: u16) -> u16
{
	(frame & HFNUM_MAX_FRNUM) >> 3
}
