//! Bus time needed by one transaction (USB 2.0 section 5.11.3)
use ::usb_core::host::Speed;

const BW_HOST_DELAY: u64 = 1000;	// ns
const BW_HUB_LS_SETUP: u64 = 333;	// ns
const HS_HOST_DELAY: u64 = 5;	// ns

/// Worst-case bit time including bit stuffing (7/6 overhead)
fn bit_time(bytes: u64) -> u64 {
	7 * 8 * bytes / 6
}

/// Nanoseconds of bus time for one transaction with a `bytes` payload
pub fn calc_bus_time_ns(speed: Speed, is_in: bool, is_isoc: bool, bytes: u32) -> u64
{
	let bytes = bytes as u64;
	match speed
	{
	Speed::Low =>
		if is_in {
			64060 + 2 * BW_HUB_LS_SETUP + BW_HOST_DELAY + 67667 * (31 + 10 * bit_time(bytes)) / 1000
		}
		else {
			64107 + 2 * BW_HUB_LS_SETUP + BW_HOST_DELAY + 66700 * (31 + 10 * bit_time(bytes)) / 1000
		},
	Speed::Full => {
		let tmp = 8354 * (31 + 10 * bit_time(bytes)) / 1000;
		if is_isoc {
			(if is_in { 7268 } else { 6265 }) + BW_HOST_DELAY + tmp
		}
		else {
			9107 + BW_HOST_DELAY + tmp
		}
		},
	Speed::High =>
		if is_isoc {
			((38 * 8 * 2083) + 2083 * (3 + bit_time(bytes))) / 1000 + HS_HOST_DELAY
		}
		else {
			((55 * 8 * 2083) + 2083 * (3 + bit_time(bytes))) / 1000 + HS_HOST_DELAY
		},
	}
}

/// Microseconds of bus time (rounded up)
pub fn calc_bus_time_us(speed: Speed, is_in: bool, is_isoc: bool, bytes: u32) -> u16
{
	let ns = calc_bus_time_ns(speed, is_in, is_isoc, bytes);
	::core::cmp::min((ns + 999) / 1000, u16::MAX as u64) as u16
}
