//! Bare-metal back-end
//!
//! No threads and no OS: the spinlock is a plain atomic flag, and console output goes to
//! whatever the platform registered with `set_console`.
use core::sync::atomic::{AtomicUsize, Ordering};

static S_CONSOLE: AtomicUsize = AtomicUsize::new(0);

/// Register the function used for console (log) output
pub fn set_console(f: fn(&str)) {
	S_CONSOLE.store(f as usize, Ordering::Release);
}

pub fn puts(s: &str) {
	let p = S_CONSOLE.load(Ordering::Acquire);
	if p != 0 {
		// SAFE: Only ever stored from a `fn(&str)` in `set_console`
		let f: fn(&str) = unsafe { ::core::mem::transmute(p) };
		f(s);
	}
}

pub mod sync {
	use core::sync::atomic::{AtomicU8, Ordering};

	pub struct SpinlockInner
	{
		flag: AtomicU8,
	}

	impl SpinlockInner
	{
		pub const fn new() -> SpinlockInner {
			SpinlockInner {
				flag: AtomicU8::new(0),
				}
		}
		pub fn inner_lock(&self) {
			// Set flag to 1 if zero, loop otherwise
			while self.flag.compare_exchange(0, 1, Ordering::Acquire, Ordering::Relaxed).is_err() {
				::core::hint::spin_loop();
			}
		}
		pub unsafe fn inner_release(&self)
		{
			self.flag.store(0, Ordering::Release)
		}
	}
}

pub mod time {
	use core::sync::atomic::{AtomicUsize, Ordering};

	static S_TICK_SOURCE: AtomicUsize = AtomicUsize::new(0);

	pub fn set_source(f: fn() -> u64) {
		S_TICK_SOURCE.store(f as usize, Ordering::Release);
	}
	pub fn ticks() -> u64 {
		let p = S_TICK_SOURCE.load(Ordering::Acquire);
		if p == 0 {
			0
		}
		else {
			// SAFE: Only ever stored from a `fn() -> u64` in `set_source`
			let f: fn() -> u64 = unsafe { ::core::mem::transmute(p) };
			f()
		}
	}
}

// vim: ft=rust
