//! Hosted (std) back-end, used when the `test` feature is enabled
//!
//! Console output goes to stderr (so it interleaves with the test harness' output capture),
//! and the spinlock wraps a std mutex so that a contended lock blocks instead of spinning.
use std::io::Write;

pub fn puts(s: &str) {
	let _ = ::std::io::stderr().write_all(s.as_bytes());
}

pub mod sync {
	use core::sync::atomic::Ordering;

	#[derive(Default)]
	pub struct SpinlockInner {
		// Stores a std mutex using a manually-managed pointer
		std: ::core::sync::atomic::AtomicPtr<std::sync::Mutex<()>>,
		handle: ::core::sync::atomic::AtomicUsize,
	}
	impl SpinlockInner
	{
		pub const fn new() -> Self {
			SpinlockInner {
				std: ::core::sync::atomic::AtomicPtr::new(0 as *mut _),
				handle: ::core::sync::atomic::AtomicUsize::new(0),
			}
		}
		fn get_std(&self) -> &::std::sync::Mutex<()> {
			let p = self.std.load(Ordering::Acquire);
			let p = if p.is_null() {
					let v = Box::new( ::std::sync::Mutex::new( () ) );
					let p = Box::leak(v) as *mut _;
					match self.std.compare_exchange(::core::ptr::null_mut(), p, Ordering::AcqRel, Ordering::Acquire)
					{
					Ok(_) => {	// Originally was NULL, now `p` has been stored
						p
						},
					Err(old) => {	// `p` was NOT stored, return the original value
						// SAFE: Only just created, and not stored
						let _ = unsafe { Box::from_raw(p) };
						old
						}
					}
				}
				else {
					p
				};
			// SAFE: Valid pointer
			unsafe { &*p }
		}
		fn store_guard(&self, lh: std::sync::MutexGuard<'static, ()>) {
			self.handle.store( Box::into_raw(Box::new(lh)) as usize, Ordering::SeqCst );
		}
		fn lock_std(&self) -> &'static ::std::sync::Mutex<()> {
			// SAFE: The mutex is leaked (never freed while `self` lives), and the guard is
			// released in `inner_release` before `self` can be dropped.
			unsafe { &*(self.get_std() as *const _) }
		}
		pub fn inner_lock(&self) {
			let lh = match self.lock_std().lock()
				{
				Ok(v) => v,
				Err(e) => e.into_inner(),
				};
			self.store_guard(lh);
		}
		pub unsafe fn inner_release(&self) {
			let p = self.handle.swap(0, Ordering::SeqCst) as *mut std::sync::MutexGuard<()>;
			assert!(!p.is_null());
			let _ = Box::from_raw(p);
		}
	}
	impl Drop for SpinlockInner {
		fn drop(&mut self) {
			let p = *self.std.get_mut();
			if !p.is_null() {
				// SAFE: Allocated by `get_std`, and no guard can be outstanding with `&mut self`
				let _ = unsafe { Box::from_raw(p) };
			}
		}
	}
}

pub mod time {
	lazy_static! {
		static ref EPOCH: ::std::time::Instant = ::std::time::Instant::now();
	}

	/// Milliseconds since the first call
	pub fn ticks() -> u64 {
		EPOCH.elapsed().as_millis() as u64
	}
}

// vim: ft=rust
