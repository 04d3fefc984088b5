//
//
//
//! Environment-specific back-ends
//!
//! `test` builds run on a hosted std environment, everything else uses the bare (atomic-only)
//! implementation and a registered console output.

cfg_if::cfg_if!{
	if #[cfg(feature="test")] {
		#[path="imp-test.rs"]
		pub mod test;

		pub use self::test as imp;
	}
	else {
		#[path="imp-bare.rs"]
		pub mod bare;

		pub use self::bare as imp;
	}
}

/// Write a string to the console output
pub fn puts(s: &str) {
	imp::puts(s);
}

/// Syncronisation types
pub mod sync {
	use super::imp::sync as imp;

	/// Lightweight protecting spinlock
	pub struct Spinlock<T>
	{
		#[doc(hidden)]
		/*pub*/ lock: imp::SpinlockInner,
		#[doc(hidden)]
		pub value: ::core::cell::UnsafeCell<T>,
	}
	unsafe impl<T: Send> Sync for Spinlock<T> {}
	unsafe impl<T: Send> Send for Spinlock<T> {}

	impl<T> Spinlock<T>
	{
		/// Create a new spinning lock
		pub const fn new(val: T) -> Spinlock<T> {
			Spinlock {
				lock: imp::SpinlockInner::new(),
				value: ::core::cell::UnsafeCell::new(val),
			}
		}
		pub fn get_mut(&mut self) -> &mut T {
			// SAFE: &mut to lock
			unsafe { &mut *self.value.get() }
		}
		pub fn into_inner(self) -> T {
			self.value.into_inner()
		}
		
		/// Lock this spinning lock
		pub fn lock(&self) -> HeldSpinlock<T>
		{
			self.lock.inner_lock();
			HeldSpinlock { lock: self }
		}
	}
	impl<T: Default> Default for Spinlock<T>
	{
		fn default() -> Self {
			Spinlock::new(Default::default())
		}
	}

	pub struct HeldSpinlock<'lock, T: 'lock>
	{
		lock: &'lock Spinlock<T>,
	}
	impl<'lock,T> ::core::ops::Drop for HeldSpinlock<'lock, T>
	{
		fn drop(&mut self)
		{
			// SAFE: This is the RAII handle for the lock
			unsafe {
				self.lock.lock.inner_release();
			}
		}
	}

	impl<'lock,T> ::core::ops::Deref for HeldSpinlock<'lock, T>
	{
		type Target = T;
		fn deref(&self) -> &T {
			// SAFE: & to handle makes & to value valid
			unsafe { &*self.lock.value.get() }
		}
	}
	impl<'lock,T> ::core::ops::DerefMut for HeldSpinlock<'lock, T>
	{
		fn deref_mut(&mut self) -> &mut T {
			// SAFE: &mut to handle makes &mut to value valid
			unsafe { &mut *self.lock.value.get() }
		}
	}
}

// vim: ft=rust
