// "Tifflin" Kernel
// - By John Hodge (thePowersGang)
//
// Core/lib/ring_buffer.rs
// - Ring buffer (fixed size)
//!
//! Provides a fixed-capacity ring buffer
#[allow(unused_imports)]
use crate::prelude::*;

/// Fixed-size ring buffer type
pub struct RingBuf<T>
{
	data: Vec<Option<T>>,
	start: usize,
	len: usize,
}

impl<T> RingBuf<T>
{
	/// Create a new (empty) ring buffer
	pub fn new(capacity: usize) -> RingBuf<T> {
		assert!(capacity > 0);
		let mut data = Vec::with_capacity(capacity);
		data.resize_with(capacity, || None);
		RingBuf {
			data: data,
			start: 0,
			len: 0,
		}
	}

	fn int_get_idx(&self, idx: usize) -> usize {
		// idx == len valid for insertion
		assert!( idx <= self.len );
		(self.start + idx) % self.data.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len == 0
	}
	pub fn len(&self) -> usize {
		self.len
	}
	pub fn capacity(&self) -> usize {
		self.data.len()
	}

	/// Push an item to the end of the buffer
	pub fn push_back(&mut self, val: T) -> Result<(),T>
	{
		assert!(self.len <= self.data.len());
		if self.len == self.data.len()
		{
			Err(val)
		}
		else
		{
			let idx = self.int_get_idx(self.len);
			self.data[idx] = Some(val);
			self.len += 1;
			Ok( () )
		}
	}

	/// Push an item to the end, discarding the oldest if the buffer is full
	pub fn push_back_overwrite(&mut self, val: T)
	{
		if let Err(val) = self.push_back(val)
		{
			let _ = self.pop_front();
			let _ = self.push_back(val);
		}
	}
	
	pub fn back_mut(&mut self) -> Option<&mut T>
	{
		if self.len == 0
		{
			None
		}
		else
		{
			let idx = self.int_get_idx(self.len-1);
			self.data[idx].as_mut()
		}
	}
	
	/// Pop an item from the front of the buffer
	pub fn pop_front(&mut self) -> Option<T>
	{
		if self.len == 0
		{
			None
		}
		else
		{
			let idx = self.start;
			self.start = self.int_get_idx(1);
			self.len -= 1;
			self.data[idx].take()
		}
	}

	/// Iterate the buffer from oldest to newest
	pub fn iter(&self) -> impl Iterator<Item=&T> + '_
	{
		(0 .. self.len).filter_map(move |i| self.data[(self.start + i) % self.data.len()].as_ref())
	}
}


// vim: ft=rust
