// "Tifflin" Kernel
// - By John Hodge (thePowersGang)
//
// Core/lib/fixed_string.rs
//! Fixed-capacity string (truncates on overflow)

/// A string stored in a fixed-size inline buffer
#[derive(Clone)]
pub struct FixedString<const N: usize>
{
	len: usize,
	data: [u8; N],
}

impl<const N: usize> FixedString<N>
{
	pub const fn new() -> Self {
		FixedString { len: 0, data: [0; N] }
	}

	/// Append a string, truncating at a character boundary if it doesn't fit
	pub fn push_str(&mut self, s: &str) {
		let space = N - self.len;
		let mut n = ::core::cmp::min(space, s.len());
		while !s.is_char_boundary(n) {
			n -= 1;
		}
		self.data[self.len .. self.len + n].copy_from_slice(&s.as_bytes()[..n]);
		self.len += n;
	}

	pub fn as_str(&self) -> &str {
		// SAFE: Only ever extended with whole characters from `&str`s
		unsafe { ::core::str::from_utf8_unchecked(&self.data[..self.len]) }
	}
}
impl<const N: usize> ::core::ops::Deref for FixedString<N>
{
	type Target = str;
	fn deref(&self) -> &str {
		self.as_str()
	}
}
impl<const N: usize> ::core::fmt::Debug for FixedString<N>
{
	fn fmt(&self, f: &mut ::core::fmt::Formatter) -> ::core::fmt::Result {
		::core::fmt::Debug::fmt(self.as_str(), f)
	}
}
impl<const N: usize> ::core::fmt::Display for FixedString<N>
{
	fn fmt(&self, f: &mut ::core::fmt::Formatter) -> ::core::fmt::Result {
		::core::fmt::Display::fmt(self.as_str(), f)
	}
}


// vim: ft=rust
