// "Tifflin" Kernel
// - By John Hodge (thePowersGang)
//
// Core/macros.rs
//! Helper macros

/// Shorthand for implementing `core::fmt` traits
#[macro_export]
macro_rules! impl_fmt
{
	( $( <$($g:ident),+> $tr:ident ($s:ident, $f:ident) for $ty:ty { $($code:tt)* } )+ ) => { $(
		impl<$($g),+> ::core::fmt::$tr for $ty {
			fn fmt(&$s, $f: &mut ::core::fmt::Formatter) -> ::core::fmt::Result {
				$($code)*
			}
		}
		)+
		};
	( $( $tr:ident ($s:ident, $f:ident) for $ty:ty { $($code:tt)* } )+ ) => { $(
		impl ::core::fmt::$tr for $ty {
			fn fmt(&$s, $f: &mut ::core::fmt::Formatter) -> ::core::fmt::Result {
				$($code)*
			}
		}
		)+
		};
}

// vim: ft=rust
