// "Tifflin" Kernel
// - By John Hodge (thePowersGang)
//
// Core/config.rs
//! Command-line style configuration
//!
//! Configuration sets are declared with `def_config_set!`, which generates a struct holding
//! one typed field per option (with a default), and a parser for a space-separated list of
//! `TAG=value` entries.
#[allow(unused_imports)]
use crate::prelude::*;

/// A type that can be parsed from a configuration value string
pub trait ConfigValue: Sized
{
	fn parse_value(s: &str) -> Option<Self>;
}

macro_rules! impl_config_value_fromstr {
	($($t:ty),*) => {$(
		impl ConfigValue for $t {
			fn parse_value(s: &str) -> Option<Self> {
				if let Some(hex) = s.strip_prefix("0x") {
					<$t>::from_str_radix(hex, 16).ok()
				}
				else {
					s.parse().ok()
				}
			}
		}
		)*};
}
impl_config_value_fromstr!{ u8, u16, u32, u64, usize }

impl ConfigValue for bool
{
	fn parse_value(s: &str) -> Option<Self> {
		match s
		{
		"1" | "y" | "yes" | "on" | "true" => Some(true),
		"0" | "n" | "no" | "off" | "false" => Some(false),
		_ => None,
		}
	}
}

/// Define a configuration set
///
/// ```ignore
/// def_config_set! {
/// 	/// Doc for the struct
/// 	MyConfig {
/// 		/// Doc for the field
/// 		field_name @ "tag" : u32 = 123,
/// 	}
/// }
/// ```
#[macro_export]
macro_rules! def_config_set {
	(
		$(#[$sat:meta])*
		$struct_name:ident {
			$(
			$(#[$at:meta])*
			$name:ident @ $sname:literal : $ty:ty = $default:expr,
			)*
		}
	) => {
		$(#[$sat])*
		#[derive(Debug,Clone)]
		pub struct $struct_name {
			$( $(#[$at])* pub $name: $ty, )*
		}
		impl ::core::default::Default for $struct_name
		{
			fn default() -> Self {
				$struct_name { $($name: $default),* }
			}
		}
		impl $struct_name
		{
			/// Construct from the defaults, then apply a `TAG=value` list
			pub fn from_cmdline(cmdline: &str) -> Self
			{
				let mut rv = Self::default();
				rv.apply_cmdline(cmdline);
				rv
			}
			
			/// Apply a space-separated list of `TAG=value` entries
			pub fn apply_cmdline(&mut self, cmdline: &str)
			{
				for ent in cmdline.split(' ').filter(|v| !v.is_empty())
				{
					let mut it = ent.splitn(2, '=');
					let tag = it.next().unwrap_or("");
					let value = it.next();
					match tag
					{
					$(
					$sname => match value
						{
						Some(v) => match $crate::config::ConfigValue::parse_value(v)
							{
							Some(v) => self.$name = v,
							None => log_warning!("Invalid value '{}' for {}", v, tag),
							},
						None => log_warning!("{} requires a value", tag),
						},
					)*
					v @ _ => log_warning!("Unknown option '{}'", v),
					}
				}
			}
		}
	};
}


// vim: ft=rust
