//! Host controller configuration
use ::usb_core::host::Speed;

/// Most channels the controller can have
pub const MAX_HOST_CHANNELS: u8 = 16;

def_config_set! {
	/// Tunables for the transaction engine (parsed from a `tag=value` list)
	HcdConfig {
		/// Number of host channels implemented by the core
		host_channels @ "host_channels" : u8 = 8,
		/// Microframes to hold off a split bulk endpoint after a NAK
		nak_holdoff @ "nak_holdoff" : u16 = 8,
		/// Largest transfer size for one channel programming
		max_transfer_size @ "max_transfer_size" : u32 = 65535,
		/// Largest packet count for one channel programming
		max_packet_count @ "max_packet_count" : u32 = 511,
		/// Speed of the root port until the port reports otherwise
		root_speed @ "root_speed" : Speed = Speed::High,
		/// Channels that periodic reservations may not take
		periodic_reserve @ "periodic_reserve" : u8 = 1,
	}
}

impl HcdConfig
{
	/// Clamp values to what the engine can support
	pub fn sanitise(&mut self)
	{
		if self.host_channels == 0 || self.host_channels > MAX_HOST_CHANNELS {
			log_warning!("host_channels={} out of range, using {}", self.host_channels, MAX_HOST_CHANNELS);
			self.host_channels = MAX_HOST_CHANNELS;
		}
		if self.periodic_reserve >= self.host_channels {
			log_warning!("periodic_reserve={} leaves no periodic channels", self.periodic_reserve);
			self.periodic_reserve = self.host_channels - 1;
		}
		if self.max_packet_count == 0 {
			self.max_packet_count = 1;
		}
		if self.max_transfer_size < 1024 {
			log_warning!("max_transfer_size={} too small, using 1024", self.max_transfer_size);
			self.max_transfer_size = 1024;
		}
	}
}
