//! Hardware-level declarations (wire formats)

/// `bmRequestType` direction bit (device-to-host)
pub const REQ_TYPE_DIR_IN: u8 = 0x80;
/// `bmRequestType` type field
pub const REQ_TYPE_STANDARD: u8 = 0x00;
pub const REQ_TYPE_CLASS: u8 = 0x20;
pub const REQ_TYPE_VENDOR: u8 = 0x40;
/// `bmRequestType` recipient field
pub const REQ_RECIP_DEVICE: u8 = 0x00;
pub const REQ_RECIP_INTERFACE: u8 = 0x01;
pub const REQ_RECIP_ENDPOINT: u8 = 0x02;

/// Standard request numbers
pub mod requests
{
	pub const GET_STATUS: u8 = 0;
	pub const CLEAR_FEATURE: u8 = 1;
	pub const SET_FEATURE: u8 = 3;
	pub const SET_ADDRESS: u8 = 5;
	pub const GET_DESCRIPTOR: u8 = 6;
	pub const SET_CONFIGURATION: u8 = 9;
}

/// A standard USB device request (the 8-byte setup packet)
#[derive(Copy,Clone,PartialEq,Eq,Debug)]
pub struct DeviceRequest
{
	pub req_type: u8,
	pub req_num: u8,

	pub value: u16,
	pub index: u16,
	pub length: u16,
}
impl DeviceRequest
{
	pub fn to_bytes(&self) -> [u8; 8] {
		[
			self.req_type,
			self.req_num,
			(self.value >> 0) as u8, (self.value >> 8) as u8,
			(self.index >> 0) as u8, (self.index >> 8) as u8,
			(self.length >> 0) as u8, (self.length >> 8) as u8,
			]
	}
	pub fn from_bytes(b: &[u8; 8]) -> DeviceRequest {
		DeviceRequest {
			req_type: b[0],
			req_num: b[1],
			value: u16::from_le_bytes([b[2], b[3]]),
			index: u16::from_le_bytes([b[4], b[5]]),
			length: u16::from_le_bytes([b[6], b[7]]),
		}
	}

	/// Direction of the data stage
	pub fn direction(&self) -> crate::Direction {
		if self.req_type & REQ_TYPE_DIR_IN != 0 {
			crate::Direction::In
		}
		else {
			crate::Direction::Out
		}
	}
}
