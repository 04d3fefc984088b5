//! Host-side endpoint and transfer definitions
use ::kernel::config::ConfigValue;

/// A double-fat pointer (three words long)
pub type Handle<T/*: ?Sized*/> = ::stack_dst::ValueA<T, [usize; 3]>;

#[derive(Copy,Clone,PartialEq,Eq,PartialOrd,Ord,Hash)]
pub struct EndpointAddr(u16);	// 7 bit device and 4 bit endpoint (encoded together)
impl EndpointAddr
{
	pub fn new(dev: u8, endpt: u8) -> EndpointAddr {
		assert!(dev < 128);
		assert!(endpt < 16);
		EndpointAddr(dev as u16 * 16 + endpt as u16)
	}
	pub fn dev_addr(&self) -> u8 {
		(self.0 >> 4) as u8
	}
	pub fn endpt(&self) -> u8 {
		(self.0 & 0xF) as u8
	}
}
impl ::core::fmt::Debug for EndpointAddr
{
	fn fmt(&self, f: &mut ::core::fmt::Formatter) -> ::core::fmt::Result {
		write!(f, "{}:{}", self.dev_addr(), self.endpt())
	}
}

/// Bus speed of a device (or port)
#[derive(Copy,Clone,PartialEq,Eq,Debug)]
pub enum Speed
{
	/// 1.5Mbps
	Low,
	/// 12Mbps
	Full,
	/// 480Mbps
	High,
}
impl ConfigValue for Speed
{
	fn parse_value(s: &str) -> Option<Self> {
		match s
		{
		"low" => Some(Speed::Low),
		"full" => Some(Speed::Full),
		"high" => Some(Speed::High),
		_ => None,
		}
	}
}

#[derive(Copy,Clone,PartialEq,Eq,PartialOrd,Ord,Hash,Debug)]
pub enum Direction
{
	/// Host to device
	Out,
	/// Device to host
	In,
}
impl Direction
{
	pub fn is_in(&self) -> bool {
		*self == Direction::In
	}
}

#[derive(Copy,Clone,PartialEq,Eq,Debug)]
pub enum EndpointType
{
	Control,
	Isochronous,
	Bulk,
	Interrupt,
}
impl EndpointType
{
	/// Periodic endpoints are serviced on a fixed (micro)frame interval
	pub fn is_periodic(&self) -> bool {
		match *self
		{
		EndpointType::Isochronous | EndpointType::Interrupt => true,
		EndpointType::Control | EndpointType::Bulk => false,
		}
	}
}

/// Final status of a transfer (or of one isochronous frame)
#[derive(Copy,Clone,PartialEq,Eq,Debug)]
pub enum TransferStatus
{
	Success,
	/// Endpoint returned STALL
	Stall,
	/// Repeated transaction errors (CRC, timeout, bad PID), or a data toggle mismatch
	Protocol,
	/// Device sent more data than requested (babble)
	Overflow,
	/// Bus/DMA fault, or a periodic transfer missed its window
	Io,
	/// Isochronous IN frame was not received in its (micro)frame
	IsoOverrun,
	/// Isochronous OUT frame was not sent in its (micro)frame
	IsoUnderrun,
	/// The request was cancelled by its owner
	Cancelled,
	/// The device went away (port disconnect) before the request finished
	Shutdown,
}
impl TransferStatus
{
	/// Equivalent negated errno value (0 for success)
	pub fn errno(&self) -> i32 {
		match *self
		{
		TransferStatus::Success => 0,
		TransferStatus::Stall => -32,	// EPIPE
		TransferStatus::Protocol => -71,	// EPROTO
		TransferStatus::Overflow => -75,	// EOVERFLOW
		TransferStatus::Io => -5,	// EIO
		TransferStatus::IsoOverrun => -63,	// ENOSR
		TransferStatus::IsoUnderrun => -70,	// ECOMM
		TransferStatus::Cancelled => -2,	// ENOENT
		TransferStatus::Shutdown => -108,	// ESHUTDOWN
		}
	}
	pub fn is_success(&self) -> bool {
		*self == TransferStatus::Success
	}
}

/// Transaction translator (hub) that a full/low speed device is attached through
#[derive(Copy,Clone,PartialEq,Eq,Debug)]
pub struct TtInfo
{
	/// Address of the high speed hub
	pub hub_addr: u8,
	/// Downstream port on that hub (1-based)
	pub port: u8,
}

/// Location and size of one isochronous packet within the transfer buffer
#[derive(Copy,Clone,PartialEq,Eq,Debug)]
pub struct IsoPacket
{
	pub offset: usize,
	pub length: usize,
}

/// Result of one isochronous packet
#[derive(Copy,Clone,PartialEq,Eq,Debug)]
pub struct IsoPacketResult
{
	pub status: TransferStatus,
	pub actual_length: usize,
}

/// Completion record passed to a request's owner
#[derive(Debug)]
pub struct Completion<'a>
{
	pub status: TransferStatus,
	/// Bytes moved (sum over all packets for isochronous)
	pub actual_length: usize,
	/// Per-packet results (isochronous only, empty otherwise)
	pub iso_packets: &'a [IsoPacketResult],
	/// Number of isochronous packets that did not succeed
	pub error_packets: u32,
}
