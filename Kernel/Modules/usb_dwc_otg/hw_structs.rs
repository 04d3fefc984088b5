//! Structures exchanged with the hardware layer
//!
//! The register-level programming of a channel is left to an implementation of `Hardware`,
//! the engine only describes the transaction it wants started.
use ::usb_core::host::{Direction, EndpointType, Speed};

/// Bus (DMA) address of a transfer buffer
pub type PAddr = u64;

/// Data PID used for the first packet of a channel programming
#[derive(Copy,Clone,PartialEq,Eq,Debug)]
pub enum Pid
{
	Data0,
	Data1,
	Data2,
	MData,
	Setup,
}
impl Pid
{
	/// The other toggle value (only meaningful for DATA0/DATA1)
	pub fn toggled(self) -> Pid {
		match self
		{
		Pid::Data0 => Pid::Data1,
		_ => Pid::Data0,
		}
	}
}

/// Position of a start-split within a full-speed isochronous OUT payload
#[derive(Copy,Clone,PartialEq,Eq,Debug)]
pub enum SplitPos
{
	/// The whole payload fits in this start-split
	All,
	Begin,
	Mid,
	End,
}

/// Split transaction parameters (device behind a transaction translator)
#[derive(Copy,Clone,PartialEq,Eq,Debug)]
pub struct SplitParams
{
	pub hub_addr: u8,
	pub port: u8,
	/// `false` for a start-split, `true` for a complete-split
	pub complete_split: bool,
	pub xact_pos: SplitPos,
}

/// Source/destination of the channel's data stage
#[derive(Copy,Clone,PartialEq,Eq,Debug)]
pub enum ChannelData
{
	/// The 8-byte setup packet of a control transfer
	Setup([u8; 8]),
	/// A DMA buffer
	Buffer(PAddr),
}

/// Everything needed to start one transaction (or packet run) on a host channel
#[derive(Clone,PartialEq,Eq,Debug)]
pub struct ChannelParams
{
	pub dev_addr: u8,
	pub ep_num: u8,
	pub direction: Direction,
	pub ep_type: EndpointType,
	pub speed: Speed,
	pub max_packet: u16,
	/// Transactions per microframe (high-bandwidth high speed periodic)
	pub multi_count: u8,
	pub data: ChannelData,
	pub xfer_len: u32,
	pub num_packets: u32,
	pub pid: Pid,
	/// Issue a PING before the OUT data
	pub do_ping: bool,
	pub split: Option<SplitParams>,
	/// Periodic transfers: run in an odd (micro)frame
	pub odd_frame: bool,
}

/// Residue read back from a halted channel (`HCTSIZn`)
#[derive(Copy,Clone,PartialEq,Eq,Debug)]
pub struct TransferState
{
	pub remaining_bytes: u32,
	pub remaining_packets: u32,
	/// PID the next packet would have used
	pub next_pid: Pid,
}

/// Root port status, as sampled on a port interrupt
#[derive(Copy,Clone,PartialEq,Eq,Debug)]
pub struct PortStatus
{
	pub connected: bool,
	pub enabled: bool,
	pub speed: Speed,
	pub connect_changed: bool,
	pub enable_changed: bool,
	pub overcurrent_changed: bool,
}

/// Failure to start a channel
#[derive(Copy,Clone,PartialEq,Eq,Debug)]
pub enum ProgramError
{
	/// No room in the request queue right now, try again later
	Deferred,
	/// The hardware refused the programming
	Fault,
}

/// Hardware access used by the engine
///
/// Every method is called with the controller lock held, and must not block.
pub trait Hardware
{
	/// Start a transaction on channel `index`
	fn program_channel(&mut self, index: usize, params: &ChannelParams) -> Result<(), ProgramError>;
	/// Ask a running channel to halt, the halt is reported through `on_channel_complete`
	fn halt_channel(&mut self, index: usize);
	/// Read the transfer size register of a halted channel
	fn transfer_state(&self, index: usize) -> TransferState;
	/// Current (micro)frame number
	fn frame_number(&self) -> u16;
	/// Pending host channel interrupts, one bit per channel (`HAINT`)
	fn channel_interrupts(&self) -> u32;
	/// Read and acknowledge the interrupt conditions of a channel (`HCINTn`)
	fn take_channel_condition(&mut self, index: usize) -> u32;
	/// Read and acknowledge the root port status
	fn take_port_status(&mut self) -> PortStatus;
}
