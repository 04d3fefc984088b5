//! Queue heads (one per endpoint) and queued transfer descriptors (one per request)
use ::kernel::prelude::*;
use ::usb_core::host::{self, EndpointAddr, EndpointType, Direction, Speed, TtInfo, IsoPacket, IsoPacketResult, TransferStatus, Completion};
use crate::hw_structs::{PAddr, Pid, SplitPos};
use crate::bus_time::calc_bus_time_us;
use crate::usb_host::RequestHandle;

/// Completion callback for a request
///
/// `Send` so that the controller can be shared with the interrupt handler.
pub type CompletionFn = host::Handle<dyn FnMut(RequestHandle, &Completion<'_>) + Send>;

/// Static description of the endpoint a request targets
#[derive(Copy,Clone,Debug)]
pub struct EndpointDesc
{
	pub addr: EndpointAddr,
	/// Ignored for control endpoints
	pub direction: Direction,
	pub max_packet: u16,
	/// Transactions per microframe for high-bandwidth endpoints (1-3)
	pub mult: u8,
	/// Polling interval in (micro)frames, periodic endpoints only
	pub interval: u16,
	pub speed: Speed,
	/// Hub that translates for this device, required for full/low speed devices on a high speed port
	pub tt: Option<TtInfo>,
}

#[derive(Clone,Debug)]
pub enum TransferKind
{
	Control { setup: Option<[u8; 8]> },
	Bulk,
	Interrupt,
	Isochronous { packets: Vec<IsoPacket> },
}
impl TransferKind
{
	pub fn ep_type(&self) -> EndpointType {
		match *self
		{
		TransferKind::Control { .. } => EndpointType::Control,
		TransferKind::Bulk => EndpointType::Bulk,
		TransferKind::Interrupt => EndpointType::Interrupt,
		TransferKind::Isochronous { .. } => EndpointType::Isochronous,
		}
	}
}

#[derive(Copy,Clone,Default,Debug)]
pub struct TransferFlags
{
	/// Terminate a bulk OUT that is a multiple of the packet size with a zero length packet
	pub zero_packet: bool,
}

/// A transfer request, as passed to `submit`
#[derive(Clone,Debug)]
pub struct TransferRequest
{
	pub endpoint: EndpointDesc,
	pub buffer: PAddr,
	pub length: usize,
	pub kind: TransferKind,
	pub flags: TransferFlags,
}

/// Lookup key for a queue head
///
/// Control endpoints are bidirectional, so they are keyed without a direction.
#[derive(Copy,Clone,PartialEq,Eq,PartialOrd,Ord,Debug)]
pub struct EndpointKey
{
	pub addr: EndpointAddr,
	pub dir: Option<Direction>,
}
impl EndpointKey
{
	pub fn new(addr: EndpointAddr, ep_type: EndpointType, dir: Direction) -> EndpointKey {
		EndpointKey {
			addr: addr,
			dir: if ep_type == EndpointType::Control { None } else { Some(dir) },
			}
	}
}

/// Scheduling state of a queue head, each non-idle state matches one schedule list
#[derive(Copy,Clone,PartialEq,Eq,Debug)]
pub enum QhState
{
	/// No queued requests, on no list
	Idle,
	/// Waiting for its (micro)frame, or for a channel
	Inactive,
	/// Periodic, due in the current (micro)frame
	Ready,
	/// Owns a channel that is not yet started
	Assigned,
	/// Channel running in hardware
	Queued,
}

#[derive(Copy,Clone,PartialEq,Eq,Debug)]
pub enum ControlPhase
{
	Setup,
	Data,
	Status,
}

pub struct Qh
{
	pub key: EndpointKey,
	pub ep_type: EndpointType,
	pub speed: Speed,
	pub max_packet: u16,
	pub mult: u8,
	pub tt: Option<TtInfo>,

	pub do_split: bool,
	/// Next OUT transfer starts with a PING (high speed bulk/control)
	pub ping_state: bool,
	/// Bulk/interrupt data toggle, preserved between requests
	pub data_toggle: Pid,

	/// Periodic interval in (micro)frames (full frames are converted to microframes when splitting)
	pub interval: u16,
	pub sched_frame: u16,
	pub start_split_frame: u16,
	/// Set when a split bulk/control transaction NAKed
	pub nak_frame: Option<u16>,
	/// Bus time reserved by this endpoint, periodic only
	pub usecs: u16,
	/// Currently holding a periodic reservation
	pub periodic_reserved: bool,
	/// Free the QH once its channel comes back
	pub disable_pending: bool,

	pub state: QhState,
	pub qtds: VecDeque<Qtd>,
	pub channel: Option<crate::desc_pools::ChannelHandle>,
}
impl_fmt! {
	Debug(self, f) for Qh {
		write!(f, "Qh({:?} {:?} {:?} {:?} mps={} {} qtds={})", self.key.addr, self.key.dir, self.ep_type, self.speed, self.max_packet,
			if self.do_split { "split" } else { "direct" },
			self.qtds.len())
	}
}
impl Qh
{
	/// Create a queue head for an endpoint on a port running at `port_speed`
	pub fn new(ep: &EndpointDesc, ep_type: EndpointType, port_speed: Speed) -> Qh
	{
		let do_split = port_speed == Speed::High && ep.speed != Speed::High;
		let mult = if ep.mult == 0 { 1 } else { ep.mult };
		let mut rv = Qh {
			key: EndpointKey::new(ep.addr, ep_type, ep.direction),
			ep_type: ep_type,
			speed: ep.speed,
			max_packet: ep.max_packet,
			mult: mult,
			tt: ep.tt,
			do_split: do_split,
			ping_state: false,
			data_toggle: Pid::Data0,
			interval: 0,
			sched_frame: 0,
			start_split_frame: 0,
			nak_frame: None,
			usecs: 0,
			periodic_reserved: false,
			disable_pending: false,
			state: QhState::Idle,
			qtds: VecDeque::new(),
			channel: None,
			};
		if ep_type.is_periodic()
		{
			let bytes = ep.max_packet as u32 * mult as u32;
			// Split transactions occupy the high speed bus, the hub handles the full speed side
			let bus_speed = if do_split { Speed::High } else { ep.speed };
			rv.usecs = calc_bus_time_us(bus_speed, ep.direction.is_in(), ep_type == EndpointType::Isochronous, bytes);
			rv.interval = ::core::cmp::max(ep.interval, 1);
			if do_split {
				// Full speed intervals are in frames, the schedule runs in microframes
				rv.interval = rv.interval.saturating_mul(8);
			}
		}
		rv
	}

	pub fn is_periodic(&self) -> bool {
		self.ep_type.is_periodic()
	}
	pub fn direction(&self) -> Direction {
		self.key.dir.unwrap_or(Direction::Out)
	}
	/// Most data the endpoint moves in one (micro)frame
	pub fn max_periodic_bytes(&self) -> u32 {
		self.max_packet as u32 * self.mult as u32
	}
}

pub struct Qtd
{
	pub handle: RequestHandle,
	pub buffer: PAddr,
	pub length: usize,
	pub setup: Option<[u8; 8]>,
	pub flags: TransferFlags,
	pub callback: CompletionFn,

	/// Currently the transfer a channel is working on
	pub in_progress: bool,
	pub control_phase: ControlPhase,
	/// Control transfer data toggle (bulk/interrupt toggle lives in the QH)
	pub data_toggle: Pid,
	pub complete_split: bool,
	/// Consecutive transaction errors
	pub error_count: u8,
	/// Bytes sent by the last acknowledged OUT start-split
	pub ssplit_out_xfer_count: u32,
	pub actual_length: usize,
	/// Final status, once decided
	pub status: Option<TransferStatus>,

	pub iso_packets: Vec<IsoPacket>,
	pub iso_results: Vec<IsoPacketResult>,
	pub isoc_frame_index: usize,
	pub isoc_split_pos: SplitPos,
	pub isoc_split_offset: usize,
	pub error_packets: u32,
}
impl_fmt! {
	Debug(self, f) for Qtd {
		write!(f, "Qtd({:?} {:#x}+{} {:?} actual={} err={})", self.handle, self.buffer, self.length, self.control_phase, self.actual_length, self.error_count)
	}
}
impl Qtd
{
	pub fn new(handle: RequestHandle, req: TransferRequest, callback: CompletionFn) -> Qtd
	{
		let (setup, iso_packets) = match req.kind
			{
			TransferKind::Control { setup } => (setup, Vec::new()),
			TransferKind::Isochronous { packets } => (None, packets),
			TransferKind::Bulk | TransferKind::Interrupt => (None, Vec::new()),
			};
		Qtd {
			handle: handle,
			buffer: req.buffer,
			length: req.length,
			setup: setup,
			flags: req.flags,
			callback: callback,
			in_progress: false,
			control_phase: ControlPhase::Setup,
			data_toggle: Pid::Data1,
			complete_split: false,
			error_count: 0,
			ssplit_out_xfer_count: 0,
			actual_length: 0,
			status: None,
			iso_results: iso_packets.iter().map(|_| IsoPacketResult { status: TransferStatus::Io, actual_length: 0 }).collect(),
			iso_packets: iso_packets,
			isoc_frame_index: 0,
			isoc_split_pos: SplitPos::All,
			isoc_split_offset: 0,
			error_packets: 0,
		}
	}

	/// Account `len` more bytes, never exceeding the request length
	pub fn add_actual(&mut self, len: usize) {
		self.actual_length = ::core::cmp::min(self.actual_length + len, self.length);
	}
}

/// A finished request, waiting for its callback to be invoked outside the lock
pub struct DoneRequest
{
	pub handle: RequestHandle,
	pub callback: CompletionFn,
	pub status: TransferStatus,
	pub actual_length: usize,
	pub iso_results: Vec<IsoPacketResult>,
	pub error_packets: u32,
}
impl DoneRequest
{
	pub fn from_qtd(qtd: Qtd, status: TransferStatus) -> DoneRequest
	{
		let Qtd { handle, callback, mut iso_results, isoc_frame_index, mut error_packets, actual_length, .. } = qtd;
		let actual_length = if iso_results.is_empty() {
				actual_length
			}
			else {
				// Frames never reached take the transfer's status
				if !status.is_success() {
					for r in iso_results.iter_mut().skip(isoc_frame_index) {
						r.status = status;
						r.actual_length = 0;
						error_packets += 1;
					}
				}
				iso_results.iter().map(|r| r.actual_length).sum()
			};
		DoneRequest {
			handle: handle,
			callback: callback,
			status: status,
			actual_length: actual_length,
			iso_results: iso_results,
			error_packets: error_packets,
		}
	}

	/// Invoke the callback
	pub fn deliver(mut self)
	{
		log_debug!("deliver({:?}): {:?} {} bytes", self.handle, self.status, self.actual_length);
		let c = Completion {
			status: self.status,
			actual_length: self.actual_length,
			iso_packets: &self.iso_results,
			error_packets: self.error_packets,
			};
		let h = self.handle;
		(&mut *self.callback)(h, &c);
	}
}
