//! Host channel pool
//!
//! A fixed array of channels and a FIFO free list of their indices. A channel is either on the
//! free list, or owned by exactly one queue head through a `ChannelHandle`.
use ::kernel::prelude::*;
use crate::hw_structs::ChannelParams;
use super::QhId;

/// Reason a channel was (or is being) halted
#[derive(Copy,Clone,PartialEq,Eq,Debug)]
pub enum HaltStatus
{
	/// No halt requested, channel can be reused without request-visible effect
	NoHaltStatus,
	/// One programming finished, more to do
	Complete,
	/// The whole request finished
	UrbComplete,
	Ack,
	Nak,
	Nyet,
	Stall,
	XactErr,
	FrameOverrun,
	BabbleErr,
	DataToggleErr,
	AhbErr,
	/// Periodic transfer could not finish in its window
	PeriodicIncomplete,
	/// Request cancelled while the channel was running
	UrbDequeue,
}
impl HaltStatus
{
	pub const COUNT: usize = 14;
	pub fn index(&self) -> usize {
		*self as usize
	}
}

#[derive(Copy,Clone,PartialEq,Eq,Debug)]
pub enum ChannelState
{
	/// On the free list
	Free,
	/// Owned by a queue head, not yet started
	Assigned,
	/// Transaction programmed into the hardware
	Running,
	/// Halt requested, waiting for the hardware to acknowledge
	Halting,
}

pub struct Channel
{
	state: ChannelState,
	qh: Option<QhId>,
	halt_status: HaltStatus,
	params: Option<ChannelParams>,
}
impl Channel
{
	pub fn state(&self) -> ChannelState {
		self.state
	}
	/// Queue head currently owning this channel (not an ownership link)
	pub fn qh(&self) -> Option<QhId> {
		self.qh
	}
	pub fn halt_status(&self) -> HaltStatus {
		self.halt_status
	}
	/// Parameters of the current (or last) programming
	pub fn params(&self) -> Option<&ChannelParams> {
		self.params.as_ref()
	}
}

pub struct ChannelPool
{
	channels: Vec<Channel>,
	free_list: VecDeque<usize>,
}

/// Ownership of an allocated channel
#[derive(Debug)]
pub struct ChannelHandle(usize);
impl ChannelHandle
{
	pub fn index(&self) -> usize {
		self.0
	}
}
impl ::core::ops::Drop for ChannelHandle
{
	fn drop(&mut self) {
		log_error!("BUG: {:?} dropped, should be released back to the pool", self);
	}
}

/// A channel that the hardware is no longer using, the only thing `ChannelPool::release` accepts
#[derive(Debug)]
pub struct HaltedChannel(ChannelHandle);

impl ChannelPool
{
	pub fn new(count: usize) -> ChannelPool
	{
		ChannelPool {
			channels: (0 .. count).map(|_| Channel { state: ChannelState::Free, qh: None, halt_status: HaltStatus::NoHaltStatus, params: None }).collect(),
			free_list: (0 .. count).collect(),
		}
	}

	pub fn total(&self) -> usize {
		self.channels.len()
	}
	/// Number of channels on the free list
	pub fn available(&self) -> usize {
		self.free_list.len()
	}

	pub fn get(&self, index: usize) -> Option<&Channel> {
		self.channels.get(index)
	}

	/// Take a channel from the free list for `qh`
	pub fn acquire(&mut self, qh: QhId) -> Option<ChannelHandle>
	{
		let idx = self.free_list.pop_front()?;
		let ch = &mut self.channels[idx];
		assert!(ch.state == ChannelState::Free, "Channel {} on free list in state {:?}", idx, ch.state);
		ch.state = ChannelState::Assigned;
		ch.qh = Some(qh);
		ch.halt_status = HaltStatus::NoHaltStatus;
		ch.params = None;
		log_trace!("acquire: #{} for {:?}", idx, qh);
		Some( ChannelHandle(idx) )
	}

	/// Record the programming for an assigned channel
	pub fn set_params(&mut self, h: &ChannelHandle, params: ChannelParams) {
		let ch = &mut self.channels[h.0];
		assert!(ch.state == ChannelState::Assigned);
		ch.params = Some(params);
	}

	/// Mark an assigned channel as started in hardware
	pub fn mark_running(&mut self, h: &ChannelHandle) {
		let ch = &mut self.channels[h.0];
		assert!(ch.state == ChannelState::Assigned);
		assert!(ch.params.is_some());
		ch.state = ChannelState::Running;
	}

	/// Set the halt reason, returns true if the hardware needs to be asked to halt
	pub fn request_halt(&mut self, h: &ChannelHandle, status: HaltStatus) -> bool {
		let ch = &mut self.channels[h.0];
		ch.halt_status = status;
		match ch.state
		{
		ChannelState::Running => {
			ch.state = ChannelState::Halting;
			true
			},
		ChannelState::Halting => false,
		ChannelState::Assigned => false,
		ChannelState::Free => panic!("request_halt on free channel {}", h.0),
		}
	}

	/// Convert a handle for a channel the hardware has reported as halted
	pub(crate) fn halted(&self, h: ChannelHandle) -> HaltedChannel {
		let st = self.channels[h.0].state;
		assert!(st == ChannelState::Running || st == ChannelState::Halting, "halted: channel {} in state {:?}", h.0, st);
		HaltedChannel(h)
	}
	/// Convert a handle for a channel that was never started
	pub(crate) fn unstarted(&self, h: ChannelHandle) -> HaltedChannel {
		let st = self.channels[h.0].state;
		assert!(st == ChannelState::Assigned, "unstarted: channel {} in state {:?}", h.0, st);
		HaltedChannel(h)
	}

	/// Return a channel to the free list
	pub fn release(&mut self, h: HaltedChannel)
	{
		let idx = (h.0).0;
		::core::mem::forget(h);
		let ch = &mut self.channels[idx];
		if ch.state == ChannelState::Free {
			panic!("Releasing an unused handle (channel {})", idx);
		}
		log_trace!("release: #{} ({:?})", idx, ch.halt_status);
		ch.state = ChannelState::Free;
		ch.qh = None;
		ch.halt_status = HaltStatus::NoHaltStatus;
		self.free_list.push_back(idx);
	}

	/// Check that every channel is either free (and listed once) or owned
	pub fn check_invariants(&self) -> bool
	{
		let mut seen = [false; crate::config::MAX_HOST_CHANNELS as usize];
		for &i in self.free_list.iter() {
			if i >= self.channels.len() || seen[i] || self.channels[i].state != ChannelState::Free {
				return false;
			}
			seen[i] = true;
		}
		let owned = self.channels.iter().filter(|c| c.state != ChannelState::Free).count();
		owned + self.free_list.len() == self.channels.len()
			&& self.channels.iter().all(|c| (c.state == ChannelState::Free) == c.qh.is_none())
	}
}
