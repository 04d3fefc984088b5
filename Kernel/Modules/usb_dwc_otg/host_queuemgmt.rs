//! HostInner schedule management
//!
//! Queue heads move between six lists according to their `QhState`. Periodic QHs also hold a
//! bus time and channel reservation for as long as they are on any list.
use ::kernel::prelude::*;
use ::usb_core::host::{EndpointType, Direction, Speed};
use crate::desc_pools::QhId;
use crate::queue::QhState;
use crate::hw_structs::Hardware;
use crate::frame::{frame_num_le, frame_num_inc, SCHEDULE_SLOP};
use crate::usb_host::SubmitError;

/// Microframes a split control endpoint is held off after a NAK
const CONTROL_NAK_HOLDOFF: u16 = 8;
/// Periodic bus time budget per microframe (high speed port)
const MAX_PERIODIC_USECS_HS: u16 = 100;
/// Periodic bus time budget per frame (full/low speed port)
const MAX_PERIODIC_USECS_FS: u16 = 900;

/// Classes of transaction that have work assigned to channels
#[derive(Copy,Clone,PartialEq,Eq,Debug)]
pub enum TransactionType
{
	None,
	NonPeriodic,
	Periodic,
	All,
}
impl TransactionType
{
	fn with(self, other: TransactionType) -> TransactionType {
		match (self, other)
		{
		(TransactionType::None, v) | (v, TransactionType::None) => v,
		(a, b) if a == b => a,
		_ => TransactionType::All,
		}
	}
	pub fn has_periodic(&self) -> bool {
		match *self
		{
		TransactionType::Periodic | TransactionType::All => true,
		_ => false,
		}
	}
	pub fn has_non_periodic(&self) -> bool {
		match *self
		{
		TransactionType::NonPeriodic | TransactionType::All => true,
		_ => false,
		}
	}
}

/// Queue head list management
impl<H: Hardware> super::HostInner<H>
{
	fn list_for(&mut self, periodic: bool, state: QhState) -> Option<&mut VecDeque<QhId>>
	{
		match (periodic, state)
		{
		(_, QhState::Idle) => None,
		(false, QhState::Inactive) | (false, QhState::Ready) => Some(&mut self.non_periodic_inactive),
		(false, QhState::Assigned) | (false, QhState::Queued) => Some(&mut self.non_periodic_active),
		(true, QhState::Inactive) => Some(&mut self.periodic_inactive),
		(true, QhState::Ready) => Some(&mut self.periodic_ready),
		(true, QhState::Assigned) => Some(&mut self.periodic_assigned),
		(true, QhState::Queued) => Some(&mut self.periodic_queued),
		}
	}

	/// Move a queue head to the tail of the list for state `to`
	pub(crate) fn qh_move(&mut self, id: QhId, to: QhState)
	{
		let (periodic, from) = {
			let qh = self.qh_pool.get(id);
			(qh.is_periodic(), qh.state)
			};
		log_trace!("qh_move({:?}): {:?} -> {:?}", id, from, to);
		if let Some(l) = self.list_for(periodic, from)
		{
			match l.iter().position(|&v| v == id)
			{
			Some(p) => { l.remove(p); },
			None => panic!("BUG: {:?} in state {:?} but not on its list", id, from),
			}
		}
		if let Some(l) = self.list_for(periodic, to)
		{
			assert!( !l.contains(&id), "BUG: {:?} already on the {:?} list", id, to );
			l.push_back(id);
		}
		self.qh_pool.get_mut(id).state = to;
	}

	/// Check a periodic QH fits in the remaining reservations
	fn check_periodic_admission(&self, id: QhId) -> Result<(), SubmitError>
	{
		let qh = self.qh_pool.get(id);
		let periodic_limit = self.config.host_channels - self.config.periodic_reserve;
		if self.periodic_channels >= periodic_limit {
			log_notice!("{:?}: no periodic channel available ({} in use)", id, self.periodic_channels);
			return Err(SubmitError::NoPeriodicChannel);
		}
		let max_usecs = if self.port_speed == Speed::High { MAX_PERIODIC_USECS_HS } else { MAX_PERIODIC_USECS_FS };
		if self.periodic_usecs as u32 + qh.usecs as u32 > max_usecs as u32 {
			log_notice!("{:?}: {}us would exceed periodic bandwidth ({}/{}us used)", id, qh.usecs, self.periodic_usecs, max_usecs);
			return Err(SubmitError::NoPeriodicBandwidth);
		}
		if qh.max_periodic_bytes() > self.config.max_transfer_size {
			log_notice!("{:?}: {} bytes per frame exceeds max_transfer_size", id, qh.max_periodic_bytes());
			return Err(SubmitError::PacketTooLarge);
		}
		Ok( () )
	}

	/// Place an idle queue head onto the schedule
	pub(crate) fn qh_add(&mut self, id: QhId) -> Result<(), SubmitError>
	{
		if self.qh_pool.get(id).state != QhState::Idle {
			return Ok( () );
		}
		if !self.qh_pool.get(id).is_periodic() {
			self.qh_move(id, QhState::Inactive);
			return Ok( () );
		}

		self.check_periodic_admission(id)?;
		let frame = self.frame_number;
		let qh = self.qh_pool.get_mut(id);
		qh.sched_frame = frame_num_inc(frame, SCHEDULE_SLOP);
		if qh.do_split {
			// Start-splits go out in the last microframe before the target frame
			qh.sched_frame |= 7;
		}
		qh.start_split_frame = qh.sched_frame;
		qh.periodic_reserved = true;
		let usecs = qh.usecs;
		log_debug!("qh_add({:?}): periodic sched_frame={:#x} interval={} {}us", id, qh.sched_frame, qh.interval, usecs);
		self.periodic_channels += 1;
		self.periodic_usecs += usecs;
		self.qh_move(id, QhState::Inactive);
		Ok( () )
	}

	/// Take a queue head off the schedule, returning its periodic reservations
	pub(crate) fn qh_remove(&mut self, id: QhId)
	{
		if self.qh_pool.get(id).state == QhState::Idle {
			return ;
		}
		self.qh_move(id, QhState::Idle);
		let qh = self.qh_pool.get_mut(id);
		if qh.periodic_reserved {
			qh.periodic_reserved = false;
			let usecs = qh.usecs;
			self.periodic_channels -= 1;
			self.periodic_usecs -= usecs;
		}
		log_debug!("qh_remove({:?})", id);
	}

	/// Reschedule a queue head after its channel has been returned
	///
	/// `continue_split` is set when the next transaction is the continuation of a split (a
	/// complete-split, or the next slice of an isochronous OUT payload), which must run as
	/// soon as possible rather than at the next interval.
	pub(crate) fn qh_deactivate(&mut self, id: QhId, continue_split: bool)
	{
		let frame = self.frame_number;
		let (periodic, empty) = {
			let qh = self.qh_pool.get(id);
			assert!(qh.channel.is_none(), "qh_deactivate({:?}) with channel held", id);
			(qh.is_periodic(), qh.qtds.is_empty())
			};
		if !periodic
		{
			if empty {
				let qh = self.qh_pool.get_mut(id);
				if qh.do_split {
					qh.nak_frame = None;
				}
				self.qh_remove(id);
			}
			else {
				self.qh_move(id, QhState::Inactive);
			}
		}
		else
		{
			let qh = self.qh_pool.get_mut(id);
			if qh.do_split
			{
				if continue_split {
					let isoc_out = qh.ep_type == EndpointType::Isochronous && qh.direction() == Direction::Out;
					qh.sched_frame = frame;
					// The complete-split can't go in the microframe right after the start-split
					if frame_num_le(frame, frame_num_inc(qh.start_split_frame, 1)) && !isoc_out {
						qh.sched_frame = frame_num_inc(qh.sched_frame, 1);
					}
				}
				else {
					qh.sched_frame = frame_num_inc(qh.start_split_frame, qh.interval);
					if frame_num_le(qh.sched_frame, frame) {
						qh.sched_frame = frame;
					}
					qh.sched_frame |= 7;
					qh.start_split_frame = qh.sched_frame;
				}
			}
			else
			{
				qh.sched_frame = frame_num_inc(qh.sched_frame, qh.interval);
				if frame_num_le(qh.sched_frame, frame) {
					qh.sched_frame = frame;
				}
			}
			let sched_frame = qh.sched_frame;
			log_trace!("qh_deactivate({:?}): sched_frame={:#x} (now {:#x})", id, sched_frame, frame);

			if empty {
				self.qh_remove(id);
			}
			else if frame_num_le(sched_frame, frame) {
				self.qh_move(id, QhState::Ready);
			}
			else {
				self.qh_move(id, QhState::Inactive);
			}
		}

		if empty && self.qh_pool.get(id).disable_pending {
			self.qh_free(id);
		}
	}

	/// Release an idle queue head entirely
	pub(crate) fn qh_free(&mut self, id: QhId)
	{
		let qh = self.qh_pool.get(id);
		assert!(qh.state == QhState::Idle && qh.qtds.is_empty() && qh.channel.is_none());
		let key = qh.key;
		self.endpoints.remove(&key);
		self.qh_pool.release(id);
		log_debug!("qh_free({:?}): {:?}", id, key);
	}
}

/// Transaction selection
impl<H: Hardware> super::HostInner<H>
{
	/// Advance the frame counter, moving periodic QHs that are due onto the ready list
	pub(crate) fn on_frame_tick(&mut self, frame: u16)
	{
		self.frame_number = frame & crate::hw_regs::HFNUM_MAX_FRNUM;
		let due: Vec<QhId> = self.periodic_inactive.iter().cloned()
			.filter(|&id| frame_num_le(self.qh_pool.get(id).sched_frame, self.frame_number))
			.collect();
		for id in due {
			self.qh_move(id, QhState::Ready);
		}
		self.schedule();
	}

	/// Select and start whatever work the free channels allow
	pub(crate) fn schedule(&mut self)
	{
		let tr_type = self.select_transactions();
		if tr_type != TransactionType::None {
			self.queue_transactions(tr_type);
		}
	}

	/// Assign free channels to ready work: periodic first, then non-periodic in FIFO order
	pub(crate) fn select_transactions(&mut self) -> TransactionType
	{
		let mut rv = TransactionType::None;

		let ready: Vec<QhId> = self.periodic_ready.iter().cloned().collect();
		for id in ready
		{
			if self.channels.available() == 0 {
				break;
			}
			if self.assign_and_init_hc(id) {
				rv = rv.with(TransactionType::Periodic);
			}
		}

		let inactive: Vec<QhId> = self.non_periodic_inactive.iter().cloned().collect();
		for id in inactive
		{
			if self.channels.available() == 0 {
				break;
			}
			// Channels held back for periodic reservations
			let np_limit = self.channels.total() - self.periodic_channels as usize;
			if self.non_periodic_active.len() >= np_limit {
				break;
			}
			let frame = self.frame_number;
			let holdoff = self.config.nak_holdoff;
			let qh = self.qh_pool.get_mut(id);
			if let Some(nak_frame) = qh.nak_frame
			{
				let holdoff = if qh.ep_type == EndpointType::Bulk { holdoff } else { CONTROL_NAK_HOLDOFF };
				if frame_num_le(frame, frame_num_inc(nak_frame, holdoff)) {
					self.stats.nak_holdoffs += 1;
					continue ;
				}
				qh.nak_frame = None;
			}
			if self.assign_and_init_hc(id) {
				rv = rv.with(TransactionType::NonPeriodic);
			}
		}

		// Anything still waiting on a deferred start
		if !self.periodic_assigned.is_empty() {
			rv = rv.with(TransactionType::Periodic);
		}
		if self.non_periodic_active.iter().any(|&id| self.qh_pool.get(id).state == QhState::Assigned) {
			rv = rv.with(TransactionType::NonPeriodic);
		}
		rv
	}
}
