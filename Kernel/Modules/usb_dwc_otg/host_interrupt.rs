//! HostInner channel halt handling
//!
//! Every channel event is a halt. The condition bits are decoded into a single
//! `ChannelCondition`, the matching handler updates the queue head and transfer state and picks
//! a `HaltStatus`, then `release_channel` decides whether the transfer is finished, returns the
//! channel and reschedules the queue head.
use ::kernel::prelude::*;
use ::usb_core::host::{EndpointType, Direction, Speed, TransferStatus, IsoPacketResult};
use crate::desc_pools::{QhId, HaltStatus, ChannelState};
use crate::queue::{Qh, Qtd, ControlPhase, DoneRequest};
use crate::hw_structs::{Hardware, ChannelParams, TransferState, Pid, SplitPos};
use crate::hw_regs::{ChannelCondition, HcIntBits, SPLIT_ISOC_OUT_MAX};
use crate::frame::full_frame_num;

/// Consecutive transaction errors before a transfer is failed
pub const MAX_ERROR_COUNT: u8 = 3;

impl<H: Hardware> super::HostInner<H>
{
	/// A channel has halted, `bits` are its (already acknowledged) interrupt conditions
	pub(crate) fn on_channel_complete(&mut self, index: usize, bits: u32)
	{
		log_trace!("on_channel_complete({}): {:?}", index, HcIntBits(bits));
		let (qh_id, halt_status) = match self.channels.get(index)
			{
			Some(ch) if ch.state() == ChannelState::Running || ch.state() == ChannelState::Halting => match ch.qh()
				{
				Some(qh) => (qh, ch.halt_status()),
				None => {
					log_warning!("on_channel_complete: channel {} has no owner", index);
					self.stats.stray_interrupts += 1;
					return ;
					},
				},
			Some(ch) => {
				log_warning!("on_channel_complete: stray interrupt on channel {} ({:?}) {:?}", index, ch.state(), HcIntBits(bits));
				self.stats.stray_interrupts += 1;
				return ;
				},
			None => {
				log_warning!("on_channel_complete: channel {} out of range", index);
				self.stats.stray_interrupts += 1;
				return ;
				},
			};

		let cond = ChannelCondition::decode(bits);
		if halt_status == HaltStatus::UrbDequeue {
			// The transfer was already completed by the cancel, only the channel needs cleaning up
			log_debug!("on_channel_complete({}): dequeue halt for {:?} ({:?})", index, qh_id, cond);
			self.stats.record_halt(HaltStatus::UrbDequeue);
			self.release_channel(qh_id, None, HaltStatus::UrbDequeue);
			return ;
		}

		let params = self.channels.get(index).and_then(|c| c.params()).cloned();
		let qtd = {
			let qh = self.qh_pool.get_mut(qh_id);
			match qh.qtds.pop_front()
			{
			Some(q) if q.in_progress => Some(q),
			Some(q) => { qh.qtds.push_front(q); None },
			None => None,
			}
			};
		let (mut qtd, params) = match (qtd, params)
			{
			(Some(q), Some(p)) => (q, p),
			(q, _) => {
				log_error!("BUG: on_channel_complete({}): {:?} has no transfer in progress", index, qh_id);
				if let Some(q) = q {
					self.qh_pool.get_mut(qh_id).qtds.push_front(q);
				}
				self.release_channel(qh_id, None, HaltStatus::NoHaltStatus);
				return ;
				},
			};

		let residue = self.hw.transfer_state(index);
		let frame = self.frame_number;
		let halt = {
			let mut ctx = HaltCtx {
				qh: self.qh_pool.get_mut(qh_id),
				qtd: &mut qtd,
				params: &params,
				residue: residue,
				frame: frame,
				};
			ctx.classify(cond)
			};
		log_debug!("on_channel_complete({}): {:?} {:?} -> {:?}", index, qh_id, cond, halt);
		self.stats.record_halt(halt);
		self.release_channel(qh_id, Some(qtd), halt);
	}

	/// Finish with a halted channel
	///
	/// `qtd` is the transfer the channel was working on (`None` if it was already removed). It is
	/// completed or put back at the head of the queue depending on `halt`.
	pub(crate) fn release_channel(&mut self, qh_id: QhId, qtd: Option<Qtd>, halt: HaltStatus)
	{
		let mut continue_split = false;
		if let Some(mut qtd) = qtd
		{
			let status = match halt
				{
				HaltStatus::UrbComplete
				| HaltStatus::AhbErr
				| HaltStatus::Stall
				| HaltStatus::BabbleErr
				| HaltStatus::FrameOverrun => Some(qtd.status.unwrap_or(TransferStatus::Io)),
				HaltStatus::XactErr if qtd.error_count >= MAX_ERROR_COUNT => {
					log_notice!("{:?}: {:?} failed after {} transaction errors", qh_id, qtd.handle, qtd.error_count);
					Some(TransferStatus::Protocol)
					},
				HaltStatus::PeriodicIncomplete => Some(TransferStatus::Io),
				_ => None,
				};
			match status
			{
			Some(st) => self.complete_qtd(qtd, st),
			None => {
				continue_split = qtd.complete_split || qtd.isoc_split_pos == SplitPos::Mid || qtd.isoc_split_pos == SplitPos::End;
				qtd.in_progress = false;
				self.qh_pool.get_mut(qh_id).qtds.push_front(qtd);
				},
			}
		}

		match self.qh_pool.get_mut(qh_id).channel.take()
		{
		Some(ch) => {
			let h = self.channels.halted(ch);
			self.channels.release(h);
			},
		None => log_error!("BUG: release_channel({:?}) without a channel", qh_id),
		}
		self.qh_deactivate(qh_id, continue_split);
		self.schedule();
	}

	/// Queue a finished transfer for delivery
	pub(crate) fn complete_qtd(&mut self, qtd: Qtd, status: TransferStatus)
	{
		log_debug!("complete_qtd: {:?} {:?}", qtd, status);
		self.stats.requests_completed += 1;
		if !status.is_success() {
			self.stats.requests_failed += 1;
		}
		self.done.push( DoneRequest::from_qtd(qtd, status) );
	}
}

/// State for classifying one channel halt
struct HaltCtx<'a>
{
	qh: &'a mut Qh,
	qtd: &'a mut Qtd,
	params: &'a ChannelParams,
	residue: TransferState,
	frame: u16,
}

impl<'a> HaltCtx<'a>
{
	fn is_in(&self) -> bool {
		self.params.direction == Direction::In
	}
	fn is_split(&self) -> bool {
		self.params.split.is_some()
	}
	fn ep_type(&self) -> EndpointType {
		self.params.ep_type
	}

	fn classify(&mut self, cond: ChannelCondition) -> HaltStatus
	{
		match cond
		{
		ChannelCondition::AhbError => self.handle_ahberr(),
		ChannelCondition::XferComplete { nyet } => {
			if self.is_split() && self.ep_type() == EndpointType::Isochronous && !self.is_in() {
				// Isochronous OUT start-splits only report completion, the ACK is implied
				self.handle_ack();
			}
			self.handle_xfercomp(nyet)
			},
		ChannelCondition::Stall => self.handle_stall(),
		ChannelCondition::XactError => self.handle_xacterr(),
		ChannelCondition::Babble => self.handle_babble(),
		ChannelCondition::FrameOverrun => self.handle_frmovrun(),
		ChannelCondition::DataToggleError => self.handle_datatglerr(),
		ChannelCondition::Nyet => self.handle_nyet(),
		ChannelCondition::Nak => self.handle_nak(),
		ChannelCondition::Ack => self.handle_ack(),
		ChannelCondition::Unknown => self.handle_unknown(),
		}
	}

	/// Bytes moved by this programming, and if an IN transfer ended short
	fn actual_xfer_length(&self, halt: HaltStatus) -> (usize, bool)
	{
		if halt == HaltStatus::Complete {
			if self.is_in() {
				let rem = self.residue.remaining_bytes;
				(self.params.xfer_len.saturating_sub(rem) as usize, rem != 0)
			}
			else if self.is_split() {
				(self.qtd.ssplit_out_xfer_count as usize, false)
			}
			else {
				(self.params.xfer_len as usize, false)
			}
		}
		else {
			// Only whole packets count when the channel stopped early
			let packets = self.params.num_packets.saturating_sub(self.residue.remaining_packets);
			(packets as usize * self.params.max_packet as usize, false)
		}
	}

	/// Account a completed programming, returns true if the transfer is done
	fn update_urb_state_xfer_comp(&mut self) -> bool
	{
		let (len, short_read) = self.actual_xfer_length(HaltStatus::Complete);
		self.qtd.add_actual(len);
		let max_packet = ::core::cmp::max(self.params.max_packet as usize, 1);
		let qtd = &*self.qtd;
		let zlp_pending = len != 0
			&& self.ep_type() == EndpointType::Bulk
			&& !self.is_in()
			&& qtd.flags.zero_packet
			&& qtd.actual_length == qtd.length
			&& qtd.length % max_packet == 0
			;
		let done = !zlp_pending && (short_read || qtd.actual_length >= qtd.length);
		log_trace!("update_urb_state_xfer_comp: +{} = {}/{} short={} done={}", len, qtd.actual_length, qtd.length, short_read, done);
		done
	}

	/// Account the whole packets moved before an early halt
	fn update_urb_state_xfer_intr(&mut self, halt: HaltStatus)
	{
		match self.ep_type()
		{
		EndpointType::Isochronous => return,
		EndpointType::Control if self.qtd.control_phase != ControlPhase::Data => return,
		_ => {},
		}
		let (len, _) = self.actual_xfer_length(halt);
		self.qtd.add_actual(len);
	}

	/// Store the toggle the next packet should use
	fn save_data_toggle(&mut self)
	{
		let pid = match self.residue.next_pid
			{
			Pid::Data1 => Pid::Data1,
			_ => Pid::Data0,
			};
		match self.ep_type()
		{
		EndpointType::Control => if self.qtd.control_phase == ControlPhase::Data {
			self.qtd.data_toggle = pid;
			},
		EndpointType::Bulk | EndpointType::Interrupt => self.qh.data_toggle = pid,
		EndpointType::Isochronous => {},
		}
	}

	/// Record the result of the current isochronous frame and advance to the next
	fn update_isoc_urb_state(&mut self, halt: HaltStatus) -> HaltStatus
	{
		let idx = self.qtd.isoc_frame_index;
		let frame_len = match self.qtd.iso_packets.get(idx)
			{
			Some(p) => p.length,
			None => {
				self.qtd.status = Some(TransferStatus::Success);
				return HaltStatus::UrbComplete;
				},
			};
		// Bytes already collected by complete-splits for this frame
		let split_in = self.is_split() && self.is_in();
		let collected = if split_in { self.qtd.iso_results[idx].actual_length } else { 0 };
		let (status, actual) = match halt
			{
			HaltStatus::Complete => {
				// Split OUT payloads are only complete once every slice was sent
				let len = if self.is_split() && !self.is_in() { frame_len } else { self.actual_xfer_length(HaltStatus::Complete).0 };
				(TransferStatus::Success, len)
				},
			HaltStatus::FrameOverrun => (if self.is_in() { TransferStatus::IsoOverrun } else { TransferStatus::IsoUnderrun }, collected),
			HaltStatus::BabbleErr => (TransferStatus::Overflow, collected),
			_ if split_in => (TransferStatus::Protocol, collected),
			_ => (TransferStatus::Protocol, self.actual_xfer_length(HaltStatus::XactErr).0),
			};
		log_trace!("update_isoc_urb_state: frame {}/{} {:?} {}", idx, self.qtd.iso_packets.len(), status, actual);
		self.qtd.iso_results[idx] = IsoPacketResult { status: status, actual_length: ::core::cmp::min(actual, frame_len) };
		if !status.is_success() {
			self.qtd.error_packets += 1;
		}
		self.qtd.isoc_frame_index += 1;
		self.qtd.complete_split = false;
		self.qtd.isoc_split_pos = SplitPos::All;
		self.qtd.isoc_split_offset = 0;

		if self.qtd.isoc_frame_index >= self.qtd.iso_packets.len() {
			self.qtd.status = Some(TransferStatus::Success);
			HaltStatus::UrbComplete
		}
		else {
			HaltStatus::Complete
		}
	}

	fn complete_non_periodic_xfer(&mut self, halt: HaltStatus, nyet: bool) -> HaltStatus
	{
		self.qtd.error_count = 0;
		if nyet {
			// The endpoint has no room for more yet, start the next OUT with a PING
			self.qh.ping_state = true;
		}
		halt
	}
	fn complete_periodic_xfer(&mut self, halt: HaltStatus) -> HaltStatus
	{
		self.qtd.error_count = 0;
		halt
	}

	fn handle_xfercomp(&mut self, nyet: bool) -> HaltStatus
	{
		if self.is_split() {
			if self.ep_type() == EndpointType::Isochronous && self.is_in() && self.qtd.complete_split {
				return self.handle_xfercomp_isoc_split_in();
			}
			self.qtd.complete_split = false;
		}

		match self.ep_type()
		{
		EndpointType::Control => {
			let hs = match self.qtd.control_phase
				{
				ControlPhase::Setup => {
					self.qtd.control_phase = if self.qtd.length > 0 { ControlPhase::Data } else { ControlPhase::Status };
					self.qtd.data_toggle = Pid::Data1;
					HaltStatus::Complete
					},
				ControlPhase::Data => {
					if self.update_urb_state_xfer_comp() {
						self.qtd.control_phase = ControlPhase::Status;
					}
					else {
						self.save_data_toggle();
					}
					HaltStatus::Complete
					},
				ControlPhase::Status => {
					self.qtd.status = Some(TransferStatus::Success);
					HaltStatus::UrbComplete
					},
				};
			self.complete_non_periodic_xfer(hs, nyet)
			},
		EndpointType::Bulk => {
			let done = self.update_urb_state_xfer_comp();
			self.save_data_toggle();
			let hs = if done {
					self.qtd.status = Some(TransferStatus::Success);
					HaltStatus::UrbComplete
				}
				else {
					HaltStatus::Complete
				};
			self.complete_non_periodic_xfer(hs, nyet)
			},
		EndpointType::Interrupt => {
			let done = self.update_urb_state_xfer_comp();
			self.save_data_toggle();
			let hs = if done {
					self.qtd.status = Some(TransferStatus::Success);
					HaltStatus::UrbComplete
				}
				else {
					HaltStatus::Complete
				};
			self.complete_periodic_xfer(hs)
			},
		EndpointType::Isochronous => {
			let hs = if self.qtd.isoc_split_pos == SplitPos::All {
					self.update_isoc_urb_state(HaltStatus::Complete)
				}
				else {
					HaltStatus::Complete
				};
			self.complete_periodic_xfer(hs)
			},
		}
	}

	/// Complete-split data for a full speed isochronous IN frame
	fn handle_xfercomp_isoc_split_in(&mut self) -> HaltStatus
	{
		let (len, _) = self.actual_xfer_length(HaltStatus::Complete);
		if len == 0 {
			// Nothing this time, go back to a start-split
			self.qtd.complete_split = false;
			self.qtd.isoc_split_offset = 0;
			return HaltStatus::NoHaltStatus;
		}
		let idx = self.qtd.isoc_frame_index;
		let frame_len = match self.qtd.iso_packets.get(idx)
			{
			Some(p) => p.length,
			None => return HaltStatus::NoHaltStatus,
			};
		let total = ::core::cmp::min(self.qtd.iso_results[idx].actual_length + len, frame_len);
		self.qtd.iso_results[idx].actual_length = total;
		self.qtd.isoc_split_offset += len;
		if total >= frame_len {
			self.qtd.iso_results[idx].status = TransferStatus::Success;
			self.qtd.isoc_frame_index += 1;
			self.qtd.complete_split = false;
			self.qtd.isoc_split_offset = 0;
		}
		if self.qtd.isoc_frame_index >= self.qtd.iso_packets.len() {
			self.qtd.status = Some(TransferStatus::Success);
			HaltStatus::UrbComplete
		}
		else {
			HaltStatus::NoHaltStatus
		}
	}

	fn handle_ahberr(&mut self) -> HaltStatus
	{
		log_error!("AHB error on {:?} (ch {}:{} {:?} len={})", self.qtd.handle, self.params.dev_addr, self.params.ep_num, self.params.ep_type, self.params.xfer_len);
		self.qtd.status = Some(TransferStatus::Io);
		HaltStatus::AhbErr
	}

	fn handle_stall(&mut self) -> HaltStatus
	{
		self.update_urb_state_xfer_intr(HaltStatus::Stall);
		match self.ep_type()
		{
		EndpointType::Bulk | EndpointType::Interrupt => {
			// Clearing the halt on the device resets its toggle too
			self.qh.data_toggle = Pid::Data0;
			},
		EndpointType::Control | EndpointType::Isochronous => {},
		}
		self.qtd.status = Some(TransferStatus::Stall);
		HaltStatus::Stall
	}

	fn handle_nak(&mut self) -> HaltStatus
	{
		let ep_type = self.ep_type();
		let non_periodic = ep_type == EndpointType::Bulk || ep_type == EndpointType::Control;
		if self.is_split()
		{
			if non_periodic {
				self.qh.nak_frame = Some(self.frame);
			}
			if self.qtd.complete_split {
				self.qtd.error_count = 0;
			}
			// An OUT complete-split NAK means the hub is still busy with the data, ask again
			let retry_csplit = self.qtd.complete_split && !self.is_in() && non_periodic;
			if !retry_csplit {
				self.qtd.complete_split = false;
			}
			return HaltStatus::Nak;
		}

		match ep_type
		{
		EndpointType::Control | EndpointType::Bulk => {
			self.qtd.error_count = 0;
			if !self.qh.ping_state {
				self.update_urb_state_xfer_intr(HaltStatus::Nak);
				self.save_data_toggle();
				if self.params.speed == Speed::High && !self.is_in() {
					self.qh.ping_state = true;
				}
			}
			HaltStatus::Nak
			},
		EndpointType::Interrupt => {
			self.qtd.error_count = 0;
			HaltStatus::Nak
			},
		EndpointType::Isochronous => {
			log_warning!("NAK on isochronous {:?}", self.qtd.handle);
			self.update_isoc_urb_state(HaltStatus::XactErr)
			},
		}
	}

	fn handle_ack(&mut self) -> HaltStatus
	{
		if self.is_split()
		{
			if !self.is_in() && self.params.pid != Pid::Setup {
				self.qtd.ssplit_out_xfer_count = self.params.xfer_len;
			}
			if !(self.ep_type() == EndpointType::Isochronous && !self.is_in()) {
				// Start-split accepted by the hub, collect the result with a complete-split
				self.qtd.complete_split = true;
			}
			else {
				let pos = match self.params.split { Some(ref s) => s.xact_pos, None => SplitPos::All };
				match pos
				{
				SplitPos::All => {},
				SplitPos::End => {
					self.qtd.isoc_split_pos = SplitPos::All;
					self.qtd.isoc_split_offset = 0;
					},
				SplitPos::Begin | SplitPos::Mid => {
					let max = SPLIT_ISOC_OUT_MAX as usize;
					self.qtd.isoc_split_offset += max;
					let frame_len = self.qtd.iso_packets.get(self.qtd.isoc_frame_index).map(|p| p.length).unwrap_or(0);
					self.qtd.isoc_split_pos = if frame_len.saturating_sub(self.qtd.isoc_split_offset) <= max { SplitPos::End } else { SplitPos::Mid };
					},
				}
			}
			HaltStatus::Ack
		}
		else
		{
			self.qtd.error_count = 0;
			self.qh.ping_state = false;
			self.update_urb_state_xfer_intr(HaltStatus::Ack);
			self.save_data_toggle();
			HaltStatus::Ack
		}
	}

	fn handle_nyet(&mut self) -> HaltStatus
	{
		if self.is_split()
		{
			let ep_type = self.ep_type();
			if self.qtd.complete_split && ep_type.is_periodic()
				&& full_frame_num(self.frame) != full_frame_num(self.qh.sched_frame)
			{
				// The complete-split window for this frame has passed
				if ep_type == EndpointType::Isochronous {
					return self.update_isoc_urb_state(HaltStatus::FrameOverrun);
				}
				self.qtd.complete_split = false;
				self.qtd.error_count = self.qtd.error_count.saturating_add(1);
				return HaltStatus::XactErr;
			}
			// Not ready yet, retry the complete-split
			return HaltStatus::Nyet;
		}

		self.qh.ping_state = true;
		self.qtd.error_count = 0;
		self.update_urb_state_xfer_intr(HaltStatus::Nyet);
		self.save_data_toggle();
		HaltStatus::Nyet
	}

	fn handle_xacterr(&mut self) -> HaltStatus
	{
		match self.ep_type()
		{
		EndpointType::Control | EndpointType::Bulk => {
			self.qtd.error_count = self.qtd.error_count.saturating_add(1);
			if !self.qh.ping_state {
				self.update_urb_state_xfer_intr(HaltStatus::XactErr);
				self.save_data_toggle();
				if !self.is_split() && !self.is_in() && self.params.speed == Speed::High {
					self.qh.ping_state = true;
				}
			}
			HaltStatus::XactErr
			},
		EndpointType::Interrupt => {
			self.qtd.error_count = self.qtd.error_count.saturating_add(1);
			if self.is_split() && self.qtd.complete_split {
				self.qtd.complete_split = false;
			}
			HaltStatus::XactErr
			},
		EndpointType::Isochronous => self.update_isoc_urb_state(HaltStatus::XactErr),
		}
	}

	fn handle_babble(&mut self) -> HaltStatus
	{
		if self.ep_type() != EndpointType::Isochronous {
			self.update_urb_state_xfer_intr(HaltStatus::BabbleErr);
			self.qtd.status = Some(TransferStatus::Overflow);
			HaltStatus::BabbleErr
		}
		else {
			self.update_isoc_urb_state(HaltStatus::BabbleErr)
		}
	}

	fn handle_frmovrun(&mut self) -> HaltStatus
	{
		match self.ep_type()
		{
		EndpointType::Interrupt => {
			self.qtd.status = Some(TransferStatus::Io);
			HaltStatus::FrameOverrun
			},
		EndpointType::Isochronous => self.update_isoc_urb_state(HaltStatus::FrameOverrun),
		EndpointType::Control | EndpointType::Bulk => {
			log_debug!("Frame overrun on non-periodic {:?}, retrying", self.qtd.handle);
			self.update_urb_state_xfer_intr(HaltStatus::FrameOverrun);
			self.save_data_toggle();
			HaltStatus::NoHaltStatus
			},
		}
	}

	fn handle_datatglerr(&mut self) -> HaltStatus
	{
		if self.ep_type() == EndpointType::Isochronous {
			return self.update_isoc_urb_state(HaltStatus::XactErr);
		}
		if !self.is_split() && self.is_in() {
			// Repeated packet, the data was already taken: resume with the corrected toggle
			self.qtd.error_count = 0;
		}
		else {
			if !self.is_split() {
				log_error!("Data toggle error on OUT transfer {:?}", self.qtd.handle);
			}
			self.qtd.error_count = self.qtd.error_count.saturating_add(1);
		}
		self.save_data_toggle();
		self.update_urb_state_xfer_intr(HaltStatus::DataToggleErr);
		HaltStatus::XactErr
	}

	fn handle_unknown(&mut self) -> HaltStatus
	{
		if self.ep_type().is_periodic() {
			log_notice!("Periodic {:?} halted without a known reason", self.qtd.handle);
			HaltStatus::PeriodicIncomplete
		}
		else {
			log_notice!("{:?} halted without a known reason", self.qtd.handle);
			self.qtd.error_count = self.qtd.error_count.saturating_add(1);
			self.update_urb_state_xfer_intr(HaltStatus::XactErr);
			self.save_data_toggle();
			HaltStatus::XactErr
		}
	}
}
