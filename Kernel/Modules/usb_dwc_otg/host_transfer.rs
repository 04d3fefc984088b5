//! HostInner channel assignment and programming
use ::kernel::prelude::*;
use ::usb_core::host::{EndpointType, Direction, Speed, TransferStatus};
use ::usb_core::hw_decls::DeviceRequest;
use crate::desc_pools::QhId;
use crate::queue::{Qh, Qtd, QhState, ControlPhase};
use crate::hw_structs::{Hardware, ChannelParams, ChannelData, SplitParams, SplitPos, Pid, ProgramError};
use crate::hw_regs::SPLIT_ISOC_OUT_MAX;
use super::host_queuemgmt::TransactionType;

impl<H: Hardware> super::HostInner<H>
{
	/// Give a queue head a channel, and compute the programming for its first QTD
	pub(crate) fn assign_and_init_hc(&mut self, id: QhId) -> bool
	{
		let ch = match self.channels.acquire(id)
			{
			Some(c) => c,
			None => return false,
			};
		let params = {
			let qh = self.qh_pool.get(id);
			match qh.qtds.front()
			{
			Some(qtd) => self.build_channel_params(qh, qtd),
			None => {
				log_error!("BUG: assign_and_init_hc({:?}) with no queued transfers", id);
				let h = self.channels.unstarted(ch);
				self.channels.release(h);
				self.qh_remove(id);
				return false;
				},
			}
			};
		log_debug!("assign_and_init_hc({:?}): ch{} {:?} len={} pkts={} {:?}{}", id, ch.index(), params.direction, params.xfer_len, params.num_packets, params.pid,
			match params.split { Some(ref s) => if s.complete_split { " CSPLIT" } else { " SSPLIT" }, None => "" });
		self.channels.set_params(&ch, params);
		let qh = self.qh_pool.get_mut(id);
		qh.channel = Some(ch);
		if let Some(qtd) = qh.qtds.front_mut() {
			qtd.in_progress = true;
		}
		self.qh_move(id, QhState::Assigned);
		true
	}

	/// Work out the channel programming for the next transaction of `qtd`
	pub(crate) fn build_channel_params(&self, qh: &Qh, qtd: &Qtd) -> ChannelParams
	{
		let max_packet = ::core::cmp::max(qh.max_packet as u32, 1);
		let mut direction = qh.direction();
		let pid;
		let data;
		let mut xfer_len: u32;
		match qh.ep_type
		{
		EndpointType::Control => {
			let data_dir = match qtd.setup
				{
				Some(ref s) => DeviceRequest::from_bytes(s).direction(),
				None => Direction::Out,
				};
			match qtd.control_phase
			{
			ControlPhase::Setup => {
				direction = Direction::Out;
				pid = Pid::Setup;
				let setup = qtd.setup.unwrap_or([0; 8]);
				log_trace!("build_channel_params: SETUP {:?}", HexDump(&setup));
				data = ChannelData::Setup(setup);
				xfer_len = 8;
				},
			ControlPhase::Data => {
				direction = data_dir;
				pid = qtd.data_toggle;
				data = ChannelData::Buffer(qtd.buffer + qtd.actual_length as u64);
				xfer_len = remaining_bytes(qtd);
				},
			ControlPhase::Status => {
				// Opposite direction to the data stage, IN if there was no data stage
				direction = if qtd.length == 0 || data_dir == Direction::Out { Direction::In } else { Direction::Out };
				pid = Pid::Data1;
				data = ChannelData::Buffer(qtd.buffer);
				xfer_len = 0;
				},
			}
			},
		EndpointType::Bulk | EndpointType::Interrupt => {
			pid = qh.data_toggle;
			data = ChannelData::Buffer(qtd.buffer + qtd.actual_length as u64);
			xfer_len = remaining_bytes(qtd);
			},
		EndpointType::Isochronous => {
			pid = if qh.speed == Speed::High {
					match (direction, qh.mult)
					{
					(Direction::In, 3) => Pid::Data2,
					(Direction::In, 2) => Pid::Data1,
					(Direction::In, _) => Pid::Data0,
					(Direction::Out, 1) => Pid::Data0,
					(Direction::Out, _) => Pid::MData,
					}
				}
				else {
					Pid::Data0
				};
			let (offset, length) = match qtd.iso_packets.get(qtd.isoc_frame_index)
				{
				Some(p) => (p.offset, p.length),
				None => (0, 0),
				};
			data = ChannelData::Buffer(qtd.buffer + (offset + qtd.isoc_split_offset) as u64);
			xfer_len = length.saturating_sub(qtd.isoc_split_offset) as u32;
			},
		}

		let split = if qh.do_split {
				let (hub_addr, port) = match qh.tt
					{
					Some(tt) => (tt.hub_addr, tt.port),
					None => (0, 0),
					};
				let mut xact_pos = SplitPos::All;
				if qh.ep_type == EndpointType::Isochronous && direction == Direction::Out {
					xact_pos = qtd.isoc_split_pos;
					if xact_pos == SplitPos::All {
						xact_pos = if xfer_len <= SPLIT_ISOC_OUT_MAX { SplitPos::All } else { SplitPos::Begin };
					}
				}
				Some(SplitParams { hub_addr: hub_addr, port: port, complete_split: qtd.complete_split, xact_pos: xact_pos })
			}
			else {
				None
			};

		let multi_count = if qh.speed == Speed::High && qh.is_periodic() { qh.mult } else { 1 };
		let num_packets;
		if split.is_some()
		{
			// One packet per split, at most 188 bytes per isochronous OUT slice
			num_packets = 1;
			if qtd.complete_split && direction == Direction::Out {
				xfer_len = 0;
			}
			else if direction == Direction::In || xfer_len > max_packet {
				xfer_len = max_packet;
			}
			else if xfer_len > SPLIT_ISOC_OUT_MAX {
				xfer_len = SPLIT_ISOC_OUT_MAX;
			}
		}
		else
		{
			let max_xfer = if qh.is_periodic() {
					multi_count as u32 * max_packet
				}
				else {
					self.config.max_transfer_size
				};
			if xfer_len > max_xfer {
				// Keep to a whole number of packets
				xfer_len = ::core::cmp::max(max_xfer / max_packet, 1) * max_packet;
			}
			let mut n = if xfer_len > 0 { (xfer_len + max_packet - 1) / max_packet } else { 1 };
			if n > self.config.max_packet_count {
				n = self.config.max_packet_count;
				xfer_len = n * max_packet;
			}
			if direction == Direction::In {
				xfer_len = n * max_packet;
			}
			num_packets = n;
		}

		let is_ping_ep = qh.ep_type == EndpointType::Bulk || qh.ep_type == EndpointType::Control;
		ChannelParams {
			dev_addr: qh.key.addr.dev_addr(),
			ep_num: qh.key.addr.endpt(),
			direction: direction,
			ep_type: qh.ep_type,
			speed: qh.speed,
			max_packet: qh.max_packet,
			multi_count: multi_count,
			data: data,
			xfer_len: xfer_len,
			num_packets: num_packets,
			pid: pid,
			do_ping: qh.ping_state && is_ping_ep && split.is_none() && direction == Direction::Out && pid != Pid::Setup,
			split: split,
			odd_frame: qh.is_periodic() && self.frame_number & 1 == 0,
		}
	}

	/// Start channels that have been assigned but not yet programmed
	pub(crate) fn queue_transactions(&mut self, tr_type: TransactionType)
	{
		log_trace!("queue_transactions({:?})", tr_type);
		if tr_type.has_periodic() {
			let pending: Vec<QhId> = self.periodic_assigned.iter().cloned().collect();
			for id in pending {
				self.start_channel(id);
			}
		}
		if tr_type.has_non_periodic() {
			let pending: Vec<QhId> = self.non_periodic_active.iter().cloned()
				.filter(|&id| self.qh_pool.get(id).state == QhState::Assigned)
				.collect();
			for id in pending {
				self.start_channel(id);
			}
		}
	}

	/// Hand an assigned channel's programming to the hardware
	fn start_channel(&mut self, id: QhId)
	{
		let idx = match self.qh_pool.get(id).channel
			{
			Some(ref c) => c.index(),
			None => {
				log_error!("BUG: start_channel({:?}) without a channel", id);
				return ;
				},
			};
		let res = match self.channels.get(idx).and_then(|c| c.params())
			{
			Some(p) => self.hw.program_channel(idx, p),
			None => Err(ProgramError::Fault),
			};
		match res
		{
		Ok( () ) => {
			if let Some(ref c) = self.qh_pool.get(id).channel {
				self.channels.mark_running(c);
			}
			self.stats.transactions_started += 1;
			self.qh_move(id, QhState::Queued);
			},
		Err(ProgramError::Deferred) => {
			log_debug!("start_channel({:?}): ch{} deferred", id, idx);
			self.stats.deferred_starts += 1;
			},
		Err(ProgramError::Fault) => {
			log_error!("start_channel({:?}): ch{} rejected programming", id, idx);
			let qh = self.qh_pool.get_mut(id);
			let ch = qh.channel.take();
			let qtd = qh.qtds.pop_front();
			if let Some(ch) = ch {
				let h = self.channels.unstarted(ch);
				self.channels.release(h);
			}
			if let Some(qtd) = qtd {
				self.complete_qtd(qtd, TransferStatus::Io);
			}
			self.qh_deactivate(id, false);
			},
		}
	}
}

/// Bytes still to move, saturated to what a channel programming can hold
fn remaining_bytes(qtd: &Qtd) -> u32
{
	let rem = qtd.length.saturating_sub(qtd.actual_length);
	::core::cmp::min(rem, u32::MAX as usize) as u32
}
