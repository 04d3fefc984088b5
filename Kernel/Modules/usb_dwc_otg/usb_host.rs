//! Public host controller interface
//!
//! `HostController` owns the engine state behind a spinlock. Completion callbacks are queued
//! while the lock is held and invoked after it is released, so a callback may submit or cancel
//! requests on the same controller.
use ::kernel::prelude::*;
use ::kernel::sync::Spinlock;
use ::usb_core::host::{Speed, TransferStatus, Completion};
use crate::hw_structs::{Hardware, Pid};
use crate::queue::{Qh, Qtd, QhState, EndpointKey, TransferRequest, TransferKind};
use crate::desc_pools::{QhId, HaltStatus, ChannelState};
use crate::config::HcdConfig;
use crate::HostInner;

/// Identifies a submitted request until its completion has been delivered
#[derive(Copy,Clone,PartialEq,Eq,PartialOrd,Ord,Hash)]
pub struct RequestHandle(u64);
impl RequestHandle
{
	pub(crate) fn from_raw(v: u64) -> RequestHandle {
		RequestHandle(v)
	}
	pub fn raw(&self) -> u64 {
		self.0
	}
}
impl_fmt! {
	Debug(self, f) for RequestHandle { write!(f, "Req#{}", self.0) }
}

/// Reasons a request is refused by `submit`
#[derive(Copy,Clone,PartialEq,Eq,Debug)]
pub enum SubmitError
{
	/// Isochronous request without any frame descriptors
	ZeroFrames,
	/// Control request without a setup packet
	MissingSetup,
	/// Isochronous frame descriptor outside the buffer
	InvalidPacket,
	/// Zero (or oversized) max packet, or an endpoint already in use with another type
	InvalidEndpoint,
	/// Full/low speed device on a high speed port without a hub to translate
	NoTransactionTranslator,
	/// Periodic bus time would be over-committed
	NoPeriodicBandwidth,
	/// Every channel that periodic endpoints may reserve is taken
	NoPeriodicChannel,
	/// Periodic packet larger than a single channel programming
	PacketTooLarge,
	/// Completion callback does not fit in the inline handle
	CallbackTooLarge,
	/// The controller is being shut down
	ShuttingDown,
}
impl_fmt! {
	Display(self, f) for SubmitError {
		f.write_str(match *self
			{
			SubmitError::ZeroFrames => "isochronous request has no frames",
			SubmitError::MissingSetup => "control request has no setup packet",
			SubmitError::InvalidPacket => "isochronous frame outside the buffer",
			SubmitError::InvalidEndpoint => "invalid endpoint description",
			SubmitError::NoTransactionTranslator => "no transaction translator for split transfers",
			SubmitError::NoPeriodicBandwidth => "insufficient periodic bandwidth",
			SubmitError::NoPeriodicChannel => "no periodic channel available",
			SubmitError::PacketTooLarge => "periodic packet too large",
			SubmitError::CallbackTooLarge => "completion callback too large",
			SubmitError::ShuttingDown => "controller shutting down",
			})
	}
}

/// Engine counters
#[derive(Clone,Default,Debug)]
pub struct Stats
{
	/// Channel programmings accepted by the hardware
	pub transactions_started: u64,
	/// Channel programmings the hardware asked to retry later
	pub deferred_starts: u64,
	pub requests_completed: u64,
	/// Completed with anything other than success
	pub requests_failed: u64,
	/// Completion events for channels that were not running
	pub stray_interrupts: u64,
	/// Times a queue head was skipped because of a recent NAK
	pub nak_holdoffs: u64,
	halts: [u64; HaltStatus::COUNT],
}
impl Stats
{
	pub(crate) fn record_halt(&mut self, status: HaltStatus) {
		self.halts[status.index()] += 1;
	}
	/// Number of channel halts classified as `status`
	pub fn halt_count(&self, status: HaltStatus) -> u64 {
		self.halts[status.index()]
	}
}

pub struct HostController<H: Hardware>
{
	inner: Spinlock<HostInner<H>>,
}

impl<H: Hardware> HostController<H>
{
	pub fn new(hw: H, config: HcdConfig) -> HostController<H>
	{
		HostController {
			inner: Spinlock::new(HostInner::new(hw, config)),
		}
	}

	/// Run `f` with the lock held, then deliver the completions it produced
	fn with_inner<R, F: FnOnce(&mut HostInner<H>) -> R>(&self, f: F) -> R
	{
		let (rv, done) = {
			let mut lh = self.inner.lock();
			let rv = f(&mut *lh);
			(rv, ::core::mem::replace(&mut lh.done, Vec::new()))
			};
		for d in done {
			d.deliver();
		}
		rv
	}

	/// Queue a transfer, `callback` is invoked exactly once when it completes
	pub fn submit<F>(&self, req: TransferRequest, callback: F) -> Result<RequestHandle, SubmitError>
	where
		F: FnMut(RequestHandle, &Completion<'_>) + Send + 'static
	{
		let cb: crate::queue::CompletionFn = match ::stack_dst::ValueA::new_stable(callback, |p| p as _)
			{
			Ok(v) => v,
			Err(_) => return Err(SubmitError::CallbackTooLarge),
			};
		self.with_inner(|inner| inner.submit(req, cb))
	}

	/// Cancel a request, returns false if it is not outstanding
	///
	/// The callback is invoked with `Cancelled` before this returns. If the request was running
	/// its channel is halted, and comes back through `on_channel_complete`.
	pub fn cancel(&self, handle: RequestHandle) -> bool
	{
		self.with_inner(|inner| inner.cancel(handle))
	}

	/// A channel has halted with interrupt condition bits `bits`
	pub fn on_channel_complete(&self, index: usize, bits: u32)
	{
		self.with_inner(|inner| inner.on_channel_complete(index, bits))
	}

	/// Start of a new (micro)frame
	pub fn on_frame_tick(&self, frame: u16)
	{
		self.with_inner(|inner| inner.on_frame_tick(frame))
	}

	/// Core interrupt, `gintsts` is the interrupt status register value
	pub fn handle_irq(&self, gintsts: u32) -> bool
	{
		self.with_inner(|inner| inner.handle_irq(gintsts))
	}

	/// Cancel every request on an endpoint and forget its state
	pub fn endpoint_disable(&self, ep: EndpointKey)
	{
		self.with_inner(|inner| inner.endpoint_disable(ep))
	}
	/// Reset an endpoint's data toggle (after the device's halt was cleared)
	pub fn endpoint_reset(&self, ep: EndpointKey)
	{
		self.with_inner(|inner| inner.endpoint_reset(ep))
	}

	/// Cancel everything and refuse further requests
	pub fn shutdown(&self)
	{
		self.with_inner(|inner| {
			log_notice!("shutdown: {} channels in use", inner.channels.total() - inner.channels.available());
			inner.shutting_down = true;
			inner.flush_all(TransferStatus::Cancelled);
			})
	}

	/// True when no channel is in use and nothing is queued
	pub fn is_idle(&self) -> bool
	{
		self.with_inner(|inner| inner.channels.available() == inner.channels.total() && inner.qh_pool.iter().all(|(_,qh)| qh.state == QhState::Idle))
	}
	pub fn available_channels(&self) -> usize
	{
		self.with_inner(|inner| inner.channels.available())
	}
	pub fn frame_number(&self) -> u16
	{
		self.with_inner(|inner| inner.frame_number)
	}
	pub fn port_speed(&self) -> Speed
	{
		self.with_inner(|inner| inner.port_speed)
	}
	pub fn stats(&self) -> Stats
	{
		self.with_inner(|inner| inner.stats.clone())
	}
	/// Periodic reservations in use: (channels, microseconds)
	pub fn periodic_load(&self) -> (u8, u16)
	{
		self.with_inner(|inner| (inner.periodic_channels, inner.periodic_usecs))
	}
	/// Access the hardware layer (with the controller lock held)
	pub fn hardware<R, F: FnOnce(&mut H) -> R>(&self, f: F) -> R
	{
		self.with_inner(|inner| f(&mut inner.hw))
	}
	/// Check the channel pool bookkeeping
	pub fn check_invariants(&self) -> bool
	{
		self.with_inner(|inner| inner.channels.check_invariants()
			&& inner.qh_pool.iter().all(|(_,qh)| (qh.state == QhState::Assigned || qh.state == QhState::Queued) == qh.channel.is_some())
			)
	}
}

impl<H: Hardware> HostInner<H>
{
	fn submit(&mut self, req: TransferRequest, callback: crate::queue::CompletionFn) -> Result<RequestHandle, SubmitError>
	{
		if self.shutting_down {
			return Err(SubmitError::ShuttingDown);
		}
		let ep_type = req.kind.ep_type();
		match req.kind
		{
		TransferKind::Control { setup: None } => return Err(SubmitError::MissingSetup),
		TransferKind::Isochronous { ref packets } => {
			if packets.is_empty() {
				return Err(SubmitError::ZeroFrames);
			}
			if packets.iter().any(|p| p.offset.checked_add(p.length).map(|e| e > req.length).unwrap_or(true)) {
				return Err(SubmitError::InvalidPacket);
			}
			},
		_ => {},
		}
		if req.endpoint.max_packet == 0 || req.endpoint.max_packet > 1024 {
			return Err(SubmitError::InvalidEndpoint);
		}
		let do_split = self.port_speed == Speed::High && req.endpoint.speed != Speed::High;
		if do_split && req.endpoint.tt.is_none() {
			return Err(SubmitError::NoTransactionTranslator);
		}

		let key = EndpointKey::new(req.endpoint.addr, ep_type, req.endpoint.direction);
		let (qh_id, created) = match self.endpoints.get(&key)
			{
			Some(&id) => {
				if self.qh_pool.get(id).ep_type != ep_type {
					log_notice!("submit: {:?} is {:?}, not {:?}", key, self.qh_pool.get(id).ep_type, ep_type);
					return Err(SubmitError::InvalidEndpoint);
				}
				(id, false)
				},
			None => {
				let id = self.qh_pool.alloc( Qh::new(&req.endpoint, ep_type, self.port_speed) );
				self.endpoints.insert(key, id);
				log_debug!("submit: new {:?} {:?}", id, self.qh_pool.get(id));
				(id, true)
				},
			};
		self.qh_pool.get_mut(qh_id).disable_pending = false;
		if let Err(e) = self.qh_add(qh_id) {
			if created {
				self.qh_free(qh_id);
			}
			return Err(e);
		}

		let handle = self.alloc_handle();
		let qtd = Qtd::new(handle, req, callback);
		log_debug!("submit({:?}): {:?} on {:?}", handle, qtd, qh_id);
		self.qh_pool.get_mut(qh_id).qtds.push_back(qtd);
		self.schedule();
		Ok(handle)
	}

	fn cancel(&mut self, handle: RequestHandle) -> bool
	{
		let found = self.qh_pool.iter()
			.filter_map(|(id, qh)| qh.qtds.iter().position(|q| q.handle == handle).map(|p| (id, p)))
			.next();
		let (qh_id, pos) = match found
			{
			Some(v) => v,
			None => {
				log_debug!("cancel({:?}): not outstanding", handle);
				return false;
				},
			};
		let qtd = self.qh_pool.get_mut(qh_id).qtds.remove(pos);
		let in_progress = qtd.as_ref().map(|q| q.in_progress).unwrap_or(false);
		log_debug!("cancel({:?}): {:?} in_progress={}", handle, qh_id, in_progress);
		if let Some(qtd) = qtd {
			self.complete_qtd(qtd, TransferStatus::Cancelled);
		}
		if in_progress {
			self.halt_qh_channel(qh_id);
		}
		else if self.qh_pool.get(qh_id).qtds.is_empty() && self.qh_pool.get(qh_id).channel.is_none() {
			self.qh_remove(qh_id);
		}
		self.schedule();
		true
	}

	/// Stop the channel a queue head holds, its transfer has already been removed
	fn halt_qh_channel(&mut self, qh_id: QhId)
	{
		let (idx, state) = match self.qh_pool.get(qh_id).channel
			{
			Some(ref c) => (c.index(), self.channels.get(c.index()).map(|c| c.state())),
			None => return,
			};
		if state == Some(ChannelState::Assigned)
		{
			// Never started, so it can go straight back
			if let Some(ch) = self.qh_pool.get_mut(qh_id).channel.take() {
				let h = self.channels.unstarted(ch);
				self.channels.release(h);
			}
			self.qh_deactivate(qh_id, false);
		}
		else
		{
			let needs_halt = match self.qh_pool.get(qh_id).channel
				{
				Some(ref c) => self.channels.request_halt(c, HaltStatus::UrbDequeue),
				None => false,
				};
			if needs_halt {
				log_debug!("halt_qh_channel({:?}): halting ch{}", qh_id, idx);
				self.hw.halt_channel(idx);
			}
		}
	}

	/// Complete every request on a queue head with `status`
	fn flush_qh(&mut self, qh_id: QhId, status: TransferStatus)
	{
		let qtds: Vec<Qtd> = self.qh_pool.get_mut(qh_id).qtds.drain(..).collect();
		for q in qtds {
			self.complete_qtd(q, status);
		}
		if self.qh_pool.get(qh_id).channel.is_some() {
			self.halt_qh_channel(qh_id);
		}
		else {
			self.qh_remove(qh_id);
		}
	}

	pub(crate) fn flush_all(&mut self, status: TransferStatus)
	{
		let ids: Vec<QhId> = self.qh_pool.iter().map(|(id,_)| id).collect();
		for id in ids {
			self.flush_qh(id, status);
		}
	}

	fn endpoint_disable(&mut self, key: EndpointKey)
	{
		let id = match self.endpoints.get(&key)
			{
			Some(&id) => id,
			None => return,
			};
		log_debug!("endpoint_disable({:?}): {:?}", key, id);
		self.flush_qh(id, TransferStatus::Cancelled);
		if self.qh_pool.get(id).channel.is_some() {
			// Freed once the halt is acknowledged
			self.qh_pool.get_mut(id).disable_pending = true;
		}
		else {
			self.qh_remove(id);
			self.qh_free(id);
		}
		self.schedule();
	}

	fn endpoint_reset(&mut self, key: EndpointKey)
	{
		if let Some(&id) = self.endpoints.get(&key) {
			log_debug!("endpoint_reset({:?}): {:?}", key, id);
			let qh = self.qh_pool.get_mut(id);
			qh.data_toggle = Pid::Data0;
			qh.ping_state = false;
		}
	}
}
