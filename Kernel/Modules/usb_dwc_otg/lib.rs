// "Tifflin" Kernel - DesignWare USB OTG host driver
// - By John Hodge (thePowersGang)
//
// Modules/usb_dwc_otg/lib.rs
//! Synopsys DesignWare USB 2.0 OTG host controller, transaction engine
//!
//! The controller has no schedule in memory: the driver owns a small set of host channels and
//! programs each one with a single transaction (or run of packets), then reacts to the channel
//! halting. This crate contains the channel pool, the per-endpoint queue heads, the periodic and
//! non-periodic schedule, and the halt classification that decides what to do next.
//!
//! Register access is abstracted behind `Hardware`, see `hw_structs`.
#![no_std]
#[cfg(test)]
extern crate /**/ std;

#[macro_use]
extern crate kernel;
extern crate alloc;
extern crate stack_dst;

use ::kernel::prelude::*;
use ::usb_core::host::{Speed, TransferStatus};

pub mod hw_regs;
pub mod hw_structs;
pub mod config;
pub mod frame;
pub mod bus_time;
mod desc_pools;
mod queue;

mod host_queuemgmt;
mod host_transfer;
mod host_interrupt;
mod usb_host;

pub use self::config::HcdConfig;
pub use self::hw_structs::{Hardware, ChannelParams, ChannelData, SplitParams, SplitPos, Pid, PAddr, TransferState, PortStatus, ProgramError};
pub use self::queue::{EndpointDesc, EndpointKey, TransferRequest, TransferKind, TransferFlags};
pub use self::desc_pools::HaltStatus;
pub use self::host_queuemgmt::TransactionType;
pub use self::usb_host::{HostController, RequestHandle, SubmitError, Stats};

use self::desc_pools::{ChannelPool, QhPool, QhId};
use self::queue::DoneRequest;

/// Controller state, always accessed with the controller lock held
struct HostInner<H: Hardware>
{
	hw: H,
	config: HcdConfig,

	channels: ChannelPool,
	qh_pool: QhPool,
	endpoints: ::alloc::collections::BTreeMap<EndpointKey, QhId>,

	// - Schedule lists
	non_periodic_inactive: VecDeque<QhId>,
	non_periodic_active: VecDeque<QhId>,
	periodic_inactive: VecDeque<QhId>,
	periodic_ready: VecDeque<QhId>,
	periodic_assigned: VecDeque<QhId>,
	periodic_queued: VecDeque<QhId>,

	// - Periodic reservations
	periodic_channels: u8,
	periodic_usecs: u16,

	frame_number: u16,
	port_speed: Speed,
	shutting_down: bool,
	next_handle: u64,

	/// Requests finished under the lock, delivered once it is released
	done: Vec<DoneRequest>,
	stats: Stats,
}

impl<H: Hardware> HostInner<H>
{
	fn new(hw: H, mut config: HcdConfig) -> HostInner<H>
	{
		config.sanitise();
		log_notice!("DWC OTG host: {} channels, root port {:?}", config.host_channels, config.root_speed);
		let frame = hw.frame_number() & hw_regs::HFNUM_MAX_FRNUM;
		HostInner {
			channels: ChannelPool::new(config.host_channels as usize),
			qh_pool: QhPool::new(),
			endpoints: Default::default(),
			non_periodic_inactive: VecDeque::new(),
			non_periodic_active: VecDeque::new(),
			periodic_inactive: VecDeque::new(),
			periodic_ready: VecDeque::new(),
			periodic_assigned: VecDeque::new(),
			periodic_queued: VecDeque::new(),
			periodic_channels: 0,
			periodic_usecs: 0,
			frame_number: frame,
			port_speed: config.root_speed,
			shutting_down: false,
			next_handle: 1,
			done: Vec::new(),
			stats: Stats::default(),
			hw: hw,
			config: config,
			}
	}

	/// Dispatch a core interrupt (`GINTSTS` value), returns true if any bit was recognised
	fn handle_irq(&mut self, orig_sts: u32) -> bool
	{
		let mut sts = orig_sts;
		if sts == 0 {
			return false;
		}
		let mut chk = |bit: u32| { let rv = sts & bit != 0; sts &= !bit; rv };
		let sof = chk(hw_regs::GINTSTS_Sof);
		let port = chk(hw_regs::GINTSTS_PortIntr);
		let hc = chk(hw_regs::GINTSTS_HcIntr);
		let disconnect = chk(hw_regs::GINTSTS_Disconnect);
		// Bits that need no action from the host side
		let _ = chk(hw_regs::GINTSTS_NpTxFEmpty | hw_regs::GINTSTS_PTxFEmpty | hw_regs::GINTSTS_RxStsQLvl);
		let mode_mismatch = chk(hw_regs::GINTSTS_ModeMismatch);

		if hc {
			// Channel halts first, so the frame tick sees the freed channels
			let haint = self.hw.channel_interrupts();
			log_trace!("handle_irq: HcIntr haint={:#x}", haint);
			for i in 0 .. self.channels.total() {
				if haint & (1 << i) != 0 {
					let bits = self.hw.take_channel_condition(i);
					if bits & hw_regs::HCINT_ChHltd != 0 {
						self.on_channel_complete(i, bits);
					}
					else {
						log_trace!("handle_irq: channel {} {:?} without halt", i, hw_regs::HcIntBits(bits));
					}
				}
			}
		}
		if port {
			let ps = self.hw.take_port_status();
			log_debug!("handle_irq: PortIntr {:?}", ps);
			if ps.connect_changed && !ps.connected {
				self.port_disconnected();
			}
			else if ps.enable_changed && ps.enabled {
				log_notice!("Root port enabled at {:?} speed", ps.speed);
				self.port_speed = ps.speed;
			}
			if ps.overcurrent_changed {
				log_warning!("Root port over-current change");
			}
		}
		if disconnect {
			self.port_disconnected();
		}
		if sof {
			let f = self.hw.frame_number();
			self.on_frame_tick(f);
		}
		if mode_mismatch {
			log_error!("Mode mismatch interrupt (device-mode register access)");
		}
		if sts != 0 {
			log_warning!("Unexpected/unhandled interrupt bits {:#x}", sts);
		}
		true
	}

	fn port_disconnected(&mut self)
	{
		log_notice!("Root port disconnected, flushing all requests");
		self.flush_all(TransferStatus::Shutdown);
	}

	fn alloc_handle(&mut self) -> RequestHandle
	{
		let rv = RequestHandle::from_raw(self.next_handle);
		self.next_handle += 1;
		rv
	}
}
