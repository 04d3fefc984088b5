//! Scripted stand-in for the controller's registers
use std::collections::BTreeMap;
use usb_dwc_otg::{Hardware, ChannelParams, TransferState, PortStatus, ProgramError, Pid};
use usb_dwc_otg::hw_regs;
use usb_core::host::Speed;

/// One accepted `program_channel` call
#[derive(Clone, Debug)]
pub struct Programmed
{
	pub index: usize,
	pub params: ChannelParams,
}

pub struct MockHardware
{
	pub frame: u16,
	/// Every accepted programming, in order
	pub programs: Vec<Programmed>,
	/// Channels asked to halt
	pub halts_requested: Vec<usize>,
	/// Reject this many programmings with `Deferred`
	pub defer_next: usize,
	/// Reject this many programmings with `Fault`
	pub fault_next: usize,
	running: BTreeMap<usize, ChannelParams>,
	residues: BTreeMap<usize, TransferState>,
	/// Condition bits waiting to be read through `take_channel_condition`
	pending: BTreeMap<usize, u32>,
	port: Option<PortStatus>,
}
impl Default for MockHardware
{
	fn default() -> Self {
		MockHardware {
			frame: 0,
			programs: Vec::new(),
			halts_requested: Vec::new(),
			defer_next: 0,
			fault_next: 0,
			running: BTreeMap::new(),
			residues: BTreeMap::new(),
			pending: BTreeMap::new(),
			port: None,
		}
	}
}

impl MockHardware
{
	/// Channels currently started (programmed and not yet halted)
	pub fn running(&self) -> Vec<usize> {
		self.running.keys().cloned().collect()
	}
	pub fn running_params(&self, index: usize) -> Option<&ChannelParams> {
		self.running.get(&index)
	}

	/// Override the residue reported for the next halt of `index`
	pub fn set_residue(&mut self, index: usize, st: TransferState) {
		self.residues.insert(index, st);
	}

	/// Stop the channel, filling in a residue that matches `bits` unless one was set
	pub fn prepare_halt(&mut self, index: usize, bits: u32)
	{
		let params = self.running.remove(&index);
		if self.residues.contains_key(&index) {
			return ;
		}
		let st = match params
			{
			Some(p) =>
				if bits & hw_regs::HCINT_XferCompl != 0 {
					TransferState {
						remaining_bytes: 0,
						remaining_packets: 0,
						next_pid: if p.num_packets % 2 == 1 { p.pid.toggled() } else { p.pid },
						}
				}
				else {
					TransferState {
						remaining_bytes: p.xfer_len,
						remaining_packets: p.num_packets,
						next_pid: p.pid,
						}
				},
			None => TransferState { remaining_bytes: 0, remaining_packets: 0, next_pid: Pid::Data0 },
			};
		self.residues.insert(index, st);
	}
	pub fn clear_residue(&mut self, index: usize) {
		self.residues.remove(&index);
	}

	/// Latch channel interrupt bits for `handle_irq`
	pub fn raise(&mut self, index: usize, bits: u32) {
		*self.pending.entry(index).or_insert(0) |= bits;
	}
	/// Latch a port status change for `handle_irq`
	pub fn set_port(&mut self, ps: PortStatus) {
		self.port = Some(ps);
	}
}

impl Hardware for MockHardware
{
	fn program_channel(&mut self, index: usize, params: &ChannelParams) -> Result<(), ProgramError>
	{
		if self.fault_next > 0 {
			self.fault_next -= 1;
			return Err(ProgramError::Fault);
		}
		if self.defer_next > 0 {
			self.defer_next -= 1;
			return Err(ProgramError::Deferred);
		}
		assert!( !self.running.contains_key(&index), "channel {} programmed while running", index );
		self.residues.remove(&index);
		self.running.insert(index, params.clone());
		self.programs.push(Programmed { index: index, params: params.clone() });
		Ok( () )
	}
	fn halt_channel(&mut self, index: usize) {
		self.halts_requested.push(index);
	}
	fn transfer_state(&self, index: usize) -> TransferState {
		match self.residues.get(&index)
		{
		Some(v) => *v,
		None => TransferState { remaining_bytes: 0, remaining_packets: 0, next_pid: Pid::Data0 },
		}
	}
	fn frame_number(&self) -> u16 {
		self.frame
	}
	fn channel_interrupts(&self) -> u32 {
		self.pending.keys().fold(0, |acc, &i| acc | (1 << i))
	}
	fn take_channel_condition(&mut self, index: usize) -> u32 {
		let bits = self.pending.remove(&index).unwrap_or(0);
		if bits & hw_regs::HCINT_ChHltd != 0 {
			self.prepare_halt(index, bits);
		}
		bits
	}
	fn take_port_status(&mut self) -> PortStatus {
		match self.port.take()
		{
		Some(v) => v,
		None => PortStatus { connected: true, enabled: true, speed: Speed::High, connect_changed: false, enable_changed: false, overcurrent_changed: false },
		}
	}
}
