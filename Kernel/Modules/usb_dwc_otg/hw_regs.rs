//! Hardware definitions (interrupt status bits)
#![allow(non_upper_case_globals)]
#![allow(dead_code)]

/// Core interrupt status (`GINTSTS`)
///
/// *  1    = Mode mismatch
/// *  2    = OTG interrupt
/// *  3    = Start of (micro)frame
/// *  4    = RX FIFO non-empty
/// *  5    = Non-periodic TX FIFO empty
/// * 24    = Host port interrupt
/// * 25    = Host channels interrupt (see `HAINT`)
/// * 26    = Periodic TX FIFO empty
/// * 28    = Connector ID status change
/// * 29    = Disconnect detected
/// * 30    = Session request
/// * 31    = Resume/remote wakeup
pub const GINTSTS_ModeMismatch: u32 = 1 << 1;
pub const GINTSTS_OtgIntr: u32 = 1 << 2;
pub const GINTSTS_Sof: u32 = 1 << 3;
pub const GINTSTS_RxStsQLvl: u32 = 1 << 4;
pub const GINTSTS_NpTxFEmpty: u32 = 1 << 5;
pub const GINTSTS_UsbSuspend: u32 = 1 << 11;
pub const GINTSTS_PortIntr: u32 = 1 << 24;
pub const GINTSTS_HcIntr: u32 = 1 << 25;
pub const GINTSTS_PTxFEmpty: u32 = 1 << 26;
pub const GINTSTS_ConIdStsChng: u32 = 1 << 28;
pub const GINTSTS_Disconnect: u32 = 1 << 29;
pub const GINTSTS_SessReqIntr: u32 = 1 << 30;
pub const GINTSTS_WkUpIntr: u32 = 1 << 31;

/// Host channel interrupt conditions (`HCINTn`)
pub const HCINT_XferCompl: u32 = 1 << 0;
pub const HCINT_ChHltd: u32 = 1 << 1;
pub const HCINT_AhbErr: u32 = 1 << 2;
pub const HCINT_Stall: u32 = 1 << 3;
pub const HCINT_Nak: u32 = 1 << 4;
pub const HCINT_Ack: u32 = 1 << 5;
pub const HCINT_Nyet: u32 = 1 << 6;
pub const HCINT_XactErr: u32 = 1 << 7;
pub const HCINT_BblErr: u32 = 1 << 8;
pub const HCINT_FrmOvrun: u32 = 1 << 9;
pub const HCINT_DataTglErr: u32 = 1 << 10;

/// Frame number register mask (`HFNUM.FrNum`, 14 bits)
pub const HFNUM_MAX_FRNUM: u16 = 0x3FFF;

/// Maximum bytes in one start-split of an isochronous OUT (TT buffering limit per microframe)
pub const SPLIT_ISOC_OUT_MAX: u32 = 188;

/// Decoded cause of a channel halt
///
/// Built from the raw `HCINTn` bits. When several bits are set, the one that determines the
/// outcome wins (a transfer-complete always beats the handshake that came with it).
#[derive(Copy,Clone,PartialEq,Eq,Debug)]
pub enum ChannelCondition
{
	/// DMA fault on the system bus
	AhbError,
	/// Transfer finished (`nyet` is set if the final handshake was NYET)
	XferComplete { nyet: bool },
	Stall,
	XactError,
	Babble,
	FrameOverrun,
	DataToggleError,
	Nyet,
	Nak,
	Ack,
	/// Halted with no recognised cause
	Unknown,
}
impl ChannelCondition
{
	pub fn decode(bits: u32) -> ChannelCondition
	{
		if bits & HCINT_AhbErr != 0 {
			ChannelCondition::AhbError
		}
		else if bits & HCINT_XferCompl != 0 {
			ChannelCondition::XferComplete { nyet: bits & HCINT_Nyet != 0 }
		}
		else if bits & HCINT_Stall != 0 {
			ChannelCondition::Stall
		}
		else if bits & HCINT_XactErr != 0 {
			ChannelCondition::XactError
		}
		else if bits & HCINT_BblErr != 0 {
			ChannelCondition::Babble
		}
		else if bits & HCINT_FrmOvrun != 0 {
			ChannelCondition::FrameOverrun
		}
		else if bits & HCINT_DataTglErr != 0 {
			ChannelCondition::DataToggleError
		}
		else if bits & HCINT_Nyet != 0 {
			ChannelCondition::Nyet
		}
		else if bits & HCINT_Nak != 0 {
			ChannelCondition::Nak
		}
		else if bits & HCINT_Ack != 0 {
			ChannelCondition::Ack
		}
		else {
			ChannelCondition::Unknown
		}
	}
}

/// Debug formatter for a raw `HCINTn` value
pub struct HcIntBits(pub u32);
impl ::core::fmt::Debug for HcIntBits
{
	fn fmt(&self, f: &mut ::core::fmt::Formatter) -> ::core::fmt::Result {
		const NAMES: [&str; 11] = ["xfercomp","chhltd","ahberr","stall","nak","ack","nyet","xacterr","bblerr","frmovrun","datatglerr"];
		write!(f, "{:#x}[", self.0)?;
		let mut first = true;
		for (i,n) in NAMES.iter().enumerate() {
			if self.0 & (1 << i) != 0 {
				if !first {
					write!(f, ",")?;
				}
				write!(f, "{}", n)?;
				first = false;
			}
		}
		write!(f, "]")
	}
}
