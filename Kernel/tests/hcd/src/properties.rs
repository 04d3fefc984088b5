//! Randomised checks of the engine's bookkeeping
//!
//! Each test runs a fixed set of seeds, so failures reproduce.
use std::collections::BTreeMap;
use usb_core::host::{Direction, TransferStatus};
use usb_dwc_otg::{ChannelData, RequestHandle, SplitPos};
use super::*;

struct XorShift(u64);
impl XorShift
{
	fn new(seed: u64) -> XorShift {
		XorShift(seed.wrapping_mul(0x9E37_79B9_7F4A_7C15) | 1)
	}
	fn next(&mut self) -> u64 {
		let mut x = self.0;
		x ^= x << 13;
		x ^= x >> 7;
		x ^= x << 17;
		self.0 = x;
		x
	}
	fn below(&mut self, n: usize) -> usize {
		(self.next() % n as u64) as usize
	}
}

const SEEDS: [u64; 6] = [1, 2, 3, 0xDEAD, 0xBEEF, 12345];

/// Requests on one endpoint complete in the order they were submitted
#[test]
fn per_endpoint_fifo()
{
	for &seed in &SEEDS
	{
		let fw = TestFramework::new("per_endpoint_fifo");
		let mut rng = XorShift::new(seed);
		let mut submitted: BTreeMap<u8, Vec<RequestHandle>> = BTreeMap::new();
		for _ in 0 .. 24
		{
			let ep_num = 1 + rng.below(3) as u8;
			let len = 1 + rng.below(3000);
			let h = fw.submit(bulk(hs_endpoint(1, ep_num, Direction::In, 512), len));
			submitted.entry(ep_num).or_insert_with(Vec::new).push(h);
		}
		// Complete channels in a random order until everything is done
		let mut guard = 0;
		while !fw.running().is_empty()
		{
			let r = fw.running();
			fw.complete(r[rng.below(r.len())], XFERCOMP);
			guard += 1;
			assert!(guard < 1000);
		}
		assert!(fw.hc.is_idle());

		let completed: Vec<RequestHandle> = fw.completions().iter().map(|c| c.handle).collect();
		assert_eq!(completed.len(), 24);
		for (ep, handles) in &submitted
		{
			let order: Vec<RequestHandle> = completed.iter().cloned().filter(|h| handles.contains(h)).collect();
			assert_eq!(&order, handles, "seed {} ep {} out of order", seed, ep);
		}
	}
}

#[derive(Copy,Clone,Debug)]
enum Event
{
	XactErr,
	Nak,
	Ack,
}

/// Transaction errors only fail a request when three happen without progress in between
#[test]
fn error_count_resets_on_progress()
{
	for &seed in &SEEDS
	{
		let fw = TestFramework::new("error_count_resets_on_progress");
		let mut rng = XorShift::new(seed);
		let mut events = Vec::new();
		let mut model_errors = 0;
		let h = fw.submit(bulk(hs_endpoint(1, 1, Direction::In, 64), 64));
		loop
		{
			let ev = match rng.below(3)
				{
				0 => Event::XactErr,
				1 => Event::Nak,
				_ => Event::Ack,
				};
			events.push(ev);
			match ev
			{
			Event::XactErr => { fw.complete_only(XACTERR); model_errors += 1; },
			Event::Nak => { fw.complete_only(NAK); model_errors = 0; },
			Event::Ack => { fw.complete_only(ACK); model_errors = 0; },
			}

			if model_errors == 3 {
				let c = fw.completion(h);
				assert_eq!(c.status, TransferStatus::Protocol, "seed {}: {:?}", seed, events);
				break;
			}
			assert!(fw.completions().is_empty(), "seed {}: failed early after {:?}", seed, events);
			if events.len() > 40 {
				// Long enough, let it finish normally
				fw.complete_only(XFERCOMP);
				assert_eq!(fw.completion(h).status, TransferStatus::Success);
				break;
			}
		}
		assert!(fw.running().is_empty());
		assert!(fw.hc.check_invariants());
	}
}

/// Every channel is either free or running a request, whatever the order of events
#[test]
fn channel_conservation()
{
	for &seed in &SEEDS
	{
		let fw = TestFramework::new("channel_conservation");
		let mut rng = XorShift::new(seed);
		let mut outstanding: Vec<RequestHandle> = Vec::new();
		let mut submitted = 0;

		for step in 0 .. 400
		{
			match rng.below(4)
			{
			0 | 1 => {
				let dev = 1 + rng.below(4) as u8;
				let ep_num = 1 + rng.below(3) as u8;
				let h = fw.submit(bulk(hs_endpoint(dev, ep_num, Direction::In, 512), 1 + rng.below(4096)));
				outstanding.push(h);
				submitted += 1;
				},
			2 => {
				let r = fw.running();
				if !r.is_empty() {
					let bits = match rng.below(5)
						{
						0 => NAK,
						1 => XACTERR,
						2 => STALL,
						_ => XFERCOMP,
						};
					fw.complete(r[rng.below(r.len())], bits);
				}
				},
			_ => {
				if !outstanding.is_empty() {
					let h = outstanding[rng.below(outstanding.len())];
					fw.hc.cancel(h);
				}
				},
			}
			outstanding.retain(|h| fw.completions_for(*h).is_empty());

			assert!(fw.hc.check_invariants(), "seed {} step {}", seed, step);
			// Channels given to the hardware stay out of the pool until they halt
			assert_eq!(fw.hc.available_channels() + fw.running().len(), 8, "seed {} step {}", seed, step);
		}

		// Drain
		let mut guard = 0;
		while !fw.running().is_empty() {
			let r = fw.running();
			fw.complete(r[0], XFERCOMP);
			guard += 1;
			assert!(guard < 2000);
		}
		assert!(fw.hc.is_idle(), "seed {}", seed);
		assert_eq!(fw.hc.available_channels(), 8);

		// Exactly one completion per request
		let all = fw.completions();
		assert_eq!(all.len(), submitted);
		let mut seen = ::std::collections::BTreeSet::new();
		for c in &all {
			assert!(seen.insert(c.handle), "seed {}: {:?} completed twice", seed, c.handle);
		}
	}
}

/// Split isochronous OUT slices cover each frame exactly, in order, at most 188 bytes each
#[test]
fn split_isoc_out_offsets()
{
	let frames = [500, 100, 376, 188, 1, 189];
	let fw = TestFramework::new("split_isoc_out_offsets");
	let h = fw.submit(isoc(fs_endpoint(9, 1, Direction::Out, 512), &frames));

	let mut slices: Vec<(u64, u32, SplitPos)> = Vec::new();
	let mut guard = 0;
	while fw.completions().is_empty()
	{
		assert!(fw.tick_until_running(40), "stalled after {:?}", slices);
		let p = fw.complete_only(XFERCOMP);
		let addr = match p.data
			{
			ChannelData::Buffer(a) => a - BUFFER_BASE,
			ChannelData::Setup(_) => panic!("setup on isochronous"),
			};
		slices.push( (addr, p.xfer_len, p.split.expect("split").xact_pos) );
		guard += 1;
		assert!(guard < 100);
	}

	let mut expected_ofs = 0;
	let mut idx = 0;
	for &f in &frames
	{
		let mut done = 0;
		while done < f
		{
			let (ofs, len, pos) = slices[idx];
			assert!(len <= 188, "slice {} is {} bytes", idx, len);
			assert_eq!(ofs, expected_ofs + done as u64, "slice {}", idx);
			let want_pos = if f <= 188 { SplitPos::All }
				else if done == 0 { SplitPos::Begin }
				else if f - done <= 188 { SplitPos::End }
				else { SplitPos::Mid };
			assert_eq!(pos, want_pos, "slice {} of frame length {}", idx, f);
			done += len as usize;
			idx += 1;
		}
		assert_eq!(done, f);
		expected_ofs += f as u64;
	}
	assert_eq!(idx, slices.len());

	let c = fw.completion(h);
	assert_eq!(c.status, TransferStatus::Success);
	assert_eq!(c.actual_length, frames.iter().sum::<usize>());
	assert_eq!(c.error_packets, 0);
}

/// Cancelling a request that already completed does nothing
#[test]
fn cancel_after_completion()
{
	for &seed in &SEEDS
	{
		let fw = TestFramework::new("cancel_after_completion");
		let mut rng = XorShift::new(seed);
		let h = fw.submit(bulk(hs_endpoint(1, 1, Direction::Out, 512), 1 + rng.below(8192)));
		while fw.completions().is_empty() {
			fw.complete_only(XFERCOMP);
		}
		let before = fw.hc.stats();
		assert!(!fw.hc.cancel(h));
		assert_eq!(fw.completions_for(h).len(), 1);
		assert_eq!(fw.completion(h).status, TransferStatus::Success);
		assert!(fw.hc.hardware(|hw| hw.halts_requested.is_empty()));
		assert_eq!(fw.hc.stats().requests_completed, before.requests_completed);
		assert!(fw.hc.is_idle());
	}
}

/// A bulk OUT of N bytes sends exactly ceil(N/M) packets and reports N bytes
#[test]
fn bulk_out_packet_count()
{
	for &seed in &SEEDS
	{
		let fw = TestFramework::with_config("bulk_out_packet_count", "max_transfer_size=1024");
		let mut rng = XorShift::new(seed);
		for i in 0 .. 10
		{
			let mps = [8u16, 64, 512][rng.below(3)];
			let len = 1 + rng.below(6000);
			let first = fw.program_count();
			let h = fw.submit(bulk(hs_endpoint(2, 1 + i as u8, Direction::Out, mps), len));
			while fw.completions_for(h).is_empty() {
				fw.complete_only(XFERCOMP);
			}
			let packets: u32 = fw.hc.hardware(|hw| hw.programs[first..].iter().map(|p| p.params.num_packets).sum());
			let m = mps as usize;
			assert_eq!(packets as usize, (len + m - 1) / m, "seed {} len {} mps {}", seed, len, mps);
			let c = fw.completion(h);
			assert_eq!(c.actual_length, len);
			assert_eq!(c.status, TransferStatus::Success);
		}
	}
}

/// With the zero-packet flag, an exact multiple of the packet size ends with a ZLP
#[test]
fn bulk_out_zero_length_packet()
{
	let fw = TestFramework::new("bulk_out_zero_length_packet");
	let mut req = bulk(hs_endpoint(2, 2, Direction::Out, 512), 1024);
	req.flags.zero_packet = true;
	let h = fw.submit(req);

	let p = fw.complete_only(XFERCOMP);
	assert_eq!(p.xfer_len, 1024);
	assert!(fw.completions().is_empty());
	let p = fw.complete_only(XFERCOMP);
	assert_eq!(p.xfer_len, 0);
	assert_eq!(p.num_packets, 1);
	assert_eq!(fw.completion(h).actual_length, 1024);
}
