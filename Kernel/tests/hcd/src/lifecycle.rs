//! Endpoint and controller lifecycle: disable/reset, shutdown, port events, programming faults
use std::sync::{Arc, Mutex};
use usb_core::host::{Direction, EndpointType, Speed, TransferStatus};
use usb_dwc_otg::{EndpointKey, Pid, PortStatus, SubmitError, HaltStatus};
use super::*;

/// Disabling an endpoint cancels its requests and forgets its toggle once the channel is back
#[test]
fn endpoint_disable_running()
{
	let fw = TestFramework::new("endpoint_disable_running");
	let ep = hs_endpoint(3, 1, Direction::Out, 512);
	let key = EndpointKey::new(ep.addr, EndpointType::Bulk, Direction::Out);

	// Leave the toggle at DATA1
	let h0 = fw.submit(bulk(ep, 512));
	fw.complete_only(XFERCOMP);
	assert_eq!(fw.completion(h0).status, TransferStatus::Success);

	let h1 = fw.submit(bulk(ep, 4096));
	let h2 = fw.submit(bulk(ep, 64));
	let (idx, p) = fw.only_running();
	assert_eq!(p.pid, Pid::Data1);

	fw.hc.endpoint_disable(key);
	assert_eq!(fw.completion(h1).status, TransferStatus::Cancelled);
	assert_eq!(fw.completion(h2).status, TransferStatus::Cancelled);
	assert_eq!(fw.hc.hardware(|hw| hw.halts_requested.clone()), vec![idx]);

	fw.complete(idx, NAK);
	assert!(fw.hc.is_idle());
	assert_eq!(fw.hc.available_channels(), 8);

	// A fresh queue head starts from DATA0
	let _ = fw.submit(bulk(ep, 64));
	let (_, p) = fw.only_running();
	assert_eq!(p.pid, Pid::Data0);
}

/// Disabling an endpoint with nothing running frees it straight away
#[test]
fn endpoint_disable_idle()
{
	let fw = TestFramework::new("endpoint_disable_idle");
	let ep = hs_endpoint(3, 2, Direction::In, 64);
	let mut ep_int = ep;
	ep_int.interval = 4;
	let h = fw.submit(interrupt(ep_int, 8));
	assert!(fw.running().is_empty());
	assert!(fw.hc.periodic_load().0 == 1);

	fw.hc.endpoint_disable(EndpointKey::new(ep.addr, EndpointType::Interrupt, Direction::In));
	assert_eq!(fw.completion(h).status, TransferStatus::Cancelled);
	assert!(fw.hc.hardware(|hw| hw.halts_requested.is_empty()));
	assert_eq!(fw.hc.periodic_load(), (0, 0));
	assert!(fw.hc.is_idle());
	// Never started later either
	for _ in 0 .. 32 {
		fw.tick();
	}
	assert_eq!(fw.program_count(), 0);
}

/// Resetting an endpoint returns its toggle to DATA0
#[test]
fn endpoint_reset_toggle()
{
	let fw = TestFramework::new("endpoint_reset_toggle");
	let ep = hs_endpoint(4, 1, Direction::In, 512);
	let key = EndpointKey::new(ep.addr, EndpointType::Bulk, Direction::In);

	// One packet each, so the toggle alternates between requests
	let _ = fw.submit(bulk(ep, 512));
	let p = fw.complete_only(XFERCOMP);
	assert_eq!(p.pid, Pid::Data0);
	let _ = fw.submit(bulk(ep, 512));
	let p = fw.complete_only(XFERCOMP);
	assert_eq!(p.pid, Pid::Data1);
	let _ = fw.submit(bulk(ep, 512));
	let p = fw.complete_only(XFERCOMP);
	assert_eq!(p.pid, Pid::Data0);

	fw.hc.endpoint_reset(key);
	let _ = fw.submit(bulk(ep, 512));
	let p = fw.complete_only(XFERCOMP);
	assert_eq!(p.pid, Pid::Data0);

	// Unknown endpoints are ignored
	fw.hc.endpoint_reset(EndpointKey::new(EndpointAddr::new(9, 9), EndpointType::Bulk, Direction::In));
}

/// Shutdown cancels everything and refuses new requests
#[test]
fn shutdown_rejects_submit()
{
	let fw = TestFramework::new("shutdown_rejects_submit");
	let ep = hs_endpoint(2, 1, Direction::In, 512);
	let h1 = fw.submit(bulk(ep, 512));
	let h2 = fw.submit(bulk(ep, 512));
	let (idx, _) = fw.only_running();

	fw.hc.shutdown();
	assert_eq!(fw.completion(h1).status, TransferStatus::Cancelled);
	assert_eq!(fw.completion(h2).status, TransferStatus::Cancelled);
	match fw.try_submit(bulk(ep, 512))
	{
	Err(SubmitError::ShuttingDown) => {},
	v => panic!("submit after shutdown: {:?}", v),
	}

	fw.complete(idx, XFERCOMP);
	assert!(fw.hc.is_idle());
	assert_eq!(fw.completions().len(), 2);
}

/// Port disconnect (reported through the interrupt handler) fails everything with Shutdown
#[test]
fn irq_disconnect()
{
	let fw = TestFramework::new("irq_disconnect");
	let h_bulk = fw.submit(bulk(hs_endpoint(2, 1, Direction::In, 512), 512));
	let h_ctl = fw.submit(control(hs_endpoint(2, 0, Direction::Out, 64), get_descriptor(18), 18));
	assert_eq!(fw.running().len(), 2);

	fw.hc.hardware(|hw| hw.set_port(PortStatus { connected: false, enabled: false, speed: Speed::High, connect_changed: true, enable_changed: true, overcurrent_changed: false }));
	assert!(fw.hc.handle_irq(hw_regs::GINTSTS_PortIntr));
	assert_eq!(fw.completion(h_bulk).status, TransferStatus::Shutdown);
	assert_eq!(fw.completion(h_ctl).status, TransferStatus::Shutdown);
	let halted = fw.hc.hardware(|hw| hw.halts_requested.len());
	assert_eq!(halted, 2);

	// Halts come back through the channel interrupt path
	for idx in fw.running() {
		fw.hc.hardware(|hw| hw.raise(idx, hw_regs::HCINT_ChHltd));
	}
	assert!(fw.hc.handle_irq(hw_regs::GINTSTS_HcIntr));
	assert!(fw.hc.is_idle());
	assert_eq!(fw.hc.stats().halt_count(HaltStatus::UrbDequeue), 2);

	// Unlike shutdown, the controller still accepts requests for the next device
	let _ = fw.submit(bulk(hs_endpoint(1, 1, Direction::In, 512), 512));
	assert_eq!(fw.running().len(), 1);
}

/// Channel halts delivered through the interrupt handler
#[test]
fn irq_channel_halt()
{
	let fw = TestFramework::new("irq_channel_halt");
	let h = fw.submit(bulk(hs_endpoint(2, 1, Direction::Out, 512), 100));
	let (idx, _) = fw.only_running();

	// Condition bits without a halt are ignored
	fw.hc.hardware(|hw| hw.raise(idx, hw_regs::HCINT_Ack));
	assert!(fw.hc.handle_irq(hw_regs::GINTSTS_HcIntr));
	assert!(fw.completions().is_empty());

	fw.hc.hardware(|hw| hw.raise(idx, XFERCOMP));
	assert!(fw.hc.handle_irq(hw_regs::GINTSTS_HcIntr));
	let c = fw.completion(h);
	assert_eq!(c.status, TransferStatus::Success);
	assert_eq!(c.actual_length, 100);
	assert!(!fw.hc.handle_irq(0));
}

/// Start of frame through the interrupt handler advances the schedule
#[test]
fn irq_sof()
{
	let fw = TestFramework::new("irq_sof");
	let mut ep = hs_endpoint(2, 1, Direction::In, 64);
	ep.interval = 8;
	let _ = fw.submit(interrupt(ep, 64));
	assert!(fw.running().is_empty());

	fw.hc.hardware(|hw| hw.frame = 5);
	assert!(fw.hc.handle_irq(hw_regs::GINTSTS_Sof));
	assert_eq!(fw.hc.frame_number(), 5);
	assert!(fw.running().is_empty());

	fw.hc.hardware(|hw| hw.frame = 10);
	assert!(fw.hc.handle_irq(hw_regs::GINTSTS_Sof));
	assert_eq!(fw.running().len(), 1);
}

/// The root port reports a full speed device, so no split transactions are needed
#[test]
fn irq_port_enable_full_speed()
{
	let fw = TestFramework::new("irq_port_enable_full_speed");
	fw.hc.hardware(|hw| hw.set_port(PortStatus { connected: true, enabled: true, speed: Speed::Full, connect_changed: false, enable_changed: true, overcurrent_changed: false }));
	assert!(fw.hc.handle_irq(hw_regs::GINTSTS_PortIntr));
	assert_eq!(fw.hc.port_speed(), Speed::Full);

	let mut ep = fs_endpoint(1, 1, Direction::In, 64);
	ep.tt = None;
	let h = fw.submit(bulk(ep, 64));
	let p = fw.complete_only(XFERCOMP);
	assert!(p.split.is_none());
	assert_eq!(fw.completion(h).status, TransferStatus::Success);
}

/// Interrupt endpoint polled at its interval
#[test]
fn interrupt_polling()
{
	let fw = TestFramework::new("interrupt_polling");
	let mut ep = hs_endpoint(2, 1, Direction::In, 8);
	ep.interval = 4;
	let h1 = fw.submit(interrupt(ep, 8));
	let h2 = fw.submit(interrupt(ep, 8));

	assert!(fw.tick_until_running(20));
	let f1 = fw.hc.frame_number();
	// No data yet
	fw.complete_only(NAK);
	assert!(fw.running().is_empty());
	assert!(fw.tick_until_running(20));
	assert_eq!(fw.hc.frame_number(), f1 + 4);
	fw.complete_only(XFERCOMP);
	assert_eq!(fw.completion(h1).status, TransferStatus::Success);
	assert!(fw.tick_until_running(20));
	assert_eq!(fw.hc.frame_number(), f1 + 8);
	fw.complete_only(XFERCOMP);
	assert_eq!(fw.completion(h2).actual_length, 8);
	assert_eq!(fw.hc.periodic_load(), (0, 0));
}

/// A deferred programming is retried on the next scheduling pass
#[test]
fn deferred_programming()
{
	let fw = TestFramework::new("deferred_programming");
	fw.hc.hardware(|hw| hw.defer_next = 1);
	let h = fw.submit(bulk(hs_endpoint(2, 1, Direction::In, 512), 512));
	assert!(fw.running().is_empty());
	assert_eq!(fw.hc.available_channels(), 7);
	assert_eq!(fw.hc.stats().deferred_starts, 1);

	fw.tick();
	fw.complete_only(XFERCOMP);
	assert_eq!(fw.completion(h).status, TransferStatus::Success);
	assert!(fw.hc.check_invariants());
}

/// Cancelling a request whose channel was never started returns the channel immediately
#[test]
fn cancel_deferred()
{
	let fw = TestFramework::new("cancel_deferred");
	fw.hc.hardware(|hw| hw.defer_next = 1);
	let h = fw.submit(bulk(hs_endpoint(2, 1, Direction::In, 512), 512));
	assert_eq!(fw.hc.available_channels(), 7);
	assert!(fw.hc.cancel(h));
	assert_eq!(fw.completion(h).status, TransferStatus::Cancelled);
	assert_eq!(fw.hc.available_channels(), 8);
	assert!(fw.hc.hardware(|hw| hw.halts_requested.is_empty()));
	assert!(fw.hc.is_idle());
}

/// A rejected programming fails the request with an I/O error
#[test]
fn faulted_programming()
{
	let fw = TestFramework::new("faulted_programming");
	fw.hc.hardware(|hw| hw.fault_next = 1);
	let h1 = fw.submit(bulk(hs_endpoint(2, 1, Direction::In, 512), 512));
	let h2 = fw.submit(bulk(hs_endpoint(2, 1, Direction::In, 512), 512));
	assert_eq!(fw.completion(h1).status, TransferStatus::Io);
	// The next request on the endpoint is unaffected
	fw.complete_only(XFERCOMP);
	assert_eq!(fw.completion(h2).status, TransferStatus::Success);
	assert_eq!(fw.hc.available_channels(), 8);
}

/// Periodic reservations are limited by bus time and channel count
#[test]
fn periodic_admission()
{
	let fw = TestFramework::with_config("periodic_admission", "host_channels=4 periodic_reserve=1");

	// High bandwidth endpoints take most of a microframe each
	let mut big = hs_endpoint(2, 1, Direction::In, 1024);
	big.mult = 3;
	let _ = fw.submit(interrupt(big, 1024));
	let (chans, usecs) = fw.hc.periodic_load();
	assert_eq!(chans, 1);
	assert!(usecs > 50, "{}", usecs);
	let mut big2 = big;
	big2.addr = EndpointAddr::new(2, 2);
	match fw.try_submit(interrupt(big2, 1024))
	{
	Err(SubmitError::NoPeriodicBandwidth) => {},
	v => panic!("expected NoPeriodicBandwidth, got {:?}", v),
	}

	// Small ones until the channels run out (one is kept back for non-periodic work)
	for ep_num in 3 .. 5 {
		let _ = fw.submit(interrupt(hs_endpoint(2, ep_num, Direction::In, 8), 8));
	}
	match fw.try_submit(interrupt(hs_endpoint(2, 5, Direction::In, 8), 8))
	{
	Err(SubmitError::NoPeriodicChannel) => {},
	v => panic!("expected NoPeriodicChannel, got {:?}", v),
	}
	assert_eq!(fw.hc.periodic_load().0, 3);

	// More requests on an endpoint that already holds a reservation are fine
	let _ = fw.submit(interrupt(hs_endpoint(2, 3, Direction::In, 8), 8));

	// Bulk still gets the remaining channel
	let h = fw.submit(bulk(hs_endpoint(2, 6, Direction::In, 512), 512));
	fw.complete_only(XFERCOMP);
	assert_eq!(fw.completion(h).status, TransferStatus::Success);
}

/// Requests that can never be carried out are refused at submission
#[test]
fn submit_validation()
{
	let fw = TestFramework::new("submit_validation");
	let ep = hs_endpoint(2, 0, Direction::Out, 64);

	let mut req = control(ep, get_descriptor(8), 8);
	req.kind = TransferKind::Control { setup: None };
	assert_eq!(fw.try_submit(req).err(), Some(SubmitError::MissingSetup));

	assert_eq!(fw.try_submit(isoc(hs_endpoint(2, 1, Direction::In, 64), &[])).err(), Some(SubmitError::ZeroFrames));

	let mut req = isoc(hs_endpoint(2, 1, Direction::In, 64), &[64, 64]);
	req.length = 100;
	assert_eq!(fw.try_submit(req).err(), Some(SubmitError::InvalidPacket));

	let mut no_tt = fs_endpoint(3, 1, Direction::In, 64);
	no_tt.tt = None;
	assert_eq!(fw.try_submit(bulk(no_tt, 64)).err(), Some(SubmitError::NoTransactionTranslator));

	assert_eq!(fw.try_submit(bulk(hs_endpoint(2, 1, Direction::In, 0), 64)).err(), Some(SubmitError::InvalidEndpoint));

	// The same endpoint can't be used as two transfer types at once
	let _ = fw.submit(bulk(hs_endpoint(2, 2, Direction::In, 64), 64));
	assert_eq!(fw.try_submit(interrupt(hs_endpoint(2, 2, Direction::In, 64), 64)).err(), Some(SubmitError::InvalidEndpoint));

	assert!(fw.completions().is_empty());
	assert_eq!(fw.program_count(), 1);
}

/// A completion callback can queue the next request on the same controller
#[test]
fn resubmit_from_callback()
{
	let fw = TestFramework::new("resubmit_from_callback");
	let ep = hs_endpoint(2, 1, Direction::In, 64);
	let count = Arc::new(Mutex::new(0));

	fn start(hc: &Arc<HostController<MockHardware>>, ep: EndpointDesc, count: &Arc<Mutex<u32>>)
	{
		let state = Arc::new( (Arc::downgrade(hc), count.clone(), ep) );
		let res = hc.submit(bulk(ep, 64), move |_, c| {
			assert_eq!(c.status, TransferStatus::Success);
			let n = {
				let mut lh = state.1.lock().unwrap();
				*lh += 1;
				*lh
				};
			if n < 5 {
				if let Some(hc) = state.0.upgrade() {
					start(&hc, state.2, &state.1);
				}
			}
			});
		assert!(res.is_ok());
	}
	start(&fw.hc, ep, &count);

	for i in 0 .. 5 {
		assert_eq!(*count.lock().unwrap(), i);
		fw.complete_only(XFERCOMP);
	}
	assert_eq!(*count.lock().unwrap(), 5);
	assert!(fw.running().is_empty());
	assert!(fw.hc.is_idle());
}
