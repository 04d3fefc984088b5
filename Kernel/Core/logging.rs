// "Tifflin" Kernel
// - By John Hodge (thePowersGang)
//
// Core/logging.rs
///! Logging framework
///!
///! All logging goes through this module, using the `log_*` macros, each corresponding
///! to a one of the logging levels in `Levels`.
#[allow(unused_imports)]
use crate::prelude::*;
use core::fmt;
use crate::sync::Spinlock;
use crate::time::TickCount;

/// Log level, ranging from a panic down to tracing
#[repr(u16)]
#[derive(PartialEq,PartialOrd,Copy,Clone,Debug)]
pub enum Level
{
	/// Everything broke
	Panic = 0,
	/// Something broke
	Error = 1,
	/// Recoverable
	Warning = 2,
 	/// Odd
	Notice = 3,
   	/// Interesting (least important for the user)
	Info = 4,
	/// General (highest developer-only level)
	Log = 5,
   	/// What
	Debug = 6,
  	/// Where
	Trace = 7,
}

enum Colour
{
	Default,
	Red,
	Yellow,
	Green,
	Blue,
	Purple,
	Grey,
}

#[doc(hidden)]
pub struct LoggingFormatter<'a>
{
	lock_handle: crate::sync::HeldSpinlock<'a,Sinks>,
}

/// Wrapper around a &-ptr that prints a hexdump of the passed data.
pub struct HexDump<'a,T: ?Sized + 'a>(pub &'a T);

static S_LOGGING_LOCK: Spinlock<Sinks> = Spinlock::new( Sinks { console: console::Sink, memory: None } );
static S_FILTERS: Spinlock<Filters> = Spinlock::new( Filters { max_level: Level::Debug, modules: [None; MAX_FILTERS] } );

const MAX_FILTERS: usize = 16;

trait Sink
{
	/// Start a new log entry
	fn start(&mut self, timestamp: TickCount, level: Level, source: &'static str);
	/// Append data to the current log entry
	fn write(&mut self, data: &str);
	/// End a log entry
	fn end(&mut self);
}
struct Sinks
{
	console: console::Sink,
	memory: Option<memory::Sink>,
}

struct Filters
{
	max_level: Level,
	modules: [Option<(&'static str, Level)>; MAX_FILTERS],
}

mod console
{
	use super::{Level,Colour};
	use crate::time::TickCount;
	use core::fmt;
	
	pub struct Sink;
	impl super::Sink for Sink
	{
		fn start(&mut self, timestamp: TickCount, level: Level, source: &'static str) {
			use core::fmt::Write;
			self.set_colour(level.to_colour());
			let _ = write!(self, "{:6}{} [{}] - ", timestamp, level, source);
		}
		fn write(&mut self, s: &str) {
			crate::arch::puts(s);
		}
		fn end(&mut self) {
			crate::arch::puts("\x1b[0m\n");
		}
	}
	impl fmt::Write for Sink
	{
		fn write_str(&mut self, s: &str) -> fmt::Result {
			crate::arch::puts(s);
			Ok( () )
		}
	}
	impl Sink
	{
		/// Set the output colour of the formatter
		pub(super) fn set_colour(&self, colour: Colour) {
			match colour
			{
			Colour::Default => crate::arch::puts("\x1b[0000m"),
			Colour::Red     => crate::arch::puts("\x1b[0031m"),
			Colour::Green   => crate::arch::puts("\x1b[0032m"),
			Colour::Yellow  => crate::arch::puts("\x1b[0033m"),
			Colour::Blue    => crate::arch::puts("\x1b[0034m"),
			Colour::Purple  => crate::arch::puts("\x1b[0035m"),
			Colour::Grey    => crate::arch::puts("\x1b[1;30m"),
			}
		}
	}
}

mod memory
{
	#[allow(unused_imports)]
	use crate::prelude::*;
	use crate::time::TickCount;
	use crate::lib::ring_buffer::RingBuf;
	use crate::lib::fixed_string::FixedString;
	use super::Level;
	
	pub struct Sink
	{
		lines: RingBuf<LogMessage>,
	}
	pub struct LogMessage
	{
		pub time: TickCount,
		pub level: Level,
		pub source: &'static str,
		pub data: FixedString<160>,
	}
	impl Sink
	{
		pub fn new(capacity: usize) -> Sink {
			Sink {
				lines: RingBuf::new(capacity),
			}
		}
		pub fn lines(&self) -> impl Iterator<Item=&LogMessage> {
			self.lines.iter()
		}
		pub fn clear(&mut self) {
			while let Some(_) = self.lines.pop_front() {
			}
		}
	}
	impl super::Sink for Sink
	{
		fn start(&mut self, timestamp: TickCount, level: Level, source: &'static str) {
			let new_line = LogMessage {
				time: timestamp, level: level, source: source,
				data: FixedString::new(),
				};
			// Oldest entries are discarded once the scrollback is full
			self.lines.push_back_overwrite( new_line );
		}
		fn write(&mut self, s: &str) {
			if let Some(l) = self.lines.back_mut() {
				l.data.push_str(s);
			}
		}
		fn end(&mut self) {
			// No action required
		}
	}
}

impl Level
{
	fn to_flag(&self) -> char
	{
		match *self
		{
		Level::Panic   => 'k',
		Level::Error   => 'e',
		Level::Warning => 'w',
		Level::Notice  => 'n',
		Level::Info    => 'i',
		Level::Log     => 'l',
		Level::Debug   => 'd',
		Level::Trace   => 't',
		}
	}
	fn to_colour(&self) -> Colour
	{
		match *self
		{
		Level::Panic   => Colour::Purple,
		Level::Error   => Colour::Red,
		Level::Warning => Colour::Yellow,
		Level::Notice  => Colour::Green,
		Level::Info    => Colour::Blue,
		Level::Log     => Colour::Default,
		Level::Debug   => Colour::Default,
		Level::Trace   => Colour::Grey,
		}
	}
}

impl fmt::Display for Level
{
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "{}", self.to_flag())
	}
}

impl Sinks
{
	fn foreach_mut<Fcn: FnMut(&mut dyn Sink)>(&mut self, mut f: Fcn)
	{
		f(&mut self.console);
		if let Some(x) = self.memory.as_mut() {
			f(x);
		}
	}
}

impl<'a> LoggingFormatter<'a>
{
	/// Create a new logging formatter
	pub fn new(level: Level, modname: &'static str) -> LoggingFormatter<'static>
	{
		let mut rv = LoggingFormatter {
				lock_handle: S_LOGGING_LOCK.lock()
			};
		let ts = crate::time::ticks();
		rv.lock_handle.foreach_mut(|x| x.start(ts, level, modname));
		rv
	}
}

impl<'a> fmt::Write for LoggingFormatter<'a>
{
	fn write_str(&mut self, s: &str) -> fmt::Result
	{
		self.lock_handle.foreach_mut(|x| x.write(s));
		Ok( () )
	}
}
impl<'a> ::core::ops::Drop for LoggingFormatter<'a>
{
	fn drop(&mut self)
	{
		self.lock_handle.foreach_mut(|x| x.end());
	}
}

impl<'a, T: ?Sized + 'a> HexDump<'a,T>
{
	/// Return the wrapped type as a &[u8]
	fn byteslice(&self) -> &[u8]
	{
		let size = ::core::mem::size_of_val::<T>(&self.0);
		// SAFE: Memory is valid, and cast is allowed
		unsafe { ::core::slice::from_raw_parts( self.0 as *const T as *const u8, size ) }
	}
}

impl<'a, T: ?Sized + 'a> fmt::Debug for HexDump<'a,T>
{
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result
	{
		let slice = self.byteslice();
		write!(f, "{} bytes: ", slice.len())?;
		for (idx,v) in slice.iter().enumerate()
		{
			write!(f, "{:02x} ", *v)?;
			if idx % 16 == 15 {
				write!(f, "| ")?;
			}
		}
		Ok( () )
	}
}

/// Start recording log entries into an in-memory scrollback of `capacity` lines
pub fn start_memory_sink(capacity: usize)
{
	let sink = memory::Sink::new(capacity);
	let mut lh = S_LOGGING_LOCK.lock();
	if lh.memory.is_none()
	{
		lh.memory = Some( sink );
	}
}

/// Visit each line held by the memory sink (oldest first), returns the number of lines
pub fn memory_foreach<F: FnMut(TickCount, Level, &'static str, &str)>(mut f: F) -> usize
{
	let lh = S_LOGGING_LOCK.lock();
	match lh.memory
	{
	Some(ref m) => {
		let mut count = 0;
		for l in m.lines() {
			f(l.time, l.level, l.source, l.data.as_str());
			count += 1;
		}
		count
		},
	None => 0,
	}
}

/// Discard the contents of the memory sink
pub fn memory_clear()
{
	let mut lh = S_LOGGING_LOCK.lock();
	if let Some(m) = lh.memory.as_mut() {
		m.clear();
	}
}

/// Set the least important level that is logged for modules without a filter
pub fn set_max_level(level: Level)
{
	S_FILTERS.lock().max_level = level;
}

/// Set the least important level logged for a module (and its children)
///
/// Returns `false` if the filter table is full
pub fn set_module_level(modname: &'static str, level: Level) -> bool
{
	let mut lh = S_FILTERS.lock();
	if let Some(ent) = lh.modules.iter_mut().flatten().find(|e| e.0 == modname) {
		ent.1 = level;
		return true;
	}
	match lh.modules.iter_mut().find(|e| e.is_none())
	{
	Some(slot) => {
		*slot = Some( (modname, level) );
		true
		},
	None => false,
	}
}

fn module_matches(filter: &str, modname: &str) -> bool
{
	modname == filter || (modname.starts_with(filter) && modname[filter.len()..].starts_with("::"))
}

#[doc(hidden)]
/// Returns true if the passed combination of module and level is enabled
pub fn enabled(level: Level, modname: &str) -> bool
{
	let lh = S_FILTERS.lock();
	// The longest matching filter wins
	let mut best: Option<(&str, Level)> = None;
	for &(name, lvl) in lh.modules.iter().flatten()
	{
		if module_matches(name, modname) && best.map(|b| b.0.len() < name.len()).unwrap_or(true) {
			best = Some( (name, lvl) );
		}
	}
	match best
	{
	Some( (_, lvl) ) => level <= lvl,
	None => level <= lh.max_level,
	}
}

#[doc(hidden)]
/// Returns a logging formatter
pub fn getstream(level: Level, modname: &'static str) -> LoggingFormatter<'static>
{
	LoggingFormatter::new(level, modname)
}


// vim: ft=rust
