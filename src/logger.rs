//! Implementation of `Log` over an `embedded_hal::serial::Write<u8>` transmitter.
//!
//! Records are formatted into a fixed size byte queue and never wait on the
//! UART. Call [`Logger::drain`] from the idle parts of the control loop to
//! move queued bytes out while the transmitter has room.
//! Single core/thread only, don't log from an interrupt handler either.

use core::cell::UnsafeCell;
use core::fmt::{self, Write};
use embedded_hal::serial;
use heapless::{consts::U256, spsc::Queue};
use log::{LevelFilter, Metadata, Record};
use nb::block;

/// Debug output is too chatty for the serial link, keep the firmware at info
pub const DEFAULT_LOG_LEVEL: LevelFilter = LevelFilter::Info;

pub type LogBuffer = Queue<u8, U256>;

pub struct Logger<T> {
    inner: UnsafeCell<Inner<T>>,
}

struct Inner<T> {
    stdout: Option<T>,
    pending: Option<LogBuffer>,
    dropped: usize,
}

unsafe impl<T> Sync for Logger<T> {}

impl<T> Logger<T> {
    pub const fn new() -> Self {
        Logger {
            inner: UnsafeCell::new(Inner {
                stdout: None,
                pending: None,
                dropped: 0,
            }),
        }
    }

    /// # Safety
    /// Must not race with `log` calls, set it once before `log::set_logger`
    pub unsafe fn set_inner(&self, inner: T) {
        let i = &mut *self.inner.get();
        let _ = i.stdout.replace(inner);
        i.pending.get_or_insert_with(Queue::new);
    }

    /// Bytes lost because the queue was full, since startup
    pub fn dropped(&self) -> usize {
        unsafe { &*self.inner.get() }.dropped
    }
}

impl<T: serial::Write<u8>> Logger<T> {
    /// Writes queued bytes until the transmitter reports busy, never blocks
    pub fn drain(&self) {
        let inner = unsafe { &mut *self.inner.get() };
        if let (Some(stdout), Some(pending)) = (&mut inner.stdout, &mut inner.pending) {
            loop {
                let b = match pending.iter().next() {
                    Some(&b) => b,
                    None => break,
                };
                match stdout.write(b) {
                    Ok(()) => {
                        pending.dequeue();
                    }
                    Err(_) => break,
                }
            }
        }
    }
}

/// The line format of every record
pub(crate) fn write_record<W: Write>(w: &mut W, record: &Record) -> fmt::Result {
    write!(w, "[{}] {}\r\n", record.level(), record.args())
}

impl<T: Send + serial::Write<u8>> log::Log for Logger<T> {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    /// Filtering is left to `log::set_max_level`
    fn log(&self, record: &Record) {
        let inner = unsafe { &mut *self.inner.get() };
        write_record(inner, record).ok();
    }

    /// Blocks until everything queued is out
    fn flush(&self) {
        let inner = unsafe { &mut *self.inner.get() };
        if let (Some(stdout), Some(pending)) = (&mut inner.stdout, &mut inner.pending) {
            while let Some(b) = pending.dequeue() {
                block!(stdout.write(b)).ok();
            }
            block!(stdout.flush()).ok();
        }
    }
}

impl<T> fmt::Write for Inner<T> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        if let Some(pending) = &mut self.pending {
            for c in s.as_bytes() {
                if pending.enqueue(*c).is_err() {
                    self.dropped += 1;
                }
            }
        }
        Ok(())
    }
}
