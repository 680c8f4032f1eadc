use core::sync::atomic::{AtomicU32, Ordering::SeqCst};
use embedded_hal::blocking::delay::DelayMs;
#[cfg(feature = "firmware")]
use hal::{rcc::Clocks, stm32::SYST};
#[cfg(feature = "firmware")]
use log::debug;

/// Milliseconds
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
#[repr(transparent)]
pub struct Instant(u32);

impl Instant {
    pub fn from_millis(ms: u32) -> Self {
        Instant(ms)
    }
}

/// Milliseconds
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
#[repr(transparent)]
pub struct Duration(u32);

impl Duration {
    pub const fn from_millis(ms: u32) -> Self {
        Duration(ms)
    }
}

/// 32-bit millisecond clock
#[derive(Debug)]
pub struct SystemClock(AtomicU32);

unsafe impl Send for SystemClock {}
unsafe impl Sync for SystemClock {}

impl SystemClock {
    pub const fn new() -> Self {
        SystemClock(AtomicU32::new(0))
    }

    #[cfg(feature = "firmware")]
    pub fn enable_systick_interrupt(&self, mut syst: SYST, clocks: Clocks) {
        debug!("Enable SystemClock hclk freq {} Hz", clocks.hclk().0);

        // Generate an interrupt once a millisecond, HCLK/8/1000
        syst.set_reload((clocks.hclk().0 / 8) / 1000);
        syst.clear_current();
        syst.enable_counter();
        syst.enable_interrupt();

        // So the SYST can't be stopped or reset
        drop(syst);
    }

    pub fn inc_from_interrupt(&self) {
        self.0.fetch_add(1, SeqCst);
    }

    pub fn now(&self) -> Instant {
        Instant::from_millis(self.0.load(SeqCst))
    }

    /// Elapsed time since `earlier`, correct across the counter wrapping
    pub fn duration_since(&self, earlier: Instant) -> Duration {
        Duration(self.now().0.wrapping_sub(earlier.0))
    }
}

/// Busy-wait delay on top of a running [`SystemClock`].
/// `idle` is called while waiting, it must return quickly.
#[derive(Copy, Clone, Debug)]
pub struct SysTickDelay {
    clock: &'static SystemClock,
    idle: fn(),
}

impl SysTickDelay {
    pub fn new(clock: &'static SystemClock, idle: fn()) -> Self {
        SysTickDelay { clock, idle }
    }
}

impl DelayMs<u16> for SysTickDelay {
    fn delay_ms(&mut self, ms: u16) {
        let start = self.clock.now();
        let dur = Duration::from_millis(u32::from(ms));
        while self.clock.duration_since(start) < dur {
            (self.idle)();
        }
    }
}
