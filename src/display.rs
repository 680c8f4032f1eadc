use crate::DisplayValue;
use embedded_hal::blocking::delay::DelayMs;
use embedded_hal::digital::v2::OutputPin;
use err_derive::Error;
use log::trace;

pub const SEGMENT_COUNT: usize = 8;
pub const DIGIT_COUNT: usize = 2;

/// How long each digit stays lit per refresh, larger values flicker
pub const MULTIPLEX_HOLD_MS: u16 = 10;

/// On/off state of each segment line, in line order G F E D C B A DP
pub type SegmentPattern = [bool; SEGMENT_COUNT];

const O: bool = false;
const I: bool = true;

/// Glyphs for the hex symbols 0-9, A b C d E F
#[rustfmt::skip]
pub const SEGMENT_PATTERNS: [SegmentPattern; 16] = [
    [O, I, I, I, I, I, I, O], // 0
    [O, O, O, O, I, I, O, O], // 1
    [I, O, I, I, O, I, I, O], // 2
    [I, O, O, I, I, I, I, O], // 3
    [I, I, O, O, I, I, O, O], // 4
    [I, I, O, I, I, O, I, O], // 5
    [I, I, I, I, I, O, I, O], // 6
    [O, O, O, O, I, I, I, O], // 7
    [I, I, I, I, I, I, I, O], // 8
    [I, I, O, I, I, I, I, O], // 9
    [I, I, I, O, I, I, I, O], // A
    [I, I, I, I, I, O, O, O], // b
    [O, I, I, I, O, O, I, O], // C
    [I, O, I, I, I, I, O, O], // d
    [I, I, I, I, O, O, I, O], // E
    [I, I, I, O, O, O, I, O], // F
];

/// Pattern for a symbol value, `None` outside 0..=15
pub fn segment_pattern(symbol: u16) -> Option<&'static SegmentPattern> {
    SEGMENT_PATTERNS.get(usize::from(symbol))
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Error)]
pub enum Error {
    #[error(display = "Hw GPIO error")]
    Gpio,
}

/// Two digit, eight segment display sharing its segment lines.
///
/// Each digit has its own ground (common) line, driven low to light it.
/// Only one digit is lit at a time, so [`Display::render`] has to be called
/// continuously for both to appear on.
pub struct Display<SEG, GND, DELAY> {
    segments: [SEG; SEGMENT_COUNT],
    grounds: [GND; DIGIT_COUNT],
    delay: DELAY,
}

impl<SEG, GND, DELAY> Display<SEG, GND, DELAY>
where
    SEG: OutputPin,
    GND: OutputPin,
    DELAY: DelayMs<u16>,
{
    pub fn new(
        segments: [SEG; SEGMENT_COUNT],
        grounds: [GND; DIGIT_COUNT],
        delay: DELAY,
    ) -> Self {
        Display {
            segments,
            grounds,
            delay,
        }
    }

    /// Turns both digits off
    pub fn blank(&mut self) -> Result<(), Error> {
        for gnd in self.grounds.iter_mut() {
            gnd.set_high().map_err(|_| Error::Gpio)?;
        }
        Ok(())
    }

    /// One multiplex pass: the high group on the first digit, then the low
    /// group on the second, each held for [`MULTIPLEX_HOLD_MS`]
    pub fn render(&mut self, value: DisplayValue) -> Result<(), Error> {
        for (position, &symbol) in value.groups().iter().enumerate() {
            self.show_digit(position, symbol)?;
            self.delay.delay_ms(MULTIPLEX_HOLD_MS);
        }
        Ok(())
    }

    fn show_digit(&mut self, position: usize, symbol: u16) -> Result<(), Error> {
        let pattern = match segment_pattern(symbol) {
            Some(p) => p,
            None => {
                trace!("No glyph for {} on digit {}", symbol, position);
                return Ok(());
            }
        };

        for (index, gnd) in self.grounds.iter_mut().enumerate() {
            if index == position {
                gnd.set_low().map_err(|_| Error::Gpio)?;
            } else {
                gnd.set_high().map_err(|_| Error::Gpio)?;
            }
        }

        for (seg, &on) in self.segments.iter_mut().zip(pattern.iter()) {
            if on {
                seg.set_high().map_err(|_| Error::Gpio)?;
            } else {
                seg.set_low().map_err(|_| Error::Gpio)?;
            }
        }
        Ok(())
    }
}
