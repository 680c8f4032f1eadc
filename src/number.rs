use core::fmt;

/// Exclusive upper bound of the edit buffer
pub const MAX: u16 = 256;

/// A single decimal digit, 0..=9
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
#[repr(transparent)]
pub struct Digit(u8);

impl Digit {
    pub const ZERO: Self = Digit(0);

    pub fn new(value: u8) -> Option<Self> {
        if value <= 9 {
            Some(Digit(value))
        } else {
            None
        }
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl fmt::Display for Digit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The number being typed on the remote, always below [`MAX`]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default)]
#[repr(transparent)]
pub struct EditBuffer(u16);

impl EditBuffer {
    pub const EMPTY: Self = EditBuffer(0);

    pub fn new(value: u16) -> Option<Self> {
        if value < MAX {
            Some(EditBuffer(value))
        } else {
            None
        }
    }

    pub fn value(self) -> u16 {
        self.0
    }

    /// Skips the limit check, for exercising the over-limit paths
    #[cfg(test)]
    pub(crate) fn over_limit(value: u16) -> Self {
        EditBuffer(value)
    }

    /// Shifts the buffer one decimal place left and appends `digit`.
    /// Returns `None` when the result would not stay below [`MAX`].
    pub fn with_digit(self, digit: Digit) -> Option<Self> {
        EditBuffer::new(self.0 * 10 + u16::from(digit.value()))
    }

    /// Drops the last decimal digit, 0 stays 0
    pub fn without_last_digit(self) -> Self {
        EditBuffer(self.0 / 10)
    }

    /// Packs the buffer into the two-group display format.
    ///
    /// NOTE: this is not a decimal conversion. The low hex nibble becomes the
    /// low group and the remaining high bits become the high group, i.e.
    /// `(n / 16) * 100 + n % 16`. The display splits the result back apart at
    /// the hundreds boundary, so do not "fix" this into `n`.
    /// Returns `None` for a buffer at or above [`MAX`].
    pub fn long_format(self) -> Option<DisplayValue> {
        if self.0 < MAX {
            Some(DisplayValue((self.0 / 16) * 100 + self.0 % 16))
        } else {
            None
        }
    }
}

impl fmt::Display for EditBuffer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The committed number shown on the display, two groups packed as
/// `high * 100 + low`
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default)]
#[repr(transparent)]
pub struct DisplayValue(u16);

impl DisplayValue {
    pub const ZERO: Self = DisplayValue(0);

    pub fn value(self) -> u16 {
        self.0
    }

    pub fn high_group(self) -> u16 {
        self.0 / 100
    }

    pub fn low_group(self) -> u16 {
        self.0 % 100
    }

    /// Groups in display order, high (first digit) then low
    pub fn groups(self) -> [u16; 2] {
        [self.high_group(), self.low_group()]
    }
}

impl fmt::Display for DisplayValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
