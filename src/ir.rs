use crate::Digit;
use core::fmt;
use heapless::{consts::U8, spsc};
use infrared::protocols::nec::Nec16Command;
use infrared::{protocols::nec::Nec16, PeriodicReceiver};

/// Rate the receiver pin is sampled at, from the timer interrupt
pub const IR_SAMPLE_RATE: u32 = 20_000;

/// Command code of digit 1, codes up to `HIGH_NUM` map to 2..9
pub const LOW_NUM: u8 = 16;
/// Command code of digit 0
pub const HIGH_NUM: u8 = 25;
pub const ENTER: u8 = 251;
pub const DEL: u8 = 254;
pub const OFF: u8 = 61;
pub const STOP: u8 = 0;

pub type IrReceiver<RecvrPin> = PeriodicReceiver<Nec16, RecvrPin>;

/// Decoded commands, filled from the sampling interrupt and drained by the main loop
pub struct IrCommandQueue(spsc::Queue<IrCommand, U8, u8, spsc::SingleCore>);

impl IrCommandQueue {
    pub const fn new() -> Self {
        IrCommandQueue(spsc::Queue(unsafe { heapless::i::Queue::u8_sc() }))
    }

    pub fn dequeue(&mut self) -> Option<IrCommand> {
        self.0.dequeue()
    }

    pub fn enqueue(&mut self, item: IrCommand) -> Result<(), IrCommand> {
        self.0.enqueue(item)
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct IrCommand {
    pub button: Button,
    pub repeat: bool,
}

impl IrCommand {
    pub fn new(code: u8, repeat: bool) -> Self {
        IrCommand {
            button: Button::from_code(code),
            repeat,
        }
    }
}

impl fmt::Display for IrCommand {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "IrCommand {{ {}, repeat: {} }}",
            self.button, self.repeat
        )
    }
}

impl From<Nec16Command> for IrCommand {
    fn from(c: Nec16Command) -> Self {
        IrCommand::new(c.cmd, c.repeat)
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub enum Button {
    Digit(Digit),
    Enter,
    Delete,
    Stop,
    Off,
    Unknown(u8),
}

impl Button {
    pub fn from_code(code: u8) -> Self {
        match code {
            HIGH_NUM => Button::Digit(Digit::ZERO),
            LOW_NUM..=HIGH_NUM => match Digit::new(code - LOW_NUM + 1) {
                Some(d) => Button::Digit(d),
                None => Button::Unknown(code),
            },
            ENTER => Button::Enter,
            DEL => Button::Delete,
            STOP => Button::Stop,
            OFF => Button::Off,
            _ => Button::Unknown(code),
        }
    }
}

impl fmt::Display for Button {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}
