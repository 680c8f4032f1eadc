#![cfg_attr(not(test), no_std)]

#[cfg(feature = "firmware")]
pub extern crate stm32f3xx_hal as hal;

mod controller;
mod display;
mod ir;
mod logger;
mod number;
mod system_clock;

pub use controller::*;
pub use display::*;
pub use ir::*;
pub use logger::*;
pub use number::*;
pub use system_clock::*;
