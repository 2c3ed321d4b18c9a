//! The control surface: pin abstraction, rotary encoders, debounced
//! switches, and the bank-switched mapping onto engine parameters.

pub mod encoder;
pub mod pins;
pub mod surface;
pub mod switch;

pub use pins::{Level, PinReader, StaticPins};
pub use surface::{Bank, ControlSurface, Parameters};
