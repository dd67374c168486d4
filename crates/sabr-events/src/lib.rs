#![forbid(unsafe_code)]

//! Event bus for observing a SABR playback session.

mod bus;
mod event;

pub use bus::EventBus;
pub use event::SabrEvent;
