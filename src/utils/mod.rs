//! Utility module

pub mod clock;
pub mod signals;

pub use clock::{Clock, SystemClock};
pub use signals::shutdown_signal;
