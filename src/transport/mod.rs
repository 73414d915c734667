//! Transport: tempo, play state and musical position shared with nodes.

pub mod clock;
pub mod playhead;
pub mod timer;

pub use clock::{TransportClock, interval_for_bpm};
pub use playhead::{PlayHead, PlayHeadState, SharedPlayHead};
pub use timer::PeriodicTimer;
