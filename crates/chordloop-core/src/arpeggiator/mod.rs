//! Arpeggiator: settings, session state, and the clock-driven scheduler

mod scheduler;
mod session;
mod settings;

pub use scheduler::{ArpNote, ArpeggiatorScheduler, TickOutcome};
pub use session::{expand_pitches, ArpeggiatorSession};
pub use settings::{ArpStyle, SessionSettings, TimingMode};
