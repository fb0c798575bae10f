//! chordloop-services: real-time transport runner and trigger delivery

pub mod runner;
pub mod sink;

pub use runner::{RunnerError, TransportRunner};
pub use sink::{TracingSink, TriggerSink};
