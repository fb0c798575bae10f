//! Where triggers go once the instrument emits them

use crossbeam_channel::Sender;
use tracing::info;

use chordloop_core::Trigger;

/// Consumer of instrument triggers, usually the synthesis layer
pub trait TriggerSink: Send {
    /// Deliver one trigger. Returns false once the consumer has gone away.
    fn send(&mut self, trigger: Trigger) -> bool;
}

impl TriggerSink for Sender<Trigger> {
    fn send(&mut self, trigger: Trigger) -> bool {
        Sender::send(self, trigger).is_ok()
    }
}

/// Logs every trigger; stands in for a synth when running headless
#[derive(Debug, Default)]
pub struct TracingSink {
    pub sent: usize,
}

impl TriggerSink for TracingSink {
    fn send(&mut self, trigger: Trigger) -> bool {
        self.sent += 1;
        let notes: Vec<String> = trigger.notes.iter().map(|n| n.to_string()).collect();
        info!(
            time = %format!("{:.3}", trigger.time),
            degree = trigger.context.degree.value(),
            chord = %trigger.context.roman_numeral,
            notes = %notes.join(" "),
            bass = ?trigger.context.bass.map(|n| n.to_string()),
            velocity = trigger.velocity,
            sustain = %format!("{:.3}", trigger.sustain),
            "Trigger"
        );
        true
    }
}
