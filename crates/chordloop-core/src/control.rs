//! Performance controls shared by the UI and the instrument

use serde::{Deserialize, Serialize};

use crate::chord_library::Complexity;
use crate::pattern::PatternId;

/// Knob and toggle state for one instrument.
///
/// `tone` and `dynamics` always sit in [0, 1]; use the setters or
/// [`ControlState::normalized`] after deserializing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlState {
    pub complexity: Complexity,
    /// Brightness hint forwarded to the synth
    pub tone: f32,
    /// Note velocity
    pub dynamics: f32,
    pub bass_enabled: bool,
    pub arp_enabled: bool,
    /// Pattern slot that recording writes into
    pub pattern_id: Option<PatternId>,
}

impl Default for ControlState {
    fn default() -> Self {
        Self {
            complexity: Complexity::Simple,
            tone: 0.5,
            dynamics: 0.8,
            bass_enabled: false,
            arp_enabled: true,
            pattern_id: None,
        }
    }
}

impl ControlState {
    pub fn new(
        complexity: Complexity,
        tone: f32,
        dynamics: f32,
        bass_enabled: bool,
        arp_enabled: bool,
        pattern_id: Option<PatternId>,
    ) -> Self {
        Self {
            complexity,
            tone: clamp_unit(tone),
            dynamics: clamp_unit(dynamics),
            bass_enabled,
            arp_enabled,
            pattern_id,
        }
    }

    pub fn normalized(self) -> Self {
        Self::new(
            self.complexity,
            self.tone,
            self.dynamics,
            self.bass_enabled,
            self.arp_enabled,
            self.pattern_id,
        )
    }

    pub fn set_tone(&mut self, tone: f32) {
        self.tone = clamp_unit(tone);
    }

    pub fn set_dynamics(&mut self, dynamics: f32) {
        self.dynamics = clamp_unit(dynamics);
    }
}

/// Clamp into [0, 1], mapping NaN to 0
pub(crate) fn clamp_unit(value: f32) -> f32 {
    if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) }
}
