//! Arpeggiator session settings

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::transport::{ClockInterval, Subdivision};

/// Order in which chord tones are played
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "&'static str")]
pub enum ArpStyle {
    #[default]
    Up,
    Down,
    UpDown,
    Random,
    /// Plays each tone once, ascending, then stops
    Unfold,
}

impl ArpStyle {
    pub const ALL: [ArpStyle; 5] = [
        ArpStyle::Up,
        ArpStyle::Down,
        ArpStyle::UpDown,
        ArpStyle::Random,
        ArpStyle::Unfold,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::UpDown => "up-down",
            Self::Random => "random",
            Self::Unfold => "unfold",
        }
    }

    /// Unknown names are Up
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().replace(['_', ' ', '/'], "-").as_str() {
            "down" => Self::Down,
            "up-down" | "updown" => Self::UpDown,
            "random" => Self::Random,
            "unfold" => Self::Unfold,
            _ => Self::Up,
        }
    }

    /// Every style loops except Unfold
    pub fn is_cyclic(&self) -> bool {
        !matches!(self, Self::Unfold)
    }
}

impl fmt::Display for ArpStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<String> for ArpStyle {
    fn from(name: String) -> Self {
        Self::from_name(&name)
    }
}

impl From<ArpStyle> for &'static str {
    fn from(style: ArpStyle) -> Self {
        style.name()
    }
}

/// Tempo-synced subdivisions or a fixed millisecond rate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimingMode {
    #[default]
    Sync,
    Free,
}

/// Live arpeggiator parameters. Every field has an explicit default and
/// [`SessionSettings::normalized`] pulls values back into range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Octave span, 1-4
    pub octaves: u8,
    pub style: ArpStyle,
    pub timing_mode: TimingMode,
    pub rate_sync: Subdivision,
    pub rate_free_ms: f64,
    /// Fraction of the interval a note sounds, 0.1-1.0
    pub gate: f64,
    /// Fixed hold time in seconds, replacing the gate when set
    pub sustain_override: Option<f64>,
    pub latch: bool,
    /// Only fire on steps where the kick or snare hits (sync mode only)
    pub autopilot: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            octaves: 1,
            style: ArpStyle::Up,
            timing_mode: TimingMode::Sync,
            rate_sync: Subdivision::SIXTEENTH,
            rate_free_ms: 250.0,
            gate: 0.8,
            sustain_override: None,
            latch: false,
            autopilot: false,
        }
    }
}

impl SessionSettings {
    pub const MAX_OCTAVES: u8 = 4;
    pub const MIN_GATE: f64 = 0.1;
    pub const MIN_FREE_MS: f64 = 20.0;
    pub const MAX_FREE_MS: f64 = 4000.0;

    pub fn normalized(mut self) -> Self {
        self.octaves = self.octaves.clamp(1, Self::MAX_OCTAVES);
        self.gate = if self.gate.is_nan() { 0.8 } else { self.gate.clamp(Self::MIN_GATE, 1.0) };
        self.rate_free_ms = if self.rate_free_ms.is_finite() {
            self.rate_free_ms.clamp(Self::MIN_FREE_MS, Self::MAX_FREE_MS)
        } else {
            250.0
        };
        self.sustain_override = self.sustain_override.filter(|s| s.is_finite() && *s > 0.0);
        if self.autopilot && self.timing_mode == TimingMode::Free {
            tracing::debug!("Autopilot needs a step grid, ignoring it in free timing");
            self.autopilot = false;
        }
        self
    }

    /// Clock interval for the current timing mode
    pub fn interval(&self) -> ClockInterval {
        match self.timing_mode {
            TimingMode::Sync => ClockInterval::Subdivision(self.rate_sync),
            TimingMode::Free => ClockInterval::Millis(self.rate_free_ms),
        }
    }

    /// Whether ticks are gated by the rhythm mask
    pub fn autopilot_active(&self) -> bool {
        self.autopilot && self.timing_mode == TimingMode::Sync
    }

    /// How long each note is held, given the tick interval
    pub fn hold_secs(&self, interval_secs: f64) -> f64 {
        let gate = self.gate.clamp(Self::MIN_GATE, 1.0);
        let hold = self.sustain_override.unwrap_or(interval_secs * gate);
        hold.max(Self::MIN_GATE * interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn style_names_round_trip() {
        for style in ArpStyle::ALL {
            assert_eq!(ArpStyle::from_name(style.name()), style);
        }
        assert_eq!(ArpStyle::from_name("Up_Down"), ArpStyle::UpDown);
        assert_eq!(ArpStyle::from_name("sideways"), ArpStyle::Up);
    }

    #[test]
    fn normalized_clamps_ranges() {
        let settings = SessionSettings {
            octaves: 0,
            gate: 0.0,
            rate_free_ms: 1.0,
            sustain_override: Some(-1.0),
            ..Default::default()
        }
        .normalized();
        assert_eq!(settings.octaves, 1);
        assert_eq!(settings.gate, 0.1);
        assert_eq!(settings.rate_free_ms, 20.0);
        assert_eq!(settings.sustain_override, None);

        let wide = SessionSettings { octaves: 9, gate: 4.0, ..Default::default() }.normalized();
        assert_eq!(wide.octaves, 4);
        assert_eq!(wide.gate, 1.0);
    }

    #[test]
    fn autopilot_is_dropped_in_free_timing() {
        let settings = SessionSettings {
            autopilot: true,
            timing_mode: TimingMode::Free,
            ..Default::default()
        }
        .normalized();
        assert!(!settings.autopilot);
        assert!(!settings.autopilot_active());

        let synced = SessionSettings { autopilot: true, ..Default::default() }.normalized();
        assert!(synced.autopilot_active());
    }

    #[test]
    fn hold_uses_gate_override_and_floor() {
        let mut settings = SessionSettings { gate: 0.5, ..Default::default() };
        assert!((settings.hold_secs(0.125) - 0.0625).abs() < 1e-9);

        settings.sustain_override = Some(1.0);
        assert!((settings.hold_secs(0.125) - 1.0).abs() < 1e-9);

        settings.sustain_override = Some(0.001);
        assert!((settings.hold_secs(0.125) - 0.0125).abs() < 1e-9);
    }

    #[test]
    fn interval_follows_timing_mode() {
        let mut settings = SessionSettings::default();
        assert_eq!(settings.interval(), ClockInterval::Subdivision(Subdivision::SIXTEENTH));
        settings.timing_mode = TimingMode::Free;
        settings.rate_free_ms = 180.0;
        assert_eq!(settings.interval(), ClockInterval::Millis(180.0));
    }

    #[test]
    fn deserializes_partial_settings() {
        let settings: SessionSettings =
            serde_json::from_str(r#"{"style": "up-down", "rate_sync": "8n", "octaves": 2}"#).unwrap();
        assert_eq!(settings.style, ArpStyle::UpDown);
        assert_eq!(settings.rate_sync, Subdivision::EIGHTH);
        assert_eq!(settings.octaves, 2);
        assert!(!settings.latch);
    }
}
