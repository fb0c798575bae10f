//! Scale table and degree math

use serde::{Deserialize, Serialize};

/// Number of degrees in every scale in the table
pub const DEGREES_PER_SCALE: usize = 7;

// ============================================================================
// Scale Degree
// ============================================================================

/// Diatonic degree index within a 7-note scale (0-6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub struct ScaleDegree(u8);

impl ScaleDegree {
    pub const ALL: [ScaleDegree; 7] = [
        ScaleDegree(0),
        ScaleDegree(1),
        ScaleDegree(2),
        ScaleDegree(3),
        ScaleDegree(4),
        ScaleDegree(5),
        ScaleDegree(6),
    ];

    /// Build a degree, clamping out-of-range input to the top degree
    pub fn new(degree: u8) -> Self {
        Self(degree.min(DEGREES_PER_SCALE as u8 - 1))
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl From<u8> for ScaleDegree {
    fn from(value: u8) -> Self {
        Self::new(value)
    }
}

impl From<ScaleDegree> for u8 {
    fn from(degree: ScaleDegree) -> Self {
        degree.0
    }
}

// ============================================================================
// Scale Table
// ============================================================================

/// Scale/mode types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "&'static str")]
pub enum ScaleMode {
    #[default]
    Major,
    Minor,
    Dorian,
    Phrygian,
    Lydian,
    Mixolydian,
    Locrian,
    HarmonicMinor,
    MelodicMinor,
}

impl ScaleMode {
    pub const ALL: [ScaleMode; 9] = [
        ScaleMode::Major,
        ScaleMode::Minor,
        ScaleMode::Dorian,
        ScaleMode::Phrygian,
        ScaleMode::Lydian,
        ScaleMode::Mixolydian,
        ScaleMode::Locrian,
        ScaleMode::HarmonicMinor,
        ScaleMode::MelodicMinor,
    ];

    /// Get scale intervals (semitones from the tonic)
    pub fn intervals(&self) -> &'static [i32; DEGREES_PER_SCALE] {
        match self {
            Self::Major => &[0, 2, 4, 5, 7, 9, 11],
            Self::Minor => &[0, 2, 3, 5, 7, 8, 10],
            Self::Dorian => &[0, 2, 3, 5, 7, 9, 10],
            Self::Phrygian => &[0, 1, 3, 5, 7, 8, 10],
            Self::Lydian => &[0, 2, 4, 6, 7, 9, 11],
            Self::Mixolydian => &[0, 2, 4, 5, 7, 9, 10],
            Self::Locrian => &[0, 1, 3, 5, 6, 8, 10],
            Self::HarmonicMinor => &[0, 2, 3, 5, 7, 8, 11],
            Self::MelodicMinor => &[0, 2, 3, 5, 7, 9, 11],
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Major => "Major",
            Self::Minor => "Minor",
            Self::Dorian => "Dorian",
            Self::Phrygian => "Phrygian",
            Self::Lydian => "Lydian",
            Self::Mixolydian => "Mixolydian",
            Self::Locrian => "Locrian",
            Self::HarmonicMinor => "Harmonic Minor",
            Self::MelodicMinor => "Melodic Minor",
        }
    }

    /// Look up a scale by display name.
    ///
    /// Case, spaces, dashes and underscores are ignored. "Aeolian" and
    /// "Ionian" alias Minor and Major. Anything unrecognized is Major.
    pub fn from_name(name: &str) -> Self {
        let key: String = name
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '_'))
            .flat_map(char::to_lowercase)
            .collect();

        match key.as_str() {
            "major" | "ionian" => Self::Major,
            "minor" | "naturalminor" | "aeolian" => Self::Minor,
            "dorian" => Self::Dorian,
            "phrygian" => Self::Phrygian,
            "lydian" => Self::Lydian,
            "mixolydian" => Self::Mixolydian,
            "locrian" => Self::Locrian,
            "harmonicminor" => Self::HarmonicMinor,
            "melodicminor" => Self::MelodicMinor,
            _ => {
                tracing::debug!(scale = name, "Unknown scale name, using Major");
                Self::Major
            }
        }
    }

    /// Semitone offset of a degree from the tonic, with octave carry
    pub fn degree_offset(&self, degree: i32) -> i32 {
        scale_degree_offset(self.intervals(), degree)
    }
}

impl From<String> for ScaleMode {
    fn from(name: String) -> Self {
        Self::from_name(&name)
    }
}

impl From<ScaleMode> for &'static str {
    fn from(scale: ScaleMode) -> Self {
        scale.name()
    }
}

/// Semitone offset of `degree` within `intervals`.
///
/// Degrees past the end wrap with a +12 carry per octave, so degree 7 of a
/// 7-note scale is the tonic an octave up. Negative degrees carry downward.
pub fn scale_degree_offset(intervals: &[i32], degree: i32) -> i32 {
    if intervals.is_empty() {
        return 0;
    }
    let len = intervals.len() as i32;
    let normalized = degree.rem_euclid(len);
    let octave = degree.div_euclid(len);
    intervals[normalized as usize] + octave * 12
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_scale_has_seven_ascending_degrees() {
        for scale in ScaleMode::ALL {
            let intervals = scale.intervals();
            assert_eq!(intervals[0], 0, "{} must start on the tonic", scale.name());
            assert!(intervals.windows(2).all(|w| w[0] <= w[1]));
            assert!(intervals[6] < 12);
        }
    }

    #[test]
    fn degree_offset_carries_octaves() {
        let major = ScaleMode::Major;
        assert_eq!(major.degree_offset(0), 0);
        assert_eq!(major.degree_offset(4), 7);
        assert_eq!(major.degree_offset(7), 12);
        assert_eq!(major.degree_offset(9), 16);
        assert_eq!(major.degree_offset(-1), -1);
    }

    #[test]
    fn unknown_scale_names_fall_back_to_major() {
        assert_eq!(ScaleMode::from_name("harmonic-minor"), ScaleMode::HarmonicMinor);
        assert_eq!(ScaleMode::from_name("Melodic Minor"), ScaleMode::MelodicMinor);
        assert_eq!(ScaleMode::from_name("AEOLIAN"), ScaleMode::Minor);
        assert_eq!(ScaleMode::from_name("bebop"), ScaleMode::Major);
        assert_eq!(ScaleMode::from_name(""), ScaleMode::Major);
    }

    #[test]
    fn scale_degree_clamps_out_of_range() {
        assert_eq!(ScaleDegree::new(3).value(), 3);
        assert_eq!(ScaleDegree::new(12).value(), 6);
        assert_eq!(ScaleDegree::from(7u8), ScaleDegree::new(6));
    }
}
