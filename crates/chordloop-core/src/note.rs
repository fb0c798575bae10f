//! Note names and MIDI numbers

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ChordloopError;

const SHARP_NAMES: [&str; 12] = ["C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B"];

/// A pitch as a MIDI note number (60 = C4).
///
/// Parsed from and displayed as scientific pitch names. Values are not
/// clamped to 0-127 so chord math can run past the keyboard edges; callers
/// that talk to MIDI hardware clamp at the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Note(pub i32);

impl Note {
    /// Middle C
    pub const C4: Note = Note(60);

    pub fn midi(self) -> i32 {
        self.0
    }

    pub fn transpose(self, semitones: i32) -> Note {
        Note(self.0 + semitones)
    }

    /// Pitch class name without octave, e.g. "F#"
    pub fn pitch_class(self) -> &'static str {
        SHARP_NAMES[self.0.rem_euclid(12) as usize]
    }

    pub fn octave(self) -> i32 {
        self.0.div_euclid(12) - 1
    }

    /// Parse a note name, falling back to `default` when it is malformed.
    pub fn parse_or(name: &str, default: Note) -> Note {
        name.parse().unwrap_or(default)
    }
}

impl Default for Note {
    fn default() -> Self {
        Note::C4
    }
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.pitch_class(), self.octave())
    }
}

impl FromStr for Note {
    type Err = ChordloopError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ChordloopError::InvalidNote(s.to_string());
        let trimmed = s.trim();
        let mut chars = trimmed.chars();

        let letter = chars.next().ok_or_else(invalid)?;
        let base = match letter.to_ascii_uppercase() {
            'C' => 0,
            'D' => 2,
            'E' => 4,
            'F' => 5,
            'G' => 7,
            'A' => 9,
            'B' => 11,
            _ => return Err(invalid()),
        };

        let rest = chars.as_str();
        let mut rest_chars = rest.chars();
        let (accidental, octave_str) = match rest_chars.next() {
            Some('#' | '♯') => (1, rest_chars.as_str()),
            Some('b' | '♭') => (-1, rest_chars.as_str()),
            _ => (0, rest),
        };

        // Bare pitch classes sit in octave 4
        let octave = if octave_str.is_empty() {
            4
        } else {
            octave_str.parse::<i32>().map_err(|_| invalid())?
        };
        if !(-1..=9).contains(&octave) {
            return Err(invalid());
        }

        Ok(Note((octave + 1) * 12 + base + accidental))
    }
}

impl TryFrom<String> for Note {
    type Error = ChordloopError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Note> for String {
    fn from(note: Note) -> Self {
        note.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_scientific_pitch_names() {
        assert_eq!("C4".parse::<Note>().unwrap(), Note(60));
        assert_eq!("A4".parse::<Note>().unwrap(), Note(69));
        assert_eq!("C#3".parse::<Note>().unwrap(), Note(49));
        assert_eq!("Eb4".parse::<Note>().unwrap(), Note(63));
        assert_eq!("C-1".parse::<Note>().unwrap(), Note(0));
        assert_eq!("g".parse::<Note>().unwrap(), Note(67));
    }

    #[test]
    fn rejects_malformed_names() {
        assert!("H4".parse::<Note>().is_err());
        assert!("".parse::<Note>().is_err());
        assert!("C#x".parse::<Note>().is_err());
        assert!("C12".parse::<Note>().is_err());
        assert_eq!(Note::parse_or("nope", Note(48)), Note(48));
    }

    #[test]
    fn displays_with_sharps() {
        assert_eq!(Note(60).to_string(), "C4");
        assert_eq!(Note(63).to_string(), "D#4");
        assert_eq!(Note(0).to_string(), "C-1");
        assert_eq!(Note(71).to_string(), "B4");
    }

    #[test]
    fn serializes_as_name() {
        let json = serde_json::to_string(&Note(64)).unwrap();
        assert_eq!(json, "\"E4\"");
        let back: Note = serde_json::from_str("\"Bb3\"").unwrap();
        assert_eq!(back, Note(58));
    }
}
