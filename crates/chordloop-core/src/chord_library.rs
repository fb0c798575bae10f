//! Roman-numeral chord library with diatonic and borrowed voicings

use serde::{Deserialize, Serialize};

use crate::error::{ChordloopError, Result};
use crate::scale::{ScaleDegree, DEGREES_PER_SCALE};

/// How much extension the diatonic voicing carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "&'static str")]
pub enum Complexity {
    #[default]
    Simple,
    Extended,
    Lush,
}

impl Complexity {
    pub const ALL: [Complexity; 3] = [Complexity::Simple, Complexity::Extended, Complexity::Lush];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::Extended => "extended",
            Self::Lush => "lush",
        }
    }

    /// Unknown names are Simple
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "extended" => Self::Extended,
            "lush" => Self::Lush,
            _ => Self::Simple,
        }
    }
}

impl From<String> for Complexity {
    fn from(name: String) -> Self {
        Self::from_name(&name)
    }
}

impl From<Complexity> for &'static str {
    fn from(complexity: Complexity) -> Self {
        complexity.name()
    }
}

/// A concrete interval stack realizing a chord
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChordVoicing {
    pub label: String,
    /// Semitones from the voicing's own root, conventionally starting at 0
    pub intervals: Vec<i32>,
    pub description: String,
    pub borrowed: bool,
    /// Mode the voicing is borrowed from
    pub source_mode: Option<String>,
    /// Adjustment applied to the diatonic root (e.g. -1 for bVI)
    pub root_offset: i32,
}

impl ChordVoicing {
    pub fn diatonic(label: &str, intervals: &[i32], description: &str) -> Self {
        Self {
            label: label.to_string(),
            intervals: intervals.to_vec(),
            description: description.to_string(),
            borrowed: false,
            source_mode: None,
            root_offset: 0,
        }
    }

    pub fn borrowed(
        label: &str,
        intervals: &[i32],
        description: &str,
        source_mode: &str,
        root_offset: i32,
    ) -> Self {
        Self {
            label: label.to_string(),
            intervals: intervals.to_vec(),
            description: description.to_string(),
            borrowed: true,
            source_mode: Some(source_mode.to_string()),
            root_offset,
        }
    }
}

/// The three diatonic voicings of one degree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiatonicVoicings {
    pub simple: ChordVoicing,
    pub extended: ChordVoicing,
    pub lush: ChordVoicing,
}

impl DiatonicVoicings {
    pub fn get(&self, complexity: Complexity) -> &ChordVoicing {
        match complexity {
            Complexity::Simple => &self.simple,
            Complexity::Extended => &self.extended,
            Complexity::Lush => &self.lush,
        }
    }

    fn iter(&self) -> impl Iterator<Item = &ChordVoicing> {
        [&self.simple, &self.extended, &self.lush].into_iter()
    }
}

/// Library entry for one scale degree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChordLibraryEntry {
    pub degree: ScaleDegree,
    pub roman_numeral: String,
    pub diatonic: DiatonicVoicings,
    /// Modal-interchange alternatives in preference order
    pub borrowed: Vec<ChordVoicing>,
}

impl ChordLibraryEntry {
    /// Borrowed voicing matching `label` case-insensitively, else the first one
    pub fn borrowed_voicing(&self, label: Option<&str>) -> Option<&ChordVoicing> {
        label
            .and_then(|wanted| {
                self.borrowed
                    .iter()
                    .find(|v| v.label.eq_ignore_ascii_case(wanted.trim()))
            })
            .or_else(|| self.borrowed.first())
    }
}

/// Validated table with exactly one entry per degree 0-6
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChordLibrary {
    /// Indexed by degree
    entries: Vec<ChordLibraryEntry>,
}

impl ChordLibrary {
    /// Build a library from arbitrary entries, checking every degree is
    /// covered once and no voicing is empty.
    pub fn new(mut entries: Vec<ChordLibraryEntry>) -> Result<Self> {
        entries.sort_by_key(|e| e.degree);

        for (expected, found) in (0..DEGREES_PER_SCALE as u8).zip(entries.iter()) {
            if found.degree.value() != expected {
                return Err(if found.degree.value() < expected {
                    ChordloopError::DuplicateDegree(found.degree.value())
                } else {
                    ChordloopError::MissingDegree(expected)
                });
            }
        }
        if entries.len() < DEGREES_PER_SCALE {
            return Err(ChordloopError::MissingDegree(entries.len() as u8));
        }
        if entries.len() > DEGREES_PER_SCALE {
            return Err(ChordloopError::DuplicateDegree(entries[DEGREES_PER_SCALE].degree.value()));
        }

        for entry in &entries {
            let empty = entry
                .diatonic
                .iter()
                .chain(entry.borrowed.iter())
                .find(|v| v.intervals.is_empty());
            if let Some(voicing) = empty {
                return Err(ChordloopError::EmptyVoicing {
                    degree: entry.degree.value(),
                    label: voicing.label.clone(),
                });
            }
        }

        Ok(Self { entries })
    }

    /// The built-in major-key library
    pub fn standard() -> Self {
        Self { entries: standard_entries() }
    }

    /// Entry for a degree. Falls back to the tonic entry, which a validated
    /// library never needs.
    pub fn entry(&self, degree: ScaleDegree) -> &ChordLibraryEntry {
        match self.entries.get(degree.index()) {
            Some(entry) => entry,
            None => {
                tracing::warn!(degree = degree.value(), "No chord library entry, using degree 0");
                &self.entries[0]
            }
        }
    }

    pub fn entries(&self) -> &[ChordLibraryEntry] {
        &self.entries
    }
}

impl Default for ChordLibrary {
    fn default() -> Self {
        Self::standard()
    }
}

fn entry(
    degree: u8,
    roman_numeral: &str,
    diatonic: [ChordVoicing; 3],
    borrowed: Vec<ChordVoicing>,
) -> ChordLibraryEntry {
    let [simple, extended, lush] = diatonic;
    ChordLibraryEntry {
        degree: ScaleDegree::new(degree),
        roman_numeral: roman_numeral.to_string(),
        diatonic: DiatonicVoicings { simple, extended, lush },
        borrowed,
    }
}

/// Built-in table. Roman numerals read against a major key; borrowed
/// voicings come mostly from the parallel minor.
pub fn standard_entries() -> Vec<ChordLibraryEntry> {
    use ChordVoicing as V;

    vec![
        entry(
            0,
            "I",
            [
                V::diatonic("maj", &[0, 4, 7], "Major triad"),
                V::diatonic("maj7", &[0, 4, 7, 11], "Major seventh"),
                V::diatonic("maj9", &[0, 4, 7, 11, 14], "Major ninth"),
            ],
            vec![
                V::borrowed("i", &[0, 3, 7], "Minor tonic", "Aeolian", 0),
                V::borrowed("I7", &[0, 4, 7, 10], "Dominant tonic", "Mixolydian", 0),
            ],
        ),
        entry(
            1,
            "ii",
            [
                V::diatonic("min", &[0, 3, 7], "Minor triad"),
                V::diatonic("m7", &[0, 3, 7, 10], "Minor seventh"),
                V::diatonic("m9", &[0, 3, 7, 10, 14], "Minor ninth"),
            ],
            vec![
                V::borrowed("bII", &[0, 4, 7], "Neapolitan", "Phrygian", -1),
                V::borrowed("iiø7", &[0, 3, 6, 10], "Half-diminished supertonic", "Aeolian", 0),
            ],
        ),
        entry(
            2,
            "iii",
            [
                V::diatonic("min", &[0, 3, 7], "Minor triad"),
                V::diatonic("m7", &[0, 3, 7, 10], "Minor seventh"),
                V::diatonic("m11", &[0, 3, 7, 10, 17], "Minor eleventh"),
            ],
            vec![
                V::borrowed("bIII", &[0, 4, 7], "Flat mediant", "Aeolian", -1),
                V::borrowed("bIIImaj7", &[0, 4, 7, 11], "Flat mediant major seventh", "Aeolian", -1),
            ],
        ),
        entry(
            3,
            "IV",
            [
                V::diatonic("maj", &[0, 4, 7], "Major triad"),
                V::diatonic("maj7", &[0, 4, 7, 11], "Major seventh"),
                V::diatonic("maj9", &[0, 4, 7, 11, 14], "Major ninth"),
            ],
            vec![
                V::borrowed("iv", &[0, 3, 7], "Minor subdominant", "Aeolian", 0),
                V::borrowed("ivm7", &[0, 3, 7, 10], "Minor subdominant seventh", "Aeolian", 0),
            ],
        ),
        entry(
            4,
            "V",
            [
                V::diatonic("maj", &[0, 4, 7], "Major triad"),
                V::diatonic("7", &[0, 4, 7, 10], "Dominant seventh"),
                V::diatonic("9", &[0, 4, 7, 10, 14], "Dominant ninth"),
            ],
            vec![
                V::borrowed("v", &[0, 3, 7], "Minor dominant", "Mixolydian", 0),
                V::borrowed("V7b9", &[0, 4, 7, 10, 13], "Flat-nine dominant", "Harmonic Minor", 0),
            ],
        ),
        entry(
            5,
            "vi",
            [
                V::diatonic("min", &[0, 3, 7], "Minor triad"),
                V::diatonic("m7", &[0, 3, 7, 10], "Minor seventh"),
                V::diatonic("m9", &[0, 3, 7, 10, 14], "Minor ninth"),
            ],
            vec![
                V::borrowed("bVI", &[0, 4, 7], "Flat submediant", "Aeolian", -1),
                V::borrowed("bVImaj7", &[0, 4, 7, 11], "Flat submediant major seventh", "Aeolian", -1),
            ],
        ),
        entry(
            6,
            "vii°",
            [
                V::diatonic("dim", &[0, 3, 6], "Diminished triad"),
                V::diatonic("m7b5", &[0, 3, 6, 10], "Half-diminished seventh"),
                V::diatonic("m11b5", &[0, 3, 6, 10, 17], "Half-diminished eleventh"),
            ],
            vec![
                V::borrowed("bVII", &[0, 4, 7], "Flat subtonic", "Mixolydian", -1),
                V::borrowed("bVII7", &[0, 4, 7, 10], "Flat subtonic dominant", "Mixolydian", -1),
            ],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_library_passes_validation() {
        let library = ChordLibrary::new(standard_entries()).unwrap();
        assert_eq!(library, ChordLibrary::standard());
        for degree in ScaleDegree::ALL {
            assert_eq!(library.entry(degree).degree, degree);
        }
    }

    #[test]
    fn missing_degree_is_rejected() {
        let mut entries = standard_entries();
        entries.remove(3);
        assert_eq!(ChordLibrary::new(entries), Err(ChordloopError::MissingDegree(3)));
    }

    #[test]
    fn duplicate_degree_is_rejected() {
        let mut entries = standard_entries();
        let dup = entries[2].clone();
        entries.push(dup);
        assert_eq!(ChordLibrary::new(entries), Err(ChordloopError::DuplicateDegree(2)));
    }

    #[test]
    fn empty_voicing_is_rejected() {
        let mut entries = standard_entries();
        entries[5].borrowed[0].intervals.clear();
        assert_eq!(
            ChordLibrary::new(entries),
            Err(ChordloopError::EmptyVoicing { degree: 5, label: "bVI".into() })
        );
    }

    #[test]
    fn borrowed_lookup_prefers_matching_label() {
        let library = ChordLibrary::standard();
        let vi = library.entry(ScaleDegree::new(5));
        assert_eq!(vi.borrowed_voicing(Some("bvimaj7")).unwrap().label, "bVImaj7");
        assert_eq!(vi.borrowed_voicing(Some("nothing")).unwrap().label, "bVI");
        assert_eq!(vi.borrowed_voicing(None).unwrap().label, "bVI");
    }

    #[test]
    fn complexity_names_fall_back_to_simple() {
        assert_eq!(Complexity::from_name("LUSH"), Complexity::Lush);
        assert_eq!(Complexity::from_name("extended"), Complexity::Extended);
        assert_eq!(Complexity::from_name("wild"), Complexity::Simple);
    }
}
