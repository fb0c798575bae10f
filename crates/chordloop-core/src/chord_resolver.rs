//! Turns (key, scale, degree, complexity) into a concrete chord

use serde::{Deserialize, Serialize};

use crate::chord_library::{ChordLibrary, ChordLibraryEntry, ChordVoicing, Complexity};
use crate::note::Note;
use crate::scale::{ScaleDegree, ScaleMode};

/// Harmonic settings shared by every degree press
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarmonyContext {
    pub tonal_center: Note,
    pub scale: ScaleMode,
    pub complexity: Complexity,
    pub allow_borrowed: bool,
    pub preferred_voicing: Option<String>,
}

impl Default for HarmonyContext {
    fn default() -> Self {
        Self {
            tonal_center: Note::C4,
            scale: ScaleMode::Major,
            complexity: Complexity::Simple,
            allow_borrowed: false,
            preferred_voicing: None,
        }
    }
}

/// A resolved chord. Built fresh on every resolve, never edited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChordResolution {
    pub root: Note,
    pub notes: Vec<Note>,
    /// Voicing intervals relative to `root`
    pub intervals: Vec<i32>,
    pub roman_numeral: String,
    pub borrowed: bool,
    pub voicing_label: String,
}

impl ChordResolution {
    pub fn midi_notes(&self) -> Vec<i32> {
        self.notes.iter().map(|n| n.midi()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }
}

/// Resolves scale degrees against a chord library
#[derive(Debug, Clone, Default)]
pub struct ChordResolver {
    library: ChordLibrary,
}

impl ChordResolver {
    pub fn new(library: ChordLibrary) -> Self {
        Self { library }
    }

    pub fn library(&self) -> &ChordLibrary {
        &self.library
    }

    pub fn resolve(&self, context: &HarmonyContext, degree: ScaleDegree) -> ChordResolution {
        let entry = self.library.entry(degree);
        let voicing = select_voicing(entry, context);

        let root_offset =
            context.scale.degree_offset(entry.degree.value() as i32) + voicing.root_offset;
        let root = context.tonal_center.transpose(root_offset);
        let notes = voicing
            .intervals
            .iter()
            .map(|&interval| root.transpose(interval))
            .collect();

        ChordResolution {
            root,
            notes,
            intervals: voicing.intervals.clone(),
            roman_numeral: entry.roman_numeral.clone(),
            borrowed: voicing.borrowed,
            voicing_label: voicing.label.clone(),
        }
    }
}

fn select_voicing<'a>(entry: &'a ChordLibraryEntry, context: &HarmonyContext) -> &'a ChordVoicing {
    let diatonic = entry.diatonic.get(context.complexity);
    if !context.allow_borrowed {
        return diatonic;
    }
    entry
        .borrowed_voicing(context.preferred_voicing.as_deref())
        .unwrap_or(diatonic)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chord_library::standard_entries;

    fn context(scale: ScaleMode, complexity: Complexity) -> HarmonyContext {
        HarmonyContext {
            scale,
            complexity,
            ..Default::default()
        }
    }

    #[test]
    fn c_major_triads() {
        let resolver = ChordResolver::default();
        let ctx = HarmonyContext::default();

        let one = resolver.resolve(&ctx, ScaleDegree::new(0));
        assert_eq!(one.midi_notes(), vec![60, 64, 67]);
        assert_eq!(one.roman_numeral, "I");
        assert!(!one.borrowed);

        let five = resolver.resolve(&ctx, ScaleDegree::new(4));
        assert_eq!(five.root.to_string(), "G4");
        assert_eq!(five.midi_notes(), vec![67, 71, 74]);
    }

    #[test]
    fn every_degree_scale_and_complexity_lands_on_the_diatonic_root() {
        let resolver = ChordResolver::default();
        for scale in ScaleMode::ALL {
            for complexity in Complexity::ALL {
                let ctx = HarmonyContext {
                    tonal_center: Note(57),
                    ..context(scale, complexity)
                };
                for degree in ScaleDegree::ALL {
                    let chord = resolver.resolve(&ctx, degree);
                    assert!(!chord.notes.is_empty());
                    let expected = 57 + scale.intervals()[degree.index()];
                    assert_eq!(chord.root.midi(), expected, "{} degree {}", scale.name(), degree.value());
                    assert_eq!(chord.notes[0], chord.root);
                }
            }
        }
    }

    #[test]
    fn complexity_selects_the_diatonic_voicing() {
        let resolver = ChordResolver::default();
        let lush = resolver.resolve(&context(ScaleMode::Major, Complexity::Lush), ScaleDegree::new(1));
        assert_eq!(lush.voicing_label, "m9");
        assert_eq!(lush.intervals, vec![0, 3, 7, 10, 14]);
        assert_eq!(lush.midi_notes(), vec![62, 65, 69, 72, 76]);
    }

    #[test]
    fn borrowed_voicing_applies_root_offset() {
        let resolver = ChordResolver::default();
        let ctx = HarmonyContext {
            allow_borrowed: true,
            ..Default::default()
        };
        let flat_six = resolver.resolve(&ctx, ScaleDegree::new(5));
        assert!(flat_six.borrowed);
        assert_eq!(flat_six.voicing_label, "bVI");
        assert_eq!(flat_six.root.to_string(), "G#4");
        assert_eq!(flat_six.midi_notes(), vec![68, 72, 75]);
    }

    #[test]
    fn preferred_label_is_case_insensitive_and_falls_back_to_first() {
        let resolver = ChordResolver::default();
        let mut ctx = HarmonyContext {
            allow_borrowed: true,
            preferred_voicing: Some("V7B9".into()),
            ..Default::default()
        };
        assert_eq!(resolver.resolve(&ctx, ScaleDegree::new(4)).voicing_label, "V7b9");

        ctx.preferred_voicing = Some("missing".into());
        assert_eq!(resolver.resolve(&ctx, ScaleDegree::new(4)).voicing_label, "v");
    }

    #[test]
    fn borrowed_flag_without_alternatives_uses_diatonic() {
        let mut entries: Vec<ChordLibraryEntry> = standard_entries();
        entries[2].borrowed.clear();
        let resolver = ChordResolver::new(ChordLibrary::new(entries).unwrap());
        let ctx = HarmonyContext {
            allow_borrowed: true,
            complexity: Complexity::Extended,
            ..Default::default()
        };
        let chord = resolver.resolve(&ctx, ScaleDegree::new(2));
        assert!(!chord.borrowed);
        assert_eq!(chord.voicing_label, "m7");
        assert_eq!(chord.roman_numeral, "iii");
    }

    #[test]
    fn resolve_is_referentially_stable() {
        let resolver = ChordResolver::default();
        let ctx = HarmonyContext {
            scale: ScaleMode::Dorian,
            complexity: Complexity::Extended,
            allow_borrowed: true,
            preferred_voicing: Some("bVII7".into()),
            tonal_center: Note(62),
        };
        for degree in ScaleDegree::ALL {
            assert_eq!(resolver.resolve(&ctx, degree), resolver.resolve(&ctx, degree));
        }
    }
}
