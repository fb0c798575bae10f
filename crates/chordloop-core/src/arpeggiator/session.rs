//! Arpeggiator session: expanded pitch set plus traversal cursor

use crate::chord_resolver::{ChordResolution, HarmonyContext};
use crate::rhythm_mask::RhythmMask;
use crate::scale::ScaleDegree;

use super::settings::{ArpStyle, SessionSettings};

/// Traversal state over the expanded pitch set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Cursor {
    pub current_index: usize,
    /// +1 ascending, -1 descending
    pub direction: i8,
    pub unfold_progress: usize,
}

impl Cursor {
    fn for_style(style: ArpStyle, len: usize) -> Self {
        match style {
            ArpStyle::Down => Self {
                current_index: len.saturating_sub(1),
                direction: -1,
                unfold_progress: 0,
            },
            _ => Self {
                current_index: 0,
                direction: 1,
                unfold_progress: 0,
            },
        }
    }
}

/// Sort chord tones ascending and stack them across `octaves`
pub fn expand_pitches(chord: &[i32], octaves: u8) -> Vec<i32> {
    let mut sorted = chord.to_vec();
    sorted.sort_unstable();
    (0..octaves.max(1) as i32)
        .flat_map(|octave| sorted.iter().map(move |&p| p + octave * 12))
        .collect()
}

/// The single running arpeggio of an instrument
#[derive(Debug, Clone)]
pub struct ArpeggiatorSession {
    pub degree: ScaleDegree,
    pub context: HarmonyContext,
    pub chord: ChordResolution,
    pub settings: SessionSettings,
    pub rhythm_mask: RhythmMask,
    pitches: Vec<i32>,
    cursor: Cursor,
}

impl ArpeggiatorSession {
    /// Returns `None` when the chord has nothing to play
    pub fn new(
        degree: ScaleDegree,
        context: HarmonyContext,
        chord: ChordResolution,
        settings: SessionSettings,
        rhythm_mask: RhythmMask,
    ) -> Option<Self> {
        let pitches = expand_pitches(&chord.midi_notes(), settings.octaves);
        if pitches.is_empty() {
            return None;
        }
        let cursor = Cursor::for_style(settings.style, pitches.len());
        Some(Self {
            degree,
            context,
            chord,
            settings,
            rhythm_mask,
            pitches,
            cursor,
        })
    }

    /// Octave-expanded, ascending pitch set
    pub fn pitches(&self) -> &[i32] {
        &self.pitches
    }

    #[cfg(test)]
    pub(crate) fn cursor(&self) -> Cursor {
        self.cursor
    }

    /// Unfold has revealed every tone
    pub fn is_exhausted(&self) -> bool {
        self.settings.style == ArpStyle::Unfold && self.cursor.unfold_progress >= self.pitches.len()
    }

    /// Pick the next pitch and move the cursor. `None` once an unfold is
    /// exhausted.
    pub(crate) fn advance(&mut self, rng: &mut fastrand::Rng) -> Option<i32> {
        let len = self.pitches.len();
        let cursor = &mut self.cursor;

        match self.settings.style {
            ArpStyle::Up => {
                let pitch = self.pitches[cursor.current_index % len];
                cursor.current_index = (cursor.current_index + 1) % len;
                Some(pitch)
            }
            ArpStyle::Down => {
                let pitch = self.pitches[cursor.current_index % len];
                cursor.current_index = (cursor.current_index + len - 1) % len;
                Some(pitch)
            }
            ArpStyle::UpDown => {
                let pitch = self.pitches[cursor.current_index.min(len - 1)];
                if len > 1 {
                    if cursor.current_index >= len - 1 {
                        cursor.direction = -1;
                    } else if cursor.current_index == 0 {
                        cursor.direction = 1;
                    }
                    cursor.current_index = cursor.current_index.saturating_add_signed(cursor.direction as isize);
                }
                Some(pitch)
            }
            ArpStyle::Random => Some(self.pitches[rng.usize(..len)]),
            ArpStyle::Unfold => {
                let pitch = *self.pitches.get(cursor.unfold_progress)?;
                cursor.unfold_progress += 1;
                Some(pitch)
            }
        }
    }
}
