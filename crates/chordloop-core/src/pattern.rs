//! Pattern store: step grids, free-timed note lists, and the pattern bank

use serde::{Deserialize, Serialize};

use crate::chord_library::Complexity;
use crate::chord_resolver::{ChordResolution, HarmonyContext};
use crate::note::Note;
use crate::scale::{ScaleDegree, ScaleMode};

/// Steps in a freshly created pattern
pub const DEFAULT_STEP_COUNT: usize = 16;
/// Shortest note a free-timed take may contain, in seconds
pub const MIN_NOTE_DURATION: f64 = 0.02;
/// Velocity written into inactive grid slots
const DEFAULT_VELOCITY: f32 = 0.8;

/// Pattern slot in the bank
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PatternId {
    #[default]
    A,
    B,
    C,
    D,
}

impl PatternId {
    pub const ALL: [PatternId; 4] = [PatternId::A, PatternId::B, PatternId::C, PatternId::D];

    pub fn index(self) -> usize {
        match self {
            Self::A => 0,
            Self::B => 1,
            Self::C => 2,
            Self::D => 3,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
        }
    }
}

// ============================================================================
// Step grid
// ============================================================================

/// Parallel per-step arrays. Every array has the pattern's step count;
/// velocities and pitches only mean something where `steps[i]` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepGrid {
    pub steps: Vec<bool>,
    pub velocities: Vec<f32>,
    /// Semitone offsets from the pattern's reference note
    pub pitches: Vec<i32>,
    /// Degree that produced each active step, if chord-driven
    pub step_degrees: Option<Vec<Option<ScaleDegree>>>,
}

impl StepGrid {
    pub fn new(len: usize) -> Self {
        Self {
            steps: vec![false; len],
            velocities: vec![DEFAULT_VELOCITY; len],
            pitches: vec![0; len],
            step_degrees: None,
        }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        !self.steps.iter().any(|&on| on)
    }

    /// Copy of this grid with one step written. Out-of-range indices wrap.
    pub fn with_step(
        &self,
        index: usize,
        velocity: f32,
        pitch: i32,
        degree: Option<ScaleDegree>,
    ) -> Self {
        let mut grid = self.clone();
        let len = grid.len();
        if len == 0 {
            return grid;
        }
        let index = index % len;
        grid.steps[index] = true;
        grid.velocities[index] = velocity;
        grid.pitches[index] = pitch;
        if let Some(degree) = degree {
            let degrees = grid.step_degrees.get_or_insert_with(|| vec![None; len]);
            degrees[index] = Some(degree);
        }
        grid
    }
}

// ============================================================================
// Free-timed notes
// ============================================================================

/// A note captured in free timing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteEvent {
    /// Seconds since the take's anchor
    pub time: f64,
    pub duration: f64,
    pub note: Note,
    pub velocity: f32,
}

impl NoteEvent {
    pub fn new(time: f64, duration: f64, note: Note, velocity: f32) -> Self {
        Self {
            time: time.max(0.0),
            duration: if duration.is_finite() { duration.max(MIN_NOTE_DURATION) } else { MIN_NOTE_DURATION },
            note,
            velocity: crate::control::clamp_unit(velocity),
        }
    }

    pub fn end(&self) -> f64 {
        self.time + self.duration
    }
}

/// Harmonic identity of the chord that produced the latest recorded note
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChordStamp {
    pub root: Note,
    pub notes: Vec<Note>,
    pub intervals: Vec<i32>,
    pub tonal_center: Note,
    pub scale: ScaleMode,
    pub degree: ScaleDegree,
    pub complexity: Complexity,
    pub roman_numeral: String,
    pub voicing_label: String,
    /// Voicing label when the chord was borrowed
    pub borrowed_label: Option<String>,
}

impl ChordStamp {
    pub fn new(chord: &ChordResolution, context: &HarmonyContext, degree: ScaleDegree) -> Self {
        Self {
            root: chord.root,
            notes: chord.notes.clone(),
            intervals: chord.intervals.clone(),
            tonal_center: context.tonal_center,
            scale: context.scale,
            degree,
            complexity: context.complexity,
            roman_numeral: chord.roman_numeral.clone(),
            voicing_label: chord.voicing_label.clone(),
            borrowed_label: chord.borrowed.then(|| chord.voicing_label.clone()),
        }
    }
}

// ============================================================================
// Patterns
// ============================================================================

/// One loop. Holds either a step grid or a free-timed note list, never
/// both at once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopPattern {
    pub name: String,
    pub step_count: usize,
    pub grid: StepGrid,
    pub note_events: Vec<NoteEvent>,
    /// Free-timed loop length in seconds
    pub loop_length: f64,
    /// Reference note grid pitches are measured from
    pub base_note: Option<Note>,
    pub chord: Option<ChordStamp>,
}

impl LoopPattern {
    pub fn new(name: impl Into<String>, step_count: usize) -> Self {
        let step_count = step_count.max(1);
        Self {
            name: name.into(),
            step_count,
            grid: StepGrid::new(step_count),
            note_events: Vec::new(),
            loop_length: 0.0,
            base_note: None,
            chord: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.grid.is_empty() && self.note_events.is_empty()
    }

    /// Note the grid's pitch offsets are relative to
    pub fn reference_note(&self) -> Note {
        self.base_note.unwrap_or(Note::C4)
    }
}

impl Default for LoopPattern {
    fn default() -> Self {
        Self::new("", DEFAULT_STEP_COUNT)
    }
}

/// Four pattern slots for one instrument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternBank {
    pub patterns: [LoopPattern; 4],
    /// Slot recording falls back to when no pattern is selected
    pub active_pattern: PatternId,
}

impl Default for PatternBank {
    fn default() -> Self {
        Self {
            patterns: PatternId::ALL.map(|id| LoopPattern::new(id.name(), DEFAULT_STEP_COUNT)),
            active_pattern: PatternId::A,
        }
    }
}

impl PatternBank {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: PatternId) -> &LoopPattern {
        &self.patterns[id.index()]
    }

    pub fn get_mut(&mut self, id: PatternId) -> &mut LoopPattern {
        &mut self.patterns[id.index()]
    }

    pub fn active(&self) -> &LoopPattern {
        self.get(self.active_pattern)
    }

    pub fn set_active(&mut self, id: PatternId) {
        self.active_pattern = id;
    }

    /// Explicit selection wins over the active slot
    pub fn target(&self, selected: Option<PatternId>) -> PatternId {
        selected.unwrap_or(self.active_pattern)
    }

    pub fn copy_pattern(&mut self, from: PatternId, to: PatternId) {
        if from == to {
            return;
        }
        let mut copy = self.get(from).clone();
        copy.name = to.name().to_string();
        self.patterns[to.index()] = copy;
    }

    pub fn clear_pattern(&mut self, id: PatternId) {
        self.patterns[id.index()] = LoopPattern::new(id.name(), DEFAULT_STEP_COUNT);
    }
}
