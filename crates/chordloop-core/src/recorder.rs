//! Commits played notes into a pattern, as a step grid or a timed note list

use std::collections::HashMap;

use tracing::{debug, trace};

use crate::arpeggiator::TimingMode;
use crate::note::Note;
use crate::pattern::{ChordStamp, LoopPattern, NoteEvent, StepGrid, MIN_NOTE_DURATION};

/// A note handed to the recorder
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecordedNote {
    pub note: Note,
    /// Transport time in seconds
    pub time: f64,
    /// Absolute 16th-note step at `time`
    pub step: u64,
    pub velocity: f32,
    /// Known hold time; free timing falls back to the minimum
    pub duration: Option<f64>,
}

#[derive(Debug, Clone, Copy)]
struct HeldNote {
    start: f64,
    step: u64,
    velocity: f32,
}

/// Recording state for one instrument: the current timing mode, the
/// free-timing anchor, and notes held down but not yet released.
#[derive(Debug, Default)]
pub struct PatternRecorder {
    timing_mode: TimingMode,
    anchor: Option<f64>,
    held: HashMap<Note, HeldNote>,
}

impl PatternRecorder {
    pub fn new(timing_mode: TimingMode) -> Self {
        Self {
            timing_mode,
            ..Default::default()
        }
    }

    pub fn timing_mode(&self) -> TimingMode {
        self.timing_mode
    }

    /// Time free-timed notes are measured from, once the take has started
    pub fn anchor(&self) -> Option<f64> {
        self.anchor
    }

    /// Changing mode drops the anchor and any notes still held
    pub fn set_timing_mode(&mut self, mode: TimingMode) {
        if mode == self.timing_mode {
            return;
        }
        debug!(?mode, dropped = self.held.len(), "Recorder timing mode changed");
        self.timing_mode = mode;
        self.reset();
    }

    /// Forget the anchor and held notes, e.g. when a new take starts
    pub fn reset(&mut self) {
        self.anchor = None;
        self.held.clear();
    }

    /// Write one note into `pattern`. Grid pitches are measured from
    /// `base_note`, else the pattern's own reference, else C4.
    pub fn record(
        &mut self,
        pattern: &mut LoopPattern,
        take: &RecordedNote,
        base_note: Option<Note>,
        chord: Option<&ChordStamp>,
    ) {
        match self.timing_mode {
            TimingMode::Sync => self.record_step(pattern, take, base_note, chord),
            TimingMode::Free => {
                self.record_free(pattern, take);
            }
        }
    }

    fn record_step(
        &mut self,
        pattern: &mut LoopPattern,
        take: &RecordedNote,
        base_note: Option<Note>,
        chord: Option<&ChordStamp>,
    ) {
        self.anchor = None;

        let step_count = pattern.step_count.max(1);
        let index = (take.step % step_count as u64) as usize;
        let reference = base_note.or(pattern.base_note).unwrap_or(Note::C4);
        let pitch = take.note.midi() - reference.midi();
        let velocity = crate::control::clamp_unit(take.velocity);

        let degree = chord.map(|c| c.degree);
        let grid = if pattern.grid.len() == step_count {
            pattern.grid.with_step(index, velocity, pitch, degree)
        } else {
            StepGrid::new(step_count).with_step(index, velocity, pitch, degree)
        };

        trace!(note = %take.note, index, pitch, "Recorded step");
        pattern.grid = grid;
        pattern.base_note = Some(reference);
        pattern.note_events = Vec::new();
        pattern.loop_length = 0.0;
        if let Some(chord) = chord {
            pattern.chord = Some(chord.clone());
        }
    }

    fn record_free(&mut self, pattern: &mut LoopPattern, take: &RecordedNote) -> NoteEvent {
        let anchor = *self.anchor.get_or_insert(take.time);
        let event = NoteEvent::new(
            take.time - anchor,
            take.duration.unwrap_or(MIN_NOTE_DURATION),
            take.note,
            take.velocity,
        );

        let mut events = pattern.note_events.clone();
        events.push(event.clone());
        events.sort_by(|a, b| a.time.total_cmp(&b.time));

        trace!(note = %event.note, time = event.time, duration = event.duration, "Recorded free note");
        pattern.loop_length = pattern.loop_length.max(event.end());
        pattern.note_events = events;
        pattern.grid = StepGrid::new(pattern.step_count.max(1));
        event
    }

    /// Key pressed. Free timing buffers the note until release; sync
    /// timing writes the step straight away.
    pub fn note_on(
        &mut self,
        pattern: &mut LoopPattern,
        note: Note,
        time: f64,
        step: u64,
        velocity: f32,
    ) {
        match self.timing_mode {
            TimingMode::Sync => {
                let take = RecordedNote { note, time, step, velocity, duration: None };
                self.record_step(pattern, &take, None, None);
            }
            TimingMode::Free => {
                self.anchor.get_or_insert(time);
                self.held.insert(note, HeldNote { start: time, step, velocity });
            }
        }
    }

    /// Key released. Commits a buffered free-timed note with its measured
    /// length; returns `None` if the note was not held.
    pub fn note_off(&mut self, pattern: &mut LoopPattern, note: Note, time: f64) -> Option<NoteEvent> {
        let held = self.held.remove(&note)?;
        let take = RecordedNote {
            note,
            time: held.start,
            step: held.step,
            velocity: held.velocity,
            duration: Some(time - held.start),
        };
        Some(self.record_free(pattern, &take))
    }

    pub fn held_count(&self) -> usize {
        self.held.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chord_resolver::{ChordResolver, HarmonyContext};
    use crate::scale::ScaleDegree;

    fn take(name: &str, time: f64, step: u64) -> RecordedNote {
        RecordedNote {
            note: name.parse().unwrap(),
            time,
            step,
            velocity: 0.9,
            duration: Some(0.1),
        }
    }

    fn stamp(degree: u8) -> ChordStamp {
        let context = HarmonyContext::default();
        let degree = ScaleDegree::new(degree);
        let chord = ChordResolver::default().resolve(&context, degree);
        ChordStamp::new(&chord, &context, degree)
    }

    #[test]
    fn sync_writes_offset_from_reference() {
        let mut recorder = PatternRecorder::new(TimingMode::Sync);
        let mut pattern = LoopPattern::default();
        recorder.record(&mut pattern, &take("E4", 0.5, 4), Some(Note::C4), None);

        assert!(pattern.grid.steps[4]);
        assert_eq!(pattern.grid.pitches[4], 4);
        assert!((pattern.grid.velocities[4] - 0.9).abs() < 1e-6);
        assert_eq!(pattern.grid.steps.iter().filter(|&&on| on).count(), 1);
    }

    #[test]
    fn sync_step_wraps_and_uses_pattern_reference() {
        let mut recorder = PatternRecorder::new(TimingMode::Sync);
        let mut pattern = LoopPattern { base_note: Some("A3".parse().unwrap()), ..Default::default() };
        recorder.record(&mut pattern, &take("C4", 2.5, 20), None, None);
        assert!(pattern.grid.steps[4]);
        assert_eq!(pattern.grid.pitches[4], 3);
    }

    #[test]
    fn sync_stamps_latest_chord_and_degree() {
        let mut recorder = PatternRecorder::new(TimingMode::Sync);
        let mut pattern = LoopPattern::default();
        recorder.record(&mut pattern, &take("C4", 0.0, 0), None, Some(&stamp(0)));
        recorder.record(&mut pattern, &take("A4", 0.25, 2), None, Some(&stamp(5)));

        let chord = pattern.chord.as_ref().unwrap();
        assert_eq!(chord.roman_numeral, "vi");
        assert_eq!(chord.degree, ScaleDegree::new(5));
        let degrees = pattern.grid.step_degrees.as_ref().unwrap();
        assert_eq!(degrees[0], Some(ScaleDegree::new(0)));
        assert_eq!(degrees[2], Some(ScaleDegree::new(5)));
    }

    #[test]
    fn free_times_are_relative_to_first_note() {
        let mut recorder = PatternRecorder::new(TimingMode::Free);
        let mut pattern = LoopPattern::default();
        recorder.record(&mut pattern, &take("C4", 3.0, 24), None, None);
        let second = RecordedNote { duration: Some(0.25), ..take("E4", 3.5, 28) };
        recorder.record(&mut pattern, &second, None, None);

        let times: Vec<f64> = pattern.note_events.iter().map(|e| e.time).collect();
        assert_eq!(times, vec![0.0, 0.5]);
        assert!(pattern.loop_length >= 0.75 - 1e-9);
    }

    #[test]
    fn sync_and_free_contents_exclude_each_other() {
        let mut recorder = PatternRecorder::new(TimingMode::Sync);
        let mut pattern = LoopPattern::default();
        recorder.record(&mut pattern, &take("C4", 0.0, 0), None, None);

        recorder.set_timing_mode(TimingMode::Free);
        recorder.record(&mut pattern, &take("D4", 1.0, 8), None, None);
        assert!(pattern.grid.is_empty());
        assert_eq!(pattern.grid.len(), 16);
        assert_eq!(pattern.note_events.len(), 1);

        recorder.set_timing_mode(TimingMode::Sync);
        recorder.record(&mut pattern, &take("D4", 2.0, 16), None, None);
        assert!(pattern.note_events.is_empty());
        assert_eq!(pattern.loop_length, 0.0);
        assert!(pattern.grid.steps[0]);
    }

    #[test]
    fn mode_round_trip_resets_the_anchor() {
        let mut recorder = PatternRecorder::new(TimingMode::Free);
        let mut pattern = LoopPattern::default();
        recorder.record(&mut pattern, &take("C4", 10.0, 80), None, None);
        assert_eq!(recorder.anchor(), Some(10.0));

        recorder.set_timing_mode(TimingMode::Sync);
        recorder.set_timing_mode(TimingMode::Free);
        assert_eq!(recorder.anchor(), None);

        let mut fresh = LoopPattern::default();
        recorder.record(&mut fresh, &take("G4", 20.0, 160), None, None);
        assert_eq!(fresh.note_events[0].time, 0.0);
    }

    #[test]
    fn held_notes_commit_on_release_in_time_order() {
        let mut recorder = PatternRecorder::new(TimingMode::Free);
        let mut pattern = LoopPattern::default();
        recorder.note_on(&mut pattern, Note(60), 1.0, 8, 0.7);
        recorder.note_on(&mut pattern, Note(64), 1.2, 9, 0.7);
        assert!(pattern.note_events.is_empty());

        let short = recorder.note_off(&mut pattern, Note(64), 1.205).unwrap();
        assert_eq!(short.duration, MIN_NOTE_DURATION);
        recorder.note_off(&mut pattern, Note(60), 2.0);

        let notes: Vec<i32> = pattern.note_events.iter().map(|e| e.note.midi()).collect();
        assert_eq!(notes, vec![60, 64]);
        assert!((pattern.note_events[0].duration - 1.0).abs() < 1e-9);
        assert!((pattern.note_events[1].time - 0.2).abs() < 1e-9);
        assert_eq!(recorder.held_count(), 0);
    }

    #[test]
    fn held_notes_are_dropped_across_a_mode_switch() {
        let mut recorder = PatternRecorder::new(TimingMode::Free);
        let mut pattern = LoopPattern::default();
        recorder.note_on(&mut pattern, Note(60), 1.0, 8, 0.7);
        recorder.set_timing_mode(TimingMode::Sync);
        assert_eq!(recorder.note_off(&mut pattern, Note(60), 2.0), None);
        assert!(pattern.is_empty());
    }

    #[test]
    fn sync_note_on_writes_immediately() {
        let mut recorder = PatternRecorder::new(TimingMode::Sync);
        let mut pattern = LoopPattern::default();
        recorder.note_on(&mut pattern, Note(67), 0.375, 3, 0.5);
        assert!(pattern.grid.steps[3]);
        assert_eq!(pattern.grid.pitches[3], 7);
    }

    #[test]
    fn recorded_pattern_serializes_for_storage() {
        let mut recorder = PatternRecorder::new(TimingMode::Sync);
        let mut pattern = LoopPattern::default();
        recorder.record(&mut pattern, &take("E4", 0.5, 4), Some(Note::C4), Some(&stamp(0)));

        let json = serde_json::to_value(&pattern).unwrap();
        assert_eq!(json["grid"]["steps"][4], true);
        assert_eq!(json["grid"]["pitches"][4], 4);
        assert_eq!(json["base_note"], "C4");
        assert_eq!(json["chord"]["roman_numeral"], "I");
        assert_eq!(json["chord"]["notes"][1], "E4");
        assert_eq!(json["chord"]["scale"], "Major");
    }
}
