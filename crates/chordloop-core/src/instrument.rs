//! Instrument: wires the resolver, scheduler, recorder and pattern bank to
//! one transport and turns their output into synth triggers

use tracing::{debug, info, warn};

use crate::arpeggiator::{ArpNote, ArpeggiatorScheduler, SessionSettings, TickOutcome, TimingMode};
use crate::chord_resolver::{ChordResolution, ChordResolver, HarmonyContext};
use crate::control::ControlState;
use crate::note::Note;
use crate::pattern::{ChordStamp, LoopPattern, PatternBank, PatternId};
use crate::recorder::{PatternRecorder, RecordedNote};
use crate::rhythm_mask::RhythmMask;
use crate::scale::ScaleDegree;
use crate::track::CompanionTrack;
use crate::transport::{MusicalClock, Transport};

/// What produced a trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerSource {
    Arpeggio,
    /// Whole chord struck at once with the arpeggiator off
    Chord,
}

/// Extra information the synth may use when voicing a trigger
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerContext {
    pub source: TriggerSource,
    pub degree: ScaleDegree,
    pub roman_numeral: String,
    /// Brightness hint, 0-1
    pub tone: f32,
    /// Extra note an octave under the chord root
    pub bass: Option<Note>,
}

/// A request for the synth to sound something
#[derive(Debug, Clone, PartialEq)]
pub struct Trigger {
    /// Transport time in seconds
    pub time: f64,
    pub velocity: f32,
    /// Lead pitch: the arpeggiated note, or the chord root
    pub pitch: Note,
    /// Every note to sound, excluding the bass double
    pub notes: Vec<Note>,
    /// Hold time in seconds
    pub sustain: f64,
    pub context: TriggerContext,
}

pub struct Instrument {
    name: String,
    transport: Transport,
    resolver: ChordResolver,
    harmony: HarmonyContext,
    settings: SessionSettings,
    controls: ControlState,
    scheduler: ArpeggiatorScheduler,
    recorder: PatternRecorder,
    recording: bool,
    companion_tracks: Vec<CompanionTrack>,
    patterns: PatternBank,
    /// Degree held as a block chord while the arpeggiator is off
    chord_degree: Option<ScaleDegree>,
    /// Last pressed degree, used when autopilot starts on its own
    last_degree: ScaleDegree,
    pending: Vec<Trigger>,
}

impl Instrument {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_scheduler(name, ArpeggiatorScheduler::new())
    }

    /// Instrument whose random style is reproducible
    pub fn with_seed(name: impl Into<String>, seed: u64) -> Self {
        Self::with_scheduler(name, ArpeggiatorScheduler::with_seed(seed))
    }

    fn with_scheduler(name: impl Into<String>, scheduler: ArpeggiatorScheduler) -> Self {
        let settings = SessionSettings::default();
        Self {
            name: name.into(),
            transport: Transport::default(),
            resolver: ChordResolver::default(),
            harmony: HarmonyContext::default(),
            recorder: PatternRecorder::new(settings.timing_mode),
            settings,
            controls: ControlState::default(),
            scheduler,
            recording: false,
            companion_tracks: Vec::new(),
            patterns: PatternBank::default(),
            chord_degree: None,
            last_degree: ScaleDegree::new(0),
            pending: Vec::new(),
        }
    }

    pub fn with_resolver(mut self, resolver: ChordResolver) -> Self {
        self.resolver = resolver;
        self
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn harmony(&self) -> &HarmonyContext {
        &self.harmony
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn controls(&self) -> &ControlState {
        &self.controls
    }

    pub fn patterns(&self) -> &PatternBank {
        &self.patterns
    }

    pub fn pattern(&self, id: PatternId) -> &LoopPattern {
        self.patterns.get(id)
    }

    pub fn patterns_mut(&mut self) -> &mut PatternBank {
        &mut self.patterns
    }

    pub fn companion_tracks(&self) -> &[CompanionTrack] {
        &self.companion_tracks
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    /// Chord of the running arpeggio
    pub fn current_chord(&self) -> Option<&ChordResolution> {
        self.scheduler.chord()
    }

    /// Degree to highlight: the arpeggiated one, or a held block chord
    pub fn playing_degree(&self) -> Option<ScaleDegree> {
        self.scheduler.playing_degree().or(self.chord_degree)
    }

    pub fn latched_degree(&self) -> Option<ScaleDegree> {
        self.scheduler.latched_degree()
    }

    // ========================================================================
    // Transport
    // ========================================================================

    pub fn play(&mut self) {
        self.transport.play();
        info!(instrument = %self.name, "Transport playing");
    }

    /// Stop and rewind. A running arpeggio restarts from the top on play.
    pub fn stop(&mut self) {
        self.transport.stop();
        info!(instrument = %self.name, "Transport stopped");
    }

    pub fn pause(&mut self) {
        self.transport.pause();
    }

    pub fn set_bpm(&mut self, bpm: f64) {
        self.transport.set_bpm(bpm);
        debug!(bpm = self.transport.bpm(), "Tempo changed");
    }

    /// Run the clock forward by `dt` seconds and collect every trigger due
    /// in that window, including block chords struck since the last call.
    pub fn advance(&mut self, dt: f64) -> Vec<Trigger> {
        let mut triggers = std::mem::take(&mut self.pending);
        if !self.transport.is_playing() || !dt.is_finite() {
            return triggers;
        }

        let until = self.transport.now() + dt.max(0.0);
        while let Some(tick) = self.transport.poll(until) {
            if let TickOutcome::Fired(note) = self.scheduler.on_tick(&mut self.transport, &tick) {
                triggers.push(self.arp_trigger(&note));
            }
        }
        self.transport.advance_to(until);
        triggers
    }

    fn arp_trigger(&mut self, note: &ArpNote) -> Trigger {
        let context = self.trigger_context(TriggerSource::Arpeggio, note.degree, &note.chord);
        let trigger = Trigger {
            time: note.time,
            velocity: self.controls.dynamics,
            pitch: note.note,
            notes: vec![note.note],
            sustain: note.duration,
            context,
        };

        if self.recording {
            let stamp = ChordStamp::new(&note.chord, &note.context, note.degree);
            let take = RecordedNote {
                note: note.note,
                time: note.time,
                step: note.step,
                velocity: self.controls.dynamics,
                duration: Some(note.duration),
            };
            let target = self.patterns.target(self.controls.pattern_id);
            self.recorder
                .record(self.patterns.get_mut(target), &take, None, Some(&stamp));
        }
        trigger
    }

    fn trigger_context(&self, source: TriggerSource, degree: ScaleDegree, chord: &ChordResolution) -> TriggerContext {
        TriggerContext {
            source,
            degree,
            roman_numeral: chord.roman_numeral.clone(),
            tone: self.controls.tone,
            bass: self.controls.bass_enabled.then(|| chord.root.transpose(-12)),
        }
    }

    // ========================================================================
    // Performance
    // ========================================================================

    /// Degree pad pressed. Returns the degree now sounding.
    pub fn press_degree(&mut self, degree: ScaleDegree) -> Option<ScaleDegree> {
        self.last_degree = degree;
        if !self.controls.arp_enabled {
            return self.strike_chord(degree);
        }
        self.chord_degree = None;
        self.scheduler.press(
            &mut self.transport,
            &self.resolver,
            &self.harmony,
            degree,
            &self.settings,
        )
    }

    pub fn release_degree(&mut self, degree: ScaleDegree) {
        if self.chord_degree == Some(degree) {
            self.chord_degree = None;
        }
        self.scheduler.release(&mut self.transport, degree);
    }

    /// Sound the whole chord at once for one beat
    fn strike_chord(&mut self, degree: ScaleDegree) -> Option<ScaleDegree> {
        self.scheduler.stop(&mut self.transport, false);

        let chord = self.resolver.resolve(&self.harmony, degree);
        if chord.is_empty() {
            debug!(degree = degree.value(), "Chord has no notes, nothing to strike");
            self.chord_degree = None;
            return None;
        }

        let time = self.transport.now();
        let step = self.transport.step_at(time);
        let sustain = self.transport.seconds_per_beat();
        let trigger = Trigger {
            time,
            velocity: self.controls.dynamics,
            pitch: chord.root,
            notes: chord.notes.clone(),
            sustain,
            context: self.trigger_context(TriggerSource::Chord, degree, &chord),
        };

        if self.recording {
            let stamp = ChordStamp::new(&chord, &self.harmony, degree);
            let target = self.patterns.target(self.controls.pattern_id);
            // A grid step holds one pitch, so sync timing keeps the root only
            let notes: &[Note] = match self.recorder.timing_mode() {
                TimingMode::Sync => std::slice::from_ref(&chord.root),
                TimingMode::Free => &chord.notes,
            };
            for &note in notes {
                let take = RecordedNote {
                    note,
                    time,
                    step,
                    velocity: self.controls.dynamics,
                    duration: Some(sustain),
                };
                self.recorder
                    .record(self.patterns.get_mut(target), &take, None, Some(&stamp));
            }
        }

        debug!(degree = degree.value(), chord = %chord.roman_numeral, "Block chord");
        self.pending.push(trigger);
        self.chord_degree = Some(degree);
        self.chord_degree
    }

    /// Manual keyboard note, captured when recording
    pub fn note_on(&mut self, note: Note) {
        if !self.recording {
            return;
        }
        let time = self.transport.now();
        let step = self.transport.step_at(time);
        let target = self.patterns.target(self.controls.pattern_id);
        self.recorder.note_on(
            self.patterns.get_mut(target),
            note,
            time,
            step,
            self.controls.dynamics,
        );
    }

    pub fn note_off(&mut self, note: Note) {
        let time = self.transport.now();
        let target = self.patterns.target(self.controls.pattern_id);
        self.recorder.note_off(self.patterns.get_mut(target), note, time);
    }

    // ========================================================================
    // Parameters
    // ========================================================================

    /// New key, scale or voicing preferences. A live arpeggio follows.
    pub fn set_harmony(&mut self, harmony: HarmonyContext) {
        self.controls.complexity = harmony.complexity;
        self.harmony = harmony;
        self.reschedule();
    }

    pub fn set_session_settings(&mut self, settings: SessionSettings) {
        self.settings = settings.normalized();
        self.recorder.set_timing_mode(self.settings.timing_mode);
        self.reschedule();
    }

    /// Returns false when the request was ignored (free timing)
    pub fn set_autopilot(&mut self, enabled: bool) -> bool {
        if enabled && self.settings.timing_mode == TimingMode::Free {
            warn!(instrument = %self.name, "Autopilot needs sync timing, ignoring");
            return false;
        }
        if self.settings.autopilot == enabled {
            return true;
        }
        self.settings.autopilot = enabled;
        info!(instrument = %self.name, enabled, "Autopilot toggled");

        if enabled {
            if self.scheduler.is_active() {
                self.reschedule();
            } else if self.controls.arp_enabled {
                self.scheduler.start(
                    &mut self.transport,
                    &self.resolver,
                    &self.harmony,
                    self.last_degree,
                    &self.settings,
                );
            }
        } else if self.settings.latch {
            self.reschedule();
        } else {
            self.scheduler.stop(&mut self.transport, false);
        }
        true
    }

    pub fn set_timing_mode(&mut self, mode: TimingMode) {
        let settings = SessionSettings {
            timing_mode: mode,
            ..self.settings.clone()
        };
        self.set_session_settings(settings);
    }

    pub fn set_controls(&mut self, controls: ControlState) {
        let controls = controls.normalized();
        let complexity_changed = controls.complexity != self.controls.complexity;
        let arp_disabled = self.controls.arp_enabled && !controls.arp_enabled;
        self.harmony.complexity = controls.complexity;
        self.controls = controls;

        if arp_disabled {
            self.scheduler.stop(&mut self.transport, false);
        } else if complexity_changed {
            self.reschedule();
        }
    }

    /// Replace the companion tracks and rebuild the autopilot mask
    pub fn set_companion_tracks(&mut self, tracks: Vec<CompanionTrack>) {
        let mask = RhythmMask::build(&tracks);
        debug!(tracks = tracks.len(), hits = mask.steps().iter().filter(|&&on| on).count(), "Rhythm mask rebuilt");
        self.companion_tracks = tracks;
        self.scheduler.set_rhythm_mask(mask);
    }

    fn reschedule(&mut self) {
        self.scheduler
            .reschedule(&mut self.transport, &self.resolver, &self.harmony, &self.settings);
    }

    // ========================================================================
    // Recording
    // ========================================================================

    pub fn start_recording(&mut self) {
        self.recorder.reset();
        self.recording = true;
        let target = self.patterns.target(self.controls.pattern_id);
        info!(instrument = %self.name, pattern = target.name(), "Recording started");
    }

    pub fn stop_recording(&mut self) {
        self.recording = false;
        self.recorder.reset();
        info!(instrument = %self.name, "Recording stopped");
    }

    /// Hand the instrument over to a different sound. The running session
    /// and any take in progress end here.
    pub fn switch_instrument(&mut self, name: impl Into<String>) {
        self.scheduler.stop(&mut self.transport, false);
        self.chord_degree = None;
        self.recorder.reset();
        self.pending.clear();
        self.name = name.into();
        info!(instrument = %self.name, "Instrument switched");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arpeggiator::ArpStyle;
    use crate::chord_library::Complexity;
    use crate::track::{TrackId, TrackRole};

    fn playing() -> Instrument {
        let mut instrument = Instrument::with_seed("keys", 3);
        instrument.set_bpm(120.0);
        instrument.play();
        instrument
    }

    fn midi(triggers: &[Trigger]) -> Vec<i32> {
        triggers.iter().map(|t| t.pitch.midi()).collect()
    }

    fn kick_on_beats() -> CompanionTrack {
        CompanionTrack::new(TrackId(1), TrackRole::Kick, "Kick")
            .with_steps((0..16).map(|i| i % 4 == 0).collect())
    }

    #[test]
    fn arpeggio_triggers_carry_controls() {
        let mut instrument = playing();
        let controls = ControlState { dynamics: 0.6, tone: 0.3, bass_enabled: true, ..Default::default() };
        instrument.set_controls(controls);
        instrument.press_degree(ScaleDegree::new(0));

        let triggers = instrument.advance(0.5);
        assert_eq!(midi(&triggers), vec![60, 64, 67, 60]);
        let first = &triggers[0];
        assert_eq!(first.velocity, 0.6);
        assert_eq!(first.context.tone, 0.3);
        assert_eq!(first.context.bass, Some(Note(48)));
        assert_eq!(first.context.source, TriggerSource::Arpeggio);
        assert_eq!(first.context.roman_numeral, "I");
        assert!((triggers[1].time - 0.125).abs() < 1e-9);
    }

    #[test]
    fn block_chord_when_arpeggiator_is_off() {
        let mut instrument = playing();
        instrument.set_controls(ControlState { arp_enabled: false, ..Default::default() });
        assert_eq!(instrument.press_degree(ScaleDegree::new(3)), Some(ScaleDegree::new(3)));

        let triggers = instrument.advance(1.0);
        assert_eq!(triggers.len(), 1);
        let chord = &triggers[0];
        assert_eq!(chord.context.source, TriggerSource::Chord);
        assert_eq!(chord.notes.iter().map(|n| n.midi()).collect::<Vec<_>>(), vec![65, 69, 72]);
        assert!((chord.sustain - 0.5).abs() < 1e-9);
        assert_eq!(chord.context.bass, None);

        instrument.release_degree(ScaleDegree::new(3));
        assert_eq!(instrument.playing_degree(), None);
    }

    #[test]
    fn records_arpeggio_into_selected_pattern() {
        let mut instrument = playing();
        instrument.set_controls(ControlState { pattern_id: Some(PatternId::B), ..Default::default() });
        instrument.start_recording();
        instrument.press_degree(ScaleDegree::new(0));
        instrument.advance(0.5);
        instrument.stop_recording();
        instrument.advance(0.5);

        let pattern = instrument.pattern(PatternId::B);
        assert_eq!(&pattern.grid.steps[..6], &[true, true, true, true, false, false]);
        assert_eq!(&pattern.grid.pitches[..4], &[0, 4, 7, 0]);
        assert_eq!(pattern.chord.as_ref().map(|c| c.roman_numeral.as_str()), Some("I"));
        assert!(instrument.pattern(PatternId::A).is_empty());
    }

    #[test]
    fn free_timing_records_relative_times() {
        let mut instrument = playing();
        instrument.set_session_settings(SessionSettings {
            timing_mode: TimingMode::Free,
            rate_free_ms: 500.0,
            ..Default::default()
        });
        instrument.advance(3.0);
        instrument.start_recording();
        instrument.press_degree(ScaleDegree::new(0));
        instrument.advance(1.0);

        let pattern = instrument.patterns().active();
        let times: Vec<f64> = pattern.note_events.iter().map(|e| e.time).collect();
        assert_eq!(times, vec![0.0, 0.5]);
        assert!(pattern.loop_length >= 0.5 + pattern.note_events[1].duration - 1e-9);
        assert!(pattern.grid.is_empty());
    }

    #[test]
    fn autopilot_follows_the_kick() {
        let mut instrument = playing();
        instrument.set_companion_tracks(vec![kick_on_beats()]);
        instrument.press_degree(ScaleDegree::new(0));
        assert!(instrument.set_autopilot(true));

        let triggers = instrument.advance(2.0);
        let steps: Vec<u64> = triggers.iter().map(|t| (t.time / 0.125).round() as u64).collect();
        assert_eq!(steps, vec![0, 4, 8, 12]);
    }

    #[test]
    fn autopilot_starts_on_the_last_degree() {
        let mut instrument = playing();
        instrument.press_degree(ScaleDegree::new(4));
        instrument.release_degree(ScaleDegree::new(4));
        assert_eq!(instrument.playing_degree(), None);

        instrument.set_autopilot(true);
        assert_eq!(instrument.playing_degree(), Some(ScaleDegree::new(4)));
        instrument.release_degree(ScaleDegree::new(4));
        assert_eq!(instrument.playing_degree(), Some(ScaleDegree::new(4)));

        instrument.set_autopilot(false);
        assert_eq!(instrument.playing_degree(), None);
    }

    #[test]
    fn autopilot_is_refused_in_free_timing() {
        let mut instrument = playing();
        instrument.set_timing_mode(TimingMode::Free);
        assert!(!instrument.set_autopilot(true));
        assert!(!instrument.settings().autopilot);
    }

    #[test]
    fn harmony_change_reschedules_live_session() {
        let mut instrument = playing();
        let latch = SessionSettings { latch: true, style: ArpStyle::Up, ..Default::default() };
        instrument.set_session_settings(latch);
        instrument.press_degree(ScaleDegree::new(0));
        instrument.advance(0.25);

        instrument.set_harmony(HarmonyContext { tonal_center: Note(62), ..Default::default() });
        let triggers = instrument.advance(0.375);
        assert_eq!(midi(&triggers), vec![62, 66, 69]);
        assert_eq!(instrument.latched_degree(), Some(ScaleDegree::new(0)));
    }

    #[test]
    fn complexity_control_reaches_the_resolver() {
        let mut instrument = playing();
        instrument.press_degree(ScaleDegree::new(0));
        instrument.set_controls(ControlState { complexity: Complexity::Extended, ..Default::default() });
        assert_eq!(instrument.harmony().complexity, Complexity::Extended);
        assert_eq!(instrument.current_chord().map(|c| c.notes.len()), Some(4));
    }

    #[test]
    fn tempo_change_stretches_the_interval() {
        let mut instrument = playing();
        instrument.set_bpm(60.0);
        instrument.press_degree(ScaleDegree::new(0));
        assert_eq!(instrument.advance(1.0).len(), 4);
    }

    #[test]
    fn switching_instrument_ends_the_session() {
        let mut instrument = playing();
        instrument.set_session_settings(SessionSettings { latch: true, ..Default::default() });
        instrument.press_degree(ScaleDegree::new(2));
        instrument.switch_instrument("pad");

        assert_eq!(instrument.name(), "pad");
        assert_eq!(instrument.playing_degree(), None);
        assert_eq!(instrument.latched_degree(), None);
        assert!(instrument.advance(1.0).is_empty());
        assert_eq!(instrument.transport().active_registrations(), 0);
    }

    #[test]
    fn stopped_transport_emits_nothing() {
        let mut instrument = Instrument::new("keys");
        instrument.press_degree(ScaleDegree::new(0));
        assert!(instrument.advance(1.0).is_empty());
        instrument.play();
        assert_eq!(instrument.advance(0.25).len(), 2);
    }

    #[test]
    fn unfold_plays_every_tone_through_the_instrument() {
        let mut instrument = playing();
        instrument.set_session_settings(SessionSettings { style: ArpStyle::Unfold, ..Default::default() });
        instrument.start_recording();
        instrument.press_degree(ScaleDegree::new(0));

        let triggers = instrument.advance(1.0);
        assert_eq!(midi(&triggers), vec![60, 64, 67]);
        assert_eq!(triggers[2].context.roman_numeral, "I");
        assert_eq!(instrument.playing_degree(), None);
        assert_eq!(instrument.transport().active_registrations(), 0);

        let grid = &instrument.patterns().active().grid;
        assert_eq!(grid.steps.iter().filter(|&&on| on).count(), 3);
        assert_eq!(&grid.pitches[..3], &[0, 4, 7]);
    }

    #[test]
    fn autopilot_recording_skips_suppressed_steps() {
        let mut instrument = playing();
        instrument.set_companion_tracks(vec![kick_on_beats()]);
        instrument.set_session_settings(SessionSettings { autopilot: true, ..Default::default() });
        instrument.start_recording();
        instrument.press_degree(ScaleDegree::new(0));

        let triggers = instrument.advance(2.0);
        assert_eq!(triggers.len(), 4);
        let steps = &instrument.patterns().active().grid.steps;
        for (i, &on) in steps.iter().enumerate() {
            assert_eq!(on, i % 4 == 0, "step {i}");
        }
    }

    #[test]
    fn block_chord_records_root_in_sync_and_every_tone_in_free() {
        let mut instrument = playing();
        instrument.set_controls(ControlState { arp_enabled: false, ..Default::default() });
        instrument.start_recording();
        instrument.press_degree(ScaleDegree::new(4));
        let grid = &instrument.patterns().active().grid;
        assert!(grid.steps[0]);
        assert_eq!(grid.pitches[0], 7);

        instrument.set_controls(ControlState {
            arp_enabled: false,
            pattern_id: Some(PatternId::B),
            ..Default::default()
        });
        instrument.set_timing_mode(TimingMode::Free);
        instrument.press_degree(ScaleDegree::new(4));
        let notes: Vec<i32> = instrument
            .pattern(PatternId::B)
            .note_events
            .iter()
            .map(|e| e.note.midi())
            .collect();
        assert_eq!(notes.len(), 3);
        assert!(notes.contains(&67) && notes.contains(&71) && notes.contains(&74));
    }

    #[test]
    fn manual_notes_are_captured_while_recording() {
        let mut instrument = playing();
        instrument.set_timing_mode(TimingMode::Free);
        instrument.start_recording();
        instrument.note_on(Note(72));
        instrument.advance(0.3);
        instrument.note_off(Note(72));

        let events = &instrument.patterns().active().note_events;
        assert_eq!(events.len(), 1);
        assert!((events[0].duration - 0.3).abs() < 1e-9);
    }
}
