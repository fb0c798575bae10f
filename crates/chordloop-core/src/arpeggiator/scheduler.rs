//! Clock-driven arpeggiator scheduler
//!
//! Owns at most one [`ArpeggiatorSession`] and at most one clock
//! registration. Every start, stop and reschedule cancels the previous
//! registration before installing a new one, and ticks carrying any other
//! registration id are dropped, so a cancelled registration can never
//! advance the cursor.

use tracing::{debug, info, trace};

use crate::chord_resolver::{ChordResolution, ChordResolver, HarmonyContext};
use crate::note::Note;
use crate::rhythm_mask::RhythmMask;
use crate::scale::ScaleDegree;
use crate::transport::{ClockTick, MusicalClock, RegistrationId};

use super::session::ArpeggiatorSession;
use super::settings::SessionSettings;

/// A note the scheduler decided to play
#[derive(Debug, Clone, PartialEq)]
pub struct ArpNote {
    /// Transport time in seconds
    pub time: f64,
    pub note: Note,
    /// Hold time in seconds
    pub duration: f64,
    /// Absolute 16th-note step at `time`
    pub step: u64,
    pub degree: ScaleDegree,
    /// Chord the note was drawn from. The session may already be gone by
    /// the time the note is handled.
    pub chord: ChordResolution,
    pub context: HarmonyContext,
}

/// Result of feeding one clock tick to the scheduler
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    Fired(ArpNote),
    /// Autopilot gated this step; the cursor still moved
    Suppressed,
    /// An unfold ran out of tones and the session ended
    Finished,
    /// Tick from a registration that is no longer live
    Stale,
}

impl TickOutcome {
    pub fn note(&self) -> Option<&ArpNote> {
        match self {
            Self::Fired(note) => Some(note),
            _ => None,
        }
    }
}

pub struct ArpeggiatorScheduler {
    session: Option<ArpeggiatorSession>,
    registration: Option<RegistrationId>,
    playing_degree: Option<ScaleDegree>,
    latched_degree: Option<ScaleDegree>,
    rhythm_mask: RhythmMask,
    rng: fastrand::Rng,
}

impl Default for ArpeggiatorScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl ArpeggiatorScheduler {
    pub fn new() -> Self {
        Self::with_rng(fastrand::Rng::new())
    }

    /// Seeded scheduler, for reproducible random style output
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(fastrand::Rng::with_seed(seed))
    }

    fn with_rng(rng: fastrand::Rng) -> Self {
        Self {
            session: None,
            registration: None,
            playing_degree: None,
            latched_degree: None,
            rhythm_mask: RhythmMask::default(),
            rng,
        }
    }

    /// Degree currently sounding, for UI highlighting
    pub fn playing_degree(&self) -> Option<ScaleDegree> {
        self.playing_degree
    }

    pub fn latched_degree(&self) -> Option<ScaleDegree> {
        self.latched_degree
    }

    pub fn is_active(&self) -> bool {
        self.registration.is_some()
    }

    /// Chord of the live session
    pub fn chord(&self) -> Option<&ChordResolution> {
        self.session.as_ref().map(|s| &s.chord)
    }

    pub fn context(&self) -> Option<&HarmonyContext> {
        self.session.as_ref().map(|s| &s.context)
    }

    pub fn settings(&self) -> Option<&SessionSettings> {
        self.session.as_ref().map(|s| &s.settings)
    }

    pub fn session(&self) -> Option<&ArpeggiatorSession> {
        self.session.as_ref()
    }

    /// Swap in a freshly built mask. The live session reads it from its
    /// next tick on.
    pub fn set_rhythm_mask(&mut self, mask: RhythmMask) {
        self.rhythm_mask = mask;
        if let Some(session) = self.session.as_mut() {
            session.rhythm_mask = mask;
        }
    }

    /// Resolve the degree and start arpeggiating it, replacing any running
    /// session. Returns the degree now sounding.
    pub fn start<C: MusicalClock + ?Sized>(
        &mut self,
        clock: &mut C,
        resolver: &ChordResolver,
        context: &HarmonyContext,
        degree: ScaleDegree,
        settings: &SessionSettings,
    ) -> Option<ScaleDegree> {
        let chord = resolver.resolve(context, degree);
        self.start_with_chord(clock, degree, context.clone(), chord, settings.clone())
    }

    /// Start from an already resolved chord. An empty chord cancels the
    /// previous session and schedules nothing.
    pub fn start_with_chord<C: MusicalClock + ?Sized>(
        &mut self,
        clock: &mut C,
        degree: ScaleDegree,
        context: HarmonyContext,
        chord: ChordResolution,
        settings: SessionSettings,
    ) -> Option<ScaleDegree> {
        self.cancel_registration(clock);
        self.session = None;

        let settings = settings.normalized();
        let Some(session) = ArpeggiatorSession::new(degree, context, chord, settings, self.rhythm_mask)
        else {
            debug!(degree = degree.value(), "Chord has no notes, nothing to schedule");
            self.playing_degree = None;
            return None;
        };

        let interval = session.settings.interval();
        let id = clock.register(interval);
        info!(
            degree = degree.value(),
            chord = %session.chord.roman_numeral,
            style = %session.settings.style,
            pitches = session.pitches().len(),
            registration = %id,
            "Arpeggiator started"
        );

        self.registration = Some(id);
        self.session = Some(session);
        self.playing_degree = Some(degree);
        self.playing_degree
    }

    /// Cancel the registration and drop the session. Unless
    /// `preserve_latch_state` is set, the playing and latched markers are
    /// cleared too. Safe to call when nothing is running.
    pub fn stop<C: MusicalClock + ?Sized>(&mut self, clock: &mut C, preserve_latch_state: bool) {
        let was_active = self.cancel_registration(clock);
        self.session = None;
        if !preserve_latch_state {
            self.playing_degree = None;
            self.latched_degree = None;
        }
        if was_active {
            debug!(preserve_latch_state, "Arpeggiator stopped");
        }
    }

    /// Restart the live session on the same degree with new harmony or
    /// settings. Does nothing when no session is live.
    pub fn reschedule<C: MusicalClock + ?Sized>(
        &mut self,
        clock: &mut C,
        resolver: &ChordResolver,
        context: &HarmonyContext,
        settings: &SessionSettings,
    ) -> Option<ScaleDegree> {
        let degree = self.session.as_ref().map(|s| s.degree)?;
        self.stop(clock, true);
        if !settings.latch {
            self.latched_degree = None;
        }
        debug!(degree = degree.value(), "Rescheduling arpeggiator");
        self.start(clock, resolver, context, degree, settings)
    }

    /// Degree pad pressed. With latch on, pressing the latched degree again
    /// stops it and any other degree switches to it.
    pub fn press<C: MusicalClock + ?Sized>(
        &mut self,
        clock: &mut C,
        resolver: &ChordResolver,
        context: &HarmonyContext,
        degree: ScaleDegree,
        settings: &SessionSettings,
    ) -> Option<ScaleDegree> {
        if settings.latch {
            if self.latched_degree == Some(degree) {
                self.stop(clock, false);
                return None;
            }
            self.latched_degree = Some(degree);
        } else {
            self.latched_degree = None;
        }
        self.start(clock, resolver, context, degree, settings)
    }

    /// Degree pad released. Only stops a momentary (unlatched, non-autopilot)
    /// session on the same degree.
    pub fn release<C: MusicalClock + ?Sized>(&mut self, clock: &mut C, degree: ScaleDegree) {
        let Some(session) = self.session.as_ref() else {
            return;
        };
        if session.settings.latch || session.settings.autopilot || self.latched_degree.is_some() {
            return;
        }
        if self.playing_degree == Some(degree) {
            self.stop(clock, false);
        }
    }

    /// Clock callback: pick the next note and apply autopilot gating
    pub fn on_tick<C: MusicalClock + ?Sized>(&mut self, clock: &mut C, tick: &ClockTick) -> TickOutcome {
        if self.registration != Some(tick.registration) {
            return TickOutcome::Stale;
        }
        let Some(session) = self.session.as_mut() else {
            return TickOutcome::Stale;
        };

        let Some(midi) = session.advance(&mut self.rng) else {
            self.finish_unfold(clock);
            return TickOutcome::Finished;
        };

        let gated = session.settings.autopilot_active()
            && !session.rhythm_mask.is_empty()
            && !session.rhythm_mask.allows(tick.step);

        let outcome = if gated {
            trace!(step = tick.step, "Autopilot suppressed step");
            TickOutcome::Suppressed
        } else {
            let interval = clock.interval_secs(session.settings.interval());
            let note = ArpNote {
                time: tick.time,
                note: Note(midi),
                duration: session.settings.hold_secs(interval),
                step: tick.step,
                degree: session.degree,
                chord: session.chord.clone(),
                context: session.context.clone(),
            };
            trace!(note = %note.note, time = note.time, "Arpeggiator note");
            TickOutcome::Fired(note)
        };

        if session.is_exhausted() {
            self.finish_unfold(clock);
        }
        outcome
    }

    fn finish_unfold<C: MusicalClock + ?Sized>(&mut self, clock: &mut C) {
        info!("Unfold complete");
        self.stop(clock, false);
    }

    /// Returns whether a registration was live
    fn cancel_registration<C: MusicalClock + ?Sized>(&mut self, clock: &mut C) -> bool {
        match self.registration.take() {
            Some(id) => {
                clock.cancel(id);
                true
            }
            None => false,
        }
    }
}
