//! chordloop-core: harmony, arpeggiator and pattern recording for the chordloop sequencer

pub mod arpeggiator;
mod chord_library;
mod chord_resolver;
mod control;
mod error;
mod instrument;
mod note;
pub mod pattern;
mod recorder;
mod rhythm_mask;
mod scale;
mod track;
mod transport;

pub use arpeggiator::{
    ArpNote, ArpStyle, ArpeggiatorScheduler, ArpeggiatorSession, SessionSettings, TickOutcome,
    TimingMode,
};
pub use chord_library::{
    standard_entries, ChordLibrary, ChordLibraryEntry, ChordVoicing, Complexity, DiatonicVoicings,
};
pub use chord_resolver::{ChordResolution, ChordResolver, HarmonyContext};
pub use control::ControlState;
pub use error::{ChordloopError, Result};
pub use instrument::{Instrument, Trigger, TriggerContext, TriggerSource};
pub use note::Note;
pub use pattern::{ChordStamp, LoopPattern, NoteEvent, PatternBank, PatternId, StepGrid};
pub use recorder::{PatternRecorder, RecordedNote};
pub use rhythm_mask::{RhythmMask, MASK_STEPS};
pub use scale::{scale_degree_offset, ScaleDegree, ScaleMode, DEGREES_PER_SCALE};
pub use track::{CompanionTrack, TrackId, TrackRole};
pub use transport::{
    ClockInterval, ClockTick, Feel, MusicalClock, RegistrationId, Subdivision, Transport,
    TransportState,
};
