//! Transport clock: tempo, position, and periodic tick registrations

use std::fmt;

use serde::{Deserialize, Serialize};

/// Shortest interval a registration may repeat at, in seconds
const MIN_INTERVAL_SECS: f64 = 0.001;
/// Tolerance when snapping a tick time onto the 16th-note grid
const STEP_EPSILON: f64 = 1e-6;

/// Transport playback state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TransportState {
    #[default]
    Stopped,
    Playing,
    Paused,
}

// ============================================================================
// Subdivisions
// ============================================================================

/// Rhythmic feel of a subdivision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Feel {
    #[default]
    Straight,
    Dotted,
    Triplet,
}

/// Tempo-relative note length such as 1/8 or 1/16t
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Subdivision {
    /// 4 = quarter, 8 = eighth, 16 = sixteenth
    pub division: u32,
    pub feel: Feel,
}

impl Subdivision {
    pub const QUARTER: Subdivision = Subdivision::straight(4);
    pub const EIGHTH: Subdivision = Subdivision::straight(8);
    pub const SIXTEENTH: Subdivision = Subdivision::straight(16);
    pub const THIRTY_SECOND: Subdivision = Subdivision::straight(32);

    pub const fn straight(division: u32) -> Self {
        Self { division, feel: Feel::Straight }
    }

    /// Length in quarter-note beats
    pub fn beats(&self) -> f64 {
        let base = 4.0 / self.division.max(1) as f64;
        match self.feel {
            Feel::Straight => base,
            Feel::Dotted => base * 1.5,
            Feel::Triplet => base * 2.0 / 3.0,
        }
    }

    pub fn seconds(&self, bpm: f64) -> f64 {
        self.beats() * 60.0 / bpm
    }

    /// Parse "1/8", "1/8.", "1/8t", "8n", "8n.", "8t".
    /// Unknown tokens give a sixteenth.
    pub fn parse(token: &str) -> Self {
        Self::try_parse(token).unwrap_or_else(|| {
            tracing::debug!(token, "Unknown subdivision, using 1/16");
            Self::SIXTEENTH
        })
    }

    fn try_parse(token: &str) -> Option<Self> {
        let token = token.trim().to_ascii_lowercase();
        let body = token.strip_prefix("1/").unwrap_or(&token);

        let (body, feel) = if let Some(rest) = body.strip_suffix('.') {
            (rest, Feel::Dotted)
        } else if let Some(rest) = body.strip_suffix('t') {
            (rest, Feel::Triplet)
        } else {
            (body, Feel::Straight)
        };
        let body = body.strip_suffix('n').unwrap_or(body);

        let division: u32 = body.parse().ok()?;
        matches!(division, 1 | 2 | 4 | 8 | 16 | 32 | 64).then_some(Self { division, feel })
    }
}

impl Default for Subdivision {
    fn default() -> Self {
        Self::SIXTEENTH
    }
}

impl fmt::Display for Subdivision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let suffix = match self.feel {
            Feel::Straight => "",
            Feel::Dotted => ".",
            Feel::Triplet => "t",
        };
        write!(f, "1/{}{}", self.division, suffix)
    }
}

impl From<String> for Subdivision {
    fn from(token: String) -> Self {
        Self::parse(&token)
    }
}

impl From<Subdivision> for String {
    fn from(subdivision: Subdivision) -> Self {
        subdivision.to_string()
    }
}

// ============================================================================
// Clock
// ============================================================================

/// Opaque handle for a periodic registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegistrationId(pub u64);

impl fmt::Display for RegistrationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// How often a registration repeats
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClockInterval {
    /// Follows the tempo
    Subdivision(Subdivision),
    /// Fixed length in milliseconds
    Millis(f64),
}

/// One firing of a registration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClockTick {
    pub registration: RegistrationId,
    /// Transport time in seconds
    pub time: f64,
    /// Absolute 16th-note step at `time`
    pub step: u64,
    /// Ticks fired by this registration before this one
    pub count: u64,
}

/// A clock that fires periodic registrations
pub trait MusicalClock {
    /// Current position in seconds
    fn now(&self) -> f64;
    fn bpm(&self) -> f64;
    /// Absolute 16th-note step at `time`
    fn step_at(&self, time: f64) -> u64;
    fn interval_secs(&self, interval: ClockInterval) -> f64;
    /// Install a registration whose first tick fires at the current position
    fn register(&mut self, interval: ClockInterval) -> RegistrationId;
    /// Remove a registration. Returns false if it was already gone.
    fn cancel(&mut self, id: RegistrationId) -> bool;
}

#[derive(Debug, Clone)]
struct Registration {
    id: RegistrationId,
    interval: ClockInterval,
    next_due: f64,
    count: u64,
}

/// Transport controls and position
#[derive(Debug, Clone)]
pub struct Transport {
    pub state: TransportState,
    /// Current position in seconds
    position_secs: f64,
    /// Tempo in BPM
    bpm: f64,
    /// Time signature numerator
    pub time_sig_num: u8,
    /// Time signature denominator
    pub time_sig_denom: u8,
    registrations: Vec<Registration>,
    next_registration: u64,
}

impl Default for Transport {
    fn default() -> Self {
        Self {
            state: TransportState::Stopped,
            position_secs: 0.0,
            bpm: 120.0,
            time_sig_num: 4,
            time_sig_denom: 4,
            registrations: Vec::new(),
            next_registration: 1,
        }
    }
}

impl Transport {
    pub fn new(bpm: f64) -> Self {
        let mut transport = Self::default();
        transport.set_bpm(bpm);
        transport
    }

    pub fn play(&mut self) {
        self.state = TransportState::Playing;
    }

    /// Stop and rewind. Live registrations restart from the top.
    pub fn stop(&mut self) {
        self.state = TransportState::Stopped;
        self.position_secs = 0.0;
        for reg in &mut self.registrations {
            reg.next_due = 0.0;
        }
    }

    pub fn pause(&mut self) {
        self.state = TransportState::Paused;
    }

    pub fn is_playing(&self) -> bool {
        self.state == TransportState::Playing
    }

    pub fn position_secs(&self) -> f64 {
        self.position_secs
    }

    /// Tempo is kept within 20-300 BPM
    pub fn set_bpm(&mut self, bpm: f64) {
        self.bpm = if bpm.is_finite() { bpm.clamp(20.0, 300.0) } else { 120.0 };
    }

    /// Seconds per quarter-note beat at current tempo
    pub fn seconds_per_beat(&self) -> f64 {
        60.0 / self.bpm
    }

    /// Seconds per 16th-note step at current tempo
    pub fn seconds_per_step(&self) -> f64 {
        self.seconds_per_beat() / 4.0
    }

    /// Current beat number (0-indexed)
    pub fn current_beat(&self) -> f64 {
        self.position_secs / self.seconds_per_beat()
    }

    pub fn active_registrations(&self) -> usize {
        self.registrations.len()
    }

    /// Pop the earliest tick due strictly before `until`, moving the
    /// position to that tick. Ticks come out in non-decreasing time order.
    /// Callers may register or cancel between polls; a registration made
    /// mid-advance fires at the current position on the next poll.
    pub fn poll(&mut self, until: f64) -> Option<ClockTick> {
        if !self.is_playing() {
            return None;
        }

        let idx = self
            .registrations
            .iter()
            .enumerate()
            .filter(|(_, r)| r.next_due < until)
            .min_by(|(_, a), (_, b)| a.next_due.total_cmp(&b.next_due))
            .map(|(i, _)| i)?;

        let interval = self.interval_secs(self.registrations[idx].interval);
        let reg = &mut self.registrations[idx];
        let time = reg.next_due;
        let tick_count = reg.count;
        let id = reg.id;
        reg.next_due += interval;
        reg.count += 1;

        self.position_secs = self.position_secs.max(time);
        Some(ClockTick {
            registration: id,
            time,
            step: self.step_at(time),
            count: tick_count,
        })
    }

    /// Move the position forward once all ticks before `until` were polled
    pub fn advance_to(&mut self, until: f64) {
        if self.is_playing() && until > self.position_secs {
            self.position_secs = until;
        }
    }

    /// Format position as MM:SS.mm
    pub fn format_time(&self) -> String {
        let mins = (self.position_secs / 60.0) as u32;
        let secs_rem = self.position_secs % 60.0;
        format!("{:02}:{:05.2}", mins, secs_rem)
    }
}

impl MusicalClock for Transport {
    fn now(&self) -> f64 {
        self.position_secs
    }

    fn bpm(&self) -> f64 {
        self.bpm
    }

    fn step_at(&self, time: f64) -> u64 {
        (time.max(0.0) / self.seconds_per_step() + STEP_EPSILON).floor() as u64
    }

    fn interval_secs(&self, interval: ClockInterval) -> f64 {
        let secs = match interval {
            ClockInterval::Subdivision(sub) => sub.seconds(self.bpm),
            ClockInterval::Millis(ms) => ms / 1000.0,
        };
        if secs.is_finite() { secs.max(MIN_INTERVAL_SECS) } else { MIN_INTERVAL_SECS }
    }

    fn register(&mut self, interval: ClockInterval) -> RegistrationId {
        let id = RegistrationId(self.next_registration);
        self.next_registration += 1;
        self.registrations.push(Registration {
            id,
            interval,
            next_due: self.position_secs,
            count: 0,
        });
        id
    }

    fn cancel(&mut self, id: RegistrationId) -> bool {
        let before = self.registrations.len();
        self.registrations.retain(|r| r.id != id);
        self.registrations.len() != before
    }
}
