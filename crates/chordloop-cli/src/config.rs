use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use chordloop_core::{
    CompanionTrack, ControlState, HarmonyContext, ScaleDegree, SessionSettings, TrackId, TrackRole,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub harmony: HarmonyContext,
    #[serde(default)]
    pub arpeggiator: SessionSettings,
    #[serde(default)]
    pub controls: ControlState,
    #[serde(default)]
    pub session: SessionConfig,
    /// Rhythm tracks autopilot follows
    #[serde(default)]
    pub tracks: Vec<TrackConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub bpm: f64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self { bpm: 120.0 }
    }
}

/// Scripted performance played by the binary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Degrees to press in order, 0-6
    pub degrees: Vec<u8>,
    /// Bars each degree is held for
    pub bars: u32,
    pub record: bool,
    /// Drive the transport from the wall clock instead of offline
    pub realtime: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            degrees: vec![0, 5, 3, 4],
            bars: 1,
            record: false,
            realtime: false,
        }
    }
}

impl SessionConfig {
    pub fn degrees(&self) -> impl Iterator<Item = ScaleDegree> + '_ {
        self.degrees.iter().map(|&d| ScaleDegree::new(d))
    }
}

/// A companion rhythm track, e.g. `{ name = "Kick", steps = "x...x...x...x..." }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackConfig {
    pub name: String,
    /// Guessed from the name when left out
    #[serde(default)]
    pub role: Option<TrackRole>,
    /// One character per step, `x` for a hit
    #[serde(default)]
    pub steps: String,
}

impl TrackConfig {
    pub fn to_track(&self, id: u64) -> CompanionTrack {
        let role = self.role.unwrap_or_else(|| TrackRole::from_name(&self.name));
        let track = CompanionTrack::new(TrackId(id), role, self.name.clone());
        if self.steps.trim().is_empty() {
            return track;
        }
        let steps = self
            .steps
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '|')
            .map(|c| matches!(c, 'x' | 'X' | '1'))
            .collect();
        track.with_steps(steps)
    }
}

impl AppConfig {
    pub fn companion_tracks(&self) -> Vec<CompanionTrack> {
        self.tracks
            .iter()
            .zip(1..)
            .map(|(track, id)| track.to_track(id))
            .collect()
    }


    /// Clamp every value back into range after loading
    pub fn normalized(mut self) -> Self {
        self.arpeggiator = self.arpeggiator.normalized();
        self.controls = self.controls.normalized();
        self.harmony.complexity = self.controls.complexity;
        self.session.bars = self.session.bars.clamp(1, 64);
        self
    }
}

pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("chordloop")
        .join("config.toml")
}

/// Load from `path`, or the default location. Anything unreadable gives
/// the defaults.
pub fn load_config(path: Option<&Path>) -> AppConfig {
    let path = path.map(Path::to_path_buf).unwrap_or_else(config_path);
    let text = match std::fs::read_to_string(&path) {
        Ok(text) => text,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "No config file, using defaults");
            return AppConfig::default();
        }
    };
    match toml::from_str::<AppConfig>(&text) {
        Ok(config) => {
            debug!(path = %path.display(), "Loaded config");
            config.normalized()
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Invalid config, using defaults");
            AppConfig::default()
        }
    }
}

pub fn save_config(config: &AppConfig, path: &Path) {
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let Ok(s) = toml::to_string_pretty(config) else { return };
    let _ = std::fs::write(path, s);
}
