//! Companion track representation

use serde::{Deserialize, Serialize};

/// Unique identifier for tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrackId(pub u64);

/// What a rhythm track plays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackRole {
    Kick,
    Snare,
    #[default]
    Other,
}

impl TrackRole {
    /// Guess a role from a track or instrument name. Short aliases such
    /// as "bd" and "sd" only count as whole words.
    pub fn from_name(name: &str) -> Self {
        let name = name.to_ascii_lowercase();
        let has_word = |aliases: &[&str]| {
            name.split(|c: char| !c.is_ascii_alphanumeric())
                .any(|word| aliases.iter().any(|alias| *alias == word))
        };
        if name.contains("kick") || name.contains("bass drum") || has_word(&["bd", "bassdrum"]) {
            Self::Kick
        } else if name.contains("snare") || name.contains("clap") || has_word(&["sd", "sn"]) {
            Self::Snare
        } else {
            Self::Other
        }
    }

    /// Kick and snare hits drive autopilot gating
    pub fn drives_autopilot(&self) -> bool {
        matches!(self, Self::Kick | Self::Snare)
    }
}

/// A drum or percussion track whose steps other instruments can follow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanionTrack {
    pub id: TrackId,
    pub role: TrackRole,
    pub name: String,
    /// On/off steps, `None` when the track has no pattern loaded
    pub steps: Option<Vec<bool>>,
}

impl CompanionTrack {
    pub fn new(id: TrackId, role: TrackRole, name: impl Into<String>) -> Self {
        Self {
            id,
            role,
            name: name.into(),
            steps: None,
        }
    }

    pub fn with_steps(mut self, steps: Vec<bool>) -> Self {
        self.steps = Some(steps);
        self
    }

    /// Indices of active steps
    pub fn active_steps(&self) -> impl Iterator<Item = usize> + '_ {
        self.steps
            .iter()
            .flat_map(|steps| steps.iter().enumerate())
            .filter_map(|(i, &on)| on.then_some(i))
    }
}
