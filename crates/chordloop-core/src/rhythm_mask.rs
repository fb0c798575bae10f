//! Step mask built from kick and snare tracks, used to gate autopilot

use serde::{Deserialize, Serialize};

use crate::track::CompanionTrack;

/// Slots in a rhythm mask
pub const MASK_STEPS: usize = 16;

/// Fixed 16-step gate. Built once from companion tracks and replaced
/// wholesale when they change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RhythmMask([bool; MASK_STEPS]);

impl RhythmMask {
    pub fn from_steps(steps: [bool; MASK_STEPS]) -> Self {
        Self(steps)
    }

    /// OR together the active steps of every kick and snare track.
    /// Patterns longer than 16 steps fold back onto the mask.
    pub fn build(tracks: &[CompanionTrack]) -> Self {
        let mut mask = [false; MASK_STEPS];
        for track in tracks.iter().filter(|t| t.role.drives_autopilot()) {
            for step in track.active_steps() {
                mask[step % MASK_STEPS] = true;
            }
        }
        Self(mask)
    }

    /// Whether `step` (any absolute step count) lands on a hit
    pub fn allows(&self, step: u64) -> bool {
        self.0[(step % MASK_STEPS as u64) as usize]
    }

    /// True when no slot is set, in which case gating is skipped
    pub fn is_empty(&self) -> bool {
        !self.0.iter().any(|&on| on)
    }

    pub fn steps(&self) -> &[bool; MASK_STEPS] {
        &self.0
    }
}
