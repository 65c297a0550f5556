use crate::core::World;
use crate::dynamics::Dynamics;
use crate::ranges::IdRange;

/// Periodic-image sentinel.
///
/// Without a neighbour list every pair prediction uses the minimum
/// image at prediction time; a fast particle can cross into a
/// different image before its queued events fire. The sentinel emits a
/// virtual event well before that horizon so the particle's events are
/// re-predicted against the correct image.
#[derive(Debug, Clone)]
pub struct PbcSentinel {
    pub name: String,
    pub range: IdRange,
    /// Longest interaction range; set at initialisation.
    pub max_range: f64,
}

impl PbcSentinel {
    pub fn new(name: impl Into<String>, range: IdRange) -> Self {
        Self {
            name: name.into(),
            range,
            max_range: 0.0,
        }
    }

    pub fn event_time(&self, w: &World, dynamics: &Dynamics, pid: u32) -> f64 {
        dynamics.pbc_sentinel_time(w, pid, self.max_range)
    }
}
