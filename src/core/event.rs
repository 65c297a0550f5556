use crate::error::{Error, Result};
use crate::math::Vec3;
use ordered_float::NotNan;
use std::cmp::Ordering;

/// Which registry produced an event.
///
/// The variant payload names the producer so the scheduler can route
/// execution back to it without holding pointers into long-lived state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventSource {
    /// Pair event: partner id, interaction index, and the partner's
    /// event-counter snapshot at prediction time (staleness stamp).
    Interaction {
        p2: u32,
        int_id: usize,
        counter2: u64,
    },
    /// Single-particle geometric event from the local registry.
    Local { local_id: usize },
    /// Whole-system producer (periodic-image sentinel).
    Global { global_id: usize },
    /// Time-scheduled event not attached to a particle.
    System { sys_id: usize },
    /// Neighbour-grid cell-boundary crossing.
    VirtualCell { global_id: usize },
}

impl EventSource {
    /// Tie-break rank: System > Interaction > Local > Global > VirtualCell.
    #[inline]
    pub fn rank(&self) -> u8 {
        match self {
            EventSource::System { .. } => 0,
            EventSource::Interaction { .. } => 1,
            EventSource::Local { .. } => 2,
            EventSource::Global { .. } => 3,
            EventSource::VirtualCell { .. } => 4,
        }
    }

    /// Secondary id used in the final tie-break.
    #[inline]
    fn aux(&self) -> u32 {
        match *self {
            EventSource::Interaction { p2, .. } => p2,
            EventSource::Local { local_id } => local_id as u32,
            EventSource::Global { global_id } => global_id as u32,
            EventSource::System { sys_id } => sys_id as u32,
            EventSource::VirtualCell { global_id } => global_id as u32,
        }
    }
}

/// Source-specific sub-kind of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// Hard-core contact.
    Core,
    /// Entering a potential step from outside.
    StepIn,
    /// Leaving a potential step from inside.
    StepOut,
    /// Insufficient energy to cross a step; tangential reflection.
    Bounce,
    /// Plane-wall reflection.
    Wall,
    /// Stochastic velocity re-draw (thermal wall, thermostat).
    Gaussian,
    /// Cell-boundary crossing.
    Cell,
    /// Bookkeeping event with no momentum change.
    Virtual,
    Halt,
    Snapshot,
    Rescale,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Core => "CORE",
            EventKind::StepIn => "STEP_IN",
            EventKind::StepOut => "STEP_OUT",
            EventKind::Bounce => "BOUNCE",
            EventKind::Wall => "WALL",
            EventKind::Gaussian => "GAUSSIAN",
            EventKind::Cell => "CELL",
            EventKind::Virtual => "VIRTUAL",
            EventKind::Halt => "HALT",
            EventKind::Snapshot => "SNAPSHOT",
            EventKind::Rescale => "RESCALE",
        }
    }
}

/// A predicted event: a value object, freely copied into and out of the
/// queue. `time` is absolute simulation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    pub time: NotNan<f64>,
    /// Primary particle; `u32::MAX` for system events.
    pub p1: u32,
    pub source: EventSource,
    pub kind: EventKind,
}

/// Primary-id sentinel for events not attached to a particle.
pub const NO_PARTICLE: u32 = u32::MAX;

impl Event {
    pub fn new(time: f64, p1: u32, source: EventSource, kind: EventKind) -> Result<Self> {
        let time = NotNan::new(time)
            .map_err(|_| Error::Numerical(format!("NaN event time for particle {p1}")))?;
        Ok(Self {
            time,
            p1,
            source,
            kind,
        })
    }

    #[inline]
    pub fn time_f64(&self) -> f64 {
        self.time.into_inner()
    }

    /// Total-order key: time, then source priority, then ids.
    #[inline]
    pub fn order_key(&self) -> (NotNan<f64>, u8, u32, u32) {
        (self.time, self.source.rank(), self.p1, self.source.aux())
    }
}

impl Ord for Event {
    fn cmp(&self, other: &Self) -> Ordering {
        self.order_key().cmp(&other.order_key())
    }
}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Per-particle record inside a change-set.
#[derive(Debug, Clone, Copy)]
pub struct ParticleChange {
    pub id: u32,
    pub old_vel: Vec3,
    pub delta_ke: f64,
}

/// Everything a single executed event did to the particle store.
///
/// Used to fan out invalidation (scheduler) and observation (output
/// collaborators). `kind` may differ from the queued event's kind when
/// execution resolved it differently (a STEP_OUT that bounced).
#[derive(Debug, Clone)]
pub struct ChangeSet {
    pub kind: EventKind,
    pub changes: Vec<ParticleChange>,
    /// Internal (potential) energy change, for capture events.
    pub delta_internal: f64,
}

impl ChangeSet {
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            changes: Vec::new(),
            delta_internal: 0.0,
        }
    }

    pub fn single(kind: EventKind, change: ParticleChange) -> Self {
        Self {
            kind,
            changes: vec![change],
            delta_internal: 0.0,
        }
    }

    pub fn touched(&self) -> impl Iterator<Item = u32> + '_ {
        self.changes.iter().map(|c| c.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ev(t: f64, p1: u32, source: EventSource) -> Event {
        Event::new(t, p1, source, EventKind::Core).unwrap()
    }

    #[test]
    fn nan_time_is_rejected() {
        let err = Event::new(
            f64::NAN,
            0,
            EventSource::Local { local_id: 0 },
            EventKind::Wall,
        )
        .unwrap_err();
        assert!(err.to_string().contains("NaN"));
    }

    #[test]
    fn ordering_by_time_first() {
        let a = ev(1.0, 5, EventSource::VirtualCell { global_id: 0 });
        let b = ev(
            2.0,
            0,
            EventSource::Interaction {
                p2: 1,
                int_id: 0,
                counter2: 0,
            },
        );
        assert!(a < b);
    }

    #[test]
    fn tie_break_follows_source_priority() {
        let t = 5.0;
        let system = ev(t, NO_PARTICLE, EventSource::System { sys_id: 0 });
        let pair = ev(
            t,
            0,
            EventSource::Interaction {
                p2: 1,
                int_id: 0,
                counter2: 0,
            },
        );
        let local = ev(t, 0, EventSource::Local { local_id: 0 });
        let global = ev(t, 0, EventSource::Global { global_id: 0 });
        let cell = ev(t, 0, EventSource::VirtualCell { global_id: 0 });
        assert!(system < pair);
        assert!(pair < local);
        assert!(local < global);
        assert!(global < cell);
    }

    #[test]
    fn tie_break_prefers_lower_ids() {
        let t = 5.0;
        let a = ev(
            t,
            0,
            EventSource::Interaction {
                p2: 3,
                int_id: 0,
                counter2: 9,
            },
        );
        let b = ev(
            t,
            0,
            EventSource::Interaction {
                p2: 4,
                int_id: 0,
                counter2: 0,
            },
        );
        let c = ev(
            t,
            1,
            EventSource::Interaction {
                p2: 0,
                int_id: 0,
                counter2: 0,
            },
        );
        assert!(a < b);
        assert!(b < c);
    }
}
