//! Time-scheduled events not tied to a particle.
//!
//! Each system holds an absolute next-firing time; the scheduler keeps
//! them in a dedicated sub-queue that is re-sorted whenever a system
//! reschedules itself.

pub mod halt;
pub mod rescale;
pub mod snapshot;
pub mod thermostat;
pub mod umbrella;

pub use halt::Halt;
pub use rescale::Rescale;
pub use snapshot::Snapshot;
pub use thermostat::AndersenThermostat;
pub use umbrella::Umbrella;

use crate::core::{ChangeSet, EventKind, World};
use crate::dynamics::Dynamics;
use crate::error::Result;

/// What a fired system event asks of the simulation loop.
#[derive(Debug, Default)]
pub struct SystemOutcome {
    pub changeset: Option<ChangeSet>,
    /// The whole event queue must be rebuilt (velocities rescaled).
    pub rebuild_all: bool,
    /// Write configuration + observable snapshots with this index.
    pub snapshot: Option<u64>,
}

/// Dispatch over the shipped system-event types.
#[derive(Debug, Clone)]
pub enum System {
    Halt(Halt),
    Snapshot(Snapshot),
    Rescale(Rescale),
    AndersenThermostat(AndersenThermostat),
    Umbrella(Umbrella),
}

impl System {
    pub fn name(&self) -> &str {
        match self {
            System::Halt(s) => &s.name,
            System::Snapshot(s) => &s.name,
            System::Rescale(s) => &s.name,
            System::AndersenThermostat(s) => &s.name,
            System::Umbrella(s) => &s.name,
        }
    }

    pub fn xml_type(&self) -> &'static str {
        match self {
            System::Halt(_) => "Halt",
            System::Snapshot(_) => "Snapshot",
            System::Rescale(_) => "Rescale",
            System::AndersenThermostat(_) => "AndersenThermostat",
            System::Umbrella(_) => "Umbrella",
        }
    }

    pub fn event_kind(&self) -> EventKind {
        match self {
            System::Halt(_) => EventKind::Halt,
            System::Snapshot(_) => EventKind::Snapshot,
            System::Rescale(_) => EventKind::Rescale,
            System::AndersenThermostat(_) => EventKind::Gaussian,
            System::Umbrella(s) => s.pending_kind(),
        }
    }

    /// Absolute next firing time.
    pub fn next_time(&self) -> f64 {
        match self {
            System::Halt(s) => s.next_time,
            System::Snapshot(s) => s.next_time,
            System::Rescale(s) => s.next_time,
            System::AndersenThermostat(s) => s.next_time,
            System::Umbrella(s) => s.next_time,
        }
    }

    /// One-time setup once the world exists.
    pub fn initialise(&mut self, w: &mut World, dynamics: &Dynamics) -> Result<()> {
        match self {
            System::AndersenThermostat(s) => s.initialise(w),
            System::Umbrella(s) => s.initialise(w, dynamics),
            _ => Ok(()),
        }
    }

    /// Execute at the stored firing time; the global clock has already
    /// been advanced to it.
    pub fn run(&mut self, w: &mut World, dynamics: &Dynamics) -> Result<SystemOutcome> {
        match self {
            System::Halt(s) => s.run(w),
            System::Snapshot(s) => s.run(w),
            System::Rescale(s) => s.run(w, dynamics),
            System::AndersenThermostat(s) => s.run(w, dynamics),
            System::Umbrella(s) => s.run(w, dynamics),
        }
    }

    /// React to an executed event's change-set; returns true when the
    /// system rescheduled itself and the sub-queue must be re-sorted.
    pub fn particles_updated(
        &mut self,
        w: &mut World,
        dynamics: &Dynamics,
        cs: &ChangeSet,
    ) -> bool {
        match self {
            System::Rescale(s) => s.particles_updated(w),
            System::Umbrella(s) => s.particles_updated(w, dynamics, cs),
            _ => false,
        }
    }

    fn next_time_mut(&mut self) -> &mut f64 {
        match self {
            System::Halt(s) => &mut s.next_time,
            System::Snapshot(s) => &mut s.next_time,
            System::Rescale(s) => &mut s.next_time,
            System::AndersenThermostat(s) => &mut s.next_time,
            System::Umbrella(s) => &mut s.next_time,
        }
    }

    /// Rescale this system's time-to-fire (replica exchange support).
    pub fn rescale_time(&mut self, now: f64, scale: f64) {
        let t = self.next_time_mut();
        if t.is_finite() {
            *t = now + (*t - now) * scale;
        }
    }

    /// Re-anchor the firing time from one simulation clock to another,
    /// preserving the time-to-fire (replica exchange support).
    pub fn shift_time(&mut self, from_now: f64, to_now: f64) {
        let t = self.next_time_mut();
        if t.is_finite() {
            *t = to_now + (*t - from_now);
        }
    }
}
