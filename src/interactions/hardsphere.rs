use crate::core::{ChangeSet, EventKind, World};
use crate::dynamics::Dynamics;
use crate::error::{Error, Result};
use crate::interactions::PairEvent;
use crate::ranges::IdPairRange;

/// The classic hard sphere: a single CORE contact at the diameter.
#[derive(Debug, Clone)]
pub struct HardSphere {
    pub name: String,
    pub range: IdPairRange,
    pub diameter: f64,
    pub elasticity: f64,
}

impl HardSphere {
    pub fn new(name: impl Into<String>, range: IdPairRange, diameter: f64, elasticity: f64) -> Self {
        Self {
            name: name.into(),
            range,
            diameter,
            elasticity,
        }
    }

    pub fn get_event(&self, w: &World, dynamics: &Dynamics, p1: u32, p2: u32) -> Option<PairEvent> {
        let d2 = self.diameter * self.diameter;
        dynamics
            .sphere_sphere_in_root(w, p1, p2, d2)
            .map(|dt| PairEvent {
                dt,
                kind: EventKind::Core,
            })
    }

    pub fn run_event(
        &mut self,
        w: &mut World,
        dynamics: &Dynamics,
        p1: u32,
        p2: u32,
        kind: EventKind,
    ) -> Result<ChangeSet> {
        match kind {
            EventKind::Core => {
                let d2 = self.diameter * self.diameter;
                dynamics.smooth_spheres_coll(w, p1, p2, self.elasticity, d2)
            }
            other => Err(Error::State(format!(
                "hard sphere \"{}\" cannot run a {} event",
                self.name,
                other.as_str()
            ))),
        }
    }

    pub fn validate_state(
        &self,
        w: &World,
        dynamics: &Dynamics,
        p1: u32,
        p2: u32,
    ) -> Option<String> {
        let d2 = self.diameter * self.diameter;
        if dynamics.sphere_overlap(w, p1, p2, d2) {
            return Some(format!(
                "particles {p1} and {p2} have entered the core at {} and are at a distance of {}",
                self.diameter,
                w.distance2(p1, p2).sqrt()
            ));
        }
        None
    }
}

/// Hard sphere with surface roughness: the CORE contact also exchanges
/// tangential momentum against the particles' spin.
#[derive(Debug, Clone)]
pub struct RoughHardSphere {
    pub name: String,
    pub range: IdPairRange,
    pub diameter: f64,
    pub elasticity: f64,
    pub tangential_elasticity: f64,
}

impl RoughHardSphere {
    pub fn get_event(&self, w: &World, dynamics: &Dynamics, p1: u32, p2: u32) -> Option<PairEvent> {
        let d2 = self.diameter * self.diameter;
        dynamics
            .sphere_sphere_in_root(w, p1, p2, d2)
            .map(|dt| PairEvent {
                dt,
                kind: EventKind::Core,
            })
    }

    pub fn run_event(
        &mut self,
        w: &mut World,
        dynamics: &Dynamics,
        p1: u32,
        p2: u32,
        kind: EventKind,
    ) -> Result<ChangeSet> {
        match kind {
            EventKind::Core => {
                let d2 = self.diameter * self.diameter;
                // Solid-sphere moment of inertia, m d^2 / 10.
                let inertia = 0.1 * w.mass_of(p1) * d2;
                dynamics.rough_spheres_coll(
                    w,
                    p1,
                    p2,
                    self.elasticity,
                    self.tangential_elasticity,
                    d2,
                    inertia,
                )
            }
            other => Err(Error::State(format!(
                "rough hard sphere \"{}\" cannot run a {} event",
                self.name,
                other.as_str()
            ))),
        }
    }

    pub fn validate_state(
        &self,
        w: &World,
        dynamics: &Dynamics,
        p1: u32,
        p2: u32,
    ) -> Option<String> {
        let d2 = self.diameter * self.diameter;
        if dynamics.sphere_overlap(w, p1, p2, d2) {
            return Some(format!(
                "particles {p1} and {p2} overlap the rough core at {}",
                self.diameter
            ));
        }
        None
    }
}
