use crate::core::{ChangeSet, EventKind, World};
use crate::dynamics::Dynamics;
use crate::error::{Error, Result};
use crate::interactions::captures::CaptureMap;
use crate::interactions::PairEvent;
use crate::ranges::IdPairRange;

/// Square-well potential: hard core at `diameter`, attractive shell out
/// to `lambda * diameter` of depth `well_depth`.
///
/// Captured pairs (inside the shell) see CORE and STEP_OUT candidates;
/// uncaptured pairs only STEP_IN. The capture map tracks shell
/// membership and the internal-energy ledger.
#[derive(Debug, Clone)]
pub struct SquareWell {
    pub name: String,
    pub range: IdPairRange,
    pub diameter: f64,
    pub lambda: f64,
    pub well_depth: f64,
    pub elasticity: f64,
    pub captures: CaptureMap,
}

impl SquareWell {
    pub fn new(
        name: impl Into<String>,
        range: IdPairRange,
        diameter: f64,
        lambda: f64,
        well_depth: f64,
        elasticity: f64,
    ) -> Self {
        Self {
            name: name.into(),
            range,
            diameter,
            lambda,
            well_depth,
            elasticity,
            captures: CaptureMap::new(),
        }
    }

    #[inline]
    fn core2(&self) -> f64 {
        self.diameter * self.diameter
    }

    #[inline]
    fn shell2(&self) -> f64 {
        let ld = self.lambda * self.diameter;
        ld * ld
    }

    /// Geometric membership test used by the rebuild path.
    pub fn capture_test(&self, w: &World, p1: u32, p2: u32) -> u32 {
        (w.distance2(p1, p2) < self.shell2()) as u32
    }

    pub fn get_event(&self, w: &World, dynamics: &Dynamics, p1: u32, p2: u32) -> Option<PairEvent> {
        if self.captures.is_captured(p1, p2) {
            let core = dynamics
                .sphere_sphere_in_root(w, p1, p2, self.core2())
                .map(|dt| PairEvent {
                    dt,
                    kind: EventKind::Core,
                });
            let exit = dynamics
                .sphere_sphere_out_root(w, p1, p2, self.shell2())
                .map(|dt| PairEvent {
                    dt,
                    kind: EventKind::StepOut,
                });
            PairEvent::min(core, exit)
        } else {
            dynamics
                .sphere_sphere_in_root(w, p1, p2, self.shell2())
                .map(|dt| PairEvent {
                    dt,
                    kind: EventKind::StepIn,
                })
        }
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
                dynamics.smooth_spheres_coll(w, p1, p2, self.elasticity, self.core2())
            }
            EventKind::StepIn => {
                let cs = dynamics.well_event(w, p1, p2, self.well_depth, self.shell2())?;
                if cs.kind != EventKind::Bounce {
                    self.captures.insert(p1, p2, 1);
                }
                Ok(cs)
            }
            EventKind::StepOut => {
                let cs = dynamics.well_event(w, p1, p2, -self.well_depth, self.shell2())?;
                if cs.kind != EventKind::Bounce {
                    self.captures.remove(p1, p2);
                }
                Ok(cs)
            }
            other => Err(Error::State(format!(
                "square well \"{}\" cannot run a {} event",
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
        let dist = w.distance2(p1, p2).sqrt();
        if self.captures.is_captured(p1, p2) {
            if !dynamics.sphere_overlap(w, p1, p2, self.shell2()) {
                return Some(format!(
                    "particles {p1} and {p2} registered inside the well at {} but are at {dist}",
                    self.lambda * self.diameter
                ));
            }
            if dynamics.sphere_overlap(w, p1, p2, self.core2()) {
                return Some(format!(
                    "particles {p1} and {p2} are inside the hard core at {} (distance {dist})",
                    self.diameter
                ));
            }
        } else if dynamics.sphere_overlap(w, p1, p2, self.shell2()) {
            return Some(format!(
                "particles {p1} and {p2} registered outside the well at {} but are at {dist}",
                self.lambda * self.diameter
            ));
        }
        None
    }

    /// Captured pairs each hold `-well_depth` of potential energy.
    pub fn internal_energy(&self) -> f64 {
        -(self.captures.len() as f64) * self.well_depth
    }
}
