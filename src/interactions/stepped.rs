use crate::core::{ChangeSet, EventKind, World};
use crate::dynamics::Dynamics;
use crate::error::{Error, Result};
use crate::interactions::captures::CaptureMap;
use crate::interactions::PairEvent;
use crate::ranges::IdPairRange;

/// A stepped pair potential: concentric shells of decreasing radius,
/// each with an absolute energy level.
///
/// `steps` are ordered outermost first; `steps[i]` is the shell a pair
/// at capture value `i + 1` sits inside. A capture value of 0 means the
/// pair is outside every shell (and absent from the map).
#[derive(Debug, Clone)]
pub struct Stepped {
    pub name: String,
    pub range: IdPairRange,
    /// `(radius, energy)` pairs, radius strictly decreasing.
    pub steps: Vec<(f64, f64)>,
    pub captures: CaptureMap,
}

impl Stepped {
    pub fn new(
        name: impl Into<String>,
        range: IdPairRange,
        steps: Vec<(f64, f64)>,
    ) -> Result<Self> {
        if steps.is_empty() {
            return Err(Error::Config("stepped interaction needs at least one step".into()));
        }
        if steps.windows(2).any(|wnd| wnd[1].0 >= wnd[0].0) {
            return Err(Error::Config(
                "stepped interaction radii must strictly decrease outermost-first".into(),
            ));
        }
        Ok(Self {
            name: name.into(),
            range,
            steps,
            captures: CaptureMap::new(),
        })
    }

    pub fn outer_radius(&self) -> f64 {
        self.steps[0].0
    }

    /// Deepest shell the pair currently sits inside; 0 when outside all.
    pub fn capture_test(&self, w: &World, p1: u32, p2: u32) -> u32 {
        let r = w.distance2(p1, p2).sqrt();
        let mut val = 0;
        for (i, (radius, _)) in self.steps.iter().enumerate() {
            if r > *radius {
                break;
            }
            val = i as u32 + 1;
        }
        val
    }

    pub fn get_event(&self, w: &World, dynamics: &Dynamics, p1: u32, p2: u32) -> Option<PairEvent> {
        let val = self.captures.step_of(p1, p2) as usize;
        if val == 0 {
            let d = self.outer_radius();
            return dynamics
                .sphere_sphere_in_root(w, p1, p2, d * d)
                .map(|dt| PairEvent {
                    dt,
                    kind: EventKind::StepIn,
                });
        }

        let inward = if val < self.steps.len() {
            let d = self.steps[val].0;
            dynamics
                .sphere_sphere_in_root(w, p1, p2, d * d)
                .map(|dt| PairEvent {
                    dt,
                    kind: EventKind::StepIn,
                })
        } else {
            None
        };
        let d = self.steps[val - 1].0;
        let outward = dynamics
            .sphere_sphere_out_root(w, p1, p2, d * d)
            .map(|dt| PairEvent {
                dt,
                kind: EventKind::StepOut,
            });
        PairEvent::min(inward, outward)
    }

    pub fn run_event(
        &mut self,
        w: &mut World,
        dynamics: &Dynamics,
        p1: u32,
        p2: u32,
        kind: EventKind,
    ) -> Result<ChangeSet> {
        let val = self.captures.step_of(p1, p2) as usize;
        match kind {
            EventKind::StepIn => {
                // Crossing inward over steps[val].
                if val >= self.steps.len() {
                    return Err(Error::State(format!(
                        "stepped \"{}\": inward crossing from the innermost shell",
                        self.name
                    )));
                }
                let (radius, energy) = self.steps[val];
                let outer_energy = if val > 0 { self.steps[val - 1].1 } else { 0.0 };
                // Kinetic energy picked up dropping to the inner level.
                let delta_u = outer_energy - energy;
                let cs = dynamics.well_event(w, p1, p2, delta_u, radius * radius)?;
                if cs.kind != EventKind::Bounce {
                    self.captures.insert(p1, p2, val as u32 + 1);
                }
                Ok(cs)
            }
            EventKind::StepOut => {
                if val == 0 {
                    return Err(Error::State(format!(
                        "stepped \"{}\": outward crossing for an uncaptured pair",
                        self.name
                    )));
                }
                let (radius, energy) = self.steps[val - 1];
                let outer_energy = if val > 1 { self.steps[val - 2].1 } else { 0.0 };
                let delta_u = energy - outer_energy;
                let cs = dynamics.well_event(w, p1, p2, delta_u, radius * radius)?;
                if cs.kind != EventKind::Bounce {
                    if val == 1 {
                        self.captures.remove(p1, p2);
                    } else {
                        self.captures.insert(p1, p2, val as u32 - 1);
                    }
                }
                Ok(cs)
            }
            other => Err(Error::State(format!(
                "stepped \"{}\" cannot run a {} event",
                self.name,
                other.as_str()
            ))),
        }
    }

    pub fn validate_state(
        &self,
        w: &World,
        _dynamics: &Dynamics,
        p1: u32,
        p2: u32,
    ) -> Option<String> {
        let stored = self.captures.step_of(p1, p2);
        let geometric = self.capture_test(w, p1, p2);
        if stored != geometric {
            return Some(format!(
                "particles {p1} and {p2} registered at step {stored} but geometry places them at step {geometric}"
            ));
        }
        None
    }

    pub fn internal_energy(&self) -> f64 {
        self.captures
            .iter()
            .map(|(_, &val)| self.steps[val as usize - 1].1)
            .sum()
    }
}
