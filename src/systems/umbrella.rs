use crate::core::{ChangeSet, EventKind, World};
use crate::dynamics::newtonian::{ray_sphere_in, ray_sphere_out};
use crate::dynamics::Dynamics;
use crate::error::Result;
use crate::math::{nrm2, sub};
use crate::ranges::IdRange;
use crate::systems::SystemOutcome;

/// Umbrella-sampling potential between the centres of mass of two
/// particle groups.
///
/// The harmonic umbrella `a (r - b)^2` is discretised into energy
/// levels of height `del_u`; the current level is `ulevel`, negative
/// on the inner side of the minimum. Each firing resolves the crossing
/// of the next barrier, inner (`STEP_IN`) or outer (`STEP_OUT`), with a
/// multibody well event; the level only advances when the groups could
/// actually pay the step.
#[derive(Debug, Clone)]
pub struct Umbrella {
    pub name: String,
    /// Umbrella curvature, energy per squared length.
    pub a: f64,
    /// Radius of the potential minimum.
    pub b: f64,
    /// Energy discretisation step.
    pub del_u: f64,
    pub range1: IdRange,
    pub range2: IdRange,
    pub ulevel: i64,
    pub ulevel_set: bool,
    ulevel_center: i64,
    pub next_time: f64,
    pending: Option<EventKind>,
}

impl Umbrella {
    pub fn new(
        name: impl Into<String>,
        a: f64,
        b: f64,
        del_u: f64,
        range1: IdRange,
        range2: IdRange,
    ) -> Self {
        Self {
            name: name.into(),
            a,
            b,
            del_u,
            range1,
            range2,
            ulevel: -1,
            ulevel_set: false,
            ulevel_center: 0,
            next_time: f64::INFINITY,
            pending: None,
        }
    }

    pub fn pending_kind(&self) -> EventKind {
        self.pending.unwrap_or(EventKind::Virtual)
    }

    pub fn initialise(&mut self, w: &mut World, dynamics: &Dynamics) -> Result<()> {
        self.update_members(w, dynamics);
        self.ulevel_center = (-self.a * self.b * self.b / self.del_u) as i64;

        if !self.ulevel_set {
            let r = self.com_distance(w, dynamics);
            let mut level = (self.a * (r - self.b) * (r - self.b) / self.del_u) as i64;
            if r < self.b {
                level = -level;
            }
            self.ulevel = level;
            self.ulevel_set = true;
        }
        self.recalculate(w, dynamics);
        Ok(())
    }

    fn update_members(&self, w: &mut World, dynamics: &Dynamics) {
        let n = w.n() as u32;
        for id in self.range1.iter(n).collect::<Vec<_>>() {
            dynamics.update_particle(w, id);
        }
        for id in self.range2.iter(n).collect::<Vec<_>>() {
            dynamics.update_particle(w, id);
        }
    }

    fn com_separation(&self, w: &World, dynamics: &Dynamics) -> ([f64; 3], [f64; 3]) {
        let (r1, v1) = dynamics.com_pos_vel(w, &self.range1);
        let (r2, v2) = dynamics.com_pos_vel(w, &self.range2);
        let mut r12 = sub(&r1, &r2);
        let mut v12 = sub(&v1, &v2);
        w.bc.apply_with_vel(&mut r12, &mut v12, &w.primary_cell);
        (r12, v12)
    }

    fn com_distance(&self, w: &World, dynamics: &Dynamics) -> f64 {
        nrm2(&self.com_separation(w, dynamics).0).sqrt()
    }

    /// Predict the next barrier crossing from the current level.
    pub fn recalculate(&mut self, w: &mut World, dynamics: &Dynamics) {
        self.update_members(w, dynamics);
        let (r12, v12) = self.com_separation(w, dynamics);

        self.next_time = f64::INFINITY;
        self.pending = None;

        if self.ulevel == self.ulevel_center {
            // Sitting on the innermost level: only an outward barrier.
            let r_max = if self.b == 0.0 {
                self.b + (((self.ulevel + 1) as f64) * self.del_u / self.a).sqrt()
            } else {
                self.b - ((self.ulevel as f64) * self.del_u / self.a).sqrt()
            };
            if let Some(dt) = ray_sphere_out(&r12, &v12, r_max * r_max) {
                self.next_time = w.system_time + dt;
                self.pending = Some(EventKind::StepOut);
            }
            return;
        }

        let (r_min, r_max) = if self.ulevel == 0 {
            (
                self.b - (self.del_u / self.a).sqrt(),
                self.b + (self.del_u / self.a).sqrt(),
            )
        } else if self.ulevel < 0 {
            (
                self.b - (((-self.ulevel + 1) as f64) * self.del_u / self.a).sqrt(),
                self.b - (((-self.ulevel) as f64) * self.del_u / self.a).sqrt(),
            )
        } else {
            (
                self.b + ((self.ulevel as f64) * self.del_u / self.a).sqrt(),
                self.b + (((self.ulevel + 1) as f64) * self.del_u / self.a).sqrt(),
            )
        };

        if let Some(dt) = ray_sphere_in(&r12, &v12, r_min * r_min) {
            self.next_time = w.system_time + dt;
            self.pending = Some(EventKind::StepIn);
            return;
        }
        if let Some(dt) = ray_sphere_out(&r12, &v12, r_max * r_max) {
            self.next_time = w.system_time + dt;
            self.pending = Some(EventKind::StepOut);
        }
    }

    pub fn run(&mut self, w: &mut World, dynamics: &Dynamics) -> Result<SystemOutcome> {
        self.update_members(w, dynamics);

        let crossing = self.pending.take().unwrap_or(EventKind::StepOut);
        // Does kinetic energy drop crossing this barrier?
        let (kedown, new_level) = if self.ulevel == 0 {
            (
                true,
                if crossing == EventKind::StepOut { 1 } else { -1 },
            )
        } else if crossing == EventKind::StepOut {
            (self.ulevel > 0, self.ulevel + 1)
        } else {
            (self.ulevel < 0, self.ulevel - 1)
        };

        let delta_u = if kedown { -self.del_u } else { self.del_u };
        let cs: ChangeSet =
            dynamics.multibody_well_event(w, &self.range1, &self.range2, delta_u)?;

        if cs.kind != EventKind::Bounce {
            self.ulevel = new_level;
        }
        self.recalculate(w, dynamics);

        Ok(SystemOutcome {
            changeset: Some(cs),
            ..SystemOutcome::default()
        })
    }

    /// Any event touching either group invalidates the prediction.
    pub fn particles_updated(&mut self, w: &mut World, dynamics: &Dynamics, cs: &ChangeSet) -> bool {
        let touched = cs
            .touched()
            .any(|id| self.range1.contains(id) || self.range2.contains(id));
        if touched {
            self.recalculate(w, dynamics);
        }
        touched
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bc::Boundary;
    use crate::core::{Particle, Species};

    fn world(sep: f64, closing: f64) -> World {
        let particles = vec![
            Particle::new(0, [-0.5 * sep, 0.0, 0.0], [0.5 * closing, 0.0, 0.0]).unwrap(),
            Particle::new(1, [0.5 * sep, 0.0, 0.0], [-0.5 * closing, 0.0, 0.0]).unwrap(),
        ];
        let species = vec![Species::new("A", 1.0, IdRange::All).unwrap()];
        World::new(particles, species, Boundary::Periodic, [20.0; 3], Some(5)).unwrap()
    }

    fn umbrella() -> Umbrella {
        Umbrella::new(
            "umb",
            1.0,
            2.0,
            0.5,
            IdRange::Single(0),
            IdRange::Single(1),
        )
    }

    #[test]
    fn level_is_set_from_the_initial_separation() -> Result<()> {
        // r = 3, b = 2: a (r-b)^2 / delU = 1 / 0.5 = 2.
        let mut w = world(3.0, 1.0);
        let mut u = umbrella();
        u.initialise(&mut w, &Dynamics::default())?;
        assert_eq!(u.ulevel, 2);
        // Approaching: next barrier is the inner shell.
        assert_eq!(u.pending_kind(), EventKind::StepIn);
        assert!(u.next_time.is_finite());
        Ok(())
    }

    #[test]
    fn inner_side_levels_are_negative() -> Result<()> {
        let mut w = world(1.0, 1.0);
        let mut u = umbrella();
        u.initialise(&mut w, &Dynamics::default())?;
        assert!(u.ulevel < 0);
        Ok(())
    }

    #[test]
    fn crossing_toward_the_minimum_gains_kinetic_energy() -> Result<()> {
        let dynamics = Dynamics::default();
        let mut w = world(3.0, 1.0);
        let mut u = umbrella();
        u.initialise(&mut w, &dynamics)?;
        let level0 = u.ulevel;
        // Advance to the predicted barrier and fire.
        let dt = u.next_time - w.system_time;
        w.system_time += dt;
        dynamics.update_all(&mut w);
        let ke0 = w.kinetic_energy();
        let out = u.run(&mut w, &dynamics)?;
        let cs = out.changeset.unwrap();
        assert_ne!(cs.kind, EventKind::Bounce);
        assert_eq!(u.ulevel, level0 - 1);
        // Stepping down toward the minimum releases del_u into motion.
        assert!((w.kinetic_energy() - ke0 - 0.5).abs() < 1e-9);
        Ok(())
    }

    #[test]
    fn unrelated_changesets_do_not_reschedule() -> Result<()> {
        let dynamics = Dynamics::default();
        let mut w = world(3.0, 1.0);
        let mut u = umbrella();
        u.initialise(&mut w, &dynamics)?;
        let cs = ChangeSet::new(EventKind::Wall);
        assert!(!u.particles_updated(&mut w, &dynamics, &cs));
        Ok(())
    }
}
