//! Analytic dynamics (the liouvillean layer).
//!
//! The active regime streams particles forward in time, predicts
//! root-crossing times between ballistic trajectories and geometric
//! primitives, and executes the impulsive momentum updates of resolved
//! events. Free flight is the shipped regime; the enum is the seam
//! where further regimes plug in.

pub mod newtonian;

pub use newtonian::Newtonian;

use crate::core::{ChangeSet, World};
use crate::error::Result;
use crate::math::Vec3;
use crate::ranges::IdRange;

/// Dispatch over the available dynamics regimes.
#[derive(Debug, Clone)]
pub enum Dynamics {
    Newtonian(Newtonian),
}

impl Dynamics {
    /// Construct from the configuration `Type` tag.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "Newtonian" => Some(Dynamics::Newtonian(Newtonian)),
            _ => None,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Dynamics::Newtonian(_) => "Newtonian",
        }
    }

    #[inline]
    fn inner(&self) -> &Newtonian {
        match self {
            Dynamics::Newtonian(d) => d,
        }
    }

    /// Advance one particle by `dt` and update its local clock.
    pub fn stream_particle(&self, w: &mut World, pid: u32, dt: f64) {
        self.inner().stream_particle(w, pid, dt)
    }

    /// Stream a particle to the global clock.
    pub fn update_particle(&self, w: &mut World, pid: u32) {
        let dt = w.system_time - w.particles[pid as usize].clock;
        if dt != 0.0 {
            self.stream_particle(w, pid, dt);
        }
    }

    pub fn update_pair(&self, w: &mut World, p1: u32, p2: u32) {
        self.update_particle(w, p1);
        self.update_particle(w, p2);
    }

    pub fn update_all(&self, w: &mut World) {
        for pid in 0..w.n() as u32 {
            self.update_particle(w, pid);
        }
    }

    /// Earliest future time at which the pair separation falls to
    /// `d2.sqrt()` while approaching.
    pub fn sphere_sphere_in_root(&self, w: &World, p1: u32, p2: u32, d2: f64) -> Option<f64> {
        let (r12, v12) = w.separation_and_velocity(p1, p2);
        newtonian::ray_sphere_in(&r12, &v12, d2)
    }

    /// Earliest future time at which the pair separation grows to
    /// `d2.sqrt()`.
    pub fn sphere_sphere_out_root(&self, w: &World, p1: u32, p2: u32, d2: f64) -> Option<f64> {
        let (r12, v12) = w.separation_and_velocity(p1, p2);
        newtonian::ray_sphere_out(&r12, &v12, d2)
    }

    /// Are the two particles currently inside the shell of squared
    /// diameter `d2`?
    pub fn sphere_overlap(&self, w: &World, p1: u32, p2: u32, d2: f64) -> bool {
        w.distance2(p1, p2) < d2
    }

    pub fn smooth_spheres_coll(
        &self,
        w: &mut World,
        p1: u32,
        p2: u32,
        e: f64,
        d2: f64,
    ) -> Result<ChangeSet> {
        self.inner().smooth_spheres_coll(w, p1, p2, e, d2)
    }

    pub fn rough_spheres_coll(
        &self,
        w: &mut World,
        p1: u32,
        p2: u32,
        e: f64,
        et: f64,
        d2: f64,
        inertia: f64,
    ) -> Result<ChangeSet> {
        self.inner().rough_spheres_coll(w, p1, p2, e, et, d2, inertia)
    }

    pub fn well_event(
        &self,
        w: &mut World,
        p1: u32,
        p2: u32,
        delta_u: f64,
        d2: f64,
    ) -> Result<ChangeSet> {
        self.inner().well_event(w, p1, p2, delta_u, d2)
    }

    pub fn plane_root(
        &self,
        w: &World,
        pid: u32,
        origin: &Vec3,
        normal: &Vec3,
        dist: f64,
    ) -> Option<f64> {
        self.inner().plane_root(w, pid, origin, normal, dist)
    }

    pub fn run_plane_event(&self, w: &mut World, pid: u32, normal: &Vec3, e: f64) -> ChangeSet {
        self.inner().run_plane_event(w, pid, normal, e)
    }

    pub fn run_rough_wall(
        &self,
        w: &mut World,
        pid: u32,
        normal: &Vec3,
        e: f64,
        et: f64,
        radius: f64,
        inertia: f64,
    ) -> ChangeSet {
        self.inner()
            .run_rough_wall(w, pid, normal, e, et, radius, inertia)
    }

    pub fn run_andersen_wall(&self, w: &mut World, pid: u32, normal: &Vec3, sqrt_t: f64) -> ChangeSet {
        self.inner().run_andersen_wall(w, pid, normal, sqrt_t)
    }

    /// Time to the earliest axis-aligned boundary of the cell with the
    /// given origin and per-axis widths.
    pub fn square_cell_time(&self, w: &World, pid: u32, origin: &Vec3, width: &Vec3) -> f64 {
        self.inner().square_cell_time(w, pid, origin, width)
    }

    /// Axis and direction of the earliest cell-boundary crossing:
    /// `(axis, +1 | -1)`.
    pub fn square_cell_exit(&self, w: &World, pid: u32, origin: &Vec3, width: &Vec3) -> (usize, i32) {
        self.inner().square_cell_exit(w, pid, origin, width)
    }

    /// Safety horizon before a particle's periodic image could reach it.
    pub fn pbc_sentinel_time(&self, w: &World, pid: u32, max_range: f64) -> f64 {
        self.inner().pbc_sentinel_time(w, pid, max_range)
    }

    /// Thermostat re-draw of one particle's velocity at temperature
    /// `sqrt_t^2`.
    pub fn random_gaussian_event(&self, w: &mut World, pid: u32, sqrt_t: f64) -> ChangeSet {
        self.inner().random_gaussian_event(w, pid, sqrt_t)
    }

    /// Mass-weighted centre-of-mass position and velocity of a range.
    pub fn com_pos_vel(&self, w: &World, range: &IdRange) -> (Vec3, Vec3) {
        self.inner().com_pos_vel(w, range)
    }

    /// N-body analogue of `well_event` acting on the centres of mass of
    /// two ranges.
    pub fn multibody_well_event(
        &self,
        w: &mut World,
        range1: &IdRange,
        range2: &IdRange,
        delta_u: f64,
    ) -> Result<ChangeSet> {
        self.inner().multibody_well_event(w, range1, range2, delta_u)
    }

    /// Multiply every velocity by `factor.sqrt()` so the kinetic energy
    /// scales by `factor`.
    pub fn rescale_kinetic_energy(&self, w: &mut World, factor: f64) {
        self.inner().rescale_kinetic_energy(w, factor)
    }
}

impl Default for Dynamics {
    fn default() -> Self {
        Dynamics::Newtonian(Newtonian)
    }
}
