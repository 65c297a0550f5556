//! Free-flight analytic dynamics.
//!
//! All pair predictions reduce to the quadratic form of the relative
//! ballistic trajectory `|r12 + v12 t|^2 = d^2`. The stable smaller
//! root `c / (sqrt(arg) - b)` avoids catastrophic cancellation when
//! `b` and the discriminant are close.

use crate::core::{ChangeSet, EventKind, ParticleChange, World};
use crate::error::{Error, Result};
use crate::math::{axpy, cross, dot, nrm2, scale, sub, Vec3, DIM};
use crate::ranges::IdRange;
use rand::Rng;
use rand_distr::StandardNormal;

/// Earliest `t >= 0` with `|r12 + v12 t|^2 = d2` and separation
/// decreasing.
///
/// `None` when the pair is receding or the trajectories never close to
/// `d2`. A pair already inside the shell while approaching resolves
/// immediately (`t = 0`): an overlap left behind by rounding must not
/// postpone the impulse past the point where the pair recedes.
pub fn ray_sphere_in(r12: &Vec3, v12: &Vec3, d2: f64) -> Option<f64> {
    let a = nrm2(v12);
    if a == 0.0 {
        return None;
    }
    let b = dot(r12, v12);
    if b >= 0.0 {
        return None;
    }
    let c = nrm2(r12) - d2;
    let arg = b * b - a * c;
    if arg < 0.0 {
        return None;
    }
    // Stable smaller root; negative only when already inside the shell.
    Some((c / (arg.sqrt() - b)).max(0.0))
}

/// Earliest `t >= 0` with `|r12 + v12 t|^2 = d2` and separation
/// increasing. A pair already outside the shell reports `t = 0`.
pub fn ray_sphere_out(r12: &Vec3, v12: &Vec3, d2: f64) -> Option<f64> {
    let a = nrm2(v12);
    if a == 0.0 {
        return None;
    }
    let c = nrm2(r12) - d2;
    if c > 0.0 {
        return Some(0.0);
    }
    let b = dot(r12, v12);
    let arg = b * b - a * c;
    Some(((arg.sqrt() - b) / a).max(0.0))
}

/// The free-flight regime. Stateless; everything it needs arrives with
/// the world.
#[derive(Debug, Clone, Copy, Default)]
pub struct Newtonian;

impl Newtonian {
    pub fn stream_particle(&self, w: &mut World, pid: u32, dt: f64) {
        let p = &mut w.particles[pid as usize];
        let v = p.v;
        axpy(&mut p.r, dt, &v);
        p.clock += dt;
    }

    fn change_for(w: &World, id: u32, old_vel: Vec3) -> ParticleChange {
        let mass = w.mass_of(id);
        let new2 = nrm2(&w.particles[id as usize].v);
        ParticleChange {
            id,
            old_vel,
            delta_ke: 0.5 * mass * (new2 - nrm2(&old_vel)),
        }
    }

    /// Impulsive exchange along the line of centres at contact.
    pub fn smooth_spheres_coll(
        &self,
        w: &mut World,
        p1: u32,
        p2: u32,
        e: f64,
        _d2: f64,
    ) -> Result<ChangeSet> {
        let (r12, v12) = w.separation_and_velocity(p1, p2);
        let r2 = nrm2(&r12);
        if r2 == 0.0 {
            return Err(Error::Numerical(format!(
                "degenerate contact normal between particles {p1} and {p2}"
            )));
        }
        let m1 = w.mass_of(p1);
        let m2 = w.mass_of(p2);
        let mu = m1 * m2 / (m1 + m2);
        let rvdot = dot(&r12, &v12);
        let impulse = scale(&r12, (1.0 + e) * mu * rvdot / r2);

        let old1 = w.particles[p1 as usize].v;
        let old2 = w.particles[p2 as usize].v;
        axpy(&mut w.particles[p1 as usize].v, -1.0 / m1, &impulse);
        axpy(&mut w.particles[p2 as usize].v, 1.0 / m2, &impulse);

        let mut cs = ChangeSet::new(EventKind::Core);
        cs.changes.push(Self::change_for(w, p1, old1));
        cs.changes.push(Self::change_for(w, p2, old2));
        Ok(cs)
    }

    /// Normal impulse plus tangential impulse from surface roughness.
    #[allow(clippy::too_many_arguments)]
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
        w.ensure_spin();
        let (r12, v12) = w.separation_and_velocity(p1, p2);
        let r2 = nrm2(&r12);
        if r2 == 0.0 {
            return Err(Error::Numerical(format!(
                "degenerate contact normal between particles {p1} and {p2}"
            )));
        }
        let m1 = w.mass_of(p1);
        let m2 = w.mass_of(p2);
        let mu = m1 * m2 / (m1 + m2);
        let rvdot = dot(&r12, &v12);

        let mut impulse = scale(&r12, (1.0 + e) * mu * rvdot / r2);
        let eijn = scale(&r12, 1.0 / r2.sqrt());

        let omega = w.omega.as_ref().map(|o| {
            let mut sum = o[p1 as usize];
            for k in 0..DIM {
                sum[k] += o[p2 as usize][k];
            }
            sum
        });
        let spin_sum = omega.unwrap_or([0.0; DIM]);

        // Surface velocity at contact.
        let mut gij = v12;
        let spin_term = cross(&spin_sum, &eijn);
        axpy(&mut gij, -d2.sqrt() * 0.5, &spin_term);
        let gijt = cross(&cross(&eijn, &gij), &eijn);

        let jbar = inertia / (m1 * d2 * 0.25);
        axpy(&mut impulse, jbar * (1.0 - et) / (2.0 * (jbar + 1.0)), &gijt);

        let old1 = w.particles[p1 as usize].v;
        let old2 = w.particles[p2 as usize].v;
        axpy(&mut w.particles[p1 as usize].v, -1.0 / m1, &impulse);
        axpy(&mut w.particles[p2 as usize].v, 1.0 / m2, &impulse);

        let dw = scale(
            &cross(&eijn, &gijt),
            (1.0 - et) / (d2.sqrt() * (jbar + 1.0)),
        );
        if let Some(omega) = w.omega.as_mut() {
            for k in 0..DIM {
                omega[p1 as usize][k] += dw[k];
                omega[p2 as usize][k] += dw[k];
            }
        }

        let mut cs = ChangeSet::new(EventKind::Core);
        cs.changes.push(Self::change_for(w, p1, old1));
        cs.changes.push(Self::change_for(w, p2, old2));
        Ok(cs)
    }

    /// Step-potential crossing at squared diameter `d2`.
    ///
    /// `delta_u > 0` means kinetic energy is gained crossing inward;
    /// insufficient line-of-centres energy against a negative step
    /// resolves as a tangential BOUNCE.
    pub fn well_event(
        &self,
        w: &mut World,
        p1: u32,
        p2: u32,
        delta_u: f64,
        _d2: f64,
    ) -> Result<ChangeSet> {
        let (r12, v12) = w.separation_and_velocity(p1, p2);
        let r2 = nrm2(&r12);
        if r2 == 0.0 {
            return Err(Error::Numerical(format!(
                "degenerate contact normal between particles {p1} and {p2}"
            )));
        }
        let m1 = w.mass_of(p1);
        let m2 = w.mass_of(p2);
        let mu = m1 * m2 / (m1 + m2);
        let rvdot = dot(&r12, &v12);
        let sqrt_arg = rvdot * rvdot + 2.0 * r2 * delta_u / mu;

        let (kind, impulse) = if delta_u < 0.0 && sqrt_arg < 0.0 {
            (EventKind::Bounce, scale(&r12, 2.0 * mu * rvdot / r2))
        } else if delta_u == 0.0 {
            (step_kind(delta_u), [0.0; DIM])
        } else if rvdot < 0.0 {
            (
                step_kind(delta_u),
                scale(&r12, 2.0 * delta_u / (sqrt_arg.sqrt() - rvdot)),
            )
        } else {
            (
                step_kind(delta_u),
                scale(&r12, -2.0 * delta_u / (rvdot + sqrt_arg.sqrt())),
            )
        };

        if impulse.iter().any(|x| x.is_nan()) {
            return Err(Error::Numerical(format!(
                "NaN impulse in well event between particles {p1} and {p2}"
            )));
        }

        let old1 = w.particles[p1 as usize].v;
        let old2 = w.particles[p2 as usize].v;
        axpy(&mut w.particles[p1 as usize].v, -1.0 / m1, &impulse);
        axpy(&mut w.particles[p2 as usize].v, 1.0 / m2, &impulse);

        let mut cs = ChangeSet::new(kind);
        cs.changes.push(Self::change_for(w, p1, old1));
        cs.changes.push(Self::change_for(w, p2, old2));
        if kind != EventKind::Bounce {
            cs.delta_internal = -delta_u;
        }
        Ok(cs)
    }

    /// Time to contact with the plane through `origin` with unit
    /// `normal`, at contact distance `dist`.
    pub fn plane_root(
        &self,
        w: &World,
        pid: u32,
        origin: &Vec3,
        normal: &Vec3,
        dist: f64,
    ) -> Option<f64> {
        let p = &w.particles[pid as usize];
        let mut rij = sub(&p.r, origin);
        let mut vel = p.v;
        w.bc.apply_with_vel(&mut rij, &mut vel, &w.primary_cell);

        let rp = dot(&rij, normal);
        let rv = dot(&vel, normal);
        if rv == 0.0 {
            return None;
        }
        if rp * rv >= 0.0 {
            return None; // moving away from the plane
        }
        if rp.abs() < dist {
            return Some(0.0); // penetrating: resolve immediately
        }
        Some((rp.abs() - dist) / rv.abs())
    }

    /// Specular reflection with restitution `e`.
    pub fn run_plane_event(&self, w: &mut World, pid: u32, normal: &Vec3, e: f64) -> ChangeSet {
        let old = w.particles[pid as usize].v;
        let vn = dot(&old, normal);
        axpy(&mut w.particles[pid as usize].v, -(1.0 + e) * vn, normal);
        ChangeSet::single(EventKind::Wall, Self::change_for(w, pid, old))
    }

    /// Rough-wall reflection with tangential restitution.
    #[allow(clippy::too_many_arguments)]
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
        w.ensure_spin();
        let old = w.particles[pid as usize].v;
        let mass = w.mass_of(pid);
        let jbar = inertia / (mass * radius * radius);

        let spin = w.omega.as_ref().map(|o| o[pid as usize]).unwrap_or([0.0; DIM]);
        let mut gij = old;
        let spin_term = cross(&spin, normal);
        axpy(&mut gij, -radius, &spin_term);
        let gijt = cross(&cross(normal, &gij), normal);

        let vn = dot(&old, normal);
        {
            let v = &mut w.particles[pid as usize].v;
            axpy(v, -(1.0 + e) * vn, normal);
            axpy(v, -jbar * (1.0 - et) / (jbar + 1.0), &gijt);
        }
        if let Some(omega) = w.omega.as_mut() {
            let dw = scale(&cross(normal, &gijt), (1.0 - et) / (radius * (jbar + 1.0)));
            for k in 0..DIM {
                omega[pid as usize][k] += dw[k];
            }
        }
        ChangeSet::single(EventKind::Wall, Self::change_for(w, pid, old))
    }

    /// Thermal-wall re-draw: Gaussian tangential components, Rayleigh
    /// flux-weighted inward normal component.
    pub fn run_andersen_wall(
        &self,
        w: &mut World,
        pid: u32,
        normal: &Vec3,
        sqrt_t: f64,
    ) -> ChangeSet {
        let old = w.particles[pid as usize].v;
        let mass = w.mass_of(pid);

        let mut v = [0.0; DIM];
        for vk in v.iter_mut() {
            let n: f64 = w.rng.sample(StandardNormal);
            *vk = n * sqrt_t / mass.sqrt();
        }
        let u: f64 = w.rng.random();
        let flux_normal = sqrt_t * (-2.0 * (1.0 - u).ln() / mass).sqrt();
        let vn = dot(&v, normal);
        axpy(&mut v, flux_normal - vn, normal);

        w.particles[pid as usize].v = v;
        ChangeSet::single(EventKind::Gaussian, Self::change_for(w, pid, old))
    }

    /// Earliest axis-aligned boundary crossing of the given cell.
    pub fn square_cell_time(&self, w: &World, pid: u32, origin: &Vec3, width: &Vec3) -> f64 {
        let p = &w.particles[pid as usize];
        let mut rpos = sub(&p.r, origin);
        let mut vel = p.v;
        w.bc.apply_with_vel(&mut rpos, &mut vel, &w.primary_cell);

        let mut best = f64::INFINITY;
        for k in 0..DIM {
            if vel[k] == 0.0 {
                continue;
            }
            let dt = if vel[k] < 0.0 {
                -rpos[k] / vel[k]
            } else {
                (width[k] - rpos[k]) / vel[k]
            };
            if dt < best {
                best = dt;
            }
        }
        best
    }

    /// Axis and sign of the earliest boundary crossing.
    pub fn square_cell_exit(&self, w: &World, pid: u32, origin: &Vec3, width: &Vec3) -> (usize, i32) {
        let p = &w.particles[pid as usize];
        let mut rpos = sub(&p.r, origin);
        let mut vel = p.v;
        w.bc.apply_with_vel(&mut rpos, &mut vel, &w.primary_cell);

        let mut best = f64::INFINITY;
        let mut exit = (0, 1);
        for k in 0..DIM {
            if vel[k] == 0.0 {
                continue;
            }
            let dt = if vel[k] < 0.0 {
                -rpos[k] / vel[k]
            } else {
                (width[k] - rpos[k]) / vel[k]
            };
            if dt < best {
                best = dt;
                exit = (k, if vel[k] < 0.0 { -1 } else { 1 });
            }
        }
        exit
    }

    /// Time before a periodic image of the particle could come within
    /// the interaction range.
    pub fn pbc_sentinel_time(&self, w: &World, pid: u32, max_range: f64) -> f64 {
        let p = &w.particles[pid as usize];
        let mut best = f64::INFINITY;
        for k in 0..DIM {
            if p.v[k] != 0.0 {
                let t = 0.5 * (0.5 * w.primary_cell[k] - max_range) / p.v[k].abs();
                if t < best {
                    best = t;
                }
            }
        }
        best
    }

    /// Re-draw one particle's velocity from the Maxwell distribution at
    /// temperature `sqrt_t^2`.
    pub fn random_gaussian_event(&self, w: &mut World, pid: u32, sqrt_t: f64) -> ChangeSet {
        let old = w.particles[pid as usize].v;
        let mass = w.mass_of(pid);
        let factor = sqrt_t / mass.sqrt();
        for k in 0..DIM {
            let n: f64 = w.rng.sample(StandardNormal);
            w.particles[pid as usize].v[k] = n * factor;
        }
        ChangeSet::single(EventKind::Gaussian, Self::change_for(w, pid, old))
    }

    /// Mass-weighted centre-of-mass position and velocity of a range.
    pub fn com_pos_vel(&self, w: &World, range: &IdRange) -> (Vec3, Vec3) {
        let mut com_r = [0.0; DIM];
        let mut com_v = [0.0; DIM];
        let mut total_mass = 0.0;
        for id in range.iter(w.n() as u32) {
            let mass = w.mass_of(id);
            let p = &w.particles[id as usize];
            let mut pos = p.r;
            let mut vel = p.v;
            w.bc.apply_with_vel(&mut pos, &mut vel, &w.primary_cell);
            axpy(&mut com_r, mass, &pos);
            axpy(&mut com_v, mass, &vel);
            total_mass += mass;
        }
        (scale(&com_r, 1.0 / total_mass), scale(&com_v, 1.0 / total_mass))
    }

    /// N-body step crossing between the centres of mass of two ranges.
    pub fn multibody_well_event(
        &self,
        w: &mut World,
        range1: &IdRange,
        range2: &IdRange,
        delta_u: f64,
    ) -> Result<ChangeSet> {
        let n = w.n() as u32;
        let mass1: f64 = range1.iter(n).map(|id| w.mass_of(id)).sum();
        let mass2: f64 = range2.iter(n).map(|id| w.mass_of(id)).sum();
        let (r1, v1) = self.com_pos_vel(w, range1);
        let (r2, v2) = self.com_pos_vel(w, range2);
        let mut r12 = sub(&r1, &r2);
        let mut v12 = sub(&v1, &v2);
        w.bc.apply_with_vel(&mut r12, &mut v12, &w.primary_cell);

        let r2n = nrm2(&r12);
        if r2n == 0.0 {
            return Err(Error::Numerical(
                "degenerate centre-of-mass separation in multibody well event".into(),
            ));
        }
        let mu = mass1 * mass2 / (mass1 + mass2);
        let rvdot = dot(&r12, &v12);
        let sqrt_arg = rvdot * rvdot + 2.0 * r2n * delta_u / mu;

        let (kind, dp) = if delta_u < 0.0 && sqrt_arg < 0.0 {
            (EventKind::Bounce, scale(&r12, 2.0 * mu * rvdot / r2n))
        } else if rvdot < 0.0 {
            (
                step_kind(delta_u),
                scale(&r12, 2.0 * delta_u / (sqrt_arg.sqrt() - rvdot)),
            )
        } else {
            (
                step_kind(delta_u),
                scale(&r12, -2.0 * delta_u / (rvdot + sqrt_arg.sqrt())),
            )
        };

        let mut cs = ChangeSet::new(kind);
        for id in range1.iter(n).collect::<Vec<_>>() {
            let old = w.particles[id as usize].v;
            axpy(&mut w.particles[id as usize].v, -1.0 / mass1, &dp);
            cs.changes.push(Self::change_for(w, id, old));
        }
        for id in range2.iter(n).collect::<Vec<_>>() {
            let old = w.particles[id as usize].v;
            axpy(&mut w.particles[id as usize].v, 1.0 / mass2, &dp);
            cs.changes.push(Self::change_for(w, id, old));
        }
        if kind != EventKind::Bounce {
            cs.delta_internal = -delta_u;
        }
        Ok(cs)
    }

    pub fn rescale_kinetic_energy(&self, w: &mut World, factor: f64) {
        let s = factor.sqrt();
        for p in &mut w.particles {
            for vk in p.v.iter_mut() {
                *vk *= s;
            }
        }
    }
}

#[inline]
fn step_kind(delta_u: f64) -> EventKind {
    if delta_u >= 0.0 {
        EventKind::StepIn
    } else {
        EventKind::StepOut
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bc::Boundary;
    use crate::core::Particle;
    use crate::core::Species;

    fn head_on_world(x1: f64, x2: f64) -> World {
        let particles = vec![
            Particle::new(0, [x1, 0.0, 0.0], [1.0, 0.0, 0.0]).unwrap(),
            Particle::new(1, [x2, 0.0, 0.0], [-1.0, 0.0, 0.0]).unwrap(),
        ];
        let species = vec![Species::new("A", 1.0, IdRange::All).unwrap()];
        World::new(
            particles,
            species,
            Boundary::Periodic,
            [20.0, 20.0, 20.0],
            Some(1),
        )
        .unwrap()
    }

    #[test]
    fn in_root_head_on() {
        // Separation 4, closing speed 2, contact at d = 1: t = 1.5.
        let r12 = [-4.0, 0.0, 0.0];
        let v12 = [2.0, 0.0, 0.0];
        let t = ray_sphere_in(&r12, &v12, 1.0).expect("must collide");
        assert!((t - 1.5).abs() < 1e-12);
    }

    #[test]
    fn in_root_receding_is_none() {
        let r12 = [4.0, 0.0, 0.0];
        let v12 = [2.0, 0.0, 0.0];
        assert!(ray_sphere_in(&r12, &v12, 1.0).is_none());
    }

    #[test]
    fn in_root_miss_is_none() {
        // Impact parameter 2 > d = 1: no root.
        let r12 = [-4.0, 2.0, 0.0];
        let v12 = [2.0, 0.0, 0.0];
        assert!(ray_sphere_in(&r12, &v12, 1.0).is_none());
    }

    #[test]
    fn in_root_overlapping_and_approaching_fires_now() {
        let r12 = [0.5, 0.0, 0.0];
        let v12 = [-1.0, 0.0, 0.0];
        let t = ray_sphere_in(&r12, &v12, 1.0).expect("immediate event expected");
        assert_eq!(t, 0.0);
    }

    #[test]
    fn in_root_overlapping_but_receding_is_none() {
        let r12 = [0.5, 0.0, 0.0];
        let v12 = [1.0, 0.0, 0.0];
        assert!(ray_sphere_in(&r12, &v12, 1.0).is_none());
    }

    #[test]
    fn out_root_inside_well() {
        // Inside a shell of diameter 1.5, closing then opening.
        let r12 = [1.0, 0.0, 0.0];
        let v12 = [1.0, 0.0, 0.0];
        let t = ray_sphere_out(&r12, &v12, 1.5 * 1.5).expect("must exit");
        assert!((t - 0.5).abs() < 1e-12);
    }

    #[test]
    fn out_root_outside_is_immediate() {
        let r12 = [3.0, 0.0, 0.0];
        let v12 = [1.0, 0.0, 0.0];
        assert_eq!(ray_sphere_out(&r12, &v12, 1.0), Some(0.0));
    }

    #[test]
    fn smooth_collision_exchanges_velocities() -> Result<()> {
        let dynamics = Newtonian;
        let mut w = head_on_world(-0.5, 0.5);
        let ke0 = w.kinetic_energy();
        let cs = dynamics.smooth_spheres_coll(&mut w, 0, 1, 1.0, 1.0)?;
        assert_eq!(cs.changes.len(), 2);
        assert!((w.particles[0].v[0] + 1.0).abs() < 1e-12);
        assert!((w.particles[1].v[0] - 1.0).abs() < 1e-12);
        assert!((w.kinetic_energy() - ke0).abs() < 1e-12);
        Ok(())
    }

    #[test]
    fn well_entry_accelerates_pair() -> Result<()> {
        let dynamics = Newtonian;
        let mut w = head_on_world(-0.75, 0.75);
        let ke0 = w.kinetic_energy();
        let cs = dynamics.well_event(&mut w, 0, 1, 1.0, 1.5 * 1.5)?;
        assert_eq!(cs.kind, EventKind::StepIn);
        // Kinetic energy gains exactly delta_u.
        assert!((w.kinetic_energy() - ke0 - 1.0).abs() < 1e-12);
        assert!((cs.delta_internal + 1.0).abs() < 1e-12);
        // Still approaching, faster than before.
        assert!(w.particles[0].v[0] > 1.0);
        Ok(())
    }

    #[test]
    fn well_exit_without_energy_bounces() -> Result<()> {
        let dynamics = Newtonian;
        // Barely moving apart: cannot pay a deep well on the way out.
        let mut w = head_on_world(-0.75, 0.75);
        w.particles[0].v = [-0.1, 0.0, 0.0];
        w.particles[1].v = [0.1, 0.0, 0.0];
        let ke0 = w.kinetic_energy();
        let cs = dynamics.well_event(&mut w, 0, 1, -1.0, 1.5 * 1.5)?;
        assert_eq!(cs.kind, EventKind::Bounce);
        assert_eq!(cs.delta_internal, 0.0);
        // Bounce is elastic and reverses the radial motion.
        assert!((w.kinetic_energy() - ke0).abs() < 1e-12);
        assert!(w.particles[0].v[0] > 0.0);
        Ok(())
    }

    #[test]
    fn plane_root_basic() {
        let dynamics = Newtonian;
        let particles = vec![Particle::new(0, [0.0, 0.4, 0.0], [0.0, 1.0, 0.0]).unwrap()];
        let species = vec![Species::new("A", 1.0, IdRange::All).unwrap()];
        let w = World::new(particles, species, Boundary::None, [10.0; 3], Some(1)).unwrap();
        let t = dynamics
            .plane_root(&w, 0, &[0.0, 0.5, 0.0], &[0.0, -1.0, 0.0], 0.0)
            .expect("must hit wall");
        assert!((t - 0.1).abs() < 1e-12);
    }

    #[test]
    fn plane_event_reflects_normal_component() {
        let dynamics = Newtonian;
        let particles = vec![Particle::new(0, [0.0, 0.5, 0.0], [0.3, 1.0, 0.0]).unwrap()];
        let species = vec![Species::new("A", 1.0, IdRange::All).unwrap()];
        let mut w = World::new(particles, species, Boundary::None, [10.0; 3], Some(1)).unwrap();
        dynamics.run_plane_event(&mut w, 0, &[0.0, -1.0, 0.0], 1.0);
        assert!((w.particles[0].v[1] + 1.0).abs() < 1e-12);
        assert!((w.particles[0].v[0] - 0.3).abs() < 1e-12);
    }

    #[test]
    fn cell_time_and_exit_axis() {
        let dynamics = Newtonian;
        let particles = vec![Particle::new(0, [0.4, 0.2, 0.0], [1.0, 0.0, 0.0]).unwrap()];
        let species = vec![Species::new("A", 1.0, IdRange::All).unwrap()];
        let w = World::new(particles, species, Boundary::None, [10.0; 3], Some(1)).unwrap();
        let origin = [0.0, 0.0, 0.0];
        let width = [1.0, 1.0, 1.0];
        let dt = dynamics.square_cell_time(&w, 0, &origin, &width);
        assert!((dt - 0.6).abs() < 1e-12);
        assert_eq!(dynamics.square_cell_exit(&w, 0, &origin, &width), (0, 1));
    }

    #[test]
    fn multibody_well_conserves_momentum() -> Result<()> {
        let dynamics = Newtonian;
        let mut w = head_on_world(-2.0, 2.0);
        let r1 = IdRange::Single(0);
        let r2 = IdRange::Single(1);
        let cs = dynamics.multibody_well_event(&mut w, &r1, &r2, 0.5)?;
        assert_eq!(cs.changes.len(), 2);
        let p = w.momentum();
        assert!(nrm2(&p) < 1e-20);
        Ok(())
    }

    #[test]
    fn rescale_scales_kinetic_energy() {
        let dynamics = Newtonian;
        let mut w = head_on_world(-2.0, 2.0);
        let ke0 = w.kinetic_energy();
        dynamics.rescale_kinetic_energy(&mut w, 2.0);
        assert!((w.kinetic_energy() - 2.0 * ke0).abs() < 1e-12);
    }
}
