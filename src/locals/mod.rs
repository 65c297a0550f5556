//! Per-particle geometric events: plane walls, smooth or thermal, and
//! rough walls with tangential restitution.

use crate::core::{ChangeSet, EventKind, World};
use crate::dynamics::Dynamics;
use crate::error::{Error, Result};
use crate::math::{dot, Vec3};
use crate::ranges::IdRange;

/// A predicted local event: time-to-event and sub-kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalEvent {
    pub dt: f64,
    pub kind: EventKind,
}

/// A plane wall. A positive `temperature` turns the bounce into an
/// Andersen thermal re-draw instead of a specular reflection.
#[derive(Debug, Clone)]
pub struct Wall {
    pub name: String,
    pub range: IdRange,
    pub origin: Vec3,
    pub normal: Vec3,
    pub elasticity: f64,
    /// Particle contact diameter against this wall.
    pub diameter: f64,
    pub temperature: Option<f64>,
}

/// A plane wall that also exchanges tangential momentum with the
/// particle's spin.
#[derive(Debug, Clone)]
pub struct RoughWall {
    pub name: String,
    pub range: IdRange,
    pub origin: Vec3,
    pub normal: Vec3,
    pub elasticity: f64,
    pub tangential_elasticity: f64,
    pub diameter: f64,
}

/// Dispatch over the local registry's entry types.
#[derive(Debug, Clone)]
pub enum Local {
    Wall(Wall),
    RoughWall(RoughWall),
}

impl Local {
    pub fn name(&self) -> &str {
        match self {
            Local::Wall(l) => &l.name,
            Local::RoughWall(l) => &l.name,
        }
    }

    pub fn range(&self) -> &IdRange {
        match self {
            Local::Wall(l) => &l.range,
            Local::RoughWall(l) => &l.range,
        }
    }

    pub fn is_interaction(&self, pid: u32) -> bool {
        self.range().contains(pid)
    }

    pub fn xml_type(&self) -> &'static str {
        match self {
            Local::Wall(_) => "Wall",
            Local::RoughWall(_) => "RoughWall",
        }
    }

    pub fn get_event(&self, w: &World, dynamics: &Dynamics, pid: u32) -> Option<LocalEvent> {
        let (origin, normal, diameter, kind) = match self {
            Local::Wall(l) => (
                &l.origin,
                &l.normal,
                l.diameter,
                if l.temperature.is_some() {
                    EventKind::Gaussian
                } else {
                    EventKind::Wall
                },
            ),
            Local::RoughWall(l) => (&l.origin, &l.normal, l.diameter, EventKind::Wall),
        };
        dynamics
            .plane_root(w, pid, origin, normal, 0.5 * diameter)
            .map(|dt| LocalEvent { dt, kind })
    }

    pub fn run_event(
        &self,
        w: &mut World,
        dynamics: &Dynamics,
        pid: u32,
        _kind: EventKind,
    ) -> Result<ChangeSet> {
        match self {
            Local::Wall(l) => match l.temperature {
                Some(t) => Ok(dynamics.run_andersen_wall(w, pid, &l.normal, t.sqrt())),
                None => Ok(dynamics.run_plane_event(w, pid, &l.normal, l.elasticity)),
            },
            Local::RoughWall(l) => {
                let radius = 0.5 * l.diameter;
                let mass = w.mass_of(pid);
                // Solid-sphere moment of inertia, m d^2 / 10.
                let inertia = 0.1 * mass * l.diameter * l.diameter;
                Ok(dynamics.run_rough_wall(
                    w,
                    pid,
                    &l.normal,
                    l.elasticity,
                    l.tangential_elasticity,
                    radius,
                    inertia,
                ))
            }
        }
    }

    /// Diagnostic for a particle sitting inside the wall.
    pub fn validate_state(&self, w: &World, pid: u32) -> Option<String> {
        let (origin, normal, diameter) = match self {
            Local::Wall(l) => (&l.origin, &l.normal, l.diameter),
            Local::RoughWall(l) => (&l.origin, &l.normal, l.diameter),
        };
        let p = &w.particles[pid as usize];
        let mut pos = [
            p.r[0] - origin[0],
            p.r[1] - origin[1],
            p.r[2] - origin[2],
        ];
        w.bc.apply(&mut pos, &w.primary_cell);
        let depth = 0.5 * diameter - dot(&pos, normal).abs();
        if depth > 0.0 {
            return Some(format!(
                "particle {pid} is {depth} inside the wall \"{}\"",
                self.name()
            ));
        }
        None
    }
}

/// Normalise a wall normal at construction.
pub fn unit_normal(mut n: Vec3) -> Result<Vec3> {
    let len = crate::math::normalise(&mut n);
    if len == 0.0 {
        return Err(Error::Config("wall normal has zero length".into()));
    }
    Ok(n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bc::Boundary;
    use crate::core::{Particle, Species};

    fn wall_at(y: f64) -> Local {
        Local::Wall(Wall {
            name: "top".into(),
            range: IdRange::All,
            origin: [0.0, y, 0.0],
            normal: [0.0, -1.0, 0.0],
            elasticity: 1.0,
            diameter: 0.0,
            temperature: None,
        })
    }

    fn world() -> World {
        let particles = vec![Particle::new(0, [0.0, 0.4, 0.0], [0.0, 1.0, 0.0]).unwrap()];
        let species = vec![Species::new("A", 1.0, IdRange::All).unwrap()];
        World::new(particles, species, Boundary::None, [10.0; 3], Some(7)).unwrap()
    }

    #[test]
    fn wall_bounce_scenario() -> Result<()> {
        let wall = wall_at(0.5);
        let dynamics = Dynamics::default();
        let mut w = world();
        let ev = wall.get_event(&w, &dynamics, 0).expect("must hit");
        assert_eq!(ev.kind, EventKind::Wall);
        assert!((ev.dt - 0.1).abs() < 1e-12);

        dynamics.stream_particle(&mut w, 0, ev.dt);
        let cs = wall.run_event(&mut w, &dynamics, 0, ev.kind)?;
        assert_eq!(cs.changes.len(), 1);
        assert!((w.particles[0].v[1] + 1.0).abs() < 1e-12);
        Ok(())
    }

    #[test]
    fn receding_particle_has_no_event() {
        let wall = wall_at(0.5);
        let mut w = world();
        w.particles[0].v = [0.0, -1.0, 0.0];
        assert!(wall.get_event(&w, &Dynamics::default(), 0).is_none());
    }

    #[test]
    fn thermal_wall_redraws_velocity() -> Result<()> {
        let wall = Local::Wall(Wall {
            name: "hot".into(),
            range: IdRange::All,
            origin: [0.0, 0.5, 0.0],
            normal: [0.0, -1.0, 0.0],
            elasticity: 1.0,
            diameter: 0.0,
            temperature: Some(2.0),
        });
        let dynamics = Dynamics::default();
        let mut w = world();
        let ev = wall.get_event(&w, &dynamics, 0).expect("must hit");
        assert_eq!(ev.kind, EventKind::Gaussian);
        let cs = wall.run_event(&mut w, &dynamics, 0, ev.kind)?;
        assert_eq!(cs.kind, EventKind::Gaussian);
        // The re-drawn velocity must point away from the wall.
        assert!(w.particles[0].v[1] < 0.0);
        Ok(())
    }

    #[test]
    fn validate_flags_penetration() {
        let wall = Local::Wall(Wall {
            name: "thick".into(),
            range: IdRange::All,
            origin: [0.0, 0.5, 0.0],
            normal: [0.0, -1.0, 0.0],
            elasticity: 1.0,
            diameter: 0.5,
            temperature: None,
        });
        let mut w = world();
        w.particles[0].r = [0.0, 0.45, 0.0];
        assert!(wall.validate_state(&w, 0).is_some());
    }
}
