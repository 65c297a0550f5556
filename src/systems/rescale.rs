use crate::core::{ChangeSet, EventKind, ParticleChange, World};
use crate::dynamics::Dynamics;
use crate::error::Result;
use crate::systems::SystemOutcome;

/// Velocity rescale to a target temperature, either on a fixed
/// timestep or triggered every `frequency` executed events.
#[derive(Debug, Clone)]
pub struct Rescale {
    pub name: String,
    pub kt: f64,
    pub timestep: Option<f64>,
    pub frequency: Option<u64>,
    pub next_time: f64,
}

impl Rescale {
    pub fn new(
        name: impl Into<String>,
        kt: f64,
        timestep: Option<f64>,
        frequency: Option<u64>,
    ) -> Self {
        Self {
            name: name.into(),
            kt,
            timestep,
            frequency,
            next_time: timestep.unwrap_or(f64::INFINITY),
        }
    }

    pub fn run(&mut self, w: &mut World, dynamics: &Dynamics) -> Result<SystemOutcome> {
        dynamics.update_all(w);
        let current = w.temperature();
        log::info!("rescaling kT {current} to {}", self.kt);

        let mut cs = ChangeSet::new(EventKind::Rescale);
        for p in &w.particles {
            cs.changes.push(ParticleChange {
                id: p.id,
                old_vel: p.v,
                delta_ke: 0.0,
            });
        }
        dynamics.rescale_kinetic_energy(w, self.kt / current);
        for c in cs.changes.iter_mut() {
            let mass = w.mass_of(c.id);
            let p = &w.particles[c.id as usize];
            c.delta_ke = p.kinetic_energy(mass)
                - 0.5 * mass * crate::math::nrm2(&c.old_vel);
        }

        self.next_time = match self.timestep {
            Some(step) => w.system_time + step,
            None => f64::INFINITY,
        };
        Ok(SystemOutcome {
            changeset: Some(cs),
            rebuild_all: true,
            snapshot: None,
        })
    }

    /// Event-count trigger: pull the firing time to "now".
    pub fn particles_updated(&mut self, w: &World) -> bool {
        if let Some(freq) = self.frequency {
            if freq > 0 && w.event_count % freq == 0 && self.next_time > w.system_time {
                self.next_time = w.system_time;
                return true;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bc::Boundary;
    use crate::core::{Particle, Species};
    use crate::ranges::IdRange;

    fn world() -> World {
        let particles = vec![
            Particle::new(0, [0.0; 3], [2.0, 0.0, 0.0]).unwrap(),
            Particle::new(1, [1.0, 0.0, 0.0], [-2.0, 0.0, 0.0]).unwrap(),
        ];
        let species = vec![Species::new("A", 1.0, IdRange::All).unwrap()];
        World::new(particles, species, Boundary::None, [10.0; 3], Some(1)).unwrap()
    }

    #[test]
    fn rescale_hits_the_target_temperature() -> Result<()> {
        let mut w = world();
        let mut sys = Rescale::new("thermo", 1.0, Some(5.0), None);
        let out = sys.run(&mut w, &Dynamics::default())?;
        assert!(out.rebuild_all);
        assert!((w.temperature() - 1.0).abs() < 1e-12);
        assert_eq!(out.changeset.unwrap().changes.len(), 2);
        assert!((sys.next_time - 5.0).abs() < 1e-12);
        Ok(())
    }

    #[test]
    fn frequency_trigger_pulls_the_event_forward() {
        let mut w = world();
        w.event_count = 100;
        let mut sys = Rescale::new("thermo", 1.0, None, Some(50));
        assert!(sys.next_time.is_infinite());
        assert!(sys.particles_updated(&w));
        assert_eq!(sys.next_time, w.system_time);
    }
}
