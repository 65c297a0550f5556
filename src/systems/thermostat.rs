use crate::core::{ChangeSet, World};
use crate::dynamics::Dynamics;
use crate::error::Result;
use crate::systems::SystemOutcome;
use rand::Rng;

/// Andersen thermostat: at exponentially-distributed intervals a
/// random particle's velocity is re-drawn from the Maxwell
/// distribution at the bath temperature.
#[derive(Debug, Clone)]
pub struct AndersenThermostat {
    pub name: String,
    pub temperature: f64,
    /// Mean interval between re-draws, per particle.
    pub mean_free_time: f64,
    pub next_time: f64,
    interval: f64,
}

impl AndersenThermostat {
    pub fn new(name: impl Into<String>, temperature: f64, mean_free_time: f64) -> Self {
        Self {
            name: name.into(),
            temperature,
            mean_free_time,
            next_time: f64::INFINITY,
            interval: f64::INFINITY,
        }
    }

    pub fn initialise(&mut self, w: &mut World) -> Result<()> {
        self.interval = self.mean_free_time / w.n() as f64;
        self.next_time = w.system_time + self.draw_interval(w);
        Ok(())
    }

    fn draw_interval(&self, w: &mut World) -> f64 {
        let u: f64 = w.rng.random();
        -self.interval * (1.0 - u).ln()
    }

    pub fn run(&mut self, w: &mut World, dynamics: &Dynamics) -> Result<SystemOutcome> {
        let n = w.n() as u32;
        let pid = w.rng.random_range(0..n);
        dynamics.update_particle(w, pid);
        let cs: ChangeSet = dynamics.random_gaussian_event(w, pid, self.temperature.sqrt());
        self.next_time = w.system_time + self.draw_interval(w);
        Ok(SystemOutcome {
            changeset: Some(cs),
            ..SystemOutcome::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bc::Boundary;
    use crate::core::{Particle, Species};
    use crate::ranges::IdRange;

    #[test]
    fn redraw_touches_exactly_one_particle() -> Result<()> {
        let particles = (0..4)
            .map(|i| Particle::new(i, [i as f64, 0.0, 0.0], [0.0; 3]).unwrap())
            .collect();
        let species = vec![Species::new("A", 1.0, IdRange::All).unwrap()];
        let mut w = World::new(particles, species, Boundary::None, [10.0; 3], Some(9)).unwrap();
        let mut sys = AndersenThermostat::new("bath", 1.0, 4.0);
        sys.initialise(&mut w)?;
        assert!(sys.next_time.is_finite());
        let before = sys.next_time;
        w.system_time = before;
        let out = sys.run(&mut w, &Dynamics::default())?;
        assert_eq!(out.changeset.unwrap().changes.len(), 1);
        assert!(sys.next_time > before);
        Ok(())
    }
}
