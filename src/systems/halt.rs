use crate::core::World;
use crate::error::Result;
use crate::systems::SystemOutcome;

/// Stops the run at a configured simulation time by pulling the
/// termination threshold down to the current event count.
#[derive(Debug, Clone)]
pub struct Halt {
    pub name: String,
    pub next_time: f64,
}

impl Halt {
    pub fn new(name: impl Into<String>, at: f64) -> Self {
        Self {
            name: name.into(),
            next_time: at,
        }
    }

    pub fn run(&mut self, w: &mut World) -> Result<SystemOutcome> {
        log::info!("halt event at t = {}", w.system_time);
        w.sim_shutdown();
        self.next_time = f64::INFINITY;
        Ok(SystemOutcome::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bc::Boundary;
    use crate::core::{Particle, Species};
    use crate::ranges::IdRange;

    #[test]
    fn halt_caps_the_event_count() -> Result<()> {
        let particles = vec![Particle::new(0, [0.0; 3], [0.0; 3]).unwrap()];
        let species = vec![Species::new("A", 1.0, IdRange::All).unwrap()];
        let mut w = World::new(particles, species, Boundary::None, [1.0; 3], Some(1)).unwrap();
        w.event_count = 42;
        let mut halt = Halt::new("tend", 10.0);
        halt.run(&mut w)?;
        assert_eq!(w.end_event_count, 42);
        assert!(halt.next_time.is_infinite());
        Ok(())
    }
}
