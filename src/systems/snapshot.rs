use crate::core::World;
use crate::error::Result;
use crate::systems::SystemOutcome;

/// Periodically asks the simulation to write a configuration snapshot
/// and the matching observables file. The actual file I/O happens in
/// the simulation loop, which owns the full registry state.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub name: String,
    pub period: f64,
    pub next_time: f64,
    pub counter: u64,
}

impl Snapshot {
    pub fn new(name: impl Into<String>, period: f64) -> Self {
        let period = if period <= 0.0 { 1.0 } else { period };
        Self {
            name: name.into(),
            period,
            next_time: period,
            counter: 0,
        }
    }

    pub fn run(&mut self, _w: &mut World) -> Result<SystemOutcome> {
        let index = self.counter;
        self.counter += 1;
        self.next_time += self.period;
        Ok(SystemOutcome {
            snapshot: Some(index),
            ..SystemOutcome::default()
        })
    }
}
