//! Output collaborators.
//!
//! Plugins observe the simulation through the scheduler's change-set
//! signal; they never mutate core state. The registry maps the names
//! accepted on the command line to constructors.

use crate::core::EventKind;
use crate::error::{Error, Result};
use crate::sim::Simulation;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// Counters accumulated by the misc plugin.
#[derive(Debug, Default, Clone)]
pub struct EventTally {
    pub counts: BTreeMap<&'static str, u64>,
    pub executed: u64,
    pub delta_ke: f64,
    pub last_event_time: f64,
    /// Sum of inter-event intervals, for the mean free time.
    pub interval_sum: f64,
}

impl EventTally {
    pub fn mean_free_time(&self) -> f64 {
        if self.executed < 2 {
            f64::INFINITY
        } else {
            self.interval_sum / (self.executed - 1) as f64
        }
    }
}

/// The screen/summary plugin: event counts by kind, accumulated
/// kinetic-energy drift, mean free time.
pub struct MiscPlugin {
    stats: Arc<Mutex<EventTally>>,
    pub handle: usize,
}

impl MiscPlugin {
    pub fn attach(sim: &mut Simulation) -> Self {
        let stats = Arc::new(Mutex::new(EventTally::default()));
        let sink = stats.clone();
        let handle = sim.scheduler.subscribe(Box::new(move |ev, cs| {
            let Ok(mut tally) = sink.lock() else { return };
            *tally.counts.entry(cs.kind.as_str()).or_insert(0) += 1;
            if cs.kind != EventKind::Cell && cs.kind != EventKind::Virtual {
                let t = ev.time_f64();
                if tally.executed > 0 {
                    tally.interval_sum += t - tally.last_event_time;
                }
                tally.last_event_time = t;
                tally.executed += 1;
            }
            tally.delta_ke += cs.changes.iter().map(|c| c.delta_ke).sum::<f64>();
        }));
        Self { stats, handle }
    }

    pub fn tally(&self) -> EventTally {
        self.stats.lock().map(|t| t.clone()).unwrap_or_default()
    }

    /// One line of periodic screen output.
    pub fn periodic_line(&self, sim: &Simulation) -> String {
        let tally = self.tally();
        format!(
            "t = {:.6e}, events = {}, KE = {:.6e}, U = {:.6e}, MFT = {:.3e}",
            sim.world.system_time,
            sim.world.event_count,
            sim.world.kinetic_energy(),
            sim.internal_energy(),
            tally.mean_free_time(),
        )
    }

    /// End-of-run summary block.
    pub fn summary(&self, sim: &Simulation) -> String {
        let tally = self.tally();
        let mut out = String::new();
        out.push_str(&format!(
            "events executed: {}\nfinal time: {:.8e}\nkinetic energy: {:.8e}\ninternal energy: {:.8e}\n",
            sim.world.event_count,
            sim.world.system_time,
            sim.world.kinetic_energy(),
            sim.internal_energy(),
        ));
        for (kind, count) in tally.counts.iter() {
            out.push_str(&format!("  {kind}: {count}\n"));
        }
        out
    }
}

/// Attach a plugin by its command-line name.
pub fn attach_plugin(name: &str, sim: &mut Simulation) -> Result<MiscPlugin> {
    match name {
        "Misc" => Ok(MiscPlugin::attach(sim)),
        other => Err(Error::Config(format!(
            "unknown output plugin \"{other}\" (available: Misc)"
        ))),
    }
}
