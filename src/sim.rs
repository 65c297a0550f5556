//! The simulation instance and its event loop.
//!
//! `Simulation` owns every registry for its lifetime and is the single
//! mutator. `run_next_event` pops the queue minimum, revalidates it,
//! streams the affected state exactly to the event time, executes, and
//! fans the change-set out to the scheduler, the systems, and any
//! subscribed observers.

use crate::core::{ChangeSet, Event, EventKind, EventSource, ParticleChange, World};
use crate::dynamics::Dynamics;
use crate::error::{Error, Result};
use crate::globals::{neighbour_list_mut, Global};
use crate::interactions::{self, Interaction};
use crate::locals::Local;
use crate::scheduler::{Scheduler, REJECTION_LIMIT};
use crate::systems::System;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Start,
    Initialised,
    Production,
}

#[derive(Debug)]
pub struct Simulation {
    pub world: World,
    pub dynamics: Dynamics,
    pub interactions: Vec<Interaction>,
    pub locals: Vec<Local>,
    pub globals: Vec<Global>,
    pub systems: Vec<System>,
    pub scheduler: Scheduler,
    pub status: Status,
    /// Where snapshot files are written.
    pub output_dir: PathBuf,
    /// Reduced decimal precision on write-back.
    pub round_output: bool,
}

impl Simulation {
    pub fn new(world: World, dynamics: Dynamics) -> Self {
        Self {
            world,
            dynamics,
            interactions: Vec::new(),
            locals: Vec::new(),
            globals: Vec::new(),
            systems: Vec::new(),
            scheduler: Scheduler::new(),
            status: Status::Start,
            output_dir: PathBuf::from("."),
            round_output: false,
        }
    }

    /// The longest interaction range over the registry.
    pub fn longest_interaction(&self) -> f64 {
        interactions::max_interaction_range(&self.interactions)
    }

    /// Total internal (potential) energy held in capture maps.
    pub fn internal_energy(&self) -> f64 {
        self.interactions.iter().map(|i| i.internal_energy()).sum()
    }

    /// Wire the registries together and build the event queue.
    pub fn initialise(&mut self) -> Result<()> {
        if self.status != Status::Start {
            return Err(Error::State(
                "initialise() called on an already-initialised simulation".into(),
            ));
        }
        let max_range = self.longest_interaction();

        for glob in self.globals.iter_mut() {
            if let Global::Sentinel(s) = glob {
                s.max_range = max_range;
            }
        }
        if let Some(cells) = neighbour_list_mut(&mut self.globals) {
            let range = if cells.max_range > 0.0 {
                cells.max_range
            } else {
                max_range
            };
            cells.rebuild(&self.world, range)?;
        }

        interactions::init_capture_maps(&mut self.interactions, &self.world, false)?;

        {
            let Simulation {
                world,
                dynamics,
                systems,
                ..
            } = self;
            for sys in systems.iter_mut() {
                sys.initialise(world, dynamics)?;
            }
        }

        {
            let Simulation {
                world,
                dynamics,
                interactions,
                locals,
                globals,
                systems,
                scheduler,
                ..
            } = self;
            scheduler.initialise(world, dynamics, interactions, locals, globals, systems)?;
        }
        self.status = Status::Initialised;
        Ok(())
    }

    /// Advance the global clock to `t`, streaming the boundary
    /// condition (shear offset) along.
    fn advance_time(&mut self, t: f64) {
        let dt = t - self.world.system_time;
        let cell = self.world.primary_cell;
        self.world.bc.stream(dt, &cell);
        self.world.system_time = t;
    }

    /// Pop, validate, and execute the next event.
    ///
    /// Returns false once the termination threshold is reached (or the
    /// queue ran dry).
    pub fn run_next_event(&mut self) -> Result<bool> {
        if self.status == Status::Start {
            return Err(Error::State("run called before initialise".into()));
        }
        self.status = Status::Production;

        let Some((idx, ev)) = self.scheduler.next_event() else {
            log::warn!("the event queue has run out of events, shutting down");
            self.world.sim_shutdown();
            return Ok(false);
        };
        if ev.time_f64().is_infinite() {
            log::warn!(
                "next event time is infinite (queue exhausted), shutting down"
            );
            self.world.sim_shutdown();
            return Ok(false);
        }

        match ev.source {
            EventSource::Interaction { p2, int_id, .. } => {
                self.run_interaction_event(idx, ev, p2, int_id)?
            }
            EventSource::Local { local_id } => self.run_local_event(idx, ev, local_id)?,
            EventSource::VirtualCell { global_id } => self.run_cell_event(idx, ev, global_id)?,
            EventSource::Global { global_id } => self.run_sentinel_event(idx, ev, global_id)?,
            EventSource::System { sys_id } => self.run_system_event(ev, sys_id)?,
        }

        Ok(self.world.event_count < self.world.end_event_count)
    }

    fn run_interaction_event(
        &mut self,
        idx: usize,
        ev: Event,
        p2: u32,
        int_id: usize,
    ) -> Result<()> {
        let p1 = ev.p1;
        self.scheduler.pop_event(idx, &ev);

        // Re-predict against the current state; the queued copy may be
        // out of sequence with events that ran since it was pushed.
        let (accept, exec_time, kind) = {
            let Simulation {
                world,
                dynamics,
                interactions,
                scheduler,
                ..
            } = self;
            dynamics.update_pair(world, p1, p2);
            let recalc = interactions[int_id].get_event(world, dynamics, p1, p2);
            let head = scheduler.peek_time();
            match recalc {
                None => (false, 0.0, EventKind::Core),
                Some(pev) => {
                    let t_new = world.system_time + pev.dt;
                    let out_of_sequence = matches!(head, Some(h) if t_new > h);
                    if out_of_sequence && scheduler.interaction_rejections < REJECTION_LIMIT {
                        scheduler.interaction_rejections += 1;
                        (false, 0.0, pev.kind)
                    } else {
                        scheduler.interaction_rejections = 0;
                        (true, t_new, pev.kind)
                    }
                }
            }
        };

        if !accept {
            return self.full_update_pair(p1, p2);
        }
        if exec_time.is_infinite() {
            return Err(Error::Numerical(format!(
                "infinite interaction time between particles {p1} and {p2} was not \
                 reported as no-event"
            )));
        }

        self.advance_time(exec_time);
        let cs = {
            let Simulation {
                world,
                dynamics,
                interactions,
                ..
            } = self;
            dynamics.update_pair(world, p1, p2);
            if world.overlap_debug {
                if let Some(msg) = interactions[int_id].validate_state(world, dynamics, p1, p2) {
                    return Err(Error::State(format!("overlap at event execution: {msg}")));
                }
            }
            world.event_count += 1;
            interactions[int_id].run_event(world, dynamics, p1, p2, kind)?
        };
        self.fan_out(&ev, cs)
    }

    fn run_local_event(&mut self, idx: usize, ev: Event, local_id: usize) -> Result<()> {
        let p1 = ev.p1;
        self.scheduler.pop_event(idx, &ev);

        let (accept, exec_time, kind) = {
            let Simulation {
                world,
                dynamics,
                locals,
                scheduler,
                ..
            } = self;
            dynamics.update_particle(world, p1);
            let recalc = locals[local_id].get_event(world, dynamics, p1);
            let head = scheduler.peek_time();
            match recalc {
                None => (false, 0.0, ev.kind),
                Some(lev) => {
                    let t_new = world.system_time + lev.dt;
                    let out_of_sequence = matches!(head, Some(h) if t_new > h);
                    if out_of_sequence && scheduler.local_rejections < REJECTION_LIMIT {
                        scheduler.local_rejections += 1;
                        (false, 0.0, lev.kind)
                    } else {
                        scheduler.local_rejections = 0;
                        (true, t_new, lev.kind)
                    }
                }
            }
        };

        if !accept {
            return self.full_update_one(p1);
        }

        self.advance_time(exec_time);
        let cs = {
            let Simulation {
                world,
                dynamics,
                locals,
                ..
            } = self;
            dynamics.update_particle(world, p1);
            world.event_count += 1;
            locals[local_id].run_event(world, dynamics, p1, kind)?
        };
        self.fan_out(&ev, cs)
    }

    /// Cell crossings are bookkeeping: no revalidation, no event-count
    /// increment, and the scheduler only refreshes the pair candidates
    /// the new neighbourhood exposes.
    fn run_cell_event(&mut self, idx: usize, ev: Event, global_id: usize) -> Result<()> {
        let p1 = ev.p1;
        self.advance_time(ev.time_f64());

        let transition = {
            let Simulation {
                world,
                dynamics,
                interactions,
                globals,
                scheduler,
                ..
            } = self;
            dynamics.update_particle(world, p1);
            scheduler.pop_event(idx, &ev);

            let Global::Cells(cells) = &mut globals[global_id] else {
                return Err(Error::State(
                    "virtual-cell event routed to a non-cell global".into(),
                ));
            };
            let transition = cells.run_crossing(world, dynamics, p1);

            for nb in transition.new_neighbours.iter() {
                scheduler.add_interaction_event(world, dynamics, interactions, p1, *nb)?;
            }
            let dt = cells.crossing_time(world, dynamics, p1);
            scheduler.push_event(
                p1,
                Event::new(
                    world.system_time + dt,
                    p1,
                    EventSource::VirtualCell { global_id },
                    EventKind::Cell,
                )?,
            );
            scheduler.sort(p1);
            transition
        };

        self.scheduler.notify_cell_transition(&transition);
        let cs = ChangeSet::single(
            EventKind::Cell,
            ParticleChange {
                id: p1,
                old_vel: self.world.particles[p1 as usize].v,
                delta_ke: 0.0,
            },
        );
        self.scheduler.notify(&ev, &cs);
        Ok(())
    }

    /// Sentinel events re-predict everything for the particle so its
    /// queued events use the correct periodic image.
    fn run_sentinel_event(&mut self, idx: usize, ev: Event, _global_id: usize) -> Result<()> {
        let p1 = ev.p1;
        self.advance_time(ev.time_f64());
        self.scheduler.pop_event(idx, &ev);
        {
            let Simulation {
                world, dynamics, ..
            } = self;
            dynamics.update_particle(world, p1);
        }
        let cs = ChangeSet::single(
            EventKind::Virtual,
            ParticleChange {
                id: p1,
                old_vel: self.world.particles[p1 as usize].v,
                delta_ke: 0.0,
            },
        );
        self.full_update_one(p1)?;
        self.scheduler.notify(&ev, &cs);
        Ok(())
    }

    fn run_system_event(&mut self, ev: Event, sys_id: usize) -> Result<()> {
        self.advance_time(ev.time_f64());

        let outcome = {
            let Simulation {
                world,
                dynamics,
                systems,
                ..
            } = self;
            let outcome = systems[sys_id].run(world, dynamics)?;
            if outcome.changeset.is_some() {
                world.event_count += 1;
            }
            outcome
        };

        if outcome.rebuild_all {
            let Simulation {
                world,
                dynamics,
                interactions,
                locals,
                globals,
                systems,
                scheduler,
                ..
            } = self;
            scheduler.rebuild_list(world, dynamics, interactions, locals, globals, systems)?;
            if let Some(cs) = outcome.changeset {
                scheduler.notify(&ev, &cs);
            }
        } else if let Some(cs) = outcome.changeset {
            self.fan_out(&ev, cs)?;
        }

        self.scheduler.rebuild_system_events(&self.systems)?;

        if let Some(index) = outcome.snapshot {
            self.write_snapshot(index)?;
        }
        Ok(())
    }

    /// Fan a change-set out: scheduler invalidation for every touched
    /// particle, system re-predictions, then the observer table.
    fn fan_out(&mut self, ev: &Event, cs: ChangeSet) -> Result<()> {
        let Simulation {
            world,
            dynamics,
            interactions,
            locals,
            globals,
            systems,
            scheduler,
            ..
        } = self;
        let touched: Vec<u32> = cs.touched().collect();
        for pid in touched {
            scheduler.full_update(world, dynamics, interactions, locals, globals, pid)?;
        }
        let mut resort = false;
        for sys in systems.iter_mut() {
            resort |= sys.particles_updated(world, dynamics, &cs);
        }
        if resort {
            scheduler.rebuild_system_events(systems)?;
        }
        scheduler.notify(ev, &cs);
        Ok(())
    }

    fn full_update_one(&mut self, pid: u32) -> Result<()> {
        let Simulation {
            world,
            dynamics,
            interactions,
            locals,
            globals,
            scheduler,
            ..
        } = self;
        scheduler.full_update(world, dynamics, interactions, locals, globals, pid)
    }

    fn full_update_pair(&mut self, p1: u32, p2: u32) -> Result<()> {
        let Simulation {
            world,
            dynamics,
            interactions,
            locals,
            globals,
            scheduler,
            ..
        } = self;
        scheduler.full_update_pair(world, dynamics, interactions, locals, globals, p1, p2)
    }

    /// Snapshot system events call back here: write the configuration
    /// and the observables next to it.
    fn write_snapshot(&mut self, index: u64) -> Result<()> {
        let config = self.output_dir.join(format!("Snapshot.{index}.xml.bz2"));
        let output = self
            .output_dir
            .join(format!("Snapshot.output.{index}.xml.bz2"));
        self.dynamics.update_all(&mut self.world);
        crate::config::write::write_config_file(self, &config)?;
        crate::config::write::write_observables_file(self, &output)?;
        log::info!("snapshot {index} written");
        Ok(())
    }

    /// Run until the termination threshold; `silent` suppresses the
    /// periodic observer output.
    pub fn run(&mut self, silent: bool, mut periodic: impl FnMut(&Simulation)) -> Result<()> {
        const PRINT_INTERVAL: u64 = 1000;
        let mut next_print = self.world.event_count + PRINT_INTERVAL;
        loop {
            if !self.run_next_event()? {
                return Ok(());
            }
            if !silent && self.world.event_count >= next_print {
                periodic(self);
                next_print = self.world.event_count + PRINT_INTERVAL;
            }
        }
    }

    /// Cooperative shutdown: the loop returns after the current event.
    pub fn sim_shutdown(&mut self) {
        self.world.sim_shutdown();
    }
}

/// Replica-exchange swap between two paused simulations.
///
/// Exchanges clocks and system-event lists, rescales both velocity
/// sets between the ensembles, and re-sorts both schedulers. Applying
/// it twice restores both simulations.
pub fn replex_swap(a: &mut Simulation, b: &mut Simulation) -> Result<()> {
    a.dynamics.update_all(&mut a.world);
    b.dynamics.update_all(&mut b.world);

    let t_a = a.world.temperature();
    let t_b = b.world.temperature();
    if t_a <= 0.0 || t_b <= 0.0 {
        return Err(Error::State(
            "replica swap requires both simulations to have kinetic energy".into(),
        ));
    }

    // Exchange the system-event lists, re-anchoring each firing time
    // to its destination clock so the time-to-fire is preserved.
    let now_a = a.world.system_time;
    let now_b = b.world.system_time;
    std::mem::swap(&mut a.systems, &mut b.systems);
    for sys in a.systems.iter_mut() {
        sys.shift_time(now_b, now_a);
    }
    for sys in b.systems.iter_mut() {
        sys.shift_time(now_a, now_b);
    }

    // Velocities scale by sqrt(T_other / T_self); queued times shrink
    // by the same factor the velocities grew.
    let scale_a = (t_b / t_a).sqrt();
    a.dynamics.rescale_kinetic_energy(&mut a.world, t_b / t_a);
    a.scheduler.rescale_times(now_a, 1.0 / scale_a);

    let scale_b = (t_a / t_b).sqrt();
    b.dynamics.rescale_kinetic_energy(&mut b.world, t_a / t_b);
    b.scheduler.rescale_times(now_b, 1.0 / scale_b);

    a.scheduler.rebuild_system_events(&a.systems)?;
    b.scheduler.rebuild_system_events(&b.systems)?;
    Ok(())
}
