//! The event scheduler.
//!
//! Owns the future-event list, the per-particle staleness counters,
//! and the publish/subscribe table through which output collaborators
//! observe executed events. The simulation loop in `sim` drives it.

pub mod sorter;

use crate::core::{ChangeSet, Event, EventSource, World, NO_PARTICLE};
use crate::dynamics::Dynamics;
use crate::error::{Error, Result};
use crate::globals::{neighbour_list, CellTransition, Global};
use crate::interactions::{interaction_for, Interaction};
use crate::locals::Local;
use crate::systems::System;
use sorter::FutureEventList;

/// Accept a popped event after this many consecutive rejections, to
/// break rounding-error cycles between near-simultaneous events.
pub const REJECTION_LIMIT: usize = 10;

type Subscriber = Box<dyn FnMut(&Event, &ChangeSet) + Send>;
type CellSubscriber = Box<dyn FnMut(&CellTransition) + Send>;

pub struct Scheduler {
    fel: FutureEventList,
    /// Executed-event counters, one per particle: the staleness stamps
    /// queued interaction events compare against.
    pub counters: Vec<u64>,
    pub interaction_rejections: usize,
    pub local_rejections: usize,
    subscribers: Vec<(usize, Subscriber)>,
    cell_subscribers: Vec<(usize, CellSubscriber)>,
    next_handle: usize,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("fel", &self.fel)
            .field("counters", &self.counters)
            .field("interaction_rejections", &self.interaction_rejections)
            .field("local_rejections", &self.local_rejections)
            .field("subscribers", &self.subscribers.iter().map(|(h, _)| h).collect::<Vec<_>>())
            .field("cell_subscribers", &self.cell_subscribers.iter().map(|(h, _)| h).collect::<Vec<_>>())
            .field("next_handle", &self.next_handle)
            .finish()
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            fel: FutureEventList::new(),
            counters: Vec::new(),
            interaction_rejections: 0,
            local_rejections: 0,
            subscribers: Vec::new(),
            cell_subscribers: Vec::new(),
            next_handle: 0,
        }
    }

    /// Validate the configuration, then build every candidate event.
    #[allow(clippy::too_many_arguments)]
    pub fn initialise(
        &mut self,
        w: &mut World,
        dynamics: &Dynamics,
        interactions: &[Interaction],
        locals: &[Local],
        globals: &[Global],
        systems: &[System],
    ) -> Result<()> {
        log::debug!("checking the configuration for invalid states");
        let mut warnings = 0usize;
        let n = w.n() as u32;
        for p1 in 0..n {
            let neighbours = match neighbour_list(globals) {
                Some(cells) if cells.range.contains(p1) => cells.neighbours_of(p1),
                _ => (0..n).collect(),
            };
            for p2 in neighbours {
                if p2 <= p1 {
                    continue;
                }
                let idx = interaction_for(interactions, p1, p2)?;
                if let Some(msg) = interactions[idx].validate_state(w, dynamics, p1, p2) {
                    warnings += 1;
                    if warnings <= 100 {
                        log::warn!("{msg}");
                    }
                }
            }
            for lcl in locals {
                if lcl.is_interaction(p1) {
                    if let Some(msg) = lcl.validate_state(w, p1) {
                        warnings += 1;
                        if warnings <= 100 {
                            log::warn!("{msg}");
                        }
                    }
                }
            }
        }
        if warnings > 100 {
            log::warn!(
                "over 100 warnings of invalid states, further output was \
                 suppressed ({warnings} in total)"
            );
        }

        log::debug!("building all events at event count {}", w.event_count);
        self.rebuild_list(w, dynamics, interactions, locals, globals, systems)?;
        Ok(())
    }

    /// Clear and rebuild every per-particle list and the system list.
    #[allow(clippy::too_many_arguments)]
    pub fn rebuild_list(
        &mut self,
        w: &mut World,
        dynamics: &Dynamics,
        interactions: &[Interaction],
        locals: &[Local],
        globals: &[Global],
        systems: &[System],
    ) -> Result<()> {
        self.fel.resize(w.n());
        self.counters = vec![0; w.n()];
        for pid in 0..w.n() as u32 {
            self.add_events(w, dynamics, interactions, locals, globals, pid)?;
        }
        self.fel.init();
        self.rebuild_system_events(systems)
    }

    /// Build the candidate list for one particle: globals, locals, and
    /// one interaction event per current neighbour.
    pub fn add_events(
        &mut self,
        w: &mut World,
        dynamics: &Dynamics,
        interactions: &[Interaction],
        locals: &[Local],
        globals: &[Global],
        pid: u32,
    ) -> Result<()> {
        dynamics.update_particle(w, pid);
        let now = w.system_time;

        for (gid, glob) in globals.iter().enumerate() {
            if !glob.is_interaction(pid) {
                continue;
            }
            let (dt, kind) = glob.get_event(w, dynamics, pid);
            let source = if glob.is_virtual_cell() {
                EventSource::VirtualCell { global_id: gid }
            } else {
                EventSource::Global { global_id: gid }
            };
            self.fel.push(pid as usize, Event::new(now + dt, pid, source, kind)?);
        }

        for (lid, lcl) in locals.iter().enumerate() {
            if !lcl.is_interaction(pid) {
                continue;
            }
            if let Some(lev) = lcl.get_event(w, dynamics, pid) {
                self.fel.push(
                    pid as usize,
                    Event::new(
                        now + lev.dt,
                        pid,
                        EventSource::Local { local_id: lid },
                        lev.kind,
                    )?,
                );
            }
        }

        let neighbours = match neighbour_list(globals) {
            Some(cells) if cells.range.contains(pid) => cells.neighbours_of(pid),
            _ => (0..w.n() as u32).collect(),
        };
        for p2 in neighbours {
            self.add_interaction_event(w, dynamics, interactions, pid, p2)?;
        }
        Ok(())
    }

    /// Push the predicted pair event for (pid, p2) onto pid's list.
    pub fn add_interaction_event(
        &mut self,
        w: &mut World,
        dynamics: &Dynamics,
        interactions: &[Interaction],
        pid: u32,
        p2: u32,
    ) -> Result<()> {
        if pid == p2 {
            return Ok(());
        }
        dynamics.update_particle(w, p2);
        let int_id = interaction_for(interactions, pid, p2)?;
        if let Some(pev) = interactions[int_id].get_event(w, dynamics, pid, p2) {
            let ev = Event::new(
                w.system_time + pev.dt,
                pid,
                EventSource::Interaction {
                    p2,
                    int_id,
                    counter2: self.counters[p2 as usize],
                },
                pev.kind,
            )?;
            self.fel.push(pid as usize, ev);
        }
        Ok(())
    }

    /// Invalidate and rebuild one particle's candidates.
    pub fn full_update(
        &mut self,
        w: &mut World,
        dynamics: &Dynamics,
        interactions: &[Interaction],
        locals: &[Local],
        globals: &[Global],
        pid: u32,
    ) -> Result<()> {
        self.counters[pid as usize] += 1;
        self.fel.clear_list(pid as usize);
        self.add_events(w, dynamics, interactions, locals, globals, pid)?;
        self.fel.update(pid as usize);
        Ok(())
    }

    /// `full_update` for both members of a pair. The updates are not
    /// interleaved so only one valid event exists for the pair.
    #[allow(clippy::too_many_arguments)]
    pub fn full_update_pair(
        &mut self,
        w: &mut World,
        dynamics: &Dynamics,
        interactions: &[Interaction],
        locals: &[Local],
        globals: &[Global],
        p1: u32,
        p2: u32,
    ) -> Result<()> {
        self.full_update(w, dynamics, interactions, locals, globals, p1)?;
        self.full_update(w, dynamics, interactions, locals, globals, p2)
    }

    /// Refill the system sub-queue from the systems' firing times.
    /// A NaN firing time is fatal.
    pub fn rebuild_system_events(&mut self, systems: &[System]) -> Result<()> {
        let idx = self.fel.system_index();
        self.fel.clear_list(idx);
        for (sys_id, sys) in systems.iter().enumerate() {
            let ev = Event::new(
                sys.next_time(),
                NO_PARTICLE,
                EventSource::System { sys_id },
                sys.event_kind(),
            )
            .map_err(|_| {
                Error::Numerical(format!(
                    "NaN firing time on system event \"{}\"",
                    sys.name()
                ))
            })?;
            self.fel.push(idx, ev);
        }
        self.fel.update(idx);
        Ok(())
    }

    /// The next event to run, with lazy deletion of interaction events
    /// whose partner has moved since prediction.
    pub fn next_event(&mut self) -> Option<(usize, Event)> {
        loop {
            let (idx, ev) = self.fel.peek()?;
            if let EventSource::Interaction { p2, counter2, .. } = ev.source {
                if counter2 != self.counters[p2 as usize] {
                    self.fel.remove(idx, &ev);
                    continue;
                }
            }
            return Some((idx, ev));
        }
    }

    /// Time of the queue head, after lazy cleanup.
    pub fn peek_time(&mut self) -> Option<f64> {
        self.next_event().map(|(_, ev)| ev.time_f64())
    }

    pub fn pop_event(&mut self, idx: usize, ev: &Event) {
        self.fel.remove(idx, ev);
    }

    pub fn push_event(&mut self, pid: u32, ev: Event) {
        self.fel.push(pid as usize, ev);
    }

    pub fn sort(&mut self, pid: u32) {
        self.fel.update(pid as usize);
    }

    pub fn system_index(&self) -> usize {
        self.fel.system_index()
    }

    /// Multiply every queued time-to-event by `scale`.
    pub fn rescale_times(&mut self, now: f64, scale: f64) {
        self.fel.rescale_times(now, scale);
    }

    /// Register an observer of executed events. Subscribers are called
    /// synchronously, in registration order, and must not mutate core
    /// state.
    pub fn subscribe(&mut self, f: Subscriber) -> usize {
        let handle = self.next_handle;
        self.next_handle += 1;
        self.subscribers.push((handle, f));
        handle
    }

    /// Register an observer of cell transitions (the cell-change and
    /// new-neighbour channel).
    pub fn subscribe_cell_events(&mut self, f: CellSubscriber) -> usize {
        let handle = self.next_handle;
        self.next_handle += 1;
        self.cell_subscribers.push((handle, f));
        handle
    }

    pub fn unsubscribe(&mut self, handle: usize) -> bool {
        if let Some(slot) = self.subscribers.iter().position(|(h, _)| *h == handle) {
            self.subscribers.remove(slot);
            return true;
        }
        if let Some(slot) = self.cell_subscribers.iter().position(|(h, _)| *h == handle) {
            self.cell_subscribers.remove(slot);
            return true;
        }
        false
    }

    pub fn notify(&mut self, ev: &Event, cs: &ChangeSet) {
        for (_, f) in self.subscribers.iter_mut() {
            f(ev, cs);
        }
    }

    pub fn notify_cell_transition(&mut self, tr: &CellTransition) {
        for (_, f) in self.cell_subscribers.iter_mut() {
            f(tr);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bc::Boundary;
    use crate::core::{EventKind, Particle, Species};
    use crate::interactions::HardSphere;
    use crate::ranges::{IdPairRange, IdRange};

    fn fixture() -> (World, Dynamics, Vec<Interaction>, Vec<Local>, Vec<Global>, Vec<System>) {
        let particles = vec![
            Particle::new(0, [-2.0, 0.0, 0.0], [1.0, 0.0, 0.0]).unwrap(),
            Particle::new(1, [2.0, 0.0, 0.0], [-1.0, 0.0, 0.0]).unwrap(),
        ];
        let species = vec![Species::new("A", 1.0, IdRange::All).unwrap()];
        let w = World::new(particles, species, Boundary::Periodic, [10.0; 3], Some(1)).unwrap();
        let interactions = vec![Interaction::HardSphere(HardSphere::new(
            "bulk",
            IdPairRange::All,
            1.0,
            1.0,
        ))];
        (w, Dynamics::default(), interactions, vec![], vec![], vec![])
    }

    #[test]
    fn initialise_queues_the_pair_event() -> Result<()> {
        let (mut w, dynamics, ints, locals, globals, systems) = fixture();
        let mut sched = Scheduler::new();
        sched.initialise(&mut w, &dynamics, &ints, &locals, &globals, &systems)?;
        let (_, ev) = sched.next_event().expect("pair event expected");
        assert!((ev.time_f64() - 1.5).abs() < 1e-12);
        assert!(matches!(ev.source, EventSource::Interaction { p2: 1, .. }));
        Ok(())
    }

    #[test]
    fn counter_bump_drops_stale_partner_events() -> Result<()> {
        let (mut w, dynamics, ints, locals, globals, systems) = fixture();
        let mut sched = Scheduler::new();
        sched.initialise(&mut w, &dynamics, &ints, &locals, &globals, &systems)?;

        // Particle 1 "moves": bump its counter and clear only its own
        // list, leaving particle 0's queued event stale.
        sched.counters[1] += 1;
        sched.fel.clear_list(1);
        sched.fel.update(1);
        w.particles[1].v = [1.0, 0.0, 0.0];

        // The stale (0,1) event must be lazily deleted, leaving nothing.
        assert!(sched.next_event().is_none());
        Ok(())
    }

    #[test]
    fn subscribers_fire_in_registration_order() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let mut sched = Scheduler::new();
        let order = Arc::new(AtomicUsize::new(0));

        let o1 = order.clone();
        let h1 = sched.subscribe(Box::new(move |_, _| {
            o1.compare_exchange(0, 1, Ordering::SeqCst, Ordering::SeqCst)
                .ok();
        }));
        let o2 = order.clone();
        let _h2 = sched.subscribe(Box::new(move |_, _| {
            o2.compare_exchange(1, 2, Ordering::SeqCst, Ordering::SeqCst)
                .ok();
        }));

        let ev = Event::new(0.0, 0, EventSource::Local { local_id: 0 }, EventKind::Wall).unwrap();
        let cs = ChangeSet::new(EventKind::Wall);
        sched.notify(&ev, &cs);
        assert_eq!(order.load(Ordering::SeqCst), 2);

        assert!(sched.unsubscribe(h1));
        assert!(!sched.unsubscribe(h1));
    }
}
