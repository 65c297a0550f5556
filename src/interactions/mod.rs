//! Pair interactions and their registry.
//!
//! The registry is an ordered list; for a pair the first interaction
//! whose id-pair range accepts it is authoritative. Each interaction
//! predicts the earliest pair event through the dynamics layer and
//! executes the momentum update when it fires.

pub mod captures;
pub mod hardsphere;
pub mod squarewell;
pub mod stepped;

pub use captures::CaptureMap;
pub use hardsphere::{HardSphere, RoughHardSphere};
pub use squarewell::SquareWell;
pub use stepped::Stepped;

use crate::core::{ChangeSet, EventKind, World};
use crate::dynamics::Dynamics;
use crate::error::{Error, Result};
use crate::ranges::IdPairRange;

/// A predicted pair event: time-to-event relative to the particles'
/// synchronised state, plus the sub-kind to execute.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairEvent {
    pub dt: f64,
    pub kind: EventKind,
}

impl PairEvent {
    fn min(a: Option<Self>, b: Option<Self>) -> Option<Self> {
        match (a, b) {
            (Some(x), Some(y)) => Some(if y.dt < x.dt { y } else { x }),
            (x, None) => x,
            (None, y) => y,
        }
    }
}

/// Dispatch over the shipped interaction types.
#[derive(Debug, Clone)]
pub enum Interaction {
    HardSphere(HardSphere),
    RoughHardSphere(RoughHardSphere),
    SquareWell(SquareWell),
    Stepped(Stepped),
    /// Accepts a pair range but never predicts an event.
    Null { name: String, range: IdPairRange },
}

impl Interaction {
    pub fn name(&self) -> &str {
        match self {
            Interaction::HardSphere(i) => &i.name,
            Interaction::RoughHardSphere(i) => &i.name,
            Interaction::SquareWell(i) => &i.name,
            Interaction::Stepped(i) => &i.name,
            Interaction::Null { name, .. } => name,
        }
    }

    pub fn range(&self) -> &IdPairRange {
        match self {
            Interaction::HardSphere(i) => &i.range,
            Interaction::RoughHardSphere(i) => &i.range,
            Interaction::SquareWell(i) => &i.range,
            Interaction::Stepped(i) => &i.range,
            Interaction::Null { range, .. } => range,
        }
    }

    pub fn is_interaction(&self, p1: u32, p2: u32) -> bool {
        self.range().contains(p1, p2)
    }

    /// Furthest distance at which this interaction can produce an
    /// event; feeds the neighbour-list cell sizing.
    pub fn max_int_dist(&self) -> f64 {
        match self {
            Interaction::HardSphere(i) => i.diameter,
            Interaction::RoughHardSphere(i) => i.diameter,
            Interaction::SquareWell(i) => i.diameter * i.lambda,
            Interaction::Stepped(i) => i.outer_radius(),
            Interaction::Null { .. } => 0.0,
        }
    }

    /// Predict the earliest future event for an up-to-date pair.
    pub fn get_event(
        &self,
        w: &World,
        dynamics: &Dynamics,
        p1: u32,
        p2: u32,
    ) -> Option<PairEvent> {
        match self {
            Interaction::HardSphere(i) => i.get_event(w, dynamics, p1, p2),
            Interaction::RoughHardSphere(i) => i.get_event(w, dynamics, p1, p2),
            Interaction::SquareWell(i) => i.get_event(w, dynamics, p1, p2),
            Interaction::Stepped(i) => i.get_event(w, dynamics, p1, p2),
            Interaction::Null { .. } => None,
        }
    }

    /// Execute a fired event; both particles are at the contact time.
    pub fn run_event(
        &mut self,
        w: &mut World,
        dynamics: &Dynamics,
        p1: u32,
        p2: u32,
        kind: EventKind,
    ) -> Result<ChangeSet> {
        match self {
            Interaction::HardSphere(i) => i.run_event(w, dynamics, p1, p2, kind),
            Interaction::RoughHardSphere(i) => i.run_event(w, dynamics, p1, p2, kind),
            Interaction::SquareWell(i) => i.run_event(w, dynamics, p1, p2, kind),
            Interaction::Stepped(i) => i.run_event(w, dynamics, p1, p2, kind),
            Interaction::Null { name, .. } => Err(Error::State(format!(
                "null interaction \"{name}\" asked to run an event"
            ))),
        }
    }

    /// Self-test one pair; returns a diagnostic when the stored state
    /// contradicts the geometry.
    pub fn validate_state(
        &self,
        w: &World,
        dynamics: &Dynamics,
        p1: u32,
        p2: u32,
    ) -> Option<String> {
        match self {
            Interaction::HardSphere(i) => i.validate_state(w, dynamics, p1, p2),
            Interaction::RoughHardSphere(i) => i.validate_state(w, dynamics, p1, p2),
            Interaction::SquareWell(i) => i.validate_state(w, dynamics, p1, p2),
            Interaction::Stepped(i) => i.validate_state(w, dynamics, p1, p2),
            Interaction::Null { .. } => None,
        }
    }

    pub fn capture_map(&self) -> Option<&CaptureMap> {
        match self {
            Interaction::SquareWell(i) => Some(&i.captures),
            Interaction::Stepped(i) => Some(&i.captures),
            _ => None,
        }
    }

    pub fn capture_map_mut(&mut self) -> Option<&mut CaptureMap> {
        match self {
            Interaction::SquareWell(i) => Some(&mut i.captures),
            Interaction::Stepped(i) => Some(&mut i.captures),
            _ => None,
        }
    }

    /// Whether the pair is geometrically inside the capture shell
    /// right now; `0` for non-capture interactions.
    pub fn capture_test(&self, w: &World, p1: u32, p2: u32) -> u32 {
        match self {
            Interaction::SquareWell(i) => i.capture_test(w, p1, p2),
            Interaction::Stepped(i) => i.capture_test(w, p1, p2),
            _ => 0,
        }
    }

    /// Internal (potential) energy held by this interaction's captures.
    pub fn internal_energy(&self) -> f64 {
        match self {
            Interaction::SquareWell(i) => i.internal_energy(),
            Interaction::Stepped(i) => i.internal_energy(),
            _ => 0.0,
        }
    }

    pub fn xml_type(&self) -> &'static str {
        match self {
            Interaction::HardSphere(_) => "HardSphere",
            Interaction::RoughHardSphere(_) => "RoughHardSphere",
            Interaction::SquareWell(_) => "SquareWell",
            Interaction::Stepped(_) => "Stepped",
            Interaction::Null { .. } => "Null",
        }
    }
}

/// Index of the authoritative interaction for a pair.
pub fn interaction_for(interactions: &[Interaction], p1: u32, p2: u32) -> Result<usize> {
    interactions
        .iter()
        .position(|i| i.is_interaction(p1, p2))
        .ok_or_else(|| {
            Error::State(format!(
                "no interaction defined for the pair ({p1}, {p2})"
            ))
        })
}

/// The largest interaction range over the whole registry.
pub fn max_interaction_range(interactions: &[Interaction]) -> f64 {
    interactions
        .iter()
        .map(|i| i.max_int_dist())
        .fold(0.0, f64::max)
}

/// Rebuild every capture map from geometry, pair by pair, skipping maps
/// that were loaded from the configuration file.
pub fn init_capture_maps(
    interactions: &mut [Interaction],
    w: &World,
    force: bool,
) -> Result<()> {
    let n = w.n() as u32;
    for idx in 0..interactions.len() {
        let needs_build = {
            let map = match interactions[idx].capture_map() {
                Some(m) => m,
                None => continue,
            };
            force || !map.was_loaded()
        };
        if !needs_build {
            continue;
        }
        if let Some(m) = interactions[idx].capture_map_mut() {
            m.clear();
        }
        for p1 in 0..n {
            for p2 in (p1 + 1)..n {
                if interaction_for(interactions, p1, p2)? != idx {
                    continue;
                }
                let val = interactions[idx].capture_test(w, p1, p2);
                if val != 0 {
                    if let Some(m) = interactions[idx].capture_map_mut() {
                        m.insert(p1, p2, val);
                    }
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ranges::IdRange;

    #[test]
    fn first_matching_interaction_wins() {
        let ints = vec![
            Interaction::Null {
                name: "bonded".into(),
                range: IdPairRange::Pair(0, 1),
            },
            Interaction::HardSphere(HardSphere::new(
                "bulk",
                IdPairRange::All,
                1.0,
                1.0,
            )),
        ];
        assert_eq!(interaction_for(&ints, 0, 1).unwrap(), 0);
        assert_eq!(interaction_for(&ints, 1, 0).unwrap(), 0);
        assert_eq!(interaction_for(&ints, 0, 2).unwrap(), 1);
    }

    #[test]
    fn missing_pair_is_a_state_error() {
        let ints = vec![Interaction::HardSphere(HardSphere::new(
            "bulk",
            IdPairRange::Ranges(
                IdRange::Span { start: 0, end: 2 },
                IdRange::Span { start: 0, end: 2 },
            ),
            1.0,
            1.0,
        ))];
        assert!(interaction_for(&ints, 0, 5).is_err());
    }

    #[test]
    fn max_range_spans_the_registry() {
        let ints = vec![
            Interaction::HardSphere(HardSphere::new("a", IdPairRange::All, 1.0, 1.0)),
            Interaction::SquareWell(SquareWell::new(
                "b",
                IdPairRange::All,
                1.0,
                1.5,
                1.0,
                1.0,
            )),
        ];
        assert!((max_interaction_range(&ints) - 1.5).abs() < 1e-12);
    }
}
