//! Globals: event producers that may fire for any particle.

pub mod cells;
pub mod sentinel;

pub use cells::{CellList, CellTransition, OverlapPolicy};
pub use sentinel::PbcSentinel;

use crate::core::{EventKind, World};
use crate::dynamics::Dynamics;
use crate::ranges::IdRange;

/// Dispatch over the global registry's entry types.
#[derive(Debug, Clone)]
pub enum Global {
    Cells(CellList),
    Sentinel(PbcSentinel),
}

impl Global {
    pub fn name(&self) -> &str {
        match self {
            Global::Cells(g) => &g.name,
            Global::Sentinel(g) => &g.name,
        }
    }

    pub fn range(&self) -> &IdRange {
        match self {
            Global::Cells(g) => &g.range,
            Global::Sentinel(g) => &g.range,
        }
    }

    pub fn is_interaction(&self, pid: u32) -> bool {
        self.range().contains(pid)
    }

    pub fn xml_type(&self) -> &'static str {
        match self {
            Global::Cells(_) => "Cells",
            Global::Sentinel(_) => "PBCSentinel",
        }
    }

    /// Time-to-event and sub-kind for a particle; the cell list emits
    /// VirtualCell events, the sentinel plain virtual globals.
    pub fn get_event(&self, w: &World, dynamics: &Dynamics, pid: u32) -> (f64, EventKind) {
        match self {
            Global::Cells(g) => (g.crossing_time(w, dynamics, pid), EventKind::Cell),
            Global::Sentinel(g) => (g.event_time(w, dynamics, pid), EventKind::Virtual),
        }
    }

    pub fn is_virtual_cell(&self) -> bool {
        matches!(self, Global::Cells(_))
    }
}

/// The cell list in a global registry, if one is configured.
pub fn neighbour_list(globals: &[Global]) -> Option<&CellList> {
    globals.iter().find_map(|g| match g {
        Global::Cells(c) => Some(c),
        _ => None,
    })
}

pub fn neighbour_list_mut(globals: &mut [Global]) -> Option<&mut CellList> {
    globals.iter_mut().find_map(|g| match g {
        Global::Cells(c) => Some(c),
        _ => None,
    })
}
