//! Uniform-grid neighbour list.
//!
//! Space is partitioned into a lattice of cells at least one
//! interaction range wide, so pair predictions only need the 27-cell
//! neighbourhood. Tracked residence cells are slightly *larger* than
//! the lattice spacing (the `lambda` overlap policy): a particle must
//! travel into the neighbouring cell by the overlap margin before a
//! crossing event fires, which damps event churn for particles
//! rattling on a boundary.

use crate::core::World;
use crate::dynamics::Dynamics;
use crate::error::{Error, Result};
use crate::math::{Vec3, DIM};
use crate::ranges::IdRange;

/// Overlap policy for the residence cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlapPolicy {
    /// `lambda = 0.9`: strong hysteresis, fewest crossing events.
    Compact,
    /// `lambda = 0.001`: residence tracks the lattice almost exactly.
    Loose,
}

impl OverlapPolicy {
    pub fn lambda(&self) -> f64 {
        match self {
            OverlapPolicy::Compact => 0.9,
            OverlapPolicy::Loose => 0.001,
        }
    }
}

/// What a cell-crossing execution did, for the scheduler's fan-out.
#[derive(Debug, Clone)]
pub struct CellTransition {
    pub pid: u32,
    pub old_cell: usize,
    pub new_cell: usize,
    /// Residents of the cells newly brought into the particle's
    /// 27-cell neighbourhood.
    pub new_neighbours: Vec<u32>,
}

#[derive(Debug, Clone)]
pub struct CellList {
    pub name: String,
    pub range: IdRange,
    /// Interaction range the grid must support; 0 means "derive from
    /// the interaction registry at initialisation".
    pub max_range: f64,
    pub policy: OverlapPolicy,
    counts: [usize; DIM],
    /// Lattice spacing per axis.
    widths: Vec3,
    /// Oversized residence-cell extents.
    cell_dimension: Vec3,
    /// Shift of the residence cells against the lattice.
    cell_offset: Vec3,
    /// Resident particles per cell, insertion-ordered.
    cells: Vec<Vec<u32>>,
    /// Particle id -> linear cell index.
    cell_of: Vec<usize>,
}

impl CellList {
    pub fn new(name: impl Into<String>, range: IdRange, max_range: f64, policy: OverlapPolicy) -> Self {
        Self {
            name: name.into(),
            range,
            max_range,
            policy,
            counts: [0; DIM],
            widths: [0.0; DIM],
            cell_dimension: [0.0; DIM],
            cell_offset: [0.0; DIM],
            cells: Vec::new(),
            cell_of: Vec::new(),
        }
    }

    #[inline]
    pub fn counts(&self) -> [usize; DIM] {
        self.counts
    }

    #[inline]
    pub fn cell_of(&self, pid: u32) -> usize {
        self.cell_of[pid as usize]
    }

    #[inline]
    fn linear(&self, c: [usize; DIM]) -> usize {
        (c[0] * self.counts[1] + c[1]) * self.counts[2] + c[2]
    }

    #[inline]
    pub fn coords(&self, idx: usize) -> [usize; DIM] {
        let z = idx % self.counts[2];
        let rest = idx / self.counts[2];
        [rest / self.counts[1], rest % self.counts[1], z]
    }

    /// Build the grid and place every particle. Fails under periodic
    /// boundaries when the primary cell cannot hold two interaction
    /// ranges on some axis.
    pub fn rebuild(&mut self, w: &World, max_range: f64) -> Result<()> {
        if max_range <= 0.0 {
            return Err(Error::State(
                "neighbour list needs a positive interaction range".into(),
            ));
        }
        self.max_range = max_range;
        let lambda = self.policy.lambda();

        for k in 0..DIM {
            let l = w.primary_cell[k];
            if w.bc.is_periodic() && l < 2.0 * max_range {
                return Err(Error::State(format!(
                    "primary cell extent {l} on axis {k} is below twice the \
                     interaction range {max_range}; the cell grid cannot support it"
                )));
            }
            let count = ((l / max_range).floor() as usize).max(1);
            self.counts[k] = count;
            self.widths[k] = l / count as f64;
            self.cell_dimension[k] = self.widths[k] + (self.widths[k] - max_range) * lambda;
            self.cell_offset[k] = -(self.widths[k] - max_range) * lambda * 0.5;
        }

        let n_cells = self.counts.iter().product();
        self.cells = vec![Vec::new(); n_cells];
        self.cell_of = vec![usize::MAX; w.n()];

        for pid in self.range.iter(w.n() as u32).collect::<Vec<_>>() {
            let idx = self.cell_index_of_position(w, &w.particles[pid as usize].r);
            self.cells[idx].push(pid);
            self.cell_of[pid as usize] = idx;
        }
        log::debug!(
            "cell grid {}x{}x{} rebuilt, {} particles, range {max_range}",
            self.counts[0],
            self.counts[1],
            self.counts[2],
            self.cell_of.iter().filter(|&&c| c != usize::MAX).count(),
        );
        Ok(())
    }

    /// Lattice cell containing a wrapped position.
    fn cell_index_of_position(&self, w: &World, pos: &Vec3) -> usize {
        let mut wrapped = *pos;
        w.bc.apply(&mut wrapped, &w.primary_cell);
        let mut c = [0usize; DIM];
        for k in 0..DIM {
            let rel = (wrapped[k] + 0.5 * w.primary_cell[k] - self.cell_offset[k]) / self.widths[k];
            let mut coord = rel.floor() as isize % self.counts[k] as isize;
            if coord < 0 {
                coord += self.counts[k] as isize;
            }
            c[k] = coord as usize;
        }
        self.linear(c)
    }

    /// Corner position of a residence cell, at the periodic image
    /// nearest the particle.
    fn cell_origin_for(&self, w: &World, idx: usize, pid: u32) -> Vec3 {
        let coords = self.coords(idx);
        let part = &w.particles[pid as usize];
        let mut origin = [0.0; DIM];
        for k in 0..DIM {
            let primary = coords[k] as f64 * self.widths[k] - 0.5 * w.primary_cell[k]
                + self.cell_offset[k];
            origin[k] = primary
                - w.primary_cell[k] * ((primary - part.r[k]) / w.primary_cell[k]).round();
        }
        origin
    }

    /// Time to the particle's next residence-cell boundary crossing.
    pub fn crossing_time(&self, w: &World, dynamics: &Dynamics, pid: u32) -> f64 {
        let origin = self.cell_origin_for(w, self.cell_of[pid as usize], pid);
        dynamics.square_cell_time(w, pid, &origin, &self.cell_dimension)
    }

    /// Execute a crossing: migrate the particle one cell along the
    /// exit axis and report the freshly-exposed neighbours.
    pub fn run_crossing(&mut self, w: &World, dynamics: &Dynamics, pid: u32) -> CellTransition {
        let old_cell = self.cell_of[pid as usize];
        let origin = self.cell_origin_for(w, old_cell, pid);
        let (axis, dir) = dynamics.square_cell_exit(w, pid, &origin, &self.cell_dimension);

        let mut coords = self.coords(old_cell);
        let count = self.counts[axis];
        coords[axis] = if dir > 0 {
            (coords[axis] + 1) % count
        } else {
            (coords[axis] + count - 1) % count
        };
        let new_cell = self.linear(coords);

        if let Some(slot) = self.cells[old_cell].iter().position(|&id| id == pid) {
            self.cells[old_cell].remove(slot);
        }
        self.cells[new_cell].push(pid);
        self.cell_of[pid as usize] = new_cell;

        // The face of cells two steps ahead along the exit axis enters
        // the 27-cell neighbourhood.
        let mut face_coords = coords;
        face_coords[axis] = if dir > 0 {
            (coords[axis] + 1) % count
        } else {
            (coords[axis] + count - 1) % count
        };
        let mut new_neighbours = Vec::new();
        let mut seen = Vec::with_capacity(9);
        let d1 = (axis + 1) % DIM;
        let d2 = (axis + 2) % DIM;
        for i in -1i32..=1 {
            for j in -1i32..=1 {
                let mut c = face_coords;
                c[d1] = offset_coord(face_coords[d1], i, self.counts[d1]);
                c[d2] = offset_coord(face_coords[d2], j, self.counts[d2]);
                let idx = self.linear(c);
                if seen.contains(&idx) {
                    continue;
                }
                seen.push(idx);
                new_neighbours.extend(self.cells[idx].iter().copied());
            }
        }

        CellTransition {
            pid,
            old_cell,
            new_cell,
            new_neighbours,
        }
    }

    /// The 27-cell neighbourhood of a particle, cell-major, in-cell
    /// insertion order. Includes the particle itself.
    pub fn neighbours_of(&self, pid: u32) -> Vec<u32> {
        self.neighbours_of_cell(self.cell_of[pid as usize])
    }

    /// The 27-cell neighbourhood of an arbitrary point.
    pub fn neighbours_of_point(&self, w: &World, point: &Vec3) -> Vec<u32> {
        self.neighbours_of_cell(self.cell_index_of_position(w, point))
    }

    fn neighbours_of_cell(&self, idx: usize) -> Vec<u32> {
        let centre = self.coords(idx);
        let mut out = Vec::with_capacity(32);
        let mut seen = Vec::with_capacity(27);
        for dx in -1i32..=1 {
            for dy in -1i32..=1 {
                for dz in -1i32..=1 {
                    let c = [
                        offset_coord(centre[0], dx, self.counts[0]),
                        offset_coord(centre[1], dy, self.counts[1]),
                        offset_coord(centre[2], dz, self.counts[2]),
                    ];
                    let cell = self.linear(c);
                    if seen.contains(&cell) {
                        continue;
                    }
                    seen.push(cell);
                    out.extend(self.cells[cell].iter().copied());
                }
            }
        }
        out
    }
}

#[inline]
fn offset_coord(coord: usize, delta: i32, count: usize) -> usize {
    (((coord as i32 + delta) % count as i32 + count as i32) % count as i32) as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bc::Boundary;
    use crate::core::{Particle, Species};

    fn grid_world(positions: &[Vec3]) -> World {
        let particles = positions
            .iter()
            .enumerate()
            .map(|(i, &r)| Particle::new(i as u32, r, [0.0; DIM]).unwrap())
            .collect();
        let species = vec![Species::new("A", 1.0, IdRange::All).unwrap()];
        World::new(particles, species, Boundary::Periodic, [10.0; DIM], Some(3)).unwrap()
    }

    fn loose_cells(w: &World) -> CellList {
        let mut cl = CellList::new("nlist", IdRange::All, 0.0, OverlapPolicy::Loose);
        cl.rebuild(w, 1.0).unwrap();
        cl
    }

    #[test]
    fn ten_cells_per_axis_at_unit_range() {
        let w = grid_world(&[[0.4, 0.0, 0.0]]);
        let cl = loose_cells(&w);
        assert_eq!(cl.counts(), [10, 10, 10]);
    }

    #[test]
    fn too_small_box_fails_under_pbc() {
        let w = grid_world(&[[0.0, 0.0, 0.0]]);
        let mut cl = CellList::new("nlist", IdRange::All, 0.0, OverlapPolicy::Loose);
        assert!(cl.rebuild(&w, 6.0).is_err());
    }

    #[test]
    fn crossing_scenario() {
        // Particle at (0.4, 0, 0) moving +x in a unit-cell grid: the
        // boundary at x = 1 is 0.6 away.
        let mut w = grid_world(&[[0.4, 0.0, 0.0], [2.4, 0.0, 0.0]]);
        w.particles[0].v = [1.0, 0.0, 0.0];
        let mut cl = loose_cells(&w);
        let dynamics = Dynamics::default();

        let dt = cl.crossing_time(&w, &dynamics, 0);
        assert!((dt - 0.6).abs() < 1e-9);

        let old_cell = cl.cell_of(0);
        dynamics.stream_particle(&mut w, 0, dt);
        let transition = cl.run_crossing(&w, &dynamics, 0);
        assert_eq!(transition.old_cell, old_cell);
        let old_coords = cl.coords(old_cell);
        let new_coords = cl.coords(transition.new_cell);
        assert_eq!(new_coords[0], (old_coords[0] + 1) % 10);
        assert_eq!(new_coords[1], old_coords[1]);

        // Particle 1 sits two cells ahead: it is a fresh neighbour.
        assert!(transition.new_neighbours.contains(&1));
    }

    #[test]
    fn neighbourhood_covers_adjacent_cells() {
        let w = grid_world(&[[0.5, 0.5, 0.5], [1.5, 0.5, 0.5], [4.5, 0.5, 0.5]]);
        let cl = loose_cells(&w);
        let nbrs = cl.neighbours_of(0);
        assert!(nbrs.contains(&0));
        assert!(nbrs.contains(&1));
        assert!(!nbrs.contains(&2));
    }

    #[test]
    fn neighbourhood_wraps_periodically() {
        let w = grid_world(&[[-4.5, 0.5, 0.5], [4.5, 0.5, 0.5]]);
        let cl = loose_cells(&w);
        let nbrs = cl.neighbours_of(0);
        assert!(nbrs.contains(&1), "periodic wrap must expose the far-side cell");
    }

    #[test]
    fn point_query_matches_particle_query() {
        let w = grid_world(&[[0.5, 0.5, 0.5], [1.5, 0.5, 0.5]]);
        let cl = loose_cells(&w);
        assert_eq!(cl.neighbours_of(0), cl.neighbours_of_point(&w, &[0.5, 0.5, 0.5]));
    }
}
