use crate::bc::Boundary;
use crate::core::particle::{Particle, Species};
use crate::error::{Error, Result};
use crate::math::{dot, nrm2, sub, Vec3, DIM};
use crate::units::Units;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// The shared simulation context: particle store, species partition,
/// boundary condition, clocks and RNG.
///
/// Every component takes the world as an explicit argument; there are
/// no back-pointers. The scheduler is the only caller that mutates it
/// between events.
#[derive(Debug)]
pub struct World {
    pub particles: Vec<Particle>,
    pub species: Vec<Species>,
    /// Particle id -> index into `species`.
    species_of: Vec<usize>,
    pub bc: Boundary,
    /// Primary cell extents.
    pub primary_cell: Vec3,
    pub units: Units,
    pub system_time: f64,
    pub event_count: u64,
    /// Termination threshold; the run loop stops once `event_count`
    /// reaches it.
    pub end_event_count: u64,
    pub rng: StdRng,
    /// When set, overlap detected at prediction time is a fatal
    /// diagnostic instead of a silently-tolerated state.
    pub overlap_debug: bool,
    /// Per-particle angular velocities; allocated lazily when a rough
    /// interaction or wall is configured.
    pub omega: Option<Vec<Vec3>>,
}

impl World {
    pub fn new(
        particles: Vec<Particle>,
        species: Vec<Species>,
        bc: Boundary,
        primary_cell: Vec3,
        seed: Option<u64>,
    ) -> Result<Self> {
        if !primary_cell.iter().all(|&l| l.is_finite() && l > 0.0) {
            return Err(Error::Config(
                "SimulationSize components must be finite and > 0".into(),
            ));
        }
        let rng: StdRng = match seed {
            Some(s) => SeedableRng::seed_from_u64(s),
            None => SeedableRng::seed_from_u64(rand::rng().random()),
        };
        let species_of = Self::build_species_index(&particles, &species)?;
        Ok(Self {
            particles,
            species,
            species_of,
            bc,
            primary_cell,
            units: Units::default(),
            system_time: 0.0,
            event_count: 0,
            end_event_count: u64::MAX,
            rng,
            overlap_debug: false,
            omega: None,
        })
    }

    /// Allocate zeroed angular-velocity storage if absent.
    pub fn ensure_spin(&mut self) {
        if self.omega.is_none() {
            self.omega = Some(vec![[0.0; DIM]; self.particles.len()]);
        }
    }

    /// Every particle must belong to exactly one species.
    fn build_species_index(particles: &[Particle], species: &[Species]) -> Result<Vec<usize>> {
        let n = particles.len() as u32;
        let mut index = vec![usize::MAX; particles.len()];
        for (sidx, sp) in species.iter().enumerate() {
            sp.range.validate(n)?;
            for id in sp.range.iter(n) {
                if index[id as usize] != usize::MAX {
                    return Err(Error::Config(format!(
                        "particle {id} is claimed by species \"{}\" and \"{}\"",
                        species[index[id as usize]].name, sp.name
                    )));
                }
                index[id as usize] = sidx;
            }
        }
        if let Some(id) = index.iter().position(|&s| s == usize::MAX) {
            return Err(Error::State(format!("particle {id} belongs to no species")));
        }
        Ok(index)
    }

    #[inline]
    pub fn n(&self) -> usize {
        self.particles.len()
    }

    #[inline]
    pub fn species_index_of(&self, id: u32) -> usize {
        self.species_of[id as usize]
    }

    #[inline]
    pub fn species_name_of(&self, id: u32) -> &str {
        &self.species[self.species_of[id as usize]].name
    }

    #[inline]
    pub fn mass_of(&self, id: u32) -> f64 {
        self.species[self.species_of[id as usize]].mass
    }

    /// Minimum-image separation `r1 - r2` at the particles' stored
    /// positions.
    pub fn separation(&self, p1: u32, p2: u32) -> Vec3 {
        let mut r12 = sub(
            &self.particles[p1 as usize].r,
            &self.particles[p2 as usize].r,
        );
        self.bc.apply(&mut r12, &self.primary_cell);
        r12
    }

    /// Minimum-image separation and relative velocity `(r1-r2, v1-v2)`.
    pub fn separation_and_velocity(&self, p1: u32, p2: u32) -> (Vec3, Vec3) {
        let a = &self.particles[p1 as usize];
        let b = &self.particles[p2 as usize];
        let mut r12 = sub(&a.r, &b.r);
        let mut v12 = sub(&a.v, &b.v);
        self.bc
            .apply_with_vel(&mut r12, &mut v12, &self.primary_cell);
        (r12, v12)
    }

    /// Total kinetic energy.
    pub fn kinetic_energy(&self) -> f64 {
        self.particles
            .iter()
            .map(|p| p.kinetic_energy(self.mass_of(p.id)))
            .sum()
    }

    /// Instantaneous temperature, `2 KE / (D N)`.
    pub fn temperature(&self) -> f64 {
        2.0 * self.kinetic_energy() / (DIM as f64 * self.n() as f64)
    }

    /// Total linear momentum.
    pub fn momentum(&self) -> Vec3 {
        let mut p = [0.0; DIM];
        for part in &self.particles {
            let m = self.mass_of(part.id);
            for k in 0..DIM {
                p[k] += m * part.v[k];
            }
        }
        p
    }

    /// Minimum-image distance squared between two particles.
    pub fn distance2(&self, p1: u32, p2: u32) -> f64 {
        nrm2(&self.separation(p1, p2))
    }

    /// Whether the pair is approaching at the stored state.
    pub fn approaching(&self, p1: u32, p2: u32) -> bool {
        let (r12, v12) = self.separation_and_velocity(p1, p2);
        dot(&r12, &v12) < 0.0
    }

    /// Request termination at the current event count.
    pub fn sim_shutdown(&mut self) {
        self.end_event_count = self.event_count;
    }
}
