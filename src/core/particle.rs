use crate::error::{Error, Result};
use crate::math::{nrm2, Vec3};
use crate::ranges::IdRange;

/// A point particle under ballistic free flight.
///
/// Fields:
/// - `id`: stable identifier
/// - `r`: position at the particle's local clock
/// - `v`: velocity
/// - `clock`: simulation time at which `r` was last synchronised
///
/// Between `clock` and the global clock the true position is obtained
/// by streaming `r + v * (t - clock)`. Mass lives on the species,
/// diameters on the interactions.
#[derive(Debug, Clone)]
pub struct Particle {
    pub id: u32,
    pub r: Vec3,
    pub v: Vec3,
    pub clock: f64,
}

impl Particle {
    /// Create a particle after validating that all components are finite.
    pub fn new(id: u32, r: Vec3, v: Vec3) -> Result<Self> {
        if !r.iter().all(|x| x.is_finite()) {
            return Err(Error::Config(format!("particle {id}: position must be finite")));
        }
        if !v.iter().all(|x| x.is_finite()) {
            return Err(Error::Config(format!("particle {id}: velocity must be finite")));
        }
        Ok(Self {
            id,
            r,
            v,
            clock: 0.0,
        })
    }

    /// Kinetic energy given the particle's mass.
    #[inline]
    pub fn kinetic_energy(&self, mass: f64) -> f64 {
        0.5 * mass * nrm2(&self.v)
    }
}

/// A disjoint partition of the particle ids with shared properties.
#[derive(Debug, Clone)]
pub struct Species {
    pub name: String,
    pub mass: f64,
    pub range: IdRange,
}

impl Species {
    pub fn new(name: impl Into<String>, mass: f64, range: IdRange) -> Result<Self> {
        if !mass.is_finite() || mass <= 0.0 {
            return Err(Error::Config("species mass must be finite and > 0".into()));
        }
        Ok(Self {
            name: name.into(),
            mass,
            range,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_particle_ok() -> Result<()> {
        let p = Particle::new(1, [0.0, 1.0, 2.0], [2.0, -3.0, 0.5])?;
        assert_eq!(p.id, 1);
        assert_eq!(p.clock, 0.0);
        Ok(())
    }

    #[test]
    fn non_finite_components_rejected() {
        assert!(Particle::new(0, [f64::NAN, 0.0, 0.0], [0.0; 3]).is_err());
        assert!(Particle::new(0, [0.0; 3], [f64::INFINITY, 0.0, 0.0]).is_err());
    }

    #[test]
    fn kinetic_energy_uses_species_mass() -> Result<()> {
        // v = (3,4,0), |v|^2 = 25; KE = 0.5 * m * 25
        let p = Particle::new(7, [0.0; 3], [3.0, 4.0, 0.0])?;
        assert!((p.kinetic_energy(2.0) - 25.0).abs() < 1e-12);
        Ok(())
    }

    #[test]
    fn species_rejects_bad_mass() {
        assert!(Species::new("A", 0.0, IdRange::All).is_err());
        assert!(Species::new("A", f64::NAN, IdRange::All).is_err());
        assert!(Species::new("A", 1.0, IdRange::All).is_ok());
    }
}
