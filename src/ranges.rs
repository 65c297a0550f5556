//! Particle-id selectors.
//!
//! Species, locals, globals and system events all name the particles
//! they act on through an [`IdRange`]; interactions select *pairs*
//! through an [`IdPairRange`]. Both mirror the typed `IDRange` /
//! `IDPairRange` elements of the configuration schema.

use crate::error::{Error, Result};

/// A set of particle ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdRange {
    /// Every particle.
    All,
    /// A single particle.
    Single(u32),
    /// The half-open id interval `[start, end)`.
    Span { start: u32, end: u32 },
    /// An explicit id list.
    List(Vec<u32>),
}

impl IdRange {
    pub fn contains(&self, id: u32) -> bool {
        match self {
            IdRange::All => true,
            IdRange::Single(s) => *s == id,
            IdRange::Span { start, end } => id >= *start && id < *end,
            IdRange::List(ids) => ids.contains(&id),
        }
    }

    /// Enumerate members given the total particle count.
    pub fn iter(&self, n: u32) -> Box<dyn Iterator<Item = u32> + '_> {
        match self {
            IdRange::All => Box::new(0..n),
            IdRange::Single(s) => Box::new(std::iter::once(*s)),
            IdRange::Span { start, end } => Box::new(*start..(*end).min(n)),
            IdRange::List(ids) => Box::new(ids.iter().copied()),
        }
    }

    pub fn len(&self, n: u32) -> usize {
        match self {
            IdRange::All => n as usize,
            IdRange::Single(_) => 1,
            IdRange::Span { start, end } => (*end).min(n).saturating_sub(*start) as usize,
            IdRange::List(ids) => ids.len(),
        }
    }

    pub fn is_empty(&self, n: u32) -> bool {
        self.len(n) == 0
    }

    /// Validate that every member id exists.
    pub fn validate(&self, n: u32) -> Result<()> {
        let bad = match self {
            IdRange::All => None,
            IdRange::Single(s) => (*s >= n).then_some(*s),
            IdRange::Span { start, end } => (*end > n || start > end).then_some(*end),
            IdRange::List(ids) => ids.iter().copied().find(|id| *id >= n),
        };
        match bad {
            Some(id) => Err(Error::Config(format!(
                "IDRange references particle {id} but only {n} particles are defined"
            ))),
            None => Ok(()),
        }
    }
}

/// A set of unordered particle-id pairs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdPairRange {
    /// Every distinct pair.
    All,
    /// Exactly one pair.
    Pair(u32, u32),
    /// Pairs with one id in each range (or both in the same range).
    Ranges(IdRange, IdRange),
}

impl IdPairRange {
    pub fn contains(&self, id1: u32, id2: u32) -> bool {
        match self {
            IdPairRange::All => true,
            IdPairRange::Pair(a, b) => {
                (id1, id2) == (*a, *b) || (id1, id2) == (*b, *a)
            }
            IdPairRange::Ranges(r1, r2) => {
                (r1.contains(id1) && r2.contains(id2)) || (r1.contains(id2) && r2.contains(id1))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_is_half_open() {
        let r = IdRange::Span { start: 2, end: 5 };
        assert!(!r.contains(1));
        assert!(r.contains(2));
        assert!(r.contains(4));
        assert!(!r.contains(5));
        assert_eq!(r.iter(10).collect::<Vec<_>>(), vec![2, 3, 4]);
    }

    #[test]
    fn validate_rejects_out_of_range_members() {
        let r = IdRange::List(vec![0, 3, 7]);
        assert!(r.validate(8).is_ok());
        assert!(r.validate(7).is_err());
    }

    #[test]
    fn pair_range_is_symmetric() {
        let p = IdPairRange::Pair(3, 9);
        assert!(p.contains(3, 9));
        assert!(p.contains(9, 3));
        assert!(!p.contains(3, 8));

        let rr = IdPairRange::Ranges(
            IdRange::Span { start: 0, end: 2 },
            IdRange::Span { start: 2, end: 4 },
        );
        assert!(rr.contains(1, 3));
        assert!(rr.contains(3, 1));
        assert!(!rr.contains(0, 1));
    }
}
