//! Foundational types of the event-driven engine: particles and
//! species, the event value objects, and the shared world context.

pub mod event;
pub mod particle;
pub mod world;

pub use event::{ChangeSet, Event, EventKind, EventSource, ParticleChange, NO_PARTICLE};
pub use particle::{Particle, Species};
pub use world::World;
