//! Event-driven molecular dynamics.
//!
//! Instead of advancing particles by fixed time steps, the engine
//! computes the next physically-meaningful event (pair collision, wall
//! bounce, neighbour-cell crossing, scheduled system event), advances
//! the simulation exactly to that time, resolves the event, and
//! repeats. The analytic dynamics layer predicts event times in closed
//! form; a cell-grid neighbour list bounds the number of pair
//! predictions per event; the scheduler keeps the queue consistent as
//! particles move.

pub mod bc;
pub mod config;
pub mod core;
pub mod dynamics;
pub mod error;
pub mod globals;
pub mod interactions;
pub mod locals;
pub mod math;
pub mod plugins;
pub mod ranges;
pub mod scheduler;
pub mod sim;
pub mod systems;
pub mod units;

pub use error::{Error, Result};
pub use sim::{replex_swap, Simulation};
