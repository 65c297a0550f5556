use edmd::bc::Boundary;
use edmd::core::{Particle, Species, World};
use edmd::dynamics::Dynamics;
use edmd::error::Result;
use edmd::interactions::{HardSphere, Interaction};
use edmd::ranges::{IdPairRange, IdRange};
use edmd::systems::{Halt, System};
use edmd::{replex_swap, Simulation};

fn two_particle_sim(speed: f64, halt_at: f64) -> Result<Simulation> {
    let particles = vec![
        Particle::new(0, [-2.0, 0.0, 0.0], [speed, 0.0, 0.0])?,
        Particle::new(1, [2.0, 0.0, 0.0], [-speed, 0.0, 0.0])?,
    ];
    let species = vec![Species::new("A", 1.0, IdRange::All)?];
    let world = World::new(particles, species, Boundary::Periodic, [10.0; 3], Some(1))?;
    let mut sim = Simulation::new(world, Dynamics::default());
    sim.interactions.push(Interaction::HardSphere(HardSphere::new(
        "bulk",
        IdPairRange::All,
        1.0,
        1.0,
    )));
    sim.systems.push(System::Halt(Halt::new("tend", halt_at)));
    sim.initialise()?;
    Ok(sim)
}

/// After a swap the velocities of each replica are scaled by
/// sqrt(T_other / T_self): the kinetic energies exchange exactly, and
/// the queued collision times contract or dilate to match.
#[test]
fn swap_exchanges_the_ensembles() -> Result<()> {
    // Speeds 1 and 2: temperatures differ by a factor 4, so the scale
    // factors (2 and 1/2) are exact in floating point.
    let mut a = two_particle_sim(1.0, 100.0)?;
    let mut b = two_particle_sim(2.0, 50.0)?;

    let ke_a = a.world.kinetic_energy();
    let ke_b = b.world.kinetic_energy();

    replex_swap(&mut a, &mut b)?;

    assert_eq!(a.world.kinetic_energy(), ke_b);
    assert_eq!(b.world.kinetic_energy(), ke_a);
    assert_eq!(a.world.particles[0].v[0], 2.0);
    assert_eq!(b.world.particles[0].v[0], 1.0);

    // a's collision was queued for t = 1.5 at unit speed; at doubled
    // speed it must now sit at t = 0.75.
    let t_a = a.scheduler.peek_time().expect("collision queued");
    assert!((t_a - 0.75).abs() < 1e-12);
    let t_b = b.scheduler.peek_time().expect("collision queued");
    assert!((t_b - 1.5).abs() < 1e-12);

    // The halt events travelled with the system lists.
    assert_eq!(a.systems[0].next_time(), 50.0);
    assert_eq!(b.systems[0].next_time(), 100.0);
    Ok(())
}

/// A second swap restores both replicas exactly.
#[test]
fn double_swap_is_the_identity() -> Result<()> {
    let mut a = two_particle_sim(1.0, 100.0)?;
    let mut b = two_particle_sim(2.0, 50.0)?;

    let va: Vec<_> = a.world.particles.iter().map(|p| p.v).collect();
    let vb: Vec<_> = b.world.particles.iter().map(|p| p.v).collect();
    let ta = a.scheduler.peek_time();
    let tb = b.scheduler.peek_time();

    replex_swap(&mut a, &mut b)?;
    replex_swap(&mut a, &mut b)?;

    for (p, v) in a.world.particles.iter().zip(va.iter()) {
        assert_eq!(p.v, *v, "replica a velocity changed by a double swap");
    }
    for (p, v) in b.world.particles.iter().zip(vb.iter()) {
        assert_eq!(p.v, *v, "replica b velocity changed by a double swap");
    }
    assert_eq!(a.scheduler.peek_time(), ta);
    assert_eq!(b.scheduler.peek_time(), tb);
    assert_eq!(a.systems[0].next_time(), 100.0);
    assert_eq!(b.systems[0].next_time(), 50.0);
    Ok(())
}

/// The swapped replicas keep running correctly: the first collision of
/// the accelerated replica fires at its rescaled time.
#[test]
fn swapped_replica_resumes() -> Result<()> {
    let mut a = two_particle_sim(1.0, 100.0)?;
    let mut b = two_particle_sim(2.0, 50.0)?;
    replex_swap(&mut a, &mut b)?;

    assert!(a.run_next_event()?);
    assert!((a.world.system_time - 0.75).abs() < 1e-12);
    // Elastic exchange at doubled speed.
    assert_eq!(a.world.particles[0].v[0], -2.0);
    Ok(())
}
