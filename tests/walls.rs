use edmd::bc::Boundary;
use edmd::core::{EventKind, Particle, Species, World};
use edmd::dynamics::Dynamics;
use edmd::error::Result;
use edmd::locals::{Local, Wall};
use edmd::ranges::IdRange;
use edmd::Simulation;

fn single_particle_sim(r: [f64; 3], v: [f64; 3], wall: Local) -> Result<Simulation> {
    let particles = vec![Particle::new(0, r, v)?];
    let species = vec![Species::new("A", 1.0, IdRange::All)?];
    let world = World::new(particles, species, Boundary::None, [10.0; 3], Some(3))?;
    let mut sim = Simulation::new(world, Dynamics::default());
    sim.locals.push(wall);
    sim.initialise()?;
    Ok(sim)
}

/// A particle at y = 0.4 moving +y against a wall at y = 0.5 with
/// normal -y and unit restitution: local event at t = 0.1, velocity
/// reflected.
#[test]
fn wall_bounce_scenario() -> Result<()> {
    let mut sim = single_particle_sim(
        [0.0, 0.4, 0.0],
        [0.0, 1.0, 0.0],
        Local::Wall(Wall {
            name: "top".into(),
            range: IdRange::All,
            origin: [0.0, 0.5, 0.0],
            normal: [0.0, -1.0, 0.0],
            elasticity: 1.0,
            diameter: 0.0,
            temperature: None,
        }),
    )?;

    let ke0 = sim.world.kinetic_energy();
    sim.run_next_event()?;

    assert!(
        (sim.world.system_time - 0.1).abs() < 1e-12,
        "bounce expected at t = 0.1, got {}",
        sim.world.system_time
    );
    assert!((sim.world.particles[0].v[1] + 1.0).abs() < 1e-12);
    assert!((sim.world.kinetic_energy() - ke0).abs() < 1e-12);
    assert_eq!(sim.world.event_count, 1);
    Ok(())
}

/// Two opposing elastic walls keep a particle bouncing forever; the
/// clock stays monotone and the speed is preserved.
#[test]
fn particle_bounces_between_walls() -> Result<()> {
    let particles = vec![Particle::new(0, [0.0, 0.0, 0.0], [0.0, 1.0, 0.0])?];
    let species = vec![Species::new("A", 1.0, IdRange::All)?];
    let world = World::new(particles, species, Boundary::None, [10.0; 3], Some(3))?;
    let mut sim = Simulation::new(world, Dynamics::default());
    sim.locals.push(Local::Wall(Wall {
        name: "top".into(),
        range: IdRange::All,
        origin: [0.0, 2.0, 0.0],
        normal: [0.0, -1.0, 0.0],
        elasticity: 1.0,
        diameter: 0.0,
        temperature: None,
    }));
    sim.locals.push(Local::Wall(Wall {
        name: "bottom".into(),
        range: IdRange::All,
        origin: [0.0, -2.0, 0.0],
        normal: [0.0, 1.0, 0.0],
        elasticity: 1.0,
        diameter: 0.0,
        temperature: None,
    }));
    sim.initialise()?;

    let mut last = 0.0;
    for bounce in 0..10 {
        assert!(sim.run_next_event()?, "queue dried up at bounce {bounce}");
        assert!(sim.world.system_time > last);
        last = sim.world.system_time;
        assert!((sim.world.particles[0].v[1].abs() - 1.0).abs() < 1e-12);
    }
    assert_eq!(sim.world.event_count, 10);
    // Period: 2 time units to the first wall, then 4 per full crossing.
    assert!((sim.world.system_time - (2.0 + 9.0 * 4.0)).abs() < 1e-9);
    Ok(())
}

/// A thermal wall re-draws the velocity instead of reflecting it and
/// reports a GAUSSIAN change-set.
#[test]
fn thermal_wall_redraws() -> Result<()> {
    let mut sim = single_particle_sim(
        [0.0, 0.4, 0.0],
        [0.0, 1.0, 0.0],
        Local::Wall(Wall {
            name: "hot".into(),
            range: IdRange::All,
            origin: [0.0, 0.5, 0.0],
            normal: [0.0, -1.0, 0.0],
            elasticity: 1.0,
            diameter: 0.0,
            temperature: Some(4.0),
        }),
    )?;

    let (_, ev) = sim.scheduler.next_event().expect("wall event queued");
    assert_eq!(ev.kind, EventKind::Gaussian);
    sim.run_next_event()?;
    // Must leave the wall.
    assert!(sim.world.particles[0].v[1] < 0.0);
    Ok(())
}
