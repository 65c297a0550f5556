use edmd::config::{load, write};
use edmd::error::{Error, Result};

const CONFIG: &str = r#"<?xml version="1.0"?>
<DynamOconfig version="1.5.0">
  <Simulation>
    <Scheduler Type="NeighbourList"/>
    <SimulationSize x="10" y="10" z="10"/>
    <Genus>
      <Species Mass="1" Name="A">
        <IDRange Type="All"/>
      </Species>
    </Genus>
    <BC Type="PBC"/>
    <Topology/>
    <Interactions>
      <Interaction Type="SquareWell" Diameter="1" Elasticity="1" Lambda="1.5" WellDepth="1" Name="well">
        <IDPairRange Type="All"/>
        <CaptureMap>
          <Pair ID1="0" ID2="1"/>
        </CaptureMap>
      </Interaction>
    </Interactions>
    <Locals>
      <Local Type="Wall" Name="top" Elasticity="1" Diameter="0">
        <IDRange Type="All"/>
        <Norm x="0" y="-1" z="0"/>
        <Origin x="0" y="4.5" z="0"/>
      </Local>
    </Locals>
    <Globals>
      <Global Type="Cells" Name="nlist" NeighbourhoodRange="1.5">
        <IDRange Type="All"/>
      </Global>
    </Globals>
    <SystemEvents>
      <System Type="Halt" Time="100" Name="tend"/>
      <System Type="Snapshot" Period="5" Name="snap"/>
    </SystemEvents>
    <Dynamics Type="Newtonian"/>
  </Simulation>
  <ParticleData>
    <Pt ID="0">
      <P x="-0.6" y="0" z="0"/>
      <V x="1" y="0" z="0"/>
    </Pt>
    <Pt ID="1">
      <P x="0.6" y="0" z="0"/>
      <V x="-1" y="0" z="0"/>
    </Pt>
  </ParticleData>
</DynamOconfig>
"#;

/// Load, write, reload, rewrite: the second and third serialisations
/// must agree byte for byte when rounding is requested.
#[test]
fn write_back_is_byte_stable() -> Result<()> {
    let sim1 = load::load_config_str(CONFIG, Some(1))?;
    let text1 = write::write_config_string(&sim1, true)?;

    let sim2 = load::load_config_str(&text1, Some(1))?;
    let text2 = write::write_config_string(&sim2, true)?;

    assert_eq!(text1, text2, "round-trip must be byte-identical");
    Ok(())
}

/// The loaded registries survive the round trip semantically: same
/// particles, same capture map, same system events.
#[test]
fn round_trip_preserves_state() -> Result<()> {
    let sim1 = load::load_config_str(CONFIG, Some(1))?;
    let text = write::write_config_string(&sim1, false)?;
    let sim2 = load::load_config_str(&text, Some(1))?;

    assert_eq!(sim1.world.n(), sim2.world.n());
    for (a, b) in sim1.world.particles.iter().zip(sim2.world.particles.iter()) {
        assert_eq!(a.r, b.r);
        assert_eq!(a.v, b.v);
    }
    assert_eq!(sim1.interactions.len(), sim2.interactions.len());
    let map1 = sim1.interactions[0].capture_map().expect("capture map");
    let map2 = sim2.interactions[0].capture_map().expect("capture map");
    assert_eq!(map1, map2);
    assert!(map2.was_loaded(), "capture map must bypass the rebuild");
    assert_eq!(sim1.systems.len(), sim2.systems.len());
    assert_eq!(sim1.locals.len(), sim2.locals.len());
    assert_eq!(sim1.globals.len(), sim2.globals.len());
    Ok(())
}

/// A loaded configuration initialises and runs: the capture map was
/// seeded from the file, so the first pair event is a core collision.
#[test]
fn loaded_simulation_runs() -> Result<()> {
    let mut sim = load::load_config_str(CONFIG, Some(1))?;
    sim.initialise()?;
    let ke0 = sim.world.kinetic_energy();
    assert!(sim.run_next_event()?);
    // Core contact from separation 1.2 at closing speed 2.
    assert!((sim.world.system_time - 0.1).abs() < 1e-9);
    assert!((sim.world.kinetic_energy() - ke0).abs() < 1e-10);
    Ok(())
}

#[test]
fn version_mismatch_aborts_with_config_error() {
    let bad = CONFIG.replace("1.5.0", "1.4.0");
    let err = load::load_config_str(&bad, None).unwrap_err();
    assert!(matches!(err, Error::Config(_)));
    assert_eq!(err.exit_code(), 1);
}

#[test]
fn compressed_files_round_trip() -> Result<()> {
    let dir = std::env::temp_dir();
    let path = dir.join("edmd_roundtrip_test.xml.bz2");

    let sim = load::load_config_str(CONFIG, Some(1))?;
    write::write_config_file(&sim, &path)?;
    let sim2 = load::load_config_file(&path, Some(1))?;
    assert_eq!(sim.world.n(), sim2.world.n());
    std::fs::remove_file(&path).ok();
    Ok(())
}
