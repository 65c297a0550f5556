//! Configuration and observables writer.
//!
//! The writer mirrors the loader element for element so a load,
//! write, reload, rewrite cycle is byte-stable. All floats go out in
//! scientific notation at the crate's write precision.

use crate::config::{fmt_float, write_string, CONFIG_VERSION};
use crate::error::{Error, Result};
use crate::globals::{neighbour_list, Global};
use crate::interactions::{CaptureMap, Interaction};
use crate::locals::Local;
use crate::math::Vec3;
use crate::ranges::{IdPairRange, IdRange};
use crate::sim::Simulation;
use crate::systems::System;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event as XmlEvent};
use quick_xml::Writer;
use std::path::Path;

struct ConfigWriter {
    w: Writer<Vec<u8>>,
    round: bool,
}

impl ConfigWriter {
    fn new(round: bool) -> Self {
        Self {
            w: Writer::new_with_indent(Vec::new(), b' ', 2),
            round,
        }
    }

    fn fmt(&self, v: f64) -> String {
        fmt_float(v, self.round)
    }

    fn start(&mut self, name: &str, attrs: &[(&str, String)]) -> Result<()> {
        let mut e = BytesStart::new(name);
        for (k, v) in attrs {
            e.push_attribute((*k, v.as_str()));
        }
        self.w
            .write_event(XmlEvent::Start(e))
            .map_err(Error::from)
    }

    fn empty(&mut self, name: &str, attrs: &[(&str, String)]) -> Result<()> {
        let mut e = BytesStart::new(name);
        for (k, v) in attrs {
            e.push_attribute((*k, v.as_str()));
        }
        self.w
            .write_event(XmlEvent::Empty(e))
            .map_err(Error::from)
    }

    fn end(&mut self, name: &str) -> Result<()> {
        self.w
            .write_event(XmlEvent::End(BytesEnd::new(name)))
            .map_err(Error::from)
    }

    fn vec3_elem(&mut self, name: &str, v: &Vec3) -> Result<()> {
        let attrs = [
            ("x", self.fmt(v[0])),
            ("y", self.fmt(v[1])),
            ("z", self.fmt(v[2])),
        ];
        self.empty(name, &attrs)
    }

    fn id_range(&mut self, range: &IdRange) -> Result<()> {
        match range {
            IdRange::All => self.empty("IDRange", &[("Type", "All".into())]),
            IdRange::Single(id) => self.empty(
                "IDRange",
                &[("Type", "Single".into()), ("ID", id.to_string())],
            ),
            IdRange::Span { start, end } => self.empty(
                "IDRange",
                &[
                    ("Type", "Ranged".into()),
                    ("Start", start.to_string()),
                    ("End", (end - 1).to_string()),
                ],
            ),
            IdRange::List(ids) => {
                self.start("IDRange", &[("Type", "List".into())])?;
                for id in ids {
                    self.empty("ID", &[("val", id.to_string())])?;
                }
                self.end("IDRange")
            }
        }
    }

    fn id_pair_range(&mut self, range: &IdPairRange) -> Result<()> {
        match range {
            IdPairRange::All => self.empty("IDPairRange", &[("Type", "All".into())]),
            IdPairRange::Pair(a, b) => self.empty(
                "IDPairRange",
                &[
                    ("Type", "Pair".into()),
                    ("ID1", a.to_string()),
                    ("ID2", b.to_string()),
                ],
            ),
            IdPairRange::Ranges(r1, r2) => {
                self.start("IDPairRange", &[("Type", "TwoRanges".into())])?;
                self.start("Range1", &[])?;
                self.id_range(r1)?;
                self.end("Range1")?;
                self.start("Range2", &[])?;
                self.id_range(r2)?;
                self.end("Range2")?;
                self.end("IDPairRange")
            }
        }
    }

    fn capture_map(&mut self, map: &CaptureMap, with_val: bool) -> Result<()> {
        self.start("CaptureMap", &[])?;
        for ((id1, id2), val) in map.iter() {
            let mut attrs = vec![("ID1", id1.to_string()), ("ID2", id2.to_string())];
            if with_val {
                attrs.push(("val", val.to_string()));
            }
            self.empty("Pair", &attrs)?;
        }
        self.end("CaptureMap")
    }

    fn interaction(&mut self, interaction: &Interaction, ul: f64) -> Result<()> {
        let type_attr = ("Type", interaction.xml_type().to_string());
        let name_attr = ("Name", interaction.name().to_string());
        match interaction {
            Interaction::HardSphere(i) => {
                let attrs = [
                    type_attr,
                    ("Diameter", self.fmt(i.diameter * ul)),
                    ("Elasticity", self.fmt(i.elasticity)),
                    name_attr,
                ];
                self.start("Interaction", &attrs)?;
                self.id_pair_range(&i.range)?;
            }
            Interaction::RoughHardSphere(i) => {
                let attrs = [
                    type_attr,
                    ("Diameter", self.fmt(i.diameter * ul)),
                    ("Elasticity", self.fmt(i.elasticity)),
                    ("TangentialElasticity", self.fmt(i.tangential_elasticity)),
                    name_attr,
                ];
                self.start("Interaction", &attrs)?;
                self.id_pair_range(&i.range)?;
            }
            Interaction::SquareWell(i) => {
                let attrs = [
                    type_attr,
                    ("Diameter", self.fmt(i.diameter * ul)),
                    ("Elasticity", self.fmt(i.elasticity)),
                    ("Lambda", self.fmt(i.lambda)),
                    ("WellDepth", self.fmt(i.well_depth)),
                    name_attr,
                ];
                self.start("Interaction", &attrs)?;
                self.id_pair_range(&i.range)?;
                self.capture_map(&i.captures, false)?;
            }
            Interaction::Stepped(i) => {
                self.start("Interaction", &[type_attr, name_attr])?;
                self.id_pair_range(&i.range)?;
                for (r, e) in i.steps.iter() {
                    let attrs = [("R", self.fmt(r * ul)), ("E", self.fmt(*e))];
                    self.empty("Step", &attrs)?;
                }
                self.capture_map(&i.captures, true)?;
            }
            Interaction::Null { range, .. } => {
                self.start("Interaction", &[type_attr, name_attr])?;
                self.id_pair_range(range)?;
            }
        }
        self.end("Interaction")
    }

    fn local(&mut self, local: &Local, ul: f64) -> Result<()> {
        let type_attr = ("Type", local.xml_type().to_string());
        let name_attr = ("Name", local.name().to_string());
        match local {
            Local::Wall(l) => {
                let mut attrs = vec![
                    type_attr,
                    name_attr,
                    ("Elasticity", self.fmt(l.elasticity)),
                    ("Diameter", self.fmt(l.diameter * ul)),
                ];
                if let Some(t) = l.temperature {
                    attrs.push(("Temperature", self.fmt(t)));
                }
                self.start("Local", &attrs)?;
                self.id_range(&l.range)?;
                self.vec3_elem("Norm", &l.normal)?;
                let origin = [l.origin[0] * ul, l.origin[1] * ul, l.origin[2] * ul];
                self.vec3_elem("Origin", &origin)?;
            }
            Local::RoughWall(l) => {
                let attrs = [
                    type_attr,
                    name_attr,
                    ("Elasticity", self.fmt(l.elasticity)),
                    ("TangentialElasticity", self.fmt(l.tangential_elasticity)),
                    ("Diameter", self.fmt(l.diameter * ul)),
                ];
                self.start("Local", &attrs)?;
                self.id_range(&l.range)?;
                self.vec3_elem("Norm", &l.normal)?;
                let origin = [l.origin[0] * ul, l.origin[1] * ul, l.origin[2] * ul];
                self.vec3_elem("Origin", &origin)?;
            }
        }
        self.end("Local")
    }

    fn global(&mut self, global: &Global, ul: f64) -> Result<()> {
        let type_attr = ("Type", global.xml_type().to_string());
        let name_attr = ("Name", global.name().to_string());
        match global {
            Global::Cells(c) => {
                let mut attrs = vec![type_attr, name_attr];
                if c.max_range > 0.0 {
                    attrs.push(("NeighbourhoodRange", self.fmt(c.max_range * ul)));
                }
                attrs.push((
                    "Overlap",
                    match c.policy {
                        crate::globals::OverlapPolicy::Compact => "Compact".into(),
                        crate::globals::OverlapPolicy::Loose => "Loose".into(),
                    },
                ));
                self.start("Global", &attrs)?;
                self.id_range(&c.range)?;
            }
            Global::Sentinel(s) => {
                self.start("Global", &[type_attr, name_attr])?;
                self.id_range(&s.range)?;
            }
        }
        self.end("Global")
    }

    fn system(&mut self, system: &System, ut: f64) -> Result<()> {
        let type_attr = ("Type", system.xml_type().to_string());
        let name_attr = ("Name", system.name().to_string());
        match system {
            System::Halt(s) => {
                if s.next_time.is_finite() {
                    let attrs = [type_attr, ("Time", self.fmt(s.next_time * ut)), name_attr];
                    self.empty("System", &attrs)?;
                }
                Ok(())
            }
            System::Snapshot(s) => {
                let attrs = [type_attr, ("Period", self.fmt(s.period * ut)), name_attr];
                self.empty("System", &attrs)
            }
            System::Rescale(s) => {
                let mut attrs = vec![type_attr, ("kT", self.fmt(s.kt))];
                if let Some(step) = s.timestep {
                    attrs.push(("TimeStep", self.fmt(step * ut)));
                }
                if let Some(freq) = s.frequency {
                    attrs.push(("Freq", freq.to_string()));
                }
                attrs.push(name_attr);
                self.empty("System", &attrs)
            }
            System::AndersenThermostat(s) => {
                let attrs = [
                    type_attr,
                    ("Temperature", self.fmt(s.temperature)),
                    ("MFT", self.fmt(s.mean_free_time * ut)),
                    name_attr,
                ];
                self.empty("System", &attrs)
            }
            System::Umbrella(s) => {
                let mut attrs = vec![
                    type_attr,
                    ("a", self.fmt(s.a)),
                    ("b", self.fmt(s.b)),
                    ("delU", self.fmt(s.del_u)),
                ];
                if s.ulevel_set {
                    attrs.push(("currentulevel", s.ulevel.to_string()));
                }
                attrs.push(name_attr);
                self.start("System", &attrs)?;
                self.start("Range1", &[])?;
                self.id_range(&s.range1)?;
                self.end("Range1")?;
                self.start("Range2", &[])?;
                self.id_range(&s.range2)?;
                self.end("Range2")?;
                self.end("System")
            }
        }
    }

    fn finish(self) -> Result<String> {
        String::from_utf8(self.w.into_inner())
            .map_err(|e| Error::Config(format!("writer produced invalid UTF-8: {e}")))
    }
}

/// Serialise a simulation to the configuration schema.
pub fn write_config_string(sim: &Simulation, round: bool) -> Result<String> {
    let mut cw = ConfigWriter::new(round);
    let units = sim.world.units;
    let (ul, ut) = (units.length, units.time);

    cw.w.write_event(XmlEvent::Decl(BytesDecl::new("1.0", None, None)))?;
    cw.start("DynamOconfig", &[("version", CONFIG_VERSION.into())])?;
    cw.start("Simulation", &[])?;

    let scheduler_type = if neighbour_list(&sim.globals).is_some() {
        "NeighbourList"
    } else {
        "Dumb"
    };
    cw.empty("Scheduler", &[("Type", scheduler_type.into())])?;

    let size = [
        sim.world.primary_cell[0] * ul,
        sim.world.primary_cell[1] * ul,
        sim.world.primary_cell[2] * ul,
    ];
    cw.vec3_elem("SimulationSize", &size)?;

    cw.start("Genus", &[])?;
    for sp in &sim.world.species {
        let attrs = [("Mass", cw.fmt(sp.mass)), ("Name", sp.name.clone())];
        cw.start("Species", &attrs)?;
        cw.id_range(&sp.range)?;
        cw.end("Species")?;
    }
    cw.end("Genus")?;

    match &sim.world.bc {
        crate::bc::Boundary::LeesEdwards { shear_rate, .. } => {
            let attrs = [
                ("Type", sim.world.bc.tag().to_string()),
                ("ShearRate", cw.fmt(*shear_rate)),
            ];
            cw.empty("BC", &attrs)?;
        }
        other => cw.empty("BC", &[("Type", other.tag().into())])?,
    }

    cw.empty("Topology", &[])?;

    cw.start("Interactions", &[])?;
    for interaction in &sim.interactions {
        cw.interaction(interaction, ul)?;
    }
    cw.end("Interactions")?;

    cw.start("Locals", &[])?;
    for local in &sim.locals {
        cw.local(local, ul)?;
    }
    cw.end("Locals")?;

    cw.start("Globals", &[])?;
    for global in &sim.globals {
        cw.global(global, ul)?;
    }
    cw.end("Globals")?;

    cw.start("SystemEvents", &[])?;
    for system in &sim.systems {
        cw.system(system, ut)?;
    }
    cw.end("SystemEvents")?;

    cw.empty("Dynamics", &[("Type", sim.dynamics.tag().into())])?;
    cw.end("Simulation")?;

    cw.start("ParticleData", &[])?;
    for p in &sim.world.particles {
        cw.start("Pt", &[("ID", p.id.to_string())])?;
        let pos = [p.r[0] * ul, p.r[1] * ul, p.r[2] * ul];
        cw.vec3_elem("P", &pos)?;
        let vel = [
            p.v[0] * ul / ut,
            p.v[1] * ul / ut,
            p.v[2] * ul / ut,
        ];
        cw.vec3_elem("V", &vel)?;
        if let Some(omega) = &sim.world.omega {
            cw.vec3_elem("W", &omega[p.id as usize])?;
        }
        cw.end("Pt")?;
    }
    cw.end("ParticleData")?;
    cw.end("DynamOconfig")?;

    let mut out = cw.finish()?;
    out.push('\n');
    Ok(out)
}

/// Write the configuration to a file, compressing by extension.
pub fn write_config_file(sim: &Simulation, path: &Path) -> Result<()> {
    let data = write_config_string(sim, sim.round_output)?;
    write_string(path, &data)
}

/// Serialise the observable summary written next to snapshots.
pub fn write_observables_string(sim: &Simulation) -> Result<String> {
    let mut cw = ConfigWriter::new(sim.round_output);
    cw.w.write_event(XmlEvent::Decl(BytesDecl::new("1.0", None, None)))?;
    cw.start("OutputData", &[])?;
    let momentum = sim.world.momentum();
    let attrs: Vec<(&str, String)> = vec![
        ("SystemTime", cw.fmt(sim.world.system_time)),
        ("EventCount", sim.world.event_count.to_string()),
        ("KineticEnergy", cw.fmt(sim.world.kinetic_energy())),
        ("InternalEnergy", cw.fmt(sim.internal_energy())),
        ("Temperature", cw.fmt(sim.world.temperature())),
    ];
    cw.empty("Misc", &attrs)?;
    cw.vec3_elem("Momentum", &momentum)?;
    cw.end("OutputData")?;
    let mut out = cw.finish()?;
    out.push('\n');
    Ok(out)
}

pub fn write_observables_file(sim: &Simulation, path: &Path) -> Result<()> {
    let data = write_observables_string(sim)?;
    write_string(path, &data)
}
