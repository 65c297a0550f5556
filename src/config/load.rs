//! Configuration reader.
//!
//! A small generic element tree is built from the quick-xml event
//! stream first; the typed registries are then interpreted out of the
//! tree. Type tags map onto constructors; an unknown tag is a
//! configuration error.

use crate::bc::Boundary;
use crate::config::{read_to_string, CONFIG_VERSION};
use crate::core::{Particle, Species, World};
use crate::dynamics::Dynamics;
use crate::error::{Error, Result};
use crate::globals::{CellList, Global, OverlapPolicy, PbcSentinel};
use crate::interactions::{HardSphere, Interaction, RoughHardSphere, SquareWell, Stepped};
use crate::locals::{unit_normal, Local, RoughWall, Wall};
use crate::math::Vec3;
use crate::ranges::{IdPairRange, IdRange};
use crate::sim::Simulation;
use crate::systems::{AndersenThermostat, Halt, Rescale, Snapshot, System, Umbrella};
use quick_xml::events::Event as XmlEvent;
use quick_xml::Reader;
use std::path::Path;

/// One element of the parsed document.
#[derive(Debug, Clone)]
pub struct XmlNode {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
}

impl XmlNode {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn req_attr(&self, name: &str) -> Result<&str> {
        self.attr(name).ok_or_else(|| {
            Error::Config(format!(
                "element <{}> is missing the required attribute \"{name}\"",
                self.name
            ))
        })
    }

    pub fn f64_attr(&self, name: &str) -> Result<f64> {
        let raw = self.req_attr(name)?;
        raw.parse().map_err(|_| {
            Error::Config(format!(
                "attribute \"{name}\" of <{}> is not a number: \"{raw}\"",
                self.name
            ))
        })
    }

    pub fn u64_attr(&self, name: &str) -> Result<u64> {
        let raw = self.req_attr(name)?;
        raw.parse().map_err(|_| {
            Error::Config(format!(
                "attribute \"{name}\" of <{}> is not an integer: \"{raw}\"",
                self.name
            ))
        })
    }

    pub fn u32_attr(&self, name: &str) -> Result<u32> {
        Ok(self.u64_attr(name)? as u32)
    }

    pub fn vec3(&self) -> Result<Vec3> {
        Ok([
            self.f64_attr("x")?,
            self.f64_attr("y")?,
            self.f64_attr("z")?,
        ])
    }

    pub fn child(&self, name: &str) -> Option<&XmlNode> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn req_child(&self, name: &str) -> Result<&XmlNode> {
        self.child(name).ok_or_else(|| {
            Error::Config(format!(
                "element <{}> is missing the required child <{name}>",
                self.name
            ))
        })
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlNode> {
        self.children.iter().filter(move |c| c.name == name)
    }
}

/// Parse a document into its root element.
pub fn parse_document(xml: &str) -> Result<XmlNode> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<XmlNode> = Vec::new();
    let mut root = None;

    loop {
        match reader.read_event()? {
            XmlEvent::Start(e) => {
                stack.push(node_from(&e)?);
            }
            XmlEvent::Empty(e) => {
                let node = node_from(&e)?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(node),
                    None => root = Some(node),
                }
            }
            XmlEvent::End(_) => {
                let node = stack.pop().ok_or_else(|| {
                    Error::Config("unbalanced closing tag in configuration".into())
                })?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(node),
                    None => root = Some(node),
                }
            }
            XmlEvent::Eof => break,
            _ => {}
        }
    }
    root.ok_or_else(|| Error::Config("configuration file holds no XML element".into()))
}

fn node_from(e: &quick_xml::events::BytesStart) -> Result<XmlNode> {
    let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
    let mut attrs = Vec::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|err| {
            Error::Config(format!("malformed attribute in <{name}>: {err}"))
        })?;
        attrs.push((
            String::from_utf8_lossy(attr.key.as_ref()).to_string(),
            attr.unescape_value()?.to_string(),
        ));
    }
    Ok(XmlNode {
        name,
        attrs,
        children: Vec::new(),
    })
}

pub fn parse_id_range(node: &XmlNode) -> Result<IdRange> {
    match node.req_attr("Type")? {
        "All" => Ok(IdRange::All),
        "Single" => Ok(IdRange::Single(node.u32_attr("ID")?)),
        "Ranged" => {
            let start = node.u32_attr("Start")?;
            let end = node.u32_attr("End")?;
            if end < start {
                return Err(Error::Config(format!(
                    "IDRange with End {end} before Start {start}"
                )));
            }
            Ok(IdRange::Span {
                start,
                end: end + 1,
            })
        }
        "List" => {
            let ids = node
                .children_named("ID")
                .map(|c| c.u32_attr("val"))
                .collect::<Result<Vec<_>>>()?;
            Ok(IdRange::List(ids))
        }
        other => Err(Error::Config(format!("unknown IDRange type \"{other}\""))),
    }
}

pub fn parse_id_pair_range(node: &XmlNode) -> Result<IdPairRange> {
    match node.req_attr("Type")? {
        "All" => Ok(IdPairRange::All),
        "Pair" => Ok(IdPairRange::Pair(
            node.u32_attr("ID1")?,
            node.u32_attr("ID2")?,
        )),
        "TwoRanges" => Ok(IdPairRange::Ranges(
            parse_id_range(node.req_child("Range1")?.req_child("IDRange")?)?,
            parse_id_range(node.req_child("Range2")?.req_child("IDRange")?)?,
        )),
        other => Err(Error::Config(format!(
            "unknown IDPairRange type \"{other}\""
        ))),
    }
}

fn load_capture_map(node: &XmlNode, interaction: &mut Interaction) -> Result<()> {
    let Some(map_node) = node.child("CaptureMap") else {
        return Ok(());
    };
    let Some(map) = interaction.capture_map_mut() else {
        return Err(Error::Config(format!(
            "interaction \"{}\" does not carry a capture map",
            interaction.name()
        )));
    };
    map.clear();
    for pair in map_node.children_named("Pair") {
        let id1 = pair.u32_attr("ID1")?;
        let id2 = pair.u32_attr("ID2")?;
        let val = match pair.attr("val") {
            Some(_) => pair.u32_attr("val")?,
            None => 1,
        };
        map.insert(id1, id2, val);
    }
    map.mark_loaded();
    Ok(())
}

fn parse_interaction(node: &XmlNode, length: f64) -> Result<Interaction> {
    let name = node.req_attr("Name")?.to_string();
    let range = parse_id_pair_range(node.req_child("IDPairRange")?)?;
    let mut interaction = match node.req_attr("Type")? {
        "HardSphere" => Interaction::HardSphere(HardSphere::new(
            name,
            range,
            node.f64_attr("Diameter")? / length,
            node.f64_attr("Elasticity")?,
        )),
        "RoughHardSphere" => Interaction::RoughHardSphere(RoughHardSphere {
            name,
            range,
            diameter: node.f64_attr("Diameter")? / length,
            elasticity: node.f64_attr("Elasticity")?,
            tangential_elasticity: node.f64_attr("TangentialElasticity")?,
        }),
        "SquareWell" => Interaction::SquareWell(SquareWell::new(
            name,
            range,
            node.f64_attr("Diameter")? / length,
            node.f64_attr("Lambda")?,
            node.f64_attr("WellDepth")?,
            match node.attr("Elasticity") {
                Some(_) => node.f64_attr("Elasticity")?,
                None => 1.0,
            },
        )),
        "Stepped" => {
            let steps = node
                .children_named("Step")
                .map(|s| Ok((s.f64_attr("R")? / length, s.f64_attr("E")?)))
                .collect::<Result<Vec<_>>>()?;
            Interaction::Stepped(Stepped::new(name, range, steps)?)
        }
        "Null" => Interaction::Null { name, range },
        other => {
            return Err(Error::Config(format!(
                "unknown Interaction type \"{other}\""
            )))
        }
    };
    load_capture_map(node, &mut interaction)?;
    Ok(interaction)
}

fn parse_local(node: &XmlNode, length: f64) -> Result<Local> {
    let name = node.req_attr("Name")?.to_string();
    let range = parse_id_range(node.req_child("IDRange")?)?;
    let normal = unit_normal(node.req_child("Norm")?.vec3()?)?;
    let mut origin = node.req_child("Origin")?.vec3()?;
    for k in origin.iter_mut() {
        *k /= length;
    }
    match node.req_attr("Type")? {
        "Wall" => {
            let temperature = match node.attr("Temperature") {
                Some(_) => {
                    let t = node.f64_attr("Temperature")?;
                    if t < 0.0 {
                        return Err(Error::Config(
                            "wall temperature cannot be negative".into(),
                        ));
                    }
                    Some(t)
                }
                None => None,
            };
            Ok(Local::Wall(Wall {
                name,
                range,
                origin,
                normal,
                elasticity: node.f64_attr("Elasticity")?,
                diameter: node.f64_attr("Diameter")? / length,
                temperature,
            }))
        }
        "RoughWall" => Ok(Local::RoughWall(RoughWall {
            name,
            range,
            origin,
            normal,
            elasticity: node.f64_attr("Elasticity")?,
            tangential_elasticity: node.f64_attr("TangentialElasticity")?,
            diameter: node.f64_attr("Diameter")? / length,
        })),
        other => Err(Error::Config(format!("unknown Local type \"{other}\""))),
    }
}

fn parse_global(node: &XmlNode, length: f64) -> Result<Global> {
    let name = node.req_attr("Name")?.to_string();
    let range = parse_id_range(node.req_child("IDRange")?)?;
    match node.req_attr("Type")? {
        "Cells" => {
            let max_range = match node.attr("NeighbourhoodRange") {
                Some(_) => node.f64_attr("NeighbourhoodRange")? / length,
                None => 0.0,
            };
            let policy = match node.attr("Overlap") {
                None | Some("Compact") => OverlapPolicy::Compact,
                Some("Loose") => OverlapPolicy::Loose,
                Some(other) => {
                    return Err(Error::Config(format!(
                        "unknown cell overlap policy \"{other}\""
                    )))
                }
            };
            Ok(Global::Cells(CellList::new(name, range, max_range, policy)))
        }
        "PBCSentinel" => Ok(Global::Sentinel(PbcSentinel::new(name, range))),
        other => Err(Error::Config(format!("unknown Global type \"{other}\""))),
    }
}

fn parse_system(node: &XmlNode, time: f64) -> Result<System> {
    let name = node.req_attr("Name")?.to_string();
    match node.req_attr("Type")? {
        "Halt" => Ok(System::Halt(Halt::new(
            name,
            node.f64_attr("Time")? / time,
        ))),
        "Snapshot" => Ok(System::Snapshot(Snapshot::new(
            name,
            node.f64_attr("Period")? / time,
        ))),
        "Rescale" => {
            let timestep = match node.attr("TimeStep") {
                Some(_) => Some(node.f64_attr("TimeStep")? / time),
                None => None,
            };
            let frequency = match node.attr("Freq") {
                Some(_) => Some(node.u64_attr("Freq")?),
                None => None,
            };
            Ok(System::Rescale(Rescale::new(
                name,
                node.f64_attr("kT")?,
                timestep,
                frequency,
            )))
        }
        "AndersenThermostat" => Ok(System::AndersenThermostat(AndersenThermostat::new(
            name,
            node.f64_attr("Temperature")?,
            node.f64_attr("MFT")? / time,
        ))),
        "Umbrella" => {
            let mut umbrella = Umbrella::new(
                name,
                node.f64_attr("a")?,
                node.f64_attr("b")?,
                node.f64_attr("delU")?,
                parse_id_range(node.req_child("Range1")?.req_child("IDRange")?)?,
                parse_id_range(node.req_child("Range2")?.req_child("IDRange")?)?,
            );
            if node.attr("currentulevel").is_some() {
                umbrella.ulevel = node.req_attr("currentulevel")?.parse().map_err(|_| {
                    Error::Config("currentulevel must be an integer".into())
                })?;
                umbrella.ulevel_set = true;
            }
            Ok(System::Umbrella(umbrella))
        }
        other => Err(Error::Config(format!("unknown System type \"{other}\""))),
    }
}

/// Load a configuration file into an uninitialised simulation.
pub fn load_config_file(path: &Path, seed: Option<u64>) -> Result<Simulation> {
    log::debug!("reading configuration {}", path.display());
    let data = read_to_string(path)?;
    load_config_str(&data, seed)
}

pub fn load_config_str(data: &str, seed: Option<u64>) -> Result<Simulation> {
    let root = parse_document(data)?;
    if root.name != "DynamOconfig" {
        return Err(Error::Config(format!(
            "expected a DynamOconfig root element, found <{}>",
            root.name
        )));
    }
    let version = root.req_attr("version")?;
    if version != CONFIG_VERSION {
        return Err(Error::Config(format!(
            "configuration version \"{version}\" is obsolete; the current version is {CONFIG_VERSION}"
        )));
    }

    let sim_node = root.req_child("Simulation")?;
    let units = crate::units::Units::default();
    let (ul, ut) = (units.length, units.time);

    let mut size = sim_node.req_child("SimulationSize")?.vec3()?;
    for k in size.iter_mut() {
        *k /= ul;
    }

    let bc_node = sim_node.req_child("BC")?;
    let shear = match bc_node.attr("ShearRate") {
        Some(_) => bc_node.f64_attr("ShearRate")?,
        None => 0.0,
    };
    let bc_tag = bc_node.req_attr("Type")?;
    let bc = Boundary::from_tag(bc_tag, shear)
        .ok_or_else(|| Error::Config(format!("unknown BC type \"{bc_tag}\"")))?;

    let mut species = Vec::new();
    for sp in sim_node.req_child("Genus")?.children_named("Species") {
        species.push(Species::new(
            sp.req_attr("Name")?,
            sp.f64_attr("Mass")?,
            parse_id_range(sp.req_child("IDRange")?)?,
        )?);
    }

    let mut particles = Vec::new();
    let mut spins = Vec::new();
    let payload = root.req_child("ParticleData")?;
    for (idx, pt) in payload.children_named("Pt").enumerate() {
        let id = pt.u32_attr("ID")?;
        if id as usize != idx {
            return Err(Error::Config(format!(
                "particle ids must be dense and ordered; found {id} at position {idx}"
            )));
        }
        let mut r = pt.req_child("P")?.vec3()?;
        for k in r.iter_mut() {
            *k /= ul;
        }
        let mut v = pt.req_child("V")?.vec3()?;
        for k in v.iter_mut() {
            // Velocities carry length over time.
            *k = *k / ul * ut;
        }
        particles.push(Particle::new(id, r, v)?);
        if let Some(wnode) = pt.child("W") {
            spins.push((idx, wnode.vec3()?));
        }
    }

    let mut world = World::new(particles, species, bc, size, seed)?;
    if !spins.is_empty() {
        world.ensure_spin();
        if let Some(omega) = world.omega.as_mut() {
            for (idx, spin) in spins {
                omega[idx] = spin;
            }
        }
    }

    let dynamics_tag = sim_node.req_child("Dynamics")?.req_attr("Type")?;
    let dynamics = Dynamics::from_tag(dynamics_tag).ok_or_else(|| {
        Error::Config(format!("unknown Dynamics type \"{dynamics_tag}\""))
    })?;

    let scheduler_tag = sim_node.req_child("Scheduler")?.req_attr("Type")?;
    if !matches!(scheduler_tag, "NeighbourList" | "Dumb" | "SystemOnly") {
        return Err(Error::Config(format!(
            "unknown Scheduler type \"{scheduler_tag}\""
        )));
    }

    let mut sim = Simulation::new(world, dynamics);

    if let Some(ints) = sim_node.child("Interactions") {
        for node in ints.children_named("Interaction") {
            sim.interactions.push(parse_interaction(node, ul)?);
        }
    }
    if let Some(locals) = sim_node.child("Locals") {
        for node in locals.children_named("Local") {
            sim.locals.push(parse_local(node, ul)?);
        }
    }
    if let Some(globals) = sim_node.child("Globals") {
        for node in globals.children_named("Global") {
            sim.globals.push(parse_global(node, ul)?);
        }
    }
    if let Some(systems) = sim_node.child("SystemEvents") {
        for node in systems.children_named("System") {
            sim.systems.push(parse_system(node, ut)?);
        }
    }

    // Rough interactions need the spin store even when the payload
    // carried none.
    if sim
        .interactions
        .iter()
        .any(|i| matches!(i, Interaction::RoughHardSphere(_)))
        || sim.locals.iter().any(|l| matches!(l, Local::RoughWall(_)))
    {
        sim.world.ensure_spin();
    }

    Ok(sim)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_mismatch_is_fatal() {
        let xml = r#"<DynamOconfig version="1.4.0"><Simulation/><ParticleData/></DynamOconfig>"#;
        let err = load_config_str(xml, Some(1)).unwrap_err();
        assert!(err.to_string().contains("obsolete"));
    }

    #[test]
    fn missing_attribute_names_the_element() {
        let node = XmlNode {
            name: "Species".into(),
            attrs: vec![],
            children: vec![],
        };
        let err = node.req_attr("Mass").unwrap_err();
        assert!(err.to_string().contains("Species"));
        assert!(err.to_string().contains("Mass"));
    }

    #[test]
    fn id_range_forms_parse() -> Result<()> {
        let doc = parse_document(
            r#"<R><IDRange Type="Ranged" Start="2" End="4"/><IDRange Type="List"><ID val="7"/></IDRange></R>"#,
        )?;
        let mut ranges = doc.children_named("IDRange");
        let span = parse_id_range(ranges.next().unwrap())?;
        assert_eq!(span, IdRange::Span { start: 2, end: 5 });
        let list = parse_id_range(ranges.next().unwrap())?;
        assert_eq!(list, IdRange::List(vec![7]));
        Ok(())
    }

    #[test]
    fn unknown_interaction_type_is_rejected() {
        let doc = parse_document(
            r#"<Interaction Type="LennardJones" Name="x"><IDPairRange Type="All"/></Interaction>"#,
        )
        .unwrap();
        assert!(parse_interaction(&doc, 1.0).is_err());
    }
}
