//! Configuration file handling.
//!
//! The schema is a single `DynamOconfig` root at version 1.5.0 with a
//! `Simulation` element for the registries and a `ParticleData`
//! payload. Files ending in `.xml.bz2` are transparently
//! (de)compressed.

pub mod load;
pub mod write;

use crate::error::{Error, Result};
use bzip2::read::BzDecoder;
use bzip2::write::BzEncoder;
use bzip2::Compression;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

/// Config schema version; a mismatch is a hard failure.
pub const CONFIG_VERSION: &str = "1.5.0";

/// Significant decimal digits written for floats (`digits10 - 1`).
pub const WRITE_DIGITS: usize = 14;

/// Format a float for write-back: scientific, `WRITE_DIGITS`
/// significant digits, one fewer when rounding is requested.
pub fn fmt_float(v: f64, round: bool) -> String {
    let digits = WRITE_DIGITS - 1 - usize::from(round);
    format!("{v:.digits$e}")
}

/// Read a whole configuration file into a string, decompressing by
/// extension.
pub fn read_to_string(path: &Path) -> Result<String> {
    let name = path.to_string_lossy();
    let file = File::open(path).map_err(|e| {
        Error::Config(format!("could not open configuration file {name}: {e}"))
    })?;
    let mut data = String::new();
    if name.ends_with(".xml.bz2") {
        BzDecoder::new(file).read_to_string(&mut data)?;
    } else if name.ends_with(".xml") {
        let mut file = file;
        file.read_to_string(&mut data)?;
    } else {
        return Err(Error::Config(format!(
            "unrecognised extension for configuration file {name} (expected .xml or .xml.bz2)"
        )));
    }
    Ok(data)
}

/// Write a configuration string, compressing by extension.
pub fn write_string(path: &Path, data: &str) -> Result<()> {
    let name = path.to_string_lossy().to_string();
    let file = File::create(path)?;
    if name.ends_with(".bz2") {
        let mut enc = BzEncoder::new(file, Compression::default());
        enc.write_all(data.as_bytes())?;
        enc.finish()?;
    } else {
        let mut file = file;
        file.write_all(data.as_bytes())?;
    }
    Ok(())
}
