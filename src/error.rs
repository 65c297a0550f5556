use thiserror::Error;

/// Crate-wide result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy for the simulation engine.
///
/// `Config`, `Xml` and `Io` abort initialisation; `State` and
/// `Numerical` are fatal mid-run (the simulation is left in an
/// undefined state and must not be continued). A predictor returning no
/// event is *not* an error and is represented by `Option::None` at the
/// call sites.
#[derive(Debug, Error)]
pub enum Error {
    /// Bad or missing configuration data (unknown attribute, version
    /// mismatch, out-of-range value).
    #[error("configuration error: {0}")]
    Config(String),

    /// Simulation state violates an invariant (overlapping cores,
    /// particle without a species, pair without an interaction, cell
    /// grid too small for the interaction range).
    #[error("state error: {0}")]
    State(String),

    /// Numerical pathology (NaN event time, degenerate contact normal).
    #[error("numerical error: {0}")]
    Numerical(String),

    /// XML syntax or structure problems from the reader/writer.
    #[error("xml error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// Propagated I/O errors (unreadable file, compression failure).
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Process exit code mandated for this error class.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Config(_) | Error::Xml(_) | Error::Io(_) => 1,
            Error::State(_) | Error::Numerical(_) => 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_informative() {
        let e = Error::Config("SimulationSize must have three components".to_string());
        let msg = format!("{e}");
        assert!(msg.contains("configuration error"));
        assert!(msg.contains("SimulationSize"));
    }

    #[test]
    fn exit_codes_follow_error_class() {
        assert_eq!(Error::Config("x".into()).exit_code(), 1);
        assert_eq!(Error::State("x".into()).exit_code(), 2);
        assert_eq!(Error::Numerical("x".into()).exit_code(), 2);
    }
}
