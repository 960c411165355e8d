//! LMMS project → Standard MIDI File conversion
//!
//! Pipeline: parse the project XML, read the head tempo, select the tracks
//! worth converting, turn their patterns into beat-timed note events, then
//! hand everything to the MIDI writer.

mod model;
mod parse;
mod write;

pub use model::*;
pub use parse::parse_project;
pub use write::{build_midi_file, write_smf, MidiFile};

use thiserror::Error;

/// Default MIDI resolution of the written file (ticks per quarter note)
pub const DEFAULT_MIDI_TPQ: u16 = 960;

#[derive(Debug, Error)]
pub enum MmpError {
    #[error("xml parse error: {0}")]
    Xml(String),
    #[error("project has no <head> element")]
    MissingHead,
    #[error("<{element}> is missing the '{attribute}' attribute")]
    MissingAttribute { element: String, attribute: String },
    #[error("invalid value '{value}' for attribute '{attribute}' on <{element}>")]
    InvalidValue {
        element: String,
        attribute: String,
        value: String,
    },
    #[error("note key {0} is outside the MIDI range 0-127")]
    KeyOutOfRange(f64),
    #[error("midi write error: {0}")]
    Midi(String),
}

pub type Result<T> = std::result::Result<T, MmpError>;

/// Convert LMMS project XML bytes to SMF bytes
///
/// # Arguments
/// * `xml` - uncompressed project document
/// * `tpq` - MIDI ticks per quarter note of the written file
pub fn mmp_to_midi(xml: &[u8], tpq: u16) -> Result<Vec<u8>> {
    let project = parse_project(xml)?;
    let mut out = Vec::new();
    write_smf(&project, tpq, &mut out)?;
    Ok(out)
}
