//! LMMS project to MIDI converter
//!
//! Reads `.mmp` (plain XML) or `.mmpz` (4-byte header + zlib) LMMS
//! projects and writes a Standard MIDI File with one track per
//! instrument track that has notes.

pub mod container;
pub mod converters;

// Re-export commonly used types
pub use container::{load, midi_output_path, ContainerError, ContainerKind, LoadedProject};
pub use converters::mmp_to_midi::{mmp_to_midi, MmpError, DEFAULT_MIDI_TPQ};

use log::info;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error(transparent)]
    Container(#[from] ContainerError),
    #[error(transparent)]
    Transcode(#[from] MmpError),
    #[error("cannot write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone)]
pub struct ConvertOptions {
    /// Destination; derived from the input path when `None`
    pub output: Option<PathBuf>,
    /// MIDI ticks per quarter note of the written file
    pub ticks_per_beat: u16,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            output: None,
            ticks_per_beat: DEFAULT_MIDI_TPQ,
        }
    }
}

/// Convert one project file and write the MIDI file next to it
///
/// Nothing is written unless the whole conversion succeeds.
/// Returns the path of the written file.
pub fn convert_file(input: &Path, options: &ConvertOptions) -> Result<PathBuf, ConvertError> {
    let project = load(input)?;
    let midi = mmp_to_midi(&project.xml, options.ticks_per_beat)?;

    let output = options
        .output
        .clone()
        .unwrap_or_else(|| midi_output_path(input));
    std::fs::write(&output, &midi).map_err(|source| ConvertError::Write {
        path: output.clone(),
        source,
    })?;

    info!("MIDI file written to {}", output.display());
    Ok(output)
}
