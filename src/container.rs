//! Project file containers
//!
//! `.mmp` files are plain XML. Anything else is treated as `.mmpz`: a
//! 4-byte length header followed by a zlib stream of the XML.

use flate2::read::ZlibDecoder;
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const MMP_EXT: &str = ".mmp";
pub const MMPZ_EXT: &str = ".mmpz";
pub const MID_EXT: &str = ".mid";

/// Bytes skipped before the compressed stream
pub const DATA_LENGTH_OFFSET: usize = 4;

#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("decompression error: {0}")]
    Decompression(String),
}

pub type Result<T> = std::result::Result<T, ContainerError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    /// Uncompressed `.mmp`
    Mmp,
    /// Compressed `.mmpz`
    Mmpz,
}

impl ContainerKind {
    pub fn from_path(path: &Path) -> Self {
        if ends_with_ignore_case(&path.to_string_lossy(), MMP_EXT) {
            ContainerKind::Mmp
        } else {
            ContainerKind::Mmpz
        }
    }

    pub fn is_uncompressed(self) -> bool {
        self == ContainerKind::Mmp
    }
}

#[derive(Debug, Clone)]
pub struct LoadedProject {
    pub kind: ContainerKind,
    pub xml: Vec<u8>,
}

/// Read a project file and return its XML bytes
pub fn load(path: &Path) -> Result<LoadedProject> {
    let kind = ContainerKind::from_path(path);
    let data = std::fs::read(path).map_err(|source| ContainerError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let xml = match kind {
        ContainerKind::Mmp => data,
        ContainerKind::Mmpz => inflate(&data)?,
    };
    log::debug!("{}: {:?}, {} bytes of XML", path.display(), kind, xml.len());

    Ok(LoadedProject { kind, xml })
}

/// Skip the length header and inflate the rest
pub fn inflate(data: &[u8]) -> Result<Vec<u8>> {
    let compressed = data.get(DATA_LENGTH_OFFSET..).ok_or_else(|| {
        ContainerError::Decompression(format!(
            "file is {} bytes, shorter than the {}-byte header",
            data.len(),
            DATA_LENGTH_OFFSET
        ))
    })?;

    let mut decoder = ZlibDecoder::new(compressed);
    let mut decompressed = Vec::new();
    decoder
        .read_to_end(&mut decompressed)
        .map_err(|e| ContainerError::Decompression(format!("Failed to inflate project data: {e}")))?;
    Ok(decompressed)
}

/// Output path for `input`: its `.mmp`/`.mmpz` extension replaced by `.mid`
///
/// Other extensions are kept, so `song.bin` becomes `song.bin.mid`.
pub fn midi_output_path(input: &Path) -> PathBuf {
    let raw = input.to_string_lossy();
    let stem = strip_suffix_ignore_case(&raw, MMPZ_EXT)
        .or_else(|| strip_suffix_ignore_case(&raw, MMP_EXT))
        .unwrap_or(raw.as_ref());
    PathBuf::from(format!("{}{}", stem, MID_EXT))
}

fn ends_with_ignore_case(s: &str, suffix: &str) -> bool {
    strip_suffix_ignore_case(s, suffix).is_some()
}

fn strip_suffix_ignore_case<'a>(s: &'a str, suffix: &str) -> Option<&'a str> {
    let split = s.len().checked_sub(suffix.len())?;
    if s.is_char_boundary(split) && s[split..].eq_ignore_ascii_case(suffix) {
        Some(&s[..split])
    } else {
        None
    }
}
