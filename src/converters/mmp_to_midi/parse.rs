//! LMMS project parser
//!
//! Reads the project document with roxmltree and extracts the head tempo
//! and the notes of every qualifying track.

use crate::converters::mmp_to_midi::{model::*, MmpError, Result};
use log::{debug, info, warn};
use roxmltree::{Document as XmlDocument, Node, ParsingOptions};

/// Parse uncompressed project XML into our lean IR
pub fn parse_project(xml: &[u8]) -> Result<Project> {
    let text = std::str::from_utf8(xml)
        .map_err(|e| MmpError::Xml(format!("input is not valid UTF-8: {}", e)))?;

    // Project files start with <!DOCTYPE lmms-project>
    let options = ParsingOptions {
        allow_dtd: true,
        ..ParsingOptions::default()
    };
    let doc = XmlDocument::parse_with_options(text, options)
        .map_err(|e| MmpError::Xml(e.to_string()))?;
    let root = doc.root_element();

    let head = read_head(&root)?;
    debug!(
        "head: bpm={} timesig={:?}/{:?}",
        head.bpm, head.timesig_numerator, head.timesig_denominator
    );

    let track_nodes = collect_tracks(&root);
    info!("{} tracks", track_nodes.len());
    if track_nodes.is_empty() {
        warn!("no track has both an instrument and notes; output will be empty");
    }

    let tracks = track_nodes
        .iter()
        .enumerate()
        .map(|(index, node)| build_track(node, index))
        .collect::<Result<Vec<_>>>()?;

    Ok(Project { head, tracks })
}

/// Read tempo and time signature from the first `<head>` below the root
fn read_head(root: &Node) -> Result<Head> {
    let head = root
        .descendants()
        .skip(1)
        .find(|n| n.has_tag_name("head"))
        .ok_or(MmpError::MissingHead)?;

    let timesig_numerator = optional_attr::<u32>(&head, "timesig_numerator")?;
    let timesig_denominator = optional_attr::<u32>(&head, "timesig_denominator")?;

    let bpm = match optional_attr::<f64>(&head, "bpm")? {
        Some(bpm) => Some(bpm),
        None => {
            // Newer projects store an automatable <bpm value=".."/> child instead
            match head
                .descendants()
                .skip(1)
                .find(|n| n.has_tag_name("bpm") && n.has_attribute("value"))
            {
                Some(node) => optional_attr::<f64>(&node, "value")?,
                None => None,
            }
        }
    }
    .unwrap_or(DEFAULT_BPM);

    if !bpm.is_finite() || bpm <= 0.0 {
        return Err(MmpError::InvalidValue {
            element: "head".to_string(),
            attribute: "bpm".to_string(),
            value: bpm.to_string(),
        });
    }

    Ok(Head {
        bpm,
        timesig_numerator,
        timesig_denominator,
    })
}

/// Collect tracks worth converting, in document order
///
/// A track qualifies when it has an `<instrumenttrack>` child and a
/// `<pattern>` child holding at least one `<note>`.
fn collect_tracks<'a, 'input>(root: &Node<'a, 'input>) -> Vec<Node<'a, 'input>> {
    root.children()
        .filter(|n| n.has_tag_name("song"))
        .flat_map(|song| song.descendants().skip(1))
        .filter(|n| n.has_tag_name("track"))
        .filter(|track| {
            let has_instrument = track.children().any(|c| c.has_tag_name("instrumenttrack"));
            let has_note = track
                .children()
                .filter(|c| c.has_tag_name("pattern"))
                .any(|p| p.children().any(|c| c.has_tag_name("note")));
            has_instrument && has_note
        })
        .collect()
}

fn build_track(node: &Node, index: usize) -> Result<Track> {
    let name = node
        .attribute("name")
        .ok_or_else(|| MmpError::MissingAttribute {
            element: "track".to_string(),
            attribute: "name".to_string(),
        })?
        .to_string();
    info!("adding track {}", name);

    let mut notes = Vec::new();
    for pattern in node.descendants().filter(|n| n.has_tag_name("pattern")) {
        let pattern_start = ticks_to_beats(required_attr::<f64>(&pattern, "pos")?);

        for note_node in pattern.children().filter(|n| n.has_tag_name("note")) {
            let note = ProjectNote {
                key: required_attr(&note_node, "key")?,
                len: required_attr(&note_node, "len")?,
                pos: required_attr(&note_node, "pos")?,
                vol: required_attr(&note_node, "vol")?,
            };
            match NoteEvent::from_project_note(pattern_start, &note)? {
                Ok(event) => notes.push(event),
                Err(reason) => debug!(
                    "track '{}': skipping note key={} pos={} ({})",
                    name, note.key, note.pos, reason
                ),
            }
        }
    }

    Ok(Track {
        name,
        channel: channel_for_track(index),
        notes,
    })
}

/// Numeric attribute types accepted from the project file
trait AttrValue: std::str::FromStr {
    fn is_valid(&self) -> bool {
        true
    }
}

impl AttrValue for u32 {}

impl AttrValue for f64 {
    fn is_valid(&self) -> bool {
        self.is_finite()
    }
}

fn optional_attr<T: AttrValue>(node: &Node, attribute: &str) -> Result<Option<T>> {
    let Some(raw) = node.attribute(attribute) else {
        return Ok(None);
    };
    match raw.trim().parse::<T>() {
        Ok(value) if value.is_valid() => Ok(Some(value)),
        _ => Err(MmpError::InvalidValue {
            element: node.tag_name().name().to_string(),
            attribute: attribute.to_string(),
            value: raw.to_string(),
        }),
    }
}

fn required_attr<T: AttrValue>(node: &Node, attribute: &str) -> Result<T> {
    optional_attr(node, attribute)?.ok_or_else(|| MmpError::MissingAttribute {
        element: node.tag_name().name().to_string(),
        attribute: attribute.to_string(),
    })
}
