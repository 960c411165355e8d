//! Lean representation of the parts of an LMMS project that survive
//! conversion: the head tempo and the note events of qualifying tracks.
//!
//! Times are in beats (quarter notes). Conversion to MIDI ticks happens
//! in the writer.

use super::{MmpError, Result};

/// LMMS internal resolution: ticks per quarter note, fixed by the format
pub const PROJECT_TICKS_PER_BEAT: f64 = 48.0;

pub const DEFAULT_BPM: f64 = 120.0;
pub const MAX_VELOCITY: u8 = 127;
pub const MAX_KEY: u8 = 127;

/// General MIDI percussion channel (zero-based), never assigned to a track
pub const PERCUSSION_CHANNEL: u8 = 9;

#[derive(Debug, Clone)]
pub struct Project {
    pub head: Head,
    pub tracks: Vec<Track>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Head {
    pub bpm: f64,
    // Read for validation only; the written file carries no time signature.
    pub timesig_numerator: Option<u32>,
    pub timesig_denominator: Option<u32>,
}

impl Default for Head {
    fn default() -> Self {
        Self {
            bpm: DEFAULT_BPM,
            timesig_numerator: None,
            timesig_denominator: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Track {
    pub name: String,
    pub channel: u8,      // MIDI channel 0-15, never 9
    pub notes: Vec<NoteEvent>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NoteEvent {
    pub pitch: u8,             // MIDI note number 0-127
    pub start_beats: f64,      // >= 0
    pub duration_beats: f64,   // > 0
    pub velocity: u8,          // 1-127
}

/// Raw note attributes as found in a `<note>` element
#[derive(Debug, Clone, Copy)]
pub struct ProjectNote {
    pub key: f64,
    pub len: f64,
    pub pos: f64,
    pub vol: f64,
}

/// Why a note was left out of the output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    NonPositiveLength,
    NonPositiveVolume,
    NegativeStart,
}

impl std::fmt::Display for DropReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DropReason::NonPositiveLength => write!(f, "length <= 0"),
            DropReason::NonPositiveVolume => write!(f, "volume <= 0"),
            DropReason::NegativeStart => write!(f, "starts before 0"),
        }
    }
}

/// Convert project ticks to beats
pub fn ticks_to_beats(ticks: f64) -> f64 {
    ticks / PROJECT_TICKS_PER_BEAT
}

/// MIDI channel for the `index`-th qualifying track
///
/// Cycles through the 15 melodic channels: 0..=8, 10..=15, then back to 0.
pub fn channel_for_track(index: usize) -> u8 {
    let channel = (index % 15) as u8;
    if channel >= PERCUSSION_CHANNEL {
        channel + 1
    } else {
        channel
    }
}

impl NoteEvent {
    /// Build the event for `note` inside a pattern starting at `pattern_start_beats`
    ///
    /// Returns `Ok(Err(reason))` for notes that must be skipped. A note that
    /// passes the drop rules but floors to a key outside 0-127 is an error.
    pub fn from_project_note(
        pattern_start_beats: f64,
        note: &ProjectNote,
    ) -> Result<std::result::Result<NoteEvent, DropReason>> {
        let duration_beats = ticks_to_beats(note.len);
        let start_beats = pattern_start_beats + ticks_to_beats(note.pos);

        if duration_beats <= 0.0 {
            return Ok(Err(DropReason::NonPositiveLength));
        }
        if note.vol <= 0.0 {
            return Ok(Err(DropReason::NonPositiveVolume));
        }
        if start_beats < 0.0 {
            return Ok(Err(DropReason::NegativeStart));
        }

        let key = note.key.floor();
        if !(0.0..=MAX_KEY as f64).contains(&key) {
            return Err(MmpError::KeyOutOfRange(note.key));
        }

        // floor(vol) can be 0 for 0 < vol < 1; a zero-velocity note-on is a note-off
        let velocity = note.vol.floor().clamp(1.0, MAX_VELOCITY as f64) as u8;

        Ok(Ok(NoteEvent {
            pitch: key as u8,
            start_beats,
            duration_beats,
            velocity,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(key: f64, len: f64, pos: f64, vol: f64) -> ProjectNote {
        ProjectNote { key, len, pos, vol }
    }

    #[test]
    fn test_channel_sequence_skips_percussion() {
        let channels: Vec<u8> = (0..20).map(channel_for_track).collect();
        assert_eq!(
            channels,
            vec![0, 1, 2, 3, 4, 5, 6, 7, 8, 10, 11, 12, 13, 14, 15, 0, 1, 2, 3, 4]
        );
        assert!(!(0..1000).map(channel_for_track).any(|c| c == PERCUSSION_CHANNEL));
    }

    #[test]
    fn test_note_timing_in_beats() {
        let event = NoteEvent::from_project_note(ticks_to_beats(96.0), &note(60.0, 48.0, 0.0, 100.0))
            .unwrap()
            .unwrap();
        assert_eq!(
            event,
            NoteEvent {
                pitch: 60,
                start_beats: 2.0,
                duration_beats: 1.0,
                velocity: 100,
            }
        );
    }

    #[test]
    fn test_velocity_clamped_to_127() {
        let event = NoteEvent::from_project_note(0.0, &note(60.0, 48.0, 0.0, 200.0))
            .unwrap()
            .unwrap();
        assert_eq!(event.velocity, 127);
    }

    #[test]
    fn test_fractional_values_are_floored() {
        let event = NoteEvent::from_project_note(0.0, &note(64.9, 24.0, 12.0, 80.7))
            .unwrap()
            .unwrap();
        assert_eq!(event.pitch, 64);
        assert_eq!(event.velocity, 80);
        assert_eq!(event.start_beats, 0.25);
        assert_eq!(event.duration_beats, 0.5);
    }

    #[test]
    fn test_quiet_note_keeps_nonzero_velocity() {
        let event = NoteEvent::from_project_note(0.0, &note(60.0, 48.0, 0.0, 0.5))
            .unwrap()
            .unwrap();
        assert_eq!(event.velocity, 1);
    }

    #[test]
    fn test_degenerate_notes_are_dropped() {
        assert_eq!(
            NoteEvent::from_project_note(0.0, &note(60.0, 0.0, 0.0, 100.0)).unwrap(),
            Err(DropReason::NonPositiveLength)
        );
        assert_eq!(
            NoteEvent::from_project_note(0.0, &note(60.0, 48.0, 0.0, 0.0)).unwrap(),
            Err(DropReason::NonPositiveVolume)
        );
        assert_eq!(
            NoteEvent::from_project_note(0.0, &note(60.0, 48.0, -100.0, 100.0)).unwrap(),
            Err(DropReason::NegativeStart)
        );
    }

    #[test]
    fn test_negative_offset_inside_later_pattern_is_kept() {
        // pattern at beat 2, note 1 beat before the pattern start
        let event = NoteEvent::from_project_note(2.0, &note(60.0, 48.0, -48.0, 100.0))
            .unwrap()
            .unwrap();
        assert_eq!(event.start_beats, 1.0);
    }

    #[test]
    fn test_key_out_of_range_is_an_error() {
        let err = NoteEvent::from_project_note(0.0, &note(128.0, 48.0, 0.0, 100.0)).unwrap_err();
        assert!(matches!(err, MmpError::KeyOutOfRange(k) if k == 128.0));

        let err = NoteEvent::from_project_note(0.0, &note(-0.5, 48.0, 0.0, 100.0)).unwrap_err();
        assert!(matches!(err, MmpError::KeyOutOfRange(_)));
    }
}
