use crate::converters::mmp_to_midi::{model::*, MmpError, Result};
use midly::{Format, Header, MetaMessage, MidiMessage, Smf, Timing, Track as MidiTrack, TrackEvent, TrackEventKind};

/// Largest value representable in a MIDI variable-length delta (28 bits)
const MAX_TICK: u64 = 0x0FFF_FFFF;
/// Largest tempo value (microseconds per quarter, 24 bits)
const MAX_TEMPO_MICROS: f64 = 0xFF_FFFF as f64;

/// In-memory multi-track MIDI file, filled through beat-timed insertions
///
/// Events keep their absolute tick until `to_smf`, where each track is
/// ordered and converted to delta times.
#[derive(Debug, Clone)]
pub struct MidiFile {
    tpq: u16,
    tracks: Vec<Vec<TimedEvent>>,
}

#[derive(Debug, Clone)]
struct TimedEvent {
    tick: u32,
    kind: EventKind,
}

#[derive(Debug, Clone)]
enum EventKind {
    TrackName(String),
    Tempo(u32),
    ProgramChange { channel: u8, program: u8 },
    NoteOff { channel: u8, key: u8 },
    NoteOn { channel: u8, key: u8, vel: u8 },
}

impl EventKind {
    /// Ordering among events sharing a tick: meta, program, note-off, note-on
    fn rank(&self) -> u8 {
        match self {
            EventKind::TrackName(_) | EventKind::Tempo(_) => 0,
            EventKind::ProgramChange { .. } => 1,
            EventKind::NoteOff { .. } => 2,
            EventKind::NoteOn { .. } => 3,
        }
    }
}

impl MidiFile {
    pub fn new(num_tracks: usize, tpq: u16) -> Self {
        Self {
            tpq,
            tracks: vec![Vec::new(); num_tracks],
        }
    }

    pub fn num_tracks(&self) -> usize {
        self.tracks.len()
    }

    pub fn add_track_name(&mut self, track: usize, time: f64, name: &str) -> Result<()> {
        let tick = self.beats_to_tick(time)?;
        self.push(track, tick, EventKind::TrackName(name.to_string()))
    }

    pub fn add_tempo(&mut self, track: usize, time: f64, bpm: f64) -> Result<()> {
        if !bpm.is_finite() || bpm <= 0.0 {
            return Err(MmpError::Midi(format!("invalid tempo {} bpm", bpm)));
        }
        let tick = self.beats_to_tick(time)?;
        let micros = (60_000_000.0 / bpm).round().clamp(1.0, MAX_TEMPO_MICROS) as u32;
        self.push(track, tick, EventKind::Tempo(micros))
    }

    pub fn add_program_change(&mut self, track: usize, channel: u8, time: f64, program: u8) -> Result<()> {
        let tick = self.beats_to_tick(time)?;
        self.push(track, tick, EventKind::ProgramChange { channel, program })
    }

    /// Add a note as a note-on/note-off pair; the note lasts at least one tick
    pub fn add_note(
        &mut self,
        track: usize,
        channel: u8,
        pitch: u8,
        time: f64,
        duration: f64,
        velocity: u8,
    ) -> Result<()> {
        let start = self.beats_to_tick(time)?;
        let end = self.beats_to_tick(time + duration)?.max(start + 1);
        self.push(track, start, EventKind::NoteOn { channel, key: pitch, vel: velocity })?;
        self.push(track, end, EventKind::NoteOff { channel, key: pitch })
    }

    /// Build the midly representation (SMF format 1)
    pub fn to_smf(&self) -> Smf<'_> {
        let header = Header {
            format: Format::Parallel,
            timing: Timing::Metrical(self.tpq.into()),
        };
        let tracks = self.tracks.iter().map(|events| build_track(events)).collect();
        Smf { header, tracks }
    }

    pub fn write(&self, out: &mut Vec<u8>) -> Result<()> {
        self.to_smf()
            .write(out)
            .map_err(|e| MmpError::Midi(format!("Failed to write MIDI: {}", e)))
    }

    fn beats_to_tick(&self, beats: f64) -> Result<u32> {
        let tick = (beats * self.tpq as f64).round();
        if !(0.0..=MAX_TICK as f64).contains(&tick) {
            return Err(MmpError::Midi(format!("event time {} beats is out of range", beats)));
        }
        Ok(tick as u32)
    }

    fn push(&mut self, track: usize, tick: u32, kind: EventKind) -> Result<()> {
        let num_tracks = self.tracks.len();
        let events = self.tracks.get_mut(track).ok_or_else(|| {
            MmpError::Midi(format!("track index {} out of range ({} tracks)", track, num_tracks))
        })?;
        events.push(TimedEvent { tick, kind });
        Ok(())
    }
}

/// Fill a writer from a parsed project: per track a name, the project
/// tempo, program 0, then every note
pub fn build_midi_file(project: &Project, tpq: u16) -> Result<MidiFile> {
    let mut midi = MidiFile::new(project.tracks.len(), tpq);

    for (index, track) in project.tracks.iter().enumerate() {
        midi.add_track_name(index, 0.0, &track.name)?;
        midi.add_tempo(index, 0.0, project.head.bpm)?;
        midi.add_program_change(index, track.channel, 0.0, 0)?;

        for note in &track.notes {
            midi.add_note(
                index,
                track.channel,
                note.pitch,
                note.start_beats,
                note.duration_beats,
                note.velocity,
            )?;
        }
    }

    Ok(midi)
}

/// Write a parsed project to Standard MIDI File bytes
pub fn write_smf(project: &Project, tpq: u16, out: &mut Vec<u8>) -> Result<()> {
    build_midi_file(project, tpq)?.write(out)
}

fn build_track(events: &[TimedEvent]) -> MidiTrack<'_> {
    let mut ordered: Vec<&TimedEvent> = events.iter().collect();
    // Stable: equal (tick, rank) keep insertion order
    ordered.sort_by_key(|e| (e.tick, e.kind.rank()));

    let mut track = Vec::with_capacity(ordered.len() + 1);
    let mut prev_tick = 0u32;
    for event in ordered {
        let delta = event.tick.saturating_sub(prev_tick);
        prev_tick = event.tick;
        track.push(TrackEvent {
            delta: delta.into(),
            kind: to_track_event_kind(&event.kind),
        });
    }

    // End of track
    track.push(TrackEvent {
        delta: 0.into(),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });

    track
}

fn to_track_event_kind(kind: &EventKind) -> TrackEventKind<'_> {
    match kind {
        EventKind::TrackName(name) => TrackEventKind::Meta(MetaMessage::TrackName(name.as_bytes())),
        EventKind::Tempo(micros) => TrackEventKind::Meta(MetaMessage::Tempo((*micros).into())),
        EventKind::ProgramChange { channel, program } => TrackEventKind::Midi {
            channel: (*channel).into(),
            message: MidiMessage::ProgramChange {
                program: (*program).into(),
            },
        },
        EventKind::NoteOn { channel, key, vel } => TrackEventKind::Midi {
            channel: (*channel).into(),
            message: MidiMessage::NoteOn {
                key: (*key).into(),
                vel: (*vel).into(),
            },
        },
        EventKind::NoteOff { channel, key } => TrackEventKind::Midi {
            channel: (*channel).into(),
            message: MidiMessage::NoteOff {
                key: (*key).into(),
                vel: 0.into(),
            },
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project(tracks: Vec<Track>) -> Project {
        Project {
            head: Head {
                bpm: 120.0,
                ..Head::default()
            },
            tracks,
        }
    }

    fn piano(name: &str, channel: u8, notes: Vec<NoteEvent>) -> Track {
        Track {
            name: name.to_string(),
            channel,
            notes,
        }
    }

    fn note(pitch: u8, start_beats: f64, duration_beats: f64) -> NoteEvent {
        NoteEvent {
            pitch,
            start_beats,
            duration_beats,
            velocity: 100,
        }
    }

    #[test]
    fn test_write_minimal_smf() {
        let project = project(vec![piano("Piano", 0, vec![note(60, 0.0, 1.0)])]);

        let mut out = Vec::new();
        write_smf(&project, 480, &mut out).expect("Failed to write SMF");

        // Verify header
        assert_eq!(&out[0..4], b"MThd");
        // Format 1, one track, 480 ticks per quarter
        assert_eq!(&out[8..14], &[0x00, 0x01, 0x00, 0x01, 0x01, 0xE0]);
    }

    #[test]
    fn test_every_track_gets_name_tempo_and_program() {
        let project = project(vec![
            piano("Piano", 0, vec![note(60, 0.0, 1.0)]),
            piano("Bass", 1, vec![note(36, 0.0, 2.0)]),
        ]);

        let midi = build_midi_file(&project, 480).unwrap();
        assert_eq!(midi.num_tracks(), 2);
        let smf = midi.to_smf();
        assert_eq!(smf.tracks.len(), 2);

        for (track, name) in smf.tracks.iter().zip(["Piano", "Bass"]) {
            assert!(matches!(track[0].kind, TrackEventKind::Meta(MetaMessage::TrackName(n)) if n == name.as_bytes()));
            assert!(matches!(track[1].kind, TrackEventKind::Meta(MetaMessage::Tempo(t)) if t.as_int() == 500_000));
            assert!(matches!(
                track[2].kind,
                TrackEventKind::Midi { message: MidiMessage::ProgramChange { program }, .. } if program.as_int() == 0
            ));
            assert!(matches!(track.last().unwrap().kind, TrackEventKind::Meta(MetaMessage::EndOfTrack)));
        }
    }

    #[test]
    fn test_note_times_converted_to_deltas() {
        let project = project(vec![piano(
            "Piano",
            3,
            vec![note(64, 1.0, 0.5), note(60, 0.0, 1.0)],
        )]);

        let midi = build_midi_file(&project, 480).unwrap();
        let smf = midi.to_smf();
        let notes: Vec<(u32, bool, u8, u8)> = smf.tracks[0]
            .iter()
            .filter_map(|e| match e.kind {
                TrackEventKind::Midi { channel, message: MidiMessage::NoteOn { key, .. } } => {
                    Some((e.delta.as_int(), true, key.as_int(), channel.as_int()))
                }
                TrackEventKind::Midi { channel, message: MidiMessage::NoteOff { key, .. } } => {
                    Some((e.delta.as_int(), false, key.as_int(), channel.as_int()))
                }
                _ => None,
            })
            .collect();

        // note-off of 60 shares tick 480 with note-on of 64 and comes first
        assert_eq!(
            notes,
            vec![
                (0, true, 60, 3),
                (480, false, 60, 3),
                (0, true, 64, 3),
                (240, false, 64, 3),
            ]
        );
    }

    #[test]
    fn test_tiny_note_lasts_one_tick() {
        let mut midi = MidiFile::new(1, 96);
        midi.add_note(0, 0, 60, 0.0, 0.001, 90).unwrap();
        let smf = midi.to_smf();
        assert!(matches!(smf.tracks[0][0].kind, TrackEventKind::Midi { message: MidiMessage::NoteOn { .. }, .. }));
        assert!(matches!(smf.tracks[0][1].kind, TrackEventKind::Midi { message: MidiMessage::NoteOff { .. }, .. }));
        assert_eq!(smf.tracks[0][1].delta.as_int(), 1);
    }

    #[test]
    fn test_track_index_out_of_range() {
        let mut midi = MidiFile::new(1, 480);
        let err = midi.add_track_name(1, 0.0, "nope").unwrap_err();
        assert!(matches!(err, MmpError::Midi(_)));
    }

    #[test]
    fn test_empty_project_writes_header_only_file() {
        let mut out = Vec::new();
        write_smf(&project(vec![]), 960, &mut out).unwrap();
        assert_eq!(&out[0..4], b"MThd");
        assert_eq!(&out[10..12], &[0x00, 0x00]);
    }
}
