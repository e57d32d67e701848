//! midi.rs
//!
//! This module decodes the tracks of a Standard MIDI File (SMF) into lists of events
//! stamped with their absolute tick position. Everything downstream (note pairing,
//! the tempo/meter map, track statistics) works from these lists rather than from
//! raw `midly` events.
//!
//! ### Quick primer on ticks
//! - Every event in a track carries a delta-time: the number of ticks since the
//!   previous event *of the same track*.
//! - Summing the deltas gives the absolute tick of each event. Tracks are summed
//!   independently, but all tracks of one file share the header's
//!   pulses-per-quarter-note (PPQ), so absolute ticks compare across tracks.
//! - Tempo events say how many microseconds one quarter note lasts. A file with
//!   no tempo event plays at 500,000 µs/qn (120 BPM).
//!
//! This module takes care of:
//!  - Accumulating delta ticks into absolute ticks, per track
//!  - Normalizing NoteOn with velocity=0 into NoteOff
//!  - Narrowing the meta messages we care about into our own `Msg` enum

use midly::{MetaMessage, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind};

/// Tempo in effect before any explicit tempo event: 120 BPM.
pub const DEFAULT_US_PER_QN: u32 = 500_000;

/// The family a text-like meta event belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TextKind {
    Marker,
    Lyric,
    Text,
}

/// A normalized MIDI message.
///
/// Channel messages keep simplified fields (just u8 or u16); text payloads borrow
/// from the parsed file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Msg<'a> {
    /// Start playing a note: (channel, key, velocity). Velocity is never 0.
    NoteOn(u8, u8, u8),
    /// Stop playing a note: (channel, key, velocity)
    NoteOff(u8, u8, u8),
    /// Change instrument program on a channel
    Program(u8, u8),
    /// Generic MIDI controller change: (channel, controller number, value)
    Control(u8, u8, u8),
    /// Pitch bend wheel: (channel, bend value 0–16383, center=8192)
    PitchBend(u8, u16),
    /// Per-note aftertouch pressure
    AfterTouch(u8, u8, u8),
    /// Channel-wide aftertouch pressure
    ChannelAftertouch(u8, u8),
    /// Tempo change in microseconds per quarter note
    Tempo(u32),
    /// Meter change: (numerator, denominator). The denominator is the real one, not the exponent.
    TimeSignature(u8, u32),
    /// Key change: (sharps if positive / flats if negative, minor)
    KeySignature(i8, bool),
    TrackName(&'a [u8]),
    InstrumentName(&'a [u8]),
    Text(TextKind, &'a [u8]),
    /// Anything else: sysex, end-of-track and the meta messages nobody reads.
    Other,
}

impl Msg<'_> {
    /// Channel of a channel-voice message.
    pub fn channel(&self) -> Option<u8> {
        match *self {
            Msg::NoteOn(ch, ..)
            | Msg::NoteOff(ch, ..)
            | Msg::Program(ch, _)
            | Msg::Control(ch, ..)
            | Msg::PitchBend(ch, _)
            | Msg::AfterTouch(ch, ..)
            | Msg::ChannelAftertouch(ch, _) => Some(ch),
            _ => None,
        }
    }
}

/// A message tied to an absolute tick within its track.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Timed<'a> {
    pub tick: u64,
    pub msg: Msg<'a>,
}

/// Pulses per quarter note, or `None` for SMPTE timecode files.
pub fn ppq(smf: &Smf<'_>) -> Option<u16> {
    match smf.header.timing {
        Timing::Metrical(t) => Some(t.as_int()),
        Timing::Timecode(..) => None,
    }
}

/// Walk one track, accumulating delta ticks into absolute ticks.
///
/// The delta is added *before* the event is interpreted, so each `Timed::tick` is the
/// position of that event. Nothing here can fail: every event maps to some `Msg`.
pub fn track_events<'a>(track: &[TrackEvent<'a>]) -> Vec<Timed<'a>> {
    let mut abs_ticks: u64 = 0;
    let mut events = Vec::with_capacity(track.len());

    for ev in track {
        abs_ticks += u64::from(ev.delta.as_int());
        events.push(Timed { tick: abs_ticks, msg: decode(&ev.kind) });
    }
    events
}

/// Absolute tick of the last event in a decoded track.
pub fn final_tick(events: &[Timed<'_>]) -> u64 {
    events.last().map(|e| e.tick).unwrap_or(0)
}

fn decode<'a>(kind: &TrackEventKind<'a>) -> Msg<'a> {
    match *kind {
        TrackEventKind::Midi { channel, message } => {
            let ch = channel.as_int();
            match message {
                // NoteOn with velocity=0 is equivalent to NoteOff
                MidiMessage::NoteOn { key, vel } if vel.as_int() == 0 => {
                    Msg::NoteOff(ch, key.as_int(), 0)
                }
                MidiMessage::NoteOn { key, vel } => Msg::NoteOn(ch, key.as_int(), vel.as_int()),
                MidiMessage::NoteOff { key, vel } => Msg::NoteOff(ch, key.as_int(), vel.as_int()),
                MidiMessage::ProgramChange { program } => Msg::Program(ch, program.as_int()),
                MidiMessage::Controller { controller, value } => {
                    Msg::Control(ch, controller.as_int(), value.as_int())
                }
                MidiMessage::PitchBend { bend } => Msg::PitchBend(ch, bend.0.as_int()),
                MidiMessage::Aftertouch { key, vel } => {
                    Msg::AfterTouch(ch, key.as_int(), vel.as_int())
                }
                MidiMessage::ChannelAftertouch { vel } => Msg::ChannelAftertouch(ch, vel.as_int()),
            }
        }
        TrackEventKind::Meta(meta) => match meta {
            MetaMessage::Tempo(tp) => Msg::Tempo(tp.as_int()),
            MetaMessage::TimeSignature(num, den_pow, _, _) => {
                Msg::TimeSignature(num, 2u32.saturating_pow(u32::from(den_pow)))
            }
            MetaMessage::KeySignature(sharps, minor) => Msg::KeySignature(sharps, minor),
            MetaMessage::TrackName(name) => Msg::TrackName(name),
            MetaMessage::InstrumentName(name) => Msg::InstrumentName(name),
            MetaMessage::Marker(text) => Msg::Text(TextKind::Marker, text),
            MetaMessage::Lyric(text) => Msg::Text(TextKind::Lyric, text),
            MetaMessage::Text(text) => Msg::Text(TextKind::Text, text),
            _ => Msg::Other,
        },
        TrackEventKind::SysEx(_) | TrackEventKind::Escape(_) => Msg::Other,
    }
}

/// Display tempo for a µs/qn value, rounded to 3 decimals with ties to even.
///
/// 500,000 µs/qn is exactly 120.0 BPM. A zero tempo (invalid, but representable) reports 0.0.
pub fn bpm(us_per_qn: u32) -> f64 {
    if us_per_qn == 0 {
        return 0.0;
    }
    let raw = 60_000_000.0 / f64::from(us_per_qn);
    (raw * 1000.0).round_ties_even() / 1000.0
}

/// Lossy text of a meta payload. MIDI text has no declared encoding.
pub fn text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}
