//! Pairs note-on/note-off events of one track into closed note intervals.

use std::collections::{BTreeMap, VecDeque};

use crate::midi::{Msg, Timed};

/// A closed note. `end >= start`; zero-length notes are kept.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Note {
    pub channel: u8,
    pub pitch: u8,
    pub start: u64,
    pub end: u64,
    /// Velocity captured at onset.
    pub velocity: u8,
}

/// Pending onsets keyed by (channel, pitch), oldest first.
///
/// One reconstructor covers exactly one track; create a fresh one per track.
#[derive(Debug, Default)]
pub struct NoteReconstructor {
    pending: BTreeMap<(u8, u8), VecDeque<(u64, u8)>>,
    notes: Vec<Note>,
}

impl NoteReconstructor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn note_on(&mut self, channel: u8, pitch: u8, tick: u64, velocity: u8) {
        if velocity == 0 {
            self.note_off(channel, pitch, tick);
            return;
        }
        self.pending.entry((channel, pitch)).or_default().push_back((tick, velocity));
    }

    /// Close the earliest pending onset for the key. An off with nothing pending is dropped.
    pub fn note_off(&mut self, channel: u8, pitch: u8, tick: u64) {
        let Some((start, velocity)) =
            self.pending.get_mut(&(channel, pitch)).and_then(VecDeque::pop_front)
        else {
            return;
        };
        self.notes.push(Note { channel, pitch, start, end: tick, velocity });
    }

    pub fn feed(&mut self, ev: &Timed<'_>) {
        match ev.msg {
            Msg::NoteOn(ch, key, vel) => self.note_on(ch, key, ev.tick, vel),
            Msg::NoteOff(ch, key, _) => self.note_off(ch, key, ev.tick),
            _ => {}
        }
    }

    /// Force-close everything still pending at `final_tick` and hand back all notes.
    ///
    /// Closed notes come first in the order they were closed, then the force-closed ones
    /// ordered by (channel, pitch) and onset.
    pub fn finish(mut self, final_tick: u64) -> Vec<Note> {
        for ((channel, pitch), starts) in std::mem::take(&mut self.pending) {
            for (start, velocity) in starts {
                self.notes.push(Note {
                    channel,
                    pitch,
                    start,
                    end: final_tick.max(start),
                    velocity,
                });
            }
        }
        self.notes
    }
}

/// Reconstruct all notes of one decoded track.
pub fn reconstruct(events: &[Timed<'_>]) -> Vec<Note> {
    let mut rec = NoteReconstructor::new();
    for ev in events {
        rec.feed(ev);
    }
    rec.finish(crate::midi::final_tick(events))
}
