//! Collision detection, part assignment and track renaming.

use std::collections::{BTreeMap, BTreeSet};

use midly::{MetaMessage, Smf, TrackEvent, TrackEventKind};
use serde::Serialize;

use crate::classify::CanonicalName;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Assignment {
    pub index: usize,
    pub assigned: Option<CanonicalName>,
}

/// Parts guessed by two or more tracks, with every guessing track index in ascending order.
///
/// Informational only; it does not change any guess.
pub fn find_collisions(guesses: &[Option<CanonicalName>]) -> BTreeMap<CanonicalName, Vec<usize>> {
    let mut by_part: BTreeMap<CanonicalName, Vec<usize>> = BTreeMap::new();
    for (index, guess) in guesses.iter().enumerate() {
        if let Some(part) = guess {
            by_part.entry(*part).or_default().push(index);
        }
    }
    by_part.retain(|_, indices| indices.len() > 1);
    by_part
}

/// First track (by index) to guess a part gets it; later guesses of the same part get nothing.
pub fn assign(guesses: &[Option<CanonicalName>]) -> Vec<Assignment> {
    let mut consumed = BTreeSet::new();
    guesses
        .iter()
        .enumerate()
        .map(|(index, guess)| Assignment {
            index,
            assigned: guess.filter(|part| consumed.insert(*part)),
        })
        .collect()
}

/// Copy a track, rewriting its first track-name event to `name`.
///
/// The rewritten event keeps its delta. A track with no name event gets one inserted at
/// tick 0. Later name events pass through untouched, so a track that had two names keeps
/// a stale second one.
pub fn rename_track<'a>(track: &[TrackEvent<'a>], name: &'static str) -> Vec<TrackEvent<'a>> {
    let mut out = Vec::with_capacity(track.len() + 1);
    let mut wrote_name = false;

    for ev in track {
        match ev.kind {
            TrackEventKind::Meta(MetaMessage::TrackName(_)) if !wrote_name => {
                out.push(TrackEvent {
                    delta: ev.delta,
                    kind: TrackEventKind::Meta(MetaMessage::TrackName(name.as_bytes())),
                });
                wrote_name = true;
            }
            _ => out.push(*ev),
        }
    }
    if !wrote_name {
        out.insert(
            0,
            TrackEvent {
                delta: 0.into(),
                kind: TrackEventKind::Meta(MetaMessage::TrackName(name.as_bytes())),
            },
        );
    }
    out
}

/// Render a copy of `smf` with assigned tracks renamed to their canonical part.
///
/// Tracks without an assignment, and every event other than the first track name,
/// are copied unchanged.
pub fn normalize<'a>(smf: &Smf<'a>, assignments: &[Assignment]) -> Smf<'a> {
    let tracks = smf
        .tracks
        .iter()
        .enumerate()
        .map(|(i, track)| match assignments.get(i).and_then(|a| a.assigned) {
            Some(part) => rename_track(track, part.as_str()),
            None => track.clone(),
        })
        .collect();
    Smf { header: smf.header, tracks }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::test_util::*;
    use CanonicalName::*;

    fn names(track: &[TrackEvent<'_>]) -> Vec<String> {
        track
            .iter()
            .filter_map(|ev| match ev.kind {
                TrackEventKind::Meta(MetaMessage::TrackName(n)) => Some(crate::midi::text(n)),
                _ => None,
            })
            .collect()
    }

    fn channel_events(track: &[TrackEvent<'_>]) -> Vec<String> {
        track
            .iter()
            .filter(|ev| matches!(ev.kind, TrackEventKind::Midi { .. }))
            .map(|ev| format!("{} {:?}", ev.delta.as_int(), ev.kind))
            .collect()
    }

    #[test]
    fn lowest_index_wins_and_collisions_list_all() {
        let guesses = [Some(Drums), None, Some(Drums), Some(Bass), Some(Drums)];
        let assigned: Vec<_> = assign(&guesses).into_iter().map(|a| a.assigned).collect();
        assert_eq!(assigned, vec![Some(Drums), None, None, Some(Bass), None]);

        let collisions = find_collisions(&guesses);
        assert_eq!(collisions.len(), 1);
        assert_eq!(collisions[&Drums], vec![0, 2, 4]);
    }

    #[test]
    fn only_first_drum_track_is_renamed() {
        let smf = smf(
            480,
            vec![
                vec![name(0, "Drums 1"), on(0, 9, 36, 100), off(10, 9, 36), eot(0)],
                vec![name(0, "Drum kit 2"), on(0, 9, 38, 100), off(10, 9, 38), eot(0)],
            ],
        );
        let assignments = assign(&[Some(Drums), Some(Drums)]);
        let out = normalize(&smf, &assignments);
        assert_eq!(names(&out.tracks[0]), vec!["PART DRUMS"]);
        assert_eq!(names(&out.tracks[1]), vec!["Drum kit 2"]);
        assert_eq!(out.tracks[1], smf.tracks[1]);
    }

    #[test]
    fn name_is_inserted_when_missing() {
        let track = vec![on(5, 0, 40, 90), off(10, 0, 40), eot(0)];
        let out = rename_track(&track, Bass.as_str());
        assert_eq!(out.len(), 4);
        assert_eq!(out[0].delta.as_int(), 0);
        assert_eq!(names(&out), vec!["PART BASS"]);
        assert_eq!(&out[1..], &track[..]);
    }

    #[test]
    fn second_name_event_is_left_stale() {
        let track = vec![name(3, "gtr"), on(0, 0, 50, 90), name(7, "gtr again"), eot(0)];
        let out = rename_track(&track, Guitar.as_str());
        assert_eq!(names(&out), vec!["PART GUITAR", "gtr again"]);
        assert_eq!(out[0].delta.as_int(), 3);
        assert_eq!(out.len(), track.len());
    }

    fn chunk(tag: &[u8; 4], body: &[u8]) -> Vec<u8> {
        let mut out = tag.to_vec();
        out.extend_from_slice(&(body.len() as u32).to_be_bytes());
        out.extend_from_slice(body);
        out
    }

    /// Format 1, 480 ppq: a conductor track plus one melodic track named `part`.
    ///
    /// The melodic track mixes sysex, pitch bend, a lyric and a second name event, and
    /// uses running status wherever the status byte repeats.
    fn rich_file(part: &[u8]) -> Vec<u8> {
        let conductor: &[u8] = &[
            0x00, 0xFF, 0x51, 0x03, 0x07, 0xA1, 0x20, // tempo 500000
            0x00, 0xFF, 0x58, 0x04, 0x04, 0x02, 0x18, 0x08, // 4/4
            0x00, 0xFF, 0x59, 0x02, 0xFD, 0x00, // Eb major
            0x00, 0xFF, 0x06, 0x05, b'V', b'e', b'r', b's', b'e', // marker
            0x00, 0xFF, 0x2F, 0x00,
        ];
        let mut melodic = vec![0x00, 0xFF, 0x03, part.len() as u8];
        melodic.extend_from_slice(part);
        melodic.extend_from_slice(&[
            0x00, 0xF0, 0x03, 0x7E, 0x7F, 0xF7, // sysex
            0x00, 0xC1, 0x21, // program
            0x00, 0x91, 0x28, 0x64, // note on
            0x60, 0x28, 0x00, // running status, velocity 0
            0x00, 0xE1, 0x00, 0x40, // pitch bend
            0x10, 0x10, 0x40, // running status
            0x00, 0xFF, 0x05, 0x02, b'l', b'a', // lyric
            0x00, 0xFF, 0x03, 0x06, b'B', b'a', b's', b's', b' ', b'2',
            0x00, 0xFF, 0x2F, 0x00,
        ]);

        let mut out = chunk(b"MThd", &[0x00, 0x01, 0x00, 0x02, 0x01, 0xE0]);
        out.extend(chunk(b"MTrk", conductor));
        out.extend(chunk(b"MTrk", &melodic));
        out
    }

    #[test]
    fn unassigned_tracks_round_trip_byte_for_byte() {
        let input = rich_file(b"Bass");
        let smf = Smf::parse(&input).unwrap();
        let out = normalize(&smf, &assign(&[None, None]));
        assert_eq!(to_bytes(&out), input);
    }

    #[test]
    fn only_the_first_name_payload_changes() {
        let input = rich_file(b"Bass");
        let smf = Smf::parse(&input).unwrap();
        let out = normalize(&smf, &assign(&[None, Some(Bass)]));
        assert_eq!(to_bytes(&out), rich_file(b"PART BASS"));
    }

    #[test]
    fn normalized_file_survives_a_write() {
        let smf = smf(96, vec![vec![name(0, "bass"), on(0, 1, 33, 100), off(96, 1, 33), eot(0)]]);
        let out = normalize(&smf, &assign(&[Some(Bass)]));
        let bytes = to_bytes(&out);
        let back = Smf::parse(&bytes).unwrap();
        assert_eq!(names(&back.tracks[0]), vec!["PART BASS"]);
        assert_eq!(channel_events(&back.tracks[0]), channel_events(&smf.tracks[0]));
    }
}
