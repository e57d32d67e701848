//! analysis.rs
//!
//! Builds the analysis report for one MIDI file: per-track statistics, the meta
//! timelines, part guesses, the simulated normalization and the issue list.
//!
//! The report is a pure function of the file bytes. Nothing is cached between calls,
//! so callers may analyze many files in parallel.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use anyhow::{Context, Result};
use midly::Smf;
use serde::Serialize;

use crate::classify::{classify, CanonicalName};
use crate::diagnostics::{diagnose, Diagnostics, DRUM_CHANNEL};
use crate::error::ChartError;
use crate::meta::{KeySignature, MetaMap, TempoChange, TextEvent, TimeSignatureChange};
use crate::midi::{self, Msg, TextKind, Timed};
use crate::normalize::{assign, find_collisions, Assignment};
use crate::notes::{reconstruct, Note};

/// How many lyric/text strings the report quotes.
const SAMPLE_LEN: usize = 5;

/// Statistics for one track, in file order.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TrackReport {
    pub index: usize,
    pub track_name: Option<String>,
    pub instrument_name: Option<String>,
    pub channels: BTreeSet<u8>,
    pub programs: BTreeSet<u8>,
    pub notes: usize,
    pub drum_notes: usize,
    pub non_drum_notes: usize,
    pub min_pitch: Option<u8>,
    pub max_pitch: Option<u8>,
    pub ioi_median_beats: Option<f64>,
    pub house_guess: Option<CanonicalName>,
    #[serde(skip)]
    pub note_list: Vec<Note>,
}

impl TrackReport {
    pub fn empty(index: usize) -> Self {
        Self {
            index,
            track_name: None,
            instrument_name: None,
            channels: BTreeSet::new(),
            programs: BTreeSet::new(),
            notes: 0,
            drum_notes: 0,
            non_drum_notes: 0,
            min_pitch: None,
            max_pitch: None,
            ioi_median_beats: None,
            house_guess: None,
            note_list: Vec::new(),
        }
    }

    /// Summarize one decoded track. `ppq` is `None` for timecode files.
    pub fn from_events(index: usize, events: &[Timed<'_>], ppq: Option<u16>) -> Self {
        let mut t = Self::empty(index);

        for ev in events {
            // Aftertouch does not mark a channel as used.
            let counted = match ev.msg {
                Msg::AfterTouch(..) | Msg::ChannelAftertouch(..) => None,
                ref msg => msg.channel(),
            };
            if let Some(ch) = counted {
                t.channels.insert(ch);
            }
            match ev.msg {
                // Later names overwrite earlier ones.
                Msg::TrackName(name) => t.track_name = Some(midi::text(name)),
                Msg::InstrumentName(name) => t.instrument_name = Some(midi::text(name)),
                Msg::Program(_, program) => {
                    t.programs.insert(program);
                }
                _ => {}
            }
        }

        let notes = reconstruct(events);
        t.notes = notes.len();
        t.drum_notes = notes.iter().filter(|n| n.channel == DRUM_CHANNEL).count();
        t.non_drum_notes = t.notes - t.drum_notes;
        t.min_pitch = notes.iter().map(|n| n.pitch).min();
        t.max_pitch = notes.iter().map(|n| n.pitch).max();
        t.ioi_median_beats = ppq.and_then(|ppq| median_ioi_beats(&notes, ppq));
        t.house_guess = classify(t.track_name.as_deref(), t.instrument_name.as_deref());
        t.note_list = notes;
        t
    }
}

/// Median gap between distinct onsets, in beats, rounded to 4 decimals (ties to even).
///
/// Chords (equal onsets) are skipped rather than counted as zero gaps.
pub fn median_ioi_beats(notes: &[Note], ppq: u16) -> Option<f64> {
    if ppq == 0 {
        return None;
    }
    let mut starts: Vec<u64> = notes.iter().map(|n| n.start).collect();
    starts.sort_unstable();

    let mut diffs: Vec<f64> = starts
        .windows(2)
        .map(|w| w[1] - w[0])
        .filter(|&d| d > 0)
        .map(|d| d as f64 / f64::from(ppq))
        .collect();
    if diffs.is_empty() {
        return None;
    }
    diffs.sort_by(f64::total_cmp);

    let mid = diffs.len() / 2;
    let median = if diffs.len() % 2 == 0 {
        (diffs[mid - 1] + diffs[mid]) / 2.0
    } else {
        diffs[mid]
    };
    Some((median * 10_000.0).round_ties_even() / 10_000.0)
}

/// The full report for one file.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Analysis {
    pub file: String,
    /// Ticks per quarter note; 0 for timecode files.
    pub ppq: u16,
    pub num_tracks: usize,
    pub tempo_changes: Vec<TempoChange>,
    pub time_signatures: Vec<TimeSignatureChange>,
    pub key_signatures: Vec<KeySignature>,
    pub markers: Vec<TextEvent>,
    pub lyrics_count: usize,
    pub texts_count: usize,
    pub lyrics_sample: Vec<String>,
    pub texts_sample: Vec<String>,
    pub explicit_tempo_events: usize,
    pub tracks: Vec<TrackReport>,
    pub normalized_assignments: Vec<Assignment>,
    pub normalized_parts_present: BTreeSet<CanonicalName>,
    pub collisions: BTreeMap<CanonicalName, Vec<usize>>,
    pub issues: Diagnostics,
}

impl Analysis {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("serializing analysis report")
    }
}

/// Analyze an already-parsed file.
pub fn analyze_smf(file: &str, smf: &Smf<'_>) -> Analysis {
    let ppq = midi::ppq(smf);
    let mut meta = MetaMap::new();
    let mut tracks = Vec::with_capacity(smf.tracks.len());

    for (index, track) in smf.tracks.iter().enumerate() {
        let events = midi::track_events(track);
        for ev in &events {
            meta.record(index, ev);
        }
        tracks.push(TrackReport::from_events(index, &events, ppq));
    }
    let meta = meta.finish();

    let guesses: Vec<Option<CanonicalName>> = tracks.iter().map(|t| t.house_guess).collect();
    let collisions = find_collisions(&guesses);
    let assignments = assign(&guesses);
    let parts_present: BTreeSet<CanonicalName> =
        assignments.iter().filter_map(|a| a.assigned).collect();
    let issues = diagnose(&tracks, meta.explicit_tempo_events, &parts_present);

    let sample = |kind: TextKind| -> Vec<String> {
        meta.texts_of(kind).take(SAMPLE_LEN).map(|t| t.text.clone()).collect()
    };

    Analysis {
        file: file.to_string(),
        ppq: ppq.unwrap_or(0),
        num_tracks: smf.tracks.len(),
        lyrics_count: meta.texts_of(TextKind::Lyric).count(),
        texts_count: meta.texts_of(TextKind::Text).count(),
        lyrics_sample: sample(TextKind::Lyric),
        texts_sample: sample(TextKind::Text),
        markers: meta.texts_of(TextKind::Marker).cloned().collect(),
        explicit_tempo_events: meta.explicit_tempo_events,
        tempo_changes: meta.tempos,
        time_signatures: meta.time_signatures,
        key_signatures: meta.key_signatures,
        tracks,
        normalized_assignments: assignments,
        normalized_parts_present: parts_present,
        collisions,
        issues,
    }
}

/// Parse and analyze raw file bytes. Only a file that is not MIDI at all is an error.
pub fn analyze_bytes<'a>(file: &str, bytes: &'a [u8]) -> Result<(Analysis, Smf<'a>)> {
    let smf = Smf::parse(bytes).map_err(|e| ChartError::MidiParse(e.to_string()))?;
    Ok((analyze_smf(file, &smf), smf))
}

pub fn analyze_file(path: &Path) -> Result<Analysis> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {path:?}"))?;
    let (analysis, _) = analyze_bytes(&path.display().to_string(), &bytes)?;
    Ok(analysis)
}
