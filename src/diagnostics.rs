//! Advisory issues derived from an analysis. Nothing here halts processing.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Serialize, Serializer};

use crate::analysis::TrackReport;
use crate::classify::CanonicalName;

/// Channel 10 in General MIDI numbering.
pub const DRUM_CHANNEL: u8 = 9;

/// More explicit tempo events than this is suspicious for a transcribed file.
pub const MAX_TEMPO_CHANGES: usize = 50;

/// Parts every chart is expected to carry.
pub const DESIRED_PARTS: [CanonicalName; 3] =
    [CanonicalName::Guitar, CanonicalName::Bass, CanonicalName::Drums];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Issue {
    NoNotesOnAnyTrack,
    NoTempoEventsFound,
    TooManyTempoChanges(usize),
    /// A drums track (by guess or by name) with nothing on the drum channel.
    MisChanneledDrums(usize),
    Missing(CanonicalName),
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Issue::NoNotesOnAnyTrack => f.write_str("no_notes_on_any_track"),
            Issue::NoTempoEventsFound => f.write_str("no_tempo_events_found"),
            Issue::TooManyTempoChanges(n) => write!(f, "too_many_tempo_changes:{n}"),
            Issue::MisChanneledDrums(i) => write!(f, "mis_channeled_drums_track_index:{i}"),
            Issue::Missing(part) => write!(f, "missing_{}", part.code()),
        }
    }
}

impl Serialize for Issue {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(self)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Diagnostics {
    pub errors: Vec<Issue>,
    pub warnings: Vec<Issue>,
}

impl Diagnostics {
    pub fn has(&self, issue: Issue) -> bool {
        self.errors.contains(&issue) || self.warnings.contains(&issue)
    }
}

pub fn diagnose(
    tracks: &[TrackReport],
    explicit_tempo_events: usize,
    parts_present: &BTreeSet<CanonicalName>,
) -> Diagnostics {
    let mut issues = Diagnostics::default();

    if tracks.iter().all(|t| t.notes == 0) {
        issues.errors.push(Issue::NoNotesOnAnyTrack);
    }
    if explicit_tempo_events == 0 {
        issues.warnings.push(Issue::NoTempoEventsFound);
    }
    if explicit_tempo_events > MAX_TEMPO_CHANGES {
        issues.warnings.push(Issue::TooManyTempoChanges(explicit_tempo_events));
    }
    for t in tracks {
        let named_drums = t
            .track_name
            .as_deref()
            .is_some_and(|n| n.to_uppercase().contains("DRUM"));
        if (t.house_guess == Some(CanonicalName::Drums) || named_drums) && t.drum_notes == 0 {
            issues.warnings.push(Issue::MisChanneledDrums(t.index));
        }
    }
    for part in DESIRED_PARTS {
        if !parts_present.contains(&part) {
            issues.warnings.push(Issue::Missing(part));
        }
    }
    issues
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(index: usize, name: Option<&str>, notes: usize, drum_notes: usize) -> TrackReport {
        let mut t = TrackReport::empty(index);
        t.track_name = name.map(str::to_string);
        t.house_guess = crate::classify::classify(name, None);
        t.notes = notes;
        t.drum_notes = drum_notes;
        t.non_drum_notes = notes - drum_notes;
        t
    }

    fn present(parts: &[CanonicalName]) -> BTreeSet<CanonicalName> {
        parts.iter().copied().collect()
    }

    #[test]
    fn empty_file_is_an_error() {
        let d = diagnose(&[track(0, None, 0, 0), track(1, None, 0, 0)], 1, &present(&[]));
        assert_eq!(d.errors, vec![Issue::NoNotesOnAnyTrack]);
        let d = diagnose(&[track(0, None, 0, 0), track(1, None, 3, 0)], 1, &present(&[]));
        assert!(d.errors.is_empty());
    }

    #[test]
    fn tempo_warnings() {
        let tracks = [track(0, None, 1, 0)];
        let d = diagnose(&tracks, 0, &present(&[]));
        assert!(d.has(Issue::NoTempoEventsFound));
        let d = diagnose(&tracks, 50, &present(&[]));
        assert!(!d.warnings.iter().any(|w| matches!(w, Issue::TooManyTempoChanges(_))));
        let d = diagnose(&tracks, 51, &present(&[]));
        assert!(d.has(Issue::TooManyTempoChanges(51)));
    }

    #[test]
    fn drums_off_channel_ten_are_flagged() {
        let tracks = [
            track(0, Some("Drums"), 10, 0),
            track(1, Some("Kit"), 10, 10),
            track(2, Some("DRUMMER"), 4, 0),
            track(3, Some("Bass"), 4, 0),
        ];
        let d = diagnose(&tracks, 1, &present(&[CanonicalName::Drums]));
        let flagged: Vec<String> = d
            .warnings
            .iter()
            .filter(|w| matches!(w, Issue::MisChanneledDrums(_)))
            .map(ToString::to_string)
            .collect();
        assert_eq!(
            flagged,
            vec!["mis_channeled_drums_track_index:0", "mis_channeled_drums_track_index:2"]
        );
    }

    #[test]
    fn missing_parts_use_underscored_codes() {
        let d = diagnose(&[track(0, Some("bass"), 2, 0)], 1, &present(&[CanonicalName::Bass]));
        let codes: Vec<String> = d.warnings.iter().map(ToString::to_string).collect();
        assert_eq!(codes, vec!["missing_PART_GUITAR", "missing_PART_DRUMS"]);
    }

    #[test]
    fn issues_serialize_as_codes() {
        let d = Diagnostics {
            errors: vec![Issue::NoNotesOnAnyTrack],
            warnings: vec![Issue::TooManyTempoChanges(60)],
        };
        assert_eq!(
            serde_json::to_value(&d).unwrap(),
            serde_json::json!({
                "errors": ["no_notes_on_any_track"],
                "warnings": ["too_many_tempo_changes:60"],
            })
        );
    }
}
