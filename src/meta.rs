//! Tempo, meter, key and text events collected across all tracks of a file.

use serde::{Serialize, Serializer};

use crate::midi::{self, Msg, TextKind, Timed, DEFAULT_US_PER_QN};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct TempoChange {
    pub tick: u64,
    /// Exact value from the file; reported as BPM.
    #[serde(rename = "bpm", serialize_with = "as_bpm")]
    pub us_per_qn: u32,
}

fn as_bpm<S: Serializer>(us_per_qn: &u32, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(midi::bpm(*us_per_qn))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct TimeSignatureChange {
    pub tick: u64,
    pub numerator: u8,
    pub denominator: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeySignature {
    pub tick: u64,
    /// Sharps if positive, flats if negative.
    pub sharps: i8,
    pub minor: bool,
}

impl KeySignature {
    /// Conventional key name, e.g. "Eb" or "F#m".
    pub fn name(&self) -> String {
        const MAJOR: [&str; 15] = [
            "Cb", "Gb", "Db", "Ab", "Eb", "Bb", "F", "C", "G", "D", "A", "E", "B", "F#", "C#",
        ];
        const MINOR: [&str; 15] = [
            "Ab", "Eb", "Bb", "F", "C", "G", "D", "A", "E", "B", "F#", "C#", "G#", "D#", "A#",
        ];
        let idx = (i32::from(self.sharps) + 7).clamp(0, 14) as usize;
        if self.minor {
            format!("{}m", MINOR[idx])
        } else {
            MAJOR[idx].to_string()
        }
    }
}

impl Serialize for KeySignature {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut st = s.serialize_struct("KeySignature", 2)?;
        st.serialize_field("tick", &self.tick)?;
        st.serialize_field("key", &self.name())?;
        st.end()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TextEvent {
    #[serde(skip)]
    pub kind: TextKind,
    pub track: usize,
    pub tick: u64,
    pub text: String,
}

/// File-wide meta timelines, sorted by tick once `finish` runs.
#[derive(Clone, Debug, PartialEq)]
pub struct MetaMap {
    pub tempos: Vec<TempoChange>,
    pub time_signatures: Vec<TimeSignatureChange>,
    pub key_signatures: Vec<KeySignature>,
    pub texts: Vec<TextEvent>,
    /// Tempo events actually present in the file; the seeded default is not counted.
    pub explicit_tempo_events: usize,
}

impl Default for MetaMap {
    fn default() -> Self {
        Self::new()
    }
}

impl MetaMap {
    /// Seeded with 120 BPM and 4/4 at tick 0.
    pub fn new() -> Self {
        Self {
            tempos: vec![TempoChange { tick: 0, us_per_qn: DEFAULT_US_PER_QN }],
            time_signatures: vec![TimeSignatureChange { tick: 0, numerator: 4, denominator: 4 }],
            key_signatures: Vec::new(),
            texts: Vec::new(),
            explicit_tempo_events: 0,
        }
    }

    pub fn record(&mut self, track: usize, ev: &Timed<'_>) {
        let tick = ev.tick;
        match ev.msg {
            Msg::Tempo(us_per_qn) => {
                self.tempos.push(TempoChange { tick, us_per_qn });
                self.explicit_tempo_events += 1;
            }
            Msg::TimeSignature(numerator, denominator) => {
                self.time_signatures.push(TimeSignatureChange { tick, numerator, denominator });
            }
            Msg::KeySignature(sharps, minor) => {
                self.key_signatures.push(KeySignature { tick, sharps, minor });
            }
            Msg::Text(kind, bytes) => {
                self.texts.push(TextEvent { kind, track, tick, text: midi::text(bytes) });
            }
            _ => {}
        }
    }

    /// Sort every timeline by tick. The sort is stable, so ties keep encounter order.
    pub fn finish(mut self) -> Self {
        self.tempos.sort_by_key(|t| t.tick);
        self.time_signatures.sort_by_key(|t| t.tick);
        self.key_signatures.sort_by_key(|k| k.tick);
        self.texts.sort_by_key(|t| t.tick);
        self
    }

    pub fn texts_of(&self, kind: TextKind) -> impl Iterator<Item = &TextEvent> {
        self.texts.iter().filter(move |t| t.kind == kind)
    }
}
