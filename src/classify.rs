//! Canonical part names and the keyword table that guesses them from track names.

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

/// The fixed set of "house" part names a track can be normalized to.
///
/// Declaration order is significant: it is the order the keyword table is searched in,
/// and the order collision and part lists are reported in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CanonicalName {
    Guitar,
    Bass,
    Drums,
    Keys,
    Vocals,
    Rhythm,
}

impl CanonicalName {
    pub const ALL: [CanonicalName; 6] = [
        CanonicalName::Guitar,
        CanonicalName::Bass,
        CanonicalName::Drums,
        CanonicalName::Keys,
        CanonicalName::Vocals,
        CanonicalName::Rhythm,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            CanonicalName::Guitar => "PART GUITAR",
            CanonicalName::Bass => "PART BASS",
            CanonicalName::Drums => "PART DRUMS",
            CanonicalName::Keys => "PART KEYS",
            CanonicalName::Vocals => "PART VOCALS",
            CanonicalName::Rhythm => "PART RHYTHM",
        }
    }

    /// Name with spaces replaced by underscores, as used in diagnostic codes.
    pub fn code(self) -> String {
        self.as_str().replace(' ', "_")
    }
}

impl fmt::Display for CanonicalName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CanonicalName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CanonicalName::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown part name: {s}"))
    }
}

impl Serialize for CanonicalName {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(self.as_str())
    }
}

/// Keywords searched (lowercase substring match) for each part, in table order.
///
/// Rhythm has no keywords; it is only ever assigned by stem merging.
pub const CANDIDATES: &[(CanonicalName, &[&str])] = &[
    (
        CanonicalName::Guitar,
        &["guitar", "lead", "egtr", "electric", "melody", "lead gtr"],
    ),
    (CanonicalName::Bass, &["bass", "bass gtr"]),
    (CanonicalName::Drums, &["drums", "kit", "percussion"]),
    (CanonicalName::Keys, &["keys", "piano", "synth", "rhodes", "organ"]),
    (CanonicalName::Vocals, &["vocals", "vox", "singer", "lead vocal"]),
];

/// First part whose keyword list hits `name`. Empty names never match.
pub fn classify_name(name: &str) -> Option<CanonicalName> {
    if name.is_empty() {
        return None;
    }
    let low = name.to_lowercase();
    CANDIDATES
        .iter()
        .find(|(_, words)| words.iter().any(|w| low.contains(*w)))
        .map(|(part, _)| *part)
}

/// Guess a part from the display name, falling back to the instrument name.
///
/// `None` means unclassified. Note content plays no role.
pub fn classify(track_name: Option<&str>, instrument_name: Option<&str>) -> Option<CanonicalName> {
    track_name
        .and_then(classify_name)
        .or_else(|| instrument_name.and_then(classify_name))
}
