//! Stem-to-part maps and the pipeline options that pick between them.

use std::path::Path;

use crate::classify::CanonicalName;

/// Which separated stem carries the melody that becomes PART GUITAR.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum Lead {
    #[default]
    Vocals,
    Other,
}

impl Lead {
    pub const fn stem(self) -> &'static str {
        match self {
            Lead::Vocals => "vocals",
            Lead::Other => "other",
        }
    }
}

/// Whether the drums stem is transcribed at all.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum DrumsMode {
    #[default]
    Skip,
    Basic,
}

/// Ordered stem name → canonical part table. Iteration order is merge order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PartMap(Vec<(String, CanonicalName)>);

impl Default for PartMap {
    /// bass, vocals-as-guitar, other-as-rhythm, drums.
    fn default() -> Self {
        Self::from_pairs([
            ("bass", CanonicalName::Bass),
            ("vocals", CanonicalName::Guitar),
            ("other", CanonicalName::Rhythm),
            ("drums", CanonicalName::Drums),
        ])
    }
}

impl PartMap {
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, CanonicalName)>) -> Self {
        Self(pairs.into_iter().map(|(stem, part)| (stem.to_string(), part)).collect())
    }

    /// Lead stem first as PART GUITAR, then bass, then the other melodic stem as PART RHYTHM.
    pub fn for_lead(lead: Lead) -> Self {
        match lead {
            Lead::Vocals => Self::from_pairs([
                ("vocals", CanonicalName::Guitar),
                ("bass", CanonicalName::Bass),
                ("other", CanonicalName::Rhythm),
            ]),
            Lead::Other => Self::from_pairs([
                ("other", CanonicalName::Guitar),
                ("bass", CanonicalName::Bass),
                ("vocals", CanonicalName::Rhythm),
            ]),
        }
    }

    /// Append drums, but only when the drums stem directory actually holds a MIDI file.
    pub fn with_drums_if_present(mut self, stems_dir: &Path) -> Self {
        if crate::merge::has_midi(&stems_dir.join("drums")) {
            self.push("drums", CanonicalName::Drums);
        }
        self
    }

    /// Add or re-map a stem. A re-mapped stem keeps its position.
    pub fn push(&mut self, stem: &str, part: CanonicalName) {
        match self.0.iter_mut().find(|(s, _)| s == stem) {
            Some(entry) => entry.1 = part,
            None => self.0.push((stem.to_string(), part)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, CanonicalName)> {
        self.0.iter().map(|(stem, part)| (stem.as_str(), *part))
    }
}

/// Inputs that look like a remote location rather than a local path.
pub fn is_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://") || s.starts_with("www.")
}
