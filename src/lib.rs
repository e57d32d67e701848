//! Analysis, normalization and stem merging for Clone Hero style chart MIDI.
//!
//! The core (`midi`, `notes`, `meta`, `classify`, `normalize`, `diagnostics`, `analysis`,
//! `merge`) is synchronous and keeps no state between calls. External audio tools are
//! reached only through the traits in `pipeline`.

pub mod analysis;
pub mod classify;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod merge;
pub mod meta;
pub mod midi;
pub mod normalize;
pub mod notes;
pub mod pipeline;

pub use analysis::{analyze_bytes, analyze_file, analyze_smf, Analysis, TrackReport};
pub use classify::{classify, CanonicalName};
pub use diagnostics::{Diagnostics, Issue};
pub use error::ChartError;
pub use merge::{merge_dir, MergeOutcome};
pub use normalize::normalize;
