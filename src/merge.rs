//! merge.rs
//!
//! Combines per-stem transcriptions into one multi-track chart MIDI.
//!
//! The expected layout is one subdirectory per stem under a base directory:
//!
//! ```text
//! out/song/
//!   bass/bass_basic_pitch.mid
//!   vocals/vocals_basic_pitch.mid
//!   drums/            (may be missing or empty)
//! ```
//!
//! For each stem in part-map order, the first track of the first `.mid` file (sorted by
//! file name) is renamed to the stem's canonical part and appended to the output.
//! Missing stems are skipped. The output is written through a temporary file in the
//! base directory and only persisted once complete.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use midly::{Format, Header, Smf};
use tempfile::NamedTempFile;

use crate::classify::CanonicalName;
use crate::config::PartMap;
use crate::normalize::rename_track;

pub const MERGED_FILE_NAME: &str = "merged.mid";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MergeOutcome {
    Merged { path: PathBuf, parts: Vec<CanonicalName> },
    /// No stem produced a track. Nothing was written.
    NothingToMerge,
}

fn is_midi(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("mid"))
}

/// MIDI files in `dir`, sorted by name. A missing directory is simply empty.
pub fn midi_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("listing {dir:?}"))? {
        let path = entry.with_context(|| format!("listing {dir:?}"))?.path();
        if is_midi(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// True if `dir` exists and holds at least one MIDI file.
pub fn has_midi(dir: &Path) -> bool {
    midi_files(dir).is_ok_and(|f| !f.is_empty())
}

/// One stem's transcription, read into memory.
#[derive(Debug)]
pub struct StemFile {
    pub stem: String,
    pub part: CanonicalName,
    pub path: PathBuf,
    pub bytes: Vec<u8>,
}

/// Read the first MIDI file of every mapped stem that has one.
///
/// A stem whose directory or file cannot be read is skipped with a warning, like a
/// missing stem.
pub fn collect_stems(base: &Path, parts: &PartMap) -> Vec<StemFile> {
    let mut found = Vec::new();
    for (stem, part) in parts.iter() {
        let dir = base.join(stem);
        let first = match midi_files(&dir) {
            Ok(files) => files.into_iter().next(),
            Err(e) => {
                log::warn!("skipping {stem} stem: {e:#}");
                continue;
            }
        };
        let Some(path) = first else {
            log::debug!("no transcription for stem {stem} in {dir:?}, skipping");
            continue;
        };
        match fs::read(&path) {
            Ok(bytes) => found.push(StemFile { stem: stem.to_string(), part, path, bytes }),
            Err(e) => log::warn!("skipping {stem} stem, cannot read {path:?}: {e}"),
        }
    }
    found
}

/// Build the merged file from stems already in memory.
///
/// Header timing comes from the first stem that parses and has a track. Returns `None`
/// when no stem contributes a track.
pub fn merge_stems<'a>(stems: &'a [StemFile]) -> Option<(Smf<'a>, Vec<CanonicalName>)> {
    let mut merged: Option<Smf<'a>> = None;
    let mut parts = Vec::new();

    for s in stems {
        let smf = match Smf::parse(&s.bytes) {
            Ok(smf) => smf,
            Err(e) => {
                log::warn!("skipping unreadable {} transcription {:?}: {e}", s.stem, s.path);
                continue;
            }
        };
        let Some(first) = smf.tracks.first() else {
            log::warn!("skipping {} transcription {:?}: no tracks", s.stem, s.path);
            continue;
        };
        let out = merged.get_or_insert_with(|| {
            Smf::new(Header::new(Format::Parallel, smf.header.timing))
        });
        out.tracks.push(rename_track(first, s.part.as_str()));
        parts.push(s.part);
    }
    merged.map(|smf| (smf, parts))
}

/// Write `smf` to `path` atomically: a temporary sibling file is persisted over `path`.
pub fn write_smf(smf: &Smf<'_>, path: &Path) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut buf = Vec::new();
    smf.write_std(&mut buf).context("encoding MIDI")?;

    let mut tmp = NamedTempFile::new_in(dir).with_context(|| format!("creating temp file in {dir:?}"))?;
    tmp.write_all(&buf)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error).with_context(|| format!("writing {path:?}"))?;
    Ok(())
}

/// Merge the stems under `base` into `base/<out_name>`.
///
/// Missing stems are not errors. If nothing could be merged, no file is written and
/// `MergeOutcome::NothingToMerge` is returned.
pub fn merge_dir(base: &Path, parts: &PartMap, out_name: &str) -> Result<MergeOutcome> {
    let stems = collect_stems(base, parts);
    let Some((smf, parts)) = merge_stems(&stems) else {
        log::warn!("no MIDI files found to merge in {base:?}");
        return Ok(MergeOutcome::NothingToMerge);
    };
    let path = base.join(out_name);
    write_smf(&smf, &path)?;
    log::info!("merged MIDI saved to {path:?}");
    Ok(MergeOutcome::Merged { path, parts })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Lead;
    use crate::midi::test_util::*;
    use midly::{MetaMessage, TrackEventKind};
    use tempfile::tempdir;

    fn write_stem(base: &Path, stem: &str, file: &str, smf: &Smf<'_>) {
        let dir = base.join(stem);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(file), to_bytes(smf)).unwrap();
    }

    fn first_name(track: &[midly::TrackEvent<'_>]) -> Option<String> {
        track.iter().find_map(|ev| match ev.kind {
            TrackEventKind::Meta(MetaMessage::TrackName(n)) => Some(crate::midi::text(n)),
            _ => None,
        })
    }

    #[test]
    fn merges_present_stems_and_skips_missing() {
        let dir = tempdir().unwrap();
        let bass = smf(220, vec![vec![name(0, "Basic Pitch"), on(0, 0, 40, 90), off(220, 0, 40), eot(0)]]);
        let drums = smf(480, vec![vec![on(0, 0, 36, 100), off(60, 0, 36), eot(0)]]);
        write_stem(dir.path(), "bass", "bass_basic_pitch.mid", &bass);
        write_stem(dir.path(), "drums", "drums_basic_pitch.mid", &drums);

        let outcome = merge_dir(dir.path(), &PartMap::default(), MERGED_FILE_NAME).unwrap();
        let MergeOutcome::Merged { path, parts } = outcome else {
            panic!("expected a merged file");
        };
        assert_eq!(parts, vec![CanonicalName::Bass, CanonicalName::Drums]);

        let bytes = fs::read(&path).unwrap();
        let merged = Smf::parse(&bytes).unwrap();
        assert_eq!(merged.header.format, Format::Parallel);
        assert_eq!(crate::midi::ppq(&merged), Some(220));
        assert_eq!(merged.tracks.len(), 2);
        assert_eq!(first_name(&merged.tracks[0]).as_deref(), Some("PART BASS"));
        assert_eq!(first_name(&merged.tracks[1]).as_deref(), Some("PART DRUMS"));
    }

    #[test]
    fn nothing_to_merge_writes_nothing() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("vocals")).unwrap();
        let outcome = merge_dir(dir.path(), &PartMap::for_lead(Lead::Vocals), MERGED_FILE_NAME).unwrap();
        assert_eq!(outcome, MergeOutcome::NothingToMerge);
        assert!(!dir.path().join(MERGED_FILE_NAME).exists());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn first_file_by_name_wins() {
        let dir = tempdir().unwrap();
        let a = smf(100, vec![vec![on(0, 0, 50, 90), off(10, 0, 50), eot(0)]]);
        let b = smf(200, vec![vec![on(0, 0, 60, 90), off(10, 0, 60), eot(0)]]);
        write_stem(dir.path(), "other", "b.mid", &b);
        write_stem(dir.path(), "other", "a.mid", &a);
        fs::write(dir.path().join("other").join("notes.txt"), b"ignore me").unwrap();

        let stems = collect_stems(dir.path(), &PartMap::for_lead(Lead::Other));
        assert_eq!(stems.len(), 1);
        assert!(stems[0].path.ends_with("a.mid"));
        let (smf, parts) = merge_stems(&stems).unwrap();
        assert_eq!(parts, vec![CanonicalName::Guitar]);
        assert_eq!(crate::midi::ppq(&smf), Some(100));
    }

    #[test]
    fn unreadable_stem_is_skipped() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("vocals")).unwrap();
        fs::write(dir.path().join("vocals").join("broken.mid"), b"garbage").unwrap();
        let bass = smf(480, vec![vec![on(0, 1, 40, 90), off(10, 1, 40), eot(0)]]);
        write_stem(dir.path(), "bass", "bass.mid", &bass);

        let outcome = merge_dir(dir.path(), &PartMap::for_lead(Lead::Vocals), "out.mid").unwrap();
        assert!(matches!(outcome, MergeOutcome::Merged { .. }));
        let merged = fs::read(dir.path().join("out.mid")).unwrap();
        assert_eq!(Smf::parse(&merged).unwrap().tracks.len(), 1);
    }

    // /proc/self/mem is a regular file whose first page cannot be read.
    #[cfg(target_os = "linux")]
    #[test]
    fn stem_that_fails_to_read_is_skipped() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("vocals")).unwrap();
        std::os::unix::fs::symlink("/proc/self/mem", dir.path().join("vocals").join("lead.mid"))
            .unwrap();
        let bass = smf(480, vec![vec![on(0, 1, 40, 90), off(10, 1, 40), eot(0)]]);
        write_stem(dir.path(), "bass", "bass.mid", &bass);

        let stems = collect_stems(dir.path(), &PartMap::for_lead(Lead::Vocals));
        assert_eq!(stems.len(), 1);
        assert_eq!(stems[0].stem, "bass");

        let outcome = merge_dir(dir.path(), &PartMap::for_lead(Lead::Vocals), "out.mid").unwrap();
        let MergeOutcome::Merged { parts, .. } = outcome else {
            panic!("expected a merged file");
        };
        assert_eq!(parts, vec![CanonicalName::Bass]);
    }
}
