//! pipeline.rs
//!
//! Audio → stems → per-stem MIDI → merged chart MIDI.
//!
//! The heavy lifting is done by external tools, each behind a narrow trait:
//!  - `Downloader`: URL in, local audio file out (yt-dlp)
//!  - `StemSeparator`: audio file in, directory of `<stem>.wav` files out (Demucs)
//!  - `Transcriber`: audio file in, a `.mid` written into an output directory (Basic Pitch)
//!
//! `run` only depends on those traits and on the directory layout they produce, so
//! tests drive it with fakes that write files directly.

use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{bail, Context, Result};

use crate::config::{is_url, DrumsMode, Lead, PartMap};
use crate::error::ChartError;
use crate::merge::{self, MergeOutcome, MERGED_FILE_NAME};

pub trait Downloader {
    fn download(&self, url: &str) -> Result<PathBuf>;
}

pub trait StemSeparator {
    /// Returns the directory holding the separated `<stem>.wav` files.
    fn separate(&self, audio: &Path) -> Result<PathBuf>;
}

pub trait Transcriber {
    fn transcribe(&self, audio: &Path, out_dir: &Path) -> Result<()>;
}

/// Run an external command to completion, logging its output.
fn run_command(tool: &'static str, cmd: &mut Command) -> Result<()> {
    log::info!("running: {cmd:?}");
    let output = cmd
        .output()
        .map_err(|e| ChartError::Collaborator { tool, reason: e.to_string() })?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    if !stdout.trim().is_empty() {
        log::info!("{tool} output: {}", stdout.trim());
    }
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        log::error!("{tool} error: {}", stderr.trim());
        return Err(ChartError::Collaborator { tool, reason: output.status.to_string() }.into());
    }
    Ok(())
}

/// Downloads audio with `yt-dlp -x`, preferring WAV and falling back to MP3.
#[derive(Clone, Debug)]
pub struct YtDlp {
    /// Output path without extension.
    pub out_base: PathBuf,
}

impl Default for YtDlp {
    fn default() -> Self {
        Self { out_base: PathBuf::from("songs/tmp_download") }
    }
}

impl Downloader for YtDlp {
    fn download(&self, url: &str) -> Result<PathBuf> {
        if let Some(parent) = self.out_base.parent() {
            fs::create_dir_all(parent).with_context(|| format!("creating {parent:?}"))?;
        }
        let template = format!("{}.%(ext)s", self.out_base.display());
        run_command(
            "yt-dlp",
            Command::new("yt-dlp")
                .args(["-x", "--audio-format", "wav", "--force-overwrites", "-o"])
                .arg(&template)
                .arg(url),
        )?;
        ["wav", "mp3"]
            .into_iter()
            .map(|ext| self.out_base.with_extension(ext))
            .find(|p| p.exists())
            .ok_or_else(|| {
                ChartError::Collaborator {
                    tool: "yt-dlp",
                    reason: "no audio file produced".to_string(),
                }
                .into()
            })
    }
}

/// Separates stems with `python -m demucs.separate`.
#[derive(Clone, Debug)]
pub struct Demucs {
    pub model: String,
    /// Where Demucs writes `<model>/<track>/<stem>.wav`.
    pub separated_root: PathBuf,
}

impl Default for Demucs {
    fn default() -> Self {
        Self { model: "htdemucs".to_string(), separated_root: PathBuf::from("separated") }
    }
}

impl StemSeparator for Demucs {
    fn separate(&self, audio: &Path) -> Result<PathBuf> {
        log::info!("running Demucs stem separation with model {}", self.model);
        run_command(
            "demucs",
            Command::new("python")
                .args(["-m", "demucs.separate", "-n", self.model.as_str()])
                .arg(audio),
        )?;
        let name = audio.file_stem().unwrap_or(OsStr::new("audio"));
        let dir = self.separated_root.join(&self.model).join(name);
        if !dir.is_dir() {
            return Err(ChartError::Collaborator {
                tool: "demucs",
                reason: format!("output not found at {dir:?}"),
            }
            .into());
        }
        log::info!("found Demucs output at {dir:?}");
        Ok(dir)
    }
}

/// Transcribes audio with `basic-pitch <out_dir> <input>`.
#[derive(Clone, Copy, Debug, Default)]
pub struct BasicPitch;

impl Transcriber for BasicPitch {
    fn transcribe(&self, audio: &Path, out_dir: &Path) -> Result<()> {
        log::info!("running Basic Pitch on {audio:?}");
        run_command("basic-pitch", Command::new("basic-pitch").arg(out_dir).arg(audio))?;
        let produced = merge::midi_files(out_dir)?;
        match produced.first() {
            Some(mid) => {
                log::info!("Basic Pitch output: {mid:?}");
                Ok(())
            }
            None => Err(ChartError::Collaborator {
                tool: "basic-pitch",
                reason: format!("no MIDI output found in {out_dir:?}"),
            }
            .into()),
        }
    }
}

#[derive(Clone, Debug)]
pub struct RunOptions {
    /// Local audio path or URL.
    pub input: String,
    pub out_root: PathBuf,
    pub lead: Lead,
    pub drums: DrumsMode,
}

/// Transcribe one stem into `song_dir/<stem>/`. Failures are logged, not returned.
fn transcribe_stem(transcriber: &dyn Transcriber, stems_dir: &Path, song_dir: &Path, stem: &str) {
    let wav = stems_dir.join(format!("{stem}.wav"));
    if !wav.exists() {
        log::warn!("{stem} stem not found, skipping");
        return;
    }
    let out_dir = song_dir.join(stem);
    if let Err(e) = fs::create_dir_all(&out_dir) {
        log::warn!("{stem} transcription skipped, cannot create {out_dir:?}: {e}");
        return;
    }
    if let Err(e) = transcriber.transcribe(&wav, &out_dir) {
        log::warn!("{stem} transcription failed: {e:#}");
    }
}

/// Full pipeline for one song. Returns the merge outcome; the merged file (if any) is
/// `<out_root>/<audio stem>/merged.mid`.
pub fn run(
    opts: &RunOptions,
    downloader: &dyn Downloader,
    separator: &dyn StemSeparator,
    transcriber: &dyn Transcriber,
) -> Result<MergeOutcome> {
    let audio = if is_url(&opts.input) {
        downloader.download(&opts.input).context("failed to download audio")?
    } else {
        PathBuf::from(&opts.input)
    };
    if !audio.exists() {
        return Err(ChartError::MissingInput(audio).into());
    }

    let Some(song) = audio.file_stem() else {
        bail!("cannot derive a song name from {audio:?}");
    };
    let song_dir = opts.out_root.join(song);
    fs::create_dir_all(&song_dir).with_context(|| format!("creating {song_dir:?}"))?;
    log::info!("processing {audio:?} -> {song_dir:?}");

    let stems_dir = separator.separate(&audio).context("stem separation failed")?;

    transcribe_stem(transcriber, &stems_dir, &song_dir, "bass");
    match opts.drums {
        DrumsMode::Basic => transcribe_stem(transcriber, &stems_dir, &song_dir, "drums"),
        DrumsMode::Skip => log::info!("skipping drums transcription (use --drums basic to enable)"),
    }
    transcribe_stem(transcriber, &stems_dir, &song_dir, opts.lead.stem());

    let parts = PartMap::for_lead(opts.lead).with_drums_if_present(&song_dir);
    let outcome = merge::merge_dir(&song_dir, &parts, MERGED_FILE_NAME)?;
    log::info!("output files in: {song_dir:?}");
    Ok(outcome)
}
