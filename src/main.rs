use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use chart_prep::analysis::analyze_bytes;
use chart_prep::config::{DrumsMode, Lead, PartMap};
use chart_prep::merge::{self, write_smf, MergeOutcome, MERGED_FILE_NAME};
use chart_prep::normalize::normalize;
use chart_prep::pipeline::{self, BasicPitch, Demucs, RunOptions, YtDlp};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Opt {
    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Analyze a MIDI file and optionally write a normalized copy
    Scout {
        /// Input .mid
        midi: PathBuf,
        /// Write the JSON report to this path
        #[arg(long)]
        out: Option<PathBuf>,
        /// Write the normalized MIDI to this path
        #[arg(long)]
        normalize: Option<PathBuf>,
        /// Don't print the report to stdout
        #[arg(long, default_value_t = false)]
        quiet: bool,
    },
    /// Merge per-stem transcriptions under DIR into one multi-track MIDI
    Merge {
        dir: PathBuf,
        /// Map stems as for this lead; without it the default bass/vocals/other/drums map is used
        #[arg(long, value_enum)]
        lead: Option<Lead>,
        /// Include the drums stem (only used together with --lead)
        #[arg(long, default_value_t = false)]
        drums: bool,
        #[arg(long, default_value = MERGED_FILE_NAME)]
        name: String,
    },
    /// Download (if URL), separate, transcribe and merge one song
    Run {
        /// Path to input MP3/WAV file, or a URL
        audio: String,
        /// Demucs model
        #[arg(long, default_value = "htdemucs")]
        model: String,
        /// Output directory
        #[arg(long, default_value = "out")]
        out: PathBuf,
        /// Lead stem for transcription
        #[arg(long, value_enum, default_value_t = Lead::Vocals)]
        lead: Lead,
        /// Drums transcription mode
        #[arg(long, value_enum, default_value_t = DrumsMode::Skip)]
        drums: DrumsMode,
        /// Where Demucs writes its separated stems
        #[arg(long, default_value = "separated")]
        separated_root: PathBuf,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("chart_prep=info"))
        .init();

    if let Err(err) = main_result() {
        log::error!("{err:#}");
        std::process::exit(1);
    }
}

fn main_result() -> Result<()> {
    match Opt::parse().command {
        Cmd::Scout { midi, out, normalize: normalized, quiet } => {
            let bytes = fs::read(&midi).with_context(|| format!("reading {midi:?}"))?;
            let (analysis, smf) = analyze_bytes(&midi.display().to_string(), &bytes)?;
            let json = analysis.to_json()?;
            if !quiet {
                println!("{json}");
            }
            for e in &analysis.issues.errors {
                log::error!("{}: {e}", analysis.file);
            }
            for w in &analysis.issues.warnings {
                log::warn!("{}: {w}", analysis.file);
            }
            if let Some(out) = out {
                fs::write(&out, &json).with_context(|| format!("writing {out:?}"))?;
            }
            if let Some(path) = normalized {
                write_smf(&normalize(&smf, &analysis.normalized_assignments), &path)?;
                log::info!("normalized MIDI saved to {path:?}");
            }
        }
        Cmd::Merge { dir, lead, drums, name } => {
            let parts = match lead {
                Some(lead) if drums => PartMap::for_lead(lead).with_drums_if_present(&dir),
                Some(lead) => PartMap::for_lead(lead),
                None => PartMap::default(),
            };
            if merge::merge_dir(&dir, &parts, &name)? == MergeOutcome::NothingToMerge {
                bail!("no stems to merge in {dir:?}");
            }
        }
        Cmd::Run { audio, model, out, lead, drums, separated_root } => {
            let opts = RunOptions { input: audio, out_root: out, lead, drums };
            let separator = Demucs { model, separated_root };
            let outcome = pipeline::run(&opts, &YtDlp::default(), &separator, &BasicPitch)?;
            match outcome {
                MergeOutcome::Merged { path, .. } => log::info!("pipeline completed: {path:?}"),
                MergeOutcome::NothingToMerge => bail!("pipeline produced no MIDI to merge"),
            }
        }
    }
    Ok(())
}
