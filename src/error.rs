use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum ChartError {
    #[error("not a readable MIDI file: {0}")]
    MidiParse(String),
    #[error("input not found: {0:?}")]
    MissingInput(PathBuf),
    #[error("{tool} failed: {reason}")]
    Collaborator { tool: &'static str, reason: String },
}
