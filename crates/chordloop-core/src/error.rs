//! Error types for chordloop

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChordloopError {
    #[error("Invalid note name: {0:?}")]
    InvalidNote(String),
    #[error("Chord library has no entry for degree {0}")]
    MissingDegree(u8),
    #[error("Chord library has more than one entry for degree {0}")]
    DuplicateDegree(u8),
    #[error("Voicing {label:?} on degree {degree} has no intervals")]
    EmptyVoicing { degree: u8, label: String },
}

pub type Result<T> = std::result::Result<T, ChordloopError>;
