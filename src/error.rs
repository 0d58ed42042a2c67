use std::io;

use thiserror::Error;

/// Errors raised while configuring, loading, training or tagging.
#[derive(Debug, Error)]
pub enum Error {
    /// An option value failed validation
    #[error("{0}")]
    Config(String),
    /// `set`/`get` on an option that does not exist
    #[error("unknown parameter: {0}")]
    UnknownParameter(String),
    /// `usefeature` refers to a template tag that does not exist
    #[error("unknown feature template: {0}")]
    UnknownTemplate(String),
    /// A lattice position ended up without any candidate label
    #[error("position {position} has no candidate labels")]
    EmptyPosition { position: usize },
    /// An appended observation carries no tokens
    #[error("observation at position {position} has no tokens")]
    EmptyObservation { position: usize },
    /// The node graph violates the lattice invariants
    #[error("malformed lattice: {0}")]
    MalformedLattice(String),
    /// A training line could not be split into observation and label
    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },
    /// Observation and label sequences differ in length
    #[error("observation count ({observations}) does not match label count ({labels})")]
    LengthMismatch { observations: usize, labels: usize },
    #[error("empty sequences are not allowed")]
    EmptySequence,
    #[error("no training data")]
    NoTrainingData,
    /// The log-likelihood of a sequence left the safe range
    #[error(
        "training diverged on sequence {sequence} at iteration {iteration}: \
         score = {score}, path log psi = {path_log_psi}, log Z = {log_z}"
    )]
    Diverged {
        sequence: usize,
        iteration: usize,
        score: f64,
        path_log_psi: f64,
        log_z: f64,
    },
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn config<S: Into<String>>(message: S) -> Self {
        Error::Config(message.into())
    }
}
