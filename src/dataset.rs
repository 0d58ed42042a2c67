use bstr::ByteSlice;

use crate::error::{Error, Result};

/// Token fields observed at one position of a sequence
pub type Observation = Vec<String>;

/// Line that terminates a sequence in addition to a blank line
const EOS_LINE: &[u8] = b"EOS";

/// A labeled training sequence
#[derive(Debug, Clone, PartialEq)]
pub struct Sequence {
    /// Observations, one per position
    pub observations: Vec<Observation>,
    /// Labels, aligned with `observations`
    pub labels: Vec<String>,
}

impl Sequence {
    pub fn with_capacity(cap: usize) -> Self {
        Self {
            observations: Vec::with_capacity(cap),
            labels: Vec::with_capacity(cap),
        }
    }

    pub fn push(&mut self, observation: Observation, label: String) {
        self.observations.push(observation);
        self.labels.push(label);
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }
}

/// Parse labeled training text.
///
/// Each non-blank line is `token1 [token2 ...] label`. A blank line or a line
/// reading `EOS` closes the current sequence.
pub fn read_training(data: &[u8]) -> Result<Vec<Sequence>> {
    let mut sequences = Vec::new();
    let mut current = Sequence::with_capacity(16);
    for (lineno, line) in data.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line == EOS_LINE {
            if !current.is_empty() {
                sequences.push(std::mem::replace(&mut current, Sequence::with_capacity(16)));
            }
            continue;
        }
        let mut fields: Vec<String> = line
            .fields()
            .map(|field| field.to_str_lossy().into_owned())
            .collect();
        if fields.len() < 2 {
            return Err(Error::Parse {
                line: lineno + 1,
                message: "expected at least one token followed by a label".to_string(),
            });
        }
        // fields.len() >= 2 so pop always yields the label
        let label = fields.pop().unwrap_or_default();
        current.push(fields, label);
    }
    if !current.is_empty() {
        sequences.push(current);
    }
    Ok(sequences)
}

/// Parse unlabeled prediction text into observation sequences.
pub fn read_observations(data: &[u8]) -> Vec<Vec<Observation>> {
    let mut sequences = Vec::new();
    let mut current: Vec<Observation> = Vec::new();
    for line in data.lines() {
        let line = line.trim();
        if line.is_empty() || line == EOS_LINE {
            if !current.is_empty() {
                sequences.push(std::mem::take(&mut current));
            }
            continue;
        }
        current.push(
            line.fields()
                .map(|field| field.to_str_lossy().into_owned())
                .collect(),
        );
    }
    if !current.is_empty() {
        sequences.push(current);
    }
    sequences
}
