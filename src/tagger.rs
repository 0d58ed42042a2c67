use crate::dataset::{self, Observation};
use crate::error::{Error, Result};
use crate::feature::{FeatureExtractor, Vocabulary};
use crate::lattice::Lattice;
use crate::model::Model;
use crate::viterbi::viterbi;

/// The tagger predicts label sequences for observation sequences using a model
#[derive(Debug, Clone)]
pub struct Tagger<'a> {
    /// CRF model
    model: &'a Model,
    /// Lattice of the last tagged sequence
    last: Option<Lattice>,
}

impl<'a> Tagger<'a> {
    pub(crate) fn new(model: &'a Model) -> Self {
        Self { model, last: None }
    }

    /// Predict the label sequence for the observation sequence.
    ///
    /// Features never seen during training are ignored.
    pub fn tag<T, S>(&mut self, xseq: &[T]) -> Result<Vec<&'a str>>
    where
        T: AsRef<[S]>,
        S: AsRef<str>,
    {
        if xseq.is_empty() {
            self.last = None;
            return Ok(Vec::new());
        }
        let observations: Vec<Observation> = xseq
            .iter()
            .map(|item| item.as_ref().iter().map(|s| s.as_ref().to_string()).collect())
            .collect();

        let mut lattice = Lattice::prediction(&observations, self.model.num_labels())?;
        let extractor =
            FeatureExtractor::new(self.model.templates(), self.model.label_dictionary());
        extractor.extract_lattice(
            &mut lattice,
            &mut Vocabulary::Frozen(self.model.feature_table()),
        );

        let (label_ids, score) = viterbi(&mut lattice, self.model.weights());
        log::trace!(
            "tagged {} positions, best path score {}",
            label_ids.len(),
            score
        );
        let model = self.model;
        let labels = label_ids
            .into_iter()
            .map(|id| {
                model
                    .to_label(id)
                    .ok_or_else(|| Error::MalformedLattice(format!("unknown label id {}", id)))
            })
            .collect::<Result<Vec<_>>>()?;
        self.last = Some(lattice);
        Ok(labels)
    }

    /// Tag every sequence of an unlabeled text
    pub fn tag_text(&mut self, data: &[u8]) -> Result<Vec<Vec<&'a str>>> {
        dataset::read_observations(data)
            .iter()
            .map(|xseq| self.tag(xseq))
            .collect()
    }

    /// Lattice of the last tagged sequence, with Viterbi scores and backpointers
    pub fn last_lattice(&self) -> Option<&Lattice> {
        self.last.as_ref()
    }
}
