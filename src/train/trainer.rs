use log::Level;

use super::forward_backward::{observed_counts_into, ForwardBackward, LogLinear};
use crate::config::Config;
use crate::dataset::{self, Observation, Sequence};
use crate::dictionary::Dictionary;
use crate::error::{Error, Result};
use crate::feature::{FeatureExtractor, FeatureTable, Vocabulary};
use crate::lattice::{Computed, LabelId, Lattice};
use crate::model::{Model, TrainingReport};

/// A training sequence with labels mapped to ids
#[derive(Debug, Clone)]
struct Instance {
    observations: Vec<Observation>,
    labels: Vec<LabelId>,
}

/// CRF trainer.
///
/// Owns the training data, the label vocabulary, the feature table and the
/// training lattices. Lattices are built once per data set and reused by
/// every iteration.
#[derive(Debug)]
pub struct Trainer {
    config: Config,
    /// Training instances
    instances: Vec<Instance>,
    /// Label dictionary
    labels: Dictionary,
    /// Feature name table
    features: FeatureTable,
    /// One lattice per instance, valid unless `stale`
    lattices: Vec<Lattice>,
    weights: Vec<f64>,
    stale: bool,
}

impl Trainer {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            instances: Vec::new(),
            labels: Dictionary::new(),
            features: FeatureTable::new(),
            lattices: Vec::new(),
            weights: Vec::new(),
            stale: false,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Append one labeled sequence
    pub fn append<T, S, L>(&mut self, xseq: &[T], yseq: &[L]) -> Result<()>
    where
        T: AsRef<[S]>,
        S: AsRef<str>,
        L: AsRef<str>,
    {
        if xseq.len() != yseq.len() {
            return Err(Error::LengthMismatch {
                observations: xseq.len(),
                labels: yseq.len(),
            });
        }
        if xseq.is_empty() {
            return Err(Error::EmptySequence);
        }
        if let Some(empty) = xseq.iter().position(|item| item.as_ref().is_empty()) {
            return Err(Error::EmptyObservation {
                position: empty + 1,
            });
        }

        let mut instance = Instance {
            observations: Vec::with_capacity(xseq.len()),
            labels: Vec::with_capacity(yseq.len()),
        };
        for (item, label) in xseq.iter().zip(yseq) {
            instance
                .observations
                .push(item.as_ref().iter().map(|s| s.as_ref().to_string()).collect());
            instance.labels.push(self.labels.get_or_insert(label.as_ref()));
        }
        self.instances.push(instance);
        self.stale = true;
        Ok(())
    }

    /// Append a parsed training sequence
    pub fn append_sequence(&mut self, sequence: &Sequence) -> Result<()> {
        self.append(&sequence.observations, &sequence.labels)
    }

    /// Replace all training data with the sequences of `data`.
    ///
    /// Lattices and features are built right away. Nothing changes if the
    /// text fails to parse.
    pub fn load_text(&mut self, data: &[u8]) -> Result<usize> {
        let sequences = dataset::read_training(data)?;
        self.clear();
        for sequence in &sequences {
            self.append_sequence(sequence)?;
        }
        self.prepare()?;
        Ok(sequences.len())
    }

    /// Clear all training data, labels, features and lattices
    pub fn clear(&mut self) {
        self.instances.clear();
        self.labels.clear();
        self.features.clear();
        self.lattices.clear();
        self.weights.clear();
        self.stale = false;
    }

    pub fn num_sequences(&self) -> usize {
        self.instances.len()
    }

    pub fn num_labels(&self) -> usize {
        self.labels.len()
    }

    pub fn num_features(&self) -> usize {
        self.features.len()
    }

    pub fn labels(&self) -> &[String] {
        self.labels.names()
    }

    pub fn feature_table(&self) -> &FeatureTable {
        &self.features
    }

    /// Training lattices built by [`prepare`](Self::prepare)
    pub fn lattices(&self) -> &[Lattice] {
        &self.lattices
    }

    /// Current weight vector
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Build the training lattices and the feature table.
    ///
    /// Feature ids are assigned from scratch in lattice order, so the same
    /// corpus always yields the same table.
    pub fn prepare(&mut self) -> Result<()> {
        if !self.stale {
            return Ok(());
        }
        let num_labels = self.labels.len();
        let mut features = FeatureTable::new();
        let extractor = FeatureExtractor::new(self.config.templates(), &self.labels);
        let lattices = self
            .instances
            .iter()
            .map(|inst| {
                let mut lattice = Lattice::training(&inst.observations, &inst.labels, num_labels)?;
                extractor.extract_lattice(&mut lattice, &mut Vocabulary::Growing(&mut features));
                Ok(lattice)
            })
            .collect::<Result<Vec<_>>>()?;

        log::log!(
            self.log_level(),
            "prepared {} lattices (labels: {}, features: {}, templates: {:?})",
            lattices.len(),
            num_labels,
            features.len(),
            self.config.templates().tags().collect::<Vec<_>>()
        );
        self.features = features;
        self.lattices = lattices;
        self.weights = vec![0.0; self.features.len()];
        self.stale = false;
        Ok(())
    }

    /// Clear cached forward/backward/Viterbi values and reinitialise weights
    pub fn reset_training(&mut self) {
        for lattice in &mut self.lattices {
            lattice.reset(Computed::ALL);
        }
        let n = self.features.len();
        let init = 1.0 / (n as f64).sqrt();
        self.weights = vec![init; n];
    }

    /// Train the weights and return the resulting model
    pub fn train(&mut self) -> Result<Model> {
        if self.instances.is_empty() {
            return Err(Error::NoTrainingData);
        }
        self.prepare()?;
        if self.features.is_empty() {
            return Err(Error::config(
                "the enabled feature templates produced no features",
            ));
        }
        self.reset_training();

        let level = self.log_level();
        let num_features = self.features.len();
        let epsilon = self.config.epsilon();
        let threshold = self.config.threshold();
        let bound = self.config.divergence_bound();
        log::log!(
            level,
            "training {} sequences (epsilon: {}, max_iterations: {}, threshold: {})",
            self.lattices.len(),
            epsilon,
            self.config.max_iterations(),
            threshold
        );

        let mut observed = vec![0.0; num_features];
        let mut expected = vec![0.0; num_features];
        let mut previous: Option<f64> = None;
        let mut report = TrainingReport {
            iterations: 0,
            score: 0.0,
            converged: false,
        };

        for iteration in 1..=self.config.max_iterations() {
            let old_weights = self.weights.clone();
            observed.fill(0.0);
            expected.fill(0.0);

            let potential = LogLinear::new(&old_weights);
            let fb = ForwardBackward::new(&potential);
            let mut score = 0.0;
            for (index, lattice) in self.lattices.iter_mut().enumerate() {
                lattice.reset(Computed::ALPHA | Computed::BETA);
                fb.backward(lattice);
                fb.forward(lattice);
                let z = fb.partition(lattice);

                fb.expected_counts_into(lattice, z, &mut expected);
                observed_counts_into(lattice, &mut observed);

                let path_log_psi = fb.path_log_psi(lattice);
                let log_z = z.ln();
                let seq_score = path_log_psi - log_z;
                if !seq_score.is_finite() || seq_score.abs() > bound {
                    log::error!(
                        "sequence {} diverged at iteration {}: score = {}, path log psi = {}, Z = {}",
                        index,
                        iteration,
                        seq_score,
                        path_log_psi,
                        z
                    );
                    return Err(Error::Diverged {
                        sequence: index,
                        iteration,
                        score: seq_score,
                        path_log_psi,
                        log_z,
                    });
                }
                score += seq_score;
            }

            // w = w_old + epsilon * (observed - expected), then rescale to unit length
            for (fid, w) in self.weights.iter_mut().enumerate() {
                *w = old_weights[fid] + epsilon * (observed[fid] - expected[fid]);
            }
            let norm = self.weights.iter().map(|w| w * w).sum::<f64>().sqrt();
            if norm > 0.0 {
                for w in &mut self.weights {
                    *w /= norm;
                }
            }

            report.iterations = iteration;
            report.score = score;
            let delta = previous.map(|prev| (score - prev).abs());
            log::log!(
                level,
                "iteration {}: score = {:.6}, delta = {:?}",
                iteration,
                score,
                delta
            );
            if matches!(delta, Some(delta) if delta < threshold) {
                report.converged = true;
                log::log!(level, "converged at iteration {}", iteration);
                break;
            }
            previous = Some(score);
        }

        Ok(Model::new(
            self.config.templates(),
            self.labels.clone(),
            self.features.clone(),
            self.weights.clone(),
            report,
        ))
    }

    fn log_level(&self) -> Level {
        if self.config.verbose() {
            Level::Info
        } else {
            Level::Debug
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Templates;
    use crate::train::STABILITY_OFFSET;

    fn u00_config() -> Config {
        Config::builder()
            .templates(Templates::U00)
            .build()
            .unwrap()
    }

    #[test]
    fn test_append_registers_labels() {
        let mut trainer = Trainer::new(u00_config());
        trainer
            .append(&[vec!["the"], vec!["dog"]], &["DT", "NN"])
            .unwrap();
        trainer.append(&[vec!["a"]], &["DT"]).unwrap();
        assert_eq!(trainer.num_sequences(), 2);
        assert_eq!(trainer.labels(), &["DT".to_string(), "NN".to_string()]);
        // lattices are built lazily after append
        assert!(trainer.lattices().is_empty());
        trainer.prepare().unwrap();
        assert_eq!(trainer.lattices().len(), 2);
        // every position enumerates both labels
        assert_eq!(trainer.lattices()[1].column(1).len(), 2);
    }

    #[test]
    fn test_append_rejects_bad_sequences() {
        let mut trainer = Trainer::new(u00_config());
        let empty: Vec<Vec<&str>> = vec![];
        let no_labels: Vec<&str> = vec![];
        assert!(matches!(
            trainer.append(&empty, &no_labels),
            Err(Error::EmptySequence)
        ));
        assert!(matches!(
            trainer.append(&[vec!["a"], vec!["b"]], &["X"]),
            Err(Error::LengthMismatch { .. })
        ));
        let blank: Vec<Vec<&str>> = vec![vec![]];
        assert!(matches!(
            trainer.append(&blank, &["X"]),
            Err(Error::EmptyObservation { position: 1 })
        ));
        assert_eq!(trainer.num_sequences(), 0);
    }

    #[test]
    fn test_train_without_data() {
        let mut trainer = Trainer::new(u00_config());
        assert!(matches!(trainer.train(), Err(Error::NoTrainingData)));
    }

    #[test]
    fn test_reset_training_initialises_weights() {
        let mut trainer = Trainer::new(u00_config());
        trainer.load_text(b"a X\nb Y\n\nc X\n").unwrap();
        // 3 positions x 2 labels
        assert_eq!(trainer.num_features(), 6);
        trainer.reset_training();
        for w in trainer.weights() {
            assert!((w - 1.0 / 6f64.sqrt()).abs() < 1e-15);
        }
        let norm: f64 = trainer.weights().iter().map(|w| w * w).sum();
        assert!((norm - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_load_text_replaces_data() {
        let mut trainer = Trainer::new(u00_config());
        trainer.load_text(b"a X\nb Y\n").unwrap();
        assert_eq!(trainer.load_text(b"c Z\n\nd Z\n").unwrap(), 2);
        assert_eq!(trainer.labels(), &["Z".to_string()]);
        assert_eq!(
            trainer.feature_table().names(),
            &["U00:Z:c".to_string(), "U00:Z:d".to_string()]
        );

        // a parse failure leaves the previous data in place
        assert!(trainer.load_text(b"oops\n").is_err());
        assert_eq!(trainer.num_sequences(), 2);
    }

    #[test]
    fn test_divergence_is_reported() {
        let config = Config::builder()
            .templates(Templates::U00)
            .divergence_bound(0.5)
            .build()
            .unwrap();
        let mut trainer = Trainer::new(config);
        trainer.load_text(b"a X\nb Y\nc X\n\nd Y\n").unwrap();
        match trainer.train() {
            Err(Error::Diverged {
                sequence,
                iteration,
                score,
                ..
            }) => {
                assert_eq!(sequence, 0);
                assert_eq!(iteration, 1);
                assert!(score.abs() > 0.5);
            }
            other => panic!("expected divergence, got {:?}", other),
        }
    }

    #[test]
    fn test_log_z_sums_alpha_next_to_end() {
        let config = Config::builder()
            .templates(Templates::U00)
            .divergence_bound(1e-9)
            .build()
            .unwrap();
        let mut trainer = Trainer::new(config);
        trainer.load_text(b"the DT\ndog NN\nbarks VB\n").unwrap();
        trainer.reset_training();
        let weights = trainer.weights().to_vec();
        let mut lattice = trainer.lattices()[0].clone();
        let potential = LogLinear::new(&weights);
        let fb = ForwardBackward::new(&potential);
        fb.forward(&mut lattice);
        let end = lattice.end();
        let end_adjacent: f64 = lattice
            .left_alternatives(end)
            .iter()
            .map(|&id| lattice.node(id).alpha)
            .sum();

        match trainer.train() {
            Err(Error::Diverged { log_z, .. }) => {
                assert!((log_z - end_adjacent.ln()).abs() < 1e-12);
                // the transition into END is left out
                let total = lattice.node(end).alpha.ln();
                assert!((log_z - total - STABILITY_OFFSET).abs() < 1e-12);
            }
            other => panic!("expected divergence, got {:?}", other),
        }
    }

    #[test]
    fn test_weights_stay_normalised() {
        let mut trainer = Trainer::new(u00_config());
        trainer.load_text(b"a X\nb Y\n\nb Y\na X\n").unwrap();
        let model = trainer.train().unwrap();
        let norm: f64 = model.weights().iter().map(|w| w * w).sum();
        assert!((norm - 1.0).abs() < 1e-9);
        assert!(model.report().iterations <= 10);
    }
}
