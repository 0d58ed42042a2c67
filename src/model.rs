use crate::config::Templates;
use crate::dictionary::Dictionary;
use crate::feature::FeatureTable;
use crate::tagger::Tagger;

/// Outcome of a training run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainingReport {
    /// Number of iterations performed
    pub iterations: usize,
    /// Corpus score of the last iteration
    pub score: f64,
    /// Whether the score change dropped below the threshold
    pub converged: bool,
}

/// A trained CRF model.
///
/// Holds the label vocabulary, the feature table and one weight per feature.
/// None of them change after training.
#[derive(Debug, Clone)]
pub struct Model {
    templates: Templates,
    labels: Dictionary,
    features: FeatureTable,
    weights: Vec<f64>,
    report: TrainingReport,
}

impl Model {
    pub(crate) fn new(
        templates: Templates,
        labels: Dictionary,
        features: FeatureTable,
        weights: Vec<f64>,
        report: TrainingReport,
    ) -> Self {
        debug_assert_eq!(features.len(), weights.len());
        Self {
            templates,
            labels,
            features,
            weights,
            report,
        }
    }

    /// Templates the model was trained with
    pub fn templates(&self) -> Templates {
        self.templates
    }

    pub fn num_labels(&self) -> usize {
        self.labels.len()
    }

    pub fn num_features(&self) -> usize {
        self.features.len()
    }

    /// Labels in id order
    pub fn labels(&self) -> &[String] {
        self.labels.names()
    }

    pub fn to_label(&self, id: u32) -> Option<&str> {
        self.labels.name(id)
    }

    pub fn to_label_id(&self, label: &str) -> Option<u32> {
        self.labels.get(label)
    }

    pub(crate) fn label_dictionary(&self) -> &Dictionary {
        &self.labels
    }

    pub fn feature_table(&self) -> &FeatureTable {
        &self.features
    }

    /// Feature names in id order
    pub fn feature_names(&self) -> &[String] {
        self.features.names()
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Weight of a feature by name, `None` for unknown features
    pub fn weight(&self, feature: &str) -> Option<f64> {
        self.features
            .id(feature)
            .and_then(|id| self.weights.get(id as usize).copied())
    }

    /// (name, weight) pairs in feature id order
    pub fn weight_table(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.features
            .names()
            .iter()
            .map(String::as_str)
            .zip(self.weights.iter().copied())
    }

    pub fn report(&self) -> &TrainingReport {
        &self.report
    }

    /// Create a tagger for this model
    pub fn tagger(&self) -> Tagger<'_> {
        Tagger::new(self)
    }
}
