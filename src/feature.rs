use std::borrow::Cow;

use crate::config::Templates;
use crate::dictionary::Dictionary;
use crate::lattice::{Lattice, NodeId, NodeKind};

/// Token standing in for positions before the first observation
pub const BOS_MARKER: &str = "__BOS__";
/// Token standing in for positions after the last observation
pub const EOS_MARKER: &str = "__EOS__";

/// Observation offsets read by each context template
const CONTEXT_TEMPLATES: [(Templates, &str, &[isize]); 10] = [
    (Templates::U00, "U00", &[0]),
    (Templates::U01, "U01", &[-1]),
    (Templates::U02, "U02", &[-1, 0]),
    (Templates::U03, "U03", &[-2]),
    (Templates::U04, "U04", &[-2, -1, 0]),
    (Templates::U05, "U05", &[1]),
    (Templates::U06, "U06", &[0, 1]),
    (Templates::U07, "U07", &[2]),
    (Templates::U08, "U08", &[0, 1, 2]),
    (Templates::U09, "U09", &[-1, 0, 1]),
];

/// Bijection between feature names and dense feature ids.
///
/// Ids are handed out in first-seen order and never change afterwards.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureTable {
    names: Dictionary,
}

impl FeatureTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn id(&self, name: &str) -> Option<u32> {
        self.names.get(name)
    }

    pub fn name(&self, id: u32) -> Option<&str> {
        self.names.name(id)
    }

    /// Feature names in id order
    pub fn names(&self) -> &[String] {
        self.names.names()
    }

    pub fn clear(&mut self) {
        self.names.clear();
    }

    fn get_or_insert(&mut self, name: &str) -> u32 {
        self.names.get_or_insert(name)
    }
}

/// How unseen feature names are treated during extraction
#[derive(Debug)]
pub enum Vocabulary<'a> {
    /// Training: unseen names get the next id
    Growing(&'a mut FeatureTable),
    /// Prediction: unseen names are skipped
    Frozen(&'a FeatureTable),
}

impl Vocabulary<'_> {
    fn resolve(&mut self, name: &str) -> Option<u32> {
        match self {
            Vocabulary::Growing(table) => Some(table.get_or_insert(name)),
            Vocabulary::Frozen(table) => table.id(name),
        }
    }
}

/// Applies the enabled templates to lattice nodes
#[derive(Debug, Clone, Copy)]
pub struct FeatureExtractor<'a> {
    templates: Templates,
    labels: &'a Dictionary,
}

impl<'a> FeatureExtractor<'a> {
    pub fn new(templates: Templates, labels: &'a Dictionary) -> Self {
        Self { templates, labels }
    }

    /// Extract features for every node, END last
    pub fn extract_lattice(&self, lattice: &mut Lattice, vocab: &mut Vocabulary<'_>) {
        for position in 1..lattice.columns().len() {
            for slot in 0..lattice.column(position).len() {
                let id = lattice.column(position)[slot];
                self.extract(lattice, id, vocab);
            }
        }
    }

    /// Recompute the feature ids of one node.
    ///
    /// Previous ids are discarded first, so repeated calls give the same lists.
    pub fn extract(&self, lattice: &mut Lattice, id: NodeId, vocab: &mut Vocabulary<'_>) {
        let mut transition_ids = Vec::new();
        let mut feature_ids = Vec::new();
        let node = lattice.node(id);
        if node.kind != NodeKind::Begin {
            let label = self.label_name(lattice, id);
            if self.templates.contains(Templates::T) {
                for &left in lattice.left_alternatives(id) {
                    let name = format!("T:{}:{}", self.label_name(lattice, left), label);
                    transition_ids.push(vocab.resolve(&name));
                }
            } else {
                transition_ids.resize(lattice.left_alternatives(id).len(), None);
            }
            if !node.kind.is_sentinel() {
                let position = node.position;
                for &(flag, tag, offsets) in &CONTEXT_TEMPLATES {
                    if !self.templates.contains(flag) {
                        continue;
                    }
                    // U09 needs both neighbours inside the sequence
                    if flag == Templates::U09 && (position == 1 || position == lattice.len()) {
                        continue;
                    }
                    let window = offsets
                        .iter()
                        .map(|&offset| token(lattice, position as isize + offset))
                        .collect::<Vec<_>>()
                        .join("|");
                    let name = format!("{}:{}:{}", tag, label, window);
                    if let Some(fid) = vocab.resolve(&name) {
                        feature_ids.push(fid);
                    }
                }
            }
        }
        let node = lattice.node_mut(id);
        node.transition_ids = transition_ids;
        node.feature_ids = feature_ids;
    }

    fn label_name(&self, lattice: &Lattice, id: NodeId) -> Cow<'a, str> {
        let node = lattice.node(id);
        match node.kind {
            NodeKind::Begin => Cow::Borrowed(BOS_MARKER),
            NodeKind::End => Cow::Borrowed(EOS_MARKER),
            _ => escape(
                node.label
                    .and_then(|label| self.labels.name(label))
                    .unwrap_or_default(),
            ),
        }
    }
}

/// Backslash-escape the characters that delimit the parts of a feature name
fn escape(part: &str) -> Cow<'_, str> {
    let special = |c: char| matches!(c, '\\' | ':' | '|' | '/');
    if !part.contains(special) {
        return Cow::Borrowed(part);
    }
    let mut escaped = String::with_capacity(part.len() + 4);
    for c in part.chars() {
        if special(c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    Cow::Owned(escaped)
}

/// Token of a position, with boundary markers outside the sequence
fn token(lattice: &Lattice, position: isize) -> Cow<'_, str> {
    if position < 1 {
        return Cow::Borrowed(BOS_MARKER);
    }
    match lattice.observation(position as usize) {
        Some(fields) if fields.len() == 1 => escape(&fields[0]),
        Some(fields) => Cow::Owned(
            fields
                .iter()
                .map(|field| escape(field))
                .collect::<Vec<_>>()
                .join("/"),
        ),
        None => Cow::Borrowed(EOS_MARKER),
    }
}
