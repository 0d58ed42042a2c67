use bitflags::bitflags;

use crate::dataset::Observation;
use crate::error::{Error, Result};

/// Index of a node inside its lattice
pub type NodeId = usize;

/// Index of a label in the label dictionary
pub type LabelId = u32;

/// Role of a node in the lattice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Sentinel before the first position
    Begin,
    /// Sentinel after the last position
    End,
    /// Label recorded in the training data
    Real,
    /// Synthetic alternative label of a training position
    Dummy,
    /// Label alternative of a prediction position
    Candidate,
}

impl NodeKind {
    pub fn is_sentinel(self) -> bool {
        matches!(self, NodeKind::Begin | NodeKind::End)
    }
}

bitflags! {
    /// Per-node computation state
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
    pub struct Computed: u8 {
        /// Forward value
        const ALPHA = 0x01;
        /// Backward value
        const BETA = 0x02;
        /// Viterbi score and backpointer
        const VITERBI = 0x04;
        const ALL = 0xFF;
    }
}

/// One (position, candidate label) node
#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    /// `None` for the sentinels
    pub label: Option<LabelId>,
    /// Column index: 0 is BEGIN, `len() + 1` is END
    pub position: usize,
    /// Index among the label alternatives of the same column
    pub slot: usize,
    /// Predecessor that was current when this node was created
    pub left: Option<NodeId>,
    /// First node of the next column
    pub right: Option<NodeId>,
    /// Next label alternative of the same column
    pub next: Option<NodeId>,
    pub alpha: f64,
    pub beta: f64,
    /// State features active at this node
    pub feature_ids: Vec<u32>,
    /// Transition feature for each left alternative, indexed by its slot
    pub transition_ids: Vec<Option<u32>>,
    pub best_predecessor: Option<NodeId>,
    pub score: f64,
    computed: Computed,
}

impl Node {
    fn new(kind: NodeKind, label: Option<LabelId>, position: usize, slot: usize) -> Self {
        Self {
            kind,
            label,
            position,
            slot,
            left: None,
            right: None,
            next: None,
            alpha: 0.0,
            beta: 0.0,
            feature_ids: Vec::new(),
            transition_ids: Vec::new(),
            best_predecessor: None,
            score: 0.0,
            computed: Computed::empty(),
        }
    }

    /// Features active on the edge from `left` into this node
    pub fn pair_features<'n>(&'n self, left: &Node) -> impl Iterator<Item = u32> + 'n {
        let transition = self.transition_ids.get(left.slot).copied().flatten();
        self.feature_ids.iter().copied().chain(transition)
    }

    /// Sum of the weights of [`pair_features`](Self::pair_features).
    ///
    /// Ids without a weight contribute nothing.
    pub fn inner_product(&self, weights: &[f64], left: &Node) -> f64 {
        self.pair_features(left)
            .filter_map(|fid| weights.get(fid as usize))
            .sum()
    }

    pub fn is_computed(&self, what: Computed) -> bool {
        self.computed.contains(what)
    }

    pub(crate) fn mark(&mut self, what: Computed) {
        self.computed.insert(what);
    }

    fn reset(&mut self, what: Computed) {
        if what.contains(Computed::ALPHA) {
            self.alpha = 0.0;
        }
        if what.contains(Computed::BETA) {
            self.beta = 0.0;
        }
        if what.contains(Computed::VITERBI) {
            self.score = 0.0;
            self.best_predecessor = None;
        }
        self.computed.remove(what);
    }
}

/// DAG of candidate nodes for one observation sequence.
///
/// Nodes live in an arena addressed by [`NodeId`]. Column 0 holds the BEGIN
/// sentinel, columns `1..=len()` hold one node per label and the last column
/// holds the END sentinel.
#[derive(Debug, Clone)]
pub struct Lattice {
    nodes: Vec<Node>,
    columns: Vec<Vec<NodeId>>,
    observations: Vec<Observation>,
}

impl Lattice {
    /// Build the lattice of a labeled sequence.
    ///
    /// Every position gets the REAL node of its recorded label followed by
    /// one DUMMY node for every other label in `0..num_labels`.
    pub fn training(
        observations: &[Observation],
        labels: &[LabelId],
        num_labels: usize,
    ) -> Result<Self> {
        if observations.len() != labels.len() {
            return Err(Error::LengthMismatch {
                observations: observations.len(),
                labels: labels.len(),
            });
        }
        if observations.is_empty() {
            return Err(Error::EmptySequence);
        }
        let mut builder = Builder::new(observations);
        for (t, &real) in labels.iter().enumerate() {
            if real as usize >= num_labels {
                return Err(Error::MalformedLattice(format!(
                    "label {} at position {} is outside the vocabulary of {} labels",
                    real,
                    t + 1,
                    num_labels
                )));
            }
            let others = (0..num_labels as LabelId)
                .filter(|&l| l != real)
                .map(|l| (NodeKind::Dummy, l));
            let column: Vec<_> = std::iter::once((NodeKind::Real, real))
                .chain(others)
                .collect();
            builder.push_column(&column)?;
        }
        builder.finish()
    }

    /// Build the lattice of an unlabeled sequence with one candidate node per label
    pub fn prediction(observations: &[Observation], num_labels: usize) -> Result<Self> {
        let mut builder = Builder::new(observations);
        let column: Vec<_> = (0..num_labels as LabelId)
            .map(|l| (NodeKind::Candidate, l))
            .collect();
        for _ in observations {
            builder.push_column(&column)?;
        }
        builder.finish()
    }

    /// Number of observation positions
    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn begin(&self) -> NodeId {
        self.columns[0][0]
    }

    pub fn end(&self) -> NodeId {
        self.columns[self.columns.len() - 1][0]
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id]
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// All columns, sentinels included
    pub fn columns(&self) -> &[Vec<NodeId>] {
        &self.columns
    }

    pub fn column(&self, position: usize) -> &[NodeId] {
        &self.columns[position]
    }

    /// Observation at a column, `None` for the sentinel columns
    pub fn observation(&self, position: usize) -> Option<&Observation> {
        if position == 0 {
            return None;
        }
        self.observations.get(position - 1)
    }

    /// Label alternatives of the column before `id`
    pub fn left_alternatives(&self, id: NodeId) -> &[NodeId] {
        match self.nodes[id].position {
            0 => &[],
            p => self.columns[p - 1].as_slice(),
        }
    }

    /// Label alternatives of the column after `id`
    pub fn right_alternatives(&self, id: NodeId) -> &[NodeId] {
        let p = self.nodes[id].position;
        if p + 1 < self.columns.len() {
            self.columns[p + 1].as_slice()
        } else {
            &[]
        }
    }

    /// Nodes reached by following `left` from END, in position order.
    ///
    /// The result starts at position 1 and includes END. For a training
    /// lattice this is the REAL chain.
    pub fn path(&self) -> Vec<NodeId> {
        let mut path = Vec::with_capacity(self.len() + 1);
        let mut id = self.end();
        while let Some(left) = self.nodes[id].left {
            path.push(id);
            id = left;
        }
        path.reverse();
        path
    }

    /// Clear the selected per-node computation state
    pub fn reset(&mut self, what: Computed) {
        for node in &mut self.nodes {
            node.reset(what);
        }
    }

    /// Verify the structural invariants of the node graph
    pub fn check(&self) -> Result<()> {
        let last = self.columns.len() - 1;
        let width = if last > 1 { self.columns[1].len() } else { 0 };
        for (position, column) in self.columns.iter().enumerate() {
            let sentinel = position == 0 || position == last;
            if sentinel && column.len() != 1 {
                return Err(malformed(position, "sentinel column must hold one node"));
            }
            if !sentinel && column.len() != width {
                return Err(malformed(position, "columns differ in label count"));
            }
            let reals = column
                .iter()
                .filter(|&&id| self.nodes[id].kind == NodeKind::Real)
                .count();
            let dummies = column
                .iter()
                .filter(|&&id| self.nodes[id].kind == NodeKind::Dummy)
                .count();
            if (reals > 0 || dummies > 0) && reals != 1 {
                return Err(malformed(position, "expected exactly one REAL node"));
            }
            for (slot, &id) in column.iter().enumerate() {
                let node = &self.nodes[id];
                let expected = match position {
                    0 => node.kind == NodeKind::Begin,
                    p if p == last => node.kind == NodeKind::End,
                    _ => !node.kind.is_sentinel(),
                };
                if !expected || node.position != position || node.slot != slot {
                    return Err(malformed(position, "node misplaced"));
                }
                let next = column.get(slot + 1).copied();
                if node.next != next {
                    return Err(malformed(position, "broken sibling chain"));
                }
                match node.left {
                    None if position != 0 => {
                        return Err(malformed(position, "missing left link"));
                    }
                    Some(left) if self.nodes[left].position + 1 != position => {
                        return Err(malformed(position, "left link skips a column"));
                    }
                    _ => {}
                }
                match node.right {
                    None if position != last => {
                        return Err(malformed(position, "missing right link"));
                    }
                    Some(right) if self.nodes[right].position != position + 1 => {
                        return Err(malformed(position, "right link skips a column"));
                    }
                    _ => {}
                }
                if node.label.is_some() == sentinel {
                    return Err(malformed(position, "label does not match node kind"));
                }
            }
            for (i, &a) in column.iter().enumerate() {
                if column[i + 1..]
                    .iter()
                    .any(|&b| self.nodes[a].label == self.nodes[b].label)
                {
                    return Err(malformed(position, "duplicate label alternative"));
                }
            }
        }
        Ok(())
    }
}

fn malformed(position: usize, what: &str) -> Error {
    Error::MalformedLattice(format!("column {}: {}", position, what))
}

/// Appends columns while maintaining the left/right/next links
struct Builder {
    lattice: Lattice,
    /// Node whose column was appended last and that new nodes attach to
    current: NodeId,
}

impl Builder {
    fn new(observations: &[Observation]) -> Self {
        let mut lattice = Lattice {
            nodes: Vec::with_capacity(2),
            columns: Vec::with_capacity(observations.len() + 2),
            observations: observations.to_vec(),
        };
        lattice.nodes.push(Node::new(NodeKind::Begin, None, 0, 0));
        lattice.columns.push(vec![0]);
        Self {
            lattice,
            current: 0,
        }
    }

    fn push_column(&mut self, alternatives: &[(NodeKind, LabelId)]) -> Result<()> {
        let position = self.lattice.columns.len();
        if alternatives.is_empty() {
            return Err(Error::EmptyPosition { position });
        }
        let column = alternatives
            .iter()
            .enumerate()
            .map(|(slot, &(kind, label))| self.push_node(kind, Some(label), position, slot))
            .collect::<Vec<_>>();
        for pair in column.windows(2) {
            self.lattice.nodes[pair[0]].next = Some(pair[1]);
        }
        // A REAL node becomes the predecessor of the next column; otherwise the column head
        self.current = column
            .iter()
            .copied()
            .find(|&id| self.lattice.nodes[id].kind == NodeKind::Real)
            .unwrap_or(column[0]);
        self.backfill(position, column[0]);
        self.lattice.columns.push(column);
        Ok(())
    }

    fn push_node(
        &mut self,
        kind: NodeKind,
        label: Option<LabelId>,
        position: usize,
        slot: usize,
    ) -> NodeId {
        let id = self.lattice.nodes.len();
        let mut node = Node::new(kind, label, position, slot);
        node.left = Some(self.current);
        self.lattice.nodes.push(node);
        id
    }

    /// Point every node of the previous column that has no `right` yet at `first`
    fn backfill(&mut self, position: usize, first: NodeId) {
        for &id in &self.lattice.columns[position - 1] {
            let node = &mut self.lattice.nodes[id];
            if node.right.is_none() {
                node.right = Some(first);
            }
        }
    }

    fn finish(mut self) -> Result<Lattice> {
        let position = self.lattice.columns.len();
        let end = self.push_node(NodeKind::End, None, position, 0);
        self.backfill(position, end);
        self.lattice.columns.push(vec![end]);
        self.lattice.check()?;
        Ok(self.lattice)
    }
}
