use crate::lattice::{Computed, Lattice, NodeId, NodeKind};

/// Subtracted from every inner product before exponentiation
pub const STABILITY_OFFSET: f64 = 1.0;

/// Compatibility score between a node and one of its predecessors
pub trait Potential {
    fn psi(&self, lattice: &Lattice, node: NodeId, left: NodeId) -> f64;
}

/// `psi = exp(w · phi(node, left) - 1)`
#[derive(Debug, Clone, Copy)]
pub struct LogLinear<'w> {
    weights: &'w [f64],
}

impl<'w> LogLinear<'w> {
    pub fn new(weights: &'w [f64]) -> Self {
        Self { weights }
    }
}

impl Potential for LogLinear<'_> {
    fn psi(&self, lattice: &Lattice, node: NodeId, left: NodeId) -> f64 {
        let prod = lattice
            .node(node)
            .inner_product(self.weights, lattice.node(left));
        (prod - STABILITY_OFFSET).exp()
    }
}

impl<F> Potential for F
where
    F: Fn(&Lattice, NodeId, NodeId) -> f64,
{
    fn psi(&self, lattice: &Lattice, node: NodeId, left: NodeId) -> f64 {
        self(lattice, node, left)
    }
}

/// Forward-backward passes over a lattice.
///
/// Values are evaluated column by column. A node is computed at most once
/// between two resets; the [`Computed`] flags, not the stored value, tell
/// whether a node still needs evaluation.
#[derive(Debug)]
pub struct ForwardBackward<'p, P: Potential> {
    potential: &'p P,
}

impl<'p, P: Potential> ForwardBackward<'p, P> {
    pub fn new(potential: &'p P) -> Self {
        Self { potential }
    }

    /// Total mass of the path prefixes ending at `id`
    pub fn alpha(&self, lattice: &mut Lattice, id: NodeId) -> f64 {
        let position = lattice.node(id).position;
        self.forward_to(lattice, position);
        lattice.node(id).alpha
    }

    /// Total mass of the path suffixes starting at `id`
    pub fn beta(&self, lattice: &mut Lattice, id: NodeId) -> f64 {
        let position = lattice.node(id).position;
        self.backward_to(lattice, position);
        lattice.node(id).beta
    }

    /// Compute alpha for every node
    pub fn forward(&self, lattice: &mut Lattice) {
        let last = lattice.columns().len() - 1;
        self.forward_to(lattice, last);
    }

    /// Compute beta for every node
    pub fn backward(&self, lattice: &mut Lattice) {
        self.backward_to(lattice, 0);
    }

    fn forward_to(&self, lattice: &mut Lattice, position: usize) {
        for p in 0..=position {
            for slot in 0..lattice.column(p).len() {
                let id = lattice.column(p)[slot];
                if lattice.node(id).is_computed(Computed::ALPHA) {
                    continue;
                }
                let alpha = if lattice.node(id).kind == NodeKind::Begin {
                    1.0
                } else {
                    lattice
                        .left_alternatives(id)
                        .iter()
                        .map(|&left| {
                            debug_assert!(lattice.node(left).is_computed(Computed::ALPHA));
                            self.potential.psi(lattice, id, left) * lattice.node(left).alpha
                        })
                        .sum()
                };
                let node = lattice.node_mut(id);
                node.alpha = alpha;
                node.mark(Computed::ALPHA);
            }
        }
    }

    fn backward_to(&self, lattice: &mut Lattice, position: usize) {
        let last = lattice.columns().len() - 1;
        for p in (position..=last).rev() {
            for slot in 0..lattice.column(p).len() {
                let id = lattice.column(p)[slot];
                if lattice.node(id).is_computed(Computed::BETA) {
                    continue;
                }
                let beta = if lattice.node(id).kind == NodeKind::End {
                    1.0
                } else {
                    lattice
                        .right_alternatives(id)
                        .iter()
                        .map(|&right| {
                            debug_assert!(lattice.node(right).is_computed(Computed::BETA));
                            self.potential.psi(lattice, right, id) * lattice.node(right).beta
                        })
                        .sum()
                };
                let node = lattice.node_mut(id);
                node.beta = beta;
                node.mark(Computed::BETA);
            }
        }
    }

    /// Partition function: alpha summed over the label alternatives next to END.
    ///
    /// The compatibility of the final transition into END is not included.
    pub fn partition(&self, lattice: &mut Lattice) -> f64 {
        let end = lattice.end();
        let last = lattice.node(end).position - 1;
        self.forward_to(lattice, last);
        lattice
            .left_alternatives(end)
            .iter()
            .map(|&id| lattice.node(id).alpha)
            .sum()
    }

    /// Beta summed over the label alternatives next to BEGIN.
    ///
    /// Agrees with [`partition`](Self::partition) when the compatibilities
    /// of the boundary edges are 1.
    pub fn partition_backward(&self, lattice: &mut Lattice) -> f64 {
        let begin = lattice.begin();
        self.backward_to(lattice, 1);
        lattice
            .right_alternatives(begin)
            .iter()
            .map(|&id| lattice.node(id).beta)
            .sum()
    }

    /// `P(node, left | X)` once both passes have run
    pub fn pair_probability(&self, lattice: &Lattice, node: NodeId, left: NodeId, z: f64) -> f64 {
        self.potential.psi(lattice, node, left) * lattice.node(left).alpha * lattice.node(node).beta
            / z
    }

    /// Add the model expectation of every feature to `counts`
    pub fn expected_counts_into(&self, lattice: &Lattice, z: f64, counts: &mut [f64]) {
        for column in &lattice.columns()[1..] {
            for &id in column {
                let node = lattice.node(id);
                for &left in lattice.left_alternatives(id) {
                    let prob = self.pair_probability(lattice, id, left, z);
                    for fid in node.pair_features(lattice.node(left)) {
                        counts[fid as usize] += prob;
                    }
                }
            }
        }
    }

    /// Sum of `log psi` along the `left` chain ending at END
    pub fn path_log_psi(&self, lattice: &Lattice) -> f64 {
        lattice
            .path()
            .into_iter()
            .filter_map(|id| lattice.node(id).left.map(|left| (id, left)))
            .map(|(id, left)| self.potential.psi(lattice, id, left).ln())
            .sum()
    }
}

/// Add the occurrences of every feature along the REAL chain to `counts`
pub fn observed_counts_into(lattice: &Lattice, counts: &mut [f64]) {
    for id in lattice.path() {
        let node = lattice.node(id);
        if let Some(left) = node.left {
            for fid in node.pair_features(lattice.node(left)) {
                counts[fid as usize] += 1.0;
            }
        }
    }
}
