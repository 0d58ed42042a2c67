use crate::lattice::{Computed, LabelId, Lattice};

/// Find the best label path through `lattice`.
///
/// Every node keeps its best score and the predecessor that produced it, so
/// the lattice can be inspected after decoding. Ties go to the predecessor
/// seen first. Returns the labels in position order and the score of END.
pub fn viterbi(lattice: &mut Lattice, weights: &[f64]) -> (Vec<LabelId>, f64) {
    lattice.reset(Computed::VITERBI);
    let begin = lattice.begin();
    lattice.node_mut(begin).mark(Computed::VITERBI);

    // Compute the scores at (t, *) from the scores at (t - 1, *)
    for position in 1..lattice.columns().len() {
        for slot in 0..lattice.column(position).len() {
            let id = lattice.column(position)[slot];
            let node = lattice.node(id);
            let mut max_score = f64::MIN;
            let mut argmax = None;
            for &left in lattice.left_alternatives(id) {
                let left_node = lattice.node(left);
                let score = left_node.score + node.inner_product(weights, left_node);
                // Store this path if it has the maximum score
                if max_score < score {
                    max_score = score;
                    argmax = Some(left);
                }
            }
            let node = lattice.node_mut(id);
            node.score = max_score;
            node.best_predecessor = argmax;
            node.mark(Computed::VITERBI);
        }
    }

    // Tag labels by tracing the backward links from END
    let end = lattice.end();
    let mut labels = Vec::with_capacity(lattice.len());
    let mut cursor = lattice.node(end).best_predecessor;
    while let Some(id) = cursor {
        let node = lattice.node(id);
        match node.label {
            Some(label) => labels.push(label),
            None => break,
        }
        cursor = node.best_predecessor;
    }
    labels.reverse();
    (labels, lattice.node(end).score)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Templates;
    use crate::dictionary::Dictionary;
    use crate::feature::{FeatureExtractor, FeatureTable, Vocabulary};

    fn setup(tokens: &[&str], names: &[&str], templates: Templates) -> (Lattice, FeatureTable) {
        let observations: Vec<_> = tokens.iter().map(|t| vec![t.to_string()]).collect();
        let mut dict = Dictionary::new();
        for name in names {
            dict.get_or_insert(name);
        }
        let mut lattice = Lattice::prediction(&observations, names.len()).unwrap();
        let mut table = FeatureTable::new();
        FeatureExtractor::new(templates, &dict)
            .extract_lattice(&mut lattice, &mut Vocabulary::Growing(&mut table));
        (lattice, table)
    }

    #[test]
    fn test_state_features_pick_labels() {
        let (mut lattice, table) = setup(&["the", "dog"], &["DT", "NN"], Templates::U00);
        let mut weights = vec![0.0; table.len()];
        weights[table.id("U00:DT:the").unwrap() as usize] = 1.0;
        weights[table.id("U00:NN:dog").unwrap() as usize] = 2.0;
        let (labels, score) = viterbi(&mut lattice, &weights);
        assert_eq!(labels, vec![0, 1]);
        assert_eq!(score, 3.0);
    }

    #[test]
    fn test_transitions_override_states() {
        let (mut lattice, table) = setup(&["a", "b"], &["X", "Y"], Templates::U00 | Templates::T);
        let mut weights = vec![0.0; table.len()];
        weights[table.id("U00:X:a").unwrap() as usize] = 1.0;
        weights[table.id("U00:X:b").unwrap() as usize] = 1.0;
        weights[table.id("T:X:X").unwrap() as usize] = -5.0;
        let (labels, _) = viterbi(&mut lattice, &weights);
        assert_eq!(labels.len(), 2);
        assert_ne!(labels, vec![0, 0]);
    }

    #[test]
    fn test_ties_go_to_first_predecessor() {
        let (mut lattice, table) = setup(&["a", "b", "c"], &["X", "Y", "Z"], Templates::U00);
        let weights = vec![0.0; table.len()];
        let (labels, score) = viterbi(&mut lattice, &weights);
        assert_eq!(labels, vec![0, 0, 0]);
        assert_eq!(score, 0.0);
        for position in 2..lattice.columns().len() {
            for &id in lattice.column(position) {
                assert_eq!(
                    lattice.node(id).best_predecessor,
                    Some(lattice.column(position - 1)[0])
                );
            }
        }
    }

    #[test]
    fn test_decoding_is_repeatable() {
        let (mut lattice, table) =
            setup(&["a", "b", "a", "c"], &["X", "Y"], Templates::all());
        let weights: Vec<f64> = (0..table.len()).map(|i| ((i * 7) % 5) as f64 - 2.0).collect();
        let first = viterbi(&mut lattice, &weights);
        let scores: Vec<f64> = lattice.nodes().iter().map(|n| n.score).collect();
        let second = viterbi(&mut lattice, &weights);
        assert_eq!(first, second);
        let again: Vec<f64> = lattice.nodes().iter().map(|n| n.score).collect();
        assert_eq!(scores, again);
    }

    #[test]
    fn test_empty_lattice() {
        let mut lattice = Lattice::prediction(&[], 2).unwrap();
        let (labels, score) = viterbi(&mut lattice, &[]);
        assert!(labels.is_empty());
        assert_eq!(score, 0.0);
    }
}
