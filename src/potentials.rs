use crate::features::ChainFeatureVectors;
use crate::tag_set::TagSet;
use crate::vector::Vector;

/// Log-potentials of one input under a set of weight vectors.
///
/// `node(n, k)` is the dot product of the node vector at `n` with the weights
/// of tag `k`. `transition(n, prev, k)` additionally adds the dot product of
/// the edge vector `(n, prev)` with the weights of tag `k`. Structural zeros
/// are folded in as negative infinity: illegal start tags at position 0,
/// illegal end tags at the last position, and illegal transitions.
#[derive(Clone, Debug, Default)]
pub struct Potentials {
    num_tokens: usize,
    num_tags: usize,

    // [N][K]
    nodes: Vec<f64>,

    // [N-1][K][K]
    transitions: Vec<f64>,
}

impl Potentials {
    pub fn new(vectors: &ChainFeatureVectors, weights: &[Vector], tag_set: &TagSet) -> Self {
        let num_tokens = vectors.num_tokens();
        let num_tags = tag_set.num_tags();
        let mut nodes = vec![0.0; num_tokens * num_tags];
        for n in 0..num_tokens {
            let node_vector = vectors.node(n);
            for (k, weight) in weights.iter().enumerate() {
                let illegal = (n == 0 && !tag_set.is_legal_start(k))
                    || (n == num_tokens - 1 && !tag_set.is_legal_end(k));
                nodes[n * num_tags + k] = if illegal {
                    f64::NEG_INFINITY
                } else {
                    node_vector.dot(weight)
                };
            }
        }
        let mut transitions = vec![0.0; num_tokens.saturating_sub(1) * num_tags * num_tags];
        for n in 1..num_tokens {
            for prev in 0..num_tags {
                let edge_vector = vectors.edge(n, prev);
                let offset = ((n - 1) * num_tags + prev) * num_tags;
                for (k, weight) in weights.iter().enumerate() {
                    let node = nodes[n * num_tags + k];
                    transitions[offset + k] =
                        if node == f64::NEG_INFINITY || !tag_set.is_legal_transition(prev, k) {
                            f64::NEG_INFINITY
                        } else {
                            node + edge_vector.dot(weight)
                        };
                }
            }
        }
        Self {
            num_tokens,
            num_tags,
            nodes,
            transitions,
        }
    }

    #[inline(always)]
    pub fn num_tokens(&self) -> usize {
        self.num_tokens
    }

    #[inline(always)]
    pub fn num_tags(&self) -> usize {
        self.num_tags
    }

    #[inline(always)]
    pub fn node(&self, n: usize, k: usize) -> f64 {
        self.nodes[n * self.num_tags + k]
    }

    /// Potential of tag `k` at position `n` (`n >= 1`) following tag `prev`.
    #[inline(always)]
    pub fn transition(&self, n: usize, prev: usize, k: usize) -> f64 {
        self.transitions[((n - 1) * self.num_tags + prev) * self.num_tags + k]
    }

    /// Unnormalized score of a full tag index sequence.
    pub fn path_score(&self, path: &[usize]) -> f64 {
        let Some(&first) = path.first() else {
            return 0.0;
        };
        let mut score = self.node(0, first);
        for n in 1..path.len() {
            score += self.transition(n, path[n - 1], path[n]);
        }
        score
    }

    /// Takes the `[N-1][K][K]` transition buffer out.
    #[inline(always)]
    pub fn into_transitions(self) -> Vec<f64> {
        self.transitions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::symbol_table::SymbolTable;
    use crate::test_utils::{
        generate_test_potentials, generate_test_tag_set, generate_test_weights, StaticFeatures,
    };

    #[test]
    fn test_node_and_transition() {
        let features = StaticFeatures {
            nodes: vec![
                crate::test_utils::hashmap!["a".to_string() => 1.0],
                crate::test_utils::hashmap!["b".to_string() => 2.0],
            ],
            edges: vec![
                crate::test_utils::hashmap!["p0".to_string() => 1.0],
                crate::test_utils::hashmap![],
            ],
            num_tags: 2,
        };
        let symbols = SymbolTable::from_symbols(
            ["a", "b", "p0"].iter().map(|s| s.to_string()).collect(),
        )
        .unwrap();
        let vectors = ChainFeatureVectors::new(&features, 2, &symbols, false);
        let weights = vec![
            Vector::dense(vec![1.0, 0.5, 3.0]),
            Vector::dense(vec![-1.0, 0.25, 0.0]),
        ];
        let tag_set = TagSet::fully_connected(vec!["A".into(), "B".into()]).unwrap();
        let potentials = Potentials::new(&vectors, &weights, &tag_set);
        assert_eq!(1.0, potentials.node(0, 0));
        assert_eq!(-1.0, potentials.node(0, 1));
        assert_eq!(1.0, potentials.node(1, 0));
        assert_eq!(0.5, potentials.node(1, 1));
        assert_eq!(4.0, potentials.transition(1, 0, 0));
        assert_eq!(0.5, potentials.transition(1, 0, 1));
        assert_eq!(1.0, potentials.transition(1, 1, 0));
        assert_eq!(5.0, potentials.path_score(&[0, 0]));
    }

    #[test]
    fn test_structural_zeros() {
        let tag_set = generate_test_tag_set();
        let weights = generate_test_weights(&tag_set);
        let potentials = generate_test_potentials(&["x", "y", "z"], &weights, &tag_set);
        for k in 0..tag_set.num_tags() {
            assert_eq!(
                !tag_set.is_legal_start(k),
                potentials.node(0, k) == f64::NEG_INFINITY
            );
            for prev in 0..tag_set.num_tags() {
                if !tag_set.is_legal_transition(prev, k) {
                    assert_eq!(f64::NEG_INFINITY, potentials.transition(1, prev, k));
                }
                if !tag_set.is_legal_end(k) {
                    assert_eq!(f64::NEG_INFINITY, potentials.transition(2, prev, k));
                }
            }
        }
    }
}
