use hashbrown::HashMap;

use crate::symbol_table::SymbolTable;
use crate::vector::Vector;

/// Named feature values.
pub type FeatureMap = HashMap<String, f64>;

/// Features extracted from a single input sequence.
///
/// Node features describe a position; edge features describe a position
/// together with the tag assigned to the previous position.
pub trait ChainFeatures {
    /// Returns the number of tokens in the input.
    fn num_tokens(&self) -> usize;

    /// Returns the features of the node at position `n`.
    fn node_features(&self, n: usize) -> FeatureMap;

    /// Returns the features of the edge entering position `n` (`n >= 1`) from
    /// tag index `prev_tag` at position `n - 1`.
    fn edge_features(&self, n: usize, prev_tag: usize) -> FeatureMap;
}

/// Converts an input sequence into [`ChainFeatures`].
///
/// Extraction must be deterministic for a given pair of tokens and tags.
/// The tags passed in are the labels of the model, in index order, so that
/// `prev_tag` indices given to [`ChainFeatures::edge_features`] can be resolved.
pub trait ChainFeatureExtractor<E> {
    /// Features produced by this extractor.
    type Features: ChainFeatures;

    /// Extracts features of the given tokens.
    fn extract(&self, tokens: &[E], tags: &[String]) -> Self::Features;
}

/// Sparse vectors of one input, indexed by a feature symbol table.
///
/// Features missing from the symbol table are dropped. When an intercept is
/// used, dimension 0 of every node vector is set to 1.0.
#[derive(Clone, Debug)]
pub struct ChainFeatureVectors {
    num_tags: usize,
    nodes: Vec<Vector>,
    edges: Vec<Vector>,
}

impl ChainFeatureVectors {
    /// Materializes the feature vectors of one input.
    pub fn new<F>(features: &F, num_tags: usize, symbols: &SymbolTable, add_intercept: bool) -> Self
    where
        F: ChainFeatures + ?Sized,
    {
        let num_tokens = features.num_tokens();
        let dims = symbols.len();
        let mut nodes = Vec::with_capacity(num_tokens);
        for n in 0..num_tokens {
            nodes.push(Self::to_vector(
                &features.node_features(n),
                symbols,
                dims,
                add_intercept,
            ));
        }
        let mut edges = Vec::with_capacity(num_tokens.saturating_sub(1) * num_tags);
        for n in 1..num_tokens {
            for prev_tag in 0..num_tags {
                edges.push(Self::to_vector(
                    &features.edge_features(n, prev_tag),
                    symbols,
                    dims,
                    false,
                ));
            }
        }
        Self {
            num_tags,
            nodes,
            edges,
        }
    }

    fn to_vector(
        features: &FeatureMap,
        symbols: &SymbolTable,
        dims: usize,
        add_intercept: bool,
    ) -> Vector {
        let mut entries: Vec<(usize, f64)> = features
            .iter()
            .filter_map(|(name, &value)| symbols.id(name).map(|id| (id, value)))
            .collect();
        if add_intercept {
            entries.push((0, 1.0));
        }
        Vector::from_entries(dims, entries)
    }

    /// Returns the number of tokens.
    #[inline(always)]
    #[must_use]
    pub fn num_tokens(&self) -> usize {
        self.nodes.len()
    }

    /// Returns the number of tags the edge vectors were built for.
    #[inline(always)]
    #[must_use]
    pub fn num_tags(&self) -> usize {
        self.num_tags
    }

    /// Returns the node vector at position `n`.
    #[inline(always)]
    pub fn node(&self, n: usize) -> &Vector {
        &self.nodes[n]
    }

    /// Returns the edge vector entering position `n` (`n >= 1`) from `prev_tag`.
    #[inline(always)]
    pub fn edge(&self, n: usize, prev_tag: usize) -> &Vector {
        &self.edges[(n - 1) * self.num_tags + prev_tag]
    }
}
