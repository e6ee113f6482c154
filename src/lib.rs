//! # chaincrf
//!
//! Linear-chain conditional random fields implemented in pure Rust.
//!
//! A [`ChainCrf`] assigns one tag to every token of an input sequence. It
//! supports exact best-path decoding, lazy N-best decoding in order of
//! decreasing score, and marginal probabilities through a [`TagLattice`].
//! Features are produced by a user-supplied [`ChainFeatureExtractor`].
#![cfg_attr(
    feature = "train",
    doc = "
## Examples

```rust
use bincode::{Decode, Encode};
use chaincrf::{
    ChainFeatureExtractor, ChainFeatures, ChainCrf, FeatureMap, Tagging, Trainer,
};

// Emits the token itself on nodes and the previous tag on edges.
#[derive(Decode, Encode)]
struct Extractor;

struct Features {
    tokens: Vec<String>,
    tags: Vec<String>,
}

impl ChainFeatures for Features {
    fn num_tokens(&self) -> usize {
        self.tokens.len()
    }

    fn node_features(&self, n: usize) -> FeatureMap {
        let mut features = FeatureMap::new();
        features.insert(format!(\"tok={}\", self.tokens[n]), 1.0);
        features
    }

    fn edge_features(&self, _n: usize, prev_tag: usize) -> FeatureMap {
        let mut features = FeatureMap::new();
        features.insert(format!(\"prev={}\", self.tags[prev_tag]), 1.0);
        features
    }
}

impl<E: AsRef<str>> ChainFeatureExtractor<E> for Extractor {
    type Features = Features;

    fn extract(&self, tokens: &[E], tags: &[String]) -> Features {
        Features {
            tokens: tokens.iter().map(|t| t.as_ref().to_string()).collect(),
            tags: tags.to_vec(),
        }
    }
}

let corpus = vec![
    Tagging::new(vec![\"John\", \"runs\"], vec![\"NOUN\".into(), \"VERB\".into()]).unwrap(),
    Tagging::new(vec![\"Mary\", \"sleeps\"], vec![\"NOUN\".into(), \"VERB\".into()]).unwrap(),
];

// Generates a model
let model = Trainer::new()
    .max_epochs(20)
    .unwrap()
    .train(&corpus, Extractor)
    .unwrap();

let tagging = model.tag(&[\"Mary\", \"runs\"]).unwrap();
assert_eq!(&[\"NOUN\".to_string(), \"VERB\".to_string()], tagging.tags());

// Taggings in order of decreasing probability
for result in model.tag_n_best_conditional(&[\"Mary\", \"runs\"], 2).unwrap() {
    println!(\"{:?} {}\", result.tags(), result.score().exp());
}

// Round-trip
let bytes = model.to_bytes().unwrap();
let model = ChainCrf::<Extractor>::from_bytes(&bytes).unwrap();
let lattice = model.tag_marginal(&[\"John\", \"sleeps\"]).unwrap();
assert!(lattice.probability(0, 0).unwrap() > 0.5);
```
"
)]
#![deny(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod errors;
mod features;
mod forward_backward;
mod lattice;
mod math;
mod model;
mod nbest;
mod potentials;
mod queue;
mod symbol_table;
mod tag_set;
mod tagging;
mod vector;
mod viterbi;

#[cfg(feature = "train")]
pub mod annealing;
#[cfg(feature = "train")]
mod corpus;
#[cfg(feature = "train")]
pub mod prior;
#[cfg(feature = "train")]
mod trainer;

#[cfg(test)]
mod test_utils;

pub use errors::{CrfError, Result};
pub use features::{ChainFeatureExtractor, ChainFeatureVectors, ChainFeatures, FeatureMap};
pub use lattice::TagLattice;
pub use model::ChainCrf;
pub use nbest::NBestIter;
pub use symbol_table::{SymbolTable, INTERCEPT_FEATURE};
pub use tag_set::TagSet;
pub use tagging::{ScoredTagging, Tagging};
pub use vector::Vector;

#[cfg(feature = "train")]
pub use annealing::{Annealing, AnnealingSchedule};
#[cfg(feature = "train")]
pub use corpus::Corpus;
#[cfg(feature = "train")]
pub use prior::{Prior, RegressionPrior};
#[cfg(feature = "train")]
pub use trainer::Trainer;
