use bincode::{Decode, Encode};

use crate::features::{ChainFeatureExtractor, ChainFeatureVectors, ChainFeatures, FeatureMap};
use crate::potentials::Potentials;
use crate::symbol_table::{SymbolTable, INTERCEPT_FEATURE};
use crate::tag_set::TagSet;
use crate::vector::Vector;

macro_rules! hashmap {
    ( $($k:expr => $v:expr,)* ) => {
        {
            #[allow(unused_mut)]
            let mut h = ::hashbrown::HashMap::new();
            $(
                h.insert($k, $v);
            )*
            h
        }
    };
    ( $($k:expr => $v:expr),* ) => {
        $crate::test_utils::hashmap![$( $k => $v, )*]
    };
}

macro_rules! logsumexp {
    ( $($x:expr,)* ) => {
        {
            let mut y = f64::NEG_INFINITY;
            $(
                y = $crate::math::logsumexp(y, $x);
            )*
            y
        }
    };
    ( $($x:expr),* ) => {
        $crate::test_utils::logsumexp!($( $x, )*)
    };
}

pub(crate) use hashmap;
pub(crate) use logsumexp;

/// Precomputed features.
///
/// Edge `(n, prev)` is stored at `edges[(n - 1) * num_tags + prev]`.
#[derive(Clone, Debug, Default)]
pub struct StaticFeatures {
    pub nodes: Vec<FeatureMap>,
    pub edges: Vec<FeatureMap>,
    pub num_tags: usize,
}

impl ChainFeatures for StaticFeatures {
    fn num_tokens(&self) -> usize {
        self.nodes.len()
    }

    fn node_features(&self, n: usize) -> FeatureMap {
        self.nodes[n].clone()
    }

    fn edge_features(&self, n: usize, prev_tag: usize) -> FeatureMap {
        self.edges
            .get((n - 1) * self.num_tags + prev_tag)
            .cloned()
            .unwrap_or_default()
    }
}

/// Emits `TOK_<token>` on nodes and `PREV_<tag>` on edges.
#[derive(Clone, Debug, Default, PartialEq, Eq, Decode, Encode)]
pub struct TokenFeatureExtractor {
    pub lowercase: bool,
}

impl TokenFeatureExtractor {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<E> ChainFeatureExtractor<E> for TokenFeatureExtractor
where
    E: AsRef<str>,
{
    type Features = StaticFeatures;

    fn extract(&self, tokens: &[E], tags: &[String]) -> StaticFeatures {
        let nodes = tokens
            .iter()
            .map(|token| {
                let token = if self.lowercase {
                    token.as_ref().to_lowercase()
                } else {
                    token.as_ref().to_string()
                };
                hashmap![format!("TOK_{token}") => 1.0]
            })
            .collect();
        let mut edges = vec![];
        for _ in 1..tokens.len() {
            for tag in tags {
                edges.push(hashmap![format!("PREV_{tag}") => 1.0]);
            }
        }
        StaticFeatures {
            nodes,
            edges,
            num_tags: tags.len(),
        }
    }
}

/// Tags `A`, `B` and `C`.
///
/// `C` may not start a sequence, `B` may not end one, and neither `B -> B`
/// nor `C -> A` is allowed.
pub fn generate_test_tag_set() -> TagSet {
    TagSet::new(
        vec!["A".into(), "B".into(), "C".into()],
        vec![true, true, false],
        vec![true, false, true],
        vec![
            vec![true, true, true],
            vec![true, false, true],
            vec![false, true, true],
        ],
    )
    .unwrap()
}

pub fn generate_test_symbols() -> SymbolTable {
    SymbolTable::from_symbols(
        [
            INTERCEPT_FEATURE,
            "TOK_x",
            "TOK_y",
            "TOK_z",
            "PREV_A",
            "PREV_B",
            "PREV_C",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect(),
    )
    .unwrap()
}

pub fn generate_test_weights(tag_set: &TagSet) -> Vec<Vector> {
    let dims = generate_test_symbols().len();
    (0..tag_set.num_tags())
        .map(|k| {
            Vector::dense(
                (0..dims)
                    .map(|d| ((k * dims + d + 1) as f64 * 1.7).sin())
                    .collect(),
            )
        })
        .collect()
}

/// Potentials of `tokens` under [`TokenFeatureExtractor`] features with an intercept.
pub fn generate_test_potentials(
    tokens: &[&str],
    weights: &[Vector],
    tag_set: &TagSet,
) -> Potentials {
    let features = TokenFeatureExtractor::new().extract(tokens, tag_set.tags());
    let vectors =
        ChainFeatureVectors::new(&features, tag_set.num_tags(), &generate_test_symbols(), true);
    Potentials::new(&vectors, weights, tag_set)
}

/// Enumerates every tag index sequence with a finite score.
pub fn brute_force_paths(potentials: &Potentials) -> Vec<(Vec<usize>, f64)> {
    let num_tokens = potentials.num_tokens();
    let num_tags = potentials.num_tags();
    let mut paths = vec![];
    let mut path = vec![0; num_tokens];
    loop {
        let score = potentials.path_score(&path);
        if score.is_finite() {
            paths.push((path.clone(), score));
        }
        let mut i = 0;
        loop {
            if i == num_tokens {
                return paths;
            }
            path[i] += 1;
            if path[i] < num_tags {
                break;
            }
            path[i] = 0;
            i += 1;
        }
    }
}
