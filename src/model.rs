use core::fmt;
use std::io::{Read, Write};

use bincode::{
    de::{BorrowDecoder, Decoder},
    enc::Encoder,
    error::{DecodeError, EncodeError},
    BorrowDecode, Decode, Encode,
};

use crate::errors::{CrfError, Result};
use crate::features::{ChainFeatureExtractor, ChainFeatureVectors, ChainFeatures};
use crate::forward_backward::calculate_lattice;
use crate::lattice::TagLattice;
use crate::nbest::NBestIter;
use crate::potentials::Potentials;
use crate::symbol_table::{SymbolTable, INTERCEPT_FEATURE};
use crate::tag_set::TagSet;
use crate::tagging::Tagging;
use crate::vector::Vector;

/// A linear-chain conditional random field.
///
/// The model holds one weight vector per tag. The potential of tag `k` at a
/// position is the dot product of the node feature vector there with the
/// weights of `k`; the edge features of the previous tag are scored with the
/// same weights.
pub struct ChainCrf<X> {
    tag_set: TagSet,
    weights: Vec<Vector>,
    feature_symbols: SymbolTable,
    extractor: X,
    add_intercept: bool,
}

impl<X> ChainCrf<X> {
    /// Creates a new model.
    ///
    /// # Arguments
    ///
    /// * `tag_set` - Tags and their structural zeros.
    /// * `weights` - One weight vector per tag, each sized by `feature_symbols`.
    /// * `feature_symbols` - Feature names indexed by weight dimension.
    /// * `extractor` - Feature extractor applied to every input.
    /// * `add_intercept` - If `true`, dimension 0 is an always-on intercept feature.
    ///
    /// # Errors
    ///
    /// The number of weight vectors must match the number of tags, every weight
    /// vector must have one dimension per feature symbol, and with an intercept
    /// the first feature symbol must be [`INTERCEPT_FEATURE`].
    pub fn new(
        tag_set: TagSet,
        weights: Vec<Vector>,
        feature_symbols: SymbolTable,
        extractor: X,
        add_intercept: bool,
    ) -> Result<Self> {
        if weights.len() != tag_set.num_tags() {
            return Err(CrfError::invalid_argument(format!(
                "tags.len()={} but weights.len()={}",
                tag_set.num_tags(),
                weights.len(),
            )));
        }
        let dims = feature_symbols.len();
        for (k, weight) in weights.iter().enumerate() {
            if weight.num_dimensions() != dims {
                return Err(CrfError::invalid_argument(format!(
                    "feature_symbols.len()={dims} but weights[{k}].num_dimensions()={}",
                    weight.num_dimensions(),
                )));
            }
        }
        if add_intercept && feature_symbols.symbol(0) != Some(INTERCEPT_FEATURE) {
            return Err(CrfError::invalid_argument(
                "the intercept feature must be the first feature symbol",
            ));
        }
        Ok(Self {
            tag_set,
            weights,
            feature_symbols,
            extractor,
            add_intercept,
        })
    }

    /// Returns the tag set.
    #[inline(always)]
    pub fn tag_set(&self) -> &TagSet {
        &self.tag_set
    }

    /// Returns the tag labels in index order.
    #[inline(always)]
    pub fn tags(&self) -> &[String] {
        self.tag_set.tags()
    }

    /// Returns the weight vectors in tag order.
    #[inline(always)]
    pub fn weights(&self) -> &[Vector] {
        &self.weights
    }

    /// Returns the feature symbol table.
    #[inline(always)]
    pub fn feature_symbols(&self) -> &SymbolTable {
        &self.feature_symbols
    }

    /// Returns the feature extractor.
    #[inline(always)]
    pub fn extractor(&self) -> &X {
        &self.extractor
    }

    /// Returns `true` if dimension 0 is an intercept.
    #[inline(always)]
    pub fn add_intercept(&self) -> bool {
        self.add_intercept
    }

    fn potentials<E>(&self, tokens: &[E]) -> Result<Potentials>
    where
        X: ChainFeatureExtractor<E>,
    {
        let features = self.extractor.extract(tokens, self.tag_set.tags());
        if features.num_tokens() != tokens.len() {
            return Err(CrfError::invalid_argument(format!(
                "tokens.len()={} but the extracted features cover {} tokens",
                tokens.len(),
                features.num_tokens(),
            )));
        }
        let vectors = ChainFeatureVectors::new(
            &features,
            self.tag_set.num_tags(),
            &self.feature_symbols,
            self.add_intercept,
        );
        Ok(Potentials::new(&vectors, &self.weights, &self.tag_set))
    }

    fn tag_indices(&self, tags: &[String]) -> Result<Vec<usize>> {
        tags.iter()
            .map(|tag| {
                self.tag_set
                    .index_of(tag)
                    .ok_or_else(|| CrfError::invalid_argument(format!("unknown tag: {tag}")))
            })
            .collect()
    }

    /// Returns the best-scoring tagging of the given tokens.
    ///
    /// An empty input yields an empty tagging.
    ///
    /// # Errors
    ///
    /// [`CrfError::InfeasibleSequence`] is returned if the structural zeros
    /// forbid every tagging of a non-empty input.
    pub fn tag<E>(&self, tokens: &[E]) -> Result<Tagging<E>>
    where
        E: Clone,
        X: ChainFeatureExtractor<E>,
    {
        let potentials = self.potentials(tokens)?;
        let (path, _) = crate::viterbi::viterbi(&potentials).ok_or(CrfError::InfeasibleSequence {
            len: tokens.len(),
        })?;
        let tags = path
            .into_iter()
            .map(|k| self.tag_set.tags()[k].clone())
            .collect();
        Tagging::new(tokens.to_vec(), tags)
    }

    /// Returns an iterator over at most `max_results` taggings in order of
    /// decreasing unnormalized score.
    ///
    /// Taggings forbidden by the structural zeros are never returned.
    ///
    /// # Errors
    ///
    /// The extractor must cover every token.
    pub fn tag_n_best<E>(&self, tokens: &[E], max_results: usize) -> Result<NBestIter<E>>
    where
        E: Clone,
        X: ChainFeatureExtractor<E>,
    {
        let potentials = self.potentials(tokens)?;
        Ok(NBestIter::new(
            tokens.to_vec(),
            self.tag_set.tags().to_vec(),
            potentials,
            max_results,
            0.0,
        ))
    }

    /// Same as [`ChainCrf::tag_n_best`], but scores are conditional log
    /// probabilities (natural log) of each tagging given the tokens.
    ///
    /// # Errors
    ///
    /// The extractor must cover every token.
    pub fn tag_n_best_conditional<E>(
        &self,
        tokens: &[E],
        max_results: usize,
    ) -> Result<NBestIter<E>>
    where
        E: Clone,
        X: ChainFeatureExtractor<E>,
    {
        let potentials = self.potentials(tokens)?;
        let log_z = calculate_lattice(potentials.clone()).log_z();
        Ok(NBestIter::new(
            tokens.to_vec(),
            self.tag_set.tags().to_vec(),
            potentials,
            max_results,
            log_z,
        ))
    }

    /// Computes the marginal tag probabilities of the given tokens.
    ///
    /// # Errors
    ///
    /// The extractor must cover every token.
    pub fn tag_marginal<E>(&self, tokens: &[E]) -> Result<TagLattice<E>>
    where
        E: Clone,
        X: ChainFeatureExtractor<E>,
    {
        let potentials = self.potentials(tokens)?;
        Ok(TagLattice::new(
            tokens.to_vec(),
            self.tag_set.tags().to_vec(),
            calculate_lattice(potentials),
        ))
    }

    /// Returns the unnormalized log score of a tagging.
    ///
    /// A tagging forbidden by the structural zeros scores negative infinity.
    ///
    /// # Errors
    ///
    /// Every tag must belong to the tag set.
    pub fn score<E>(&self, tagging: &Tagging<E>) -> Result<f64>
    where
        X: ChainFeatureExtractor<E>,
    {
        let path = self.tag_indices(tagging.tags())?;
        Ok(self.potentials(tagging.tokens())?.path_score(&path))
    }

    /// Returns the conditional log probability (natural log) of the tags given the tokens.
    ///
    /// # Errors
    ///
    /// Every tag must belong to the tag set.
    pub fn log_probability<E>(&self, tagging: &Tagging<E>) -> Result<f64>
    where
        X: ChainFeatureExtractor<E>,
    {
        let path = self.tag_indices(tagging.tags())?;
        let potentials = self.potentials(tagging.tokens())?;
        let score = potentials.path_score(&path);
        Ok(score - calculate_lattice(potentials).log_z())
    }
}

impl<X> ChainCrf<X>
where
    X: Encode,
{
    /// Serializes the model into a byte vector.
    ///
    /// # Errors
    ///
    /// Returns an error if the extractor fails to encode.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::encode_to_vec(self, bincode::config::standard())?)
    }

    /// Writes the model to a writer and returns the number of bytes written.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<usize> {
        Ok(bincode::encode_into_std_write(
            self,
            writer,
            bincode::config::standard(),
        )?)
    }
}

impl<X> ChainCrf<X>
where
    X: Decode<()>,
{
    /// Deserializes a model from bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a valid model.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let (model, _) = bincode::decode_from_slice(bytes, bincode::config::standard())?;
        Ok(model)
    }

    /// Reads a model from a reader.
    ///
    /// # Errors
    ///
    /// Returns an error if reading fails or the data is not a valid model.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        Ok(bincode::decode_from_std_read(
            reader,
            bincode::config::standard(),
        )?)
    }
}

impl<X> fmt::Display for ChainCrf<X> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ChainCrf")?;
        writeln!(f, "  tags: {}", self.tag_set.tags().join(" "))?;
        writeln!(f, "  features: {}", self.feature_symbols.len())?;
        writeln!(f, "  intercept: {}", self.add_intercept)?;
        for (tag, weight) in self.tag_set.tags().iter().zip(&self.weights) {
            writeln!(f, "{tag}")?;
            for d in weight.non_zero_dimensions() {
                let name = self.feature_symbols.symbol(d).unwrap_or("?");
                writeln!(f, "  {name}={}", weight.value_unchecked(d))?;
            }
        }
        Ok(())
    }
}

impl<X> Encode for ChainCrf<X>
where
    X: Encode,
{
    fn encode<E: Encoder>(&self, encoder: &mut E) -> Result<(), EncodeError> {
        Encode::encode(&self.tag_set, encoder)?;
        Encode::encode(&self.weights, encoder)?;
        Encode::encode(&self.feature_symbols, encoder)?;
        Encode::encode(&self.extractor, encoder)?;
        Encode::encode(&self.add_intercept, encoder)?;
        Ok(())
    }
}

impl<Context, X> Decode<Context> for ChainCrf<X>
where
    X: Decode<Context>,
{
    fn decode<D: Decoder<Context = Context>>(decoder: &mut D) -> Result<Self, DecodeError> {
        let tag_set = Decode::decode(decoder)?;
        let weights = Decode::decode(decoder)?;
        let feature_symbols = Decode::decode(decoder)?;
        let extractor = Decode::decode(decoder)?;
        let add_intercept = Decode::decode(decoder)?;
        Self::new(tag_set, weights, feature_symbols, extractor, add_intercept)
            .map_err(|e| DecodeError::OtherString(e.to_string()))
    }
}

impl<'de, Context, X> BorrowDecode<'de, Context> for ChainCrf<X>
where
    X: Decode<Context>,
{
    fn borrow_decode<D: BorrowDecoder<'de, Context = Context>>(
        decoder: &mut D,
    ) -> Result<Self, DecodeError> {
        <Self as Decode<Context>>::decode(decoder)
    }
}
