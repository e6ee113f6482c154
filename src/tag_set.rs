use bincode::{
    de::{BorrowDecoder, Decoder},
    enc::Encoder,
    error::{DecodeError, EncodeError},
    BorrowDecode, Decode, Encode,
};

use crate::errors::{check_index, CrfError, Result};
use crate::symbol_table::SymbolTable;

/// An ordered set of tags together with its structural zeros.
///
/// Tags that are not legal at the start or the end of a sequence, and
/// transitions that are not legal between two adjacent positions, are forced
/// to have zero probability.
#[derive(Clone, Debug, PartialEq)]
pub struct TagSet {
    tags: SymbolTable,
    legal_start: Vec<bool>,
    legal_end: Vec<bool>,
    legal_transitions: Vec<bool>,
}

impl TagSet {
    /// Creates a new tag set.
    ///
    /// # Arguments
    ///
    /// * `tags` - Unique tag labels.
    /// * `legal_start` - `legal_start[k]` is `true` if tag `k` may begin a sequence.
    /// * `legal_end` - `legal_end[k]` is `true` if tag `k` may end a sequence.
    /// * `legal_transitions` - `legal_transitions[i][j]` is `true` if tag `j` may follow tag `i`.
    ///
    /// # Errors
    ///
    /// There must be at least one tag, the tags must be unique, and every
    /// legality array must be sized by the number of tags.
    pub fn new(
        tags: Vec<String>,
        legal_start: Vec<bool>,
        legal_end: Vec<bool>,
        legal_transitions: Vec<Vec<bool>>,
    ) -> Result<Self> {
        let num_tags = tags.len();
        if num_tags == 0 {
            return Err(CrfError::invalid_argument("tag set must not be empty"));
        }
        if legal_start.len() != num_tags {
            return Err(CrfError::invalid_argument(format!(
                "tags.len()={num_tags} but legal_start.len()={}",
                legal_start.len(),
            )));
        }
        if legal_end.len() != num_tags {
            return Err(CrfError::invalid_argument(format!(
                "tags.len()={num_tags} but legal_end.len()={}",
                legal_end.len(),
            )));
        }
        if legal_transitions.len() != num_tags {
            return Err(CrfError::invalid_argument(format!(
                "tags.len()={num_tags} but legal_transitions.len()={}",
                legal_transitions.len(),
            )));
        }
        let mut flat = Vec::with_capacity(num_tags * num_tags);
        for (i, row) in legal_transitions.into_iter().enumerate() {
            if row.len() != num_tags {
                return Err(CrfError::invalid_argument(format!(
                    "tags.len()={num_tags} but legal_transitions[{i}].len()={}",
                    row.len(),
                )));
            }
            flat.extend(row);
        }
        Ok(Self {
            tags: SymbolTable::from_symbols(tags)?,
            legal_start,
            legal_end,
            legal_transitions: flat,
        })
    }

    /// Creates a tag set without structural zeros.
    ///
    /// # Errors
    ///
    /// There must be at least one tag and the tags must be unique.
    pub fn fully_connected(tags: Vec<String>) -> Result<Self> {
        let num_tags = tags.len();
        Self::new(
            tags,
            vec![true; num_tags],
            vec![true; num_tags],
            vec![vec![true; num_tags]; num_tags],
        )
    }

    /// Returns the number of tags.
    #[inline(always)]
    #[must_use]
    pub fn num_tags(&self) -> usize {
        self.tags.len()
    }

    /// Returns the tag labels in index order.
    #[inline(always)]
    pub fn tags(&self) -> &[String] {
        self.tags.symbols()
    }

    /// Returns the label of the given tag index.
    #[inline(always)]
    pub fn tag(&self, k: usize) -> Option<&str> {
        self.tags.symbol(k)
    }

    /// Returns the index of the given label.
    #[inline(always)]
    pub fn index_of(&self, tag: &str) -> Option<usize> {
        self.tags.id(tag)
    }

    /// Returns `true` if tag `k` may begin a sequence.
    ///
    /// # Errors
    ///
    /// `k` must be a valid tag index.
    pub fn legal_start(&self, k: usize) -> Result<bool> {
        check_index("tag", k, self.num_tags())?;
        Ok(self.legal_start[k])
    }

    /// Returns `true` if tag `k` may end a sequence.
    ///
    /// # Errors
    ///
    /// `k` must be a valid tag index.
    pub fn legal_end(&self, k: usize) -> Result<bool> {
        check_index("tag", k, self.num_tags())?;
        Ok(self.legal_end[k])
    }

    /// Returns `true` if tag `to` may follow tag `from`.
    ///
    /// # Errors
    ///
    /// Both must be valid tag indices.
    pub fn legal_transition(&self, from: usize, to: usize) -> Result<bool> {
        check_index("tag", from, self.num_tags())?;
        check_index("tag", to, self.num_tags())?;
        Ok(self.is_legal_transition(from, to))
    }

    #[inline(always)]
    pub(crate) fn is_legal_start(&self, k: usize) -> bool {
        self.legal_start[k]
    }

    #[inline(always)]
    pub(crate) fn is_legal_end(&self, k: usize) -> bool {
        self.legal_end[k]
    }

    #[inline(always)]
    pub(crate) fn is_legal_transition(&self, from: usize, to: usize) -> bool {
        self.legal_transitions[from * self.num_tags() + to]
    }

    /// Returns `true` if every index of `path` is a tag and the sequence
    /// violates no structural zero.
    ///
    /// An empty path is legal.
    pub fn is_legal_path(&self, path: &[usize]) -> bool {
        if path.iter().any(|&k| k >= self.num_tags()) {
            return false;
        }
        match (path.first(), path.last()) {
            (Some(&first), Some(&last)) => {
                self.is_legal_start(first)
                    && self.is_legal_end(last)
                    && path
                        .windows(2)
                        .all(|w| self.is_legal_transition(w[0], w[1]))
            }
            _ => true,
        }
    }
}

impl Encode for TagSet {
    fn encode<E: Encoder>(&self, encoder: &mut E) -> Result<(), EncodeError> {
        Encode::encode(&self.tags, encoder)?;
        Encode::encode(&self.legal_start, encoder)?;
        Encode::encode(&self.legal_end, encoder)?;
        Encode::encode(&self.legal_transitions, encoder)?;
        Ok(())
    }
}

impl<Context> Decode<Context> for TagSet {
    fn decode<D: Decoder<Context = Context>>(decoder: &mut D) -> Result<Self, DecodeError> {
        let tags: Vec<String> = Decode::decode(decoder)?;
        let legal_start = Decode::decode(decoder)?;
        let legal_end = Decode::decode(decoder)?;
        let flat: Vec<bool> = Decode::decode(decoder)?;
        let num_tags = tags.len();
        if num_tags.checked_mul(num_tags) != Some(flat.len()) {
            return Err(DecodeError::OtherString(format!(
                "tags.len()={num_tags} but legal_transitions.len()={}",
                flat.len(),
            )));
        }
        let legal_transitions = if num_tags == 0 {
            vec![]
        } else {
            flat.chunks(num_tags).map(<[bool]>::to_vec).collect()
        };
        Self::new(tags, legal_start, legal_end, legal_transitions)
            .map_err(|e| DecodeError::OtherString(e.to_string()))
    }
}

impl<'de, Context> BorrowDecode<'de, Context> for TagSet {
    fn borrow_decode<D: BorrowDecoder<'de, Context = Context>>(
        decoder: &mut D,
    ) -> Result<Self, DecodeError> {
        <Self as Decode<Context>>::decode(decoder)
    }
}
