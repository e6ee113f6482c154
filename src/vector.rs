use bincode::{
    de::{BorrowDecoder, Decoder},
    enc::Encoder,
    error::{DecodeError, EncodeError},
    BorrowDecode, Decode, Encode,
};

use crate::errors::{check_index, CrfError, Result};

/// A numeric vector, stored either densely or as sorted `(dimension, value)` pairs.
///
/// Dot products and increments are defined across every combination of
/// storage kinds. Sparse entries are kept sorted by dimension without
/// duplicates so that two sparse vectors can be merged in linear time.
#[derive(Clone, Debug, PartialEq)]
pub enum Vector {
    /// Dense storage.
    Dense(Vec<f64>),

    /// Sparse storage.
    Sparse {
        /// Dimensionality of the vector.
        dims: usize,
        /// Non-zero entries sorted by dimension.
        entries: Vec<(usize, f64)>,
    },
}

impl Vector {
    /// Creates a dense vector from its values.
    #[inline(always)]
    #[must_use]
    pub fn dense(values: Vec<f64>) -> Self {
        Self::Dense(values)
    }

    /// Creates a dense zero vector.
    #[inline(always)]
    #[must_use]
    pub fn zeros(dims: usize) -> Self {
        Self::Dense(vec![0.0; dims])
    }

    /// Creates a sparse vector.
    ///
    /// Entries may come in any order; values of repeated dimensions are summed
    /// and zero values are dropped.
    ///
    /// # Errors
    ///
    /// Every dimension must be less than `dims`.
    pub fn sparse(dims: usize, entries: Vec<(usize, f64)>) -> Result<Self> {
        for &(dim, _) in &entries {
            check_index("dimension", dim, dims)?;
        }
        Ok(Self::from_entries(dims, entries))
    }

    pub(crate) fn from_entries(dims: usize, mut entries: Vec<(usize, f64)>) -> Self {
        entries.sort_unstable_by_key(|&(dim, _)| dim);
        let mut merged: Vec<(usize, f64)> = Vec::with_capacity(entries.len());
        for (dim, value) in entries {
            match merged.last_mut() {
                Some(last) if last.0 == dim => last.1 += value,
                _ => merged.push((dim, value)),
            }
        }
        merged.retain(|&(_, value)| value != 0.0);
        Self::Sparse {
            dims,
            entries: merged,
        }
    }

    /// Returns the dimensionality.
    #[inline(always)]
    #[must_use]
    pub fn num_dimensions(&self) -> usize {
        match self {
            Self::Dense(values) => values.len(),
            Self::Sparse { dims, .. } => *dims,
        }
    }

    /// Returns the value of the given dimension.
    ///
    /// # Errors
    ///
    /// `dim` must be less than the dimensionality.
    pub fn value(&self, dim: usize) -> Result<f64> {
        check_index("dimension", dim, self.num_dimensions())?;
        Ok(self.value_unchecked(dim))
    }

    #[inline(always)]
    pub(crate) fn value_unchecked(&self, dim: usize) -> f64 {
        match self {
            Self::Dense(values) => values[dim],
            Self::Sparse { entries, .. } => entries
                .binary_search_by_key(&dim, |&(d, _)| d)
                .map_or(0.0, |i| entries[i].1),
        }
    }

    /// Returns the dimensions holding non-zero values, in increasing order.
    #[must_use]
    pub fn non_zero_dimensions(&self) -> Vec<usize> {
        match self {
            Self::Dense(values) => values
                .iter()
                .enumerate()
                .filter(|&(_, &v)| v != 0.0)
                .map(|(i, _)| i)
                .collect(),
            Self::Sparse { entries, .. } => entries.iter().map(|&(d, _)| d).collect(),
        }
    }

    /// Computes the dot product with another vector.
    ///
    /// # Errors
    ///
    /// Both vectors must have the same dimensionality.
    pub fn dot_product(&self, other: &Self) -> Result<f64> {
        self.check_same_dims(other)?;
        Ok(self.dot(other))
    }

    /// Adds `scale * other` to this vector.
    ///
    /// # Errors
    ///
    /// Both vectors must have the same dimensionality.
    pub fn increment(&mut self, scale: f64, other: &Self) -> Result<()> {
        self.check_same_dims(other)?;
        self.add_scaled(scale, other);
        Ok(())
    }

    fn check_same_dims(&self, other: &Self) -> Result<()> {
        if self.num_dimensions() != other.num_dimensions() {
            return Err(CrfError::invalid_argument(format!(
                "vector dimensions differ: {} vs {}",
                self.num_dimensions(),
                other.num_dimensions(),
            )));
        }
        Ok(())
    }

    #[inline(always)]
    pub(crate) fn dot(&self, other: &Self) -> f64 {
        match (self, other) {
            (Self::Dense(a), Self::Dense(b)) => a.iter().zip(b).map(|(x, y)| x * y).sum(),
            (Self::Sparse { entries, .. }, Self::Dense(dense))
            | (Self::Dense(dense), Self::Sparse { entries, .. }) => {
                entries.iter().map(|&(d, v)| v * dense[d]).sum()
            }
            (Self::Sparse { entries: a, .. }, Self::Sparse { entries: b, .. }) => {
                let mut result = 0.0;
                let mut i = 0;
                let mut j = 0;
                while i < a.len() && j < b.len() {
                    match a[i].0.cmp(&b[j].0) {
                        core::cmp::Ordering::Less => i += 1,
                        core::cmp::Ordering::Greater => j += 1,
                        core::cmp::Ordering::Equal => {
                            result += a[i].1 * b[j].1;
                            i += 1;
                            j += 1;
                        }
                    }
                }
                result
            }
        }
    }

    #[inline(always)]
    pub(crate) fn add_scaled(&mut self, scale: f64, other: &Self) {
        match (self, other) {
            (Self::Dense(a), Self::Dense(b)) => {
                for (x, y) in a.iter_mut().zip(b) {
                    *x += scale * y;
                }
            }
            (Self::Dense(a), Self::Sparse { entries, .. }) => {
                for &(d, v) in entries {
                    a[d] += scale * v;
                }
            }
            (Self::Sparse { entries, .. }, Self::Dense(b)) => {
                let mut values = vec![0.0; b.len()];
                for &(d, v) in entries.iter() {
                    values[d] = v;
                }
                for (x, y) in values.iter_mut().zip(b) {
                    *x += scale * y;
                }
                *entries = values
                    .into_iter()
                    .enumerate()
                    .filter(|&(_, v)| v != 0.0)
                    .collect();
            }
            (Self::Sparse { entries: a, .. }, Self::Sparse { entries: b, .. }) => {
                let mut merged = Vec::with_capacity(a.len() + b.len());
                let mut i = 0;
                let mut j = 0;
                while i < a.len() || j < b.len() {
                    let next = if j == b.len() || (i < a.len() && a[i].0 < b[j].0) {
                        i += 1;
                        a[i - 1]
                    } else if i == a.len() || b[j].0 < a[i].0 {
                        j += 1;
                        (b[j - 1].0, scale * b[j - 1].1)
                    } else {
                        i += 1;
                        j += 1;
                        (a[i - 1].0, a[i - 1].1 + scale * b[j - 1].1)
                    };
                    if next.1 != 0.0 {
                        merged.push(next);
                    }
                }
                *a = merged;
            }
        }
    }

    /// Returns the mutable dense values, or `None` for sparse storage.
    #[inline(always)]
    pub(crate) fn dense_values_mut(&mut self) -> Option<&mut [f64]> {
        match self {
            Self::Dense(values) => Some(values),
            Self::Sparse { .. } => None,
        }
    }
}

const DENSE_VARIANT: u32 = 0;
const SPARSE_VARIANT: u32 = 1;

impl Encode for Vector {
    fn encode<E: Encoder>(&self, encoder: &mut E) -> Result<(), EncodeError> {
        match self {
            Self::Dense(values) => {
                Encode::encode(&DENSE_VARIANT, encoder)?;
                Encode::encode(values, encoder)
            }
            Self::Sparse { dims, entries } => {
                Encode::encode(&SPARSE_VARIANT, encoder)?;
                Encode::encode(dims, encoder)?;
                Encode::encode(entries, encoder)
            }
        }
    }
}

impl<Context> Decode<Context> for Vector {
    fn decode<D: Decoder<Context = Context>>(decoder: &mut D) -> Result<Self, DecodeError> {
        let variant: u32 = Decode::decode(decoder)?;
        match variant {
            DENSE_VARIANT => Ok(Self::Dense(Decode::decode(decoder)?)),
            SPARSE_VARIANT => {
                let dims = Decode::decode(decoder)?;
                let entries = Decode::decode(decoder)?;
                Self::sparse(dims, entries).map_err(|e| DecodeError::OtherString(e.to_string()))
            }
            _ => Err(DecodeError::OtherString(format!("unknown vector variant {variant}"))),
        }
    }
}

impl<'de, Context> BorrowDecode<'de, Context> for Vector {
    fn borrow_decode<D: BorrowDecoder<'de, Context = Context>>(
        decoder: &mut D,
    ) -> Result<Self, DecodeError> {
        <Self as Decode<Context>>::decode(decoder)
    }
}
