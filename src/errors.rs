//! Definition of errors.

use thiserror::Error;

/// The error type for chaincrf.
#[derive(Debug, Error)]
pub enum CrfError {
    /// Error used when an argument is invalid.
    #[error("InvalidArgumentError: {0}")]
    InvalidArgument(String),

    /// Error used when a position or tag index is out of range.
    #[error("IndexOutOfRangeError: {what} index {index} is out of range (length {len})")]
    IndexOutOfRange {
        /// Kind of index.
        what: &'static str,
        /// The offending index.
        index: usize,
        /// The valid length.
        len: usize,
    },

    /// Error used when every tagging of an input is forbidden by structural zeros.
    #[error("InfeasibleSequenceError: no legal tagging exists for an input of length {len}")]
    InfeasibleSequence {
        /// Length of the input.
        len: usize,
    },

    /// Error raised while encoding a model.
    #[error("EncodeError: {0}")]
    Encode(#[from] bincode::error::EncodeError),

    /// Error raised while decoding a model.
    #[error("DecodeError: {0}")]
    Decode(#[from] bincode::error::DecodeError),
}

impl CrfError {
    /// Creates a new [`CrfError::InvalidArgument`].
    pub fn invalid_argument<S>(msg: S) -> Self
    where
        S: Into<String>,
    {
        Self::InvalidArgument(msg.into())
    }

    pub(crate) const fn index_out_of_range(what: &'static str, index: usize, len: usize) -> Self {
        Self::IndexOutOfRange { what, index, len }
    }
}

/// A specialized Result type.
pub type Result<T, E = CrfError> = core::result::Result<T, E>;

/// Returns an [`CrfError::IndexOutOfRange`] error unless `index < len`.
#[inline(always)]
pub(crate) fn check_index(what: &'static str, index: usize, len: usize) -> Result<()> {
    if index < len {
        Ok(())
    } else {
        Err(CrfError::index_out_of_range(what, index, len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_argument_message() {
        let e = CrfError::invalid_argument("tags.len()=2 but legal_start.len()=3");
        assert_eq!(
            "InvalidArgumentError: tags.len()=2 but legal_start.len()=3",
            e.to_string(),
        );
    }

    #[test]
    fn test_check_index() {
        assert!(check_index("tag", 1, 2).is_ok());
        match check_index("tag", 2, 2) {
            Err(CrfError::IndexOutOfRange { what, index, len }) => {
                assert_eq!("tag", what);
                assert_eq!(2, index);
                assert_eq!(2, len);
            }
            _ => panic!("expected an index error"),
        }
    }
}
