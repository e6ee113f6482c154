use crate::errors::{CrfError, Result};

/// A sequence of tokens paired with one tag per token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tagging<E> {
    tokens: Vec<E>,
    tags: Vec<String>,
}

impl<E> Tagging<E> {
    /// Creates a new tagging.
    ///
    /// # Errors
    ///
    /// `tokens` and `tags` must have the same length.
    pub fn new(tokens: Vec<E>, tags: Vec<String>) -> Result<Self> {
        if tokens.len() != tags.len() {
            return Err(CrfError::invalid_argument(format!(
                "tokens.len()={} but tags.len()={}",
                tokens.len(),
                tags.len(),
            )));
        }
        Ok(Self { tokens, tags })
    }

    /// Returns the tokens.
    #[inline(always)]
    pub fn tokens(&self) -> &[E] {
        &self.tokens
    }

    /// Returns the tags.
    #[inline(always)]
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Returns the number of tokens.
    #[inline(always)]
    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Returns `true` if there is no token.
    #[inline(always)]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Splits the tagging into its tokens and tags.
    #[inline(always)]
    pub fn into_parts(self) -> (Vec<E>, Vec<String>) {
        (self.tokens, self.tags)
    }
}

/// A tagging with a score attached.
///
/// Depending on the decoder, the score is either an unnormalized log
/// potential or a conditional log probability.
#[derive(Clone, Debug, PartialEq)]
pub struct ScoredTagging<E> {
    tagging: Tagging<E>,
    score: f64,
}

impl<E> ScoredTagging<E> {
    #[inline(always)]
    pub(crate) fn new(tagging: Tagging<E>, score: f64) -> Self {
        Self { tagging, score }
    }

    /// Returns the tagging.
    #[inline(always)]
    pub fn tagging(&self) -> &Tagging<E> {
        &self.tagging
    }

    /// Returns the tags.
    #[inline(always)]
    pub fn tags(&self) -> &[String] {
        self.tagging.tags()
    }

    /// Returns the score.
    #[inline(always)]
    #[must_use]
    pub fn score(&self) -> f64 {
        self.score
    }

    /// Takes the tagging out.
    #[inline(always)]
    pub fn into_tagging(self) -> Tagging<E> {
        self.tagging
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_checks_lengths() {
        assert!(Tagging::new(vec!["a", "b"], vec!["X".to_string()]).is_err());
        let tagging = Tagging::new(vec!["a"], vec!["X".to_string()]).unwrap();
        assert_eq!(1, tagging.len());
        assert_eq!(&["a"], tagging.tokens());
        let (tokens, tags) = tagging.into_parts();
        assert_eq!(vec!["a"], tokens);
        assert_eq!(vec!["X".to_string()], tags);
    }
}
