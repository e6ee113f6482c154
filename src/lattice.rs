use crate::errors::{check_index, CrfError, Result};

/// Forward, backward and transition log scores of one input.
///
/// Values are log-potentials up to the normalizer `log_z`.
#[derive(Clone, Debug)]
pub struct LogLattice {
    num_tokens: usize,
    num_tags: usize,

    // [N][K]
    log_forward: Vec<f64>,

    // [N][K]
    log_backward: Vec<f64>,

    // [N-1][K][K]
    log_transition: Vec<f64>,

    log_z: f64,
}

impl LogLattice {
    pub fn new(
        num_tokens: usize,
        num_tags: usize,
        log_forward: Vec<f64>,
        log_backward: Vec<f64>,
        log_transition: Vec<f64>,
        log_z: f64,
    ) -> Self {
        debug_assert_eq!(num_tokens * num_tags, log_forward.len());
        debug_assert_eq!(num_tokens * num_tags, log_backward.len());
        debug_assert_eq!(
            num_tokens.saturating_sub(1) * num_tags * num_tags,
            log_transition.len()
        );
        Self {
            num_tokens,
            num_tags,
            log_forward,
            log_backward,
            log_transition,
            log_z,
        }
    }

    pub fn empty(num_tags: usize) -> Self {
        Self::new(0, num_tags, vec![], vec![], vec![], 0.0)
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
    pub fn log_z(&self) -> f64 {
        self.log_z
    }

    #[inline(always)]
    pub fn log_forward(&self, n: usize, k: usize) -> f64 {
        self.log_forward[n * self.num_tags + k]
    }

    #[inline(always)]
    pub fn log_backward(&self, n: usize, k: usize) -> f64 {
        self.log_backward[n * self.num_tags + k]
    }

    #[inline(always)]
    pub fn log_transition(&self, n: usize, prev: usize, k: usize) -> f64 {
        self.log_transition[((n - 1) * self.num_tags + prev) * self.num_tags + k]
    }

    #[inline(always)]
    pub fn log_probability(&self, n: usize, k: usize) -> f64 {
        self.log_forward(n, k) + self.log_backward(n, k) - self.log_z
    }

    /// Log probability of `prev` at `n - 1` followed by `k` at `n`.
    #[inline(always)]
    pub fn log_probability_transition(&self, n: usize, prev: usize, k: usize) -> f64 {
        self.log_forward(n - 1, prev) + self.log_transition(n, prev, k) + self.log_backward(n, k)
            - self.log_z
    }

    /// Log probability of the tags occupying positions `start..start + tags.len()`.
    pub fn log_probability_path(&self, start: usize, tags: &[usize]) -> f64 {
        let Some((&first, rest)) = tags.split_first() else {
            return 0.0;
        };
        let mut score = self.log_forward(start, first);
        let mut prev = first;
        for (i, &k) in rest.iter().enumerate() {
            score += self.log_transition(start + i + 1, prev, k);
            prev = k;
        }
        score + self.log_backward(start + rest.len(), prev) - self.log_z
    }
}

/// Marginal tag probabilities of one input.
///
/// A tag lattice is produced by [`ChainCrf::tag_marginal`](crate::ChainCrf::tag_marginal).
/// Position `n` and tag index `k` arguments are checked against the number of
/// tokens and tags.
#[derive(Clone, Debug)]
pub struct TagLattice<E> {
    tokens: Vec<E>,
    tags: Vec<String>,
    lattice: LogLattice,
}

impl<E> TagLattice<E> {
    pub(crate) fn new(tokens: Vec<E>, tags: Vec<String>, lattice: LogLattice) -> Self {
        Self {
            tokens,
            tags,
            lattice,
        }
    }

    /// Returns the number of tokens.
    #[inline(always)]
    #[must_use]
    pub fn num_tokens(&self) -> usize {
        self.lattice.num_tokens()
    }

    /// Returns the number of tags.
    #[inline(always)]
    #[must_use]
    pub fn num_tags(&self) -> usize {
        self.lattice.num_tags()
    }

    /// Returns the tokens.
    #[inline(always)]
    pub fn tokens(&self) -> &[E] {
        &self.tokens
    }

    /// Returns the tag labels in index order.
    #[inline(always)]
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Returns the label of tag index `k`.
    #[inline(always)]
    pub fn tag(&self, k: usize) -> Option<&str> {
        self.tags.get(k).map(String::as_str)
    }

    /// Returns the index of the given label.
    pub fn tag_index(&self, tag: &str) -> Option<usize> {
        self.tags.iter().position(|t| t == tag)
    }

    /// Returns the log of the partition function.
    ///
    /// It is 0 for an empty input and negative infinity if no tagging is legal.
    #[inline(always)]
    #[must_use]
    pub fn log_z(&self) -> f64 {
        self.lattice.log_z()
    }

    fn check_node(&self, n: usize, k: usize) -> Result<()> {
        check_index("position", n, self.num_tokens())?;
        check_index("tag", k, self.num_tags())
    }

    fn check_edge(&self, n: usize, prev: usize, k: usize) -> Result<()> {
        if n == 0 {
            return Err(CrfError::index_out_of_range("position", n, 0));
        }
        self.check_node(n, k)?;
        check_index("tag", prev, self.num_tags())
    }

    /// Returns the unnormalized log score of all prefixes ending in tag `k` at `n`.
    ///
    /// # Errors
    ///
    /// `n` and `k` must be in range.
    pub fn log_forward(&self, n: usize, k: usize) -> Result<f64> {
        self.check_node(n, k)?;
        Ok(self.lattice.log_forward(n, k))
    }

    /// Returns the unnormalized log score of all suffixes following tag `k` at `n`.
    ///
    /// # Errors
    ///
    /// `n` and `k` must be in range.
    pub fn log_backward(&self, n: usize, k: usize) -> Result<f64> {
        self.check_node(n, k)?;
        Ok(self.lattice.log_backward(n, k))
    }

    /// Returns the log potential of tag `k` at `n` following tag `prev` at `n - 1`.
    ///
    /// # Errors
    ///
    /// `n` must be in `1..num_tokens` and both tags must be in range.
    pub fn log_transition(&self, n: usize, prev: usize, k: usize) -> Result<f64> {
        self.check_edge(n, prev, k)?;
        Ok(self.lattice.log_transition(n, prev, k))
    }

    /// Returns the log marginal probability of tag `k` at position `n`.
    ///
    /// # Errors
    ///
    /// `n` and `k` must be in range.
    pub fn log_probability(&self, n: usize, k: usize) -> Result<f64> {
        self.check_node(n, k)?;
        Ok(self.lattice.log_probability(n, k))
    }

    /// Returns the marginal probability of tag `k` at position `n`.
    ///
    /// # Errors
    ///
    /// `n` and `k` must be in range.
    pub fn probability(&self, n: usize, k: usize) -> Result<f64> {
        Ok(self.log_probability(n, k)?.exp())
    }

    /// Returns the log probability of tag `prev` at `n - 1` followed by tag `k` at `n`.
    ///
    /// # Errors
    ///
    /// `n` must be in `1..num_tokens` and both tags must be in range.
    pub fn log_probability_transition(&self, n: usize, prev: usize, k: usize) -> Result<f64> {
        self.check_edge(n, prev, k)?;
        Ok(self.lattice.log_probability_transition(n, prev, k))
    }

    /// Returns the log probability of the tag indices `tags` occupying
    /// positions `start..start + tags.len()`.
    ///
    /// # Errors
    ///
    /// The span must lie inside the input and every tag must be in range.
    pub fn log_probability_path(&self, start: usize, tags: &[usize]) -> Result<f64> {
        if tags.is_empty() {
            return Ok(0.0);
        }
        check_index("position", start, self.num_tokens())?;
        check_index("position", start + (tags.len() - 1), self.num_tokens())?;
        for &k in tags {
            check_index("tag", k, self.num_tags())?;
        }
        Ok(self.lattice.log_probability_path(start, tags))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::forward_backward::calculate_lattice;
    use crate::test_utils::{
        brute_force_paths, generate_test_potentials, generate_test_tag_set,
        generate_test_weights,
    };

    fn generate_test_tag_lattice(
        tokens: &[&'static str],
    ) -> (TagLattice<&'static str>, Vec<(Vec<usize>, f64)>) {
        let tag_set = generate_test_tag_set();
        let weights = generate_test_weights(&tag_set);
        let potentials = generate_test_potentials(tokens, &weights, &tag_set);
        let paths = brute_force_paths(&potentials);
        let lattice = calculate_lattice(potentials);
        (
            TagLattice::new(tokens.to_vec(), tag_set.tags().to_vec(), lattice),
            paths,
        )
    }

    #[test]
    fn test_full_path_probability() {
        let (lattice, paths) = generate_test_tag_lattice(&["x", "y", "z"]);
        let mut total = 0.0;
        for (path, score) in &paths {
            let log_p = lattice.log_probability_path(0, path).unwrap();
            assert!((score - lattice.log_z() - log_p).abs() < 1e-9);
            total += log_p.exp();
        }
        assert!((1.0 - total).abs() < 1e-9);
    }

    #[test]
    fn test_subsequence_probability() {
        let (lattice, paths) = generate_test_tag_lattice(&["y", "x", "z", "x"]);
        for sub in [[0, 1], [2, 2], [1, 0]] {
            let mut expected = 0.0;
            for (path, score) in &paths {
                if path[1..3] == sub {
                    expected += (score - lattice.log_z()).exp();
                }
            }
            let actual = lattice.log_probability_path(1, &sub).unwrap().exp();
            assert!((expected - actual).abs() < 1e-9, "{sub:?}: {expected} != {actual}");
        }
        let single = lattice.log_probability_path(3, &[2]).unwrap();
        assert!((single - lattice.log_probability(3, 2).unwrap()).abs() < 1e-12);
        let pair = lattice.log_probability_path(1, &[0, 1]).unwrap();
        assert!((pair - lattice.log_probability_transition(2, 0, 1).unwrap()).abs() < 1e-12);
    }

    #[test]
    fn test_out_of_range() {
        let (lattice, _) = generate_test_tag_lattice(&["x", "y"]);
        assert!(lattice.log_probability(2, 0).is_err());
        assert!(lattice.log_probability(0, 3).is_err());
        assert!(lattice.log_probability_transition(0, 0, 0).is_err());
        assert!(lattice.log_transition(1, 3, 0).is_err());
        assert!(lattice.log_probability_path(1, &[0, 0]).is_err());
        assert_eq!(0.0, lattice.log_probability_path(5, &[]).unwrap());
        assert!(lattice.log_probability_path(usize::MAX, &[0, 0]).is_err());
        assert_eq!(Some(1), lattice.tag_index("B"));
        assert_eq!(Some("C"), lattice.tag(2));
    }
}
