use crate::potentials::Potentials;

/// Best prefix scores and backpointers over a tagging lattice.
///
/// `score(n, k)` is the highest score of any tag sequence over positions
/// `0..=n` that ends in tag `k`; `backpointer(n, k)` is the tag at `n - 1`
/// on that sequence.
pub struct ViterbiTable {
    num_tags: usize,

    // [N][K]
    scores: Vec<f64>,

    // [N][K], row 0 unused
    backpointers: Vec<usize>,
}

impl ViterbiTable {
    pub fn new(potentials: &Potentials) -> Self {
        let num_tokens = potentials.num_tokens();
        let num_tags = potentials.num_tags();
        let mut scores = vec![f64::NEG_INFINITY; num_tokens * num_tags];
        let mut backpointers = vec![0; num_tokens * num_tags];
        if num_tokens == 0 {
            return Self {
                num_tags,
                scores,
                backpointers,
            };
        }
        for k in 0..num_tags {
            scores[k] = potentials.node(0, k);
        }
        for n in 1..num_tokens {
            let (prev_scores, curr_scores) = scores.split_at_mut(n * num_tags);
            let prev_scores = &prev_scores[(n - 1) * num_tags..];
            for k in 0..num_tags {
                let mut best_score = f64::NEG_INFINITY;
                let mut best_prev = 0;
                for (prev, &prev_score) in prev_scores.iter().enumerate() {
                    if prev_score == f64::NEG_INFINITY {
                        continue;
                    }
                    let score = prev_score + potentials.transition(n, prev, k);
                    if score > best_score {
                        best_score = score;
                        best_prev = prev;
                    }
                }
                curr_scores[k] = best_score;
                backpointers[n * num_tags + k] = best_prev;
            }
        }
        Self {
            num_tags,
            scores,
            backpointers,
        }
    }

    #[inline(always)]
    pub fn num_tokens(&self) -> usize {
        if self.num_tags == 0 {
            0
        } else {
            self.scores.len() / self.num_tags
        }
    }

    #[inline(always)]
    pub fn score(&self, n: usize, k: usize) -> f64 {
        self.scores[n * self.num_tags + k]
    }

    #[inline(always)]
    pub fn backpointer(&self, n: usize, k: usize) -> usize {
        self.backpointers[n * self.num_tags + k]
    }

    /// Traces the best full path, or returns `None` if every path is illegal.
    ///
    /// An empty input yields an empty path with score 0.
    pub fn best_path(&self) -> Option<(Vec<usize>, f64)> {
        let num_tokens = self.num_tokens();
        if num_tokens == 0 {
            return Some((vec![], 0.0));
        }
        let mut best_score = f64::NEG_INFINITY;
        let mut best_tag = None;
        for k in 0..self.num_tags {
            let score = self.score(num_tokens - 1, k);
            if score > best_score {
                best_score = score;
                best_tag = Some(k);
            }
        }
        let mut k = best_tag?;
        let mut path = Vec::with_capacity(num_tokens);
        path.push(k);
        for n in (1..num_tokens).rev() {
            k = self.backpointer(n, k);
            path.push(k);
        }
        path.reverse();
        Some((path, best_score))
    }
}

/// Finds the best-scoring tag index sequence.
pub fn viterbi(potentials: &Potentials) -> Option<(Vec<usize>, f64)> {
    if potentials.num_tokens() == 0 {
        return Some((vec![], 0.0));
    }
    ViterbiTable::new(potentials).best_path()
}
