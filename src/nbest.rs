use crate::potentials::Potentials;
use crate::queue::BoundedPriorityQueue;
use crate::tagging::{ScoredTagging, Tagging};
use crate::viterbi::ViterbiTable;

/// A fixed suffix of a candidate path.
///
/// `score` is the sum of the transition potentials from `position + 1` to
/// the end of the input along this suffix, where `position` holds `tag`.
#[derive(Clone, Copy, Debug)]
struct ForwardPointer {
    tag: usize,
    parent: Option<usize>,
    score: f64,
}

/// A prefix boundary `(position, tag)` joined to a fixed suffix.
#[derive(Clone, Copy, Debug)]
struct NBestState {
    position: usize,
    tag: usize,
    // suffix starting at `position + 1`
    suffix: Option<usize>,
}

/// Lazily enumerates taggings in order of decreasing score.
///
/// The search is best-first from the end of the input toward its start.
/// Each state is keyed by the exact best score of any prefix ending at its
/// boundary plus the score of its fixed suffix, so the first complete path
/// popped is always the best one remaining. Forward pointers are stored in an
/// arena and shared between candidates with a common suffix.
///
/// Created by [`ChainCrf::tag_n_best`](crate::ChainCrf::tag_n_best) and
/// [`ChainCrf::tag_n_best_conditional`](crate::ChainCrf::tag_n_best_conditional).
pub struct NBestIter<E> {
    tokens: Vec<E>,
    tags: Vec<String>,
    potentials: Potentials,
    viterbi: ViterbiTable,
    queue: BoundedPriorityQueue<NBestState>,
    pointers: Vec<ForwardPointer>,
    log_z: f64,
    remaining: usize,
}

impl<E> NBestIter<E> {
    /// Starts a search session.
    ///
    /// `log_z` is subtracted from every emitted score; pass 0 for unnormalized scores.
    pub(crate) fn new(
        tokens: Vec<E>,
        tags: Vec<String>,
        potentials: Potentials,
        max_results: usize,
        log_z: f64,
    ) -> Self {
        let viterbi = ViterbiTable::new(&potentials);
        let mut queue = BoundedPriorityQueue::new(max_results);
        let num_tokens = potentials.num_tokens();
        if num_tokens != 0 {
            for k in 0..potentials.num_tags() {
                let priority = viterbi.score(num_tokens - 1, k);
                if priority == f64::NEG_INFINITY {
                    continue;
                }
                queue.push(
                    priority,
                    NBestState {
                        position: num_tokens - 1,
                        tag: k,
                        suffix: None,
                    },
                );
            }
        }
        Self {
            tokens,
            tags,
            potentials,
            viterbi,
            queue,
            pointers: vec![],
            log_z,
            remaining: max_results,
        }
    }

    fn push_pointer(&mut self, tag: usize, parent: Option<usize>, score: f64) -> usize {
        self.pointers.push(ForwardPointer { tag, parent, score });
        self.pointers.len() - 1
    }

    /// Pops the best state and completes it along its Viterbi prefix, queueing
    /// every alternative previous tag on the way.
    fn buffer_next(&mut self) -> Option<Vec<usize>> {
        let (_, state) = self.queue.pop()?;
        let NBestState {
            mut position,
            mut tag,
            mut suffix,
        } = state;
        let mut suffix_score = suffix.map_or(0.0, |i| {
            let pointer = self.pointers[i];
            pointer.score + self.potentials.transition(position + 1, tag, pointer.tag)
        });
        let num_tags = self.potentials.num_tags();
        while position > 0 {
            let pointer = self.push_pointer(tag, suffix, suffix_score);
            let best_prev = self.viterbi.backpointer(position, tag);
            for prev in 0..num_tags {
                if prev == best_prev {
                    continue;
                }
                let prefix_score = self.viterbi.score(position - 1, prev);
                let transition = self.potentials.transition(position, prev, tag);
                if prefix_score == f64::NEG_INFINITY || transition == f64::NEG_INFINITY {
                    continue;
                }
                self.queue.push(
                    prefix_score + transition + suffix_score,
                    NBestState {
                        position: position - 1,
                        tag: prev,
                        suffix: Some(pointer),
                    },
                );
            }
            suffix_score += self.potentials.transition(position, best_prev, tag);
            suffix = Some(pointer);
            tag = best_prev;
            position -= 1;
        }

        let mut path = Vec::with_capacity(self.potentials.num_tokens());
        path.push(tag);
        let mut next = suffix;
        while let Some(i) = next {
            let pointer = self.pointers[i];
            path.push(pointer.tag);
            next = pointer.parent;
        }
        Some(path)
    }
}

impl<E> Iterator for NBestIter<E>
where
    E: Clone,
{
    type Item = ScoredTagging<E>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let path = if self.potentials.num_tokens() == 0 {
            self.remaining = 1;
            vec![]
        } else {
            self.buffer_next()?
        };
        self.remaining -= 1;
        let score = self.potentials.path_score(&path) - self.log_z;
        let tags = path.iter().map(|&k| self.tags[k].clone()).collect();
        Some(ScoredTagging::new(
            Tagging::new(self.tokens.clone(), tags).ok()?,
            score,
        ))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.potentials.num_tokens() == 0 {
            let n = self.remaining.min(1);
            return (n, Some(n));
        }
        // every queued state completes to at least one distinct tagging
        (self.queue.len().min(self.remaining), Some(self.remaining))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::forward_backward::calculate_lattice;
    use crate::tag_set::TagSet;
    use crate::test_utils::{
        brute_force_paths, generate_test_potentials, generate_test_tag_set,
        generate_test_weights,
    };
    use crate::viterbi::viterbi;

    fn indices(tag_set: &TagSet, result: &ScoredTagging<&str>) -> Vec<usize> {
        result
            .tags()
            .iter()
            .map(|t| tag_set.index_of(t).unwrap())
            .collect()
    }

    fn n_best<'a>(
        tokens: &[&'a str],
        tag_set: &TagSet,
        max_results: usize,
    ) -> (Vec<ScoredTagging<&'a str>>, Potentials) {
        let weights = generate_test_weights(tag_set);
        let potentials = generate_test_potentials(tokens, &weights, tag_set);
        let iter = NBestIter::new(
            tokens.to_vec(),
            tag_set.tags().to_vec(),
            potentials.clone(),
            max_results,
            0.0,
        );
        (iter.collect(), potentials)
    }

    #[test]
    fn test_enumerates_all_legal_paths_in_order() {
        let tag_set = generate_test_tag_set();
        let (results, potentials) = n_best(&["x", "y", "z", "y"], &tag_set, 1000);
        let mut expected = brute_force_paths(&potentials);
        expected.sort_by(|a, b| b.1.total_cmp(&a.1));
        assert_eq!(expected.len(), results.len());
        for (result, (_, score)) in results.iter().zip(&expected) {
            assert!((result.score() - score).abs() < 1e-9);
        }
        for w in results.windows(2) {
            assert!(w[0].score() + 1e-9 >= w[1].score());
        }
        let mut seen: Vec<Vec<usize>> = results.iter().map(|r| indices(&tag_set, r)).collect();
        for path in &seen {
            assert!(tag_set.is_legal_path(path));
        }
        seen.sort();
        seen.dedup();
        assert_eq!(expected.len(), seen.len());
    }

    #[test]
    fn test_first_is_viterbi() {
        let tag_set = generate_test_tag_set();
        for tokens in [&["x"][..], &["z", "x"][..], &["y", "y", "x", "z", "x"][..]] {
            let (results, potentials) = n_best(tokens, &tag_set, 3);
            let (path, score) = viterbi(&potentials).unwrap();
            assert_eq!(path, indices(&tag_set, &results[0]));
            assert_eq!(score, results[0].score());
            assert!(results.len() <= 3);
        }
    }

    #[test]
    fn test_max_results() {
        let tag_set = TagSet::fully_connected(vec!["A".into(), "B".into()]).unwrap();
        let (results, _) = n_best(&["x", "y", "z"], &tag_set, 5);
        assert_eq!(5, results.len());
        let (results, _) = n_best(&["x", "y", "z"], &tag_set, 100);
        assert_eq!(8, results.len());
        let (results, _) = n_best(&["x", "y"], &tag_set, 0);
        assert!(results.is_empty());
    }

    #[test]
    fn test_empty_input() {
        let tag_set = generate_test_tag_set();
        let (results, _) = n_best(&[], &tag_set, 10);
        assert_eq!(1, results.len());
        assert!(results[0].tags().is_empty());
        assert_eq!(0.0, results[0].score());
    }

    #[test]
    fn test_conditional_scores() {
        let tag_set = generate_test_tag_set();
        let weights = generate_test_weights(&tag_set);
        let tokens = ["z", "y", "x"];
        let potentials = generate_test_potentials(&tokens, &weights, &tag_set);
        let log_z = calculate_lattice(potentials.clone()).log_z();
        let unnormalized: Vec<_> = NBestIter::new(
            tokens.to_vec(),
            tag_set.tags().to_vec(),
            potentials.clone(),
            100,
            0.0,
        )
        .collect();
        let normalized: Vec<_> =
            NBestIter::new(tokens.to_vec(), tag_set.tags().to_vec(), potentials, 100, log_z)
                .collect();
        assert_eq!(unnormalized.len(), normalized.len());
        let mut total = 0.0;
        for (u, n) in unnormalized.iter().zip(&normalized) {
            assert_eq!(u.tags(), n.tags());
            assert!((u.score() - log_z - n.score()).abs() < 1e-12);
            total += n.score().exp();
        }
        assert!((1.0 - total).abs() < 1e-9);
    }
}
