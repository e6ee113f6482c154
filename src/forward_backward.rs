use crate::lattice::LogLattice;
use crate::math;
use crate::potentials::Potentials;

/// Runs the forward-backward algorithm in log space.
///
/// The transition potentials are moved into the resulting lattice.
pub fn calculate_lattice(potentials: Potentials) -> LogLattice {
    let num_tokens = potentials.num_tokens();
    let num_tags = potentials.num_tags();
    if num_tokens == 0 {
        return LogLattice::empty(num_tags);
    }

    let mut alphas = vec![f64::NEG_INFINITY; num_tokens * num_tags];
    let mut betas = vec![0.0; num_tokens * num_tags];
    let mut row = vec![f64::NEG_INFINITY; num_tags];

    // alphas
    for k in 0..num_tags {
        alphas[k] = potentials.node(0, k);
    }
    for n in 1..num_tokens {
        for k in 0..num_tags {
            for (prev, x) in row.iter_mut().enumerate() {
                *x = alphas[(n - 1) * num_tags + prev] + potentials.transition(n, prev, k);
            }
            alphas[n * num_tags + k] = math::logsumexp_slice(&row);
        }
    }

    // betas
    for n in (0..num_tokens - 1).rev() {
        for k in 0..num_tags {
            for (next, x) in row.iter_mut().enumerate() {
                *x = betas[(n + 1) * num_tags + next] + potentials.transition(n + 1, k, next);
            }
            betas[n * num_tags + k] = math::logsumexp_slice(&row);
        }
    }

    let log_z = math::logsumexp_slice(&alphas[(num_tokens - 1) * num_tags..]);

    LogLattice::new(
        num_tokens,
        num_tags,
        alphas,
        betas,
        potentials.into_transitions(),
        log_z,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::test_utils::{
        brute_force_paths, generate_test_potentials, generate_test_tag_set,
        generate_test_weights, logsumexp,
    };

    #[test]
    fn test_log_z_matches_brute_force() {
        let tag_set = generate_test_tag_set();
        let weights = generate_test_weights(&tag_set);
        for tokens in [&["x"][..], &["x", "z"][..], &["z", "y", "x", "y", "x"][..]] {
            let potentials = generate_test_potentials(tokens, &weights, &tag_set);
            let paths = brute_force_paths(&potentials);
            let mut expected = f64::NEG_INFINITY;
            for (_, score) in &paths {
                expected = crate::math::logsumexp(expected, *score);
            }
            let lattice = calculate_lattice(potentials);
            assert!((expected - lattice.log_z()).abs() < 1e-9);
        }
    }

    #[test]
    fn test_log_z_two_tokens() {
        let tag_set = generate_test_tag_set();
        let weights = generate_test_weights(&tag_set);
        let potentials = generate_test_potentials(&["y", "x"], &weights, &tag_set);
        let mut scores = vec![];
        for a in 0..3 {
            for b in 0..3 {
                scores.push(potentials.node(0, a) + potentials.transition(1, a, b));
            }
        }
        let expected = logsumexp!(
            scores[0], scores[1], scores[2], scores[3], scores[4], scores[5], scores[6],
            scores[7], scores[8],
        );
        let lattice = calculate_lattice(potentials);
        assert!((expected - lattice.log_z()).abs() < 1e-9);
    }

    #[test]
    fn test_point_marginals_sum_to_one() {
        let tag_set = generate_test_tag_set();
        let weights = generate_test_weights(&tag_set);
        let potentials = generate_test_potentials(&["x", "y", "z", "x"], &weights, &tag_set);
        let lattice = calculate_lattice(potentials);
        for n in 0..lattice.num_tokens() {
            let total: f64 = (0..lattice.num_tags())
                .map(|k| lattice.log_probability(n, k).exp())
                .sum();
            assert!((1.0 - total).abs() < 1e-9, "position {n}: {total}");
        }
    }

    #[test]
    fn test_point_marginals_match_brute_force() {
        let tag_set = generate_test_tag_set();
        let weights = generate_test_weights(&tag_set);
        let potentials = generate_test_potentials(&["z", "x", "y"], &weights, &tag_set);
        let paths = brute_force_paths(&potentials);
        let lattice = calculate_lattice(potentials);
        for n in 0..3 {
            for k in 0..3 {
                let mut expected = f64::NEG_INFINITY;
                for (path, score) in &paths {
                    if path[n] == k {
                        expected = crate::math::logsumexp(expected, *score);
                    }
                }
                let expected = (expected - lattice.log_z()).exp();
                let actual = lattice.log_probability(n, k).exp();
                assert!((expected - actual).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_pairwise_marginals_sum_to_point_marginal() {
        let tag_set = generate_test_tag_set();
        let weights = generate_test_weights(&tag_set);
        let potentials = generate_test_potentials(&["x", "y", "z"], &weights, &tag_set);
        let lattice = calculate_lattice(potentials);
        for n in 1..3 {
            for k in 0..3 {
                let total: f64 = (0..3)
                    .map(|prev| lattice.log_probability_transition(n, prev, k).exp())
                    .sum();
                let expected = lattice.log_probability(n, k).exp();
                assert!((expected - total).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_empty_lattice() {
        let tag_set = generate_test_tag_set();
        let weights = generate_test_weights(&tag_set);
        let potentials = generate_test_potentials(&[], &weights, &tag_set);
        let lattice = calculate_lattice(potentials);
        assert_eq!(0, lattice.num_tokens());
        assert_eq!(0.0, lattice.log_z());
    }
}
