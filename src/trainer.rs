use core::f64::consts::LN_2;
use std::borrow::Cow;
use std::collections::VecDeque;
use std::thread;

use log::{debug, info, warn};

use crate::annealing::{Annealing, AnnealingSchedule};
use crate::corpus::Corpus;
use crate::errors::{CrfError, Result};
use crate::features::{ChainFeatureExtractor, ChainFeatureVectors, ChainFeatures};
use crate::forward_backward::calculate_lattice;
use crate::math::{self, LOG_PROB_CUTOFF};
use crate::model::ChainCrf;
use crate::potentials::Potentials;
use crate::prior::{Prior, RegressionPrior};
use crate::symbol_table::{SymbolCounter, SymbolTable};
use crate::tag_set::TagSet;
use crate::vector::Vector;

const ROLLING_WINDOW: usize = 10;

struct TrainingInstance<E> {
    tokens: Vec<E>,
    tags: Vec<usize>,
    vectors: Option<ChainFeatureVectors>,
}

/// Everything fixed during the epochs.
struct TrainingProblem<'a, E, X> {
    instances: Vec<TrainingInstance<E>>,
    tag_set: TagSet,
    symbols: SymbolTable,
    extractor: &'a X,
    add_intercept: bool,
}

impl<E, X> TrainingProblem<'_, E, X>
where
    X: ChainFeatureExtractor<E>,
{
    fn materialize(&self, tokens: &[E]) -> ChainFeatureVectors {
        let features = self.extractor.extract(tokens, self.tag_set.tags());
        ChainFeatureVectors::new(
            &features,
            self.tag_set.num_tags(),
            &self.symbols,
            self.add_intercept,
        )
    }

    fn vectors<'b>(&'b self, instance: &'b TrainingInstance<E>) -> Cow<'b, ChainFeatureVectors> {
        match &instance.vectors {
            Some(vectors) => Cow::Borrowed(vectors),
            None => Cow::Owned(self.materialize(&instance.tokens)),
        }
    }

    /// Log-likelihood (natural log) of the observed tags of one instance.
    fn instance_log_likelihood(&self, instance: &TrainingInstance<E>, weights: &[Vector]) -> f64 {
        let vectors = self.vectors(instance);
        let potentials = Potentials::new(&vectors, weights, &self.tag_set);
        let score = potentials.path_score(&instance.tags);
        score - calculate_lattice(potentials).log_z()
    }

    /// Moves the weights toward the empirical feature counts of one instance and
    /// away from the expected counts under the current weights.
    fn update(&self, instance: &TrainingInstance<E>, weights: &mut [Vector], learning_rate: f64) {
        let vectors = self.vectors(instance);
        let num_tags = self.tag_set.num_tags();
        let lattice = calculate_lattice(Potentials::new(&vectors, weights, &self.tag_set));
        if !lattice.log_z().is_finite() {
            warn!("skipped an instance with log Z = {}", lattice.log_z());
            return;
        }

        for (n, &k) in instance.tags.iter().enumerate() {
            weights[k].add_scaled(learning_rate, vectors.node(n));
            if n != 0 {
                weights[k].add_scaled(learning_rate, vectors.edge(n, instance.tags[n - 1]));
            }
        }

        for n in 0..vectors.num_tokens() {
            for (k, weight) in weights.iter_mut().enumerate() {
                let log_p = lattice.log_probability(n, k);
                // also skips NaN
                if !(log_p >= LOG_PROB_CUTOFF) {
                    continue;
                }
                weight.add_scaled(-learning_rate * log_p.exp(), vectors.node(n));
            }
            if n == 0 {
                continue;
            }
            for prev in 0..num_tags {
                for (k, weight) in weights.iter_mut().enumerate() {
                    let log_p = lattice.log_probability_transition(n, prev, k);
                    if !(log_p >= LOG_PROB_CUTOFF) {
                        continue;
                    }
                    weight.add_scaled(-learning_rate * log_p.exp(), vectors.edge(n, prev));
                }
            }
        }
    }
}

impl<E, X> TrainingProblem<'_, E, X>
where
    E: Sync,
    X: ChainFeatureExtractor<E> + Sync,
{
    /// Log-likelihood (base 2) of the corpus, evaluated on `n_threads` threads.
    fn log2_likelihood(&self, weights: &[Vector], n_threads: usize) -> f64 {
        let (s, r) = crossbeam_channel::unbounded();
        for instance in &self.instances {
            // `r` is alive, so sending never fails.
            let _ = s.send(instance);
        }
        drop(s);
        let total: f64 = thread::scope(|scope| {
            let mut threads = vec![];
            for _ in 0..n_threads {
                let t = scope.spawn(|| {
                    let mut total = 0.0;
                    while let Ok(instance) = r.recv() {
                        total += self.instance_log_likelihood(instance, weights);
                    }
                    total
                });
                threads.push(t);
            }
            threads
                .into_iter()
                .map(|t| t.join().unwrap_or_else(|e| std::panic::resume_unwind(e)))
                .sum()
        });
        total / LN_2
    }
}

/// State carried from one epoch to the next.
struct TrainingSession {
    weights: Vec<Vector>,
    instances_since_prior: usize,
    last_objective: Option<f64>,
    improvements: VecDeque<f64>,
    best: Option<(f64, Vec<Vector>)>,
}

impl TrainingSession {
    fn new(num_tags: usize, dims: usize) -> Self {
        Self {
            weights: vec![Vector::zeros(dims); num_tags],
            instances_since_prior: 0,
            last_objective: None,
            improvements: VecDeque::with_capacity(ROLLING_WINDOW),
            best: None,
        }
    }

    /// Records an accepted epoch and returns the rolling average improvement.
    fn record(&mut self, objective: f64) -> Option<f64> {
        if let Some(last) = self.last_objective {
            if self.improvements.len() == ROLLING_WINDOW {
                self.improvements.pop_front();
            }
            self.improvements
                .push_back(math::relative_absolute_difference(last, objective));
        }
        self.last_objective = Some(objective);
        if self.best.as_ref().is_none_or(|(best, _)| objective > *best) {
            self.best = Some((objective, self.weights.clone()));
        }
        if self.improvements.is_empty() {
            None
        } else {
            Some(self.improvements.iter().sum::<f64>() / self.improvements.len() as f64)
        }
    }

    fn into_best_weights(self) -> Vec<Vector> {
        self.best.map_or(self.weights, |(_, weights)| weights)
    }
}

/// Trainer for linear-chain CRFs using regularized stochastic gradient descent.
///
/// Each epoch visits every training instance once. After every
/// `prior_block_size` instances, and once more at the end of the epoch, the
/// weights are moved toward the mode of the prior. Training stops when the
/// average relative change of the penalized log-likelihood over the last
/// epochs drops below `min_improvement`, or after `max_epochs`.
#[cfg_attr(docsrs, doc(cfg(feature = "train")))]
pub struct Trainer {
    max_epochs: usize,
    min_epochs: usize,
    min_improvement: f64,
    prior_block_size: usize,
    min_feature_count: usize,
    add_intercept: bool,
    allow_unseen_transitions: bool,
    cache_features: bool,
    n_threads: usize,
    prior: Box<dyn RegressionPrior>,
    annealing: Box<dyn AnnealingSchedule>,
}

impl Trainer {
    /// Creates a new trainer.
    pub fn new() -> Self {
        Self {
            max_epochs: 100,
            min_epochs: 5,
            min_improvement: 1e-5,
            prior_block_size: 1,
            min_feature_count: 1,
            add_intercept: true,
            allow_unseen_transitions: false,
            cache_features: true,
            n_threads: 1,
            prior: Box::new(Prior::noninformative()),
            annealing: Box::new(Annealing::default()),
        }
    }

    /// Sets the maximum number of epochs.
    ///
    /// # Errors
    ///
    /// `max_epochs` must not be 0.
    pub fn max_epochs(mut self, max_epochs: usize) -> Result<Self> {
        if max_epochs == 0 {
            return Err(CrfError::invalid_argument("max_epochs must not be 0"));
        }
        self.max_epochs = max_epochs;
        Ok(self)
    }

    /// Sets the minimum number of epochs run before convergence is checked.
    pub fn min_epochs(mut self, min_epochs: usize) -> Self {
        self.min_epochs = min_epochs;
        self
    }

    /// Sets the rolling relative improvement below which training stops.
    ///
    /// # Errors
    ///
    /// `min_improvement` must be non-negative.
    pub fn min_improvement(mut self, min_improvement: f64) -> Result<Self> {
        if !(min_improvement >= 0.0) {
            return Err(CrfError::invalid_argument(format!(
                "min_improvement must be greater than or equal to 0.0, but got {min_improvement}"
            )));
        }
        self.min_improvement = min_improvement;
        Ok(self)
    }

    /// Sets the number of instances between two prior updates.
    ///
    /// # Errors
    ///
    /// `prior_block_size` must not be 0.
    pub fn prior_block_size(mut self, prior_block_size: usize) -> Result<Self> {
        if prior_block_size == 0 {
            return Err(CrfError::invalid_argument("prior_block_size must not be 0"));
        }
        self.prior_block_size = prior_block_size;
        Ok(self)
    }

    /// Sets the number of occurrences a feature needs to be kept.
    ///
    /// # Errors
    ///
    /// `min_feature_count` must not be 0.
    pub fn min_feature_count(mut self, min_feature_count: usize) -> Result<Self> {
        if min_feature_count == 0 {
            return Err(CrfError::invalid_argument("min_feature_count must not be 0"));
        }
        self.min_feature_count = min_feature_count;
        Ok(self)
    }

    /// Reserves dimension 0 for an always-on intercept feature.
    pub fn add_intercept(mut self, add_intercept: bool) -> Self {
        self.add_intercept = add_intercept;
        self
    }

    /// If `false`, starts, ends and transitions never observed in training are
    /// forbidden in the trained model.
    pub fn allow_unseen_transitions(mut self, allow_unseen_transitions: bool) -> Self {
        self.allow_unseen_transitions = allow_unseen_transitions;
        self
    }

    /// Keeps the feature vectors of every instance in memory across epochs.
    pub fn cache_features(mut self, cache_features: bool) -> Self {
        self.cache_features = cache_features;
        self
    }

    /// Sets the number of threads used to evaluate the log-likelihood.
    ///
    /// # Errors
    ///
    /// `n_threads` must not be 0.
    pub fn n_threads(mut self, n_threads: usize) -> Result<Self> {
        if n_threads == 0 {
            return Err(CrfError::invalid_argument("n_threads must not be 0"));
        }
        self.n_threads = n_threads;
        Ok(self)
    }

    /// Sets the regularization prior.
    pub fn prior<P>(mut self, prior: P) -> Self
    where
        P: RegressionPrior + 'static,
    {
        self.prior = Box::new(prior);
        self
    }

    /// Sets the learning rate schedule.
    pub fn annealing<A>(mut self, annealing: A) -> Self
    where
        A: AnnealingSchedule + 'static,
    {
        self.annealing = Box::new(annealing);
        self
    }

    fn apply_prior(&self, weights: &mut [Vector], scale: f64) {
        for weight in weights {
            let Some(values) = weight.dense_values_mut() else {
                continue;
            };
            for (d, value) in values.iter_mut().enumerate() {
                let mode = self.prior.mode(d);
                let delta = scale * self.prior.gradient(*value, d);
                if *value > mode {
                    *value = (*value - delta).max(mode);
                } else if *value < mode {
                    *value = (*value - delta).min(mode);
                }
            }
        }
    }

    fn prior_step(&self, session: &mut TrainingSession, num_instances: usize, learning_rate: f64) {
        if self.prior.is_uniform() || session.instances_since_prior == 0 {
            session.instances_since_prior = 0;
            return;
        }
        let scale =
            session.instances_since_prior as f64 / num_instances as f64 * learning_rate;
        debug!(
            "prior update after {} instances, scale={scale}",
            session.instances_since_prior
        );
        self.apply_prior(&mut session.weights, scale);
        session.instances_since_prior = 0;
    }

    /// One pass over the instances, with a prior step after every block and
    /// one for the remainder.
    fn sgd_epoch<E, X>(
        &self,
        problem: &TrainingProblem<'_, E, X>,
        session: &mut TrainingSession,
        learning_rate: f64,
    ) where
        X: ChainFeatureExtractor<E>,
    {
        let num_instances = problem.instances.len();
        for instance in &problem.instances {
            problem.update(instance, &mut session.weights, learning_rate);
            session.instances_since_prior += 1;
            if session.instances_since_prior == self.prior_block_size {
                self.prior_step(session, num_instances, learning_rate);
            }
        }
        self.prior_step(session, num_instances, learning_rate);
    }

    fn log2_prior(&self, weights: &[Vector]) -> f64 {
        if self.prior.is_uniform() {
            return 0.0;
        }
        weights.iter().map(|w| self.prior.log2_prior(w)).sum()
    }

    /// Builds the tag set, the feature table and the training instances.
    fn prepare<'a, E, C, X>(
        &self,
        corpus: &C,
        extractor: &'a X,
    ) -> Result<TrainingProblem<'a, E, X>>
    where
        E: Clone,
        C: Corpus<E> + ?Sized,
        X: ChainFeatureExtractor<E>,
    {
        let mut tags = SymbolTable::new();
        let mut pairs = vec![];
        let mut num_empty = 0;
        corpus.visit(&mut |tagging| {
            if tagging.is_empty() {
                num_empty += 1;
                return;
            }
            let indices: Vec<usize> = tagging.tags().iter().map(|t| tags.get_or_add(t)).collect();
            pairs.push((tagging.tokens().to_vec(), indices));
        });
        if num_empty != 0 {
            info!("skipped {num_empty} empty training sequences");
        }
        if pairs.is_empty() {
            return Err(CrfError::invalid_argument(
                "the corpus must contain a non-empty tagging",
            ));
        }
        let num_tags = tags.len();

        let tag_set = if self.allow_unseen_transitions {
            TagSet::fully_connected(tags.symbols().to_vec())?
        } else {
            let mut legal_start = vec![false; num_tags];
            let mut legal_end = vec![false; num_tags];
            let mut legal_transitions = vec![vec![false; num_tags]; num_tags];
            for (_, indices) in &pairs {
                if let (Some(&first), Some(&last)) = (indices.first(), indices.last()) {
                    legal_start[first] = true;
                    legal_end[last] = true;
                }
                for w in indices.windows(2) {
                    legal_transitions[w[0]][w[1]] = true;
                }
            }
            TagSet::new(
                tags.symbols().to_vec(),
                legal_start,
                legal_end,
                legal_transitions,
            )?
        };

        // Edge features are counted for the observed previous tag only.
        let mut counter = SymbolCounter::new();
        for (tokens, indices) in &pairs {
            let features = extractor.extract(tokens, tag_set.tags());
            if features.num_tokens() != tokens.len() {
                return Err(CrfError::invalid_argument(format!(
                    "tokens.len()={} but the extracted features cover {} tokens",
                    tokens.len(),
                    features.num_tokens(),
                )));
            }
            for n in 0..features.num_tokens() {
                counter.add_features(&features.node_features(n));
                if n != 0 {
                    counter.add_features(&features.edge_features(n, indices[n - 1]));
                }
            }
        }
        let num_seen = counter.len();
        let symbols = counter.into_symbol_table(self.min_feature_count, self.add_intercept);
        info!(
            "{} training instances, {num_tags} tags, {} features ({num_seen} seen)",
            pairs.len(),
            symbols.len(),
        );

        let mut problem = TrainingProblem {
            instances: vec![],
            tag_set,
            symbols,
            extractor,
            add_intercept: self.add_intercept,
        };
        let mut instances = Vec::with_capacity(pairs.len());
        for (tokens, tags) in pairs {
            let vectors = self
                .cache_features
                .then(|| problem.materialize(&tokens));
            instances.push(TrainingInstance {
                tokens,
                tags,
                vectors,
            });
        }
        problem.instances = instances;
        Ok(problem)
    }

    /// Trains a model on the given corpus.
    ///
    /// Returns the weights of the epoch with the highest penalized
    /// log-likelihood. Running out of epochs before convergence is not an error.
    ///
    /// # Errors
    ///
    /// The corpus must contain at least one non-empty tagging, and `min_epochs`
    /// must not exceed `max_epochs`.
    pub fn train<E, C, X>(&mut self, corpus: &C, extractor: X) -> Result<ChainCrf<X>>
    where
        E: Clone + Sync,
        C: Corpus<E> + ?Sized,
        X: ChainFeatureExtractor<E> + Sync,
    {
        if self.min_epochs > self.max_epochs {
            return Err(CrfError::invalid_argument(format!(
                "min_epochs={} must not exceed max_epochs={}",
                self.min_epochs, self.max_epochs,
            )));
        }
        let problem = self.prepare(corpus, &extractor)?;
        let mut session = TrainingSession::new(problem.tag_set.num_tags(), problem.symbols.len());

        for epoch in 0..self.max_epochs {
            let learning_rate = self.annealing.learning_rate(epoch);
            let snapshot = session.weights.clone();
            self.sgd_epoch(&problem, &mut session, learning_rate);

            let log_likelihood = problem.log2_likelihood(&session.weights, self.n_threads);
            let log_prior = self.log2_prior(&session.weights);
            let objective = log_likelihood + log_prior;
            if !self.annealing.received_error(epoch, learning_rate, -objective) {
                warn!("epoch={epoch} rejected by the annealing schedule, restoring weights");
                session.weights = snapshot;
                continue;
            }
            let improvement = session.record(objective);
            info!(
                "epoch={epoch}, learning_rate={learning_rate}, log_likelihood={log_likelihood}, \
                 log_prior={log_prior}, objective={objective}, improvement={improvement:?}"
            );
            if epoch + 1 >= self.min_epochs
                && improvement.is_some_and(|x| x < self.min_improvement)
            {
                info!("converged after {} epochs", epoch + 1);
                break;
            }
        }

        let TrainingProblem {
            tag_set, symbols, ..
        } = problem;
        ChainCrf::new(
            tag_set,
            session.into_best_weights(),
            symbols,
            extractor,
            self.add_intercept,
        )
    }
}

impl Default for Trainer {
    fn default() -> Self {
        Self::new()
    }
}
