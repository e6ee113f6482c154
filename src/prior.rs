//! Regularization priors over weight vectors.

use core::f64::consts::{LN_2, PI};

use crate::errors::{CrfError, Result};
use crate::vector::Vector;

/// A prior distribution over the coefficients of a weight vector.
///
/// The trainer moves each coefficient against [`RegressionPrior::gradient`]
/// but never past [`RegressionPrior::mode`].
pub trait RegressionPrior {
    /// Returns the gradient of the negative log density at `beta` for `dimension`.
    fn gradient(&self, beta: f64, dimension: usize) -> f64;

    /// Returns the mode of the prior for `dimension`.
    fn mode(&self, _dimension: usize) -> f64 {
        0.0
    }

    /// Returns the log (base 2) density at `beta` for `dimension`.
    fn log2_prior_at(&self, beta: f64, dimension: usize) -> f64;

    /// Returns the log (base 2) density of all coefficients of `weights`.
    fn log2_prior(&self, weights: &Vector) -> f64 {
        (0..weights.num_dimensions())
            .map(|d| self.log2_prior_at(weights.value_unchecked(d), d))
            .sum()
    }

    /// Returns `true` if the prior is uniform and has no effect on training.
    fn is_uniform(&self) -> bool {
        false
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Kind {
    Noninformative,
    Gaussian,
    Laplace,
    Cauchy,
}

/// Built-in priors.
///
/// Gaussian and Laplace priors are parametrised by their variance, and the
/// Cauchy prior by its squared scale. Any prior can leave the intercept
/// dimension 0 uninformative.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Prior {
    kind: Kind,
    variance: f64,
    noninformative_intercept: bool,
}

impl Prior {
    /// Creates a uniform prior.
    pub const fn noninformative() -> Self {
        Self {
            kind: Kind::Noninformative,
            variance: f64::INFINITY,
            noninformative_intercept: true,
        }
    }

    fn with_variance(kind: Kind, variance: f64, noninformative_intercept: bool) -> Result<Self> {
        if !(variance > 0.0 && variance.is_finite()) {
            return Err(CrfError::invalid_argument(format!(
                "variance must be positive and finite, but got {variance}"
            )));
        }
        Ok(Self {
            kind,
            variance,
            noninformative_intercept,
        })
    }

    /// Creates a zero-mean Gaussian (L2) prior.
    ///
    /// # Errors
    ///
    /// `variance` must be positive and finite.
    pub fn gaussian(variance: f64, noninformative_intercept: bool) -> Result<Self> {
        Self::with_variance(Kind::Gaussian, variance, noninformative_intercept)
    }

    /// Creates a zero-mean Laplace (L1) prior.
    ///
    /// # Errors
    ///
    /// `variance` must be positive and finite.
    pub fn laplace(variance: f64, noninformative_intercept: bool) -> Result<Self> {
        Self::with_variance(Kind::Laplace, variance, noninformative_intercept)
    }

    /// Creates a zero-centred Cauchy prior with the given squared scale.
    ///
    /// # Errors
    ///
    /// `scale_squared` must be positive and finite.
    pub fn cauchy(scale_squared: f64, noninformative_intercept: bool) -> Result<Self> {
        Self::with_variance(Kind::Cauchy, scale_squared, noninformative_intercept)
    }

    #[inline(always)]
    fn is_uninformative_at(&self, dimension: usize) -> bool {
        self.kind == Kind::Noninformative || (dimension == 0 && self.noninformative_intercept)
    }
}

impl Default for Prior {
    fn default() -> Self {
        Self::noninformative()
    }
}

impl RegressionPrior for Prior {
    fn gradient(&self, beta: f64, dimension: usize) -> f64 {
        if self.is_uninformative_at(dimension) {
            return 0.0;
        }
        match self.kind {
            Kind::Noninformative => 0.0,
            Kind::Gaussian => beta / self.variance,
            Kind::Laplace => {
                if beta == 0.0 {
                    0.0
                } else {
                    beta.signum() * (2.0 / self.variance).sqrt()
                }
            }
            Kind::Cauchy => 2.0 * beta / (beta * beta + self.variance),
        }
    }

    fn log2_prior_at(&self, beta: f64, dimension: usize) -> f64 {
        if self.is_uninformative_at(dimension) {
            return 0.0;
        }
        match self.kind {
            Kind::Noninformative => 0.0,
            Kind::Gaussian => {
                -0.5 * (2.0 * PI * self.variance).log2()
                    - beta * beta / (2.0 * self.variance * LN_2)
            }
            Kind::Laplace => {
                // scale b = sqrt(variance / 2)
                let b = (self.variance / 2.0).sqrt();
                -(2.0 * b).log2() - beta.abs() / (b * LN_2)
            }
            Kind::Cauchy => {
                self.variance.sqrt().log2() - PI.log2() - (beta * beta + self.variance).log2()
            }
        }
    }

    fn is_uniform(&self) -> bool {
        self.kind == Kind::Noninformative
    }
}
