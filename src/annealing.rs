//! Learning rate schedules.

use crate::errors::{CrfError, Result};

/// Maps a training epoch to a learning rate.
pub trait AnnealingSchedule {
    /// Returns the learning rate of `epoch`, counted from 0.
    fn learning_rate(&self, epoch: usize) -> f64;

    /// Receives the error reached after `epoch`, which is the negated penalized
    /// log-likelihood (base 2) of the corpus.
    ///
    /// Returning `false` rejects the epoch, and the trainer restores the
    /// weights it started the epoch with.
    fn received_error(&mut self, _epoch: usize, _learning_rate: f64, _error: f64) -> bool {
        true
    }
}

/// Built-in learning rate decays.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Annealing {
    /// Same rate on every epoch.
    Constant(f64),

    /// `initial / (1 + epoch / quotient)`.
    Inverse {
        /// Rate of epoch 0.
        initial: f64,
        /// Number of epochs after which the rate is halved.
        quotient: f64,
    },

    /// `initial * base^epoch`.
    Exponential {
        /// Rate of epoch 0.
        initial: f64,
        /// Decay per epoch.
        base: f64,
    },
}

fn check_rate(initial: f64) -> Result<()> {
    if initial > 0.0 && initial.is_finite() {
        Ok(())
    } else {
        Err(CrfError::invalid_argument(format!(
            "learning rate must be positive and finite, but got {initial}"
        )))
    }
}

impl Annealing {
    /// Creates a constant schedule.
    ///
    /// # Errors
    ///
    /// `rate` must be positive and finite.
    pub fn constant(rate: f64) -> Result<Self> {
        check_rate(rate)?;
        Ok(Self::Constant(rate))
    }

    /// Creates an inverse decay schedule.
    ///
    /// # Errors
    ///
    /// `initial` and `quotient` must be positive and finite.
    pub fn inverse(initial: f64, quotient: f64) -> Result<Self> {
        check_rate(initial)?;
        if !(quotient > 0.0 && quotient.is_finite()) {
            return Err(CrfError::invalid_argument(format!(
                "quotient must be positive and finite, but got {quotient}"
            )));
        }
        Ok(Self::Inverse { initial, quotient })
    }

    /// Creates an exponential decay schedule.
    ///
    /// # Errors
    ///
    /// `initial` must be positive and finite, and `base` must be in `(0, 1]`.
    pub fn exponential(initial: f64, base: f64) -> Result<Self> {
        check_rate(initial)?;
        if !(base > 0.0 && base <= 1.0) {
            return Err(CrfError::invalid_argument(format!(
                "base must be in (0, 1], but got {base}"
            )));
        }
        Ok(Self::Exponential { initial, base })
    }
}

impl Default for Annealing {
    fn default() -> Self {
        Self::Inverse {
            initial: 0.05,
            quotient: 100.0,
        }
    }
}

impl AnnealingSchedule for Annealing {
    fn learning_rate(&self, epoch: usize) -> f64 {
        match *self {
            Self::Constant(rate) => rate,
            Self::Inverse { initial, quotient } => initial / (1.0 + epoch as f64 / quotient),
            Self::Exponential { initial, base } => initial * base.powf(epoch as f64),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_learning_rates() {
        let schedule = Annealing::constant(0.1).unwrap();
        assert_eq!(0.1, schedule.learning_rate(0));
        assert_eq!(0.1, schedule.learning_rate(50));

        let schedule = Annealing::inverse(0.05, 100.0).unwrap();
        assert_eq!(0.05, schedule.learning_rate(0));
        assert!((0.025 - schedule.learning_rate(100)).abs() < 1e-15);

        let schedule = Annealing::exponential(0.2, 0.5).unwrap();
        assert_eq!(0.2, schedule.learning_rate(0));
        assert!((0.025 - schedule.learning_rate(3)).abs() < 1e-15);
    }

    #[test]
    fn test_default_accepts() {
        let mut schedule = Annealing::default();
        assert_eq!(Annealing::inverse(0.05, 100.0).unwrap(), schedule);
        assert!(schedule.received_error(0, 0.05, -10.0));
    }

    #[test]
    fn test_invalid() {
        assert!(Annealing::constant(0.0).is_err());
        assert!(Annealing::inverse(0.1, 0.0).is_err());
        assert!(Annealing::exponential(0.1, 1.5).is_err());
        assert!(Annealing::exponential(f64::NAN, 0.5).is_err());
    }
}
