use crate::priv_prelude::*;

/// A source of randomized delays which are applied to data before it's forwarded.
///
/// Every variant has fixed parameters. Sampling draws from the calling thread's RNG, so a single
/// `Distribution` can be shared (eg. behind an `Arc`) between relays running on different threads
/// and each call is an independent draw.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Distribution {
    /// Always produces the same delay.
    Constant {
        /// The delay, in seconds.
        value: f64,
    },
    /// Normally-distributed delays.
    Gaussian {
        /// Mean delay, in seconds.
        mean: f64,
        /// Standard deviation, in seconds.
        std_dev: f64,
        /// Clamp negative draws to zero.
        strictly_positive: bool,
    },
    /// Exponentially-distributed delays.
    Exponential {
        /// Mean delay, in seconds.
        scale: f64,
    },
}

impl Distribution {
    /// A distribution which always produces a delay of `value` seconds.
    pub fn constant(value: f64) -> Distribution {
        Distribution::Constant { value }
    }

    /// A normal distribution with the given mean and standard deviation whose negative draws are
    /// clamped to zero. Use [`Distribution::Gaussian`] directly to allow negative samples.
    pub fn gaussian(mean: f64, std_dev: f64) -> Distribution {
        Distribution::Gaussian {
            mean,
            std_dev,
            strictly_positive: true,
        }
    }

    /// An exponential distribution with mean `scale`.
    pub fn exponential(scale: f64) -> Distribution {
        Distribution::Exponential { scale }
    }

    /// Draws a delay, in seconds.
    ///
    /// The parameters aren't validated. A `Gaussian` with `strictly_positive` unset or an
    /// `Exponential` with a negative `scale` can produce negative delays.
    pub fn sample(&self) -> f64 {
        match *self {
            Distribution::Constant { value } => value,
            Distribution::Gaussian { mean, std_dev, strictly_positive } => {
                let z: f64 = rand::thread_rng().sample(StandardNormal);
                let value = mean + std_dev * z;
                if strictly_positive {
                    value.max(0.0)
                } else {
                    value
                }
            },
            Distribution::Exponential { scale } => {
                let e: f64 = rand::thread_rng().sample(Exp1);
                scale * e
            },
        }
    }

    /// Draws a delay as a `Duration`. Negative samples produce a zero delay.
    pub fn sample_duration(&self) -> Duration {
        util::delay_from_secs(self.sample())
    }

    /// The name this distribution is registered under. See [`crate::registry`].
    pub fn name(&self) -> &'static str {
        match self {
            Distribution::Constant { .. } => "CONSTANT",
            Distribution::Gaussian { .. } => "GAUSSIAN",
            Distribution::Exponential { .. } => "EXPONENTIAL",
        }
    }
}

impl fmt::Display for Distribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Distribution::Constant { value } => write!(f, "constant({}s)", value),
            Distribution::Gaussian { mean, std_dev, strictly_positive } => {
                write!(f, "gaussian(mean = {}s, std_dev = {}s", mean, std_dev)?;
                if *strictly_positive {
                    write!(f, ", strictly positive")?;
                }
                write!(f, ")")
            },
            Distribution::Exponential { scale } => write!(f, "exponential(scale = {}s)", scale),
        }
    }
}
