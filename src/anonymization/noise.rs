//! Laplace mechanism for differential privacy
//!
//! Implements the standard Laplace mechanism via inverse-CDF sampling:
//! for u drawn uniformly from (-1/2, 1/2),
//!
//! ```text
//! noise = -(sensitivity / epsilon) * sgn(u) * ln(1 - 2|u|)
//! ```
//!
//! which is Laplace-distributed with scale `sensitivity / epsilon` and
//! satisfies epsilon-differential privacy for queries of the given
//! sensitivity.

use rand::Rng;

/// Laplace noise source for numeric fields
#[derive(Debug, Clone, Copy)]
pub struct LaplaceNoise {
    scale: f64,
}

impl LaplaceNoise {
    /// Build a noise source for the given privacy budget and sensitivity
    ///
    /// Non-positive epsilon disables noise rather than dividing by zero;
    /// the config validator rejects that case before it gets here.
    pub fn new(epsilon: f64, sensitivity: f64) -> Self {
        let scale = if epsilon > 0.0 {
            sensitivity / epsilon
        } else {
            0.0
        };
        Self { scale }
    }

    /// Draw one noise sample
    pub fn sample<R: Rng>(&self, rng: &mut R) -> f64 {
        if self.scale == 0.0 {
            return 0.0;
        }
        // u in (-0.5, 0.5); the open interval keeps ln(1 - 2|u|) finite
        let mut u: f64 = rng.gen_range(-0.5..0.5);
        if 1.0 - 2.0 * u.abs() <= f64::EPSILON {
            u = 0.0;
        }
        -self.scale * u.signum() * (1.0 - 2.0 * u.abs()).ln()
    }

    /// Add noise to a non-negative value, clamping the result at zero
    pub fn apply<R: Rng>(&self, value: f64, rng: &mut R) -> f64 {
        (value + self.sample(rng)).max(0.0)
    }
}
