//! Exact rational timestep.
//!
//! The simulation timestep is kept as a reduced rational so that the
//! simulation time `iteration * dt` can be computed without accumulating
//! floating point drift, and so that output cadences can be checked for
//! exact divisibility. Conversion to `f64` happens only at the point where
//! a scalar is actually needed (integration, display, file output).

use std::fmt;
use std::str::FromStr;

use crate::error::SimError;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A positive rational timestep, stored in lowest terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Timestep {
    num: u64,
    den: u64,
}

impl Timestep {
    /// Create a timestep from a numerator and denominator.
    ///
    /// # Errors
    ///
    /// Returns an error if either part is zero.
    pub fn new(num: u64, den: u64) -> Result<Self, SimError> {
        if num == 0 || den == 0 {
            return Err(SimError::InvalidTimestep(format!("{num}/{den}")));
        }
        let g = gcd(num, den);
        Ok(Self {
            num: num / g,
            den: den / g,
        })
    }

    /// The timestep as a scalar.
    #[must_use]
    pub fn scalar(&self) -> f64 {
        self.num as f64 / self.den as f64
    }

    /// The simulation time after `iteration` steps.
    ///
    /// The product is formed in integer arithmetic before the single
    /// conversion to `f64`.
    #[must_use]
    pub fn times(&self, iteration: u64) -> f64 {
        (u128::from(iteration) * u128::from(self.num)) as f64 / self.den as f64
    }

    /// Number of timesteps between outputs at the given frequency, if the
    /// cadence divides the timestep exactly.
    ///
    /// The divisor is `1 / (dt * hz) = den / (num * hz)`; `None` when that
    /// is not an integer.
    #[must_use]
    pub fn steps_per_output(&self, hz: u64) -> Option<u64> {
        if hz == 0 {
            return None;
        }
        let divisor = self.num.checked_mul(hz)?;
        if divisor == 0 || self.den % divisor != 0 {
            return None;
        }
        Some(self.den / divisor)
    }

    /// Numerator in lowest terms.
    #[must_use]
    pub const fn numerator(&self) -> u64 {
        self.num
    }

    /// Denominator in lowest terms.
    #[must_use]
    pub const fn denominator(&self) -> u64 {
        self.den
    }
}

impl fmt::Display for Timestep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.den == 1 {
            write!(f, "{}", self.num)
        } else {
            write!(f, "{}/{}", self.num, self.den)
        }
    }
}

impl FromStr for Timestep {
    type Err = SimError;

    /// Parse `"1/60"`, `"0.01"`, or `"2"` into an exact rational.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = || SimError::InvalidTimestep(s.to_string());

        if let Some((num_str, den_str)) = s.split_once('/') {
            let num: u64 = num_str.trim().parse().map_err(|_| invalid())?;
            let den: u64 = den_str.trim().parse().map_err(|_| invalid())?;
            return Self::new(num, den).map_err(|_| invalid());
        }

        if let Some((int_str, frac_str)) = s.split_once('.') {
            if frac_str.len() > 18 || frac_str.is_empty() {
                return Err(invalid());
            }
            let int_part: u64 = if int_str.is_empty() {
                0
            } else {
                int_str.parse().map_err(|_| invalid())?
            };
            let frac_part: u64 = frac_str.parse().map_err(|_| invalid())?;
            let den = 10u64
                .checked_pow(frac_str.len() as u32)
                .ok_or_else(invalid)?;
            let num = int_part
                .checked_mul(den)
                .and_then(|n| n.checked_add(frac_part))
                .ok_or_else(invalid)?;
            return Self::new(num, den).map_err(|_| invalid());
        }

        let num: u64 = s.parse().map_err(|_| invalid())?;
        Self::new(num, 1).map_err(|_| invalid())
    }
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_parse_fraction() {
        let dt: Timestep = "1/60".parse().unwrap();
        assert_eq!(dt.numerator(), 1);
        assert_eq!(dt.denominator(), 60);
        assert_relative_eq!(dt.scalar(), 1.0 / 60.0);
    }

    #[test]
    fn test_parse_decimal_reduces() {
        let dt: Timestep = "0.002".parse().unwrap();
        assert_eq!(dt.numerator(), 1);
        assert_eq!(dt.denominator(), 500);
    }

    #[test]
    fn test_parse_integer() {
        let dt: Timestep = "2".parse().unwrap();
        assert_eq!(dt.numerator(), 2);
        assert_eq!(dt.denominator(), 1);
        assert_eq!(dt.to_string(), "2");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("abc".parse::<Timestep>().is_err());
        assert!("0/60".parse::<Timestep>().is_err());
        assert!("1/0".parse::<Timestep>().is_err());
        assert!("-1/60".parse::<Timestep>().is_err());
        assert!("".parse::<Timestep>().is_err());
    }

    #[test]
    fn test_times_is_exact_at_integer_multiples() {
        let dt: Timestep = "1/60".parse().unwrap();
        // 60 steps of 1/60 is exactly one second
        assert_eq!(dt.times(60), 1.0);
        assert_eq!(dt.times(0), 0.0);
    }

    #[test]
    fn test_steps_per_output() {
        let dt: Timestep = "1/60".parse().unwrap();
        assert_eq!(dt.steps_per_output(60), Some(1));
        assert_eq!(dt.steps_per_output(30), Some(2));
        assert_eq!(dt.steps_per_output(10), Some(6));
        // 60 Hz steps cannot be saved at 7 Hz on an integer cadence
        assert_eq!(dt.steps_per_output(7), None);
        assert_eq!(dt.steps_per_output(0), None);
    }

    #[test]
    fn test_display_round_trips() {
        let dt: Timestep = "2/120".parse().unwrap();
        assert_eq!(dt.to_string(), "1/60");
        let back: Timestep = dt.to_string().parse().unwrap();
        assert_eq!(back, dt);
    }
}
