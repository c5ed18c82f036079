//! Catmull-Rom interpolation and the keyed curve used by the `Curve` noise operator.

use serde::{Deserialize, Serialize};

/// Catmull-Rom interpolation between `n1` and `n2`, with `n0` and `n3` as the
/// outer control points and `a` in `[0, 1]`.
#[inline]
#[must_use]
pub fn cubic_interpolation(n0: f32, n1: f32, n2: f32, n3: f32, a: f32) -> f32 {
    n1 + 0.5
        * a
        * (n2 - n0 + a * (2.0 * n0 - 5.0 * n1 + 4.0 * n2 - n3 + a * (3.0 * (n1 - n2) + n3 - n0)))
}

/// A cubic-interpolated curve mapping `[-1, 1]` onto `[-1, 1]`.
///
/// Keys are stored on the `[0, 1]` scale. Evaluation rescales its input,
/// brackets it between two keys and interpolates with the neighboring keys
/// as control points (clamped at the ends).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FloatCurve {
    times: Vec<f32>,
    values: Vec<f32>,
}

impl Default for FloatCurve {
    fn default() -> Self {
        Self {
            times: vec![0.0, 0.25, 0.75, 1.0],
            values: vec![0.0, 0.0625, 0.5625, 1.0],
        }
    }
}

impl FloatCurve {
    /// A curve without keys. Evaluates to 0 until keys are added.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            times: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Insert a key, keeping times sorted.
    pub fn add_key(&mut self, time: f32, value: f32) {
        let index = self.times.partition_point(|t| *t <= time);
        self.times.insert(index, time);
        self.values.insert(index, value);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.times.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    #[must_use]
    pub fn evaluate(&self, t: f32) -> f32 {
        if self.times.is_empty() || self.times.len() != self.values.len() {
            return 0.0;
        }
        let time = (t + 1.0) * 0.5;
        let last = self.times.len() - 1;
        let index = self
            .times
            .iter()
            .position(|k| time < *k)
            .unwrap_or(self.times.len());

        let clamp = |i: isize| i.clamp(0, last as isize) as usize;
        let i = index as isize;
        let (i0, i1, i2, i3) = (clamp(i - 2), clamp(i - 1), clamp(i), clamp(i + 1));

        let value = if i1 == i2 {
            self.values[i1]
        } else {
            let alpha = (time - self.times[i1]) / (self.times[i2] - self.times[i1]);
            cubic_interpolation(
                self.values[i0],
                self.values[i1],
                self.values[i2],
                self.values[i3],
                alpha,
            )
        };
        value * 2.0 - 1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-5;

    #[test]
    fn test_cubic_interpolation_hits_endpoints() {
        assert!((cubic_interpolation(3.0, 1.0, 2.0, 7.0, 0.0) - 1.0).abs() < EPSILON);
        assert!((cubic_interpolation(3.0, 1.0, 2.0, 7.0, 1.0) - 2.0).abs() < EPSILON);
    }

    #[test]
    fn test_cubic_interpolation_is_linear_on_a_line() {
        let v = cubic_interpolation(0.0, 1.0, 2.0, 3.0, 0.25);
        assert!((v - 1.25).abs() < EPSILON, "got {v}");
    }

    #[test]
    fn test_default_curve_endpoints() {
        let curve = FloatCurve::default();
        assert!((curve.evaluate(-1.0) + 1.0).abs() < EPSILON);
        assert!((curve.evaluate(1.0) - 1.0).abs() < EPSILON);
    }

    #[test]
    fn test_default_curve_midpoint() {
        // Keys follow t², so the middle of the input range lands near -0.5.
        let v = FloatCurve::default().evaluate(0.0);
        assert!((v + 0.453125).abs() < EPSILON, "got {v}");
    }

    #[test]
    fn test_inputs_outside_range_clamp_to_end_keys() {
        let curve = FloatCurve::default();
        assert!((curve.evaluate(3.0) - 1.0).abs() < EPSILON);
        assert!((curve.evaluate(-3.0) + 1.0).abs() < EPSILON);
    }

    #[test]
    fn test_empty_curve_evaluates_to_zero() {
        assert_eq!(FloatCurve::empty().evaluate(0.3), 0.0);
    }

    #[test]
    fn test_add_key_keeps_order() {
        let mut curve = FloatCurve::empty();
        curve.add_key(1.0, 1.0);
        curve.add_key(0.0, 0.0);
        curve.add_key(0.5, 0.5);
        assert_eq!(curve.len(), 3);
        assert!((curve.evaluate(0.0) - 0.0).abs() < EPSILON);
    }
}
