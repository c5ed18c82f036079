//! Height-banded texture weights.

use quadsphere_config::TEXTURE_SLOTS;

/// Per-vertex blend weights, one per texture slot.
pub type TextureWeights = [f32; TEXTURE_SLOTS];

/// Blend weights for normalized height `t`.
///
/// `heights` are ascending band boundaries and `ids` the texture slot of
/// each boundary. Between two boundaries with different ids the weight is
/// split linearly; otherwise the single slot gets full weight.
#[must_use]
pub fn evaluate_texture(t: f32, heights: &[f32], ids: &[u8]) -> TextureWeights {
    let mut weights = [0.0; TEXTURE_SLOTS];
    let len = heights.len().min(ids.len());
    if len == 0 {
        weights[0] = 1.0;
        return weights;
    }

    let t = t.clamp(0.0, 1.0);
    let index = heights[..len].iter().position(|h| t < *h).unwrap_or(len);
    let i1 = index.saturating_sub(1).min(len - 1);
    let i2 = index.min(len - 1);
    let (id1, id2) = (slot(ids[i1]), slot(ids[i2]));

    let span = heights[i2] - heights[i1];
    if id1 == id2 || span <= 0.0 {
        weights[id1] = 1.0;
        return weights;
    }

    let f = (t - heights[i1]) / span;
    weights[id1] = 1.0 - f;
    weights[id2] = f;
    weights
}

/// Full weight on `slope_texture` for a vertex steeper than the slope angle.
#[must_use]
pub fn slope_override(weights: TextureWeights, slope_texture: u8, steep: bool) -> TextureWeights {
    if !steep {
        return weights;
    }
    let mut out = [0.0; TEXTURE_SLOTS];
    out[slot(slope_texture)] = 1.0;
    out
}

fn slot(id: u8) -> usize {
    usize::from(id).min(TEXTURE_SLOTS - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-5;
    const HEIGHTS: [f32; 5] = [0.0, 0.01, 0.4, 0.8, 1.0];
    const IDS: [u8; 5] = [0, 1, 2, 3, 4];

    #[test]
    fn test_blend_between_first_bands() {
        let w = evaluate_texture(0.015, &HEIGHTS, &IDS);
        // 0.015 sits between 0.01 (slot 1) and 0.4 (slot 2).
        let f = (0.015 - 0.01) / (0.4 - 0.01);
        assert!((w[1] - (1.0 - f)).abs() < EPSILON, "slot 1 weight {}", w[1]);
        assert!((w[2] - f).abs() < EPSILON, "slot 2 weight {}", w[2]);
        assert_eq!(w[0] + w[3] + w[4] + w[5], 0.0);
    }

    #[test]
    fn test_weights_sum_to_one() {
        for i in 0..=100 {
            let t = i as f32 / 100.0;
            let w = evaluate_texture(t, &HEIGHTS, &IDS);
            let sum: f32 = w.iter().sum();
            assert!((sum - 1.0).abs() < EPSILON, "weights at {t} sum to {sum}");
        }
    }

    #[test]
    fn test_top_of_range_is_one_hot() {
        let w = evaluate_texture(1.0, &HEIGHTS, &IDS);
        assert_eq!(w, [0.0, 0.0, 0.0, 0.0, 1.0, 0.0]);
        let w = evaluate_texture(7.0, &HEIGHTS, &IDS);
        assert_eq!(w[4], 1.0, "out-of-range heights clamp to the top band");
    }

    #[test]
    fn test_equal_ids_are_one_hot() {
        let w = evaluate_texture(0.5, &[0.0, 0.3, 0.9], &[2, 2, 2]);
        assert_eq!(w[2], 1.0);
    }

    #[test]
    fn test_slope_override() {
        let w = evaluate_texture(0.015, &HEIGHTS, &IDS);
        assert_eq!(slope_override(w, 5, false), w);
        assert_eq!(slope_override(w, 5, true), [0.0, 0.0, 0.0, 0.0, 0.0, 1.0]);
    }
}
