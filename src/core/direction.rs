//! Edge direction selection and local noise estimation
//!
//! The 3x3 statistics are sampled at the nine `SAMPLE_OFFSETS` of a 7x7
//! neighbourhood (indices 0..8, row-major). Four gradients across the centre
//! sample pick the dominant edge axis; the second difference along that axis
//! picks one of the two directions on it.

use crate::core::kernels::{Orientation, SAMPLE_OFFSETS};
use crate::core::neighborhood::NeighborhoodStats;
use crate::types::{SarReal, SarRealImage};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Label for pixels whose samples are incomplete
pub const NO_DIRECTION: u8 = 0;

/// Number of lowest variance ratios averaged into the noise estimate
pub const NOISE_SAMPLES: usize = 5;

/// Gradient order used by `TieBreak::PreferAxisAligned`
const AXIS_PRIORITY: [usize; 4] = [0, 2, 1, 3];

/// How to label a pixel when several gradients share the maximum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// Sum the labels of every tied gradient. A sum in 1..=8 selects that window,
    /// larger sums leave the pixel without a direction.
    #[default]
    SumLabels,
    /// Keep only the first tied gradient in the order vertical, horizontal,
    /// anti-diagonal, diagonal.
    PreferAxisAligned,
}

/// Per-pixel direction labels and noise variance ratios
#[derive(Debug, Clone)]
pub struct DirectionField {
    /// 1..=8 selects an `Orientation`; 0 or > 8 means no usable direction
    pub labels: Array2<u8>,
    /// Mean of the lowest variance/mean² ratios; NaN when none is defined
    pub sigma_v: SarRealImage,
}

impl DirectionField {
    pub fn orientation(&self, row: usize, col: usize) -> Option<Orientation> {
        Orientation::from_label(self.labels[[row, col]])
    }

    /// Pixel count per label value (index = label)
    pub fn label_histogram(&self) -> [usize; 27] {
        let mut histogram = [0usize; 27];
        for &label in self.labels.iter() {
            histogram[(label as usize).min(26)] += 1;
        }
        histogram
    }
}

/// |m1 - m7|, |m6 - m2|, |m3 - m5|, |m0 - m8|
pub fn gradient_magnitudes(means: &[f64; 9]) -> [f64; 4] {
    [
        (means[1] - means[7]).abs(),
        (means[6] - means[2]).abs(),
        (means[3] - means[5]).abs(),
        (means[0] - means[8]).abs(),
    ]
}

/// Direction on the axis of gradient `k` (0..4): label k+1 when the second
/// difference across the centre is positive, k+5 otherwise.
fn axis_label(means: &[f64; 9], k: usize) -> u8 {
    let (before, after) = match k {
        0 => (means[1], means[7]),
        1 => (means[6], means[2]),
        2 => (means[3], means[5]),
        _ => (means[0], means[8]),
    };
    let centre = means[4];
    if before - centre > centre - after {
        k as u8 + 1
    } else {
        k as u8 + 5
    }
}

/// Direction label from the nine sampled 3x3 means
pub fn direction_label(means: &[f64; 9], tie_break: TieBreak) -> u8 {
    let gradients = gradient_magnitudes(means);
    let max_gradient = gradients.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let active = |k: usize| gradients[k] == max_gradient;

    match tie_break {
        TieBreak::SumLabels => (0..4)
            .filter(|&k| active(k))
            .map(|k| axis_label(means, k))
            .sum(),
        TieBreak::PreferAxisAligned => AXIS_PRIORITY
            .iter()
            .find(|&&k| active(k))
            .map(|&k| axis_label(means, k))
            .unwrap_or(NO_DIRECTION),
    }
}

/// Mean of the `NOISE_SAMPLES` smallest finite variance/mean² ratios.
///
/// Fewer finite ratios are averaged as they are; `None` when there are none.
pub fn noise_variance_ratio(means: &[f64; 9], variances: &[f64; 9]) -> Option<f64> {
    let mut ratios: Vec<f64> = means
        .iter()
        .zip(variances.iter())
        .map(|(&m, &v)| v / (m * m))
        .filter(|r| r.is_finite())
        .collect();
    if ratios.is_empty() {
        return None;
    }
    ratios.sort_by(f64::total_cmp);
    let n = ratios.len().min(NOISE_SAMPLES);
    Some(ratios[..n].iter().sum::<f64>() / n as f64)
}

/// Gather the nine sampled statistics around (row, col).
/// Sample centres outside the grid are clamped to the nearest edge pixel.
pub fn sample_stack(stats: &NeighborhoodStats, row: usize, col: usize) -> ([f64; 9], [f64; 9]) {
    let (height, width) = stats.dim();
    let mut means = [0.0; 9];
    let mut variances = [0.0; 9];
    for (k, &(dr, dc)) in SAMPLE_OFFSETS.iter().enumerate() {
        let r = (row as isize + dr).clamp(0, height as isize - 1) as usize;
        let c = (col as isize + dc).clamp(0, width as isize - 1) as usize;
        let (m, v) = stats.at(r, c);
        means[k] = m;
        variances[k] = v;
    }
    (means, variances)
}

/// Direction labels and noise ratios for every pixel from 3x3 statistics
pub fn select_directions(stats3: &NeighborhoodStats, tie_break: TieBreak) -> DirectionField {
    let (height, width) = stats3.dim();
    let mut labels = Array2::from_elem((height, width), NO_DIRECTION);
    let mut sigma_v = Array2::from_elem((height, width), SarReal::NAN);

    for i in 0..height {
        for j in 0..width {
            let (means, variances) = sample_stack(stats3, i, j);

            if means.iter().all(|m| m.is_finite()) {
                labels[[i, j]] = direction_label(&means, tie_break);
            }
            if let Some(ratio) = noise_variance_ratio(&means, &variances) {
                sigma_v[[i, j]] = ratio as SarReal;
            }
        }
    }

    DirectionField { labels, sigma_v }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Sample means for a pixel just left of a vertical step (low left, high right)
    fn vertical_step_means(low: f64, high: f64) -> [f64; 9] {
        let mixed = (2.0 * low + high) / 3.0;
        [low, mixed, high, low, mixed, high, low, mixed, high]
    }

    #[test]
    fn test_gradients() {
        let means = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 10.0];
        assert_eq!(gradient_magnitudes(&means), [6.0, 4.0, 2.0, 9.0]);
    }

    #[test]
    fn test_single_maximum_picks_its_axis() {
        // Only the top/bottom gradient is non-zero; top sample is low
        let means = [1.0, 0.5, 1.0, 1.0, 1.0, 1.0, 1.0, 2.0, 1.0];
        // (0.5 - 1) > (1 - 2) -> label 1
        assert_eq!(direction_label(&means, TieBreak::SumLabels), 1);
        assert_eq!(direction_label(&means, TieBreak::PreferAxisAligned), 1);

        // (1.5 - 1) > (1 - 0) is false -> label 5
        let concave = [1.0, 1.5, 1.0, 1.0, 1.0, 1.0, 1.0, 0.0, 1.0];
        assert_eq!(direction_label(&concave, TieBreak::SumLabels), 5);
    }

    #[test]
    fn test_vertical_step_tie_sums_labels() {
        // g1, g2 and g3 tie; each resolves to its first label: 2 + 3 + 4
        let means = vertical_step_means(0.1, 1.0);
        assert_eq!(direction_label(&means, TieBreak::SumLabels), 9);
        assert_eq!(Orientation::from_label(9), None);
    }

    #[test]
    fn test_vertical_step_axis_aligned_resolution() {
        let means = vertical_step_means(0.1, 1.0);
        assert_eq!(direction_label(&means, TieBreak::PreferAxisAligned), 3);

        // Mirror image: high on the left
        let mirrored = vertical_step_means(1.0, 0.1);
        assert_eq!(direction_label(&mirrored, TieBreak::PreferAxisAligned), 7);
    }

    #[test]
    fn test_flat_neighbourhood_is_four_way_tie() {
        let means = [0.3; 9];
        // All gradients zero, every comparison false: 5 + 6 + 7 + 8
        assert_eq!(direction_label(&means, TieBreak::SumLabels), 26);
        assert_eq!(direction_label(&means, TieBreak::PreferAxisAligned), 5);
    }

    #[test]
    fn test_two_way_tie_can_alias_a_label() {
        // g0 and g2 tie at 1.0, both with positive second difference: 1 + 3 = 4
        let means = [0.0, 0.0, 0.0, 0.0, 0.2, 1.0, 0.0, 1.0, 0.0];
        let gradients = gradient_magnitudes(&means);
        assert_eq!(gradients[0], gradients[2]);
        assert_eq!(direction_label(&means, TieBreak::SumLabels), 4);
    }

    #[test]
    fn test_noise_ratio_uses_five_smallest() {
        let means = [1.0; 9];
        let variances = [0.9, 0.1, 0.8, 0.2, 0.7, 0.3, 0.6, 0.4, 0.5];
        let ratio = noise_variance_ratio(&means, &variances).unwrap();
        assert_relative_eq!(ratio, 0.3, epsilon = 1e-12);
    }

    #[test]
    fn test_noise_ratio_with_ties_and_gaps() {
        let means = [2.0, 2.0, 0.0, 2.0, 2.0, 2.0, f64::NAN, 2.0, 2.0];
        let variances = [0.4, 0.4, 1.0, 0.4, 0.8, 0.8, 0.1, 4.0, 4.0];
        // finite ratios: 0.1 x3, 0.2 x2, 1.0 x2 -> smallest five average to 0.14
        let ratio = noise_variance_ratio(&means, &variances).unwrap();
        assert_relative_eq!(ratio, 0.14, epsilon = 1e-12);

        assert_eq!(noise_variance_ratio(&[0.0; 9], &[0.0; 9]), None);
    }

    #[test]
    fn test_sample_stack_clamps_at_borders() {
        let mean = Array2::from_shape_fn((5, 5), |(i, j)| (i * 5 + j) as f32);
        let stats = NeighborhoodStats {
            variance: Array2::zeros((5, 5)),
            mean,
        };
        let (means, _) = sample_stack(&stats, 0, 0);
        assert_eq!(means, [0.0, 0.0, 2.0, 0.0, 0.0, 2.0, 10.0, 10.0, 12.0]);
    }
}
