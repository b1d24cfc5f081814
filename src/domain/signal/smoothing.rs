//! Rolling and exponentially weighted series helpers.
//!
//! `None` marks a value that is not yet defined (warm-up) or undefined (0/0).

/// Mean of the trailing `period` values; `None` until the window is full or
/// while any value in it is `None`.
pub fn rolling_mean(values: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    rolling_sum(values, period)
        .into_iter()
        .map(|sum| sum.map(|s| s / period as f64))
        .collect()
}

/// Sum of the trailing `period` values; same validity rule as [`rolling_mean`].
pub fn rolling_sum(values: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    if period == 0 {
        return vec![None; values.len()];
    }
    (0..values.len())
        .map(|i| {
            if i + 1 < period {
                return None;
            }
            values[i + 1 - period..=i].iter().copied().sum::<Option<f64>>()
        })
        .collect()
}

/// Recursive EWM: `y[t] = alpha × x[t] + (1 − alpha) × y[t−1]`, seeded with the
/// first defined value.
///
/// An undefined input carries the previous output, but still ages it: after `k`
/// skipped values the next observation is blended as
/// `((1−alpha)^(k+1) × y + alpha × x) / ((1−alpha)^(k+1) + alpha)`.
pub fn ewm_recursive(values: &[Option<f64>], alpha: f64) -> Vec<Option<f64>> {
    let decay = 1.0 - alpha;
    let mut out = Vec::with_capacity(values.len());
    let mut state: Option<f64> = None;
    let mut old_weight = 1.0;
    for value in values {
        match (state, value) {
            (None, Some(x)) => {
                state = Some(*x);
                old_weight = 1.0;
            }
            (Some(prev), Some(x)) => {
                old_weight *= decay;
                state = Some((old_weight * prev + alpha * x) / (old_weight + alpha));
                old_weight = 1.0;
            }
            (Some(_), None) => old_weight *= decay,
            (None, None) => {}
        }
        out.push(state);
    }
    out
}

/// Weight-normalised EWM: `y[t] = Σ (1−alpha)^i x[t−i] / Σ (1−alpha)^i`, where
/// `i` counts bars, so undefined inputs still age older observations.
pub fn ewm_adjusted(values: &[Option<f64>], alpha: f64) -> Vec<Option<f64>> {
    let decay = 1.0 - alpha;
    let mut numerator = 0.0;
    let mut denominator = 0.0;
    let mut out = Vec::with_capacity(values.len());
    for value in values {
        numerator *= decay;
        denominator *= decay;
        if let Some(x) = value {
            numerator += x;
            denominator += 1.0;
        }
        out.push(if denominator > 0.0 {
            Some(numerator / denominator)
        } else {
            None
        });
    }
    out
}

/// Alpha for a centre-of-mass parameterisation: `1 / (1 + com)`.
pub fn alpha_from_com(com: f64) -> f64 {
    1.0 / (1.0 + com)
}
