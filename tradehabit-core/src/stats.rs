//! Population statistics shared by the detectors.
//!
//! Pure functions over `&[f64]`. Empty input yields 0.0 rather than NaN so
//! every detector has a well-defined zero-population response.

use serde::{Deserialize, Serialize};

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation (divides by n, not n - 1).
pub fn pstdev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Median; even-length input averages the two middle values.
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Median absolute deviation from the median.
pub fn mad(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let med = median(values);
    let deviations: Vec<f64> = values.iter().map(|v| (v - med).abs()).collect();
    median(&deviations)
}

/// Population std-dev over mean. 0.0 when the mean is zero.
pub fn coefficient_of_variation(values: &[f64]) -> f64 {
    let m = mean(values);
    if m == 0.0 {
        return 0.0;
    }
    pstdev(values) / m
}

/// Round half away from zero to `decimals` places.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Summary of one population, as reported by the threshold detectors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PopulationStats {
    pub count: usize,
    pub mean: f64,
    pub std_dev: f64,
    pub median: f64,
    pub mad: f64,
    /// MAD / median; 0.0 when the median is zero.
    pub mad_cv: f64,
}

impl PopulationStats {
    pub fn compute(values: &[f64]) -> Self {
        let med = median(values);
        let mad = mad(values);
        Self {
            count: values.len(),
            mean: mean(values),
            std_dev: pstdev(values),
            median: med,
            mad,
            mad_cv: if med == 0.0 { 0.0 } else { mad / med },
        }
    }

    /// `mean + sigma × std_dev`.
    pub fn threshold(&self, sigma: f64) -> f64 {
        self.mean + sigma * self.std_dev
    }
}
