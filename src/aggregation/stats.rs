//! Descriptive statistics over the present values of a column.
//!
//! Thin wrappers around `statrs` that return `None` instead of NaN when a
//! statistic is undefined for the sample size.

use statrs::statistics::{Data, Median, Statistics};

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().mean()).filter(|m| m.is_finite())
}

/// Sample standard deviation (n-1 denominator). Undefined below two values.
pub fn sample_std_dev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    Some(values.iter().std_dev()).filter(|s| s.is_finite())
}

pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(Data::new(values.to_vec()).median()).filter(|m| m.is_finite())
}

pub fn min(values: &[f64]) -> Option<f64> {
    values.iter().copied().reduce(f64::min)
}

pub fn max(values: &[f64]) -> Option<f64> {
    values.iter().copied().reduce(f64::max)
}

/// `part / whole`, 0 when the whole is empty.
pub fn rate(part: u32, whole: u32) -> f64 {
    if whole == 0 {
        0.0
    } else {
        f64::from(part) / f64::from(whole)
    }
}
