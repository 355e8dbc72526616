//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod builders;

use lasecplot::Series;

/// Assert two floats are approximately equal
pub fn assert_float_eq(a: f64, b: f64, epsilon: f64) {
    assert!(
        (a - b).abs() < epsilon,
        "Expected {} to be approximately equal to {} (epsilon: {})",
        a,
        b,
        epsilon
    );
}

/// Time axis of a series as a Vec
pub fn times(series: &Series) -> Vec<f64> {
    series.time_axis().iter().copied().collect()
}

/// Numeric values of a number series
pub fn numbers(series: &Series) -> Vec<f64> {
    match series {
        Series::Number { values, .. } => values.iter().copied().collect(),
        other => panic!("expected a number series, got {:?}", other.kind()),
    }
}

/// Text values of a text series
pub fn texts(series: &Series) -> Vec<String> {
    match series {
        Series::Text { values, .. } => values.iter().cloned().collect(),
        other => panic!("expected a text series, got {:?}", other.kind()),
    }
}

/// (x, y) pairs of an xy series
pub fn xy_pairs(series: &Series) -> Vec<(f64, f64)> {
    match series {
        Series::Xy { xs, ys, .. } => xs.iter().copied().zip(ys.iter().copied()).collect(),
        other => panic!("expected an xy series, got {:?}", other.kind()),
    }
}
