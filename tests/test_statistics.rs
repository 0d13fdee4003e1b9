//! Integration test: statistical tests against hand-computed values

use ndarray::{array, Array2};
use stroke_analysis::stats::{
    confidence_interval, ChiSquareTest, ContingencyTable, CorrelationMatrix, CorrelationMethod,
    DataKind, WelchTTest,
};

#[test]
fn test_chi_square_two_by_two() {
    let table = ContingencyTable::new(
        vec!["a".into(), "b".into()],
        vec!["no".into(), "yes".into()],
        array![[10.0, 20.0], [30.0, 40.0]],
    )
    .unwrap();
    let result = ChiSquareTest::new(0.05).test("a vs b", &table).unwrap();

    // expected counts 12, 18, 28, 42
    assert!((result.statistic - 0.793651).abs() < 1e-5);
    assert_eq!(result.dof, 1);
    assert!(result.p_value > 0.36 && result.p_value < 0.39);
    assert!(!result.reject_null);
    assert_eq!(result.low_expected_cells, 0);
}

#[test]
fn test_chi_square_detects_dependence() {
    let table = ContingencyTable::from_observations(
        (0..200).map(|i| (if i < 100 { "old" } else { "young" }, i < 60 || i % 10 == 0)),
    );
    let result = ChiSquareTest::default().test("age vs outcome", &table).unwrap();
    assert!(result.reject_null);
    assert!(result.p_value < 1e-6);
}

#[test]
fn test_welch_t_test() {
    let a = [1.0, 2.0, 3.0, 4.0, 5.0];
    let b = [2.0, 4.0, 6.0, 8.0, 10.0];
    let result = WelchTTest::new(0.05).test("a vs b", &a, &b).unwrap();

    assert!((result.statistic + 1.897367).abs() < 1e-5);
    assert!((result.dof - 5.882353).abs() < 1e-5);
    assert!(result.p_value > 0.09 && result.p_value < 0.13);
    assert!(!result.reject_null);
}

#[test]
fn test_welch_rejects_constant_groups() {
    let result = WelchTTest::default().test("flat", &[1.0, 1.0], &[1.0, 1.0]);
    assert!(result.is_err());
}

#[test]
fn test_confidence_intervals() {
    let data = [1.0, 2.0, 3.0, 4.0, 5.0];
    let normal = confidence_interval(&data, DataKind::Continuous, 0.95).unwrap();
    let student = confidence_interval(&data, DataKind::Discrete, 0.95).unwrap();

    assert!((normal.mean - 3.0).abs() < 1e-12);
    assert!((normal.margin - 1.385903).abs() < 1e-5);
    assert!((student.margin - 1.963243).abs() < 1e-5);
    assert!(student.margin > normal.margin);
    assert!(normal.contains(3.0) && !normal.contains(5.0));
}

#[test]
fn test_spearman_sees_monotonic_relation() {
    let x: Vec<f64> = (1..=10).map(f64::from).collect();
    let mut data = Array2::zeros((10, 2));
    for (i, &v) in x.iter().enumerate() {
        data[[i, 0]] = v;
        data[[i, 1]] = v.powi(3);
    }

    let pearson = CorrelationMatrix::compute(&["x", "x3"], &data, CorrelationMethod::Pearson).unwrap();
    let spearman = CorrelationMatrix::compute(&["x", "x3"], &data, CorrelationMethod::Spearman).unwrap();

    assert!(pearson.get("x", "x3").unwrap() < 1.0 - 1e-3);
    assert!((spearman.get("x", "x3").unwrap() - 1.0).abs() < 1e-12);
    assert!(pearson.is_symmetric(1e-12) && spearman.is_symmetric(1e-12));
    assert_eq!(spearman.pairs_above(0.9).len(), 1);
}
