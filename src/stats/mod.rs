//! Statistical analysis of the cleaned dataset
//!
//! Correlations between numeric and binary attributes, chi-square tests of
//! independence against age groups, Welch t-tests between stroke and
//! non-stroke patients, and confidence intervals for stroke incidence by age
//! decade. A test that cannot be computed on the data at hand is skipped and
//! recorded rather than aborting the run.

mod correlation;
mod hypothesis;
mod intervals;

pub use correlation::{
    average_ranks, correlation_p_value, pearson, phi_coefficient, CorrelatedPair,
    CorrelationMatrix, CorrelationMethod,
};
pub use hypothesis::{
    mean_var, ChiSquareResult, ChiSquareTest, ContingencyTable, TTestResult, WelchTTest,
};
pub use intervals::{confidence_interval, ConfidenceInterval, DataKind};

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{info, warn};

use crate::data::{Dataset, Gender, PatientRecord, ResidenceType};
use crate::error::{AnalysisError, Result};

/// Statistical analysis settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsConfig {
    /// Significance level for every test
    pub alpha: f64,
    pub confidence_level: f64,
    /// |r| at or above this counts as a strong correlation
    pub strong_correlation: f64,
    pub correlation_method: CorrelationMethod,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            alpha: 0.05,
            confidence_level: 0.95,
            strong_correlation: 0.7,
            correlation_method: CorrelationMethod::Pearson,
        }
    }
}

impl StatsConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn with_confidence_level(mut self, level: f64) -> Self {
        self.confidence_level = level;
        self
    }

    pub fn with_strong_correlation(mut self, threshold: f64) -> Self {
        self.strong_correlation = threshold;
        self
    }

    pub fn with_correlation_method(mut self, method: CorrelationMethod) -> Self {
        self.correlation_method = method;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0 < self.alpha && self.alpha < 1.0) {
            return Err(AnalysisError::ConfigError(format!("alpha must be in (0, 1), got {}", self.alpha)));
        }
        if !(0.0 < self.confidence_level && self.confidence_level < 1.0) {
            return Err(AnalysisError::ConfigError(format!(
                "confidence_level must be in (0, 1), got {}",
                self.confidence_level
            )));
        }
        if !(0.0..=1.0).contains(&self.strong_correlation) {
            return Err(AnalysisError::ConfigError(format!(
                "strong_correlation must be in [0, 1], got {}",
                self.strong_correlation
            )));
        }
        if self.correlation_method == CorrelationMethod::Phi {
            return Err(AnalysisError::ConfigError(
                "phi is reserved for binary attributes; use pearson or spearman".to_string(),
            ));
        }
        Ok(())
    }
}

/// Age buckets used for independence tests and incidence intervals
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AgeGroup {
    Under18,
    From18To29,
    From30To39,
    From40To49,
    From50To59,
    From60To69,
    From70To79,
    From80,
}

impl AgeGroup {
    pub fn from_age(age: f64) -> Self {
        match age {
            a if a < 18.0 => AgeGroup::Under18,
            a if a < 30.0 => AgeGroup::From18To29,
            a if a < 40.0 => AgeGroup::From30To39,
            a if a < 50.0 => AgeGroup::From40To49,
            a if a < 60.0 => AgeGroup::From50To59,
            a if a < 70.0 => AgeGroup::From60To69,
            a if a < 80.0 => AgeGroup::From70To79,
            _ => AgeGroup::From80,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AgeGroup::Under18 => "<18",
            AgeGroup::From18To29 => "18-29",
            AgeGroup::From30To39 => "30-39",
            AgeGroup::From40To49 => "40-49",
            AgeGroup::From50To59 => "50-59",
            AgeGroup::From60To69 => "60-69",
            AgeGroup::From70To79 => "70-79",
            AgeGroup::From80 => "80+",
        }
    }
}

impl fmt::Display for AgeGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Incidence interval for one age group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupInterval {
    pub group: String,
    pub n: usize,
    pub cases: usize,
    pub interval: ConfidenceInterval,
}

/// Mean interval for a numeric attribute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeInterval {
    pub attribute: String,
    pub interval: ConfidenceInterval,
}

/// A test that could not be computed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedTest {
    pub name: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticalSummary {
    pub numeric_correlation: CorrelationMatrix,
    pub strong_correlations: Vec<CorrelatedPair>,
    pub binary_correlation: CorrelationMatrix,
    /// Binary pairs with |phi| at or above alpha
    pub notable_binary_pairs: Vec<CorrelatedPair>,
    pub independence_tests: Vec<ChiSquareResult>,
    pub t_tests: Vec<TTestResult>,
    pub incidence_by_age: Vec<GroupInterval>,
    pub attribute_intervals: Vec<AttributeInterval>,
    pub skipped: Vec<SkippedTest>,
}

pub const NUMERIC_ATTRIBUTES: [&str; 3] = ["age", "avg_glucose_level", "bmi"];

pub const BINARY_ATTRIBUTES: [&str; 6] = [
    "hypertension",
    "heart_disease",
    "ever_married",
    "gender_female",
    "residence_urban",
    "stroke",
];

fn indicator(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}

fn yes_no(b: bool) -> &'static str {
    if b {
        "Yes"
    } else {
        "No"
    }
}

/// Numeric attributes of an imputed record; BMI must be present
fn numeric_row(r: &PatientRecord) -> Result<[f64; 3]> {
    let bmi = r.bmi.ok_or_else(|| {
        AnalysisError::Statistics(format!("record {} has no BMI; impute first", r.id))
    })?;
    Ok([r.age, r.avg_glucose_level, bmi])
}

fn binary_row(r: &PatientRecord) -> [f64; 6] {
    [
        indicator(r.hypertension),
        indicator(r.heart_disease),
        indicator(r.ever_married),
        indicator(r.gender == Gender::Female),
        indicator(r.residence == ResidenceType::Urban),
        indicator(r.stroke),
    ]
}

pub struct StatisticalAnalyzer {
    config: StatsConfig,
}

impl StatisticalAnalyzer {
    pub fn new(config: StatsConfig) -> Self {
        Self { config }
    }

    pub fn analyze(&self, dataset: &Dataset) -> Result<StatisticalSummary> {
        let records = dataset.records();
        let n = records.len();
        let mut skipped = Vec::new();

        let mut numeric = Vec::with_capacity(n * NUMERIC_ATTRIBUTES.len());
        let mut binary = Vec::with_capacity(n * BINARY_ATTRIBUTES.len());
        for r in records {
            numeric.extend_from_slice(&numeric_row(r)?);
            binary.extend_from_slice(&binary_row(r));
        }
        let numeric = Array2::from_shape_vec((n, NUMERIC_ATTRIBUTES.len()), numeric)?;
        let binary = Array2::from_shape_vec((n, BINARY_ATTRIBUTES.len()), binary)?;

        let numeric_correlation =
            CorrelationMatrix::compute(&NUMERIC_ATTRIBUTES, &numeric, self.config.correlation_method)?;
        let strong_correlations = numeric_correlation.pairs_above(self.config.strong_correlation);
        if strong_correlations.is_empty() {
            info!(
                threshold = self.config.strong_correlation,
                "No strongly correlated numeric pairs"
            );
        }

        let binary_correlation =
            CorrelationMatrix::compute(&BINARY_ATTRIBUTES, &binary, CorrelationMethod::Phi)?;
        let notable_binary_pairs = binary_correlation.pairs_above(self.config.alpha);

        let chi = ChiSquareTest::new(self.config.alpha);
        let mut independence_tests = Vec::new();
        let tables = [
            (
                "stroke vs age group",
                ContingencyTable::from_observations(
                    records.iter().map(|r| (AgeGroup::from_age(r.age), yes_no(r.stroke))),
                ),
            ),
            (
                "heart disease vs age group",
                ContingencyTable::from_observations(
                    records.iter().map(|r| (AgeGroup::from_age(r.age), yes_no(r.heart_disease))),
                ),
            ),
            (
                "ever married vs age group",
                ContingencyTable::from_observations(
                    records.iter().map(|r| (AgeGroup::from_age(r.age), yes_no(r.ever_married))),
                ),
            ),
        ];
        for (name, table) in tables {
            match chi.test(name, &table) {
                Ok(result) => {
                    info!(
                        test = name,
                        statistic = result.statistic,
                        p_value = result.p_value,
                        reject = result.reject_null,
                        "Chi-square test"
                    );
                    independence_tests.push(result);
                }
                Err(e) => skip(&mut skipped, name, e),
            }
        }

        let welch = WelchTTest::new(self.config.alpha);
        let mut t_tests = Vec::new();
        for (j, attribute) in NUMERIC_ATTRIBUTES.iter().enumerate() {
            let column = numeric.column(j);
            let (with_stroke, without): (Vec<_>, Vec<_>) = records
                .iter()
                .zip(column.iter())
                .partition(|(r, _)| r.stroke);
            let with_stroke: Vec<f64> = with_stroke.into_iter().map(|(_, v)| *v).collect();
            let without: Vec<f64> = without.into_iter().map(|(_, v)| *v).collect();

            let name = format!("{} by stroke", attribute);
            match welch.test(&name, &with_stroke, &without) {
                Ok(result) => t_tests.push(result),
                Err(e) => skip(&mut skipped, &name, e),
            }
        }

        let incidence_by_age = self.incidence_by_age(records, &mut skipped);

        let mut attribute_intervals = Vec::new();
        for (j, attribute) in NUMERIC_ATTRIBUTES.iter().enumerate() {
            let values = numeric.column(j).to_vec();
            match confidence_interval(&values, DataKind::Continuous, self.config.confidence_level) {
                Ok(interval) => attribute_intervals.push(AttributeInterval {
                    attribute: attribute.to_string(),
                    interval,
                }),
                Err(e) => skip(&mut skipped, &format!("mean {} interval", attribute), e),
            }
        }

        info!(
            chi_square = independence_tests.len(),
            t_tests = t_tests.len(),
            skipped = skipped.len(),
            "Statistical analysis complete"
        );

        Ok(StatisticalSummary {
            numeric_correlation,
            strong_correlations,
            binary_correlation,
            notable_binary_pairs,
            independence_tests,
            t_tests,
            incidence_by_age,
            attribute_intervals,
            skipped,
        })
    }

    /// Stroke incidence interval per age group, using the Student-t critical value
    fn incidence_by_age(&self, records: &[PatientRecord], skipped: &mut Vec<SkippedTest>) -> Vec<GroupInterval> {
        let mut groups: std::collections::BTreeMap<AgeGroup, Vec<f64>> = Default::default();
        for r in records {
            groups.entry(AgeGroup::from_age(r.age)).or_default().push(indicator(r.stroke));
        }

        let mut intervals = Vec::with_capacity(groups.len());
        for (group, outcomes) in groups {
            let name = format!("stroke incidence {}", group);
            match confidence_interval(&outcomes, DataKind::Discrete, self.config.confidence_level) {
                Ok(interval) => intervals.push(GroupInterval {
                    group: group.label().to_string(),
                    n: outcomes.len(),
                    cases: outcomes.iter().filter(|&&v| v == 1.0).count(),
                    interval,
                }),
                Err(e) => skip(skipped, &name, e),
            }
        }
        intervals
    }
}

fn skip(skipped: &mut Vec<SkippedTest>, name: &str, err: AnalysisError) {
    warn!(test = name, error = %err, "Skipping statistical test");
    skipped.push(SkippedTest {
        name: name.to_string(),
        reason: err.to_string(),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::*;

    fn record(id: i64, age: f64, stroke: bool) -> PatientRecord {
        PatientRecord {
            id,
            gender: if id % 3 == 0 { Gender::Male } else { Gender::Female },
            age,
            hypertension: age > 60.0 && id % 2 == 0,
            heart_disease: age > 70.0 && id % 3 == 0,
            ever_married: age > 28.0,
            work_type: WorkType::Private,
            residence: if id % 2 == 0 { ResidenceType::Urban } else { ResidenceType::Rural },
            avg_glucose_level: 80.0 + (id % 17) as f64 * 4.0 + if stroke { 30.0 } else { 0.0 },
            bmi: Some(22.0 + (id % 11) as f64),
            smoking_status: Some(SmokingStatus::NeverSmoked),
            stroke,
            flags: RecordFlags::default(),
        }
    }

    fn sample() -> Dataset {
        let records = (0..400)
            .map(|i| {
                let age = 18.0 + (i % 65) as f64;
                let stroke = age > 60.0 && i % 5 == 0;
                record(i, age, stroke)
            })
            .collect();
        Dataset::new(records).unwrap()
    }

    #[test]
    fn test_analyze_summary() {
        let summary = StatisticalAnalyzer::new(StatsConfig::default())
            .analyze(&sample())
            .unwrap();

        assert!(summary.numeric_correlation.is_symmetric(1e-12));
        assert!(summary.binary_correlation.is_symmetric(1e-12));
        assert_eq!(summary.independence_tests.len(), 3);
        let stroke_test = &summary.independence_tests[0];
        assert_eq!(stroke_test.name, "stroke vs age group");
        assert!(stroke_test.reject_null);
        assert_eq!(summary.t_tests.len(), 3);
        assert_eq!(summary.attribute_intervals.len(), 3);

        let young = summary
            .incidence_by_age
            .iter()
            .find(|g| g.group == "18-29")
            .unwrap();
        assert_eq!(young.cases, 0);
        assert_eq!(young.interval.mean, 0.0);
        let old = summary.incidence_by_age.iter().find(|g| g.group == "70-79").unwrap();
        assert!(old.interval.mean > 0.0);
    }

    #[test]
    fn test_degenerate_test_is_skipped() {
        // nobody has heart disease: that table has a single column
        let records: Vec<PatientRecord> = (0..50)
            .map(|i| {
                let mut r = record(i, 20.0 + i as f64, i % 7 == 0);
                r.heart_disease = false;
                r
            })
            .collect();
        let summary = StatisticalAnalyzer::new(StatsConfig::default())
            .analyze(&Dataset::new(records).unwrap())
            .unwrap();

        assert!(summary
            .skipped
            .iter()
            .any(|s| s.name == "heart disease vs age group"));
        assert_eq!(summary.independence_tests.len(), 2);
    }

    #[test]
    fn test_age_groups() {
        assert_eq!(AgeGroup::from_age(18.0), AgeGroup::From18To29);
        assert_eq!(AgeGroup::from_age(29.9), AgeGroup::From18To29);
        assert_eq!(AgeGroup::from_age(82.0), AgeGroup::From80);
        assert_eq!(AgeGroup::From60To69.to_string(), "60-69");
    }

    #[test]
    fn test_config_validation() {
        assert!(StatsConfig::default().validate().is_ok());
        assert!(StatsConfig::default().with_alpha(1.5).validate().is_err());
        assert!(StatsConfig::default()
            .with_correlation_method(CorrelationMethod::Phi)
            .validate()
            .is_err());
    }
}
