//! Analysis report: aggregation of every stage plus text and JSON rendering

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::Write as _;
use std::path::Path;

use crate::cleaning::CleaningSummary;
use crate::config::AnalysisConfig;
use crate::data::DatasetProfile;
use crate::error::Result;
use crate::imputation::ImputationSummary;
use crate::stats::StatisticalSummary;
use crate::training::TrainingReport;

/// Category of a surfaced problem
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    DuplicateRows,
    ExtremeValue,
    ImputationFallback,
    SkippedTest,
    LowExpectedCount,
    ExcludedModel,
}

/// Something the run worked around rather than failed on
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Issue {
    pub kind: IssueKind,
    pub message: String,
}

impl Issue {
    pub fn new(kind: IssueKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Wall time of one pipeline stage
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageTiming {
    pub stage: String,
    pub seconds: f64,
}

/// Everything one run produced
#[derive(Debug, Serialize)]
pub struct AnalysisReport {
    pub generated_at: DateTime<Utc>,
    pub config: AnalysisConfig,
    pub profile: DatasetProfile,
    pub cleaning: CleaningSummary,
    pub imputation: ImputationSummary,
    pub statistics: StatisticalSummary,
    pub training: TrainingReport,
    pub issues: Vec<Issue>,
    pub timings: Vec<StageTiming>,
}

/// Collect the issues each stage surfaced, in stage order
pub fn collect_issues(
    profile: &DatasetProfile,
    cleaning: &CleaningSummary,
    imputation: &ImputationSummary,
    statistics: &StatisticalSummary,
    training: &TrainingReport,
) -> Vec<Issue> {
    let mut issues = Vec::new();

    if profile.duplicate_rows > 0 {
        issues.push(Issue::new(
            IssueKind::DuplicateRows,
            format!("{} duplicate row(s) in the input", profile.duplicate_rows),
        ));
    }
    if cleaning.extreme_glucose > 0 {
        issues.push(Issue::new(
            IssueKind::ExtremeValue,
            format!("{} record(s) with extreme glucose kept and flagged", cleaning.extreme_glucose),
        ));
    }
    if cleaning.extreme_bmi > 0 {
        issues.push(Issue::new(
            IssueKind::ExtremeValue,
            format!("{} record(s) with extreme BMI kept and flagged", cleaning.extreme_bmi),
        ));
    }
    for fallback in &imputation.fallbacks {
        issues.push(Issue::new(IssueKind::ImputationFallback, fallback.reason.clone()));
    }
    for skipped in &statistics.skipped {
        issues.push(Issue::new(
            IssueKind::SkippedTest,
            format!("{}: {}", skipped.name, skipped.reason),
        ));
    }
    for test in statistics.independence_tests.iter().filter(|t| t.low_expected_cells > 0) {
        issues.push(Issue::new(
            IssueKind::LowExpectedCount,
            format!(
                "{}: {} cell(s) with expected count below 5",
                test.name, test.low_expected_cells
            ),
        ));
    }
    for excluded in &training.excluded {
        issues.push(Issue::new(
            IssueKind::ExcludedModel,
            format!("{}: {}", excluded.model, excluded.reason),
        ));
    }

    issues
}

fn fmt_p(p: f64) -> String {
    if p < 1e-4 {
        format!("{:.2e}", p)
    } else {
        format!("{:.4}", p)
    }
}

fn fmt_auc(auc: Option<f64>) -> String {
    auc.map(|a| format!("{:.4}", a)).unwrap_or_else(|| "n/a".to_string())
}

fn write_statistics(
    out: &mut String,
    stats: &StatisticalSummary,
    strong_threshold: f64,
) -> std::fmt::Result {
    writeln!(out, "\n--- Statistics ---")?;

    writeln!(
        out,
        "Numeric correlation ({:?}, n = {}):",
        stats.numeric_correlation.method, stats.numeric_correlation.n_samples
    )?;
    let names = &stats.numeric_correlation.names;
    write!(out, "{:<20}", "")?;
    for name in names {
        write!(out, "{:>20}", name)?;
    }
    writeln!(out)?;
    for (i, name) in names.iter().enumerate() {
        write!(out, "{:<20}", name)?;
        for j in 0..names.len() {
            write!(out, "{:>20.4}", stats.numeric_correlation.values[[i, j]])?;
        }
        writeln!(out)?;
    }
    if stats.strong_correlations.is_empty() {
        writeln!(out, "No strong correlations (|r| >= {})", strong_threshold)?;
    }
    for pair in &stats.strong_correlations {
        writeln!(out, "Strong: {} ~ {} r = {:.4}", pair.first, pair.second, pair.coefficient)?;
    }
    for pair in &stats.notable_binary_pairs {
        writeln!(out, "Phi: {} ~ {} = {:.4}", pair.first, pair.second, pair.coefficient)?;
    }

    writeln!(out, "\nIndependence tests (chi-square):")?;
    writeln!(out, "{:<32} {:>10} {:>4} {:>10} {:>8}", "Test", "Chi2", "dof", "p", "Reject")?;
    for t in &stats.independence_tests {
        writeln!(
            out,
            "{:<32} {:>10.3} {:>4} {:>10} {:>8}",
            t.name,
            t.statistic,
            t.dof,
            fmt_p(t.p_value),
            if t.reject_null { "yes" } else { "no" }
        )?;
    }

    writeln!(out, "\nWelch t-tests (stroke vs no stroke):")?;
    writeln!(
        out,
        "{:<24} {:>10} {:>10} {:>10} {:>10} {:>8}",
        "Attribute", "Mean A", "Mean B", "t", "p", "Reject"
    )?;
    for t in &stats.t_tests {
        writeln!(
            out,
            "{:<24} {:>10.3} {:>10.3} {:>10.3} {:>10} {:>8}",
            t.name,
            t.mean_a,
            t.mean_b,
            t.statistic,
            fmt_p(t.p_value),
            if t.reject_null { "yes" } else { "no" }
        )?;
    }

    writeln!(out, "\nStroke incidence by age group:")?;
    for g in &stats.incidence_by_age {
        writeln!(
            out,
            "{:<8} n = {:<6} cases = {:<4} rate = {:.4} [{:.4}, {:.4}]",
            g.group, g.n, g.cases, g.interval.mean, g.interval.lower, g.interval.upper
        )?;
    }

    writeln!(out, "\nAttribute means:")?;
    for a in &stats.attribute_intervals {
        writeln!(
            out,
            "{:<24} {:.3} [{:.3}, {:.3}] at {:.0}%",
            a.attribute,
            a.interval.mean,
            a.interval.lower,
            a.interval.upper,
            a.interval.level * 100.0
        )?;
    }
    Ok(())
}

/// Statistics section on its own, for runs that stop before training
pub fn render_statistics(stats: &StatisticalSummary, strong_threshold: f64) -> String {
    let mut out = String::new();
    let _ = write_statistics(&mut out, stats, strong_threshold);
    out
}

impl AnalysisReport {
    pub fn best_model_name(&self) -> Option<&'static str> {
        self.training.best_model().map(|m| m.name())
    }

    /// Human-readable summary
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        // Writing to a String cannot fail
        let _ = self.write_text(&mut out);
        out
    }

    fn write_text(&self, out: &mut String) -> std::fmt::Result {
        writeln!(out, "=== Stroke Analysis Report ===")?;
        writeln!(out, "Generated: {}", self.generated_at.format("%Y-%m-%d %H:%M UTC"))?;
        writeln!(out, "Seed: {}", self.config.seed)?;

        writeln!(out, "\n--- Data ---")?;
        writeln!(out, "Rows: {}  Columns: {}", self.profile.n_rows, self.profile.n_cols)?;
        if self.profile.null_columns.is_empty() {
            writeln!(out, "Columns with nulls: none")?;
        } else {
            writeln!(out, "Columns with nulls: {}", self.profile.null_columns.join(", "))?;
        }
        writeln!(out, "Duplicate rows: {}", self.profile.duplicate_rows)?;

        writeln!(out, "\n--- Cleaning ---")?;
        writeln!(
            out,
            "Records: {} -> {} ({} under {} removed)",
            self.cleaning.input_records,
            self.cleaning.retained,
            self.cleaning.removed_non_adults,
            self.config.cleaning.min_age
        )?;
        writeln!(
            out,
            "Flagged: {} extreme glucose, {} extreme BMI",
            self.cleaning.extreme_glucose, self.cleaning.extreme_bmi
        )?;

        writeln!(out, "\n--- Imputation ---")?;
        writeln!(
            out,
            "BMI imputed: {}  Smoking status imputed: {}  Fallbacks: {}",
            self.imputation.bmi_imputed,
            self.imputation.smoking_imputed,
            self.imputation.fallbacks.len()
        )?;

        write_statistics(out, &self.statistics, self.config.stats.strong_correlation)?;
        self.write_training(out)?;

        writeln!(out, "\n--- Issues ---")?;
        if self.issues.is_empty() {
            writeln!(out, "None")?;
        }
        for issue in &self.issues {
            writeln!(out, "[{:?}] {}", issue.kind, issue.message)?;
        }

        Ok(())
    }

    fn write_training(&self, out: &mut String) -> std::fmt::Result {
        let training = &self.training;
        let split = &training.split;
        writeln!(out, "\n--- Training ---")?;
        writeln!(
            out,
            "Split: train {} (+{} synthetic), validation {}, test {}",
            split.n_train, split.n_synthetic, split.n_validation, split.n_test
        )?;
        writeln!(
            out,
            "Stroke rate: train {:.4} -> {:.4} after SMOTE, validation {:.4}, test {:.4}",
            split.train_positive_rate,
            split.train_positive_rate_resampled,
            split.validation_positive_rate,
            split.test_positive_rate
        )?;

        writeln!(out, "\nModel comparison (test split):")?;
        writeln!(
            out,
            "{:<24} {:>9} {:>9} {:>9} {:>9} {:>9} {:>9} {:>10}",
            "Classifier", "Accuracy", "Precision", "Recall", "F1", "AUC", "Val F1", "Threshold"
        )?;
        for e in &training.comparisons {
            writeln!(
                out,
                "{:<24} {:>9.4} {:>9.4} {:>9.4} {:>9.4} {:>9} {:>9.4} {:>10.4}",
                e.model.name(),
                e.test.accuracy,
                e.test.precision,
                e.test.recall,
                e.test.f1_score,
                fmt_auc(e.test.auc_roc),
                e.validation.f1_score,
                e.threshold
            )?;
        }

        if !training.cv.is_empty() {
            writeln!(out, "\nCross-validation at chosen thresholds:")?;
            writeln!(
                out,
                "{:<24} {:>6} {:>9} {:>9} {:>9} {:>9}",
                "Classifier", "Folds", "Accuracy", "Precision", "Recall", "F1"
            )?;
            for cv in &training.cv {
                writeln!(
                    out,
                    "{:<24} {:>6} {:>9.4} {:>9.4} {:>9.4} {:>9.4}",
                    cv.model.name(),
                    cv.folds,
                    cv.accuracy,
                    cv.precision,
                    cv.recall,
                    cv.f1_score
                )?;
            }
        }

        match training.comparisons.first() {
            Some(best) => {
                writeln!(
                    out,
                    "\nBest model: {} (validation F1 {:.4}, test F1 {:.4}, threshold {:.4})",
                    best.model.name(),
                    best.validation.f1_score,
                    best.test.f1_score,
                    best.threshold
                )?;
                let c = &best.test.confusion;
                writeln!(out, "Test confusion: TN {} FP {} FN {} TP {}", c.tn, c.fp, c.fn_, c.tp)?;
                if let Some(importances) = &best.feature_importances {
                    writeln!(out, "Top features:")?;
                    for (name, value) in importances.iter().take(5) {
                        writeln!(out, "  {:<32} {:.4}", name, value)?;
                    }
                }
            }
            None => writeln!(out, "\nBest model: none (every model was excluded)")?,
        }
        Ok(())
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cleaning::CleaningSummary;
    use crate::imputation::{FallbackStrategy, ImputationFallback};
    use crate::training::{ExcludedModel, ModelKind, SplitSummary};

    fn empty_training() -> TrainingReport {
        TrainingReport {
            split: SplitSummary {
                n_train: 0,
                n_validation: 0,
                n_test: 0,
                n_train_resampled: 0,
                n_synthetic: 0,
                train_positive_rate: 0.0,
                train_positive_rate_resampled: 0.0,
                validation_positive_rate: 0.0,
                test_positive_rate: 0.0,
            },
            comparisons: vec![],
            excluded: vec![ExcludedModel {
                model: ModelKind::Svm,
                reason: "SVM failed to converge after 300 iterations".into(),
            }],
            cv: vec![],
            best: None,
        }
    }

    fn profile() -> DatasetProfile {
        DatasetProfile {
            n_rows: 10,
            n_cols: 12,
            columns: vec![],
            null_columns: vec!["bmi".into()],
            duplicate_rows: 0,
        }
    }

    #[test]
    fn test_collect_issues_in_stage_order() {
        let cleaning = CleaningSummary {
            extreme_glucose: 2,
            ..Default::default()
        };
        let imputation = ImputationSummary {
            bmi_imputed: 1,
            smoking_imputed: 0,
            fallbacks: vec![ImputationFallback {
                record_id: 9,
                field: "bmi".into(),
                strategy: FallbackStrategy::Median,
                value: 28.1,
                donors: 1,
                reason: "record 9 has 1 donor(s) for bmi, 3 required".into(),
            }],
        };
        let stats = StatisticalSummary {
            numeric_correlation: crate::stats::CorrelationMatrix {
                method: crate::stats::CorrelationMethod::Pearson,
                names: vec![],
                values: ndarray::Array2::zeros((0, 0)),
                n_samples: 0,
            },
            strong_correlations: vec![],
            binary_correlation: crate::stats::CorrelationMatrix {
                method: crate::stats::CorrelationMethod::Pearson,
                names: vec![],
                values: ndarray::Array2::zeros((0, 0)),
                n_samples: 0,
            },
            notable_binary_pairs: vec![],
            independence_tests: vec![],
            t_tests: vec![],
            incidence_by_age: vec![],
            attribute_intervals: vec![],
            skipped: vec![],
        };

        let issues = collect_issues(&profile(), &cleaning, &imputation, &stats, &empty_training());
        let kinds: Vec<IssueKind> = issues.iter().map(|i| i.kind).collect();
        assert_eq!(
            kinds,
            vec![IssueKind::ExtremeValue, IssueKind::ImputationFallback, IssueKind::ExcludedModel]
        );
        assert!(issues[2].message.starts_with("SVM:"));
    }

    #[test]
    fn test_fmt_p() {
        assert_eq!(fmt_p(0.05), "0.0500");
        assert_eq!(fmt_p(1.5e-7), "1.50e-7");
        assert_eq!(fmt_auc(None), "n/a");
    }
}
