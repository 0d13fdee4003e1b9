//! End-to-end analysis pipeline.
//!
//! load -> profile -> clean -> impute -> features -> statistics -> train ->
//! report, strictly forward and single-threaded.

use chrono::Utc;
use polars::prelude::DataFrame;
use std::path::Path;
use std::time::Instant;
use tracing::info;

use crate::cleaning::{Cleaner, CleaningSummary};
use crate::config::AnalysisConfig;
use crate::data::{DataLoader, Dataset, DatasetProfile};
use crate::error::Result;
use crate::features::{FeatureEngineer, FeatureMatrix};
use crate::imputation::{ImputationSummary, PatientImputer};
use crate::report::{collect_issues, AnalysisReport, StageTiming};
use crate::stats::{StatisticalAnalyzer, StatisticalSummary};
use crate::training::TrainEngine;

/// Records after cleaning and imputation, with what each step did
#[derive(Debug, Clone)]
pub struct PreparedData {
    pub profile: DatasetProfile,
    pub dataset: Dataset,
    pub cleaning: CleaningSummary,
    pub imputation: ImputationSummary,
}

/// Times stages and logs their completion
#[derive(Debug, Default)]
struct StageClock {
    timings: Vec<StageTiming>,
}

impl StageClock {
    fn run<T>(&mut self, stage: &str, f: impl FnOnce() -> Result<T>) -> Result<T> {
        let start = Instant::now();
        let value = f()?;
        let seconds = start.elapsed().as_secs_f64();
        info!(stage, secs = seconds, "Stage finished");
        self.timings.push(StageTiming {
            stage: stage.to_string(),
            seconds,
        });
        Ok(value)
    }
}

/// Runs every stage with one configuration
#[derive(Debug, Clone)]
pub struct AnalysisPipeline {
    config: AnalysisConfig,
    loader: DataLoader,
}

impl AnalysisPipeline {
    pub fn new(config: AnalysisConfig) -> Self {
        Self {
            config,
            loader: DataLoader::new(),
        }
    }

    pub fn with_loader(mut self, loader: DataLoader) -> Self {
        self.loader = loader;
        self
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    fn prepare_frame(&self, df: &DataFrame, clock: &mut StageClock) -> Result<PreparedData> {
        let profile = clock.run("profile", || DatasetProfile::from_frame(df))?;
        info!(
            rows = profile.n_rows,
            cols = profile.n_cols,
            nulls = profile.total_nulls(),
            duplicates = profile.duplicate_rows,
            "Profiled input"
        );

        let dataset = clock.run("records", || self.loader.to_dataset(df))?;
        let (dataset, cleaning) =
            clock.run("clean", || Cleaner::new(self.config.cleaning.clone()).clean(dataset))?;
        let (dataset, imputation) = clock.run("impute", || {
            PatientImputer::new(self.config.imputation.clone()).impute(dataset)
        })?;

        Ok(PreparedData {
            profile,
            dataset,
            cleaning,
            imputation,
        })
    }

    /// Load, clean and impute a CSV file
    pub fn prepare<P: AsRef<Path>>(&self, path: P) -> Result<PreparedData> {
        self.config.validate()?;
        let mut clock = StageClock::default();
        let df = clock.run("load", || self.loader.load_csv(path.as_ref()))?;
        self.prepare_frame(&df, &mut clock)
    }

    /// Everything up to and including the statistical analysis
    pub fn run_statistics<P: AsRef<Path>>(
        &self,
        path: P,
    ) -> Result<(PreparedData, StatisticalSummary)> {
        let prepared = self.prepare(path)?;
        let statistics = StatisticalAnalyzer::new(self.config.stats.clone()).analyze(&prepared.dataset)?;
        Ok((prepared, statistics))
    }

    /// Full run on a CSV file
    pub fn run<P: AsRef<Path>>(&self, path: P) -> Result<AnalysisReport> {
        self.config.validate()?;
        info!(path = %path.as_ref().display(), seed = self.config.seed, "Starting analysis");
        let mut clock = StageClock::default();
        let df = clock.run("load", || self.loader.load_csv(path.as_ref()))?;
        self.run_with_clock(&df, clock)
    }

    /// Full run on an already loaded frame
    pub fn run_frame(&self, df: &DataFrame) -> Result<AnalysisReport> {
        self.config.validate()?;
        self.loader.validate_schema(df)?;
        self.run_with_clock(df, StageClock::default())
    }

    fn run_with_clock(&self, df: &DataFrame, mut clock: StageClock) -> Result<AnalysisReport> {
        let start = Instant::now();
        let prepared = self.prepare_frame(df, &mut clock)?;

        let features: FeatureMatrix =
            clock.run("features", || FeatureEngineer::new().build(&prepared.dataset))?;
        let statistics = clock.run("statistics", || {
            StatisticalAnalyzer::new(self.config.stats.clone()).analyze(&prepared.dataset)
        })?;
        let training = clock.run("train", || {
            TrainEngine::new(self.config.seeded_training()).run(&features)
        })?;

        let issues = collect_issues(
            &prepared.profile,
            &prepared.cleaning,
            &prepared.imputation,
            &statistics,
            &training,
        );
        info!(
            best = training.best_model().map(|m| m.name()).unwrap_or("none"),
            issues = issues.len(),
            secs = start.elapsed().as_secs_f64(),
            "Analysis finished"
        );

        Ok(AnalysisReport {
            generated_at: Utc::now(),
            config: self.config.clone(),
            profile: prepared.profile,
            cleaning: prepared.cleaning,
            imputation: prepared.imputation,
            statistics,
            training,
            issues,
            timings: clock.timings,
        })
    }
}
