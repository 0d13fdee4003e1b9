//! Stroke analysis CLI
//!
//! Full runs, a first look at the data file, and statistics-only runs.

use clap::{Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::AnalysisConfig;
use crate::data::{DataLoader, DatasetProfile};
use crate::pipeline::AnalysisPipeline;
use crate::report::{render_statistics, AnalysisReport};

pub const DEFAULT_DATA_PATH: &str = "healthcare-dataset-stroke-data.csv";

// ─── Styling helpers ───────────────────────────────────────────────────────────

const W: usize = 58; // box inner width

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn line_box_top()    { println!("  {}", dim("┌─────────────────────────────────────────────────────────┐")); }
fn line_box_bottom() { println!("  {}", dim("└─────────────────────────────────────────────────────────┘")); }

fn line_box(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let pad = W.saturating_sub(visible_len);
    println!("  {}  {}{} {}", dim("│"), content, " ".repeat(pad), dim("│"));
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::new();
    let mut in_escape = false;
    for c in s.chars() {
        if c == '\x1b' { in_escape = true; continue; }
        if in_escape { if c == 'm' { in_escape = false; } continue; }
        out.push(c);
    }
    out
}

fn kv(key: &str, val: &str) -> String {
    format!("{} {}", muted(&format!("{:<14}", key)), val.white())
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

fn print_indented(text: &str) {
    for line in text.lines() {
        println!("  {}", line);
    }
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "stroke-analysis")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Stroke dataset analysis: cleaning, statistics and classifier comparison")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the full analysis (default)
    Run {
        /// Input CSV file
        #[arg(short, long, default_value = DEFAULT_DATA_PATH)]
        data: PathBuf,

        /// JSON configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Seed overriding the configuration
        #[arg(short, long)]
        seed: Option<u64>,

        /// Write the JSON report here
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show shape, types and nulls of a data file
    Info {
        /// Input CSV file
        #[arg(short, long, default_value = DEFAULT_DATA_PATH)]
        data: PathBuf,
    },

    /// Clean, impute and run the statistical tests only
    Stats {
        /// Input CSV file
        #[arg(short, long, default_value = DEFAULT_DATA_PATH)]
        data: PathBuf,

        /// JSON configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

impl Commands {
    /// What a bare invocation does
    pub fn default_run() -> Self {
        Commands::Run {
            data: PathBuf::from(DEFAULT_DATA_PATH),
            config: None,
            seed: None,
            output: None,
        }
    }
}

/// Configuration file (or defaults) with the seed override applied
pub fn load_config(path: Option<&Path>, seed: Option<u64>) -> anyhow::Result<AnalysisConfig> {
    let config = match path {
        Some(p) => AnalysisConfig::from_json_file(p)?,
        None => AnalysisConfig::default(),
    };
    Ok(match seed {
        Some(s) => config.with_seed(s),
        None => config,
    })
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_run(
    data_path: &Path,
    config_path: Option<&Path>,
    seed: Option<u64>,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    section("Stroke Analysis");

    let config = load_config(config_path, seed)?;
    println!("  {}", kv("Data", &data_path.display().to_string()));
    println!("  {}", kv("Seed", &config.seed.to_string()));
    println!("  {}", kv("Models", &config.training.models.len().to_string()));
    println!();

    step_run("Running pipeline");
    let start = Instant::now();
    let report = AnalysisPipeline::new(config).run(data_path)?;
    step_done(&format!("{:.2?}", start.elapsed()));

    println!();
    print_indented(&report.render_text());
    print_summary(&report);

    if let Some(path) = output {
        step_run(&format!("Saving → {}", path.display()));
        report.save_json(path)?;
        step_done("json");
    }

    println!();
    Ok(())
}

fn print_summary(report: &AnalysisReport) {
    println!();
    line_box_top();
    match report.training.comparisons.first() {
        Some(best) => {
            line_box(&format!("{} {}", ok("best"), best.model.name().white().bold()));
            line_box(&kv("Validation F1", &format!("{:.4}", best.validation.f1_score)));
            line_box(&kv("Test F1", &format!("{:.4}", best.test.f1_score)));
            line_box(&kv("Test recall", &format!("{:.4}", best.test.recall)));
            line_box(&kv("Threshold", &format!("{:.4}", best.threshold)));
        }
        None => line_box(&"no model survived training".yellow().to_string()),
    }
    if !report.issues.is_empty() {
        line_box(&kv("Issues", &report.issues.len().to_string()));
    }
    line_box_bottom();
}

pub fn cmd_info(data_path: &Path) -> anyhow::Result<()> {
    section("Data Info");

    let loader = DataLoader::new();
    let df = loader.load_csv(data_path)?;
    let profile = DatasetProfile::from_frame(&df)?;

    println!("  {:<12} {}", muted("File"), data_path.display());
    println!("  {:<12} {}", muted("Rows"), profile.n_rows);
    println!("  {:<12} {}", muted("Columns"), profile.n_cols);
    println!("  {:<12} {}", muted("Duplicates"), profile.duplicate_rows);
    println!("  {:<12} {:.2} MB", muted("Memory"), df.estimated_size() as f64 / 1024.0 / 1024.0);
    println!();

    println!("  {:<20} {:<12} {:>6} {:>8}", muted("Column"), muted("Type"), muted("Nulls"), muted("Unique"));
    println!("  {}", dim(&"─".repeat(50)));

    for col in &profile.columns {
        let nulls = if col.null_count > 0 {
            col.null_count.to_string().yellow()
        } else {
            col.null_count.to_string().normal()
        };
        println!(
            "  {:<20} {:<12} {:>6} {:>8}",
            col.name,
            col.dtype.truecolor(140, 140, 140),
            nulls,
            col.unique_count
        );
    }

    match loader.validate_schema(&df) {
        Ok(()) => println!("\n  {} all required columns present", ok("✓")),
        Err(e) => println!("\n  {} {}", "✗".red(), e),
    }

    println!();
    Ok(())
}

pub fn cmd_stats(data_path: &Path, config_path: Option<&Path>) -> anyhow::Result<()> {
    section("Statistics");

    let config = load_config(config_path, None)?;
    let strong = config.stats.strong_correlation;

    step_run("Cleaning and imputing");
    let start = Instant::now();
    let (prepared, statistics) = AnalysisPipeline::new(config).run_statistics(data_path)?;
    step_done(&format!("{:.2?}", start.elapsed()));

    println!();
    println!("  {}", kv("Records", &prepared.dataset.len().to_string()));
    println!("  {}", kv("Removed", &prepared.cleaning.removed_non_adults.to_string()));
    println!("  {}", kv("BMI imputed", &prepared.imputation.bmi_imputed.to_string()));
    println!("  {}", kv("Smoking imputed", &prepared.imputation.smoking_imputed.to_string()));

    print_indented(&render_statistics(&statistics, strong));
    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_bare_invocation_has_no_subcommand() {
        let cli = Cli::try_parse_from(["stroke-analysis"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_run_arguments() {
        let cli = Cli::try_parse_from(["stroke-analysis", "run", "-s", "7", "-o", "out.json"]).unwrap();
        match cli.command {
            Some(Commands::Run { data, seed, output, config }) => {
                assert_eq!(data, PathBuf::from(DEFAULT_DATA_PATH));
                assert_eq!(seed, Some(7));
                assert_eq!(output, Some(PathBuf::from("out.json")));
                assert!(config.is_none());
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_load_config_seed_override() {
        let config = load_config(None, Some(9)).unwrap();
        assert_eq!(config.seed, 9);
        assert_eq!(config.training.seed, 9);
    }

    #[test]
    fn test_strip_ansi() {
        assert_eq!(strip_ansi(&format!("{}", ok("done"))), "done");
    }
}
