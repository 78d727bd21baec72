//! Wire-rod predictor CLI
//!
//! Command-line interface for training, prediction, data generation and
//! serving.

use clap::{Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crate::config::AppConfig;
use crate::export::ArtifactBundle;
use crate::inference::{InferenceContext, Prediction};
use crate::preprocessing::describe;
use crate::quality::{PolicyKind, QualityPolicy, Verdict};
use crate::schema::{FeatureSchema, ProcessSample, FEATURES, N_FEATURES, TARGET_NAMES};
use crate::synthetic::WireRodGenerator;
use crate::training::{Trainer, TrainingReport};
use crate::utils::{DataLoader, DataSaver};

// ─── Styling helpers ───────────────────────────────────────────────────────────

const W: usize = 58; // box inner width

const TARGET_UNITS: [&str; 3] = ["MPa", "%", "% IACS"];

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }
fn bad(s: &str) -> ColoredString    { s.truecolor(235, 110, 100) }

fn line_box_top()    { println!("  {}", dim("┌─────────────────────────────────────────────────────────┐")); }
fn line_box_bottom() { println!("  {}", dim("└─────────────────────────────────────────────────────────┘")); }
fn line_box_sep()    { println!("  {}", dim("├─────────────────────────────────────────────────────────┤")); }

fn line_box(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let pad = W.saturating_sub(visible_len);
    println!("  {}  {}{} {}", dim("│"), content, " ".repeat(pad), dim("│"));
}

fn line_box_center(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let total_pad = W.saturating_sub(visible_len);
    let left = total_pad / 2;
    let right = total_pad - left;
    println!("  {}  {}{}{} {}", dim("│"), " ".repeat(left), content, " ".repeat(right), dim("│"));
}

fn line_box_empty() { line_box(""); }

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
    format!("{} {}", muted(key), val.white())
}

fn step_ok(msg: &str) {
    println!("  {} {}", ok("✓"), msg);
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

fn verdict_label(verdict: Verdict) -> ColoredString {
    match verdict {
        Verdict::Good => ok("Good").bold(),
        Verdict::NotGood => bad("Not Good").bold(),
    }
}

fn theme() -> dialoguer::theme::ColorfulTheme {
    dialoguer::theme::ColorfulTheme {
        active_item_prefix: dialoguer::console::style("  ›".to_string()).for_stderr().cyan(),
        active_item_style: dialoguer::console::Style::new().for_stderr().white().bold(),
        inactive_item_prefix: dialoguer::console::style("   ".to_string()).for_stderr(),
        inactive_item_style: dialoguer::console::Style::new().for_stderr().color256(245),
        prompt_prefix: dialoguer::console::style("  ?".to_string()).for_stderr().color256(111),
        prompt_style: dialoguer::console::Style::new().for_stderr().white().bold(),
        ..dialoguer::theme::ColorfulTheme::default()
    }
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "wirerod")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Aluminium wire-rod property predictor")]
#[command(long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to $WIREROD_CONFIG, then ./wirerod.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Train the forest on a CSV dataset and save the artifacts
    Train {
        /// Input CSV with the nine process columns and UTS, elongation, conductivity
        #[arg(short, long)]
        data: PathBuf,

        /// Artifact directory (overrides model_dir)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Quality policy (percentile, floor)
        #[arg(long)]
        policy: Option<PolicyKind>,

        /// Random seed for the split and the trees
        #[arg(long)]
        seed: Option<u64>,

        /// Number of trees
        #[arg(long)]
        trees: Option<usize>,

        /// Write held-out true vs predicted values to this CSV
        #[arg(long)]
        holdout_csv: Option<PathBuf>,

        /// Held-out rows to print
        #[arg(long, default_value = "10")]
        show: usize,
    },

    /// Predict one sample (interactive prompts) or every sample in a JSON file
    Predict {
        /// Artifact directory (overrides model_dir)
        #[arg(short, long)]
        model: Option<PathBuf>,

        /// JSON file holding one object or an array of objects
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Write predictions as JSON to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Start the HTTP server
    Serve {
        /// Artifact directory (overrides model_dir)
        #[arg(short, long)]
        model: Option<PathBuf>,

        /// Server port
        #[arg(short, long)]
        port: Option<u16>,

        /// Server host
        #[arg(long)]
        host: Option<String>,
    },

    /// Write a synthetic wire-rod dataset
    Generate {
        /// Output CSV
        #[arg(short, long)]
        output: PathBuf,

        /// Number of rows
        #[arg(short = 'n', long, default_value = "1000")]
        rows: usize,

        /// Random seed
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Noise multiplier
        #[arg(long, default_value = "1.0")]
        noise: f64,
    },

    /// Show dataset statistics and/or a saved artifact summary
    Info {
        /// Input CSV
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// Artifact directory
        #[arg(short, long)]
        model: Option<PathBuf>,
    },
}

// ─── Configuration ─────────────────────────────────────────────────────────────

/// Explicit file if given, else the standard search order
pub fn load_config(path: Option<&Path>) -> anyhow::Result<AppConfig> {
    let config = match path {
        Some(p) => {
            let mut config = AppConfig::load_from_file(p)?;
            config.apply_env(|key| std::env::var(key).ok())?;
            config.validate()?;
            config
        }
        None => AppConfig::load()?,
    };
    Ok(config)
}

// ─── Commands ──────────────────────────────────────────────────────────────────

#[allow(clippy::too_many_arguments)]
pub fn cmd_train(
    config: &AppConfig,
    data_path: &Path,
    output: Option<&Path>,
    policy: Option<PolicyKind>,
    seed: Option<u64>,
    trees: Option<usize>,
    holdout_csv: Option<&Path>,
    show: usize,
) -> anyhow::Result<()> {
    section("Train");

    let mut training = config.training.clone();
    if let Some(seed) = seed {
        training.seed = seed;
    }
    if let Some(trees) = trees {
        training.n_estimators = trees;
    }
    let mut quality = config.quality.clone();
    if let Some(policy) = policy {
        quality.policy = policy;
    }

    step_run("Loading data");
    let start = Instant::now();
    let df = DataLoader::new().load_csv(data_path)?;
    step_done(&format!("{} rows × {} cols in {:?}", df.height(), df.width(), start.elapsed()));

    step_run(&format!("Training {} trees", training.n_estimators.to_string().cyan()));
    let trainer = Trainer::new(training, quality);
    let outcome = trainer.fit_frame(&df)?;
    step_done(&format!("{:.3}s", outcome.report.training_time_secs));

    print_report(&outcome.report);
    print_policy(&outcome.policy);

    if let Some(path) = holdout_csv {
        let mut frame = outcome.report.holdout.to_frame(&outcome.schema.targets)?;
        DataSaver::save_csv(&mut frame, path)?;
        step_ok(&format!("Held-out predictions → {}", path.display()));
    }
    print_holdout(&outcome.report, show);

    let dir = output.unwrap_or(config.model_dir.as_path());
    let bundle = ArtifactBundle::from_outcome(&outcome);
    bundle.save(dir)?;
    step_ok(&format!(
        "Artifacts → {} {}",
        dir.display(),
        dim(&bundle.header().artifact_id.to_string())
    ));
    println!();

    Ok(())
}

fn print_report(report: &TrainingReport) {
    section("Evaluation");
    println!("  {:<16} {}", muted("Rows"), format!("{} train / {} test", report.n_train, report.n_test).white());
    println!("  {:<16} {}", muted("MSE"), format!("{:.4}", report.metrics.mse).white().bold());
    println!("  {:<16} {}", muted("R²"), format!("{:.4}", report.metrics.r2).white().bold());
    println!();

    println!("  {:<16} {:>10} {:>10} {:>10} {:>8}", muted("Target"), muted("MSE"), muted("RMSE"), muted("MAE"), muted("R²"));
    println!("  {}", dim(&"─".repeat(58)));
    for m in &report.metrics.per_target {
        println!("  {:<16} {:>10.4} {:>10.4} {:>10.4} {:>8.4}", m.name, m.mse, m.rmse, m.mae, m.r2);
    }

    if !report.feature_importances.is_empty() {
        section("Feature importance");
        let mut ranked = report.feature_importances.clone();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        for (name, importance) in ranked {
            let bar = "█".repeat((importance * 40.0).round() as usize);
            println!("  {:<26} {:>6.3} {}", name, importance, accent(&bar));
        }
    }
}

fn print_policy(policy: &QualityPolicy) {
    section("Quality policy");
    match policy {
        QualityPolicy::PercentileBand { lower_quantile, upper_quantile, lower, upper } => {
            println!("  {}", muted(&format!("percentile band q{:.0} to q{:.0} of training targets", lower_quantile * 100.0, upper_quantile * 100.0)));
            let (lo, hi) = (lower.to_array(), upper.to_array());
            for (k, name) in TARGET_NAMES.iter().enumerate() {
                println!("  {:<16} {:>10.2} to {:<10.2} {}", name, lo[k], hi[k], dim(TARGET_UNITS[k]));
            }
        }
        QualityPolicy::Floor { floors } => {
            println!("  {}", muted("fixed floors"));
            for (k, (name, floor)) in TARGET_NAMES.iter().zip(floors.to_array()).enumerate() {
                println!("  {:<16} ≥ {:<10.2} {}", name, floor, dim(TARGET_UNITS[k]));
            }
        }
    }
}

fn print_holdout(report: &TrainingReport, show: usize) {
    let holdout = &report.holdout;
    if show == 0 || holdout.is_empty() {
        return;
    }
    section("Held-out: true vs predicted");
    println!(
        "  {:>5}  {:>9} {:>9}  {:>7} {:>7}  {:>7} {:>7}",
        muted("row"), muted("UTS"), muted("pred"), muted("elong"), muted("pred"), muted("cond"), muted("pred")
    );
    println!("  {}", dim(&"─".repeat(58)));
    for i in 0..show.min(holdout.len()) {
        let t = holdout.y_true.row(i);
        let p = holdout.y_pred.row(i);
        println!(
            "  {:>5}  {:>9.2} {:>9.2}  {:>7.2} {:>7.2}  {:>7.2} {:>7.2}",
            holdout.row_indices[i], t[0], p[0], t[1], p[1], t[2], p[2]
        );
    }
    if holdout.len() > show {
        println!("  {}", dim(&format!("… {} more rows", holdout.len() - show)));
    }
}

fn load_context(dir: &Path) -> anyhow::Result<InferenceContext> {
    step_run(&format!("Loading model from {}", dir.display()));
    let start = Instant::now();
    let ctx = InferenceContext::load(dir)?;
    step_done(&format!("{} trees in {:?}", ctx.n_trees(), start.elapsed()));
    Ok(ctx)
}

fn print_prediction(prediction: &Prediction) {
    let values = prediction.targets.rounded(2).to_array();
    for (k, name) in ["UTS", "Elongation", "Conductivity"].iter().enumerate() {
        println!("  {:<16} {} {}", muted(name), format!("{:.2}", values[k]).white().bold(), dim(TARGET_UNITS[k]));
    }
    println!("  {:<16} {}", muted("Quality"), verdict_label(prediction.verdict));
    if !prediction.failing.is_empty() {
        println!("  {:<16} {}", muted("Failing"), bad(&prediction.failing.join(", ")));
    }
    if !prediction.out_of_range.is_empty() {
        println!(
            "  {:<16} {}",
            muted("Note"),
            "outside documented range: ".yellow().to_string() + &prediction.out_of_range.join(", ")
        );
    }
}

fn prompt_sample() -> anyhow::Result<ProcessSample> {
    use dialoguer::Input;

    let theme = theme();
    let mut values = [0.0; N_FEATURES];
    for (slot, spec) in values.iter_mut().zip(FEATURES.iter()) {
        // Re-asks until the entry parses
        let raw: String = Input::with_theme(&theme)
            .with_prompt(spec.prompt())
            .validate_with(|input: &String| spec.parse(input).map(|_| ()).map_err(|e| e.to_string()))
            .interact_text()?;
        *slot = spec.parse(&raw)?;
    }
    Ok(ProcessSample::from_array(values)?)
}

fn read_samples(path: &Path) -> anyhow::Result<Vec<ProcessSample>> {
    let text = std::fs::read_to_string(path)?;
    let body: serde_json::Value = serde_json::from_str(&text)?;
    let samples = match &body {
        serde_json::Value::Array(items) => items
            .iter()
            .map(ProcessSample::from_json)
            .collect::<crate::error::Result<Vec<_>>>()?,
        _ => vec![ProcessSample::from_json(&body)?],
    };
    Ok(samples)
}

pub fn cmd_predict(
    config: &AppConfig,
    model_dir: Option<&Path>,
    input: Option<&Path>,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    section("Predict");
    let ctx = load_context(model_dir.unwrap_or(config.model_dir.as_path()))?;

    let samples = match input {
        Some(path) => read_samples(path)?,
        None => {
            println!();
            vec![prompt_sample()?]
        }
    };

    let predictions = ctx.predict_batch(&samples)?;
    for (i, prediction) in predictions.iter().enumerate() {
        if predictions.len() > 1 {
            section(&format!("Sample {}", i + 1));
        } else {
            println!();
        }
        print_prediction(prediction);
        tracing::info!(
            sample = i,
            uts = prediction.targets.uts,
            elongation = prediction.targets.elongation,
            conductivity = prediction.targets.conductivity,
            quality = %prediction.verdict,
            "Prediction"
        );
    }

    if let Some(path) = output {
        let records: Vec<serde_json::Value> = samples
            .iter()
            .zip(predictions.iter())
            .map(|(sample, prediction)| {
                serde_json::json!({
                    "input": sample,
                    "prediction": prediction.targets.rounded(2),
                    "quality": prediction.verdict,
                    "failing": prediction.failing,
                })
            })
            .collect();
        std::fs::write(path, serde_json::to_string_pretty(&records)?)?;
        println!();
        step_ok(&format!("Predictions → {}", path.display()));
    }

    println!();
    Ok(())
}

pub fn cmd_generate(output: &Path, rows: usize, seed: u64, noise: f64) -> anyhow::Result<()> {
    section("Generate");

    step_run(&format!("Generating {} rows", rows));
    let mut df = WireRodGenerator::new()
        .with_seed(seed)
        .with_noise_scale(noise)
        .generate(rows)?;
    step_done(&format!("seed {}", seed));

    DataSaver::save_csv(&mut df, output)?;
    step_ok(&format!("Dataset → {}", output.display()));
    println!();
    Ok(())
}

pub fn cmd_info(data_path: Option<&Path>, model_dir: Option<&Path>) -> anyhow::Result<()> {
    if data_path.is_none() && model_dir.is_none() {
        anyhow::bail!("nothing to show: pass --data and/or --model");
    }

    if let Some(path) = data_path {
        section("Dataset");
        let df = DataLoader::new().load_csv(path)?;
        println!("  {:<12} {}", muted("File"), path.display());
        println!("  {:<12} {}", muted("Rows"), df.height());
        println!("  {:<12} {}", muted("Columns"), df.width());
        println!();

        let schema = FeatureSchema::default();
        let present: Vec<String> = schema
            .features
            .iter()
            .chain(schema.targets.iter())
            .filter(|name| df.column(name).is_ok())
            .cloned()
            .collect();
        let missing: Vec<&String> = schema
            .features
            .iter()
            .chain(schema.targets.iter())
            .filter(|name| !present.contains(name))
            .collect();

        println!(
            "  {:<26} {:>6} {:>10} {:>10} {:>10} {:>10}",
            muted("Column"), muted("Nulls"), muted("Mean"), muted("Std"), muted("Min"), muted("Max")
        );
        println!("  {}", dim(&"─".repeat(78)));
        let fmt = |v: Option<f64>| v.map(|v| format!("{:.3}", v)).unwrap_or_else(|| "-".to_string());
        for stats in describe(&df, &present)? {
            let in_range = FEATURES
                .iter()
                .find(|f| f.name == stats.name)
                .map(|f| {
                    stats.min.map_or(true, |v| f.in_expected_range(v))
                        && stats.max.map_or(true, |v| f.in_expected_range(v))
                })
                .unwrap_or(true);
            let name = if in_range { stats.name.as_str().normal() } else { stats.name.as_str().yellow() };
            println!(
                "  {:<26} {:>6} {:>10} {:>10} {:>10} {:>10}",
                name,
                stats.null_count,
                fmt(stats.mean),
                fmt(stats.std),
                fmt(stats.min),
                fmt(stats.max)
            );
        }
        if !missing.is_empty() {
            println!();
            println!(
                "  {} {}",
                bad("missing"),
                missing.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", ")
            );
        }
    }

    if let Some(dir) = model_dir {
        section("Model");
        let bundle = ArtifactBundle::load(dir)?;
        let header = bundle.header();
        println!("  {:<16} {}", muted("Artifact"), header.artifact_id);
        println!("  {:<16} {}", muted("Created"), header.created_at.to_rfc3339());
        println!("  {:<16} {}", muted("Format"), header.format_version);
        println!("  {:<16} {}", muted("Trees"), bundle.model.model.n_trees());
        println!("  {:<16} {}", muted("Seed"), bundle.model.training.seed);
        println!("  {:<16} {:.4}", muted("Hold-out MSE"), bundle.model.metrics.mse);
        println!("  {:<16} {:.4}", muted("Hold-out R²"), bundle.model.metrics.r2);
        print_policy(&bundle.model.policy);
    }

    println!();
    Ok(())
}

// ─── Serve ─────────────────────────────────────────────────────────────────────

pub async fn cmd_serve(
    config: &AppConfig,
    model_dir: Option<&Path>,
    host: Option<&str>,
    port: Option<u16>,
) -> anyhow::Result<()> {
    use crate::server::run_server;

    let mut server = config.server.clone();
    if let Some(host) = host {
        server.host = host.to_string();
    }
    if let Some(port) = port {
        server.port = port;
    }

    let ctx = load_context(model_dir.unwrap_or(config.model_dir.as_path()))?;
    let artifact_id = ctx.header().artifact_id.to_string();

    let (h, p) = (&server.host, server.port);
    println!();
    line_box_top();
    line_box_empty();
    line_box_center(&format!("{}", "Wire-Rod Quality Predictor".white().bold()));
    line_box_center(&format!("{}", dim(&format!("v{}", env!("CARGO_PKG_VERSION")))));
    line_box_empty();
    line_box_sep();
    line_box_empty();
    line_box(&kv("Predict", &format!("http://{}:{}/api/predict", h, p)));
    line_box(&kv("Form   ", &format!("http://{}:{}/predict", h, p)));
    line_box(&kv("Health ", &format!("http://{}:{}/api/health", h, p)));
    line_box(&kv("Model  ", &artifact_id));
    line_box_empty();
    line_box_sep();
    line_box_empty();
    line_box_center(&format!("{}", dim("ctrl+c to stop")));
    line_box_empty();
    line_box_bottom();
    println!();

    run_server(server, Arc::new(ctx)).await
}

// ─── Interactive mode ──────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("       {}", "Wire-Rod Quality Predictor".truecolor(120, 170, 255).bold());
    println!("       {}", dim(&format!("aluminium rod properties  ·  v{}", env!("CARGO_PKG_VERSION"))));
    println!();
}

fn show_help() {
    section("Commands");

    let cmds: &[(&str, &str)] = &[
        ("wirerod", "Interactive launcher (default)"),
        ("wirerod generate -o data.csv", "Write a synthetic dataset"),
        ("wirerod train -d data.csv", "Train and save artifacts"),
        ("wirerod predict", "Predict one sample interactively"),
        ("wirerod predict -i samples.json", "Predict samples from JSON"),
        ("wirerod serve -p 3000", "Serve predictions over HTTP"),
        ("wirerod info -d data.csv -m models", "Inspect dataset / artifacts"),
    ];

    for (cmd, desc) in cmds {
        println!("  {:<40} {}", cmd.white(), muted(desc));
    }
    println!();
}

pub async fn cmd_interactive(config: &AppConfig) -> anyhow::Result<()> {
    use dialoguer::Select;

    print_banner();
    let theme = theme();

    loop {
        let items = &[
            "Predict               enter nine process parameters",
            "Start Server          json api on the configured port",
            "Help                  commands",
            "Exit",
        ];

        println!();
        let sel = Select::with_theme(&theme)
            .with_prompt("What would you like to do")
            .items(items)
            .default(0)
            .interact_opt()?;

        match sel {
            Some(0) => {
                if let Err(e) = cmd_predict(config, None, None, None) {
                    println!("  {} {}", bad("error"), e);
                }
            }
            Some(1) => {
                cmd_serve(config, None, None, None).await?;
                break;
            }
            Some(2) => show_help(),
            Some(3) | None => {
                println!();
                println!("  {}", dim("goodbye"));
                println!();
                break;
            }
            _ => {}
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_ansi() {
        let colored = format!("{}", "abc".red());
        assert_eq!(strip_ansi(&colored), "abc");
    }

    #[test]
    fn test_cli_parses_train() {
        let cli = Cli::try_parse_from([
            "wirerod", "train", "-d", "data.csv", "--policy", "floor", "--seed", "7",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Train { data, policy, seed, .. }) => {
                assert_eq!(data, PathBuf::from("data.csv"));
                assert_eq!(policy, Some(PolicyKind::Floor));
                assert_eq!(seed, Some(7));
            }
            _ => panic!("expected train"),
        }
    }

    #[test]
    fn test_read_samples_object_and_array() {
        let dir = tempfile::TempDir::new().unwrap();
        let one = serde_json::json!({
            "chemical_composition": 0.5, "casting_temp": 650, "cooling_water_temp": 20,
            "casting_speed": 25, "entry_temp_rolling_mill": 350, "emulsion_temp": 65,
            "emulsion_pressure": 4.5, "emulsion_concentration": 1.2, "quench_water_pressure": 2
        });

        let single = dir.path().join("one.json");
        std::fs::write(&single, one.to_string()).unwrap();
        assert_eq!(read_samples(&single).unwrap().len(), 1);

        let many = dir.path().join("many.json");
        std::fs::write(&many, serde_json::json!([one.clone(), one]).to_string()).unwrap();
        assert_eq!(read_samples(&many).unwrap().len(), 2);
    }
}
