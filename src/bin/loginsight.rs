use anyhow::{bail, Context as _};
use chrono::Utc;
use clap::{Parser, Subcommand};
use loginsight::analysis::{BatchClassifier, LogAnalyzer};
use loginsight::backend::HttpBackend;
use loginsight::chunker::{Chunker, LogBatch};
use loginsight::config::{Config, API_KEY_ENV};
use loginsight::evaluation::{EvaluationReport, Evaluator, GroundTruthSet};
use loginsight::sample::{label_ground_truth, LogGenerator};
use loginsight::stream::StreamMonitor;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "loginsight", version, about = "AI-powered log classification and evaluation")]
struct Cli {
    /// TOML config file
    #[arg(long = "config", global = true)]
    config: Option<PathBuf>,

    /// API key for the classification backend (overrides config and OPENAI_API_KEY)
    #[arg(long = "api-key", global = true)]
    api_key: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Classify a log file batch by batch and write the aggregated results as JSON
    Analyze {
        log_file: PathBuf,
        #[arg(long = "chunk-size")] chunk_size: Option<usize>,
        #[arg(long = "output", short = 'o', default_value = "analysis_results.json")] output: PathBuf,
    },
    /// Follow a growing log file until Ctrl-C
    Monitor {
        log_file: PathBuf,
        #[arg(long = "buffer-size")] buffer_size: Option<usize>,
    },
    /// Score the classifier on generated, heuristically labeled logs
    Evaluate {
        #[arg(long = "entries", default_value_t = 20)] entries: usize,
        #[arg(long = "seed", default_value_t = 42)] seed: u64,
        #[arg(long = "output", short = 'o', default_value = "evaluation_results.json")] output: PathBuf,
    },
    /// Write generated sample logs
    Generate {
        #[arg(long = "entries", default_value_t = 100)] entries: usize,
        #[arg(long = "seed", default_value_t = 42)] seed: u64,
        #[arg(long = "output", short = 'o', default_value = "sample_logs.txt")] output: PathBuf,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn build_analyzer(config: &Config) -> anyhow::Result<LogAnalyzer<HttpBackend>> {
    let backend = HttpBackend::new(config.backend.clone())?;
    if !backend.has_api_key() {
        bail!("API key is required: set {API_KEY_ENV}, use --api-key, or set backend.api_key in the config");
    }
    Ok(LogAnalyzer::new(backend).with_temperature(config.backend.temperature))
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let mut config = Config::load_or_default(cli.config.as_deref())?;
    if let Some(key) = cli.api_key {
        config.backend.api_key = Some(key);
    }

    match cli.command {
        Command::Analyze { log_file, chunk_size, output } => {
            let chunker = Chunker::new(chunk_size.unwrap_or(config.analysis.chunk_size));
            let mut analyzer = build_analyzer(&config)?;
            info!(file = %log_file.display(), chunk_size = chunker.chunk_size(), "analyzing log file");
            let chunks = chunker
                .chunk_file(&log_file)
                .with_context(|| format!("failed to open {}", log_file.display()))?;
            for batch in chunks {
                let batch = batch.with_context(|| format!("failed to read {}", log_file.display()))?;
                analyzer.analyze(&batch);
            }
            let snapshot = analyzer.snapshot();
            std::fs::write(&output, serde_json::to_string_pretty(&snapshot)?)
                .with_context(|| format!("failed to write {}", output.display()))?;
            if let Some(perf) = analyzer.performance() {
                info!(
                    total = perf.total_analyses,
                    success_rate = perf.success_rate,
                    avg_response_time = perf.avg_response_time,
                    "analysis complete"
                );
            }
            println!("Results saved to {}", output.display());
        }
        Command::Monitor { log_file, buffer_size } => {
            if !log_file.exists() {
                std::fs::File::create(&log_file)
                    .with_context(|| format!("failed to create {}", log_file.display()))?;
            }
            let analyzer = build_analyzer(&config)?;
            let mut monitor = StreamMonitor::new(
                log_file.clone(),
                analyzer,
                buffer_size.unwrap_or(config.stream.buffer_size),
            )
            .with_poll_interval(Duration::from_millis(config.stream.poll_interval_ms));

            let stop = Arc::new(AtomicBool::new(false));
            {
                let s = stop.clone();
                let _ = ctrlc::set_handler(move || { s.store(true, Ordering::SeqCst); });
            }
            eprintln!("Monitoring {} - press Ctrl+C to stop", log_file.display());
            let summary = monitor.run(&stop)?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::Evaluate { entries, seed, output } => {
            let mut analyzer = build_analyzer(&config)?;
            let logs = LogGenerator::new(seed).generate(entries, Utc::now(), 60, true);
            let mut truth = GroundTruthSet::new();
            let batches: Vec<LogBatch> = logs
                .iter()
                .filter_map(|l| LogBatch::new(vec![l.clone()]))
                .collect();
            for batch in &batches {
                truth.insert(batch, label_ground_truth(&batch.content()));
            }
            info!(batches = batches.len(), "running evaluation");

            let mut evaluator = Evaluator::new();
            let metrics = evaluator.evaluate(&mut analyzer, &batches, &truth);

            println!("Overall Accuracy: {:.2}%", metrics.accuracy * 100.0);
            println!("Average Response Time: {:.3}s", metrics.avg_response_time);
            println!("Error Rate: {:.2}%", metrics.error_rate * 100.0);
            println!("Hallucination Rate: {:.2}%", metrics.hallucination_rate * 100.0);
            for cat in &metrics.categories {
                println!(
                    "{:<12} precision {:>6.2}%  recall {:>6.2}%  f1 {:>6.2}%",
                    cat,
                    metrics.precision.get(cat).copied().unwrap_or(0.0) * 100.0,
                    metrics.recall.get(cat).copied().unwrap_or(0.0) * 100.0,
                    metrics.f1_score.get(cat).copied().unwrap_or(0.0) * 100.0,
                );
            }

            EvaluationReport::new(&metrics, batches.len()).write_to(&output)?;
            println!("Results saved to {}", output.display());
        }
        Command::Generate { entries, seed, output } => {
            let logs = LogGenerator::new(seed).generate(entries, Utc::now(), 60, true);
            let mut content = logs.join("\n");
            content.push('\n');
            std::fs::write(&output, content)
                .with_context(|| format!("failed to write {}", output.display()))?;
            println!("Wrote {} lines to {}", logs.len(), output.display());
        }
    }
    Ok(())
}
