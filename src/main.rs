//! `pagination-sampler [--json] [run|sample|report] [config-path]`
//!
//! - `run` (default): take the configured samples, then print the report
//! - `sample`: only take samples
//! - `report`: only compare what is already in the target directory
//!
//! `--json` prints the report as JSON instead of tables.

use anyhow::{Context, Result, anyhow, bail};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};

use pagination_sampler::application::{SamplingUseCases, compare_directory};
use pagination_sampler::comparison::{render, render_json};
use pagination_sampler::infrastructure::logging::init_logging;
use pagination_sampler::sampling::{SamplingSummary, TracingObserver};
use pagination_sampler::SamplerConfig;

const DEFAULT_CONFIG_PATH: &str = "config/sampler";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Run,
    Sample,
    Report,
}

impl FromStr for Mode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "run" => Ok(Self::Run),
            "sample" => Ok(Self::Sample),
            "report" => Ok(Self::Report),
            other => Err(anyhow!(
                "Unknown mode '{}', expected one of: run, sample, report",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliArgs {
    mode: Mode,
    config_path: String,
    json: bool,
}

impl CliArgs {
    fn parse(args: impl IntoIterator<Item = String>) -> Result<Self> {
        let mut json = false;
        let mut positional = Vec::new();
        for arg in args {
            if arg == "--json" {
                json = true;
            } else if arg.starts_with("--") {
                bail!("Unknown flag '{}'", arg);
            } else {
                positional.push(arg);
            }
        }

        let mut positional = positional.into_iter();
        let mode = match positional.next() {
            Some(arg) => arg.parse()?,
            None => Mode::Run,
        };
        let config_path = positional
            .next()
            .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
        if let Some(extra) = positional.next() {
            bail!("Unexpected argument '{}'", extra);
        }
        Ok(Self {
            mode,
            config_path,
            json,
        })
    }
}

fn main() -> Result<()> {
    let args = CliArgs::parse(std::env::args().skip(1))?;

    let config = SamplerConfig::from_file(&args.config_path)
        .with_context(|| format!("Failed to load configuration from '{}'", args.config_path))?;
    init_logging(&config.logging, &config.sampling.target_dir)?;
    info!("🚀 pagination-sampler {} ({:?})", env!("CARGO_PKG_VERSION"), args.mode);

    if matches!(args.mode, Mode::Run | Mode::Sample) {
        let summary = sample(&config)?;
        log_summary(&summary);
    }

    if matches!(args.mode, Mode::Run | Mode::Report) {
        report(&config, args.json)?;
    }
    Ok(())
}

/// Samples on a dedicated runtime with one worker thread per sampling thread.
/// Abandoned tasks are left behind with that runtime.
fn sample(config: &SamplerConfig) -> Result<SamplingSummary> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.sampling.threads)
        .thread_name("sampler-worker")
        .enable_all()
        .build()
        .context("Failed to build sampling runtime")?;

    let use_cases = SamplingUseCases::new(config.clone(), Arc::new(TracingObserver));
    let summary = runtime.block_on(use_cases.run_sampling());
    runtime.shutdown_background();
    summary
}

fn report(config: &SamplerConfig, json: bool) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build report runtime")?;
    let report = runtime.block_on(compare_directory(&config.sampling.target_dir))?;

    if !report.corrupt().is_empty() {
        warn!("⚠️ {} corrupted artifacts were skipped", report.corrupt().len());
    }
    info!(
        "📊 {} samples in {} fingerprint groups",
        report.sample_count(),
        report.groups().len()
    );
    if json {
        let rendered = render_json(&report).context("Failed to serialize report")?;
        println!("{rendered}");
    } else {
        print!("{}", render(&report));
    }
    Ok(())
}

fn log_summary(summary: &SamplingSummary) {
    info!(
        "✅ {} samples persisted ({} distinct fingerprints)",
        summary.persisted.len(),
        summary.distinct_fingerprints()
    );
    for (sample_id, error) in &summary.failed {
        warn!("❌ Sample {} excluded: {}", sample_id, error);
    }
    if summary.abandoned > 0 {
        warn!(
            "⏰ {} samples did not finish within the wait timeout",
            summary.abandoned
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_modes() {
        assert_eq!("run".parse::<Mode>().unwrap(), Mode::Run);
        assert_eq!("sample".parse::<Mode>().unwrap(), Mode::Sample);
        assert_eq!("report".parse::<Mode>().unwrap(), Mode::Report);
        assert!("compare".parse::<Mode>().is_err());
    }

    fn parse(args: &[&str]) -> Result<CliArgs> {
        CliArgs::parse(args.iter().map(ToString::to_string))
    }

    #[test]
    fn defaults_to_run_with_tables() {
        let args = parse(&[]).unwrap();
        assert_eq!(args.mode, Mode::Run);
        assert_eq!(args.config_path, DEFAULT_CONFIG_PATH);
        assert!(!args.json);
    }

    #[test]
    fn json_flag_is_accepted_anywhere() {
        let args = parse(&["report", "--json", "conf/prod"]).unwrap();
        assert_eq!(args.mode, Mode::Report);
        assert_eq!(args.config_path, "conf/prod");
        assert!(args.json);
        assert!(parse(&["--json"]).unwrap().json);
    }

    #[test]
    fn rejects_unknown_flags_and_extra_arguments() {
        assert!(parse(&["--yaml"]).is_err());
        assert!(parse(&["run", "a", "b"]).is_err());
    }
}
