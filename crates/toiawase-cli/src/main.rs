//! toiawase binary: batch inquiry-form submission from the command line.

mod inputs;
mod logging;
mod report;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use toiawase_browser::{BrowserEngine, LaunchOptions};
use toiawase_core::{AppConfig, KeywordTable};
use toiawase_engine::{HttpOcrClient, NullOcr, OcrClient, Runner, RunnerConfig};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "toiawase")]
#[command(about = "Finds inquiry forms on company sites, fills them from a profile, and submits them")]
#[command(version)]
struct Args {
    /// Target list: CSV with company/URL columns, or a JSON array
    #[arg(short, long)]
    targets: Option<PathBuf>,

    /// Sender profile JSON
    #[arg(short, long)]
    profile: Option<PathBuf>,

    /// Keyword table TOML overriding the built-in vocabulary
    #[arg(long)]
    keywords: Option<PathBuf>,

    /// Directory for the JSON run report (defaults to the data dir)
    #[arg(long)]
    report_dir: Option<PathBuf>,

    /// Run with a visible browser window
    #[arg(long)]
    headed: bool,

    /// Pause for manual challenge resolution (implies --headed)
    #[arg(long)]
    attended: bool,

    /// Process only the first N targets
    #[arg(long, value_name = "N")]
    limit: Option<usize>,

    /// Write a default configuration file and exit
    #[arg(long)]
    init: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.init {
        AppConfig::default()
            .save()
            .context("failed to write the default configuration")?;
        let path = AppConfig::config_path().context("failed to resolve the configuration path")?;
        println!("Wrote default configuration to {}", path.display());
        return Ok(());
    }

    let data_dir = AppConfig::data_dir().context("failed to resolve the data directory")?;
    let (log_path, _log_guard) = logging::init(&data_dir.join("logs"))?;

    let mut config = AppConfig::load_with_env().context("failed to load configuration")?;
    if args.headed {
        config.browser.headless = false;
    }
    if args.attended {
        config.run.attended = true;
        // Manual resolution needs a window the operator can reach.
        config.browser.headless = false;
    }
    if let Some(dir) = args.report_dir {
        config.run.report_dir = Some(dir);
    }

    let table = KeywordTable::load_or_builtin(
        args.keywords
            .as_deref()
            .or(config.keywords.table_path.as_deref()),
    )
    .context("failed to load the keyword table")?;

    let targets_path = args
        .targets
        .context("--targets is required (unless --init)")?;
    let profile_path = args
        .profile
        .context("--profile is required (unless --init)")?;
    let mut targets = inputs::load_targets(&targets_path)?;
    if let Some(limit) = args.limit {
        targets.truncate(limit);
    }
    let profile = inputs::load_profile(&profile_path)?;
    info!(
        targets = targets.len(),
        attended = config.run.attended,
        log = %log_path.display(),
        "Starting toiawase v{}",
        env!("CARGO_PKG_VERSION")
    );

    let options = LaunchOptions {
        headless: config.browser.headless,
        window_width: config.browser.window_width,
        window_height: config.browser.window_height,
        navigation_timeout: Duration::from_secs(config.browser.navigation_timeout_secs),
        settle_delay: Duration::from_millis(config.run.settle_delay_ms),
    };
    let mut engine = BrowserEngine::launch(options)
        .await
        .context("failed to launch the browser")?;

    let ocr: Box<dyn OcrClient> = if config.ocr.enabled {
        let client = HttpOcrClient::new(
            config.ocr.endpoint.clone(),
            Duration::from_secs(config.ocr.timeout_secs),
        )
        .context("failed to build the OCR client")?;
        Box::new(client)
    } else {
        Box::new(NullOcr)
    };

    let runner = Runner::new(table, RunnerConfig::from(&config.run), ocr);
    let summary = runner.run_batch(&engine, &targets, &profile).await?;

    if let Err(err) = engine.close().await {
        warn!(error = %err, "Browser close failed");
    }

    let report_dir = config
        .run
        .report_dir
        .clone()
        .unwrap_or_else(|| data_dir.join("reports"));
    let report_path = report::write_report(&summary, &report_dir)?;

    report::print_summary(&summary);
    println!("Report: {}", report_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_args_parse_run_flags() {
        let args = Args::parse_from([
            "toiawase",
            "--targets",
            "targets.csv",
            "--profile",
            "profile.json",
            "--attended",
            "--limit",
            "5",
        ]);
        assert!(args.attended);
        assert!(!args.headed);
        assert_eq!(args.limit, Some(5));
        assert_eq!(
            args.targets.as_deref(),
            Some(std::path::Path::new("targets.csv"))
        );
    }
}
