//! Fleet acceptance runner
//!
//! Exit codes: 0 all steps passed, 1 some step failed, 2 the harness itself
//! could not run (bad config, unknown suite, Playwright missing).

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use fleet_acceptance::config::DEFAULT_CONFIG_PATH;
use fleet_acceptance::{
    catalog, preflight, Browser, PlaywrightDriver, RunConfig, ScenarioRunner, SuiteDefinition,
};

const HARNESS_ERROR: i32 = 2;

#[derive(Parser)]
#[command(name = "fleet-acceptance")]
#[command(about = "Browser acceptance checks for the fleet admin dashboard and pilot portal")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Base URL of the application under test
    #[arg(long)]
    base_url: Option<String>,

    /// Suite to run (repeatable); defaults to every known suite
    #[arg(short, long = "suite")]
    suites: Vec<String>,

    /// Directory of extra YAML suites
    #[arg(long)]
    suites_dir: Option<PathBuf>,

    /// Output directory for screenshots and the JSON report
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Browser engine
    #[arg(long, value_enum)]
    browser: Option<Browser>,

    /// Show the browser window
    #[arg(long)]
    headed: bool,

    /// Seconds to keep the browser open after the run
    #[arg(long)]
    keep_open: Option<u64>,

    /// Do not probe the target before launching the browser
    #[arg(long)]
    skip_preflight: bool,

    /// List available suites and exit
    #[arg(long)]
    list: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            HARNESS_ERROR
        }
    };
    std::process::exit(code);
}

async fn run(cli: Cli) -> Result<i32> {
    let mut config = RunConfig::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    config.apply_env();
    apply_cli(&mut config, &cli);
    config.validate().context("invalid configuration")?;

    let mut available = catalog::builtin();
    if let Some(dir) = &cli.suites_dir {
        let extra = SuiteDefinition::load_all(dir)
            .with_context(|| format!("loading suites from {}", dir.display()))?;
        info!("Loaded {} suite(s) from {}", extra.len(), dir.display());
        for suite in extra {
            available.retain(|existing| existing.name != suite.name);
            available.push(suite);
        }
    }

    if cli.list {
        for suite in &available {
            let role = suite.role.map(|r| r.to_string()).unwrap_or_else(|| "anonymous".into());
            println!("{:<22} {:<10} {:>2} steps  {}", suite.name, role, suite.steps.len(), suite.description);
        }
        return Ok(0);
    }

    let requested = if cli.suites.is_empty() {
        config.suites.clone()
    } else {
        cli.suites.clone()
    };
    let selected = select_suites(&available, &requested)?;

    info!("Fleet acceptance v{}", env!("CARGO_PKG_VERSION"));
    info!("Target: {}", config.base_url);
    info!("Output: {}", config.output_dir.display());

    if cli.skip_preflight {
        info!("Preflight skipped");
    } else if let Err(e) = preflight::wait_for_target(
        &config.base_url,
        Duration::from_secs(config.timing.preflight_timeout_secs),
    )
    .await
    {
        warn!("{}; continuing, steps will report the failures", e);
    }

    let driver = PlaywrightDriver::launch(&config.browser, &config.base_url, &config.timing)
        .await
        .context("starting browser")?;

    let runner = ScenarioRunner::new(driver, &config);
    let report = runner.run(&selected).await;

    println!("{}", report.summarize());
    match report.write_json(&config.output_dir) {
        Ok(path) => info!("Report written to {}", path.display()),
        Err(e) => warn!("Could not write report: {}", e),
    }

    Ok(report.exit_code())
}

fn apply_cli(config: &mut RunConfig, cli: &Cli) {
    if let Some(url) = &cli.base_url {
        config.base_url = url.clone();
    }
    if let Some(output) = &cli.output {
        config.output_dir = output.clone();
    }
    if let Some(browser) = cli.browser {
        config.browser.kind = browser;
    }
    if cli.headed {
        config.browser.headless = false;
    }
    if let Some(secs) = cli.keep_open {
        config.timing.keep_open_secs = secs;
    }
}

/// Resolve suite names in the requested order; no names means every suite
fn select_suites(available: &[SuiteDefinition], names: &[String]) -> Result<Vec<SuiteDefinition>> {
    if names.is_empty() {
        return Ok(available.to_vec());
    }
    let mut selected = Vec::with_capacity(names.len());
    for name in names {
        match available.iter().find(|suite| &suite.name == name) {
            Some(suite) => selected.push(suite.clone()),
            None => {
                let known: Vec<_> = available.iter().map(|s| s.name.as_str()).collect();
                bail!("unknown suite '{}' (available: {})", name, known.join(", "));
            }
        }
    }
    Ok(selected)
}
