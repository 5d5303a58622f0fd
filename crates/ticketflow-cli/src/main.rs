//! Ticketflow CLI: end-to-end scenarios for the ticketing site
//!
//! ## Usage
//!
//! ```bash
//! ticketflow run                          # Run every scenario headless
//! ticketflow run events --headed          # One scenario, visible browser
//! ticketflow --config ci.yaml config      # Print the resolved configuration
//! ticketflow list                         # Show scenario names
//! ```

use clap::Parser;
use std::path::Path;
use std::process::ExitCode;
use ticketflow::logging::init_tracing;
use ticketflow_cli::{
    load_harness_config, Cli, CliConfig, CliResult, Commands, ConfigArgs, ReportPrinter, RunArgs,
    ScenarioName, ScenarioSettings, Verbosity,
};

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> CliResult<()> {
    let cli = Cli::parse();
    let config = CliConfig::new()
        .with_verbosity(Verbosity::from_flags(cli.quiet, cli.verbose))
        .with_color(cli.color.into());

    match cli.command {
        Commands::Run(args) => run_scenarios(&config, cli.config.as_deref(), args),
        Commands::List => {
            run_list();
            Ok(())
        }
        Commands::Config(args) => run_config(cli.config.as_deref(), &args),
    }
}

fn run_list() {
    for name in ScenarioName::ALL {
        println!("{:<16} {}", name.as_str(), name.description());
    }
}

fn run_config(path: Option<&Path>, args: &ConfigArgs) -> CliResult<()> {
    let harness = load_harness_config(path)?;
    harness.validate()?;
    if !args.check {
        print!("{}", harness.to_yaml()?);
    }
    Ok(())
}

fn run_scenarios(config: &CliConfig, path: Option<&Path>, args: RunArgs) -> CliResult<()> {
    let mut harness = load_harness_config(path)?;
    if args.headed {
        harness.headless = false;
    }
    if let Some(url) = args.base_url {
        harness.base_url = url;
    }
    if let Some(dir) = args.artifacts {
        harness.artifacts_dir = dir;
    }
    harness.validate()?;
    init_tracing(&config.verbosity.log_filter(&harness.log_filter), harness.log_format)?;

    let names = if args.scenarios.is_empty() {
        ScenarioName::ALL.to_vec()
    } else {
        args.scenarios
    };
    let settings = ScenarioSettings {
        config: harness,
        city: args.city,
        mobile: args.mobile,
    };
    let printer = ReportPrinter::new(config);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(execute(&names, &settings, &printer, args.fail_fast))
}

#[cfg(feature = "browser")]
async fn execute(
    names: &[ScenarioName],
    settings: &ScenarioSettings,
    printer: &ReportPrinter,
    fail_fast: bool,
) -> CliResult<()> {
    use ticketflow::{ChromiumFactory, ScenarioRunner};

    let factory = ChromiumFactory::from_config(&settings.config)?;
    let runner = ScenarioRunner::new(factory, settings.config.artifacts_dir.clone());
    ticketflow_cli::run_all(&runner, names, settings, printer, fail_fast).await
}

#[cfg(not(feature = "browser"))]
async fn execute(
    _names: &[ScenarioName],
    _settings: &ScenarioSettings,
    _printer: &ReportPrinter,
    _fail_fast: bool,
) -> CliResult<()> {
    Err(ticketflow_cli::CliError::unsupported(
        "browser support not compiled in. Rebuild with --features browser",
    ))
}
