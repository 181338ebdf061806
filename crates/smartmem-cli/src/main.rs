use std::process::ExitCode;
use std::time::Duration;

use clap::{CommandFactory, Parser};
use smartmem_cli::handlers;
use smartmem_cli::{Cli, CliConfig, CliError, Commands, bootstrap};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Load environment variables before clap reads its `env` fallbacks
    dotenvy::dotenv().ok();

    let mut cli = Cli::parse();
    init_tracing(cli.verbose);

    let Some(command) = cli.command.take() else {
        Cli::command().print_help()?;
        return Ok(ExitCode::SUCCESS);
    };

    let code = match run(&cli, command).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{e}");
            e.exit_code()
        }
    };
    Ok(ExitCode::from(u8::try_from(code).unwrap_or(1)))
}

/// Logs go to stderr so stdout stays parseable (`status --json`).
fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: &Cli, command: Commands) -> Result<i32, CliError> {
    // These two never need a supervisor.
    let command = match command {
        Commands::Watchdog(args) => {
            handlers::watchdog::execute(args).await?;
            return Ok(0);
        }
        Commands::Paths => {
            handlers::paths::execute(&CliConfig::from_cli(cli).locator)?;
            return Ok(0);
        }
        other => other,
    };

    let mut config = CliConfig::from_cli(cli);
    if matches!(command, Commands::Monitor { .. }) && config.parent_pid.is_none() {
        // Tie the server to this process so a hard kill of the monitor
        // still takes the server down.
        config.parent_pid = Some(std::process::id());
    }
    let ctx = bootstrap(config)?;

    match command {
        Commands::Start => handlers::start::execute(&ctx).await?,
        Commands::Stop => handlers::stop::execute(&ctx).await?,
        Commands::Restart => handlers::restart::execute(&ctx).await?,
        Commands::Status { json } => return handlers::status::execute(&ctx, json).await,
        Commands::Monitor { interval } => {
            handlers::monitor::execute(&ctx, Duration::from_secs(interval.max(1))).await?;
        }
        Commands::Paths | Commands::Watchdog(_) => {}
    }
    Ok(0)
}
