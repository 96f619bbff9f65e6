use anyhow::Result;
use clap::Parser;
use tracing::debug;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod cli;
use cli::commands::{self, load_architect};
use cli::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(dispatch(cli))
}

async fn dispatch(cli: Cli) -> Result<()> {
    debug!("Command: {:?}", cli.command);

    // These two never touch configuration or run state
    match cli.command {
        Commands::Roles(args) => return commands::roles::execute(args).await,
        Commands::Extract(args) => return commands::extract::execute(args).await,
        _ => {}
    }

    let architect = load_architect(&cli)?;
    match cli.command {
        Commands::Start(args) => commands::pipeline::start(&architect, args).await,
        Commands::Advance => commands::pipeline::advance(&architect).await,
        Commands::Retry => commands::pipeline::retry(&architect).await,
        Commands::Run(args) => commands::pipeline::run(&architect, args).await,
        Commands::Status => commands::pipeline::status(&architect).await,
        Commands::Export(args) => commands::export::execute(&architect, args).await,
        Commands::Reset => commands::pipeline::reset(&architect).await,
        Commands::Roles(_) | Commands::Extract(_) => Ok(()),
    }
}
