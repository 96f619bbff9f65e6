use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "architect",
    version,
    about = "Architect - turn project requirements into a generated codebase",
    long_about = "Architect asks a panel of simulated specialists for their vision of a project, merges them into one design with a dependency graph, and synthesizes every file in dependency order."
)]
pub struct Cli {
    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file (default: <state-dir>/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory holding run state
    #[arg(long, global = true)]
    pub state_dir: Option<PathBuf>,

    /// Override the configured Claude model
    #[arg(long, global = true)]
    pub model: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show which specialists the requirements call for
    #[command(about = "Show the specialist roles selected for the requirements")]
    Roles(RequirementArgs),

    /// Start a new run and produce specialist visions
    #[command(about = "Start a run: collect requirements and run Stage1 (specialist visions)")]
    Start(RequirementArgs),

    /// Run the next stage
    #[command(about = "Run the next stage of the saved run")]
    Advance,

    /// Retry the stage that failed
    #[command(about = "Retry the stage after the last completed one")]
    Retry,

    /// Run every stage and export the result
    #[command(about = "Run all three stages and export the generated files")]
    Run(RunArgs),

    /// Show the saved run
    #[command(about = "Show phase, progress and last error of the saved run")]
    Status,

    /// Write generated files to disk
    #[command(about = "Write the synthesized files of the saved run to disk")]
    Export(ExportArgs),

    /// Discard the saved run
    #[command(about = "Discard the saved run and all of its outputs")]
    Reset,

    /// Extract the JSON object from a model response
    #[command(about = "Run the response extractor on a file and print the JSON")]
    Extract(ExtractArgs),
}

#[derive(Args, Debug, Clone)]
pub struct RequirementArgs {
    /// Project requirements, one per argument
    pub requirements: Vec<String>,

    /// Read requirements from a file, one per line
    #[arg(short, long)]
    pub file: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub input: RequirementArgs,

    /// Output directory (default from config)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Overwrite existing files when exporting
    #[arg(long)]
    pub force: bool,
}

#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Output directory (default from config)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Overwrite existing files
    #[arg(long)]
    pub force: bool,
}

#[derive(Args, Debug)]
pub struct ExtractArgs {
    /// File containing raw model output
    pub file: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_start_with_globals() {
        let cli = Cli::try_parse_from([
            "architect",
            "-vv",
            "--state-dir",
            "/tmp/state",
            "start",
            "Build a todo app",
            "Use Postgres",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.state_dir, Some(PathBuf::from("/tmp/state")));
        match cli.command {
            Commands::Start(args) => {
                assert_eq!(args.requirements, vec!["Build a todo app", "Use Postgres"]);
                assert!(args.file.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_run_and_export() {
        let cli = Cli::try_parse_from(["architect", "run", "-f", "reqs.txt", "-o", "out", "--force"]).unwrap();
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.input.file, Some(PathBuf::from("reqs.txt")));
                assert_eq!(args.output, Some(PathBuf::from("out")));
                assert!(args.force);
            }
            other => panic!("unexpected command {other:?}"),
        }

        let cli = Cli::try_parse_from(["architect", "export", "--model", "claude-x"]).unwrap();
        assert_eq!(cli.model.as_deref(), Some("claude-x"));
        assert!(matches!(cli.command, Commands::Export(ExportArgs { force: false, .. })));
    }

    #[test]
    fn test_extract_requires_file() {
        assert!(Cli::try_parse_from(["architect", "extract"]).is_err());
    }
}
