use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "valuetrace")]
#[command(about = "Tracks where values come from and whether disposable members are released", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Report creation, provenance and disposal for every disposable member
    Analyze {
        /// Files or directories to analyze
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Configuration file (defaults to the nearest .valuetrace.toml)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Disable colored output
        #[arg(long)]
        plain: bool,

        /// Worker threads for parsing and analysis (0 = all cores)
        #[arg(short = 'j', long, default_value = "0")]
        jobs: usize,

        /// Increase log verbosity (-v: debug, -vv: trace)
        #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
        verbosity: u8,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analyze_defaults() {
        let cli = Cli::try_parse_from(["valuetrace", "analyze", "src"]).unwrap();
        let Commands::Analyze {
            paths,
            format,
            config,
            verbosity,
            ..
        } = cli.command;
        assert_eq!(paths, vec![PathBuf::from("src")]);
        assert_eq!(format, OutputFormat::Text);
        assert!(config.is_none());
        assert_eq!(verbosity, 0);
    }

    #[test]
    fn analyze_requires_a_path() {
        assert!(Cli::try_parse_from(["valuetrace", "analyze"]).is_err());
    }

    #[test]
    fn repeated_verbose_counts() {
        let cli = Cli::try_parse_from(["valuetrace", "analyze", "-vv", "--format", "json", "a", "b"]).unwrap();
        let Commands::Analyze {
            paths,
            format,
            verbosity,
            ..
        } = cli.command;
        assert_eq!(paths.len(), 2);
        assert_eq!(format, OutputFormat::Json);
        assert_eq!(verbosity, 2);
    }
}
