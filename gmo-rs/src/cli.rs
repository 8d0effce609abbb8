//! Root CLI structure for gmo

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "gmo")]
#[command(about = "Inspect and import PSP GMO/GMS model files", long_about = None)]
#[command(version)]
#[command(author)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Verbosity level (can be repeated for more detail)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

impl Cli {
    /// Log filter derived from `-v`/`-q`
    pub fn log_filter(&self) -> &'static str {
        match (self.verbose, self.quiet) {
            (0, true) => "error",
            (0, false) => "warn",
            (1, _) => "info",
            (2, _) => "debug",
            _ => "trace",
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(flatten)]
    Model(crate::commands::gmo::GmoCommands),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_log_filter() {
        let cli = Cli::parse_from(["gmo", "-vv", "info", "model.gmo"]);
        assert_eq!(cli.log_filter(), "debug");
        let cli = Cli::parse_from(["gmo", "info", "model.gmo", "--quiet"]);
        assert_eq!(cli.log_filter(), "error");
    }
}
