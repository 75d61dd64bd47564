use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "totesys", about = "Totesys warehouse ETL pipeline", version)]
pub struct Cli {
    /// Path to the pipeline configuration file.
    #[arg(short = 'c', long, default_value = "totesys.yaml")]
    pub config_path: PathBuf,

    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commands {
    /// Pull rows changed since the last run into the extract area.
    Extract,
    /// Derive the star schema and write parquet snapshots.
    Transform,
    /// Append the latest snapshots into the warehouse.
    Load,
    /// Run extract, transform and load back to back.
    Run,
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[test]
    fn subcommands_parse() {
        let cli = Cli::try_parse_from(["totesys", "extract"]).unwrap();
        assert_eq!(cli.cmd, Commands::Extract);
        assert_eq!(cli.config_path.to_str(), Some("totesys.yaml"));

        let cli = Cli::try_parse_from(["totesys", "-c", "prod.yaml", "run"]).unwrap();
        assert_eq!(cli.cmd, Commands::Run);
        assert_eq!(cli.config_path.to_str(), Some("prod.yaml"));
    }

    #[test]
    fn missing_subcommand_is_an_error() {
        assert!(Cli::try_parse_from(["totesys"]).is_err());
    }
}
