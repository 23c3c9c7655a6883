//! Command-line interface definitions

pub mod commands;
pub mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::forecast::MonthWindow;

#[derive(Debug, Parser)]
#[command(
    name = "stockcast",
    version,
    about = "Import stock-on-hand and forecast spreadsheets, and view forecasts by month"
)]
pub struct Cli {
    /// Config file (defaults to <config dir>/stockcast/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable coloured output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Show the detected header row, month columns and sample rows of a file
    Analyze(AnalyzeArgs),
    /// Stock-on-hand snapshots
    Soh {
        #[command(subcommand)]
        command: SohCommands,
    },
    /// Monthly demand forecasts
    Forecast {
        #[command(subcommand)]
        command: ForecastCommands,
    },
}

#[derive(Debug, clap::Args)]
pub struct AnalyzeArgs {
    /// Spreadsheet to inspect (.xlsx, .xls or .csv)
    pub file: PathBuf,

    /// Print JSON instead of a summary
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, clap::Args)]
pub struct ImportArgs {
    /// Spreadsheet to import (.xlsx, .xls or .csv)
    pub file: PathBuf,

    /// Header label to import; repeat for several (default: every column)
    #[arg(short, long = "column", value_name = "LABEL")]
    pub columns: Vec<String>,

    /// Validate and report without touching the database
    #[arg(long)]
    pub dry_run: bool,

    /// Print the import report as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Subcommand)]
pub enum SohCommands {
    /// Import a stock-on-hand spreadsheet
    Import {
        #[command(flatten)]
        args: ImportArgs,

        /// Clear existing stock-on-hand records first
        #[arg(long)]
        replace: bool,
    },
    /// List stock-on-hand records
    List {
        #[arg(long)]
        json: bool,
    },
    /// Record count and latest import
    Summary {
        #[arg(long)]
        json: bool,
    },
    /// Delete every stock-on-hand record
    Clear {
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Debug, Subcommand)]
pub enum ForecastCommands {
    /// Import a forecast spreadsheet with Mon-YY month columns
    Import {
        #[command(flatten)]
        args: ImportArgs,

        /// Keep forecast quantities not present in this file
        #[arg(long)]
        keep_existing: bool,
    },
    /// Show forecasts as a table with one column per month
    Show {
        /// "all" or the number of months starting with the current one
        #[arg(short, long, default_value = "all")]
        months: MonthWindow,

        /// Only products whose description contains this text
        #[arg(short, long)]
        search: Option<String>,

        #[arg(long)]
        json: bool,

        /// Also write the table to a .xlsx or .csv file
        #[arg(long, value_name = "PATH")]
        export: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_soh_import() {
        let cli = Cli::parse_from([
            "stockcast", "soh", "import", "stock.xlsx", "-c", "Product ID", "--column",
            "Stock On Hand", "--replace",
        ]);
        match cli.command {
            Commands::Soh {
                command: SohCommands::Import { args, replace },
            } => {
                assert_eq!(args.file, PathBuf::from("stock.xlsx"));
                assert_eq!(args.columns, vec!["Product ID", "Stock On Hand"]);
                assert!(replace);
                assert!(!args.dry_run);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_forecast_show() {
        let cli = Cli::parse_from(["stockcast", "forecast", "show", "--months", "6", "-s", "bolt"]);
        match cli.command {
            Commands::Forecast {
                command: ForecastCommands::Show { months, search, .. },
            } => {
                assert_eq!(months, MonthWindow::Next(6));
                assert_eq!(search.as_deref(), Some("bolt"));
            }
            other => panic!("unexpected command: {other:?}"),
        }

        assert!(Cli::try_parse_from(["stockcast", "forecast", "show", "--months", "0"]).is_err());
        assert!(Cli::try_parse_from(["stockcast", "forecast", "show", "--months", "100000"]).is_err());
    }
}
