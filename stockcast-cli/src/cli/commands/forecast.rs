use anyhow::Result;
use chrono::Local;
use colored::*;

use super::{load_upload, open_store};
use crate::cli::ForecastCommands;
use crate::cli::output::{print_forecast, print_json, print_report};
use crate::config::Config;
use crate::forecast::export::export_view;
use crate::forecast::{ForecastQuery, fetch_forecast, import_forecast};

pub async fn handle_forecast_command(command: ForecastCommands, config: &Config) -> Result<()> {
    match command {
        ForecastCommands::Import {
            args,
            keep_existing,
        } => {
            let (upload, selection) = load_upload(config, &args.file, &args.columns)?;
            let store = open_store(config, args.dry_run).await?;
            let report = import_forecast(
                store.as_ref(),
                &upload,
                &selection,
                &config.import,
                !keep_existing,
            )
            .await?;
            if args.json {
                print_json(&report)?;
            } else {
                print_report(&report, args.dry_run);
                println!("  Forecasts: {}", report.rows_written);
            }
        }
        ForecastCommands::Show {
            months,
            search,
            json,
            export,
        } => {
            let store = open_store(config, false).await?;
            let query = ForecastQuery { months, search };
            let today = Local::now().date_naive();
            let view = fetch_forecast(store.as_ref(), &query, today).await?;

            if json {
                print_json(&view)?;
            } else {
                print_forecast(&view);
            }
            if let Some(path) = export {
                export_view(&view, &path)?;
                if !json {
                    println!("Exported to {}", path.display().to_string().green());
                }
            }
        }
    }
    Ok(())
}
