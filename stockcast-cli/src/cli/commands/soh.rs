use anyhow::{Result, bail};
use colored::*;
use serde_json::Value;

use super::{load_upload, open_store};
use crate::cli::SohCommands;
use crate::cli::output::{print_json, print_report, print_table};
use crate::config::Config;
use crate::ingest::grid::format_number;
use crate::soh;

/// Columns shown by `soh list`
const LIST_COLUMNS: [(&str, &str); 5] = [
    ("product_id", "Product ID"),
    ("description", "Description"),
    ("stock_on_hand", "Stock On Hand"),
    ("default_uom", "UOM"),
    ("locations", "Locations"),
];

pub async fn handle_soh_command(command: SohCommands, config: &Config) -> Result<()> {
    match command {
        SohCommands::Import { args, replace } => {
            let (upload, selection) = load_upload(config, &args.file, &args.columns)?;
            let store = open_store(config, args.dry_run).await?;
            let report =
                soh::import_soh(store.as_ref(), &upload, &selection, &config.import, replace)
                    .await?;
            if args.json {
                print_json(&report)?;
            } else {
                print_report(&report, args.dry_run);
            }
        }
        SohCommands::List { json } => {
            let store = open_store(config, false).await?;
            let records = soh::list(store.as_ref()).await?;
            if json {
                print_json(&records)?;
            } else if records.is_empty() {
                println!("{}", "No stock-on-hand records".yellow());
            } else {
                let headers: Vec<String> =
                    LIST_COLUMNS.iter().map(|(_, label)| label.to_string()).collect();
                let rows: Vec<Vec<String>> = records
                    .iter()
                    .map(|r| {
                        LIST_COLUMNS
                            .iter()
                            .map(|(column, _)| render_value(r.get(*column)))
                            .collect()
                    })
                    .collect();
                print_table(&headers, &rows);
            }
        }
        SohCommands::Summary { json } => {
            let store = open_store(config, false).await?;
            let summary = soh::summary(store.as_ref()).await?;
            if json {
                print_json(&summary)?;
            } else {
                println!("{} {}", "Records:".bold(), summary.total_records);
                match summary.latest_import {
                    Some(latest) => println!(
                        "{} {} from {} at {}",
                        "Latest import:".bold(),
                        latest.batch_id.as_deref().unwrap_or("-"),
                        latest.source.as_deref().unwrap_or("-"),
                        latest.created_at.as_deref().unwrap_or("-")
                    ),
                    None => println!("{} none", "Latest import:".bold()),
                }
            }
        }
        SohCommands::Clear { yes } => {
            if !yes {
                bail!("Refusing to clear stock-on-hand records without --yes");
            }
            let store = open_store(config, false).await?;
            let removed = soh::clear(store.as_ref()).await?;
            println!("Cleared {} stock-on-hand records", removed.to_string().green());
        }
    }
    Ok(())
}

fn render_value(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.as_f64().map(format_number).unwrap_or_else(|| n.to_string()),
        Some(other) => other.to_string(),
    }
}
