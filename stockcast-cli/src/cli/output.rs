//! Terminal rendering for reports and tables

use anyhow::{Context, Result};
use colored::*;
use serde::Serialize;

use crate::forecast::ForecastView;
use crate::ingest::{HeaderPreview, ImportReport};

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("Failed to format JSON output")?;
    println!("{}", text);
    Ok(())
}

pub fn print_report(report: &ImportReport, dry_run: bool) {
    let title = if dry_run {
        "Dry run complete (nothing written)"
    } else {
        "Import complete"
    };
    println!("{}", title.bold());
    println!("  Batch:     {}", report.batch_id.to_string().dimmed());
    println!("  Header:    row {}", report.header_row + 1);
    println!("  Rows:      {}", report.total_rows);
    println!("  Imported:  {}", report.success_count.to_string().green());
    if report.error_count > 0 {
        println!("  Errors:    {}", report.error_count.to_string().red());
    } else {
        println!("  Errors:    0");
    }
    if report.skipped_count > 0 {
        println!("  Blank:     {}", report.skipped_count);
    }
    println!("  Columns:   {}", report.columns_imported.join(", ").cyan());

    if !report.errors.is_empty() {
        println!();
        for error in &report.errors {
            println!("  {} {}", "✗".red(), error);
        }
        let hidden = report.error_count.saturating_sub(report.errors.len());
        if hidden > 0 {
            println!("  {}", format!("... and {} more", hidden).dimmed());
        }
    }
}

pub fn print_preview(preview: &HeaderPreview) {
    println!("{} {}", "File:".bold(), preview.filename);
    println!(
        "{} row {} ({} data rows follow)",
        "Header:".bold(),
        preview.header_row_index + 1,
        preview.total_rows
    );
    println!("{}", "Columns:".bold());
    for header in &preview.headers {
        match preview.month_columns.iter().find(|m| &m.label == header) {
            Some(month) => println!("  {} {}", header.cyan(), format!("-> {}", month.key).dimmed()),
            None => println!("  {}", header),
        }
    }
    if !preview.sample_rows.is_empty() {
        println!("{}", "Sample rows:".bold());
        for row in &preview.sample_rows {
            println!("  {}", row.join(" | "));
        }
    }
}

/// Render rows as an aligned text table
pub fn print_table(headers: &[String], rows: &[Vec<String>]) {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if let Some(w) = widths.get_mut(i) {
                *w = (*w).max(cell.chars().count());
            }
        }
    }

    let header_line: Vec<String> = headers
        .iter()
        .zip(&widths)
        .map(|(h, w)| format!("{:<width$}", h, width = *w))
        .collect();
    println!("{}", header_line.join("  ").bold());

    for row in rows {
        let line: Vec<String> = widths
            .iter()
            .enumerate()
            .map(|(i, w)| format!("{:<width$}", row.get(i).map(String::as_str).unwrap_or(""), width = *w))
            .collect();
        println!("{}", line.join("  ").trim_end());
    }
}

pub fn print_forecast(view: &ForecastView) {
    if view.rows.is_empty() {
        println!("{}", "No forecast data found".yellow());
        return;
    }

    let headers: Vec<String> = view.headers.iter().map(|h| h.label.clone()).collect();
    let rows: Vec<Vec<String>> = view
        .rows
        .iter()
        .map(|row| {
            let mut cells = vec![
                row.product_code.clone(),
                row.description.clone().unwrap_or_default(),
            ];
            cells.extend(
                view.month_keys()
                    .map(|key| row.months.get(key).map(u64::to_string).unwrap_or_default()),
            );
            cells
        })
        .collect();
    print_table(&headers, &rows);

    let summary = &view.summary;
    println!();
    println!(
        "{} products, {} months, average {:.2} per product-month, top product {}",
        summary.total_products.to_string().bold(),
        summary.total_months.to_string().bold(),
        summary.avg_forecast,
        summary.top_product.as_deref().unwrap_or("N/A").green()
    );
}
