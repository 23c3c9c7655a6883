use anyhow::Result;

use crate::cli::AnalyzeArgs;
use crate::cli::output::{print_json, print_preview};
use crate::config::Config;
use crate::ingest::grid::read_grid;
use crate::ingest::{HeaderPreview, Upload};

pub async fn handle_analyze_command(args: AnalyzeArgs, config: &Config) -> Result<()> {
    let upload = Upload::from_path(&args.file, config.import.max_upload_bytes)?;
    let grid = read_grid(&upload)?;
    let preview = HeaderPreview::build(
        &upload.filename,
        &grid,
        config.import.header_scan_rows,
        config.import.sample_rows,
    )?;

    if args.json {
        print_json(&preview)
    } else {
        print_preview(&preview);
        Ok(())
    }
}
