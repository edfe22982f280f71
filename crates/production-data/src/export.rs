//! CSV export of the (filtered) normalized table.

use std::io;
use std::path::Path;

use production_core::error::Result;
use production_core::models::NormalizedTable;
use tracing::info;

/// Write `table` as CSV with canonical headers.
pub fn write_csv<W: io::Write>(table: &NormalizedTable, writer: W) -> Result<()> {
    let raw = table.to_raw_table();
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(&raw.headers).map_err(io::Error::from)?;
    for row in &raw.rows {
        csv_writer.write_record(row).map_err(io::Error::from)?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Write `table` to a CSV file at `path`, creating parent directories.
pub fn export_csv(table: &NormalizedTable, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::File::create(path)?;
    write_csv(table, io::BufWriter::new(file))?;
    info!("Exported {} work orders to {}", table.len(), path.display());
    Ok(())
}
