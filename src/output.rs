use crate::models::{Column, Listing};
use anyhow::{Context, Result};
use chrono::{DateTime, Local, TimeZone};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Preferred-order columns that at least one listing fills
pub fn populated_columns(listings: &[Listing]) -> Vec<Column> {
    Column::ORDER
        .into_iter()
        .filter(|col| listings.iter().any(|l| col.value(l).is_some()))
        .collect()
}

/// `{prefix}_{YYYYMMDD_HHMMSS}.csv`
pub fn output_filename<Tz: TimeZone>(prefix: &str, at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("{}_{}.csv", prefix, at.format("%Y%m%d_%H%M%S"))
}

/// Write listings as BOM-prefixed UTF-8 CSV
pub fn write_csv<W: Write>(mut writer: W, listings: &[Listing]) -> Result<()> {
    writer.write_all(UTF8_BOM)?;

    let columns = populated_columns(listings);
    let mut csv = csv::Writer::from_writer(writer);

    csv.write_record(columns.iter().map(|c| c.header()))?;
    for listing in listings {
        csv.write_record(columns.iter().map(|c| c.value(listing).unwrap_or("")))?;
    }
    csv.flush()?;

    Ok(())
}

/// Save listings to a new timestamped file in `dir` and return its path
pub fn save_listings(listings: &[Listing], dir: &Path, prefix: &str) -> Result<PathBuf> {
    save_listings_at(listings, dir, prefix, &Local::now())
}

pub fn save_listings_at<Tz: TimeZone>(
    listings: &[Listing],
    dir: &Path,
    prefix: &str,
    at: &DateTime<Tz>,
) -> Result<PathBuf>
where
    Tz::Offset: std::fmt::Display,
{
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory {}", dir.display()))?;

    let path = dir.join(output_filename(prefix, at));
    let file = File::create(&path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    write_csv(file, listings).with_context(|| format!("Failed to write {}", path.display()))?;

    Ok(path)
}
