//! Source fetching and delimited-table reading.
//!
//! A work-order export (or any of the auxiliary CSV inputs) is fetched in one
//! blocking call, either from disk or over HTTP(S), and split into a
//! [`RawTable`] of untyped cells. Rows whose column count disagrees with the
//! header are skipped and counted.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use csv::ReaderBuilder;
use production_core::error::{PipelineError, Result};
use production_core::models::RawTable;
use production_core::profile::HeaderMode;
use tracing::{debug, warn};

/// Timeout applied to remote fetches when the caller does not choose one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

// ── SourceLocation ────────────────────────────────────────────────────────────

/// Where a delimited source lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocation {
    File(PathBuf),
    Url(String),
}

impl SourceLocation {
    /// `http://` and `https://` locations are URLs; anything else is a path.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        let lower = trimmed.to_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            SourceLocation::Url(trimmed.to_string())
        } else {
            SourceLocation::File(PathBuf::from(trimmed))
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceLocation::File(path) => write!(f, "{}", path.display()),
            SourceLocation::Url(url) => f.write_str(url),
        }
    }
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Fetch the raw bytes behind `location`.
///
/// HTTP fetches are a single request bounded by `timeout`, with no retry. Any
/// failure, including a non-success status, is [`PipelineError::SourceUnavailable`].
pub fn fetch_bytes(location: &SourceLocation, timeout: Duration) -> Result<Vec<u8>> {
    let unavailable = |reason: String| PipelineError::SourceUnavailable {
        location: location.to_string(),
        reason,
    };

    match location {
        SourceLocation::File(path) => std::fs::read(path).map_err(|e| unavailable(e.to_string())),
        SourceLocation::Url(url) => {
            let client = reqwest::blocking::Client::builder()
                .timeout(timeout)
                .build()
                .map_err(|e| unavailable(format!("failed to build http client: {e}")))?;
            let response = client
                .get(url)
                .send()
                .and_then(|r| r.error_for_status())
                .map_err(|e| unavailable(e.to_string()))?;
            let body = response.bytes().map_err(|e| unavailable(e.to_string()))?;
            debug!("Fetched {} bytes from {}", body.len(), url);
            Ok(body.to_vec())
        }
    }
}

/// Split delimited `bytes` into a [`RawTable`].
///
/// With [`HeaderMode::FirstRow`] a source with no records at all is a schema
/// error. Records that cannot be decoded or whose length differs from the
/// header are counted in [`RawTable::malformed_rows`].
pub fn read_table(bytes: &[u8], header: &HeaderMode) -> Result<RawTable> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);

    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);
    let mut records = reader.records();

    let headers: Vec<String> = match header {
        HeaderMode::Positional(columns) => columns.iter().map(|c| c.trim().to_string()).collect(),
        HeaderMode::FirstRow => match records.next() {
            Some(Ok(first)) => first.iter().map(|h| h.trim().to_string()).collect(),
            Some(Err(e)) => {
                return Err(PipelineError::Schema(format!("unreadable header row: {e}")));
            }
            None => return Err(PipelineError::Schema("source has no header row".to_string())),
        },
    };

    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut malformed_rows = 0usize;

    for (idx, result) in records.enumerate() {
        match result {
            Ok(record) if record.len() == headers.len() => {
                rows.push(record.iter().map(str::to_string).collect());
            }
            Ok(record) => {
                malformed_rows += 1;
                debug!(
                    "Skipping data row {}: {} columns, expected {}",
                    idx + 1,
                    record.len(),
                    headers.len()
                );
            }
            Err(e) => {
                malformed_rows += 1;
                debug!("Skipping undecodable data row {}: {}", idx + 1, e);
            }
        }
    }

    if malformed_rows > 0 {
        warn!("Skipped {} malformed rows", malformed_rows);
    }
    debug!(
        "Read {} rows across {} columns",
        rows.len(),
        headers.len()
    );

    Ok(RawTable {
        headers,
        rows,
        malformed_rows,
    })
}

/// Fetch `location` and read it as a table.
pub fn load_raw_table(
    location: &SourceLocation,
    header: &HeaderMode,
    timeout: Duration,
) -> Result<RawTable> {
    let bytes = fetch_bytes(location, timeout)?;
    read_table(&bytes, header)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
