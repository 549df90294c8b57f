use csv::ReaderBuilder;
use vizdb_core::{normalize_text, Row};

#[derive(thiserror::Error, Debug)]
pub enum IngestError {
    #[error("csv parse error: {0}")]
    Csv(#[from] csv::Error),
    #[error("csv input has no columns")]
    NoColumns,
    #[error("csv input has no data rows")]
    NoRows,
}

/// Parsed CSV ready to become a collection.
#[derive(Debug)]
pub struct CsvTable {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

/// Parse CSV text into normalized rows. Every cell goes through the
/// value normalizer, so "10" lands as a number and "" as an absent
/// column; headers become the column set.
pub fn ingest_csv(input: &str) -> Result<CsvTable, IngestError> {
    let mut reader = ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(input.as_bytes());

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|header| header.trim().to_string())
        .collect();
    if headers.iter().all(|header| header.is_empty()) {
        return Err(IngestError::NoColumns);
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let mut row = Row::new();
        for (idx, column) in headers.iter().enumerate() {
            if column.is_empty() {
                continue;
            }
            let cell = record.get(idx).unwrap_or("");
            let value = normalize_text(cell);
            if !value.is_null() {
                row.insert(column.clone(), value);
            }
        }
        rows.push(row);
    }
    if rows.is_empty() {
        return Err(IngestError::NoRows);
    }

    let columns = headers
        .into_iter()
        .filter(|header| !header.is_empty())
        .collect();
    Ok(CsvTable { columns, rows })
}
