//! Spreadsheet readers for uploaded CSV and Excel files
//!
//! Both formats are flattened into a header row plus string cells so the
//! classifier and aggregator never see format-specific types.

use std::io::{Cursor, Read};

use calamine::Reader;
use csv::ReaderBuilder;
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::FileType;

/// A parsed spreadsheet: one header row and data rows in file order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SheetData {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl SheetData {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Cell at (row, column), empty when the row is short
    pub fn cell(&self, row: usize, column: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .map(String::as_str)
            .unwrap_or("")
    }
}

/// Parse raw upload bytes according to the file type
pub fn read_sheet(bytes: &[u8], file_type: FileType) -> Result<SheetData> {
    let sheet = match file_type {
        FileType::Csv => read_csv(bytes)?,
        FileType::Xlsx | FileType::Xls => read_workbook(bytes)?,
    };

    debug!(
        file_type = %file_type,
        columns = sheet.headers.len(),
        rows = sheet.rows.len(),
        "Parsed spreadsheet"
    );
    Ok(sheet)
}

/// Parse CSV data with a header row
pub fn read_csv<R: Read>(reader: R) -> Result<SheetData> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers: Vec<String> = rdr
        .headers()?
        .iter()
        .enumerate()
        .map(|(i, h)| clean_header(i, h))
        .collect();

    if headers.iter().all(|h| h.is_empty()) {
        return Err(Error::Upload("Spreadsheet has no header row".into()));
    }

    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result?;
        let row: Vec<String> = record.iter().map(|c| c.to_string()).collect();
        if row.iter().all(|c| c.is_empty()) {
            continue;
        }
        rows.push(row);
    }

    Ok(SheetData { headers, rows })
}

/// Parse the first worksheet of an Excel workbook
pub fn read_workbook(bytes: &[u8]) -> Result<SheetData> {
    let mut workbook = calamine::open_workbook_auto_from_rs(Cursor::new(bytes))?;

    let first = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| Error::Upload("Workbook has no worksheets".into()))?;
    let range = workbook.worksheet_range(&first)?;

    let mut lines = range
        .rows()
        .map(|row| row.iter().map(|cell| cell.to_string().trim().to_string()));

    let headers: Vec<String> = match lines.next() {
        Some(header_row) => header_row
            .enumerate()
            .map(|(i, h)| clean_header(i, &h))
            .collect(),
        None => return Err(Error::Upload("Worksheet is empty".into())),
    };

    if headers.iter().all(|h| h.is_empty()) {
        return Err(Error::Upload("Spreadsheet has no header row".into()));
    }

    let rows = lines
        .map(|cells| cells.collect::<Vec<_>>())
        .filter(|row| row.iter().any(|c| !c.is_empty()))
        .collect();

    debug!(sheet = %first, "Read first worksheet");
    Ok(SheetData { headers, rows })
}

/// Strip a UTF-8 byte order mark from the first header and trim whitespace
fn clean_header(index: usize, header: &str) -> String {
    let header = if index == 0 {
        header.trim_start_matches('\u{feff}')
    } else {
        header
    };
    header.trim().to_string()
}
