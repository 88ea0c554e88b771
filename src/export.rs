//! Spreadsheet export of highlight records
//!
//! Builds a single-sheet XLSX workbook in memory: a header row followed by
//! one row per record, in collection order.

use crate::highlights::HighlightRecord;
use crate::PdfError;
use rust_xlsxwriter::{Format, FormatAlign, Workbook};
use std::path::Path;

/// Suggested file name for the exported workbook
pub const XLSX_FILE_NAME: &str = "highlighted_keywords.xlsx";
/// Media type of the exported workbook
pub const XLSX_MIME_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

pub const PAGE_HEADER: &str = "Page";
pub const CONTENT_HEADER: &str = "Highlight content";
pub const SHEET_NAME: &str = "Sheet1";

/// A finished workbook ready to be saved or offered for download
#[derive(Debug, Clone)]
pub struct SpreadsheetExport {
    pub bytes: Vec<u8>,
    pub file_name: &'static str,
    pub mime_type: &'static str,
}

impl SpreadsheetExport {
    /// Save the workbook to `path`
    pub fn write_to<P: AsRef<Path>>(&self, path: P) -> Result<(), PdfError> {
        std::fs::write(path, &self.bytes)?;
        Ok(())
    }
}

/// Serialize records into an XLSX workbook
pub fn to_xlsx(records: &[HighlightRecord]) -> Result<SpreadsheetExport, PdfError> {
    let header = Format::new().set_bold();
    let wrapped = Format::new().set_text_wrap().set_align(FormatAlign::Top);

    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET_NAME)?;
    sheet.set_column_width(0, 8)?;
    sheet.set_column_width(1, 100)?;
    sheet.write_string_with_format(0, 0, PAGE_HEADER, &header)?;
    sheet.write_string_with_format(0, 1, CONTENT_HEADER, &header)?;

    for (row, record) in (1u32..).zip(records) {
        sheet.write_number(row, 0, record.display_page as f64)?;
        sheet.write_string_with_format(row, 1, &record.text, &wrapped)?;
    }

    let bytes = workbook.save_to_buffer()?;

    log::debug!("exported {} rows ({} bytes)", records.len(), bytes.len());
    Ok(SpreadsheetExport {
        bytes,
        file_name: XLSX_FILE_NAME,
        mime_type: XLSX_MIME_TYPE,
    })
}
