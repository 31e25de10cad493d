//! Multi-sheet workbook assembly
//!
//! Combines the aggregate summary and the per-member worksheets into one
//! xlsx artifact:
//!
//! ```text
//! Sheet 1: Summary      (totals per project)
//! Sheet 2: <member 1>   (entries by date / project / time entry)
//! ...
//! Sheet N+1: <member N>
//! ```
//!
//! Only values are carried over from upstream. Dates and durations get a
//! fixed number format so they reload as the same kind of cell, the first
//! row of each sheet is bolded, and columns are auto-fitted.

use clockrep_core::{Cell, ReportError, Workbook, WorksheetModel};
use rust_xlsxwriter::{Format, Workbook as XlsxWorkbook, Worksheet};
use tracing::debug;

/// Serializes [`Workbook`]s to xlsx bytes
#[derive(Clone, Debug)]
pub struct WorkbookAssembler {
    /// Auto-fit column widths to their content
    pub autofit: bool,
    /// Bold the first occupied row of each sheet
    pub bold_header: bool,
    /// Number format for date-time cells
    pub datetime_format: String,
    /// Number format for duration cells
    pub duration_format: String,
}

impl Default for WorkbookAssembler {
    fn default() -> Self {
        Self {
            autofit: true,
            bold_header: true,
            datetime_format: "yyyy-mm-dd hh:mm:ss".into(),
            duration_format: "[h]:mm:ss".into(),
        }
    }
}

impl WorkbookAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep default column widths
    pub fn no_autofit(mut self) -> Self {
        self.autofit = false;
        self
    }

    /// Write the header row without bold
    pub fn plain_header(mut self) -> Self {
        self.bold_header = false;
        self
    }

    /// Summary first, members after in order, serialized to compressed xlsx
    pub fn assemble(
        &self,
        summary: WorksheetModel,
        members: Vec<WorksheetModel>,
    ) -> Result<Vec<u8>, ReportError> {
        self.render_to_bytes(&Workbook::assemble(summary, members))
    }

    /// Generate xlsx bytes for an already laid-out workbook
    pub fn render_to_bytes(&self, workbook: &Workbook) -> Result<Vec<u8>, ReportError> {
        let mut xlsx = XlsxWorkbook::new();
        let formats = self.create_formats();

        for model in workbook.sheets() {
            let sheet = xlsx.add_worksheet();
            sheet.set_name(model.name()).map_err(write_error)?;
            self.write_sheet(sheet, model, &formats)?;
        }

        let buffer = xlsx.save_to_buffer().map_err(write_error)?;
        debug!(sheets = workbook.len(), bytes = buffer.len(), "Serialized workbook");
        Ok(buffer)
    }

    fn create_formats(&self) -> CellFormats {
        let header = Format::new().set_bold();
        CellFormats {
            datetime: Format::new().set_num_format(&self.datetime_format),
            duration: Format::new().set_num_format(&self.duration_format),
            header_datetime: header.clone().set_num_format(&self.datetime_format),
            header_duration: header.clone().set_num_format(&self.duration_format),
            header,
            plain: Format::new(),
        }
    }

    fn write_sheet(
        &self,
        sheet: &mut Worksheet,
        model: &WorksheetModel,
        formats: &CellFormats,
    ) -> Result<(), ReportError> {
        let header_row = model.origin().0;

        for (row, col, cell) in model.occupied_cells() {
            let col = u16::try_from(col)
                .map_err(|_| ReportError::Write(format!("Column {col} exceeds the xlsx limit")))?;
            let in_header = self.bold_header && row == header_row;

            let written = match cell {
                Cell::Empty => continue,
                Cell::Text(s) => {
                    let format = if in_header { &formats.header } else { &formats.plain };
                    sheet.write_string_with_format(row, col, s, format)
                }
                Cell::Number(n) => {
                    let format = if in_header { &formats.header } else { &formats.plain };
                    sheet.write_number_with_format(row, col, *n, format)
                }
                Cell::Bool(b) => {
                    let format = if in_header { &formats.header } else { &formats.plain };
                    sheet.write_boolean_with_format(row, col, *b, format)
                }
                Cell::DateTime(v) => {
                    let format = if in_header { &formats.header_datetime } else { &formats.datetime };
                    sheet.write_number_with_format(row, col, *v, format)
                }
                Cell::Duration(v) => {
                    let format = if in_header { &formats.header_duration } else { &formats.duration };
                    sheet.write_number_with_format(row, col, *v, format)
                }
            };
            written.map_err(write_error)?;
        }

        if self.autofit {
            sheet.autofit();
        }
        Ok(())
    }
}

/// Reusable cell formats
struct CellFormats {
    plain: Format,
    header: Format,
    datetime: Format,
    duration: Format,
    header_datetime: Format,
    header_duration: Format,
}

fn write_error(e: rust_xlsxwriter::XlsxError) -> ReportError {
    ReportError::Write(e.to_string())
}
