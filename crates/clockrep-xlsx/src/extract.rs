//! Worksheet extraction
//!
//! Upstream report payloads are always single-sheet xlsx files. Only the first
//! sheet is read; its values (not styles) become a [`WorksheetModel`].

use std::io::Cursor;

use calamine::{Data, Range, Reader, Xlsx};
use clockrep_core::{Cell, ReportError, WorksheetModel};
use tracing::debug;

/// Parse the first sheet of an xlsx payload
pub fn extract_first_sheet(payload: &[u8]) -> Result<WorksheetModel, ReportError> {
    let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(payload))
        .map_err(|e| ReportError::Parse(format!("Not an xlsx container: {e}")))?;

    let name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| ReportError::Parse("Workbook contains no worksheets".into()))?;

    let range = workbook
        .worksheet_range(&name)
        .map_err(|e| ReportError::Parse(format!("Unreadable sheet {name:?}: {e}")))?;

    let model = range_to_model(&name, &range);
    debug!(
        sheet = %name,
        rows = model.height(),
        columns = model.width(),
        "Extracted worksheet"
    );
    Ok(model)
}

fn range_to_model(name: &str, range: &Range<Data>) -> WorksheetModel {
    let origin = range.start().unwrap_or((0, 0));
    let rows = range
        .rows()
        .map(|row| row.iter().map(to_cell).collect())
        .collect();
    WorksheetModel::from_grid(name, origin, rows)
}

fn to_cell(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::Empty,
        Data::String(s) => Cell::Text(s.clone()),
        Data::Float(f) => Cell::Number(*f),
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Bool(b) => Cell::Bool(*b),
        Data::DateTime(dt) if dt.is_duration() => Cell::Duration(dt.as_f64()),
        Data::DateTime(dt) => Cell::DateTime(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
        Data::Error(e) => Cell::Text(e.to_string()),
    }
}
