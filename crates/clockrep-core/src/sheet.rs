//! In-memory worksheet and workbook model
//!
//! Payloads coming back from upstream are single-sheet xlsx files. They are
//! reduced to a [`WorksheetModel`]: a rectangular block of [`Cell`] values
//! anchored at `origin`. Fully empty border rows and columns are trimmed on
//! construction, so two models describing the same visible data compare equal
//! no matter how much blank padding the source file carried.

use std::collections::HashSet;

/// Name of the aggregate sheet, always first in a workbook
pub const SUMMARY_SHEET: &str = "Summary";

/// Excel's hard limit on sheet name length
pub const MAX_SHEET_NAME_LEN: usize = 31;

const FORBIDDEN_NAME_CHARS: [char; 7] = ['[', ']', ':', '*', '?', '/', '\\'];

/// One cell value
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Cell {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    /// Excel serial date-time (days since 1899-12-30)
    DateTime(f64),
    /// Elapsed time in days, rendered as `[h]:mm:ss`
    Duration(f64),
}

impl Cell {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(s) => s.is_empty(),
            _ => false,
        }
    }
}

/// One sheet's worth of tabular data
#[derive(Clone, Debug, PartialEq)]
pub struct WorksheetModel {
    name: String,
    /// Zero-based (row, column) of the top-left cell of `rows`
    origin: (u32, u32),
    rows: Vec<Vec<Cell>>,
}

impl WorksheetModel {
    /// Build a normalized model from a possibly ragged, padded grid
    pub fn from_grid(name: impl Into<String>, origin: (u32, u32), rows: Vec<Vec<Cell>>) -> Self {
        let name = name.into();
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        let mut rows: Vec<Vec<Cell>> = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, Cell::Empty);
                row
            })
            .collect();

        let occupied = |row: &Vec<Cell>| row.iter().any(|c| !c.is_empty());
        let (Some(first_row), Some(last_row)) = (
            rows.iter().position(occupied),
            rows.iter().rposition(occupied),
        ) else {
            return Self {
                name,
                origin: (0, 0),
                rows: Vec::new(),
            };
        };
        rows.truncate(last_row + 1);
        rows.drain(..first_row);

        let column_occupied = |col: usize| rows.iter().any(|row| !row[col].is_empty());
        let first_col = (0..width).find(|&c| column_occupied(c)).unwrap_or(0);
        let last_col = (0..width).rev().find(|&c| column_occupied(c)).unwrap_or(first_col);
        for row in &mut rows {
            row.truncate(last_col + 1);
            row.drain(..first_col);
        }

        Self {
            name,
            origin: (origin.0 + first_row as u32, origin.1 + first_col as u32),
            rows,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Same data under another sheet name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn origin(&self) -> (u32, u32) {
        self.origin
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    pub fn width(&self) -> usize {
        self.rows.first().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cell at an absolute sheet position
    pub fn cell(&self, row: u32, col: u32) -> Option<&Cell> {
        let r = row.checked_sub(self.origin.0)? as usize;
        let c = col.checked_sub(self.origin.1)? as usize;
        self.rows.get(r)?.get(c)
    }

    /// Non-empty cells with absolute positions, row-major
    pub fn occupied_cells(&self) -> impl Iterator<Item = (u32, u32, &Cell)> + '_ {
        let (row0, col0) = self.origin;
        self.rows.iter().enumerate().flat_map(move |(r, row)| {
            row.iter()
                .enumerate()
                .filter(|(_, cell)| !cell.is_empty())
                .map(move |(c, cell)| (row0 + r as u32, col0 + c as u32, cell))
        })
    }
}

/// Ordered sheets: summary first, then one sheet per member
#[derive(Clone, Debug, PartialEq)]
pub struct Workbook {
    sheets: Vec<WorksheetModel>,
}

impl Workbook {
    /// Lay out the summary followed by member sheets, making every name
    /// workbook-legal and unique
    pub fn assemble(summary: WorksheetModel, members: Vec<WorksheetModel>) -> Self {
        let mut names = SheetNames::default();
        let mut sheets = Vec::with_capacity(members.len() + 1);

        let summary_name = names.claim(SUMMARY_SHEET, 1);
        sheets.push(summary.with_name(summary_name));

        for (index, sheet) in members.into_iter().enumerate() {
            let name = names.claim(sheet.name(), index + 2);
            sheets.push(sheet.with_name(name));
        }

        Self { sheets }
    }

    pub fn sheets(&self) -> &[WorksheetModel] {
        &self.sheets
    }

    pub fn summary(&self) -> &WorksheetModel {
        &self.sheets[0]
    }

    pub fn len(&self) -> usize {
        self.sheets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }
}

// ============================================================================
// Sheet names
// ============================================================================

/// Make a raw display name acceptable as an Excel sheet name.
///
/// `position` is the 1-based sheet position, used for the `Sheet{n}` fallback.
pub fn sanitize_sheet_name(raw: &str, position: usize) -> String {
    let replaced: String = raw
        .chars()
        .map(|c| {
            if FORBIDDEN_NAME_CHARS.contains(&c) || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();
    let mut name = truncate_chars(trim_edges(&replaced), MAX_SHEET_NAME_LEN);
    if name.is_empty() {
        name = format!("Sheet{position}");
    }
    // Excel reserves "History" for change tracking
    if name.eq_ignore_ascii_case("history") {
        name.push('_');
    }
    name
}

/// Excel rejects names that start or end with an apostrophe
fn trim_edges(s: &str) -> &str {
    s.trim_matches(|c: char| c == '\'' || c.is_whitespace())
}

/// At most `max` chars, edges trimmed again after the cut
fn truncate_chars(s: &str, max: usize) -> String {
    let cut: String = s.chars().take(max).collect();
    trim_edges(&cut).to_string()
}

/// Allocates unique (case-insensitive) sheet names
#[derive(Debug, Default)]
pub struct SheetNames {
    taken: HashSet<String>,
}

impl SheetNames {
    /// Sanitize `raw` and suffix it with ` (2)`, ` (3)`, ... until unique
    pub fn claim(&mut self, raw: &str, position: usize) -> String {
        let base = sanitize_sheet_name(raw, position);
        if self.taken.insert(base.to_lowercase()) {
            return base;
        }

        let mut n = 2usize;
        loop {
            let suffix = format!(" ({n})");
            let room = MAX_SHEET_NAME_LEN - suffix.chars().count();
            let candidate = format!("{}{suffix}", truncate_chars(&base, room));
            if self.taken.insert(candidate.to_lowercase()) {
                return candidate;
            }
            n += 1;
        }
    }
}
